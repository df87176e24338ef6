//! Scriptable in-memory transport for exercising sessions without hardware.
//!
//! Every call that reaches a [`MockDevice`] is recorded, failures and scan
//! results are scripted per operation, and misuse (a call after destruct, two
//! calls overlapping) is flagged instead of panicking.

use crate::device::{Connector, Device, RawScan};
use crate::error::DriverError;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use sweep_data::ScanSample;

#[derive(Clone, Debug, PartialEq)]
pub enum MockCall {
    ConstructSimple,
    Construct {
        port: String,
        baudrate: u32,
        timeout: Duration,
    },
    StartScanning,
    StopScanning,
    GetScan(Duration),
    GetMotorSpeed,
    SetMotorSpeed(i32),
    GetSampleRate,
    Reset,
    Destruct,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MockOp {
    Construct,
    StartScanning,
    StopScanning,
    GetScan,
    GetMotorSpeed,
    SetMotorSpeed,
    GetSampleRate,
    Reset,
}

/// Scripted answer to one `get_scan` call.
#[derive(Clone, Debug)]
pub enum MockScan {
    Samples(Vec<ScanSample>),
    /// Answers after `Duration`, or times out if that exceeds the request.
    Delayed(Duration, Vec<ScanSample>),
    /// Never answers; the call times out after the requested timeout.
    Silent,
}

struct MockState {
    calls: Vec<MockCall>,
    failures: HashMap<MockOp, VecDeque<DriverError>>,
    scans: VecDeque<MockScan>,
    motor_speed: i32,
    sample_rate: i32,
    destruct_count: usize,
    destroyed: bool,
    used_after_destroy: bool,
    active_calls: usize,
    overlapping_calls: bool,
}

impl MockState {
    fn take_failure(&mut self, op: MockOp) -> Option<DriverError> {
        self.failures.get_mut(&op).and_then(VecDeque::pop_front)
    }
}

/// Connector handing out [`MockDevice`]s that share one script and call log.
#[derive(Clone)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockTransport {
    fn default() -> Self {
        MockTransport::new()
    }
}

impl MockTransport {
    pub fn new() -> MockTransport {
        MockTransport {
            state: Arc::new(Mutex::new(MockState {
                calls: Vec::new(),
                failures: HashMap::new(),
                scans: VecDeque::new(),
                motor_speed: 5,
                sample_rate: 500,
                destruct_count: 0,
                destroyed: false,
                used_after_destroy: false,
                active_calls: 0,
                overlapping_calls: false,
            })),
        }
    }

    /// The next call of `op` fails with `error`.
    pub fn fail_next(&self, op: MockOp, error: DriverError) {
        self.state
            .lock()
            .failures
            .entry(op)
            .or_default()
            .push_back(error);
    }

    pub fn push_scan(&self, scan: MockScan) {
        self.state.lock().scans.push_back(scan);
    }

    pub fn set_sample_rate(&self, hz: i32) {
        self.state.lock().sample_rate = hz;
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().calls.clone()
    }

    pub fn destruct_count(&self) -> usize {
        self.state.lock().destruct_count
    }

    pub fn is_destroyed(&self) -> bool {
        self.state.lock().destroyed
    }

    /// Whether any call reached a device after it was destructed.
    pub fn used_after_destroy(&self) -> bool {
        self.state.lock().used_after_destroy
    }

    /// Whether two calls were ever executing at the same time.
    pub fn overlapping_calls(&self) -> bool {
        self.state.lock().overlapping_calls
    }

    fn open(&self, call: MockCall) -> Result<Box<dyn Device>, DriverError> {
        let mut state = self.state.lock();
        state.calls.push(call);
        if let Some(e) = state.take_failure(MockOp::Construct) {
            return Err(e);
        }
        state.destroyed = false;
        Ok(Box::new(MockDevice {
            state: Arc::clone(&self.state),
        }))
    }
}

impl Connector for MockTransport {
    fn construct_simple(&self) -> Result<Box<dyn Device>, DriverError> {
        self.open(MockCall::ConstructSimple)
    }

    fn construct(
        &self,
        port: &str,
        baudrate: u32,
        timeout: Duration,
    ) -> Result<Box<dyn Device>, DriverError> {
        self.open(MockCall::Construct {
            port: port.to_owned(),
            baudrate,
            timeout,
        })
    }
}

pub struct MockDevice {
    state: Arc<Mutex<MockState>>,
}

/// Marks a call as executing until dropped.
struct ActiveCall<'a> {
    state: &'a Mutex<MockState>,
}

impl Drop for ActiveCall<'_> {
    fn drop(&mut self) {
        self.state.lock().active_calls -= 1;
    }
}

struct MockRawScan(Vec<ScanSample>);

impl RawScan for MockRawScan {
    fn sample_count(&self) -> usize {
        self.0.len()
    }

    fn angle(&self, index: usize) -> f64 {
        self.0[index].angle
    }

    fn distance(&self, index: usize) -> f64 {
        self.0[index].distance
    }
}

impl MockDevice {
    fn begin(&self, call: MockCall, op: MockOp) -> Result<ActiveCall<'_>, DriverError> {
        let mut state = self.state.lock();
        state.calls.push(call);
        if state.destroyed {
            state.used_after_destroy = true;
        }
        if state.active_calls > 0 {
            state.overlapping_calls = true;
        }
        state.active_calls += 1;
        let failure = state.take_failure(op);
        drop(state);
        let active = ActiveCall { state: &self.state };
        match failure {
            Some(e) => Err(e),
            None => Ok(active),
        }
    }
}

impl Device for MockDevice {
    fn start_scanning(&mut self) -> Result<(), DriverError> {
        self.begin(MockCall::StartScanning, MockOp::StartScanning)
            .map(drop)
    }

    fn stop_scanning(&mut self) -> Result<(), DriverError> {
        self.begin(MockCall::StopScanning, MockOp::StopScanning)
            .map(drop)
    }

    fn get_scan(&mut self, timeout: Duration) -> Result<Box<dyn RawScan + Send>, DriverError> {
        let _active = self.begin(MockCall::GetScan(timeout), MockOp::GetScan)?;
        let script = self.state.lock().scans.pop_front().unwrap_or(MockScan::Silent);
        let samples = match script {
            MockScan::Samples(samples) => samples,
            MockScan::Delayed(delay, samples) if delay < timeout => {
                std::thread::sleep(delay);
                samples
            }
            MockScan::Delayed(..) | MockScan::Silent => {
                std::thread::sleep(timeout);
                return Err(DriverError::timeout(format!(
                    "no complete revolution within {} ms",
                    timeout.as_millis()
                )));
            }
        };
        Ok(Box::new(MockRawScan(samples)))
    }

    fn get_motor_speed(&mut self) -> Result<i32, DriverError> {
        let _active = self.begin(MockCall::GetMotorSpeed, MockOp::GetMotorSpeed)?;
        let speed = self.state.lock().motor_speed;
        Ok(speed)
    }

    fn set_motor_speed(&mut self, hz: i32) -> Result<(), DriverError> {
        let _active = self.begin(MockCall::SetMotorSpeed(hz), MockOp::SetMotorSpeed)?;
        self.state.lock().motor_speed = hz;
        Ok(())
    }

    fn get_sample_rate(&mut self) -> Result<i32, DriverError> {
        let _active = self.begin(MockCall::GetSampleRate, MockOp::GetSampleRate)?;
        let rate = self.state.lock().sample_rate;
        Ok(rate)
    }

    fn reset(&mut self) -> Result<(), DriverError> {
        self.begin(MockCall::Reset, MockOp::Reset).map(drop)
    }

    fn destruct(&mut self) {
        let mut state = self.state.lock();
        state.calls.push(MockCall::Destruct);
        if state.destroyed {
            state.used_after_destroy = true;
        }
        state.destroyed = true;
        state.destruct_count += 1;
    }
}
