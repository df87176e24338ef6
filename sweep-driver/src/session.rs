use crate::device::Connector;
use crate::error::{Result, SweepError};
use crate::handle::{validate_timeout, DeviceAccess, DeviceHandle};
use crate::scan_task::{AsyncScanTask, ScanOutcome};
use crate::serial_device::SerialConnector;
use log::{debug, warn};
use std::time::Duration;
use sweep_data::{ConnectionMode, PortConfig, ScanFrame};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Scanning,
    /// Terminal. Every operation fails with [`SweepError::Closed`].
    Destroyed,
}

struct PendingScan {
    task: AsyncScanTask,
    continuation: Box<dyn FnOnce(ScanOutcome)>,
}

/// A connection to one Sweep.
///
/// Commands run synchronously on the calling thread. [`Session::scan`] reads
/// a revolution on a background thread and hands the result to a
/// continuation, which always runs on the thread that owns the session: when
/// it calls [`Session::dispatch_completions`] or [`Session::wait_for_scan`],
/// or right before the next command, since commands wait for an outstanding
/// scan to complete.
///
/// # Example
/// ```no_run
/// use std::time::Duration;
/// use sweep_driver::Session;
///
/// let mut session = Session::auto_detect()?;
/// session.start_scanning()?;
/// session.scan(Duration::from_secs(2), |result| match result {
///     Ok(frame) => println!("{} samples", frame.len()),
///     Err(e) => eprintln!("{}", e),
/// })?;
/// session.wait_for_scan();
/// session.stop_scanning()?;
/// # Ok::<(), sweep_driver::SweepError>(())
/// ```
pub struct Session {
    handle: DeviceHandle,
    state: SessionState,
    pending: Option<PendingScan>,
    scans_issued: u64,
}

impl Session {
    /// Opens the device. A construction failure is final; no session exists.
    pub fn open(connector: &dyn Connector, mode: impl Into<ConnectionMode>) -> Result<Session> {
        let handle = DeviceHandle::construct(connector, mode.into())?;
        Ok(Session {
            handle,
            state: SessionState::Idle,
            pending: None,
            scans_issued: 0,
        })
    }

    /// Opens the first Sweep found on a serial port.
    pub fn auto_detect() -> Result<Session> {
        Session::open(&SerialConnector, ConnectionMode::AutoDetect)
    }

    /// # Arguments
    ///
    /// * `port` - Serial port name such as `/dev/ttyUSB0`.
    /// * `baudrate` - 115200 for the Sweep.
    /// * `timeout` - Response timeout for commands.
    pub fn with_port(port: &str, baudrate: u32, timeout: Duration) -> Result<Session> {
        Session::open(&SerialConnector, PortConfig::new(port, baudrate, timeout))
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn connection_mode(&self) -> &ConnectionMode {
        self.handle.mode()
    }

    pub fn start_scanning(&mut self) -> Result<()> {
        self.command("start_scanning", DeviceAccess::start_scanning)?;
        self.state = SessionState::Scanning;
        Ok(())
    }

    pub fn stop_scanning(&mut self) -> Result<()> {
        self.command("stop_scanning", DeviceAccess::stop_scanning)?;
        self.state = SessionState::Idle;
        Ok(())
    }

    /// Resets the device, which also stops scanning.
    pub fn reset(&mut self) -> Result<()> {
        self.command("reset", DeviceAccess::reset)?;
        self.state = SessionState::Idle;
        Ok(())
    }

    /// Motor speed in Hz.
    pub fn get_motor_speed(&mut self) -> Result<i32> {
        self.command("get_motor_speed", DeviceAccess::get_motor_speed)
    }

    /// Passed to the device as is; the device rejects unsupported speeds.
    pub fn set_motor_speed(&mut self, hz: i32) -> Result<()> {
        self.command("set_motor_speed", |access| access.set_motor_speed(hz))
    }

    /// Sample rate in Hz.
    pub fn get_sample_rate(&mut self) -> Result<i32> {
        self.command("get_sample_rate", DeviceAccess::get_sample_rate)
    }

    /// Starts reading one revolution in the background.
    ///
    /// `continuation` is invoked exactly once with the frame or the error,
    /// on this session's thread. It cannot be cancelled; the read ends when a
    /// revolution arrives or `timeout` elapses.
    ///
    /// Fails without invoking `continuation` when the timeout is unusable,
    /// the session is closed, or another scan is still outstanding.
    pub fn scan<F>(&mut self, timeout: Duration, continuation: F) -> Result<()>
    where
        F: FnOnce(Result<ScanFrame>) + 'static,
    {
        self.ensure_open()?;
        if self.pending.is_some() {
            return Err(SweepError::ScanInProgress);
        }
        validate_timeout(timeout)?;

        // taken here rather than on the worker, so no command issued after
        // this call can reach the device before the read does
        let access = self.handle.lock();
        self.scans_issued += 1;
        let task = AsyncScanTask::spawn(self.scans_issued, access, timeout)?;
        debug!("Scan {} started ({} ms)", self.scans_issued, timeout.as_millis());
        self.pending = Some(PendingScan {
            task,
            continuation: Box::new(continuation),
        });
        Ok(())
    }

    pub fn is_scan_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Runs the continuation of a finished scan, if any. Never blocks.
    ///
    /// Returns the number of continuations invoked.
    pub fn dispatch_completions(&mut self) -> usize {
        let outcome = match self.pending.as_mut() {
            Some(pending) => pending.task.try_complete(),
            None => None,
        };
        match outcome {
            Some(outcome) => {
                self.complete(outcome);
                1
            }
            None => 0,
        }
    }

    /// Blocks until an outstanding scan finishes and runs its continuation.
    ///
    /// Returns `false` if no scan was outstanding.
    pub fn wait_for_scan(&mut self) -> bool {
        let outcome = match self.pending.as_mut() {
            Some(pending) => pending.task.wait(),
            None => return false,
        };
        self.complete(outcome);
        true
    }

    /// Waits for an outstanding scan, then releases the device.
    /// Closing twice is a no-op.
    pub fn close(&mut self) {
        if self.state == SessionState::Destroyed {
            return;
        }
        self.wait_for_scan();
        self.handle.destroy();
        self.state = SessionState::Destroyed;
        debug!("Session closed");
    }

    fn complete(&mut self, outcome: ScanOutcome) {
        if let Some(PendingScan { task, continuation }) = self.pending.take() {
            drop(task);
            continuation(outcome);
        }
    }

    fn ensure_open(&self) -> Result<()> {
        match self.state {
            SessionState::Destroyed => Err(SweepError::Closed),
            _ => Ok(()),
        }
    }

    fn command<T>(
        &mut self,
        name: &str,
        op: impl FnOnce(&mut DeviceAccess) -> Result<T>,
    ) -> Result<T> {
        self.ensure_open()?;
        if self.pending.is_some() {
            debug!("{} deferred until the outstanding scan completes", name);
            self.wait_for_scan();
        }
        let mut access = self.handle.lock();
        op(&mut access)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.state == SessionState::Destroyed {
            return;
        }
        match self.pending.take() {
            // the worker holds the last reference and releases the device
            // when its read ends
            Some(PendingScan { task, .. }) => {
                warn!("Session dropped with a scan in flight, its continuation is discarded");
                task.detach();
            }
            None => self.handle.destroy(),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("handle", &self.handle)
            .field("state", &self.state)
            .field("scan_pending", &self.pending.is_some())
            .finish()
    }
}
