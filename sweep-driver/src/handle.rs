use crate::device::{Connector, Device};
use crate::error::{Result, SweepError};
use crate::scan::FromRawScan;
use log::{debug, trace};
use parking_lot::{ArcMutexGuard, Mutex, RawMutex};
use std::sync::Arc;
use std::time::Duration;
use sweep_data::{ConnectionMode, ScanFrame};

/// The scan timeout is handed to the driver as signed 32-bit milliseconds.
const MAX_TIMEOUT_MS: u128 = i32::MAX as u128;

struct DeviceSlot {
    device: Option<Box<dyn Device>>,
}

impl DeviceSlot {
    fn destroy(&mut self) -> bool {
        match self.device.take() {
            Some(mut device) => {
                device.destruct();
                true
            }
            None => false,
        }
    }
}

impl Drop for DeviceSlot {
    fn drop(&mut self) {
        if self.destroy() {
            debug!("Device released by its last holder");
        }
    }
}

/// Shared owner of one native device.
///
/// Clones refer to the same device. Every operation goes through a
/// [`DeviceAccess`] token, so at most one call reaches the device at a time.
/// The device is destructed once: by [`DeviceHandle::destroy`], or when the
/// last clone and the last token are gone.
#[derive(Clone)]
pub struct DeviceHandle {
    slot: Arc<Mutex<DeviceSlot>>,
    mode: ConnectionMode,
}

impl std::fmt::Debug for DeviceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceHandle")
            .field("mode", &self.mode)
            .field("locked", &self.slot.is_locked())
            .finish()
    }
}

pub(crate) fn validate_mode(mode: &ConnectionMode) -> Result<()> {
    if let ConnectionMode::Explicit(config) = mode {
        if config.port.is_empty() {
            return Err(SweepError::argument("serial port name is empty"));
        }
        if config.baudrate == 0 {
            return Err(SweepError::argument("baud rate must be positive"));
        }
        validate_timeout(config.timeout)?;
    }
    Ok(())
}

pub(crate) fn validate_timeout(timeout: Duration) -> Result<()> {
    if timeout.is_zero() || timeout.as_millis() > MAX_TIMEOUT_MS {
        return Err(SweepError::argument(format!(
            "timeout must be between 1 and {} ms, got {} ms",
            MAX_TIMEOUT_MS,
            timeout.as_millis()
        )));
    }
    Ok(())
}

impl DeviceHandle {
    /// Opens a device. Blocks while the driver probes it.
    pub fn construct(connector: &dyn Connector, mode: ConnectionMode) -> Result<DeviceHandle> {
        validate_mode(&mode)?;
        let device = match &mode {
            ConnectionMode::AutoDetect => connector.construct_simple(),
            ConnectionMode::Explicit(config) => {
                connector.construct(&config.port, config.baudrate, config.timeout)
            }
        }
        .map_err(SweepError::construction)?;
        debug!("Device constructed ({:?})", mode);
        Ok(DeviceHandle {
            slot: Arc::new(Mutex::new(DeviceSlot {
                device: Some(device),
            })),
            mode,
        })
    }

    pub fn mode(&self) -> &ConnectionMode {
        &self.mode
    }

    /// Acquires exclusive access, waiting for any holder to finish.
    pub fn lock(&self) -> DeviceAccess {
        DeviceAccess {
            guard: self.slot.lock_arc(),
        }
    }

    pub fn try_lock(&self) -> Option<DeviceAccess> {
        self.slot
            .try_lock_arc()
            .map(|guard| DeviceAccess { guard })
    }

    /// Waits for the current holder, then destructs the device.
    /// Later calls are no-ops.
    pub(crate) fn destroy(&self) {
        if self.slot.lock().destroy() {
            debug!("Device destroyed");
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.slot.lock().device.is_none()
    }
}

/// Exclusive-access token for a [`DeviceHandle`].
///
/// The token co-owns the device, so it stays alive for as long as the token
/// does even if every handle has been dropped. It can be moved to another
/// thread.
pub struct DeviceAccess {
    guard: ArcMutexGuard<RawMutex, DeviceSlot>,
}

impl DeviceAccess {
    fn device(&mut self) -> Result<&mut Box<dyn Device>> {
        self.guard.device.as_mut().ok_or(SweepError::Destroyed)
    }

    pub fn start_scanning(&mut self) -> Result<()> {
        trace!("start_scanning");
        Ok(self.device()?.start_scanning()?)
    }

    pub fn stop_scanning(&mut self) -> Result<()> {
        trace!("stop_scanning");
        Ok(self.device()?.stop_scanning()?)
    }

    pub fn get_motor_speed(&mut self) -> Result<i32> {
        trace!("get_motor_speed");
        Ok(self.device()?.get_motor_speed()?)
    }

    /// The driver decides which speeds are acceptable.
    pub fn set_motor_speed(&mut self, hz: i32) -> Result<()> {
        trace!("set_motor_speed({})", hz);
        Ok(self.device()?.set_motor_speed(hz)?)
    }

    pub fn get_sample_rate(&mut self) -> Result<i32> {
        trace!("get_sample_rate");
        Ok(self.device()?.get_sample_rate()?)
    }

    pub fn reset(&mut self) -> Result<()> {
        trace!("reset");
        Ok(self.device()?.reset()?)
    }

    /// Blocks for up to `timeout` waiting for one revolution.
    pub fn get_scan(&mut self, timeout: Duration) -> Result<ScanFrame> {
        validate_timeout(timeout)?;
        trace!("get_scan({} ms)", timeout.as_millis());
        let raw = self.device()?.get_scan(timeout)?;
        Ok(ScanFrame::from_raw(raw.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockCall, MockTransport};
    use sweep_data::PortConfig;

    fn explicit(port: &str, baudrate: u32, timeout_ms: u64) -> ConnectionMode {
        PortConfig::new(port, baudrate, Duration::from_millis(timeout_ms)).into()
    }

    #[test]
    fn test_construct_explicit() {
        let transport = MockTransport::new();
        let handle = DeviceHandle::construct(&transport, explicit("/dev/ttyUSB1", 115_200, 500)).unwrap();
        assert!(!handle.is_destroyed());
        assert_eq!(
            transport.calls(),
            vec![MockCall::Construct {
                port: "/dev/ttyUSB1".to_owned(),
                baudrate: 115_200,
                timeout: Duration::from_millis(500),
            }]
        );
    }

    #[test]
    fn test_invalid_arguments_never_reach_the_driver() {
        let transport = MockTransport::new();
        for mode in [
            explicit("", 115_200, 500),
            explicit("/dev/ttyUSB0", 0, 500),
            explicit("/dev/ttyUSB0", 115_200, 0),
        ] {
            let err = DeviceHandle::construct(&transport, mode).unwrap_err();
            assert!(matches!(err, SweepError::Argument(_)));
        }
        assert!(transport.calls().is_empty());

        let handle = DeviceHandle::construct(&transport, ConnectionMode::AutoDetect).unwrap();
        let err = handle.lock().get_scan(Duration::ZERO).unwrap_err();
        assert!(matches!(err, SweepError::Argument(_)));
        assert!(!transport.calls().contains(&MockCall::GetScan(Duration::ZERO)));
    }

    #[test]
    fn test_destroy_exactly_once() {
        let transport = MockTransport::new();
        let handle = DeviceHandle::construct(&transport, ConnectionMode::AutoDetect).unwrap();
        let clone = handle.clone();

        handle.destroy();
        handle.destroy();
        drop(handle);
        drop(clone);

        assert_eq!(transport.destruct_count(), 1);
        assert!(!transport.used_after_destroy());
    }

    #[test]
    fn test_operations_after_destroy() {
        let transport = MockTransport::new();
        let handle = DeviceHandle::construct(&transport, ConnectionMode::AutoDetect).unwrap();
        handle.destroy();
        assert!(handle.is_destroyed());
        assert_eq!(handle.lock().start_scanning(), Err(SweepError::Destroyed));
        assert!(!transport.used_after_destroy());
    }

    #[test]
    fn test_token_keeps_device_alive() {
        let transport = MockTransport::new();
        let handle = DeviceHandle::construct(&transport, ConnectionMode::AutoDetect).unwrap();
        let mut access = handle.lock();
        assert!(handle.try_lock().is_none());
        drop(handle);

        assert_eq!(transport.destruct_count(), 0);
        access.get_motor_speed().unwrap();
        drop(access);
        assert_eq!(transport.destruct_count(), 1);
    }
}
