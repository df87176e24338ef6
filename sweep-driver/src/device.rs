//! Boundary with the driver library.
//!
//! A [`Connector`] opens devices, a [`Device`] is one opened native resource.
//! Every call reports failure through a [`DriverError`]. The serial
//! implementation lives in [`crate::serial_device`]; the `mock` feature adds a
//! scriptable in-memory one.

use crate::error::DriverError;
use std::time::Duration;

/// A revolution as returned by the driver, before it is copied into a
/// [`sweep_data::ScanFrame`].
pub trait RawScan {
    fn sample_count(&self) -> usize;
    /// Angle of sample `index` in degrees.
    fn angle(&self, index: usize) -> f64;
    fn distance(&self, index: usize) -> f64;
}

/// One opened native device.
///
/// Implementations are not expected to guard against concurrent use;
/// [`crate::DeviceHandle`] serializes every call.
pub trait Device: Send {
    fn start_scanning(&mut self) -> Result<(), DriverError>;
    fn stop_scanning(&mut self) -> Result<(), DriverError>;
    /// Blocks until one full revolution is collected or `timeout` elapses.
    fn get_scan(&mut self, timeout: Duration) -> Result<Box<dyn RawScan + Send>, DriverError>;
    fn get_motor_speed(&mut self) -> Result<i32, DriverError>;
    fn set_motor_speed(&mut self, hz: i32) -> Result<(), DriverError>;
    fn get_sample_rate(&mut self) -> Result<i32, DriverError>;
    fn reset(&mut self) -> Result<(), DriverError>;
    /// Releases the native resource. Called exactly once.
    fn destruct(&mut self);
}

pub trait Connector {
    /// Opens a device with auto-detected parameters.
    fn construct_simple(&self) -> Result<Box<dyn Device>, DriverError>;
    fn construct(
        &self,
        port: &str,
        baudrate: u32,
        timeout: Duration,
    ) -> Result<Box<dyn Device>, DriverError>;
}
