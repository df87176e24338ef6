//! # Sweep Driver
//!
//! Session-level access to a Sweep scanning rangefinder: open the device,
//! spin it up or down, tune the motor, and collect full revolutions without
//! blocking the calling thread.
//!
//! A [`Session`] owns one device. Commands are synchronous. Scans run on a
//! background thread and report to a continuation that the session invokes on
//! its own thread. A per-device exclusion lock keeps commands and scan reads
//! from interleaving on the serial link.

mod constants;
pub mod device;
mod error;
mod handle;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
mod numeric;
mod packet;
mod scan;
mod scan_task;
mod serial;
pub mod serial_device;
mod session;
mod time;

pub use crate::device::{Connector, Device, RawScan};
pub use crate::error::{DriverError, DriverErrorKind, Result, SweepError};
pub use crate::handle::{DeviceAccess, DeviceHandle};
pub use crate::serial_device::{SerialConnector, SerialDevice};
pub use crate::session::{Session, SessionState};
pub use sweep_data::{ConnectionMode, PortConfig, ScanFrame, ScanSample};
