use std::io;
use thiserror::Error;

/// Category of a failure reported by the driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriverErrorKind {
    /// No complete answer arrived within the requested window.
    Timeout,
    /// The device answered and refused the command.
    Rejected,
    /// The serial link itself failed, or the device could not be opened.
    Transport,
}

/// Error handle produced by a driver call.
///
/// It is consumed as soon as it is converted into a [`SweepError`], so no
/// driver error outlives the call that produced it.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct DriverError {
    kind: DriverErrorKind,
    message: String,
}

impl DriverError {
    pub fn new(kind: DriverErrorKind, message: impl Into<String>) -> DriverError {
        DriverError {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> DriverError {
        DriverError::new(DriverErrorKind::Timeout, message)
    }

    pub fn rejected(message: impl Into<String>) -> DriverError {
        DriverError::new(DriverErrorKind::Rejected, message)
    }

    pub fn transport(message: impl Into<String>) -> DriverError {
        DriverError::new(DriverErrorKind::Transport, message)
    }

    pub fn kind(&self) -> DriverErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    fn into_message(self) -> String {
        self.message
    }
}

impl From<io::Error> for DriverError {
    fn from(err: io::Error) -> Self {
        DriverError::transport(err.to_string())
    }
}

impl From<serialport::Error> for DriverError {
    fn from(err: serialport::Error) -> Self {
        DriverError::transport(err.to_string())
    }
}

/// Errors surfaced to users of a [`crate::Session`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SweepError {
    /// The device could not be opened or identified.
    #[error("device construction failed: {0}")]
    DeviceConstruction(String),
    /// A command was rejected by the device or the transport.
    #[error("{0}")]
    Operation(String),
    /// No full revolution was collected within the requested window.
    #[error("scan timed out: {0}")]
    ScanTimeout(String),
    /// The caller supplied an unusable argument; the device was not touched.
    #[error("invalid argument: {0}")]
    Argument(String),
    #[error("scan already in progress")]
    ScanInProgress,
    #[error("device has been destroyed")]
    Destroyed,
    #[error("session is closed")]
    Closed,
}

impl SweepError {
    pub(crate) fn construction(err: DriverError) -> SweepError {
        SweepError::DeviceConstruction(err.into_message())
    }

    pub(crate) fn argument(message: impl Into<String>) -> SweepError {
        SweepError::Argument(message.into())
    }

    /// Human-readable message without the category prefix.
    pub fn message(&self) -> String {
        match self {
            SweepError::DeviceConstruction(m)
            | SweepError::Operation(m)
            | SweepError::ScanTimeout(m)
            | SweepError::Argument(m) => m.clone(),
            other => other.to_string(),
        }
    }
}

impl From<DriverError> for SweepError {
    fn from(err: DriverError) -> Self {
        match err.kind() {
            DriverErrorKind::Timeout => SweepError::ScanTimeout(err.into_message()),
            DriverErrorKind::Rejected | DriverErrorKind::Transport => {
                SweepError::Operation(err.into_message())
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, SweepError>;
