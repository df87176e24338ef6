#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Serial port probed first when auto-detecting.
pub const DEFAULT_PORT: &str = "/dev/ttyUSB0";
pub const DEFAULT_BAUD_RATE: u32 = 115_200;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Explicit serial connection parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PortConfig {
    /// Serial port name such as `/dev/ttyUSB0` or `COM3`.
    pub port: String,
    pub baudrate: u32,
    /// Read timeout for command/response exchanges.
    #[cfg_attr(feature = "serde", serde(with = "millis"))]
    pub timeout: Duration,
}

impl PortConfig {
    pub fn new(port: impl Into<String>, baudrate: u32, timeout: Duration) -> PortConfig {
        PortConfig {
            port: port.into(),
            baudrate,
            timeout,
        }
    }
}

impl Default for PortConfig {
    fn default() -> PortConfig {
        PortConfig::new(DEFAULT_PORT, DEFAULT_BAUD_RATE, DEFAULT_TIMEOUT)
    }
}

/// How a device connection is established.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ConnectionMode {
    /// Let the driver locate the device with its default parameters.
    #[default]
    AutoDetect,
    Explicit(PortConfig),
}

impl From<PortConfig> for ConnectionMode {
    fn from(config: PortConfig) -> Self {
        ConnectionMode::Explicit(config)
    }
}

#[cfg(feature = "serde")]
mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub(super) fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
