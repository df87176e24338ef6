pub mod config;
pub mod frame;
pub mod sample;

pub use config::{ConnectionMode, PortConfig, DEFAULT_BAUD_RATE, DEFAULT_PORT, DEFAULT_TIMEOUT};
pub use frame::ScanFrame;
pub use sample::ScanSample;
