#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One angle/distance measurement reported by the sensor.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ScanSample {
    /// Azimuth in degrees, nominally in `[0, 360)`.
    pub angle: f64,
    /// Distance to the target in sensor units (centimetres on the Sweep).
    pub distance: f64,
}

impl ScanSample {
    pub fn new(angle: f64, distance: f64) -> ScanSample {
        ScanSample { angle, distance }
    }
}
