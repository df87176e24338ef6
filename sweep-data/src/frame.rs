use crate::sample::ScanSample;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Struct to hold one revolution of scan data.
///
/// Samples are kept in the order the driver reported them. A frame is never
/// modified after construction; consumers get read-only views or take the
/// samples out with [`ScanFrame::into_samples`].
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ScanFrame {
    samples: Vec<ScanSample>,
}

impl ScanFrame {
    pub fn new(samples: Vec<ScanSample>) -> ScanFrame {
        ScanFrame { samples }
    }

    pub fn samples(&self) -> &[ScanSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ScanSample> {
        self.samples.iter()
    }

    pub fn into_samples(self) -> Vec<ScanSample> {
        self.samples
    }
}

impl FromIterator<ScanSample> for ScanFrame {
    fn from_iter<I: IntoIterator<Item = ScanSample>>(iter: I) -> Self {
        ScanFrame::new(iter.into_iter().collect())
    }
}

impl IntoIterator for ScanFrame {
    type Item = ScanSample;
    type IntoIter = std::vec::IntoIter<ScanSample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.into_iter()
    }
}

impl<'a> IntoIterator for &'a ScanFrame {
    type Item = &'a ScanSample;
    type IntoIter = std::slice::Iter<'a, ScanSample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples() -> Vec<ScanSample> {
        vec![
            ScanSample::new(359.5, 120.),
            ScanSample::new(0.25, 118.),
            ScanSample::new(0.25, 118.),
            ScanSample::new(12.0, 4000.),
        ]
    }

    #[test]
    fn test_frame_preserves_driver_order() {
        let frame = ScanFrame::new(samples());
        assert_eq!(frame.len(), 4);
        assert_eq!(frame.samples(), samples().as_slice());

        // duplicates and wrap-around are passed through untouched
        let angles: Vec<f64> = frame.iter().map(|s| s.angle).collect();
        assert_eq!(angles, vec![359.5, 0.25, 0.25, 12.0]);

        assert_eq!(frame.into_samples(), samples());
    }

    #[test]
    fn test_frame_from_iterator() {
        let frame: ScanFrame = samples().into_iter().collect();
        assert_eq!(frame, ScanFrame::new(samples()));

        let empty: ScanFrame = std::iter::empty().collect();
        assert!(empty.is_empty());
    }
}
