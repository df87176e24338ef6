use crate::device::RawScan;
use sweep_data::{ScanFrame, ScanSample};

pub(crate) trait FromRawScan {
    fn from_raw(raw: &dyn RawScan) -> Self;
}

impl FromRawScan for ScanFrame {
    /// Copies every sample in driver order. No sorting, no deduplication.
    fn from_raw(raw: &dyn RawScan) -> ScanFrame {
        (0..raw.sample_count())
            .map(|i| ScanSample::new(raw.angle(i), raw.distance(i)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Columns {
        angles: Vec<f64>,
        distances: Vec<f64>,
    }

    impl RawScan for Columns {
        fn sample_count(&self) -> usize {
            self.angles.len()
        }

        fn angle(&self, index: usize) -> f64 {
            self.angles[index]
        }

        fn distance(&self, index: usize) -> f64 {
            self.distances[index]
        }
    }

    #[test]
    fn test_from_raw_keeps_order_and_duplicates() {
        let raw = Columns {
            angles: vec![10., 5., 5., 359.],
            distances: vec![100., 200., 200., 50.],
        };
        let frame = ScanFrame::from_raw(&raw);
        assert_eq!(
            frame.samples(),
            &[
                ScanSample::new(10., 100.),
                ScanSample::new(5., 200.),
                ScanSample::new(5., 200.),
                ScanSample::new(359., 50.),
            ]
        );
    }

    #[test]
    fn test_from_raw_empty() {
        let raw = Columns {
            angles: vec![],
            distances: vec![],
        };
        assert!(ScanFrame::from_raw(&raw).is_empty());
    }
}
