use crate::error::{Result, SweepError};
use crate::handle::DeviceAccess;
use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, error, warn};
use std::thread::JoinHandle;
use std::time::Duration;
use sweep_data::ScanFrame;

pub(crate) type ScanOutcome = Result<ScanFrame>;

/// A blocking scan read running on its own worker thread.
///
/// The worker owns the device access token for the whole read, so nothing
/// else reaches the device until it finishes. The outcome is posted to a
/// single-slot queue that the session drains on the caller's thread.
pub(crate) struct AsyncScanTask {
    id: u64,
    worker: Option<JoinHandle<()>>,
    completion_rx: Receiver<ScanOutcome>,
}

fn read_scan(
    id: u64,
    mut access: DeviceAccess,
    timeout: Duration,
    completion_tx: Sender<ScanOutcome>,
) {
    let outcome = access.get_scan(timeout);
    // release the device before reporting, so the caller can issue its
    // next command as soon as the completion is dispatched
    drop(access);
    match &outcome {
        Ok(frame) => debug!("Scan {} collected {} samples", id, frame.len()),
        Err(e) => debug!("Scan {} failed: {}", id, e),
    }
    if completion_tx.send(outcome).is_err() {
        warn!("Scan {} finished after its session was dropped", id);
    }
}

impl AsyncScanTask {
    pub(crate) fn spawn(id: u64, access: DeviceAccess, timeout: Duration) -> Result<AsyncScanTask> {
        let (completion_tx, completion_rx) = bounded(1);
        let worker = std::thread::Builder::new()
            .name(format!("sweep-scan-{}", id))
            .spawn(move || read_scan(id, access, timeout, completion_tx))
            .map_err(|e| SweepError::Operation(format!("failed to spawn scan worker: {}", e)))?;
        Ok(AsyncScanTask {
            id,
            worker: Some(worker),
            completion_rx,
        })
    }

    /// Returns the outcome if the worker has reported.
    pub(crate) fn try_complete(&mut self) -> Option<ScanOutcome> {
        match self.completion_rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(e) if e.is_empty() => None,
            Err(_) => Some(Err(self.vanished())),
        }
    }

    /// Blocks until the worker reports.
    pub(crate) fn wait(&mut self) -> ScanOutcome {
        self.completion_rx.recv().unwrap_or_else(|_| Err(self.vanished()))
    }

    fn vanished(&self) -> SweepError {
        error!("Scan worker {} exited without reporting", self.id);
        SweepError::Operation("scan worker exited without reporting".to_owned())
    }

    /// Lets the worker run to completion on its own.
    pub(crate) fn detach(mut self) {
        self.worker.take();
    }
}

/// Joins the worker. It has already reported by the time a session drops a
/// completed task, so this does not block.
impl Drop for AsyncScanTask {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Scan worker {} panicked", self.id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::DeviceHandle;
    use crate::mock::{MockCall, MockScan, MockTransport};
    use sweep_data::{ConnectionMode, ScanSample};

    fn handle(transport: &MockTransport) -> DeviceHandle {
        DeviceHandle::construct(transport, ConnectionMode::AutoDetect).unwrap()
    }

    #[test]
    fn test_task_reports_frame() {
        let transport = MockTransport::new();
        let samples = vec![ScanSample::new(1., 10.), ScanSample::new(2., 20.)];
        transport.push_scan(MockScan::Samples(samples.clone()));
        let handle = handle(&transport);

        let mut task = AsyncScanTask::spawn(1, handle.lock(), Duration::from_millis(100)).unwrap();
        assert_eq!(task.wait(), Ok(ScanFrame::new(samples)));
        assert_eq!(
            transport.calls(),
            vec![
                MockCall::ConstructSimple,
                MockCall::GetScan(Duration::from_millis(100))
            ]
        );
    }

    #[test]
    fn test_task_holds_device_until_done() {
        let transport = MockTransport::new();
        transport.push_scan(MockScan::Delayed(Duration::from_millis(50), vec![]));
        let handle = handle(&transport);

        let mut task = AsyncScanTask::spawn(2, handle.lock(), Duration::from_secs(1)).unwrap();
        assert!(handle.try_lock().is_none());
        assert!(task.try_complete().is_none());

        assert_eq!(task.wait(), Ok(ScanFrame::default()));
        assert!(handle.try_lock().is_some());
    }

    #[test]
    fn test_detached_task_destroys_orphaned_device() {
        let transport = MockTransport::new();
        transport.push_scan(MockScan::Delayed(Duration::from_millis(30), vec![]));
        let handle = handle(&transport);

        let task = AsyncScanTask::spawn(3, handle.lock(), Duration::from_secs(1)).unwrap();
        drop(handle);
        task.detach();
        assert_eq!(transport.destruct_count(), 0);

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while !transport.is_destroyed() && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(transport.destruct_count(), 1);
        assert!(!transport.used_after_destroy());
    }
}
