use std::path::Path;

/// Running byte count of one transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransferProgress {
    /// Sum of the chunk sizes written to disk so far.
    pub bytes_transferred: u64,
    /// Total declared by `Content-Length`, if the server sent one.
    pub total_bytes: Option<u64>,
}

impl TransferProgress {
    pub fn new(total_bytes: Option<u64>) -> Self {
        Self {
            bytes_transferred: 0,
            total_bytes,
        }
    }

    /// Percentage of the declared total, or `None` when the total is unknown.
    ///
    /// An empty body with a declared length of zero counts as complete.
    pub fn percentage(&self) -> Option<f64> {
        self.total_bytes.map(|total| {
            if total == 0 {
                100.0
            } else {
                self.bytes_transferred as f64 * 100.0 / total as f64
            }
        })
    }

    pub(crate) fn advance(&mut self, chunk_len: usize) {
        self.bytes_transferred += chunk_len as u64;
    }
}

/// Receives progress events from the downloader.
///
/// Methods return nothing on purpose: a presentation failure must never abort
/// a transfer, so implementations swallow or log their own errors.
pub trait ProgressObserver {
    fn on_start(&mut self, _url: &str, _total_bytes: Option<u64>, _path: &Path) {}

    fn on_progress(&mut self, progress: &TransferProgress);

    fn on_finish(&mut self, _progress: &TransferProgress) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_progress(&mut self, _progress: &TransferProgress) {}
}

impl<F> ProgressObserver for F
where
    F: FnMut(&TransferProgress),
{
    fn on_progress(&mut self, progress: &TransferProgress) {
        self(progress)
    }
}

/// Counts chunks and fires once every `interval` chunks.
#[derive(Debug, Clone)]
pub struct ReportThrottle {
    interval: u32,
    counter: u32,
}

impl ReportThrottle {
    pub fn new(interval: u32) -> Self {
        Self {
            interval: interval.max(1),
            counter: 0,
        }
    }

    /// Registers one chunk; returns `true` when a report is due.
    pub fn tick(&mut self) -> bool {
        self.counter += 1;
        if self.counter >= self.interval {
            self.counter = 0;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage_known_total() {
        let mut progress = TransferProgress::new(Some(200));
        progress.advance(50);
        assert_eq!(progress.percentage(), Some(25.0));
        progress.advance(150);
        assert_eq!(progress.percentage(), Some(100.0));
    }

    #[test]
    fn test_percentage_unknown_total() {
        let mut progress = TransferProgress::new(None);
        progress.advance(8192);
        assert_eq!(progress.bytes_transferred, 8192);
        assert_eq!(progress.percentage(), None);
    }

    #[test]
    fn test_percentage_empty_body() {
        let progress = TransferProgress::new(Some(0));
        assert_eq!(progress.percentage(), Some(100.0));
    }

    #[test]
    fn test_throttle_fires_every_interval() {
        let mut throttle = ReportThrottle::new(3);
        let fired: Vec<bool> = (0..7).map(|_| throttle.tick()).collect();
        assert_eq!(fired, vec![false, false, true, false, false, true, false]);
    }

    #[test]
    fn test_throttle_zero_interval_reports_every_chunk() {
        let mut throttle = ReportThrottle::new(0);
        assert!(throttle.tick());
        assert!(throttle.tick());
    }

    #[test]
    fn test_closure_observer() {
        let mut seen = Vec::new();
        {
            let mut observer = |p: &TransferProgress| seen.push(p.bytes_transferred);
            let mut progress = TransferProgress::new(None);
            progress.advance(10);
            observer.on_progress(&progress);
            progress.advance(5);
            observer.on_progress(&progress);
        }
        assert_eq!(seen, vec![10, 15]);
    }
}
