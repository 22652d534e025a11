//! Backwards gap scanning in fixed windows.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};

use blockdex_core::error::IndexerError;
use blockdex_core::queue::PriorityQueue;
use blockdex_core::store::BlockStore;

/// Inclusive `(min, max)` windows walking down from `tip`.
///
/// Every window is exactly `size` heights wide. Iteration stops after
/// `max_windows` windows or once a window's lower bound would fall below 0,
/// so heights under the last full window are not scanned.
#[derive(Debug, Clone)]
pub struct ScanWindows {
    next_max: Option<u64>,
    size: u64,
    remaining: u64,
}

impl ScanWindows {
    pub fn new(tip: u64, size: u64, max_windows: u64) -> Self {
        Self {
            next_max: if size == 0 { None } else { Some(tip) },
            size,
            remaining: max_windows,
        }
    }
}

impl Iterator for ScanWindows {
    type Item = (u64, u64);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let max = self.next_max?;
        let Some(min) = max.checked_sub(self.size - 1) else {
            self.next_max = None;
            return None;
        };
        self.remaining -= 1;
        self.next_max = min.checked_sub(1);
        Some((min, max))
    }
}

/// Totals of one gap-scan run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GapScanReport {
    pub windows: u64,
    pub enqueued: u64,
}

/// Enqueues heights below the tip that have no stored block.
pub struct GapScanner {
    store: Arc<dyn BlockStore>,
    queue: Arc<PriorityQueue>,
    window_size: u64,
    max_windows: u64,
    pause: Duration,
}

impl GapScanner {
    pub fn new(store: Arc<dyn BlockStore>, queue: Arc<PriorityQueue>) -> Self {
        Self {
            store,
            queue,
            window_size: 1000,
            max_windows: 10_000,
            pause: Duration::from_millis(100),
        }
    }

    pub fn with_window_size(mut self, size: u64) -> Self {
        self.window_size = size;
        self
    }

    pub fn with_max_windows(mut self, windows: u64) -> Self {
        self.max_windows = windows;
        self
    }

    /// Pause between two windows.
    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    /// Enqueue the missing heights of `[min, max]`, highest first.
    pub async fn scan_window(&self, min: u64, max: u64) -> Result<Vec<u64>, IndexerError> {
        debug!(min, max, "scanning for gaps");
        let missing = self.store.missing_heights(min, max, self.window_size).await?;
        for &height in &missing {
            debug!(height, "enqueued missing block");
            self.queue.push_height(height);
        }
        Ok(missing)
    }

    /// One full pass below `tip`. A store error ends the pass.
    pub async fn run(&self, tip: u64) -> Result<GapScanReport, IndexerError> {
        let mut report = GapScanReport::default();
        for (min, max) in ScanWindows::new(tip, self.window_size, self.max_windows) {
            if report.windows > 0 {
                tokio::time::sleep(self.pause).await;
            }
            report.enqueued += self.scan_window(min, max).await?.len() as u64;
            report.windows += 1;
        }
        info!(tip, windows = report.windows, enqueued = report.enqueued, "gap scan complete");
        Ok(report)
    }
}
