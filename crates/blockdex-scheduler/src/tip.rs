//! Chain-head follower.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error};

use blockdex_core::error::IndexerError;
use blockdex_core::queue::PriorityQueue;
use blockdex_core::source::NodeStatus;

/// Polls the node for its tip and enqueues every height it has not seen yet.
///
/// Heights between two polls are enqueued one by one, so a slow poll never
/// skips a height.
pub struct TipFollower {
    status: Arc<dyn NodeStatus>,
    queue: Arc<PriorityQueue>,
    previous: u64,
    interval: Duration,
}

impl TipFollower {
    /// `start_height` is the tip observed at startup; it is not enqueued.
    pub fn new(status: Arc<dyn NodeStatus>, queue: Arc<PriorityQueue>, start_height: u64, interval: Duration) -> Self {
        Self {
            status,
            queue,
            previous: start_height,
            interval,
        }
    }

    /// The highest tip observed so far.
    pub fn previous_height(&self) -> u64 {
        self.previous
    }

    /// Query the tip once and enqueue `(previous, current]` in ascending order.
    ///
    /// A tip lower than the previous one is an error: the node can no longer
    /// be trusted to report the chain head.
    pub async fn poll_once(&mut self) -> Result<Vec<u64>, IndexerError> {
        let current = self.status.current_height().await?;
        if current < self.previous {
            return Err(IndexerError::TipRegressed {
                previous: self.previous,
                current,
            });
        }

        let enqueued: Vec<u64> = (self.previous + 1..=current).collect();
        for &height in &enqueued {
            if height < current {
                debug!(height, "enqueued skipped block");
            } else {
                debug!(height, "enqueued current block");
            }
            self.queue.push_height(height);
        }
        self.previous = current;
        Ok(enqueued)
    }

    /// Poll forever. Returns only on the first failed poll.
    pub async fn run(mut self) -> Result<(), IndexerError> {
        loop {
            if let Err(e) = self.poll_once().await {
                error!(previous = self.previous, error = %e, "tip follower stopped");
                return Err(e);
            }
            tokio::time::sleep(self.interval).await;
        }
    }
}
