//! The polling-mode consumer loop.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use blockdex_core::error::IndexerError;
use blockdex_core::queue::PriorityQueue;
use blockdex_core::source::BlockSource;
use blockdex_core::store::{BlockStore, InsertOutcome};

/// What happened to one dispatched height (or durable-log delivery).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DispatchEvent {
    /// The block was written.
    Indexed { height: u64, outcome: InsertOutcome },
    /// The height was already stored; nothing was written.
    AlreadyIndexed { height: u64 },
    /// Fetch or insert failed. A later gap scan picks the height up again.
    Dropped { height: u64, reason: String },
    /// A durable-log delivery that could not be decoded into a block.
    Undecodable { sequence: u64, reason: String },
}

impl DispatchEvent {
    /// The height this event reports as present in the store, if any.
    pub fn stored_height(&self) -> Option<u64> {
        match self {
            Self::Indexed { height, .. } | Self::AlreadyIndexed { height } => Some(*height),
            Self::Dropped { .. } | Self::Undecodable { .. } => None,
        }
    }
}

/// Result of one [`Dispatcher::dispatch_once`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchStep {
    /// The queue was empty.
    Idle,
    Dispatched(DispatchEvent),
}

/// Pops the freshest height, fetches the block and writes it.
///
/// Heights are handled one at a time, so blocks commit in pop order.
pub struct Dispatcher {
    queue: Arc<PriorityQueue>,
    source: Arc<dyn BlockSource>,
    store: Arc<dyn BlockStore>,
    backoff: Duration,
    events: Option<UnboundedSender<DispatchEvent>>,
}

impl Dispatcher {
    pub fn new(queue: Arc<PriorityQueue>, source: Arc<dyn BlockSource>, store: Arc<dyn BlockStore>) -> Self {
        Self {
            queue,
            source,
            store,
            backoff: Duration::from_millis(100),
            events: None,
        }
    }

    /// Sleep between polls of an empty queue.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Report every dispatched height on `events`.
    pub fn with_events(mut self, events: UnboundedSender<DispatchEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Pop at most one height and dispatch it. Never blocks on the queue.
    pub async fn dispatch_once(&self) -> DispatchStep {
        match self.queue.pop() {
            Some(item) => DispatchStep::Dispatched(self.dispatch_height(item.height).await),
            None => DispatchStep::Idle,
        }
    }

    /// Fetch and store one height. Failures are logged and reported, not returned.
    pub async fn dispatch_height(&self, height: u64) -> DispatchEvent {
        let block = match self.source.fetch_block(height).await {
            Ok(block) => block,
            Err(e) => {
                warn!(height, error = %e, "fetch failed, dropping height");
                return DispatchEvent::Dropped {
                    height,
                    reason: e.to_string(),
                };
            }
        };

        match self.store.insert_block(&block).await {
            Ok(outcome) if outcome.is_already_indexed() => {
                debug!(height, "already indexed");
                DispatchEvent::AlreadyIndexed { height }
            }
            Ok(outcome) => {
                debug!(
                    height,
                    transactions = outcome.transactions_inserted,
                    logs = outcome.logs_inserted,
                    "indexed block"
                );
                DispatchEvent::Indexed { height, outcome }
            }
            Err(e) => {
                warn!(height, error = %e, "insert failed, dropping height");
                DispatchEvent::Dropped {
                    height,
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Dispatch until the event receiver goes away.
    ///
    /// Without an event channel this runs until the task is cancelled.
    pub async fn run(self) -> Result<(), IndexerError> {
        loop {
            match self.dispatch_once().await {
                DispatchStep::Idle => tokio::time::sleep(self.backoff).await,
                DispatchStep::Dispatched(event) => {
                    if let Some(events) = &self.events {
                        if events.send(event).is_err() {
                            debug!("event receiver closed, stopping dispatcher");
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use blockdex_core::types::Block;
    use parking_lot::Mutex;
    use std::collections::BTreeSet;

    /// Serves empty blocks except for the heights listed as failing.
    struct Source {
        failing: BTreeSet<u64>,
    }

    #[async_trait]
    impl BlockSource for Source {
        async fn fetch_block(&self, height: u64) -> Result<Block, IndexerError> {
            if self.failing.contains(&height) {
                return Err(IndexerError::Rpc(format!("timeout fetching #{height}")));
            }
            Ok(Block::empty(1, height))
        }
    }

    #[derive(Default)]
    struct Store {
        heights: Mutex<Vec<u64>>,
    }

    #[async_trait]
    impl BlockStore for Store {
        async fn insert_block(&self, block: &Block) -> Result<InsertOutcome, IndexerError> {
            let mut heights = self.heights.lock();
            if heights.contains(&block.height) {
                return Ok(InsertOutcome::already_indexed(block.height));
            }
            heights.push(block.height);
            Ok(InsertOutcome {
                height: block.height,
                block_inserted: true,
                ..Default::default()
            })
        }

        async fn missing_heights(&self, _min: u64, _max: u64, _limit: u64) -> Result<Vec<u64>, IndexerError> {
            Ok(Vec::new())
        }

        async fn max_height(&self) -> Result<Option<u64>, IndexerError> {
            Ok(self.heights.lock().iter().max().copied())
        }

        async fn max_sequence(&self) -> Result<Option<u64>, IndexerError> {
            Ok(None)
        }
    }

    fn dispatcher(failing: &[u64]) -> (Dispatcher, Arc<PriorityQueue>, Arc<Store>) {
        let queue = Arc::new(PriorityQueue::new());
        let store = Arc::new(Store::default());
        let source = Arc::new(Source {
            failing: failing.iter().copied().collect(),
        });
        let d = Dispatcher::new(queue.clone(), source, store.clone()).with_backoff(Duration::from_millis(1));
        (d, queue, store)
    }

    #[tokio::test]
    async fn empty_queue_is_idle() {
        let (d, _, _) = dispatcher(&[]);
        assert_eq!(d.dispatch_once().await, DispatchStep::Idle);
    }

    #[tokio::test]
    async fn dispatches_freshest_first() {
        let (d, queue, store) = dispatcher(&[]);
        for h in [3, 9, 5] {
            queue.push_height(h);
        }
        while d.dispatch_once().await != DispatchStep::Idle {}
        assert_eq!(*store.heights.lock(), vec![9, 5, 3]);
    }

    #[tokio::test]
    async fn duplicate_heights_are_already_indexed() {
        let (d, queue, _) = dispatcher(&[]);
        queue.push_height(4);
        queue.push_height(4);
        assert!(matches!(d.dispatch_once().await, DispatchStep::Dispatched(DispatchEvent::Indexed { height: 4, .. })));
        assert_eq!(
            d.dispatch_once().await,
            DispatchStep::Dispatched(DispatchEvent::AlreadyIndexed { height: 4 })
        );
    }

    #[tokio::test]
    async fn fetch_failure_drops_without_requeue() {
        let (d, queue, store) = dispatcher(&[7]);
        queue.push_height(7);
        let step = d.dispatch_once().await;
        assert!(matches!(step, DispatchStep::Dispatched(DispatchEvent::Dropped { height: 7, .. })));
        assert!(queue.is_empty());
        assert!(store.heights.lock().is_empty());
    }

    #[tokio::test]
    async fn run_reports_events_and_stops_when_receiver_drops() {
        let (d, queue, _) = dispatcher(&[2]);
        for h in 1..=3 {
            queue.push_height(h);
        }
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let handle = tokio::spawn(d.with_events(tx).run());

        let mut stored = Vec::new();
        for _ in 0..3 {
            if let Some(h) = rx.recv().await.unwrap().stored_height() {
                stored.push(h);
            }
        }
        assert_eq!(stored, vec![3, 1]);

        drop(rx);
        queue.push_height(10);
        handle.await.unwrap().unwrap();
    }
}
