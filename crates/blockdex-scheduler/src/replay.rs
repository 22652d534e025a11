//! Log-replay dispatcher.
//!
//! The resume point is derived from the store, not kept in a side file:
//! a restart resumes right after the highest sequence that was committed
//! together with its block.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use blockdex_core::error::IndexerError;
use blockdex_core::feed::{Delivery, LogFeed};
use blockdex_core::store::BlockStore;
use blockdex_core::types::Block;

use crate::dispatcher::DispatchEvent;

/// First sequence to request: one past the highest committed sequence, or
/// `start_sequence` when nothing has been committed from the log yet.
pub async fn resume_point(store: &dyn BlockStore, start_sequence: u64) -> Result<u64, IndexerError> {
    Ok(match store.max_sequence().await? {
        Some(committed) => committed + 1,
        None => start_sequence,
    })
}

/// Totals of one replay run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplayReport {
    pub resumed_at: u64,
    pub indexed: u64,
    pub already_indexed: u64,
    pub dropped: u64,
    /// Deliveries at or below the last committed sequence.
    pub redelivered: u64,
    pub last_sequence: Option<u64>,
}

/// Writes pre-decoded blocks from a durable log, tagging each with its
/// delivery sequence.
pub struct ReplayDispatcher {
    feed: Arc<dyn LogFeed>,
    store: Arc<dyn BlockStore>,
    start_sequence: u64,
    events: Option<UnboundedSender<DispatchEvent>>,
}

impl ReplayDispatcher {
    pub fn new(feed: Arc<dyn LogFeed>, store: Arc<dyn BlockStore>) -> Self {
        Self {
            feed,
            store,
            start_sequence: 1,
            events: None,
        }
    }

    /// Sequence to start from when the store holds no replayed block.
    pub fn with_start_sequence(mut self, sequence: u64) -> Self {
        self.start_sequence = sequence;
        self
    }

    pub fn with_events(mut self, events: UnboundedSender<DispatchEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Replay until the feed closes.
    pub async fn run(&self) -> Result<ReplayReport, IndexerError> {
        let resumed_at = resume_point(self.store.as_ref(), self.start_sequence).await?;
        info!(sequence = resumed_at, "resuming durable log");

        let mut rx = self.feed.subscribe(resumed_at).await?;
        let mut report = ReplayReport {
            resumed_at,
            ..Default::default()
        };
        let mut committed = resumed_at.checked_sub(1);

        while let Some(delivery) = rx.recv().await {
            let sequence = delivery.sequence;
            if committed.is_some_and(|c| sequence <= c) {
                debug!(sequence, "ignoring redelivered sequence");
                report.redelivered += 1;
                continue;
            }

            let event = self.handle(delivery).await;
            match &event {
                DispatchEvent::Indexed { .. } => {
                    report.indexed += 1;
                    committed = Some(sequence);
                }
                DispatchEvent::AlreadyIndexed { .. } => {
                    report.already_indexed += 1;
                    committed = Some(sequence);
                }
                DispatchEvent::Dropped { .. } | DispatchEvent::Undecodable { .. } => report.dropped += 1,
            }
            report.last_sequence = Some(sequence);

            if let Some(events) = &self.events {
                if events.send(event).is_err() {
                    debug!("event receiver closed, stopping replay");
                    break;
                }
            }
        }

        info!(
            indexed = report.indexed,
            dropped = report.dropped,
            last_sequence = ?report.last_sequence,
            "durable log closed"
        );
        Ok(report)
    }

    /// Decode one delivery and write it with its sequence attached.
    pub async fn handle(&self, delivery: Delivery) -> DispatchEvent {
        let sequence = delivery.sequence;
        let block = match serde_json::from_slice::<Block>(&delivery.payload) {
            Ok(block) => block.with_sequence(sequence),
            Err(e) => {
                warn!(sequence, error = %e, "cannot decode delivery, dropping");
                return DispatchEvent::Undecodable {
                    sequence,
                    reason: e.to_string(),
                };
            }
        };
        let height = block.height;

        match self.store.insert_block(&block).await {
            Ok(outcome) if outcome.is_already_indexed() => DispatchEvent::AlreadyIndexed { height },
            Ok(outcome) => {
                debug!(height, sequence, "indexed block from log");
                DispatchEvent::Indexed { height, outcome }
            }
            Err(e) => {
                warn!(height, sequence, error = %e, "insert failed, dropping delivery");
                DispatchEvent::Dropped {
                    height,
                    reason: e.to_string(),
                }
            }
        }
    }
}
