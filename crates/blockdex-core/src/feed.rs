//! Durable event log collaborator (log-replay mode).

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::IndexerError;

/// One message delivered by the durable log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Stream-assigned, strictly increasing.
    pub sequence: u64,
    /// Opaque encoded block.
    pub payload: Vec<u8>,
}

/// A replayable stream of encoded blocks.
#[async_trait]
pub trait LogFeed: Send + Sync {
    /// Start delivering messages with `sequence >= start_sequence`, in order.
    ///
    /// The channel closes when the feed has nothing more to deliver.
    async fn subscribe(&self, start_sequence: u64) -> Result<mpsc::Receiver<Delivery>, IndexerError>;
}
