//! The relational store as seen by the scheduler and dispatchers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::IndexerError;
use crate::types::Block;

/// What a single [`BlockStore::insert_block`] call wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertOutcome {
    pub height: u64,
    /// `false` when the height was already indexed; nothing else is written then.
    pub block_inserted: bool,
    pub transactions_inserted: usize,
    /// Transactions that conflicted with an existing row. Their logs are skipped.
    pub transactions_skipped: usize,
    pub logs_inserted: usize,
    pub logs_skipped: usize,
}

impl InsertOutcome {
    /// Outcome of inserting a height that is already present.
    pub fn already_indexed(height: u64) -> Self {
        Self {
            height,
            ..Default::default()
        }
    }

    pub fn is_already_indexed(&self) -> bool {
        !self.block_inserted
    }
}

/// Transactional block writer plus the read queries the producers need.
#[async_trait]
pub trait BlockStore: Send + Sync {
    /// Write the block, its transactions and their logs as one unit.
    ///
    /// Re-inserting an existing height is a successful no-op. Any other
    /// failure rolls back everything written by this call.
    async fn insert_block(&self, block: &Block) -> Result<InsertOutcome, IndexerError>;

    /// Heights in `[min, max]` with no block row, highest first, at most `limit`.
    async fn missing_heights(&self, min: u64, max: u64, limit: u64) -> Result<Vec<u64>, IndexerError>;

    /// Highest indexed height, if any.
    async fn max_height(&self) -> Result<Option<u64>, IndexerError>;

    /// Highest committed durable-log sequence, if any.
    async fn max_sequence(&self) -> Result<Option<u64>, IndexerError>;
}
