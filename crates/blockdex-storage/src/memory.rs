//! In-memory storage backend.
//!
//! Mirrors the relational layout and its uniqueness rules in RAM. Each
//! `insert_block` call stages the rows of its own block and applies them
//! only when every row went through, so a failed insert leaves no partial
//! state behind. Useful for tests and dry runs.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;

use blockdex_core::error::IndexerError;
use blockdex_core::numeric::NumericPolicy;
use blockdex_core::store::{BlockStore, InsertOutcome};
use blockdex_core::types::Block;

use crate::rows::{map_block, BlockRow, LogRow, TransactionRow};

/// A transaction row together with its generated id.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredTransaction {
    pub id: i64,
    pub row: TransactionRow,
}

/// An event row together with the id of its parent transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEvent {
    pub transaction: i64,
    pub row: LogRow,
}

#[derive(Debug, Default)]
struct Tables {
    blocks: BTreeMap<u64, BlockRow>,
    transactions: Vec<StoredTransaction>,
    transaction_keys: HashSet<(i64, Vec<u8>)>,
    events: Vec<StoredEvent>,
    event_keys: HashSet<(i64, i32)>,
}

/// Rows of one block, held back until the whole block went through.
#[derive(Default)]
struct Staged {
    transactions: Vec<StoredTransaction>,
    transaction_keys: HashSet<(i64, Vec<u8>)>,
    events: Vec<StoredEvent>,
    event_keys: HashSet<(i64, i32)>,
}

/// In-memory block store.
///
/// All data is lost when the process exits.
#[derive(Default)]
pub struct MemoryStore {
    policy: NumericPolicy,
    tables: Mutex<Tables>,
    failures: Mutex<HashSet<(u64, usize)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: NumericPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Make the transaction at `position` of block `height` fail on insert.
    ///
    /// The failure fires once; a later insert of the same block succeeds.
    pub fn inject_transaction_failure(&self, height: u64, position: usize) {
        self.failures.lock().insert((height, position));
    }

    pub fn block(&self, height: u64) -> Option<BlockRow> {
        self.tables.lock().blocks.get(&height).cloned()
    }

    /// Indexed heights, ascending.
    pub fn heights(&self) -> Vec<u64> {
        self.tables.lock().blocks.keys().copied().collect()
    }

    pub fn block_count(&self) -> usize {
        self.tables.lock().blocks.len()
    }

    pub fn transaction_count(&self) -> usize {
        self.tables.lock().transactions.len()
    }

    pub fn event_count(&self) -> usize {
        self.tables.lock().events.len()
    }

    /// Transactions stored for the block at `height`, in insert order.
    pub fn transactions_for(&self, height: u64) -> Vec<StoredTransaction> {
        self.tables
            .lock()
            .transactions
            .iter()
            .filter(|t| t.row.block == height as i64)
            .cloned()
            .collect()
    }

    /// Every stored event, in insert order.
    pub fn events(&self) -> Vec<StoredEvent> {
        self.tables.lock().events.clone()
    }

    fn take_failure(&self, height: u64, position: usize) -> bool {
        self.failures.lock().remove(&(height, position))
    }
}

#[async_trait]
impl BlockStore for MemoryStore {
    async fn insert_block(&self, block: &Block) -> Result<InsertOutcome, IndexerError> {
        let rows = map_block(block, self.policy)?;
        let height = rows.height();

        let mut tables = self.tables.lock();
        if tables.blocks.contains_key(&height) {
            return Ok(InsertOutcome::already_indexed(height));
        }

        let mut outcome = InsertOutcome {
            height,
            block_inserted: true,
            ..Default::default()
        };
        let mut staged = Staged::default();
        let mut next_id = tables.transactions.len() as i64 + 1;

        for (position, tx) in rows.transactions.into_iter().enumerate() {
            if self.take_failure(height, position) {
                tracing::warn!(height, position, "injected transaction failure, rolling back");
                return Err(IndexerError::Storage(format!(
                    "insert transaction {position} of block {height}: injected failure"
                )));
            }

            let key = (tx.row.block, tx.row.hash.clone());
            if tables.transaction_keys.contains(&key) || !staged.transaction_keys.insert(key) {
                outcome.transactions_skipped += 1;
                outcome.logs_skipped += tx.logs.len();
                continue;
            }
            let id = next_id;
            next_id += 1;
            staged.transactions.push(StoredTransaction { id, row: tx.row });
            outcome.transactions_inserted += 1;

            for log in tx.logs {
                if staged.event_keys.insert((id, log.index)) {
                    staged.events.push(StoredEvent {
                        transaction: id,
                        row: log,
                    });
                    outcome.logs_inserted += 1;
                } else {
                    outcome.logs_skipped += 1;
                }
            }
        }

        tables.blocks.insert(height, rows.block);
        tables.transaction_keys.extend(staged.transaction_keys);
        tables.transactions.extend(staged.transactions);
        tables.event_keys.extend(staged.event_keys);
        tables.events.extend(staged.events);
        Ok(outcome)
    }

    async fn missing_heights(&self, min: u64, max: u64, limit: u64) -> Result<Vec<u64>, IndexerError> {
        if min > max {
            return Ok(Vec::new());
        }
        let tables = self.tables.lock();
        Ok((min..=max)
            .rev()
            .filter(|h| !tables.blocks.contains_key(h))
            .take(limit as usize)
            .collect())
    }

    async fn max_height(&self) -> Result<Option<u64>, IndexerError> {
        Ok(self.tables.lock().blocks.keys().next_back().copied())
    }

    async fn max_sequence(&self) -> Result<Option<u64>, IndexerError> {
        Ok(self
            .tables
            .lock()
            .blocks
            .values()
            .filter_map(|b| b.sequence)
            .max()
            .map(|s| s as u64))
    }
}
