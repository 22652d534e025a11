//! Mapping of the block aggregate onto `block`, `transaction` and `event` rows.
//!
//! All conversion happens before a store transaction is opened, so a
//! strict-mode numeric failure never leaves a transaction half-written.
//! Numeric columns are carried as base-10 text; empty byte payloads and
//! empty identifiers become SQL `NULL`.

use alloy_primitives::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

use blockdex_core::error::IndexerError;
use blockdex_core::numeric::NumericPolicy;
use blockdex_core::types::{Block, Log, NearBlock, Transaction};

const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Columns of the `block` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockRow {
    pub chain: i64,
    /// The block height.
    pub id: i64,
    pub hash: Vec<u8>,
    pub near_hash: Option<Vec<u8>>,
    pub timestamp: DateTime<Utc>,
    pub size: String,
    pub gas_limit: String,
    pub gas_used: String,
    pub parent_hash: Vec<u8>,
    pub transactions_root: Vec<u8>,
    pub state_root: Vec<u8>,
    pub receipts_root: Vec<u8>,
    pub logs_bloom: Option<Vec<u8>>,
    pub miner: Vec<u8>,
    pub author: Option<String>,
    pub sequence: Option<i64>,
}

/// Columns of the `transaction` table, minus the generated `id`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionRow {
    /// Parent block height.
    pub block: i64,
    pub index: i32,
    pub hash: Vec<u8>,
    pub near_hash: Option<Vec<u8>>,
    pub near_receipt_hash: Option<Vec<u8>>,
    pub from: Vec<u8>,
    pub to: Option<Vec<u8>>,
    pub nonce: String,
    pub gas_price: String,
    pub gas_limit: String,
    pub gas_used: String,
    pub value: String,
    pub input: Option<Vec<u8>>,
    pub v: String,
    pub r: String,
    pub s: String,
    pub status: bool,
    pub output: Option<Vec<u8>>,
    pub access_list: serde_json::Value,
    pub max_fee_per_gas: String,
    pub max_priority_fee_per_gas: String,
    pub tx_type: i16,
    pub contract_address: Option<Vec<u8>>,
}

/// Columns of the `event` table, minus the parent transaction id which is
/// only known once the transaction row has been inserted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogRow {
    /// Position within the emitting transaction.
    pub index: i32,
    pub data: Option<Vec<u8>>,
    pub from: Vec<u8>,
    pub topics: Option<Vec<Vec<u8>>>,
}

/// A transaction row with the log rows that hang off it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionRows {
    pub row: TransactionRow,
    pub logs: Vec<LogRow>,
}

/// Every row one block produces, in mandatory insert order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockRows {
    pub block: BlockRow,
    pub transactions: Vec<TransactionRows>,
}

impl BlockRows {
    pub fn height(&self) -> u64 {
        self.block.id as u64
    }
}

/// Map a decoded block onto rows, rendering numeric fields under `policy`.
pub fn map_block(block: &Block, policy: NumericPolicy) -> Result<BlockRows, IndexerError> {
    let (near_hash, author) = match &block.near_metadata {
        Some(NearBlock::ExistingBlock(existing)) => {
            (base58_bytes(&existing.near_hash), non_empty_text(&existing.author))
        }
        Some(NearBlock::SkippedBlock) | None => (None, None),
    };

    let row = BlockRow {
        chain: column(block.chain_id, "block.chain")?,
        id: column(block.height, "block.id")?,
        hash: block.hash.to_vec(),
        near_hash,
        timestamp: whole_seconds(block.timestamp),
        size: block.size.render("block.size", policy)?,
        gas_limit: block.gas_limit.render("block.gas_limit", policy)?,
        gas_used: block.gas_used.render("block.gas_used", policy)?,
        parent_hash: block.parent_hash.to_vec(),
        transactions_root: block.transactions_root.to_vec(),
        state_root: block.state_root.to_vec(),
        receipts_root: block.receipts_root.to_vec(),
        logs_bloom: non_empty(&block.logs_bloom),
        miner: block.miner.to_vec(),
        author,
        sequence: block.sequence.map(|s| column(s, "block.sequence")).transpose()?,
    };

    let transactions = block
        .transactions
        .iter()
        .map(|tx| {
            Ok(TransactionRows {
                row: map_transaction(tx, block.height, policy)?,
                logs: tx
                    .logs
                    .iter()
                    .enumerate()
                    .map(|(i, log)| map_log(log, i))
                    .collect::<Result<Vec<_>, IndexerError>>()?,
            })
        })
        .collect::<Result<Vec<_>, IndexerError>>()?;

    Ok(BlockRows {
        block: row,
        transactions,
    })
}

fn map_transaction(
    tx: &Transaction,
    height: u64,
    policy: NumericPolicy,
) -> Result<TransactionRow, IndexerError> {
    let near = tx.near_metadata.clone().unwrap_or_default();
    let access_list = serde_json::to_value(&tx.access_list)
        .map_err(|e| IndexerError::decode(format!("access list of {}", tx.hash), e))?;

    Ok(TransactionRow {
        block: column(height, "transaction.block")?,
        index: column(tx.transaction_index, "transaction.index")?,
        hash: tx.hash.to_vec(),
        near_hash: base58_bytes(&near.hash),
        near_receipt_hash: base58_bytes(&near.receipt_hash),
        from: tx.from.to_vec(),
        to: tx.to.map(|a| a.to_vec()),
        nonce: tx.nonce.render("transaction.nonce", policy)?,
        gas_price: tx.gas_price.render("transaction.gas_price", policy)?,
        gas_limit: tx.gas_limit.render("transaction.gas_limit", policy)?,
        gas_used: tx.gas_used.to_string(),
        value: tx.value.render("transaction.value", policy)?,
        input: non_empty(&tx.input),
        v: tx.v.to_string(),
        r: tx.r.render("transaction.r", policy)?,
        s: tx.s.render("transaction.s", policy)?,
        status: tx.status,
        output: non_empty(&tx.output),
        access_list,
        max_fee_per_gas: tx.max_fee_per_gas.render("transaction.max_fee_per_gas", policy)?,
        max_priority_fee_per_gas: tx
            .max_priority_fee_per_gas
            .render("transaction.max_priority_fee_per_gas", policy)?,
        tx_type: i16::from(tx.tx_type),
        contract_address: tx.contract_address.map(|a| a.to_vec()),
    })
}

fn map_log(log: &Log, index: usize) -> Result<LogRow, IndexerError> {
    let topics: Vec<Vec<u8>> = log.topics.iter().map(|t| t.to_vec()).collect();
    Ok(LogRow {
        index: column(index, "event.index")?,
        data: non_empty(&log.data),
        from: log.address.to_vec(),
        topics: if topics.is_empty() { None } else { Some(topics) },
    })
}

/// Convert an unsigned domain value into its signed column type.
fn column<S, T>(value: S, field: &str) -> Result<T, IndexerError>
where
    S: Copy + std::fmt::Display,
    T: TryFrom<S>,
{
    T::try_from(value).map_err(|_| IndexerError::decode(field, format!("{value} does not fit the column")))
}

/// Block timestamps are stored with second precision.
fn whole_seconds(nanos: i64) -> DateTime<Utc> {
    Utc.timestamp_nanos(nanos.div_euclid(NANOS_PER_SECOND) * NANOS_PER_SECOND)
}

fn non_empty(bytes: &Bytes) -> Option<Vec<u8>> {
    if bytes.is_empty() {
        None
    } else {
        Some(bytes.to_vec())
    }
}

fn non_empty_text(text: &str) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// NEAR hashes are base58; undecodable text is stored as NULL.
fn base58_bytes(text: &str) -> Option<Vec<u8>> {
    if text.is_empty() {
        return None;
    }
    match bs58::decode(text).into_vec() {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            tracing::debug!(hash = text, error = %e, "ignoring undecodable NEAR hash");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, B256};
    use blockdex_core::numeric::Quantity;
    use blockdex_core::types::{ExistingBlock, NearTransaction};

    fn sample_block() -> Block {
        let mut block = Block::empty(1_313_161_554, 100);
        block.hash = B256::repeat_byte(0xaa);
        block.gas_limit = Quantity::new("0xffffffff");
        block.timestamp = 1_650_000_000_500_000_000;
        block.near_metadata = Some(NearBlock::ExistingBlock(ExistingBlock {
            near_hash: "11111111111111111111111111111111".into(),
            near_parent_hash: String::new(),
            author: "aurora".into(),
        }));
        block.transactions = vec![Transaction {
            hash: B256::repeat_byte(0x01),
            transaction_index: 3,
            from: Address::repeat_byte(0x11),
            value: Quantity::new("123456789012345678901234567890"),
            gas_used: 21_000,
            near_metadata: Some(NearTransaction {
                hash: "not-base58-0OIl".into(),
                receipt_hash: String::new(),
            }),
            logs: vec![
                Log {
                    address: Address::repeat_byte(0x22),
                    topics: vec![Bytes::from(vec![0xde, 0xad])],
                    data: Bytes::new(),
                },
                Log::default(),
            ],
            ..Default::default()
        }];
        block
    }

    #[test]
    fn block_row_renders_quantities_as_decimal() {
        let rows = map_block(&sample_block(), NumericPolicy::Lenient).unwrap();
        assert_eq!(rows.height(), 100);
        assert_eq!(rows.block.gas_limit, "4294967295");
        assert_eq!(rows.block.near_hash, Some(vec![0u8; 32]));
        assert_eq!(rows.block.author.as_deref(), Some("aurora"));
        assert_eq!(rows.block.timestamp.timestamp(), 1_650_000_000);
        assert_eq!(rows.block.timestamp.timestamp_subsec_nanos(), 0);
        assert!(rows.block.logs_bloom.is_none());
    }

    #[test]
    fn transaction_row_keeps_big_values_and_parent_height() {
        let rows = map_block(&sample_block(), NumericPolicy::Lenient).unwrap();
        let tx = &rows.transactions[0].row;
        assert_eq!(tx.block, 100);
        assert_eq!(tx.index, 3);
        assert_eq!(tx.value, "123456789012345678901234567890");
        assert_eq!(tx.gas_used, "21000");
        assert_eq!(tx.near_hash, None, "invalid base58 maps to NULL");
        assert_eq!(tx.input, None);
        assert_eq!(tx.access_list, serde_json::json!([]));
    }

    #[test]
    fn log_rows_are_indexed_by_position() {
        let rows = map_block(&sample_block(), NumericPolicy::Lenient).unwrap();
        let logs = &rows.transactions[0].logs;
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].index, 0);
        assert_eq!(logs[0].topics, Some(vec![vec![0xde, 0xad]]));
        assert_eq!(logs[1].index, 1);
        assert_eq!(logs[1].topics, None);
        assert_eq!(logs[1].data, None);
    }

    #[test]
    fn strict_policy_names_the_bad_field() {
        let mut block = sample_block();
        block.transactions[0].gas_price = Quantity::new("1e18");
        let err = map_block(&block, NumericPolicy::Strict).unwrap_err();
        assert!(
            matches!(err, IndexerError::Numeric { ref field, .. } if field == "transaction.gas_price"),
            "got {err}"
        );
        assert!(map_block(&block, NumericPolicy::Lenient).is_ok());
    }

    #[test]
    fn skipped_block_has_no_near_columns() {
        let rows = map_block(&Block::empty(1, 7).with_sequence(3), NumericPolicy::Lenient).unwrap();
        assert_eq!(rows.block.near_hash, None);
        assert_eq!(rows.block.author, None);
        assert_eq!(rows.block.sequence, Some(3));
        assert!(rows.transactions.is_empty());
    }

    #[test]
    fn values_beyond_signed_columns_are_rejected() {
        let block = Block::empty(1, u64::MAX);
        let err = map_block(&block, NumericPolicy::Lenient).unwrap_err();
        assert!(matches!(err, IndexerError::Decode { ref context, .. } if context == "block.id"), "got {err}");

        let mut block = sample_block();
        block.transactions[0].transaction_index = u32::MAX;
        let err = map_block(&block, NumericPolicy::Lenient).unwrap_err();
        assert!(
            matches!(err, IndexerError::Decode { ref context, .. } if context == "transaction.index"),
            "got {err}"
        );
    }
}
