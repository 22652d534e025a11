//! The block aggregate: a block, its transactions, and their logs.
//!
//! Field names follow the producer's snake_case encoding so a durable-log
//! payload deserializes straight into [`Block`].

use alloy_primitives::{Address, Bytes, B256};
use serde::{Deserialize, Serialize};

use crate::numeric::Quantity;

// ─── Block ────────────────────────────────────────────────────────────────────

/// A decoded block ready for ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub chain_id: u64,
    pub hash: B256,
    pub parent_hash: B256,
    /// Unique per chain; enforced by the store, not here.
    pub height: u64,
    pub miner: Address,
    /// Nanoseconds since the Unix epoch.
    pub timestamp: i64,
    pub gas_limit: Quantity,
    pub gas_used: Quantity,
    #[serde(default)]
    pub logs_bloom: Bytes,
    pub transactions_root: B256,
    pub receipts_root: B256,
    pub state_root: B256,
    #[serde(default)]
    pub size: Quantity,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub near_metadata: Option<NearBlock>,
    /// Delivery sequence of the durable log; only set in log-replay mode.
    #[serde(default)]
    pub sequence: Option<u64>,
}

impl Block {
    /// An empty block standing in for a height the chain skipped.
    pub fn empty(chain_id: u64, height: u64) -> Self {
        Self {
            chain_id,
            hash: B256::ZERO,
            parent_hash: B256::ZERO,
            height,
            miner: Address::ZERO,
            timestamp: 0,
            gas_limit: Quantity::from(0),
            gas_used: Quantity::from(0),
            logs_bloom: Bytes::new(),
            transactions_root: B256::ZERO,
            receipts_root: B256::ZERO,
            state_root: B256::ZERO,
            size: Quantity::from(0),
            transactions: Vec::new(),
            near_metadata: Some(NearBlock::SkippedBlock),
            sequence: None,
        }
    }

    /// Attach the durable-log delivery sequence.
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = Some(sequence);
        self
    }

    /// Total number of logs across all transactions.
    pub fn log_count(&self) -> usize {
        self.transactions.iter().map(|t| t.logs.len()).sum()
    }

    /// Returns `true` if the chain produced no block at this height.
    pub fn is_skipped(&self) -> bool {
        matches!(self.near_metadata, Some(NearBlock::SkippedBlock))
    }
}

// ─── NEAR metadata ────────────────────────────────────────────────────────────

/// NEAR-side metadata of a block. Resolved once at decode time.
///
/// Encoded externally tagged: `"SkippedBlock"` or
/// `{"ExistingBlock": {"near_hash": …, "near_parent_hash": …, "author": …}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NearBlock {
    /// A height with a real NEAR block behind it.
    ExistingBlock(ExistingBlock),
    /// A height the NEAR chain skipped; nothing beyond the height is known.
    SkippedBlock,
}

/// NEAR hashes are base58 text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingBlock {
    pub near_hash: String,
    pub near_parent_hash: String,
    pub author: String,
}

/// NEAR-side identifiers of a transaction (base58).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NearTransaction {
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub receipt_hash: String,
}

// ─── Transaction ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transaction {
    pub hash: B256,
    pub block_hash: B256,
    pub block_height: u64,
    pub chain_id: u64,
    pub transaction_index: u32,
    pub from: Address,
    pub to: Option<Address>,
    pub nonce: Quantity,
    pub gas_price: Quantity,
    pub gas_limit: Quantity,
    pub gas_used: u64,
    pub max_priority_fee_per_gas: Quantity,
    pub max_fee_per_gas: Quantity,
    pub value: Quantity,
    pub input: Bytes,
    pub output: Bytes,
    pub access_list: Vec<AccessListItem>,
    pub tx_type: u8,
    pub status: bool,
    pub logs: Vec<Log>,
    pub contract_address: Option<Address>,
    pub v: u64,
    pub r: Quantity,
    pub s: Quantity,
    pub near_metadata: Option<NearTransaction>,
}

/// EIP-2930 access list entry. Serialized with the JSON-RPC field names
/// because it is stored as a JSON document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessListItem {
    pub address: Address,
    #[serde(rename = "storageKeys", alias = "storage_keys", default)]
    pub storage_keys: Vec<B256>,
}

// ─── Log ──────────────────────────────────────────────────────────────────────

/// An event emitted by a transaction. Its index is its position in
/// [`Transaction::logs`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Log {
    #[serde(alias = "Address")]
    pub address: Address,
    #[serde(alias = "Topics")]
    pub topics: Vec<Bytes>,
    pub data: Bytes,
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = r#"{
        "chain_id": 1313161554,
        "hash": "0x1111111111111111111111111111111111111111111111111111111111111111",
        "parent_hash": "0x2222222222222222222222222222222222222222222222222222222222222222",
        "height": 66881589,
        "miner": "0x0000000000000000000000000000000000000000",
        "timestamp": 1650000000123456789,
        "gas_limit": "0xffffffffffffffff",
        "gas_used": "21000",
        "logs_bloom": "0x00",
        "transactions_root": "0x3333333333333333333333333333333333333333333333333333333333333333",
        "receipts_root": "0x4444444444444444444444444444444444444444444444444444444444444444",
        "state_root": "0x5555555555555555555555555555555555555555555555555555555555555555",
        "size": "0x0",
        "transactions": [{
            "hash": "0x6666666666666666666666666666666666666666666666666666666666666666",
            "from": "0x4444588443c3a91288c5002483449aba1054192b",
            "to": null,
            "value": "123456789012345678901234567890",
            "logs": [{
                "Address": "0x4444588443c3a91288c5002483449aba1054192b",
                "Topics": ["0xdeadbeef"],
                "data": "0x"
            }]
        }],
        "near_metadata": {"ExistingBlock": {"near_hash": "11111111111111111111111111111111", "near_parent_hash": "", "author": "aurora"}}
    }"#;

    #[test]
    fn decodes_producer_payload() {
        let block: Block = serde_json::from_str(PAYLOAD).unwrap();
        assert_eq!(block.height, 66_881_589);
        assert_eq!(block.transactions.len(), 1);
        assert_eq!(block.log_count(), 1);
        assert_eq!(block.sequence, None);
        assert!(block.transactions[0].to.is_none());
        assert_eq!(block.transactions[0].logs[0].topics.len(), 1);
        match block.near_metadata {
            Some(NearBlock::ExistingBlock(ref existing)) => assert_eq!(existing.author, "aurora"),
            ref other => panic!("unexpected metadata: {other:?}"),
        }
    }

    #[test]
    fn bare_integer_fields_survive_decoding() {
        let payload = PAYLOAD.replace(
            "\"value\": \"123456789012345678901234567890\"",
            "\"value\": 123456789012345678901234567890, \"nonce\": -1",
        );
        let block: Block = serde_json::from_str(&payload).unwrap();
        let tx = &block.transactions[0];
        assert_eq!(tx.value.literal(), "123456789012345678901234567890");
        assert_eq!(tx.nonce.literal(), "-1");
    }

    #[test]
    fn skipped_block_metadata_is_a_bare_tag() {
        let meta: NearBlock = serde_json::from_str("\"SkippedBlock\"").unwrap();
        assert_eq!(meta, NearBlock::SkippedBlock);
        assert!(Block::empty(1, 10).is_skipped());
    }

    #[test]
    fn with_sequence_sets_cursor() {
        let block = Block::empty(1, 10).with_sequence(7);
        assert_eq!(block.sequence, Some(7));
    }
}
