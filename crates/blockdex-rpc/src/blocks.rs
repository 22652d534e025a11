//! Polling-mode block fetcher: `eth_getBlockByNumber` with full transactions,
//! plus one `eth_getTransactionReceipt` per transaction for status, gas used
//! and logs.

use std::sync::Arc;

use alloy_primitives::{Address, Bytes, B256, U64};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use blockdex_core::error::IndexerError;
use blockdex_core::numeric::Quantity;
use blockdex_core::source::BlockSource;
use blockdex_core::types::{AccessListItem, Block, Log, Transaction};

use crate::client::{CallError, HttpRpcClient};

/// Error text the node uses for a height it has no block for.
const MISSING_BLOCK_MARKER: &str = "DB Not Found";

// ─── Wire shapes ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcBlock {
    number: U64,
    hash: B256,
    parent_hash: B256,
    miner: Address,
    timestamp: U64,
    gas_limit: Quantity,
    gas_used: Quantity,
    #[serde(default)]
    logs_bloom: Bytes,
    transactions_root: B256,
    receipts_root: B256,
    state_root: B256,
    #[serde(default)]
    size: Quantity,
    #[serde(default)]
    transactions: Vec<RpcTransaction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcTransaction {
    hash: B256,
    #[serde(default)]
    block_hash: B256,
    transaction_index: U64,
    from: Address,
    to: Option<Address>,
    nonce: Quantity,
    #[serde(default)]
    gas_price: Quantity,
    gas: Quantity,
    value: Quantity,
    #[serde(default)]
    input: Bytes,
    #[serde(default)]
    v: U64,
    #[serde(default)]
    r: Quantity,
    #[serde(default)]
    s: Quantity,
    #[serde(rename = "type", default)]
    tx_type: U64,
    #[serde(default)]
    max_fee_per_gas: Quantity,
    #[serde(default)]
    max_priority_fee_per_gas: Quantity,
    #[serde(default)]
    access_list: Vec<AccessListItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    gas_used: U64,
    #[serde(default)]
    status: U64,
    #[serde(default)]
    logs: Vec<RpcLog>,
    contract_address: Option<Address>,
}

#[derive(Debug, Deserialize)]
struct RpcLog {
    address: Address,
    #[serde(default)]
    topics: Vec<B256>,
    #[serde(default)]
    data: Bytes,
}

/// Narrow a node quantity into a domain field, rejecting values that do not fit.
fn narrow<T: TryFrom<u64>>(value: U64, field: &str, height: u64) -> Result<T, IndexerError> {
    T::try_from(value.to::<u64>())
        .map_err(|_| IndexerError::Protocol(format!("{field} {value} out of range in #{height}")))
}

fn to_block(rpc: RpcBlock, receipts: Vec<RpcReceipt>, chain_id: u64) -> Result<Block, IndexerError> {
    let height = rpc.number.to::<u64>();
    let timestamp = i64::try_from(rpc.timestamp.to::<u64>())
        .ok()
        .and_then(|secs| secs.checked_mul(1_000_000_000))
        .ok_or_else(|| IndexerError::Protocol(format!("timestamp {} out of range in #{height}", rpc.timestamp)))?;

    let transactions = rpc
        .transactions
        .into_iter()
        .zip(receipts)
        .map(|(tx, receipt)| {
            Ok(Transaction {
                hash: tx.hash,
                block_hash: tx.block_hash,
                block_height: height,
                chain_id,
                transaction_index: narrow(tx.transaction_index, "transactionIndex", height)?,
                from: tx.from,
                to: tx.to,
                nonce: tx.nonce,
                gas_price: tx.gas_price,
                gas_limit: tx.gas,
                gas_used: receipt.gas_used.to::<u64>(),
                max_priority_fee_per_gas: tx.max_priority_fee_per_gas,
                max_fee_per_gas: tx.max_fee_per_gas,
                value: tx.value,
                input: tx.input,
                output: Bytes::new(),
                access_list: tx.access_list,
                tx_type: narrow(tx.tx_type, "type", height)?,
                status: receipt.status.to::<u64>() == 1,
                logs: receipt
                    .logs
                    .into_iter()
                    .map(|log| Log {
                        address: log.address,
                        topics: log.topics.iter().map(|t| Bytes::copy_from_slice(t.as_slice())).collect(),
                        data: log.data,
                    })
                    .collect(),
                contract_address: receipt.contract_address,
                v: tx.v.to::<u64>(),
                r: tx.r,
                s: tx.s,
                near_metadata: None,
            })
        })
        .collect::<Result<Vec<_>, IndexerError>>()?;

    Ok(Block {
        chain_id,
        hash: rpc.hash,
        parent_hash: rpc.parent_hash,
        height,
        miner: rpc.miner,
        timestamp,
        gas_limit: rpc.gas_limit,
        gas_used: rpc.gas_used,
        logs_bloom: rpc.logs_bloom,
        transactions_root: rpc.transactions_root,
        receipts_root: rpc.receipts_root,
        state_root: rpc.state_root,
        size: rpc.size,
        transactions,
        near_metadata: None,
        sequence: None,
    })
}

// ─── RpcBlockSource ───────────────────────────────────────────────────────────

/// [`BlockSource`] over an Ethereum-compatible JSON-RPC endpoint.
#[derive(Clone)]
pub struct RpcBlockSource {
    client: Arc<HttpRpcClient>,
    chain_id: u64,
    index_empty_blocks: bool,
}

impl RpcBlockSource {
    pub fn new(client: Arc<HttpRpcClient>, chain_id: u64) -> Self {
        Self {
            client,
            chain_id,
            index_empty_blocks: true,
        }
    }

    /// Whether heights the node has no block for become empty blocks.
    pub fn with_empty_blocks(mut self, enabled: bool) -> Self {
        self.index_empty_blocks = enabled;
        self
    }
}

#[async_trait]
impl BlockSource for RpcBlockSource {
    async fn fetch_block(&self, height: u64) -> Result<Block, IndexerError> {
        let fetched = self
            .client
            .call::<Option<RpcBlock>>("eth_getBlockByNumber", json!([format!("{height:#x}"), true]))
            .await;

        let rpc = match fetched {
            Ok(Some(rpc)) => rpc,
            Ok(None) => return Err(IndexerError::Protocol(format!("node returned no block at #{height}"))),
            Err(CallError::Rpc(e)) if e.mentions(MISSING_BLOCK_MARKER) => {
                if self.index_empty_blocks {
                    tracing::debug!(height, "node has no block, indexing an empty one");
                    return Ok(Block::empty(self.chain_id, height));
                }
                return Err(IndexerError::Rpc(format!("block #{height}: {e}")));
            }
            Err(e) => return Err(e.into()),
        };

        if rpc.number.to::<u64>() != height {
            return Err(IndexerError::Protocol(format!(
                "asked for block #{height}, node answered #{}",
                rpc.number
            )));
        }

        let mut receipts = Vec::with_capacity(rpc.transactions.len());
        for tx in &rpc.transactions {
            let receipt: Option<RpcReceipt> = self
                .client
                .call("eth_getTransactionReceipt", json!([tx.hash]))
                .await?;
            let receipt = receipt
                .ok_or_else(|| IndexerError::Protocol(format!("missing receipt for {} in #{height}", tx.hash)))?;
            receipts.push(receipt);
        }

        to_block(rpc, receipts, self.chain_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{self, Reply};
    use blockdex_core::config::RpcConfig;
    use blockdex_core::types::NearBlock;
    use serde_json::Value;

    fn block_json(number: &str, txs: Value) -> Value {
        json!({
            "number": number,
            "hash": format!("0x{}", "11".repeat(32)),
            "parentHash": format!("0x{}", "22".repeat(32)),
            "miner": "0x0000000000000000000000000000000000000000",
            "timestamp": "0x62590080",
            "gasLimit": "0xffffffff",
            "gasUsed": "0x5208",
            "logsBloom": "0x",
            "transactionsRoot": format!("0x{}", "33".repeat(32)),
            "receiptsRoot": format!("0x{}", "44".repeat(32)),
            "stateRoot": format!("0x{}", "55".repeat(32)),
            "size": "0x100",
            "transactions": txs
        })
    }

    fn tx_json() -> Value {
        json!({
            "hash": format!("0x{}", "66".repeat(32)),
            "transactionIndex": "0x0",
            "from": "0x4444588443c3a91288c5002483449aba1054192b",
            "to": null,
            "nonce": "0x1",
            "gasPrice": "0x0",
            "gas": "0x5208",
            "value": "0x18ee90ff6c373e0ee4e3f0ad2",
            "input": "0x60806040",
            "v": "0x9c8a82c7",
            "r": "0x1",
            "s": "0x2",
            "type": "0x0"
        })
    }

    async fn source(replies: Vec<Reply>, empty_blocks: bool) -> RpcBlockSource {
        let url = mock::serve(replies).await;
        let cfg = RpcConfig {
            max_retries: 0,
            ..Default::default()
        };
        RpcBlockSource::new(Arc::new(HttpRpcClient::new(url, &cfg).unwrap()), 1_313_161_554)
            .with_empty_blocks(empty_blocks)
    }

    #[tokio::test]
    async fn fetches_block_with_receipts() {
        let receipt = json!({
            "gasUsed": "0x5208",
            "status": "0x1",
            "contractAddress": "0x2222222222222222222222222222222222222222",
            "logs": [{
                "address": "0x2222222222222222222222222222222222222222",
                "topics": [format!("0x{}", "aa".repeat(32))],
                "data": "0x01"
            }]
        });
        let src = source(
            vec![Reply::result(block_json("0x2a", json!([tx_json()]))), Reply::result(receipt)],
            true,
        )
        .await;

        let block = src.fetch_block(42).await.unwrap();
        assert_eq!(block.height, 42);
        assert_eq!(block.timestamp, 1_650_000_000 * 1_000_000_000);
        assert_eq!(block.transactions.len(), 1);

        let tx = &block.transactions[0];
        assert!(tx.status);
        assert_eq!(tx.gas_used, 21_000);
        assert_eq!(tx.value.to_decimal().as_deref(), Some("123456789012345678901234567890"));
        assert_eq!(tx.logs.len(), 1);
        assert_eq!(tx.logs[0].topics[0].len(), 32);
        assert!(tx.contract_address.is_some());
    }

    #[tokio::test]
    async fn missing_block_becomes_empty_block() {
        let src = source(vec![Reply::error(-32000, "DB Not Found Error: BLOCK HEIGHT: 7")], true).await;
        let block = src.fetch_block(7).await.unwrap();
        assert_eq!(block.height, 7);
        assert_eq!(block.near_metadata, Some(NearBlock::SkippedBlock));
        assert!(block.transactions.is_empty());
    }

    #[tokio::test]
    async fn missing_block_is_an_error_when_empty_blocks_disabled() {
        let src = source(vec![Reply::error(-32000, "DB Not Found Error: BLOCK HEIGHT: 7")], false).await;
        assert!(matches!(src.fetch_block(7).await, Err(IndexerError::Rpc(_))));
    }

    #[tokio::test]
    async fn null_block_is_a_protocol_error() {
        let src = source(vec![Reply::result(Value::Null)], true).await;
        assert!(matches!(src.fetch_block(9).await, Err(IndexerError::Protocol(_))));
    }

    #[tokio::test]
    async fn height_mismatch_is_rejected() {
        let src = source(vec![Reply::result(block_json("0x2b", json!([])))], true).await;
        assert!(matches!(src.fetch_block(42).await, Err(IndexerError::Protocol(_))));
    }

    #[tokio::test]
    async fn out_of_range_fields_are_rejected() {
        let receipt = json!({"gasUsed": "0x5208", "status": "0x1", "contractAddress": null});

        let mut tx = tx_json();
        tx["type"] = json!("0x100");
        let src = source(
            vec![Reply::result(block_json("0x2a", json!([tx]))), Reply::result(receipt.clone())],
            true,
        )
        .await;
        assert!(matches!(src.fetch_block(42).await, Err(IndexerError::Protocol(_))));

        let mut tx = tx_json();
        tx["transactionIndex"] = json!("0x100000000");
        let src = source(
            vec![Reply::result(block_json("0x2a", json!([tx]))), Reply::result(receipt)],
            true,
        )
        .await;
        assert!(matches!(src.fetch_block(42).await, Err(IndexerError::Protocol(_))));
    }
}
