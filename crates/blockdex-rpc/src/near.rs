//! Current chain height from a NEAR node's `status` method.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use blockdex_core::error::IndexerError;
use blockdex_core::source::NodeStatus;

use crate::client::HttpRpcClient;

#[derive(Debug, Deserialize)]
struct StatusResponse {
    sync_info: SyncInfo,
}

#[derive(Debug, Deserialize)]
struct SyncInfo {
    latest_block_height: serde_json::Value,
}

/// [`NodeStatus`] over the NEAR JSON-RPC `status` method.
#[derive(Clone)]
pub struct NearStatusClient {
    client: Arc<HttpRpcClient>,
}

impl NearStatusClient {
    pub fn new(client: Arc<HttpRpcClient>) -> Self {
        Self { client }
    }
}

/// A height must be a non-negative integer; anything else is a protocol error.
fn parse_height(raw: &serde_json::Value) -> Result<u64, IndexerError> {
    match raw.as_i64() {
        Some(h) if h >= 0 => Ok(h as u64),
        Some(h) => Err(IndexerError::Protocol(format!("node reported negative height {h}"))),
        None => raw
            .as_u64()
            .ok_or_else(|| IndexerError::Protocol(format!("node reported non-numeric height {raw}"))),
    }
}

#[async_trait]
impl NodeStatus for NearStatusClient {
    async fn current_height(&self) -> Result<u64, IndexerError> {
        let status: StatusResponse = self.client.call("status", json!([])).await?;
        parse_height(&status.sync_info.latest_block_height)
    }
}
