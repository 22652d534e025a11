//! Upstream collaborators: the node-status query and the block fetcher.

use async_trait::async_trait;

use crate::error::IndexerError;
use crate::types::Block;

/// Reports the current chain tip height.
///
/// Implementations must return an error, not a height, for responses that
/// are non-numeric or negative.
#[async_trait]
pub trait NodeStatus: Send + Sync {
    async fn current_height(&self) -> Result<u64, IndexerError>;
}

/// Fetches and decodes the block at a given height (polling mode).
#[async_trait]
pub trait BlockSource: Send + Sync {
    async fn fetch_block(&self, height: u64) -> Result<Block, IndexerError>;
}
