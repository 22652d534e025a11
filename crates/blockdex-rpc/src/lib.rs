//! blockdex-rpc: the node side of the pipeline.
//!
//! - [`client::HttpRpcClient`]: JSON-RPC 2.0 over HTTP with retry on
//!   transient transport errors
//! - [`near::NearStatusClient`]: current chain height from the node's
//!   `status` method ([`NodeStatus`](blockdex_core::NodeStatus))
//! - [`blocks::RpcBlockSource`]: full blocks with receipts via
//!   `eth_getBlockByNumber` ([`BlockSource`](blockdex_core::BlockSource))

pub mod blocks;
pub mod client;
pub mod near;
pub mod request;
pub mod retry;

#[cfg(test)]
pub(crate) mod mock;

pub use blocks::RpcBlockSource;
pub use client::{CallError, HttpRpcClient};
pub use near::NearStatusClient;
pub use request::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RpcId};
pub use retry::{RetryConfig, RetryPolicy};
