//! blockdex-core: foundation for the freshness-first block indexer.
//!
//! # Architecture
//!
//! ```text
//!   TipFollower ──┐                         ┌── BlockSource (fetch + decode)
//!                 ├──► PriorityQueue ──► Dispatcher
//!   GapScanner ───┘     (max-heap by height)  └── BlockStore (transactional insert)
//!
//!   LogFeed ──► ReplayDispatcher ──► BlockStore      (log-replay mode)
//! ```
//!
//! This crate holds the shared vocabulary: the block aggregate, the work
//! queue, the error taxonomy, configuration, and the traits implemented by
//! the RPC, storage and feed crates.

pub mod config;
pub mod error;
pub mod feed;
pub mod numeric;
pub mod queue;
pub mod source;
pub mod store;
pub mod types;

pub use config::{IndexerConfig, PoolConfig, RpcConfig};
pub use error::{FailureClass, IndexerError};
pub use feed::{Delivery, LogFeed};
pub use numeric::{NumericPolicy, Quantity};
pub use queue::{PriorityQueue, WorkItem};
pub use source::{BlockSource, NodeStatus};
pub use store::{BlockStore, InsertOutcome};
pub use types::{AccessListItem, Block, ExistingBlock, Log, NearBlock, NearTransaction, Transaction};
