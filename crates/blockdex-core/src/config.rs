//! Indexer configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::IndexerError;
use crate::numeric::NumericPolicy;

/// Configuration for an indexer instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    /// PostgreSQL connection URL.
    #[serde(alias = "database")]
    pub database_url: Option<String>,
    /// Node JSON-RPC endpoint URL.
    #[serde(alias = "endpoint")]
    pub endpoint_url: Option<String>,
    /// EVM chain id written into every block row.
    pub chain_id: u64,
    /// Tip polling interval (milliseconds).
    pub tip_poll_interval_ms: u64,
    /// Heights per gap-scan window.
    pub gap_window_size: u64,
    /// Upper bound on windows per gap-scan run.
    pub gap_max_windows: u64,
    /// Pause between gap-scan windows (milliseconds).
    pub gap_window_pause_ms: u64,
    /// Dispatcher sleep when the queue is empty (milliseconds).
    pub empty_queue_backoff_ms: u64,
    /// Handling of malformed numeric literals.
    pub numeric_policy: NumericPolicy,
    /// Store an empty block for heights the node reports as skipped.
    pub index_empty_blocks: bool,
    /// First durable-log sequence to request when nothing is committed yet.
    pub start_sequence: u64,
    /// How often a file feed checks for appended lines (milliseconds).
    pub feed_poll_interval_ms: u64,
    pub rpc: RpcConfig,
    pub postgres: PoolConfig,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            endpoint_url: None,
            chain_id: 1_313_161_554,
            tip_poll_interval_ms: 100,
            gap_window_size: 1000,
            gap_max_windows: 10_000,
            gap_window_pause_ms: 100,
            empty_queue_backoff_ms: 100,
            numeric_policy: NumericPolicy::Lenient,
            index_empty_blocks: true,
            start_sequence: 1,
            feed_poll_interval_ms: 250,
            rpc: RpcConfig::default(),
            postgres: PoolConfig::default(),
        }
    }
}

impl IndexerConfig {
    /// Reject settings no loop can run with. Called before anything starts.
    pub fn validate(&self) -> Result<(), IndexerError> {
        if self.database_url.as_deref().map_or(true, str::is_empty) {
            return Err(IndexerError::Config("missing database URL".into()));
        }
        if self.gap_window_size == 0 {
            return Err(IndexerError::Config("gap_window_size must be positive".into()));
        }
        if self.tip_poll_interval_ms == 0 || self.empty_queue_backoff_ms == 0 {
            return Err(IndexerError::Config("polling intervals must be positive".into()));
        }
        Ok(())
    }

    /// Like [`validate`](Self::validate), additionally requiring a node endpoint.
    pub fn validate_with_endpoint(&self) -> Result<(), IndexerError> {
        self.validate()?;
        if self.endpoint_url.as_deref().map_or(true, str::is_empty) {
            return Err(IndexerError::Config("missing endpoint URL".into()));
        }
        Ok(())
    }

    pub fn tip_poll_interval(&self) -> Duration {
        Duration::from_millis(self.tip_poll_interval_ms)
    }

    pub fn gap_window_pause(&self) -> Duration {
        Duration::from_millis(self.gap_window_pause_ms)
    }

    pub fn empty_queue_backoff(&self) -> Duration {
        Duration::from_millis(self.empty_queue_backoff_ms)
    }

    pub fn feed_poll_interval(&self) -> Duration {
        Duration::from_millis(self.feed_poll_interval_ms)
    }
}

/// JSON-RPC client settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Retries after the first attempt, transient errors only.
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 10_000,
            request_timeout_ms: 30_000,
        }
    }
}

/// Connection pool settings for the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            connect_timeout_secs: 30,
        }
    }
}
