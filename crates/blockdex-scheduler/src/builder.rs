//! Fluent builder for [`IndexerConfig`].
//!
//! # Example
//!
//! ```rust
//! use blockdex_scheduler::IndexerBuilder;
//!
//! let config = IndexerBuilder::new()
//!     .database_url("postgresql://localhost/aurora")
//!     .endpoint_url("https://mainnet.aurora.dev")
//!     .gap_window_size(500)
//!     .build_config()
//!     .unwrap();
//! assert_eq!(config.gap_window_size, 500);
//! ```

use blockdex_core::config::{IndexerConfig, PoolConfig, RpcConfig};
use blockdex_core::error::IndexerError;
use blockdex_core::numeric::NumericPolicy;

#[derive(Default)]
pub struct IndexerBuilder {
    config: IndexerConfig,
}

impl IndexerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration, e.g. one read from a file.
    pub fn from_config(config: IndexerConfig) -> Self {
        Self { config }
    }

    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.config.database_url = Some(url.into());
        self
    }

    pub fn endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.config.endpoint_url = Some(url.into());
        self
    }

    /// Chain id written into every block row.
    pub fn chain_id(mut self, chain_id: u64) -> Self {
        self.config.chain_id = chain_id;
        self
    }

    pub fn tip_poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.tip_poll_interval_ms = ms;
        self
    }

    /// Heights per gap-scan window.
    pub fn gap_window_size(mut self, size: u64) -> Self {
        self.config.gap_window_size = size;
        self
    }

    pub fn gap_max_windows(mut self, windows: u64) -> Self {
        self.config.gap_max_windows = windows;
        self
    }

    pub fn gap_window_pause_ms(mut self, ms: u64) -> Self {
        self.config.gap_window_pause_ms = ms;
        self
    }

    pub fn empty_queue_backoff_ms(mut self, ms: u64) -> Self {
        self.config.empty_queue_backoff_ms = ms;
        self
    }

    pub fn numeric_policy(mut self, policy: NumericPolicy) -> Self {
        self.config.numeric_policy = policy;
        self
    }

    /// Store empty blocks for heights the node has no block for.
    pub fn index_empty_blocks(mut self, enabled: bool) -> Self {
        self.config.index_empty_blocks = enabled;
        self
    }

    pub fn start_sequence(mut self, sequence: u64) -> Self {
        self.config.start_sequence = sequence;
        self
    }

    pub fn feed_poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.feed_poll_interval_ms = ms;
        self
    }

    pub fn rpc(mut self, rpc: RpcConfig) -> Self {
        self.config.rpc = rpc;
        self
    }

    pub fn postgres(mut self, pool: PoolConfig) -> Self {
        self.config.postgres = pool;
        self
    }

    /// Validate and return the configuration.
    pub fn build_config(self) -> Result<IndexerConfig, IndexerError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let cfg = IndexerBuilder::new().database_url("postgresql://localhost/aurora").build_config().unwrap();
        assert_eq!(cfg.gap_window_size, 1000);
        assert_eq!(cfg.tip_poll_interval_ms, 100);
        assert!(cfg.index_empty_blocks);
    }

    #[test]
    fn builder_custom() {
        let cfg = IndexerBuilder::new()
            .database_url("postgresql://localhost/aurora")
            .chain_id(1_313_161_555)
            .gap_window_size(10)
            .gap_max_windows(3)
            .numeric_policy(NumericPolicy::Strict)
            .index_empty_blocks(false)
            .start_sequence(42)
            .build_config()
            .unwrap();

        assert_eq!(cfg.chain_id, 1_313_161_555);
        assert_eq!(cfg.gap_window_size, 10);
        assert_eq!(cfg.gap_max_windows, 3);
        assert_eq!(cfg.numeric_policy, NumericPolicy::Strict);
        assert!(!cfg.index_empty_blocks);
        assert_eq!(cfg.start_sequence, 42);
    }

    #[test]
    fn builder_rejects_missing_database() {
        assert!(matches!(IndexerBuilder::new().build_config(), Err(IndexerError::Config(_))));
    }
}
