//! blockdex-storage: transactional block writers.
//!
//! Backends:
//! - [`memory`]: in-memory tables with the same conflict and rollback rules
//!   (tests, dry runs)
//! - `postgres`: PostgreSQL via `sqlx` (feature `postgres`)
//!
//! Both write the rows produced by [`rows::map_block`].

pub mod rows;

#[cfg(feature = "memory")]
pub mod memory;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "memory")]
pub use memory::MemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;
pub use rows::{map_block, BlockRow, BlockRows, LogRow, TransactionRow};
