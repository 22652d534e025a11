//! blockdex-scheduler: the moving parts of the indexer.
//!
//! Two producers feed one shared [`PriorityQueue`](blockdex_core::PriorityQueue):
//! [`TipFollower`] enqueues every new height as the chain advances, and
//! [`GapScanner`] walks backwards from the tip in fixed windows, enqueuing
//! heights the store is missing. A single [`Dispatcher`] pops the freshest
//! height, fetches it and writes it.
//!
//! In log-replay mode the producers are replaced by a [`LogFeed`](blockdex_core::LogFeed)
//! and [`ReplayDispatcher`], which resumes after the highest committed
//! sequence.

pub mod builder;
pub mod dispatcher;
pub mod feed;
pub mod gaps;
pub mod replay;
pub mod runner;
pub mod tip;

pub use builder::IndexerBuilder;
pub use dispatcher::{DispatchEvent, DispatchStep, Dispatcher};
pub use feed::{FileFeed, MemoryFeed};
pub use gaps::{GapScanReport, GapScanner, ScanWindows};
pub use replay::{resume_point, ReplayDispatcher, ReplayReport};
pub use runner::{run_heights, run_polling, run_replay, supervise};
pub use tip::TipFollower;
