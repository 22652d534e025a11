//! Wiring of producers and consumers into a running pipeline.
//!
//! Producer failures are fatal: [`supervise`] returns the first error from
//! the tip follower, the gap scanner or the consumer and aborts the other
//! tasks. The caller decides how the process exits.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use blockdex_core::config::IndexerConfig;
use blockdex_core::error::IndexerError;
use blockdex_core::feed::LogFeed;
use blockdex_core::queue::PriorityQueue;
use blockdex_core::source::{BlockSource, NodeStatus};
use blockdex_core::store::BlockStore;

use crate::dispatcher::{DispatchEvent, Dispatcher};
use crate::gaps::GapScanner;
use crate::replay::{ReplayDispatcher, ReplayReport};
use crate::tip::TipFollower;

fn joined<T>(res: Result<Result<T, IndexerError>, tokio::task::JoinError>, task: &str) -> Result<T, IndexerError> {
    res.map_err(|e| IndexerError::Aborted {
        reason: format!("{task} task failed: {e}"),
    })?
}

/// Run both producers alongside `consumer` until one of them fails or the
/// consumer finishes.
///
/// The gap scanner finishing its pass is not an event; the tip follower and
/// the consumer keep running.
pub async fn supervise<F>(tip: TipFollower, gaps: GapScanner, tip_height: u64, consumer: F) -> Result<(), IndexerError>
where
    F: Future<Output = Result<(), IndexerError>>,
{
    let mut tip_task: JoinHandle<Result<(), IndexerError>> = tokio::spawn(tip.run());
    let mut gap_task = tokio::spawn(async move { gaps.run(tip_height).await });
    tokio::pin!(consumer);

    let mut gaps_running = true;
    let result = loop {
        tokio::select! {
            res = &mut tip_task => {
                break joined(res, "tip follower").and(Err(IndexerError::Aborted {
                    reason: "tip follower stopped".into(),
                }));
            }
            res = &mut gap_task, if gaps_running => {
                gaps_running = false;
                if let Err(e) = joined(res, "gap scanner") {
                    break Err(e);
                }
            }
            res = &mut consumer => break res,
        }
    };

    tip_task.abort();
    gap_task.abort();
    result
}

/// Polling mode: tip follower + gap scanner + dispatcher.
///
/// Every dispatched height is reported on `events` when given.
pub async fn run_polling(
    config: &IndexerConfig,
    status: Arc<dyn NodeStatus>,
    source: Arc<dyn BlockSource>,
    store: Arc<dyn BlockStore>,
    events: Option<UnboundedSender<DispatchEvent>>,
) -> Result<(), IndexerError> {
    let queue = Arc::new(PriorityQueue::new());
    let (tip, gaps, tip_height) = producers(config, status, store.clone(), queue.clone()).await?;

    let mut dispatcher = Dispatcher::new(queue, source, store).with_backoff(config.empty_queue_backoff());
    if let Some(events) = events {
        dispatcher = dispatcher.with_events(events);
    }
    supervise(tip, gaps, tip_height, dispatcher.run()).await
}

/// Produce-only mode: heights are handed to `sink` in priority order and
/// nothing is fetched or written.
pub async fn run_heights(
    config: &IndexerConfig,
    status: Arc<dyn NodeStatus>,
    store: Arc<dyn BlockStore>,
    sink: UnboundedSender<u64>,
) -> Result<(), IndexerError> {
    let queue = Arc::new(PriorityQueue::new());
    let (tip, gaps, tip_height) = producers(config, status, store, queue.clone()).await?;

    let backoff = config.empty_queue_backoff();
    let drain = async move {
        loop {
            match queue.pop() {
                Some(item) => {
                    if sink.send(item.height).is_err() {
                        debug!("height receiver closed");
                        return Ok(());
                    }
                }
                None => tokio::time::sleep(backoff).await,
            }
        }
    };
    supervise(tip, gaps, tip_height, drain).await
}

/// Log-replay mode, from the resume point derived from `store`.
pub async fn run_replay(
    config: &IndexerConfig,
    feed: Arc<dyn LogFeed>,
    store: Arc<dyn BlockStore>,
    events: Option<UnboundedSender<DispatchEvent>>,
) -> Result<ReplayReport, IndexerError> {
    let mut replay = ReplayDispatcher::new(feed, store).with_start_sequence(config.start_sequence);
    if let Some(events) = events {
        replay = replay.with_events(events);
    }
    replay.run().await
}

async fn producers(
    config: &IndexerConfig,
    status: Arc<dyn NodeStatus>,
    store: Arc<dyn BlockStore>,
    queue: Arc<PriorityQueue>,
) -> Result<(TipFollower, GapScanner, u64), IndexerError> {
    let indexed = store.max_height().await?;
    let tip_height = status.current_height().await?;
    info!(
        "indexing blocks #{tip_height}..#{} and #{}+",
        indexed.map_or_else(|| "genesis".to_string(), |h| h.to_string()),
        tip_height + 1
    );

    let tip = TipFollower::new(status, queue.clone(), tip_height, config.tip_poll_interval());
    let gaps = GapScanner::new(store, queue)
        .with_window_size(config.gap_window_size)
        .with_max_windows(config.gap_max_windows)
        .with_pause(config.gap_window_pause());
    Ok((tip, gaps, tip_height))
}
