//! Subcommand implementations.

use std::future::Future;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use blockdex_core::config::IndexerConfig;
use blockdex_core::error::IndexerError;
use blockdex_core::store::BlockStore;
use blockdex_rpc::{HttpRpcClient, NearStatusClient, RpcBlockSource};
use blockdex_scheduler::{resume_point, run_heights, run_polling, run_replay, DispatchEvent, FileFeed};
use blockdex_storage::PostgresStore;

async fn connect_store(config: &IndexerConfig) -> Result<PostgresStore> {
    let url = config
        .database_url
        .as_deref()
        .ok_or_else(|| IndexerError::Config("missing database URL".into()))?;
    let store = PostgresStore::connect_with_options(url, &config.postgres)
        .await
        .context("connecting to the database")?;
    Ok(store.with_policy(config.numeric_policy))
}

fn rpc_client(config: &IndexerConfig) -> Result<Arc<HttpRpcClient>> {
    let url = config
        .endpoint_url
        .as_deref()
        .ok_or_else(|| IndexerError::Config("missing endpoint URL".into()))?;
    Ok(Arc::new(HttpRpcClient::new(url, &config.rpc)?))
}

/// Write one line per height received on `rx` until every sender is gone,
/// then hand the writer back.
fn spawn_printer<T, W>(mut rx: mpsc::UnboundedReceiver<T>, height: fn(&T) -> Option<u64>, mut out: W) -> JoinHandle<W>
where
    T: Send + 'static,
    W: Write + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(item) = rx.recv().await {
            if let Some(h) = height(&item) {
                if let Err(e) = writeln!(out, "{h}") {
                    warn!(height = h, error = %e, "failed to write height");
                }
            }
        }
        if let Err(e) = out.flush() {
            warn!(error = %e, "failed to flush heights");
        }
        out
    })
}

/// Wait until the printer has written everything it was sent.
async fn drain<W>(printer: JoinHandle<W>) -> Option<W> {
    match printer.await {
        Ok(out) => Some(out),
        Err(e) => {
            warn!(error = %e, "height printer task failed");
            None
        }
    }
}

/// Run `pipeline` until it finishes or Ctrl-C arrives.
async fn until_interrupted<T>(pipeline: impl Future<Output = Result<T, IndexerError>>) -> Result<Option<T>> {
    tokio::select! {
        res = pipeline => Ok(Some(res?)),
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted, shutting down");
            Ok(None)
        }
    }
}

pub async fn poll(config: IndexerConfig) -> Result<()> {
    config.validate_with_endpoint()?;
    let store: Arc<PostgresStore> = Arc::new(connect_store(&config).await?);

    // The tip follower and the block fetcher use separate clients so a slow
    // block fetch never delays a tip poll.
    let status = Arc::new(NearStatusClient::new(rpc_client(&config)?));
    let source =
        Arc::new(RpcBlockSource::new(rpc_client(&config)?, config.chain_id).with_empty_blocks(config.index_empty_blocks));

    let (tx, rx) = mpsc::unbounded_channel();
    let printer = spawn_printer(rx, DispatchEvent::stored_height, std::io::stdout());
    // The dispatcher owns the sender, so the printer ends once the pipeline is gone.
    let outcome = until_interrupted(run_polling(&config, status, source, store, Some(tx))).await;
    drain(printer).await;
    outcome?;
    Ok(())
}

pub async fn heights(config: IndexerConfig) -> Result<()> {
    config.validate_with_endpoint()?;
    let store = Arc::new(connect_store(&config).await?);
    let status = Arc::new(NearStatusClient::new(rpc_client(&config)?));

    let (tx, rx) = mpsc::unbounded_channel::<u64>();
    let printer = spawn_printer(rx, |h| Some(*h), std::io::stdout());
    let outcome = until_interrupted(run_heights(&config, status, store, tx)).await;
    drain(printer).await;
    outcome?;
    Ok(())
}

pub async fn replay(config: IndexerConfig, log: PathBuf, follow: bool) -> Result<()> {
    config.validate()?;
    let store = Arc::new(connect_store(&config).await?);

    let mut feed = FileFeed::new(&log);
    if follow {
        feed = feed.follow(config.feed_poll_interval());
    }

    let (tx, rx) = mpsc::unbounded_channel();
    let printer = spawn_printer(rx, DispatchEvent::stored_height, std::io::stdout());
    let outcome = until_interrupted(run_replay(&config, Arc::new(feed), store, Some(tx))).await;
    drain(printer).await;
    let report = outcome.with_context(|| format!("replaying {}", log.display()))?;

    if let Some(report) = report {
        info!(
            resumed_at = report.resumed_at,
            indexed = report.indexed,
            already_indexed = report.already_indexed,
            dropped = report.dropped,
            redelivered = report.redelivered,
            "replay finished"
        );
    }
    Ok(())
}

pub async fn status(config: IndexerConfig) -> Result<()> {
    config.validate()?;
    let store = connect_store(&config).await?;

    let indexed = store.max_height().await?;
    let resume = resume_point(&store, config.start_sequence).await?;
    match indexed {
        Some(height) => println!("indexed height: {height}"),
        None => println!("indexed height: none"),
    }
    println!("resume sequence: {resume}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn printer_writes_every_height_sent_before_close() {
        let (tx, rx) = mpsc::unbounded_channel::<u64>();
        let printer = spawn_printer(rx, |h| Some(*h), Vec::new());
        for h in [7, 6, 5] {
            tx.send(h).unwrap();
        }
        drop(tx);

        let out = drain(printer).await.unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "7\n6\n5\n");
    }

    #[tokio::test]
    async fn printer_skips_events_without_a_stored_height() {
        let (tx, rx) = mpsc::unbounded_channel();
        let printer = spawn_printer(rx, DispatchEvent::stored_height, Vec::new());
        tx.send(DispatchEvent::AlreadyIndexed { height: 4 }).unwrap();
        tx.send(DispatchEvent::Dropped {
            height: 3,
            reason: "timeout".into(),
        })
        .unwrap();
        tx.send(DispatchEvent::Undecodable {
            sequence: 9,
            reason: "bad json".into(),
        })
        .unwrap();
        drop(tx);

        let out = drain(printer).await.unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "4\n");
    }

    struct Exploding;

    impl Write for Exploding {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            panic!("stdout went away")
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn panicked_printer_is_surfaced() {
        let (tx, rx) = mpsc::unbounded_channel::<u64>();
        let printer = spawn_printer(rx, |h| Some(*h), Exploding);
        tx.send(1).unwrap();
        drop(tx);
        assert!(drain(printer).await.is_none());
    }
}
