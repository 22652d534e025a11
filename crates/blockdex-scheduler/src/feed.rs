//! Durable-log feeds.
//!
//! [`FileFeed`] reads an append-only NDJSON file in which line `N` carries
//! sequence `N` (1-based). Blank lines keep their sequence number but are
//! never delivered. In follow mode the feed keeps polling the file for
//! appended lines; otherwise the channel closes at end of file.
//!
//! [`MemoryFeed`] replays deliveries held in memory.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error};

use blockdex_core::error::IndexerError;
use blockdex_core::feed::{Delivery, LogFeed};

const CHANNEL_CAPACITY: usize = 256;

// ─── MemoryFeed ───────────────────────────────────────────────────────────────

/// In-memory durable log.
#[derive(Default, Clone)]
pub struct MemoryFeed {
    deliveries: Arc<Mutex<Vec<Delivery>>>,
}

impl MemoryFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a payload; returns its sequence.
    pub fn append(&self, payload: impl Into<Vec<u8>>) -> u64 {
        let mut deliveries = self.deliveries.lock();
        let sequence = deliveries.last().map_or(1, |d| d.sequence + 1);
        deliveries.push(Delivery {
            sequence,
            payload: payload.into(),
        });
        sequence
    }

    /// Append a delivery with an explicit sequence, e.g. to model redelivery.
    pub fn push(&self, delivery: Delivery) {
        self.deliveries.lock().push(delivery);
    }

    pub fn len(&self) -> usize {
        self.deliveries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.deliveries.lock().is_empty()
    }
}

#[async_trait]
impl LogFeed for MemoryFeed {
    async fn subscribe(&self, start_sequence: u64) -> Result<mpsc::Receiver<Delivery>, IndexerError> {
        let pending: Vec<Delivery> = self
            .deliveries
            .lock()
            .iter()
            .filter(|d| d.sequence >= start_sequence)
            .cloned()
            .collect();

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        tokio::spawn(async move {
            for delivery in pending {
                if tx.send(delivery).await.is_err() {
                    return;
                }
            }
        });
        Ok(rx)
    }
}

// ─── FileFeed ─────────────────────────────────────────────────────────────────

/// NDJSON file durable log.
#[derive(Debug, Clone)]
pub struct FileFeed {
    path: PathBuf,
    follow: bool,
    poll_interval: Duration,
}

impl FileFeed {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            follow: false,
            poll_interval: Duration::from_millis(250),
        }
    }

    /// Keep waiting for appended lines instead of closing at end of file.
    pub fn follow(mut self, poll_interval: Duration) -> Self {
        self.follow = true;
        self.poll_interval = poll_interval;
        self
    }
}

#[async_trait]
impl LogFeed for FileFeed {
    async fn subscribe(&self, start_sequence: u64) -> Result<mpsc::Receiver<Delivery>, IndexerError> {
        let file = tokio::fs::File::open(&self.path)
            .await
            .map_err(|e| IndexerError::Config(format!("cannot open log {}: {e}", self.path.display())))?;

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let feed = self.clone();
        tokio::spawn(async move {
            if let Err(e) = feed.pump(BufReader::new(file), start_sequence, tx).await {
                error!(path = %feed.path.display(), error = %e, "durable log read failed");
            }
        });
        Ok(rx)
    }
}

impl FileFeed {
    async fn pump(
        &self,
        mut reader: BufReader<tokio::fs::File>,
        start_sequence: u64,
        tx: mpsc::Sender<Delivery>,
    ) -> std::io::Result<()> {
        let mut sequence = 0u64;
        let mut line = Vec::new();
        loop {
            let n = reader.read_until(b'\n', &mut line).await?;
            let complete = line.last() == Some(&b'\n');

            if n == 0 || !complete {
                // End of file, possibly in the middle of a line still being written.
                if self.follow {
                    if tx.is_closed() {
                        return Ok(());
                    }
                    tokio::time::sleep(self.poll_interval).await;
                    continue;
                }
                if line.is_empty() {
                    return Ok(());
                }
            }

            sequence += 1;
            let payload = std::mem::take(&mut line);
            if sequence < start_sequence || payload.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            debug!(sequence, bytes = payload.len(), "read delivery");
            if tx.send(Delivery { sequence, payload }).await.is_err() {
                return Ok(());
            }
        }
    }
}
