//! Background point streamer.
//!
//! The capture loop hands events over with [`PointStreamer::send_point`],
//! which never blocks. A tokio task owns the TCP connection to the actuator,
//! writes one JSON object per line, and reconnects with backoff when the
//! connection drops.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use super::backoff::{calculate_backoff, DEFAULT_BACKOFF_BASE, DEFAULT_BACKOFF_MAX};
use super::SinkError;
use crate::cursor::PointEvent;

/// How long shutdown waits for queued events to drain.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Default)]
struct Counters {
    sent: AtomicU64,
    dropped: AtomicU64,
    failed: AtomicU64,
}

/// Snapshot of the streamer counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkStats {
    /// Events written to the actuator connection
    pub sent: u64,
    /// Events rejected because the queue was full
    pub dropped: u64,
    /// Events lost to a write failure
    pub failed: u64,
}

impl std::fmt::Display for SinkStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} sent, {} dropped, {} failed",
            self.sent, self.dropped, self.failed
        )
    }
}

/// Non-blocking handle to the outbound point stream.
pub struct PointStreamer {
    tx: mpsc::Sender<PointEvent>,
    counters: Arc<Counters>,
    task: JoinHandle<()>,
}

impl std::fmt::Debug for PointStreamer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PointStreamer")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl PointStreamer {
    /// Spawn the network task on `handle` and return the sending side.
    pub fn start(handle: &Handle, address: impl Into<String>, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let counters = Arc::new(Counters::default());
        let task = handle.spawn(run_stream(address.into(), rx, Arc::clone(&counters)));
        Self { tx, counters, task }
    }

    /// Queue an event for sending. Returns false if it was dropped.
    pub fn send_point(&self, event: PointEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                log::debug!("Point queue full, dropping event");
                false
            }
            Err(TrySendError::Closed(_)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    pub fn stats(&self) -> SinkStats {
        SinkStats {
            sent: self.counters.sent.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }

    /// Close the queue and give the task a bounded window to drain it.
    pub async fn shutdown(self) -> SinkStats {
        let PointStreamer { tx, counters, task } = self;
        drop(tx);

        let abort = task.abort_handle();
        if tokio::time::timeout(DRAIN_TIMEOUT, task).await.is_err() {
            log::warn!("Point stream did not drain within {:?}", DRAIN_TIMEOUT);
            abort.abort();
        }

        SinkStats {
            sent: counters.sent.load(Ordering::Relaxed),
            dropped: counters.dropped.load(Ordering::Relaxed),
            failed: counters.failed.load(Ordering::Relaxed),
        }
    }
}

async fn run_stream(address: String, mut rx: mpsc::Receiver<PointEvent>, counters: Arc<Counters>) {
    let mut writer: Option<BufWriter<TcpStream>> = None;

    while let Some(event) = rx.recv().await {
        if writer.is_none() {
            writer = Some(BufWriter::new(connect(&address).await));
        }
        let Some(conn) = writer.as_mut() else {
            continue;
        };

        match write_event(conn, &event).await {
            Ok(()) => {
                counters.sent.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                log::warn!("Lost connection to actuator at {}: {}", address, e);
                writer = None;
            }
        }
    }

    if let Some(mut conn) = writer {
        let _ = conn.shutdown().await;
    }
    log::debug!("Point stream to {} closed", address);
}

/// Dial the actuator until it answers.
async fn connect(address: &str) -> TcpStream {
    let mut attempt = 0u32;
    loop {
        match TcpStream::connect(address).await {
            Ok(stream) => {
                let _ = stream.set_nodelay(true);
                log::info!("Connected to actuator at {}", address);
                return stream;
            }
            Err(e) => {
                let delay = calculate_backoff(attempt, DEFAULT_BACKOFF_BASE, DEFAULT_BACKOFF_MAX);
                log::debug!(
                    "Actuator at {} unavailable ({}), retrying in {:?}",
                    address,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt = attempt.saturating_add(1);
            }
        }
    }
}

async fn write_event(conn: &mut BufWriter<TcpStream>, event: &PointEvent) -> Result<(), SinkError> {
    let mut line = serde_json::to_vec(event)?;
    line.push(b'\n');
    conn.write_all(&line).await?;
    conn.flush().await?;
    Ok(())
}
