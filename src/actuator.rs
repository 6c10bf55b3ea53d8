//! Actuator endpoint: accepts point streams from sensors.
//!
//! Each connection carries newline-delimited point events. Valid events are
//! logged with their end-to-end latency and handed to the caller's handler;
//! what the actuator ultimately does with them is up to that handler.

use std::net::SocketAddr;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use crate::cursor::{unix_millis, PointEvent};

/// A decoded event and the sensor it came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReceivedPoint {
    pub peer: SocketAddr,
    pub event: PointEvent,
    /// Receive time minus emission time, in milliseconds
    pub latency_ms: i64,
}

/// Accept sensor connections forever, forwarding decoded points to `points`.
///
/// Returns only if accepting fails.
pub async fn serve(listener: TcpListener, points: mpsc::Sender<ReceivedPoint>) -> std::io::Result<()> {
    log::info!("Actuator listening at {}", listener.local_addr()?);
    loop {
        let (socket, peer) = listener.accept().await?;
        log::info!("Sensor connected from {}", peer);
        let points = points.clone();
        tokio::spawn(async move {
            match handle_connection(socket, peer, points).await {
                Ok(()) => log::info!("Sensor {} disconnected", peer),
                Err(e) => log::warn!("Error receiving from {}: {}", peer, e),
            }
        });
    }
}

async fn handle_connection(
    socket: TcpStream,
    peer: SocketAddr,
    points: mpsc::Sender<ReceivedPoint>,
) -> std::io::Result<()> {
    let mut lines = BufReader::new(socket).lines();
    while let Some(line) = lines.next_line().await? {
        let Some(point) = decode(&line, peer) else {
            continue;
        };
        if points.send(point).await.is_err() {
            // Nobody is consuming anymore
            break;
        }
    }
    Ok(())
}

/// Parse one line into a point, rejecting malformed or out-of-range input.
pub fn decode(line: &str, peer: SocketAddr) -> Option<ReceivedPoint> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let event: PointEvent = match serde_json::from_str(line) {
        Ok(e) => e,
        Err(e) => {
            log::warn!("Malformed point from {}: {}", peer, e);
            return None;
        }
    };
    if !event.is_normalized() {
        log::warn!(
            "Rejecting out-of-range point from {}: ({}, {}, {})",
            peer,
            event.x,
            event.y,
            event.confidence
        );
        return None;
    }
    Some(ReceivedPoint {
        peer,
        event,
        latency_ms: unix_millis() - event.timestamp_ms,
    })
}

/// Bind `address` and log every received point until the process is stopped.
pub async fn run(address: &str) -> std::io::Result<()> {
    let listener = TcpListener::bind(address).await?;
    let (tx, mut rx) = mpsc::channel(256);
    let server = tokio::spawn(serve(listener, tx));

    let mut received: u64 = 0;
    while let Some(point) = rx.recv().await {
        received += 1;
        log::info!(
            "Point #{} from {}: x={:.4} y={:.4} conf={:.2} latency={}ms",
            received,
            point.peer,
            point.event.x,
            point.event.y,
            point.event.confidence,
            point.latency_ms
        );
    }

    match server.await {
        Ok(result) => result,
        Err(e) => Err(std::io::Error::other(e)),
    }
}
