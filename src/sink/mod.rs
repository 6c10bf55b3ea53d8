//! Point sink: the boundary between a sensor and the actuator.
//!
//! Events travel as newline-delimited JSON objects over TCP:
//! `{"x":0.5,"y":0.5,"confidence":1.0,"timestamp_ms":1700000000000}`.

mod backoff;
mod streamer;

pub use backoff::{calculate_backoff, DEFAULT_BACKOFF_BASE, DEFAULT_BACKOFF_MAX};
pub use streamer::{PointStreamer, SinkStats};

use crate::cursor::PointEvent;

/// Errors on the outbound point stream.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode point event: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Accepts point events without blocking the caller.
pub trait PointSink {
    /// Hand an event over. Returns false if the sink dropped it.
    fn send_point(&mut self, event: PointEvent) -> bool;
}

impl PointSink for PointStreamer {
    fn send_point(&mut self, event: PointEvent) -> bool {
        PointStreamer::send_point(self, event)
    }
}

impl PointSink for Vec<PointEvent> {
    fn send_point(&mut self, event: PointEvent) -> bool {
        self.push(event);
        true
    }
}
