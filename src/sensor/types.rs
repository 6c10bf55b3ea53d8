//! Sensor collaborator traits and error types.

use std::path::PathBuf;

use crate::assets::AssetError;
use crate::landmarks::LandmarkSet;

/// Yields frames on demand.
pub trait FrameSource {
    type Frame;

    /// Acquire the next frame. [`CaptureError::Exhausted`] ends the loop;
    /// [`CaptureError::Pending`] means nothing arrived yet; any other error is
    /// retried on the next iteration.
    fn capture(&mut self) -> Result<Self::Frame, CaptureError>;
}

/// Extracts keypoints from a frame.
pub trait LandmarkDetector {
    type Frame;

    /// Zero or one landmark set for the frame.
    fn detect(&mut self, frame: &Self::Frame) -> Option<LandmarkSet>;
}

/// Errors from frame acquisition.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// Transient: the frame could not be read this time
    #[error("Failed to capture frame: {0}")]
    Failed(String),

    /// No frame arrived within the source's wait window
    #[error("No frame ready")]
    Pending,

    /// The source has no more frames
    #[error("Frame source exhausted")]
    Exhausted,
}

/// Errors that stop a sensor before or during startup.
#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    #[error("Model asset unavailable: {0}")]
    AssetUnavailable(#[from] AssetError),

    #[error("Failed to open landmark feed '{}': {source}", path.display())]
    FeedUnavailable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to start async runtime: {0}")]
    Runtime(std::io::Error),
}

/// Counters reported when the loop ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopSummary {
    pub frames: u64,
    pub detections: u64,
    pub events: u64,
    pub capture_failures: u64,
}

impl std::fmt::Display for LoopSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} frames, {} detections, {} events, {} capture failures",
            self.frames, self.detections, self.events, self.capture_failures
        )
    }
}
