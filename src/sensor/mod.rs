//! Sensor process: capture → detect → translate → update → send.
//!
//! The loop is single-threaded and owns its cursor state outright. Per-frame
//! problems (no detection, a failed capture) never leave the loop; only
//! startup failures are returned to the caller.

mod feed;
mod types;

pub use feed::{FeedDetector, FeedFrame, FeedSource};
pub use types::{CaptureError, FrameSource, LandmarkDetector, LoopSummary, SensorError};

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::assets::ensure_asset;
use crate::config::Config;
use crate::cursor::{CursorEngine, CursorMode, PointEvent};
use crate::gesture::{translator_for, GestureTranslator, Modality};
use crate::sink::{PointSink, PointStreamer};

/// Pause after a failed capture before trying again.
const CAPTURE_RETRY_DELAY: Duration = Duration::from_millis(5);

/// Outcome of a single loop iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    /// A point event was produced
    Emitted(PointEvent),
    /// The frame was processed without producing an event
    Idle,
    /// No frame was ready yet
    Waiting,
    /// The frame could not be captured
    CaptureFailed,
    /// The source has no more frames
    Exhausted,
}

/// One sensor's capture loop.
pub struct SensorLoop<S, D> {
    source: S,
    detector: D,
    translator: Box<dyn GestureTranslator + Send>,
    engine: CursorEngine,
    summary: LoopSummary,
}

impl<S, D> SensorLoop<S, D>
where
    S: FrameSource,
    D: LandmarkDetector<Frame = S::Frame>,
{
    pub fn new(source: S, detector: D, modality: Modality, config: &Config) -> Self {
        Self {
            source,
            detector,
            translator: translator_for(modality, config.gesture),
            engine: CursorEngine::new(CursorMode::from(modality), config.cursor),
            summary: LoopSummary::default(),
        }
    }

    pub fn engine(&self) -> &CursorEngine {
        &self.engine
    }

    pub fn summary(&self) -> LoopSummary {
        self.summary
    }

    /// Process one frame.
    pub fn step(&mut self) -> Step {
        let frame = match self.source.capture() {
            Ok(frame) => frame,
            Err(CaptureError::Exhausted) => return Step::Exhausted,
            Err(CaptureError::Pending) => return Step::Waiting,
            Err(e) => {
                log::debug!("{}", e);
                self.summary.capture_failures += 1;
                return Step::CaptureFailed;
            }
        };
        self.summary.frames += 1;

        let landmarks = self.detector.detect(&frame);
        if landmarks.is_some() {
            self.summary.detections += 1;
        }

        let sample = self.translator.translate(landmarks.as_ref());
        match self.engine.update(sample) {
            Some(event) => {
                self.summary.events += 1;
                Step::Emitted(event)
            }
            None => Step::Idle,
        }
    }

    /// Run until the source is exhausted or `stop` is set. `stop` is checked
    /// between frames and whenever the source reports it is still waiting.
    pub fn run(&mut self, sink: &mut impl PointSink, stop: &AtomicBool) -> LoopSummary {
        while !stop.load(Ordering::SeqCst) {
            match self.step() {
                Step::Emitted(event) => {
                    sink.send_point(event);
                }
                Step::Idle | Step::Waiting => {}
                Step::CaptureFailed => std::thread::sleep(CAPTURE_RETRY_DELAY),
                Step::Exhausted => {
                    log::info!("Landmark feed ended");
                    break;
                }
            }
        }
        self.summary
    }
}

/// Options for a sensor process.
#[derive(Debug, Clone)]
pub struct SensorOptions {
    pub modality: Modality,
    /// Landmark feed path, `-` for stdin
    pub feed: PathBuf,
}

/// Stage the model, connect the sink, and run the loop until the feed ends
/// or `stop` is set.
pub fn run(config: &Config, options: &SensorOptions, stop: Arc<AtomicBool>) -> Result<LoopSummary, SensorError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .map_err(SensorError::Runtime)?;

    let model = match options.modality {
        Modality::Hand => config.model.hand_path.as_ref().map(|p| (p, &config.model.hand_url)),
        Modality::Gaze => config.model.face_path.as_ref().map(|p| (p, &config.model.face_url)),
    };
    if let Some((path, url)) = model {
        runtime.block_on(ensure_asset(path, url))?;
    }

    let source = FeedSource::open(&options.feed)?;
    let mut sensor = SensorLoop::new(source, FeedDetector, options.modality, config);

    let mut streamer = PointStreamer::start(
        runtime.handle(),
        config.sink.address.clone(),
        config.sink.queue_capacity,
    );
    log::info!(
        "{} sensor running, streaming to {}",
        options.modality,
        config.sink.address
    );

    let summary = sensor.run(&mut streamer, &stop);
    let stats = runtime.block_on(streamer.shutdown());
    log::info!("Sensor stopped: {}; points {}", summary, stats);
    Ok(summary)
}
