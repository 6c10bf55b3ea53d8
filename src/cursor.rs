//! Cursor state engine.
//!
//! Turns the per-frame pointer sample stream into a bounded, continuous
//! cursor position and decides when a [`PointEvent`] goes out.
//!
//! Relative (pinch-drag) mode behaves as a rate controller: while engaged,
//! every frame moves the cursor by the raw motion since the previous frame,
//! scaled by per-axis gains, and then re-anchors. Engaging only sets the
//! anchor, so lifting the pinch, moving the hand, and pinching again never
//! makes the cursor jump.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::CursorConfig;
use crate::gesture::{Modality, PointerSample};

/// One sample delivered to the actuator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointEvent {
    pub x: f32,
    pub y: f32,
    pub confidence: f32,
    /// Emission time in Unix milliseconds
    pub timestamp_ms: i64,
}

impl PointEvent {
    /// Create an event stamped with the current wall-clock time.
    pub fn now(x: f32, y: f32, confidence: f32) -> Self {
        Self {
            x,
            y,
            confidence,
            timestamp_ms: unix_millis(),
        }
    }

    /// Whether every component lies in [0, 1].
    pub fn is_normalized(&self) -> bool {
        [self.x, self.y, self.confidence]
            .iter()
            .all(|v| (0.0..=1.0).contains(v))
    }
}

/// Milliseconds since the Unix epoch, or 0 if the clock is before it.
pub fn unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// How samples map onto the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorMode {
    /// The sample position is the cursor position (gaze).
    Absolute,
    /// Engaged motion drags the cursor (pinch).
    Relative,
}

impl From<Modality> for CursorMode {
    fn from(modality: Modality) -> Self {
        match modality {
            Modality::Hand => CursorMode::Relative,
            Modality::Gaze => CursorMode::Absolute,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engagement {
    Disengaged,
    Engaged,
}

/// Per-sensor cursor state. `x` and `y` always stay within [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CursorState {
    pub x: f32,
    pub y: f32,
    pub anchor_x: f32,
    pub anchor_y: f32,
    pub was_engaged: bool,
}

/// The state machine owning one [`CursorState`].
#[derive(Debug, Clone)]
pub struct CursorEngine {
    mode: CursorMode,
    gain_x: f32,
    gain_y: f32,
    state: CursorState,
}

impl CursorEngine {
    pub fn new(mode: CursorMode, config: CursorConfig) -> Self {
        Self {
            mode,
            gain_x: config.gain_x,
            gain_y: config.gain_y,
            state: CursorState {
                x: clamp_unit(config.start_x),
                y: clamp_unit(config.start_y),
                anchor_x: 0.0,
                anchor_y: 0.0,
                was_engaged: false,
            },
        }
    }

    pub fn mode(&self) -> CursorMode {
        self.mode
    }

    pub fn state(&self) -> &CursorState {
        &self.state
    }

    pub fn position(&self) -> (f32, f32) {
        (self.state.x, self.state.y)
    }

    pub fn engagement(&self) -> Engagement {
        if self.state.was_engaged {
            Engagement::Engaged
        } else {
            Engagement::Disengaged
        }
    }

    /// Feed one frame's sample. Returns the event to send, if any.
    pub fn update(&mut self, sample: Option<PointerSample>) -> Option<PointEvent> {
        match self.mode {
            CursorMode::Absolute => self.update_absolute(sample),
            CursorMode::Relative => self.update_relative(sample),
        }
    }

    fn update_absolute(&mut self, sample: Option<PointerSample>) -> Option<PointEvent> {
        let sample = sample?;
        self.state.x = clamp_unit(sample.x);
        self.state.y = clamp_unit(sample.y);
        Some(PointEvent::now(self.state.x, self.state.y, sample.confidence))
    }

    fn update_relative(&mut self, sample: Option<PointerSample>) -> Option<PointEvent> {
        let state = &mut self.state;

        // No landmarks means no pinch: freeze the cursor
        let Some(sample) = sample.filter(|s| s.engaged) else {
            state.was_engaged = false;
            return None;
        };

        if !state.was_engaged {
            state.anchor_x = sample.x;
            state.anchor_y = sample.y;
            state.was_engaged = true;
            return None;
        }

        let dx = sample.x - state.anchor_x;
        let dy = sample.y - state.anchor_y;
        state.x = clamp_unit(state.x + dx * self.gain_x);
        state.y = clamp_unit(state.y + dy * self.gain_y);
        state.anchor_x = sample.x;
        state.anchor_y = sample.y;

        Some(PointEvent::now(state.x, state.y, 1.0))
    }
}

/// Clamp into [0, 1]. NaN maps to 0.
fn clamp_unit(v: f32) -> f32 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}
