//! Gesture translation: keypoint sets in, pointer samples out.
//!
//! Two modalities are supported. A hand sensor reports the midpoint between
//! thumb and index tips and classifies a pinch as "engaged"; a gaze sensor
//! reports the mirrored left iris position with a fixed confidence.

use crate::config::GestureConfig;
use crate::landmarks::{
    LandmarkSet, FACE_LEFT_IRIS, HAND_INDEX_KNUCKLE, HAND_INDEX_TIP, HAND_THUMB_TIP, HAND_WRIST,
};

/// Which body signal a sensor tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Modality {
    /// Pinch-drag with one hand
    #[default]
    Hand,
    /// Iris position
    Gaze,
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Modality::Hand => write!(f, "hand"),
            Modality::Gaze => write!(f, "gaze"),
        }
    }
}

/// Semantic pointer reading for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerSample {
    pub x: f32,
    pub y: f32,
    /// Grip engagement. Always false for gaze.
    pub engaged: bool,
    pub confidence: f32,
}

/// Turns a landmark set into a pointer sample.
pub trait GestureTranslator {
    /// Translate one frame's landmarks. `None` input, or a set missing the
    /// keypoints this translator reads, produces `None`.
    fn translate(&mut self, landmarks: Option<&LandmarkSet>) -> Option<PointerSample>;
}

/// Build the translator for a modality.
pub fn translator_for(modality: Modality, config: GestureConfig) -> Box<dyn GestureTranslator + Send> {
    match modality {
        Modality::Hand => Box::new(HandTranslator::new(config)),
        Modality::Gaze => Box::new(GazeTranslator::new(config)),
    }
}

/// Pinch ratio: thumb-index distance normalized by wrist-knuckle distance.
pub fn pinch_ratio(landmarks: &LandmarkSet, epsilon: f32) -> Option<f32> {
    let thumb = landmarks.get(HAND_THUMB_TIP)?;
    let index = landmarks.get(HAND_INDEX_TIP)?;
    let wrist = landmarks.get(HAND_WRIST)?;
    let knuckle = landmarks.get(HAND_INDEX_KNUCKLE)?;

    let pinch_distance = thumb.distance(index);
    let hand_scale = wrist.distance(knuckle);
    Some(pinch_distance / (hand_scale + epsilon))
}

/// Pinch-drag hand translator.
#[derive(Debug, Clone)]
pub struct HandTranslator {
    config: GestureConfig,
    /// Last classification, only consulted when hysteresis is configured
    engaged: bool,
}

impl HandTranslator {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            engaged: false,
        }
    }

    fn classify(&mut self, ratio: f32) -> bool {
        let engaged = match self.config.release_threshold {
            Some(release) if self.engaged => ratio < release,
            _ => ratio < self.config.pinch_threshold,
        };
        self.engaged = engaged;
        engaged
    }
}

impl GestureTranslator for HandTranslator {
    fn translate(&mut self, landmarks: Option<&LandmarkSet>) -> Option<PointerSample> {
        let Some(landmarks) = landmarks else {
            self.engaged = false;
            return None;
        };
        let Some(ratio) = pinch_ratio(landmarks, self.config.epsilon) else {
            self.engaged = false;
            return None;
        };
        log::debug!("Pinch ratio: {:.3}", ratio);

        // pinch_ratio already proved both tips exist
        let thumb = landmarks.get(HAND_THUMB_TIP)?;
        let index = landmarks.get(HAND_INDEX_TIP)?;
        let position = thumb.midpoint(index);

        Some(PointerSample {
            x: position.x,
            y: position.y,
            engaged: self.classify(ratio),
            confidence: 1.0,
        })
    }
}

/// Iris-following gaze translator.
#[derive(Debug, Clone)]
pub struct GazeTranslator {
    confidence: f32,
}

impl GazeTranslator {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            confidence: config.gaze_confidence,
        }
    }
}

impl GestureTranslator for GazeTranslator {
    fn translate(&mut self, landmarks: Option<&LandmarkSet>) -> Option<PointerSample> {
        let iris = landmarks?.get(FACE_LEFT_IRIS)?;
        // The camera view is mirrored
        Some(PointerSample {
            x: 1.0 - iris.x,
            y: iris.y,
            engaged: false,
            confidence: self.confidence,
        })
    }
}
