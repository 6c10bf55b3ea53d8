//! Normalized keypoints produced by the external perception model.

use serde::Deserialize;

/// Wrist keypoint in a hand landmark set.
pub const HAND_WRIST: usize = 0;
/// Thumb tip keypoint in a hand landmark set.
pub const HAND_THUMB_TIP: usize = 4;
/// First knuckle of the index finger.
pub const HAND_INDEX_KNUCKLE: usize = 5;
/// Index finger tip.
pub const HAND_INDEX_TIP: usize = 8;

/// Left iris center in a face landmark set.
pub const FACE_LEFT_IRIS: usize = 468;

/// A single keypoint, normalized to the frame size.
///
/// Deserializes from `[x, y]` or `[x, y, z]`; depth is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(try_from = "Vec<f32>")]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
}

impl Landmark {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another keypoint.
    pub fn distance(&self, other: &Landmark) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Point halfway between this keypoint and another.
    pub fn midpoint(&self, other: &Landmark) -> Landmark {
        Landmark {
            x: (self.x + other.x) / 2.0,
            y: (self.y + other.y) / 2.0,
        }
    }
}

impl TryFrom<Vec<f32>> for Landmark {
    type Error = String;

    fn try_from(coords: Vec<f32>) -> Result<Self, Self::Error> {
        match coords[..] {
            [x, y] | [x, y, _] => Ok(Self { x, y }),
            _ => Err(format!("expected 2 or 3 coordinates, got {}", coords.len())),
        }
    }
}

/// All keypoints the detector produced for one frame.
///
/// Indices are fixed per detector variant; see the `HAND_*` and `FACE_*`
/// constants for the ones the translators read.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct LandmarkSet {
    points: Vec<Landmark>,
}

impl LandmarkSet {
    pub fn new(points: Vec<Landmark>) -> Self {
        Self { points }
    }

    /// Keypoint at `index`, or `None` if the detector produced fewer points.
    pub fn get(&self, index: usize) -> Option<&Landmark> {
        self.points.get(index)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
