//! theremin library crate.
//!
//! Gesture-to-cursor translation for camera-driven sensors, the point
//! streaming boundary to the actuator, and the cluster supervisor that
//! launches and tears down all of them.

pub mod actuator;
pub mod assets;
pub mod config;
pub mod cursor;
pub mod gesture;
pub mod landmarks;
pub mod sensor;
pub mod sink;
pub mod supervisor;
