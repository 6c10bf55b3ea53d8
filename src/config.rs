//! Configuration file handling for theremin.
//!
//! Loads configuration from `<config_dir>/theremin/config.toml` or a custom path.
//! Every section is optional; missing values fall back to the built-in defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Hand landmarker model published alongside MediaPipe.
pub const DEFAULT_HAND_MODEL_URL: &str = "https://storage.googleapis.com/mediapipe-models/hand_landmarker/hand_landmarker/float16/1/hand_landmarker.task";

/// Face landmarker model published alongside MediaPipe.
pub const DEFAULT_FACE_MODEL_URL: &str = "https://storage.googleapis.com/mediapipe-models/face_landmarker/face_landmarker/float16/1/face_landmarker.task";

/// Address the actuator listens on and sensors dial.
pub const DEFAULT_SINK_ADDRESS: &str = "127.0.0.1:50051";

/// Configuration file structure for theremin.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub gesture: GestureConfig,
    pub cursor: CursorConfig,
    pub sink: SinkConfig,
    pub model: ModelConfig,
    pub supervisor: SupervisorConfig,
    #[serde(rename = "process", skip_serializing_if = "Vec::is_empty")]
    pub processes: Vec<ProcessConfig>,
}

/// Tuning for the gesture translators.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    /// Pinch ratio below which the hand counts as engaged
    pub pinch_threshold: f32,
    /// Ratio an engaged hand must reach to release. `None` disables hysteresis.
    pub release_threshold: Option<f32>,
    /// Added to the hand scale so a collapsed hand never divides by zero
    pub epsilon: f32,
    /// Fixed confidence reported for gaze samples
    pub gaze_confidence: f32,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            pinch_threshold: 0.22,
            release_threshold: None,
            epsilon: 1e-6,
            gaze_confidence: 1.0,
        }
    }
}

/// Tuning for the cursor state engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CursorConfig {
    pub gain_x: f32,
    pub gain_y: f32,
    pub start_x: f32,
    pub start_y: f32,
}

impl Default for CursorConfig {
    fn default() -> Self {
        Self {
            gain_x: 2.5,
            gain_y: 2.5,
            start_x: 0.5,
            start_y: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    pub address: String,
    /// Events buffered between the capture loop and the network task
    pub queue_capacity: usize,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_SINK_ADDRESS.to_string(),
            queue_capacity: 64,
        }
    }
}

/// Where the perception model assets live. A `None` path skips staging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub hand_path: Option<PathBuf>,
    pub hand_url: String,
    pub face_path: Option<PathBuf>,
    pub face_url: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            hand_path: None,
            hand_url: DEFAULT_HAND_MODEL_URL.to_string(),
            face_path: None,
            face_url: DEFAULT_FACE_MODEL_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Delay between starting the actuator and starting the sensors
    pub startup_delay_ms: u64,
    /// How often critical processes are polled
    pub poll_interval_ms: u64,
    /// Polite-terminate window before a hard kill. `None` kills immediately.
    pub grace_period_ms: Option<u64>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            startup_delay_ms: 2000,
            poll_interval_ms: 1000,
            grace_period_ms: None,
        }
    }
}

/// Role a process plays in the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Actuator,
    Sensor,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Actuator => write!(f, "actuator"),
            Role::Sensor => write!(f, "sensor"),
        }
    }
}

/// One `[[process]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessConfig {
    pub role: Role,
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    /// Whether this process exiting brings the cluster down.
    /// Defaults to true for the actuator and false for sensors.
    #[serde(default)]
    pub critical: Option<bool>,
}

impl ProcessConfig {
    pub fn is_critical(&self) -> bool {
        self.critical.unwrap_or(self.role == Role::Actuator)
    }
}

impl Config {
    /// Load configuration from a file path.
    ///
    /// With `None`, the default path is used and a missing file yields the
    /// defaults. An explicit path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (default_path(), false),
        };

        if !path.exists() {
            if explicit {
                return Err(ConfigError::NotFound { path });
            }
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io {
            path: path.clone(),
            source: e,
        })?;
        let config = Self::parse(&content).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.clone(),
                source,
            },
            other => other,
        })?;
        Ok(config)
    }

    /// Parse and validate a TOML document.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: PathBuf::new(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let g = &self.gesture;
        if !(g.pinch_threshold.is_finite() && g.pinch_threshold > 0.0) {
            return Err(ConfigError::invalid("gesture.pinch_threshold must be > 0"));
        }
        if let Some(release) = g.release_threshold {
            if !release.is_finite() || release < g.pinch_threshold {
                return Err(ConfigError::invalid(
                    "gesture.release_threshold must be >= gesture.pinch_threshold",
                ));
            }
        }
        if !(g.epsilon.is_finite() && g.epsilon >= 0.0) {
            return Err(ConfigError::invalid("gesture.epsilon must be >= 0"));
        }
        if !(0.0..=1.0).contains(&g.gaze_confidence) {
            return Err(ConfigError::invalid("gesture.gaze_confidence must be within 0.0-1.0"));
        }

        let c = &self.cursor;
        if !c.gain_x.is_finite() || !c.gain_y.is_finite() {
            return Err(ConfigError::invalid("cursor gains must be finite"));
        }
        if !(0.0..=1.0).contains(&c.start_x) || !(0.0..=1.0).contains(&c.start_y) {
            return Err(ConfigError::invalid("cursor start position must be within 0.0-1.0"));
        }

        if self.sink.queue_capacity == 0 {
            return Err(ConfigError::invalid("sink.queue_capacity must be at least 1"));
        }
        if self.supervisor.poll_interval_ms == 0 {
            return Err(ConfigError::invalid("supervisor.poll_interval_ms must be at least 1"));
        }

        if !self.processes.is_empty() {
            let actuators = self
                .processes
                .iter()
                .filter(|p| p.role == Role::Actuator)
                .count();
            if actuators != 1 {
                return Err(ConfigError::invalid(format!(
                    "exactly one actuator process is required, found {}",
                    actuators
                )));
            }
        }
        Ok(())
    }

    /// Render the configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file '{}' not found", path.display())]
    NotFound { path: PathBuf },

    #[error("Failed to read config file '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

impl ConfigError {
    fn invalid(msg: impl Into<String>) -> Self {
        ConfigError::Invalid(msg.into())
    }
}

/// Get the default config file path.
pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("theremin").join("config.toml"))
        .unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config/theremin/config.toml")
        })
}
