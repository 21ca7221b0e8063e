// src/config/mod.rs
use crate::error::{AnalysisError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Smallest accepted refractory interval between two catches, in seconds.
pub const MIN_CATCH_INTERVAL_FLOOR_SEC: f64 = 0.05;
/// Smallest accepted adaptive threshold window, in seconds.
pub const MIN_ADAPTIVE_WINDOW_SEC: f64 = 1.0;
/// Largest accepted position smoothing factor.
pub const MAX_POSITION_ALPHA: f64 = 0.9;
/// Smallest local-minimum window that can describe a valley.
pub const MIN_LOCAL_MIN_WINDOW: usize = 3;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub processor: ProcessorConfig,
    pub smoothing: SmoothingConfig,
    pub detector: DetectorConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Pixel size of the source frames; normalized landmarks are scaled by it before angles
    pub frame_width: u32,
    pub frame_height: u32,
    /// Joints reported with a lower visibility are treated as missing
    pub min_visibility: f64,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            frame_width: 1280,
            frame_height: 720,
            min_visibility: 0.5,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SmoothingConfig {
    pub position_alpha: f64,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            position_alpha: 0.2,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct DetectorConfig {
    /// Fixed catch threshold in degrees, used unless the adaptive threshold is active
    pub catch_angle_max: f64,
    /// Number of raw angle samples averaged for threshold comparisons
    pub raw_smoothing_window: usize,
    /// Refractory period between two catches
    pub min_catch_interval_sec: f64,
    /// Non-negative derivative samples needed to confirm a valley
    pub confirm_frames: usize,
    /// Number of trailing raw samples a catch must be the minimum of
    pub local_min_window_size: usize,
    pub adaptive_threshold_enabled: bool,
    pub adaptive_window_sec: f64,
    /// Retained strokes; older ones are evicted but still counted. `None` keeps everything.
    pub max_stroke_history: Option<usize>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            catch_angle_max: 110.0,
            raw_smoothing_window: 5,
            min_catch_interval_sec: 0.9,
            confirm_frames: 2,
            local_min_window_size: 9,
            adaptive_threshold_enabled: false,
            adaptive_window_sec: 8.0,
            max_stroke_history: Some(1024),
        }
    }
}

impl DetectorConfig {
    /// Clamp every field to its smallest valid value instead of rejecting it.
    pub fn sanitized(&self) -> Self {
        let defaults = Self::default();
        Self {
            catch_angle_max: if self.catch_angle_max.is_finite() {
                self.catch_angle_max.clamp(0.0, 180.0)
            } else {
                defaults.catch_angle_max
            },
            raw_smoothing_window: self.raw_smoothing_window.max(1),
            min_catch_interval_sec: finite_at_least(
                self.min_catch_interval_sec,
                MIN_CATCH_INTERVAL_FLOOR_SEC,
            ),
            confirm_frames: self.confirm_frames.max(1),
            local_min_window_size: self.local_min_window_size.max(MIN_LOCAL_MIN_WINDOW),
            adaptive_threshold_enabled: self.adaptive_threshold_enabled,
            adaptive_window_sec: finite_at_least(self.adaptive_window_sec, MIN_ADAPTIVE_WINDOW_SEC),
            max_stroke_history: self.max_stroke_history.map(|cap| cap.max(2)),
        }
    }

    /// Whether switching to `other` changes the meaning of the windowed buffers.
    pub fn invalidates_windows(&self, other: &DetectorConfig) -> bool {
        self.raw_smoothing_window != other.raw_smoothing_window
            || self.local_min_window_size != other.local_min_window_size
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub enable_frame_log: bool,
    pub frame_log_path: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enable_frame_log: false,
            frame_log_path: "logs/frames.csv".to_string(),
        }
    }
}

impl Config {
    /// Copy of the config with every numeric field clamped into range.
    pub fn sanitized(&self) -> Self {
        let alpha = if self.smoothing.position_alpha.is_finite() {
            self.smoothing.position_alpha.clamp(0.0, MAX_POSITION_ALPHA)
        } else {
            SmoothingConfig::default().position_alpha
        };
        let min_visibility = if self.processor.min_visibility.is_finite() {
            self.processor.min_visibility.clamp(0.0, 1.0)
        } else {
            ProcessorConfig::default().min_visibility
        };

        Self {
            processor: ProcessorConfig {
                frame_width: self.processor.frame_width.max(1),
                frame_height: self.processor.frame_height.max(1),
                min_visibility,
            },
            smoothing: SmoothingConfig {
                position_alpha: alpha,
            },
            detector: self.detector.sanitized(),
            logging: self.logging.clone(),
        }
    }
}

fn finite_at_least(value: f64, floor: f64) -> f64 {
    if value.is_finite() {
        value.max(floor)
    } else {
        floor
    }
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let config_str = fs::read_to_string(path).map_err(|source| AnalysisError::ConfigRead {
        path: path.display().to_string(),
        source,
    })?;

    let config: Config = serde_yaml::from_str(&config_str)?;
    Ok(config.sanitized())
}

pub fn save_config<P: AsRef<Path>>(config: &Config, path: P) -> Result<()> {
    let path = path.as_ref();
    let yaml = serde_yaml::to_string(config)?;

    fs::write(path, yaml).map_err(|source| AnalysisError::ConfigWrite {
        path: path.display().to_string(),
        source,
    })
}
