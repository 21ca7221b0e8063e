pub mod config;
pub mod error;
pub mod local;
pub mod processing;
pub mod utils;

#[cfg(feature = "python")]
pub mod bindings;

pub use config::{load_config, save_config, Config, DetectorConfig};
pub use error::{AnalysisError, Result};
pub use processing::detectors::{CatchDecision, StrokeDetector, StrokeEvent, UpdateOutcome};
pub use processing::frame_processor::{FrameMetrics, FrameOutput, FrameProcessor};
pub use processing::landmarks::{Joint, Landmark, LandmarkFrame, Side};
pub use processing::metrics::StrokeSummary;
