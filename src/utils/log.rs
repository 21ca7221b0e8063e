use crate::error::Result;
use crate::processing::frame_processor::FrameOutput;
use chrono::Local;
use serde::Serialize;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

/// One row of the per-frame session log.
#[derive(Debug, Serialize)]
struct FrameRecord<'a> {
    wall_clock: String,
    timestamp: f64,
    side: &'a str,
    knee_angle: Option<f64>,
    raw_knee_angle: Option<f64>,
    back_tilt: Option<f64>,
    shin_tilt: Option<f64>,
    event: String,
    stroke_count: usize,
    strokes_per_minute: f64,
    drive_recovery_ratio: Option<f64>,
}

/// Appends one CSV row per processed frame
///
/// The header is written with the first row. Undefined angles are left empty.
pub struct FrameLogger {
    writer: csv::Writer<File>,
    path: PathBuf,
    rows: usize,
}

impl FrameLogger {
    /// Create (or truncate) the log file, creating parent directories as needed.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }

        let writer = csv::Writer::from_path(&path)?;
        Ok(Self {
            writer,
            path,
            rows: 0,
        })
    }

    pub fn record(&mut self, output: &FrameOutput) -> Result<()> {
        let event = output
            .events()
            .iter()
            .map(|e| e.name())
            .collect::<Vec<_>>()
            .join("+");

        self.writer.serialize(FrameRecord {
            wall_clock: Local::now().to_rfc3339(),
            timestamp: output.timestamp,
            side: output.metrics.side.name(),
            knee_angle: output.metrics.knee_angle,
            raw_knee_angle: output.metrics.raw_knee_angle,
            back_tilt: output.metrics.back_tilt,
            shin_tilt: output.metrics.shin_tilt,
            event,
            stroke_count: output.summary.stroke_count,
            strokes_per_minute: output.summary.strokes_per_minute,
            drive_recovery_ratio: output.summary.drive_recovery_ratio,
        })?;
        // Rows must survive a crashed session
        self.writer.flush()?;
        self.rows += 1;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows(&self) -> usize {
        self.rows
    }
}
