use crate::config::{Config, LoggingConfig};
use crate::error::{AnalysisError, Result};
use crate::processing::frame_processor::FrameProcessor;
use crate::processing::landmarks::{Joint, Landmark, LandmarkFrame, Side};
use crate::processing::metrics::StrokeSummary;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

const SIDES: [Side; 2] = [Side::Left, Side::Right];

// -----------------------------------------------------------------------------
// FRAME CSV FORMAT
// -----------------------------------------------------------------------------

/// Column positions of one joint. Visibility is optional.
struct JointColumns {
    side: Side,
    joint: Joint,
    x: usize,
    y: usize,
    visibility: Option<usize>,
}

struct ColumnMap {
    timestamp: usize,
    joints: Vec<JointColumns>,
}

impl ColumnMap {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self> {
        let find = |name: &str| headers.iter().position(|h| h.trim() == name);

        let timestamp = find("timestamp").ok_or_else(|| AnalysisError::MissingColumn {
            column: "timestamp".to_string(),
        })?;

        let mut joints = Vec::new();
        for side in SIDES {
            for joint in Joint::ALL {
                let prefix = column_prefix(side, joint);
                let x = find(&format!("{prefix}_x"));
                let y = find(&format!("{prefix}_y"));
                if let (Some(x), Some(y)) = (x, y) {
                    joints.push(JointColumns {
                        side,
                        joint,
                        x,
                        y,
                        visibility: find(&format!("{prefix}_visibility")),
                    });
                }
            }
        }

        Ok(Self { timestamp, joints })
    }
}

fn column_prefix(side: Side, joint: Joint) -> String {
    format!("{}_{}", side.name(), joint.name())
}

/// Empty cells mean "not tracked".
fn parse_cell(
    record: &csv::StringRecord,
    index: usize,
    row: usize,
    column: &str,
) -> Result<Option<f64>> {
    let value = record.get(index).unwrap_or("").trim();
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse::<f64>()
        .map(Some)
        .map_err(|_| AnalysisError::InvalidValue {
            row,
            column: column.to_string(),
            value: value.to_string(),
        })
}

/// Read landmark frames from a CSV file with a `timestamp` column and
/// `{left,right}_{joint}_{x,y,visibility}` columns for whichever joints were tracked.
pub fn read_frames<P: AsRef<Path>>(path: P) -> Result<Vec<LandmarkFrame>> {
    let mut reader = csv::Reader::from_path(path)?;
    let columns = ColumnMap::from_headers(reader.headers()?)?;

    let mut frames = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let row = row + 1;

        let timestamp = parse_cell(&record, columns.timestamp, row, "timestamp")?.ok_or_else(|| {
            AnalysisError::InvalidValue {
                row,
                column: "timestamp".to_string(),
                value: String::new(),
            }
        })?;

        let mut frame = LandmarkFrame::new(timestamp);
        for jc in &columns.joints {
            let prefix = column_prefix(jc.side, jc.joint);
            let x = parse_cell(&record, jc.x, row, &format!("{prefix}_x"))?;
            let y = parse_cell(&record, jc.y, row, &format!("{prefix}_y"))?;
            let visibility = match jc.visibility {
                Some(index) => parse_cell(&record, index, row, &format!("{prefix}_visibility"))?,
                None => None,
            };
            if let (Some(x), Some(y)) = (x, y) {
                let landmark = Landmark { x, y, visibility };
                frame.side_mut(jc.side).set(jc.joint, landmark);
            }
        }
        frames.push(frame);
    }

    Ok(frames)
}

/// Write frames in the format `read_frames` accepts, with a column for every joint.
pub fn write_frames<P: AsRef<Path>>(path: P, frames: &[LandmarkFrame]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;

    let mut headers = vec!["timestamp".to_string()];
    for side in SIDES {
        for joint in Joint::ALL {
            let prefix = column_prefix(side, joint);
            headers.extend(["x", "y", "visibility"].map(|axis| format!("{prefix}_{axis}")));
        }
    }
    writer.write_record(&headers)?;

    let cell = |value: Option<f64>| value.map(|v| v.to_string()).unwrap_or_default();
    for frame in frames {
        let mut record = vec![frame.timestamp.to_string()];
        for side in SIDES {
            for joint in Joint::ALL {
                let landmark = frame.side(side).get(joint);
                record.push(cell(landmark.map(|lm| lm.x)));
                record.push(cell(landmark.map(|lm| lm.y)));
                record.push(cell(landmark.and_then(|lm| lm.visibility)));
            }
        }
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

// -----------------------------------------------------------------------------
// OFFLINE REPLAY
// -----------------------------------------------------------------------------

/// Outcome of replaying one recorded session.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionReport {
    pub frames: usize,
    /// Frames whose knee angle could not be measured
    pub skipped_frames: usize,
    pub catches: Vec<f64>,
    pub finishes: Vec<f64>,
    pub summary: StrokeSummary,
}

/// Replay a frame file through a fresh processor.
pub fn process_file<P: AsRef<Path>>(config: &Config, path: P) -> Result<SessionReport> {
    let path = path.as_ref();
    let start = Instant::now();

    let frames = read_frames(path)?;
    let mut processor = FrameProcessor::new(config.clone())?;

    let mut skipped_frames = 0;
    for frame in &frames {
        let output = processor.process_frame(frame)?;
        if output.metrics.raw_knee_angle.is_none() {
            skipped_frames += 1;
        }
    }

    let detector = processor.detector();
    let report = SessionReport {
        frames: frames.len(),
        skipped_frames,
        catches: detector.catches(),
        finishes: detector.finishes(),
        summary: processor.summary(),
    };

    info!(
        path = %path.display(),
        frames = report.frames,
        strokes = report.summary.stroke_count,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "processed frame file"
    );
    Ok(report)
}

/// Replay several files in parallel, each through its own processor. Results
/// keep the input order.
pub fn process_files(config: &Config, paths: &[PathBuf]) -> Vec<(PathBuf, Result<SessionReport>)> {
    paths
        .par_iter()
        .map(|path| {
            let config = per_file_config(config, path);
            (path.clone(), process_file(&config, path))
        })
        .collect()
}

/// Parallel sessions each get their own frame log, named after the input file.
fn per_file_config(config: &Config, input: &Path) -> Config {
    let mut config = config.clone();
    if !config.logging.enable_frame_log {
        return config;
    }

    let LoggingConfig { frame_log_path, .. } = &config.logging;
    let log_path = Path::new(frame_log_path);
    let log_stem = log_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "frames".to_string());
    let input_stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "session".to_string());

    let per_file = log_path.with_file_name(format!("{log_stem}-{input_stem}.csv"));
    debug!(input = %input.display(), log = %per_file.display(), "frame log for batch file");
    config.logging.frame_log_path = per_file.display().to_string();
    config
}
