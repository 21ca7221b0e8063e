use super::detectors::{check_timestamp, StrokeDetector, StrokeEvent, UpdateOutcome};
use super::filters::PositionSmoother;
use super::geometry::{angle_at, angle_to_vertical, Point};
use super::landmarks::{Joint, LandmarkFrame, Side, SideLandmarks};
use super::metrics::StrokeSummary;
use crate::config::{Config, LoggingConfig};
use crate::error::Result;
use crate::utils::log::FrameLogger;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

// -----------------------------------------------------------------------------
// FRAME METRICS
// -----------------------------------------------------------------------------

/// Pixel positions of one side's joints, indexed by `Joint as usize`.
type JointPoints = [Option<Point>; 6];

fn point(points: &JointPoints, joint: Joint) -> Option<Point> {
    points[joint as usize]
}

/// Angles measured on one frame. Any of them is `None` when a joint is missing,
/// occluded or degenerate.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameMetrics {
    pub side: Side,
    /// Hip-knee-ankle angle from smoothed positions, for display
    pub knee_angle: Option<f64>,
    /// Hip-knee-ankle angle from raw positions, the value the detector sees
    pub raw_knee_angle: Option<f64>,
    /// Hip to shoulder against vertical
    pub back_tilt: Option<f64>,
    /// Ankle to knee against vertical
    pub shin_tilt: Option<f64>,
}

impl FrameMetrics {
    fn measure(side: Side, raw: &JointPoints, smoothed: &JointPoints) -> Self {
        Self {
            side,
            knee_angle: knee_angle(smoothed),
            raw_knee_angle: knee_angle(raw),
            back_tilt: tilt(smoothed, Joint::Hip, Joint::Shoulder),
            shin_tilt: tilt(smoothed, Joint::Ankle, Joint::Knee),
        }
    }
}

fn knee_angle(points: &JointPoints) -> Option<f64> {
    angle_at(
        point(points, Joint::Hip)?,
        point(points, Joint::Knee)?,
        point(points, Joint::Ankle)?,
    )
}

fn tilt(points: &JointPoints, from: Joint, to: Joint) -> Option<f64> {
    angle_to_vertical(point(points, from)?, point(points, to)?)
}

/// Everything one call to `FrameProcessor::process_frame` produced.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameOutput {
    pub timestamp: f64,
    pub metrics: FrameMetrics,
    pub outcome: UpdateOutcome,
    pub summary: StrokeSummary,
}

impl FrameOutput {
    pub fn events(&self) -> Vec<StrokeEvent> {
        self.outcome.events()
    }
}

// -----------------------------------------------------------------------------
// FRAME PROCESSOR
// -----------------------------------------------------------------------------

/// One rowing session: position smoothing, the stroke detector and the
/// optional frame log. Run one instance per session; instances share nothing.
pub struct FrameProcessor {
    config: Config,
    smoother: PositionSmoother,
    detector: StrokeDetector,
    frame_log: Option<FrameLogger>,
    last_timestamp: Option<f64>,
    frames_processed: usize,
}

impl FrameProcessor {
    pub fn new(config: Config) -> Result<Self> {
        let config = config.sanitized();
        let frame_log = open_frame_log(&config.logging)?;
        info!(
            catch_angle_max = config.detector.catch_angle_max,
            adaptive = config.detector.adaptive_threshold_enabled,
            frame_log = frame_log.is_some(),
            "session started"
        );

        Ok(Self {
            smoother: PositionSmoother::new(config.smoothing.position_alpha),
            detector: StrokeDetector::new(config.detector.clone()),
            frame_log,
            last_timestamp: None,
            frames_processed: 0,
            config,
        })
    }

    /// Run one tracked frame through the pipeline.
    ///
    /// Frames whose knee angle cannot be measured are still accepted: the
    /// posture angles that can be measured are reported and the detector is left alone.
    pub fn process_frame(&mut self, frame: &LandmarkFrame) -> Result<FrameOutput> {
        check_timestamp(self.last_timestamp, frame.timestamp)?;
        self.last_timestamp = Some(frame.timestamp);
        self.frames_processed += 1;

        let side = frame.facing_side();
        let raw = self.visible_points(frame.side(side));
        let smoothed = self.smooth(side, &raw);
        let metrics = FrameMetrics::measure(side, &raw, &smoothed);

        let outcome = match metrics.raw_knee_angle {
            Some(angle) => self.detector.update(frame.timestamp, angle)?,
            None => {
                debug!(
                    timestamp = frame.timestamp,
                    side = side.name(),
                    "knee angle undefined, frame skipped"
                );
                UpdateOutcome::Skipped
            }
        };

        let output = FrameOutput {
            timestamp: frame.timestamp,
            metrics,
            outcome,
            summary: self.detector.summary(),
        };
        self.write_frame_log(&output);
        Ok(output)
    }

    pub fn summary(&self) -> StrokeSummary {
        self.detector.summary()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn detector(&self) -> &StrokeDetector {
        &self.detector
    }

    pub fn frames_processed(&self) -> usize {
        self.frames_processed
    }

    /// Discard the session and start a fresh one with the same config. The
    /// frame log stays open.
    pub fn reset(&mut self) {
        self.smoother = PositionSmoother::new(self.config.smoothing.position_alpha);
        self.detector = StrokeDetector::new(self.config.detector.clone());
        self.last_timestamp = None;
        self.frames_processed = 0;
        info!("session reset");
    }

    /// Apply operator changes at runtime. Returns `true` when the change
    /// invalidated the windowed buffers and a fresh session was started.
    pub fn update_config(&mut self, config: Config) -> Result<bool> {
        let config = config.sanitized();
        if config.logging != self.config.logging {
            self.frame_log = open_frame_log(&config.logging)?;
        }

        let fresh = self
            .config
            .detector
            .invalidates_windows(&config.detector);
        self.smoother.set_alpha(config.smoothing.position_alpha);
        self.config = config;

        if fresh {
            info!("detector windows changed");
            self.reset();
        } else {
            self.detector.reconfigure(self.config.detector.clone());
        }
        Ok(fresh)
    }

    fn visible_points(&self, landmarks: &SideLandmarks) -> JointPoints {
        let processor = &self.config.processor;
        Joint::ALL.map(|joint| {
            landmarks
                .get(joint)
                .filter(|lm| lm.x.is_finite() && lm.y.is_finite())
                .filter(|lm| lm.is_visible(processor.min_visibility))
                .map(|lm| lm.to_pixels(processor.frame_width, processor.frame_height))
        })
    }

    fn smooth(&mut self, side: Side, raw: &JointPoints) -> JointPoints {
        let smoother = &mut self.smoother;
        Joint::ALL.map(|joint| point(raw, joint).map(|pos| smoother.smooth(side, joint, pos)))
    }

    fn write_frame_log(&mut self, output: &FrameOutput) {
        let Some(log) = self.frame_log.as_mut() else {
            return;
        };
        if let Err(err) = log.record(output) {
            warn!(
                error = %err,
                path = %log.path().display(),
                "frame log disabled after write failure"
            );
            self.frame_log = None;
        }
    }
}

fn open_frame_log(logging: &LoggingConfig) -> Result<Option<FrameLogger>> {
    if !logging.enable_frame_log {
        return Ok(None);
    }
    FrameLogger::create(&logging.frame_log_path).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalysisError;
    use crate::local::simulate::{pose_frame, SyntheticRower};
    use crate::processing::landmarks::Landmark;

    const WIDTH: u32 = 1280;
    const HEIGHT: u32 = 720;

    fn processor() -> FrameProcessor {
        FrameProcessor::new(Config::default()).unwrap()
    }

    fn assert_close(value: Option<f64>, expected: f64) {
        let value = value.expect("angle should be defined");
        assert!((value - expected).abs() < 1e-6, "{value} != {expected}");
    }

    #[test]
    fn first_frame_measures_pose_exactly() {
        let mut processor = processor();
        let output = processor
            .process_frame(&pose_frame(0.0, 120.0, 0.0, WIDTH, HEIGHT))
            .unwrap();

        assert_eq!(output.metrics.side, Side::Right);
        assert_close(output.metrics.raw_knee_angle, 120.0);
        // smoothing is seeded by the first sample
        assert_close(output.metrics.knee_angle, 120.0);
        assert_close(output.metrics.back_tilt, 0.0);
        assert_close(output.metrics.shin_tilt, 0.0);
        assert!(matches!(output.outcome, UpdateOutcome::Accepted(_)));
    }

    #[test]
    fn occluded_knee_skips_detector() {
        let mut processor = processor();
        let mut frame = pose_frame(0.0, 120.0, 10.0, WIDTH, HEIGHT);
        frame.right.knee = frame.right.knee.map(|lm| lm.with_visibility(0.1));
        frame.left.knee = None;

        let output = processor.process_frame(&frame).unwrap();
        assert_eq!(output.metrics.raw_knee_angle, None);
        assert_eq!(output.metrics.shin_tilt, None);
        assert_close(output.metrics.back_tilt, 10.0);
        assert_eq!(output.outcome, UpdateOutcome::Skipped);
        assert_eq!(processor.detector().history_len(), 0);
        assert_eq!(output.summary, StrokeSummary::default());
    }

    #[test]
    fn coincident_landmarks_are_undefined_not_zero() {
        let mut processor = processor();
        let mut frame = pose_frame(0.0, 120.0, 0.0, WIDTH, HEIGHT);
        frame.right.hip = frame.right.knee;

        let output = processor.process_frame(&frame).unwrap();
        assert_eq!(output.metrics.raw_knee_angle, None);
        assert_eq!(output.outcome, UpdateOutcome::Skipped);
    }

    #[test]
    fn more_visible_side_is_measured() {
        let mut processor = processor();
        let mut frame = pose_frame(0.0, 120.0, 0.0, WIDTH, HEIGHT);
        let left = pose_frame(0.0, 90.0, 0.0, WIDTH, HEIGHT).right;
        frame.left = left;
        frame.left.knee = frame.left.knee.map(|lm| lm.with_visibility(0.99));

        let output = processor.process_frame(&frame).unwrap();
        assert_eq!(output.metrics.side, Side::Left);
        assert_close(output.metrics.raw_knee_angle, 90.0);
    }

    #[test]
    fn frame_order_is_enforced() {
        let mut processor = processor();
        processor
            .process_frame(&pose_frame(1.0, 120.0, 0.0, WIDTH, HEIGHT))
            .unwrap();
        let err = processor
            .process_frame(&pose_frame(0.5, 120.0, 0.0, WIDTH, HEIGHT))
            .unwrap_err();
        assert!(matches!(err, AnalysisError::OutOfOrderTimestamp { .. }));
        assert_eq!(processor.frames_processed(), 1);
    }

    #[test]
    fn simulated_session_produces_strokes() {
        let rower = SyntheticRower::default();
        let mut processor = processor();
        let mut events = Vec::new();
        for frame in rower.frames(20.0) {
            events.extend(processor.process_frame(&frame).unwrap().events());
        }

        // knee minima at t = 2, 4, .. 18; the one at t = 0 has no descent before it
        let summary = processor.summary();
        assert_eq!(summary.stroke_count, 9);
        assert!((summary.strokes_per_minute - 30.0).abs() < 0.5);
        let ratio = summary.drive_recovery_ratio.unwrap();
        assert!((ratio - 0.5).abs() < 0.1, "ratio: {ratio}");

        let catches: Vec<f64> = events
            .iter()
            .filter(|e| matches!(e, StrokeEvent::Catch { .. }))
            .map(StrokeEvent::timestamp)
            .collect();
        assert_eq!(catches.len(), summary.stroke_count);
        let frame_sec = 1.0 / rower.sample_rate_hz;
        for catch in catches {
            let minimum = (catch / rower.stroke_period_sec).round() * rower.stroke_period_sec;
            assert!((catch - minimum).abs() <= 2.0 * frame_sec, "catch at {catch}");
        }
    }

    #[test]
    fn threshold_change_keeps_history_but_window_change_resets() {
        let rower = SyntheticRower::default();
        let mut processor = processor();
        for frame in rower.frames(8.0) {
            processor.process_frame(&frame).unwrap();
        }
        let before = processor.summary();
        assert!(before.stroke_count > 0);

        let mut config = processor.config().clone();
        config.detector.catch_angle_max = 115.0;
        config.smoothing.position_alpha = 0.5;
        assert!(!processor.update_config(config.clone()).unwrap());
        assert_eq!(processor.summary(), before);

        config.detector.raw_smoothing_window = 7;
        assert!(processor.update_config(config).unwrap());
        assert_eq!(processor.summary(), StrokeSummary::default());
        assert_eq!(processor.frames_processed(), 0);
    }

    #[test]
    fn reset_allows_timestamps_to_restart() {
        let mut processor = processor();
        processor
            .process_frame(&pose_frame(5.0, 120.0, 0.0, WIDTH, HEIGHT))
            .unwrap();
        processor.reset();
        assert!(processor
            .process_frame(&pose_frame(0.0, 120.0, 0.0, WIDTH, HEIGHT))
            .is_ok());
    }

    #[test]
    fn non_finite_coordinates_count_as_missing() {
        let mut processor = processor();
        let mut frame = pose_frame(0.0, 120.0, 0.0, WIDTH, HEIGHT);
        frame.right.ankle = Some(Landmark::new(f64::NAN, 0.5).with_visibility(0.9));

        let output = processor.process_frame(&frame).unwrap();
        assert_eq!(output.metrics.raw_knee_angle, None);
    }
}
