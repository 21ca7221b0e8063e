//! Stroke cycle detection on a timestamped knee angle stream
//!
//! Recovery -> Catch -> Drive -> Finish -> Recovery. A catch is never a
//! single crisp trigger: it needs the smoothed angle under the catch threshold,
//! a confirmed local minimum, and the refractory period to have passed. A
//! minimum is only confirmed once the knee has started to open again, so a
//! catch is recognised a few samples late and stamped with the minimum's own
//! timestamp. The primary rule confirms it with a run of rising slopes; the
//! fallback rule recovers catches that noisy derivatives hide by waiting until
//! the minimum sits in the middle of the local-minimum window. Finishes are the
//! drive's running maximum and only ever move forward in time.

use super::threshold::CatchThreshold;
use super::{
    check_timestamp, CatchDecision, DerivativeSample, DetectorUpdate, JointSample, TimedWindow,
    UpdateOutcome,
};
use crate::config::DetectorConfig;
use crate::error::Result;
use crate::processing::filters::{SampleFilter, TrailingMean};
use crate::processing::metrics::{StrokeLog, StrokeSummary};
use std::collections::VecDeque;
use tracing::debug;

/// Timestamps closer than this give no usable slope; the derivative sample is suppressed.
pub const MIN_DT_SEC: f64 = 1e-6;
/// A fallback catch this close to a recorded catch is the same catch.
pub const CATCH_DEDUP_EPSILON_SEC: f64 = 1e-3;
/// Samples since the catch before a finish is estimated.
pub const MIN_DRIVE_SAMPLES: usize = 3;
/// Derivative samples kept; the flip test only looks at the last two.
const DERIVATIVE_HISTORY: usize = 2;

/// Everything the catch rules look at for one update.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CatchEvidence {
    /// Trailing mean of raw angles, `None` until the window fills
    pub smoothed_angle: Option<f64>,
    pub threshold: f64,
    /// Bottom of the last negative to non-negative slope flip, kept only while
    /// no negative slope has followed and nothing in the local-minimum window
    /// is lower
    pub valley: Option<JointSample>,
    pub positive_streak: usize,
    pub confirm_frames: usize,
    /// Centre sample of the full local-minimum window when it is a turn: lower
    /// than every sample before it, no higher than any after, and below at least
    /// one of those
    pub window_minimum: Option<JointSample>,
    pub last_catch: Option<f64>,
    pub min_catch_interval_sec: f64,
}

impl CatchEvidence {
    fn below_threshold(&self) -> bool {
        self.smoothed_angle
            .map_or(false, |angle| angle <= self.threshold)
    }

    fn refractory_elapsed(&self, candidate: &JointSample) -> bool {
        self.last_catch.map_or(true, |last| {
            candidate.timestamp - last > self.min_catch_interval_sec
        })
    }

    fn duplicates_recorded_catch(&self, candidate: &JointSample) -> bool {
        self.last_catch.map_or(false, |last| {
            (candidate.timestamp - last).abs() <= CATCH_DEDUP_EPSILON_SEC
        })
    }

    /// Evaluate both catch rules and return the accepted minimum with the rule
    /// that accepted it. The primary rule wins when both hold, so an update
    /// emits at most one catch.
    pub fn decide(&self) -> (CatchDecision, Option<JointSample>) {
        if !self.below_threshold() {
            return (CatchDecision::None, None);
        }

        if let Some(valley) = self.valley {
            if self.positive_streak >= self.confirm_frames && self.refractory_elapsed(&valley) {
                return (CatchDecision::PrimaryCatch, Some(valley));
            }
        }

        if let Some(minimum) = self.window_minimum {
            if self.refractory_elapsed(&minimum) && !self.duplicates_recorded_catch(&minimum) {
                return (CatchDecision::FallbackCatch, Some(minimum));
            }
        }

        (CatchDecision::None, None)
    }
}

/// Streaming catch/finish detector for one session.
///
/// Feed one `(timestamp, angle)` pair per frame with non-decreasing timestamps.
pub struct StrokeDetector {
    config: DetectorConfig,
    history: TimedWindow,
    derivatives: VecDeque<DerivativeSample>,
    trailing: TrailingMean,
    positive_streak: usize,
    valley: Option<JointSample>,
    local_min: Option<JointSample>,
    drive_peak: Option<JointSample>,
    drive_samples: usize,
    strokes: StrokeLog,
    last_timestamp: Option<f64>,
    threshold: CatchThreshold,
}

impl StrokeDetector {
    pub fn new(config: DetectorConfig) -> Self {
        let config = config.sanitized();
        Self {
            history: TimedWindow::new(config.adaptive_window_sec, config.local_min_window_size),
            derivatives: VecDeque::with_capacity(DERIVATIVE_HISTORY + 1),
            trailing: TrailingMean::new(config.raw_smoothing_window),
            positive_streak: 0,
            valley: None,
            local_min: None,
            drive_peak: None,
            drive_samples: 0,
            strokes: StrokeLog::new(config.max_stroke_history),
            last_timestamp: None,
            threshold: CatchThreshold::fixed(config.catch_angle_max),
            config,
        }
    }

    /// Consume one frame's angle.
    ///
    /// Undefined angles (NaN, outside [0, 180]) are skipped without touching any
    /// state. A timestamp earlier than the previous accepted one is rejected.
    pub fn update(&mut self, timestamp: f64, angle: f64) -> Result<UpdateOutcome> {
        check_timestamp(self.last_timestamp, timestamp)?;
        if !is_defined_angle(angle) {
            return Ok(UpdateOutcome::Skipped);
        }

        let sample = JointSample { timestamp, angle };
        self.record_derivative(&sample);
        self.history.push(sample);
        self.last_timestamp = Some(timestamp);

        let smoothed_angle = self.trailing.filter_sample(angle);
        self.local_min = self.centred_window_minimum();
        self.threshold = CatchThreshold::resolve(&self.config, &self.history, timestamp);

        let evidence = CatchEvidence {
            smoothed_angle,
            threshold: self.threshold.degrees,
            valley: self.valley.filter(|v| self.is_window_min(v)),
            positive_streak: self.positive_streak,
            confirm_frames: self.config.confirm_frames,
            window_minimum: self.local_min,
            last_catch: self.strokes.last_catch(),
            min_catch_interval_sec: self.config.min_catch_interval_sec,
        };

        let (catch, minimum) = evidence.decide();
        match minimum {
            Some(minimum) => self.record_catch(minimum, catch),
            None => self.track_drive(sample),
        }
        let finish = self.revise_finish();

        Ok(UpdateOutcome::Accepted(DetectorUpdate {
            catch,
            catch_at: minimum.map(|m| m.timestamp),
            finish,
            threshold: self.threshold,
        }))
    }

    pub fn summary(&self) -> StrokeSummary {
        self.strokes.summary()
    }

    pub fn strokes(&self) -> &StrokeLog {
        &self.strokes
    }

    pub fn catches(&self) -> Vec<f64> {
        self.strokes.catches().collect()
    }

    pub fn finishes(&self) -> Vec<f64> {
        self.strokes.finishes().collect()
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Threshold resolved on the last accepted update.
    pub fn threshold(&self) -> CatchThreshold {
        self.threshold
    }

    pub fn smoothed_angle(&self) -> Option<f64> {
        self.trailing.current()
    }

    pub fn positive_streak(&self) -> usize {
        self.positive_streak
    }

    /// Confirmed minimum at the centre of the local-minimum window, if any.
    pub fn local_min(&self) -> Option<JointSample> {
        self.local_min
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn last_timestamp(&self) -> Option<f64> {
        self.last_timestamp
    }

    /// Apply operator changes. Window sizes change what the buffers mean, so
    /// changing them starts a fresh detector; returns `true` when that happened.
    pub fn reconfigure(&mut self, config: DetectorConfig) -> bool {
        let config = config.sanitized();
        if self.config.invalidates_windows(&config) {
            *self = Self::new(config);
            return true;
        }

        self.history
            .set_span(config.adaptive_window_sec, config.local_min_window_size);
        self.strokes.set_cap(config.max_stroke_history);
        self.config = config;
        false
    }

    /// Replace all state with a fresh instance using the same config.
    pub fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }

    fn record_derivative(&mut self, sample: &JointSample) {
        let Some(prev) = self.history.latest().copied() else {
            return;
        };
        let dt = sample.timestamp - prev.timestamp;
        if dt < MIN_DT_SEC {
            return;
        }

        let slope = (sample.angle - prev.angle) / dt;
        if slope >= 0.0 {
            let after_descent = self.derivatives.back().map_or(false, |d| d.slope < 0.0);
            if after_descent {
                self.valley = Some(prev);
            }
            self.positive_streak += 1;
        } else {
            self.positive_streak = 0;
            self.valley = None;
        }

        self.derivatives.push_back(DerivativeSample {
            timestamp: sample.timestamp,
            slope,
        });
        while self.derivatives.len() > DERIVATIVE_HISTORY {
            self.derivatives.pop_front();
        }
    }

    /// Whether `candidate` sits inside the trailing local-minimum window and no
    /// sample there is lower. False until the window has filled.
    fn is_window_min(&self, candidate: &JointSample) -> bool {
        let Some(window) = self.history.last_n(self.config.local_min_window_size) else {
            return false;
        };
        let mut contains = false;
        for s in window {
            if s.angle < candidate.angle {
                return false;
            }
            contains |= s.timestamp == candidate.timestamp;
        }
        contains
    }

    /// The centre of the full local-minimum window, when the knee came down to
    /// it and has since started back up. A held angle never qualifies.
    fn centred_window_minimum(&self) -> Option<JointSample> {
        let n = self.config.local_min_window_size;
        let window: Vec<JointSample> = self.history.last_n(n)?.copied().collect();
        let centre = window[n / 2];
        let (before, after) = (&window[..n / 2], &window[n / 2 + 1..]);

        let descended = before.iter().all(|s| s.angle > centre.angle);
        let lowest = after.iter().all(|s| s.angle >= centre.angle);
        let rising = after.iter().any(|s| s.angle > centre.angle);
        (descended && lowest && rising).then_some(centre)
    }

    /// Open a stroke at `minimum`. Samples after it already belong to the new
    /// drive, so the running peak restarts from them.
    fn record_catch(&mut self, minimum: JointSample, rule: CatchDecision) {
        self.strokes.push_catch(minimum.timestamp);
        self.valley = None;

        let mut drive_samples = 0;
        let mut drive_peak = minimum;
        for s in self.history.since(minimum.timestamp) {
            drive_samples += 1;
            if s.angle > drive_peak.angle {
                drive_peak = *s;
            }
        }
        self.drive_peak = Some(drive_peak);
        self.drive_samples = drive_samples.max(1);

        debug!(
            timestamp = minimum.timestamp,
            angle = minimum.angle,
            threshold = self.threshold.degrees,
            rule = rule.name(),
            strokes = self.strokes.total(),
            "catch"
        );
    }

    fn track_drive(&mut self, sample: JointSample) {
        let Some(peak) = self.drive_peak.as_mut() else {
            return;
        };
        self.drive_samples += 1;
        if sample.angle > peak.angle {
            *peak = sample;
        }
    }

    fn revise_finish(&mut self) -> Option<f64> {
        if self.drive_samples < MIN_DRIVE_SAMPLES {
            return None;
        }
        let peak = self.drive_peak?;
        if self.strokes.revise_finish(peak.timestamp) {
            debug!(timestamp = peak.timestamp, angle = peak.angle, "finish");
            return Some(peak.timestamp);
        }
        None
    }
}

fn is_defined_angle(angle: f64) -> bool {
    angle.is_finite() && (0.0..=180.0).contains(&angle)
}
