pub mod stroke;
pub mod threshold;

pub use stroke::StrokeDetector;
pub use threshold::{CatchThreshold, ThresholdSource};

use crate::error::{AnalysisError, Result};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::warn;

/// Timestamps must be finite and never go backwards; equal timestamps are allowed.
pub fn check_timestamp(previous: Option<f64>, current: f64) -> Result<()> {
    if !current.is_finite() {
        return Err(AnalysisError::NonFiniteTimestamp(current));
    }
    match previous {
        Some(previous) if current < previous => {
            warn!(previous, current, "rejecting out-of-order sample");
            Err(AnalysisError::OutOfOrderTimestamp { previous, current })
        }
        _ => Ok(()),
    }
}

// SAMPLE TYPES ----------------------------------------------------------------

/// One raw angle reading, in degrees within [0, 180].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct JointSample {
    pub timestamp: f64,
    pub angle: f64,
}

/// Finite-difference slope between two consecutive raw samples, in degrees per second.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DerivativeSample {
    pub timestamp: f64,
    pub slope: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum StrokeEvent {
    Catch { timestamp: f64 },
    Finish { timestamp: f64 },
}

impl StrokeEvent {
    pub fn timestamp(&self) -> f64 {
        match self {
            StrokeEvent::Catch { timestamp } | StrokeEvent::Finish { timestamp } => *timestamp,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StrokeEvent::Catch { .. } => "catch",
            StrokeEvent::Finish { .. } => "finish",
        }
    }
}

// CATCH DECISION --------------------------------------------------------------

/// Which rule, if any, accepted a catch on this update. At most one per update.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CatchDecision {
    None,
    /// Derivative valley below threshold, confirmed by a run of rising slopes
    PrimaryCatch,
    /// Centred windowed minimum below threshold, recovered without derivative evidence
    FallbackCatch,
}

impl CatchDecision {
    pub fn is_catch(&self) -> bool {
        !matches!(self, CatchDecision::None)
    }

    pub fn name(&self) -> &'static str {
        match self {
            CatchDecision::None => "none",
            CatchDecision::PrimaryCatch => "primary",
            CatchDecision::FallbackCatch => "fallback",
        }
    }
}

/// What one `StrokeDetector::update` call did.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UpdateOutcome {
    /// Undefined angle; nothing changed
    Skipped,
    Accepted(DetectorUpdate),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectorUpdate {
    pub catch: CatchDecision,
    /// Timestamp of the accepted minimum. The catch is confirmed a few samples
    /// after the knee bottoms out, so this trails the update's own timestamp.
    pub catch_at: Option<f64>,
    /// Set when this update recorded or moved the current stroke's finish
    pub finish: Option<f64>,
    pub threshold: CatchThreshold,
}

impl UpdateOutcome {
    pub fn events(&self) -> Vec<StrokeEvent> {
        let mut events = Vec::new();
        if let UpdateOutcome::Accepted(update) = self {
            if let Some(timestamp) = update.catch_at {
                events.push(StrokeEvent::Catch { timestamp });
            }
            if let Some(finish) = update.finish {
                events.push(StrokeEvent::Finish { timestamp: finish });
            }
        }
        events
    }
}

// TIMED WINDOW ----------------------------------------------------------------

/// Raw sample history bounded by age rather than count.
///
/// Eviction never drops below `min_keep` samples so count-based windows stay
/// filled even when frames arrive slowly.
#[derive(Clone, Debug)]
pub struct TimedWindow {
    samples: VecDeque<JointSample>,
    span_sec: f64,
    min_keep: usize,
}

impl TimedWindow {
    pub fn new(span_sec: f64, min_keep: usize) -> Self {
        Self {
            samples: VecDeque::new(),
            span_sec,
            min_keep,
        }
    }

    pub fn push(&mut self, sample: JointSample) {
        self.samples.push_back(sample);
        let cutoff = sample.timestamp - self.span_sec;
        while self.samples.len() > self.min_keep {
            match self.samples.front() {
                Some(oldest) if oldest.timestamp < cutoff => {
                    self.samples.pop_front();
                }
                _ => break,
            }
        }
    }

    pub fn latest(&self) -> Option<&JointSample> {
        self.samples.back()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// The last `n` samples, oldest first. `None` until `n` samples exist.
    pub fn last_n(&self, n: usize) -> Option<impl Iterator<Item = &JointSample>> {
        if n == 0 || self.samples.len() < n {
            return None;
        }
        Some(self.samples.iter().skip(self.samples.len() - n))
    }

    /// Samples taken at or after `since`.
    pub fn since(&self, since: f64) -> impl Iterator<Item = &JointSample> {
        self.samples.iter().filter(move |s| s.timestamp >= since)
    }

    pub fn set_span(&mut self, span_sec: f64, min_keep: usize) {
        self.span_sec = span_sec;
        self.min_keep = min_keep;
    }
}
