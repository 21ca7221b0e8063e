//! Stroke log and the metrics derived from it
//!
//! Each stroke owns its catch and, once the drive has peaked, its finish, so
//! catches and finishes can never drift out of step with each other.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Inter-catch intervals at or below this are jitter duplicates, not strokes.
pub const MIN_STROKE_PERIOD_SEC: f64 = 0.1;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub catch: f64,
    pub finish: Option<f64>,
}

/// Live metrics for a session.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StrokeSummary {
    pub stroke_count: usize,
    pub strokes_per_minute: f64,
    /// Absent until a full catch, finish, catch cycle has been seen
    pub drive_recovery_ratio: Option<f64>,
}

impl Default for StrokeSummary {
    fn default() -> Self {
        Self {
            stroke_count: 0,
            strokes_per_minute: 0.0,
            drive_recovery_ratio: None,
        }
    }
}

/// Append-only record of detected strokes.
///
/// With a cap set the oldest strokes are dropped but still counted, so the
/// stroke count covers the whole session while rate and ratio use what is kept.
#[derive(Clone, Debug, Default)]
pub struct StrokeLog {
    strokes: VecDeque<Stroke>,
    evicted: usize,
    cap: Option<usize>,
}

impl StrokeLog {
    pub fn new(cap: Option<usize>) -> Self {
        Self {
            strokes: VecDeque::new(),
            evicted: 0,
            cap,
        }
    }

    /// Open a new stroke. A finish on the previous stroke that does not land
    /// before this catch is dropped.
    pub fn push_catch(&mut self, timestamp: f64) {
        if let Some(previous) = self.strokes.back_mut() {
            if previous.finish.map_or(false, |finish| finish >= timestamp) {
                previous.finish = None;
            }
        }
        self.strokes.push_back(Stroke {
            catch: timestamp,
            finish: None,
        });
        self.enforce_cap();
    }

    pub fn set_cap(&mut self, cap: Option<usize>) {
        self.cap = cap;
        self.enforce_cap();
    }

    fn enforce_cap(&mut self) {
        if let Some(cap) = self.cap {
            while self.strokes.len() > cap {
                self.strokes.pop_front();
                self.evicted += 1;
            }
        }
    }

    /// Record a finish for the latest stroke. Only moves forward in time and
    /// must land strictly after that stroke's catch.
    pub fn revise_finish(&mut self, timestamp: f64) -> bool {
        let Some(stroke) = self.strokes.back_mut() else {
            return false;
        };
        if timestamp <= stroke.catch {
            return false;
        }
        if stroke.finish.map_or(true, |finish| timestamp > finish) {
            stroke.finish = Some(timestamp);
            return true;
        }
        false
    }

    pub fn last_catch(&self) -> Option<f64> {
        self.strokes.back().map(|s| s.catch)
    }

    pub fn catches(&self) -> impl Iterator<Item = f64> + '_ {
        self.strokes.iter().map(|s| s.catch)
    }

    pub fn finishes(&self) -> impl Iterator<Item = f64> + '_ {
        self.strokes.iter().filter_map(|s| s.finish)
    }

    pub fn strokes(&self) -> impl Iterator<Item = &Stroke> {
        self.strokes.iter()
    }

    /// Strokes for the whole session, including evicted ones.
    pub fn total(&self) -> usize {
        self.evicted + self.strokes.len()
    }

    pub fn retained(&self) -> usize {
        self.strokes.len()
    }

    pub fn evicted(&self) -> usize {
        self.evicted
    }

    pub fn summary(&self) -> StrokeSummary {
        let strokes: Vec<Stroke> = self.strokes.iter().copied().collect();
        let catches: Vec<f64> = strokes.iter().map(|s| s.catch).collect();
        StrokeSummary {
            stroke_count: self.total(),
            strokes_per_minute: strokes_per_minute(&catches),
            drive_recovery_ratio: drive_recovery_ratio(&strokes),
        }
    }
}

/// 60 / mean inter-catch period, ignoring periods of 0.1s or less. 0 below two catches.
pub fn strokes_per_minute(catches: &[f64]) -> f64 {
    if catches.len() < 2 {
        return 0.0;
    }

    let periods: Vec<f64> = catches
        .windows(2)
        .map(|pair| pair[1] - pair[0])
        .filter(|&period| period > MIN_STROKE_PERIOD_SEC)
        .collect();
    if periods.is_empty() {
        return 0.0;
    }

    let avg_period = periods.iter().sum::<f64>() / periods.len() as f64;
    60.0 / avg_period
}

/// Drive time over recovery time for the most recent complete stroke.
///
/// Walks back through (catch[i], finish[i], catch[i+1]) and takes the first
/// triple with catch < finish < next catch.
pub fn drive_recovery_ratio(strokes: &[Stroke]) -> Option<f64> {
    strokes.windows(2).rev().find_map(|pair| {
        let (current, next) = (&pair[0], &pair[1]);
        let finish = current.finish?;
        if !(current.catch < finish && finish < next.catch) {
            return None;
        }
        let drive = finish - current.catch;
        let recovery = next.catch - finish;
        (drive > 0.0 && recovery > 0.0).then(|| drive / recovery)
    })
}
