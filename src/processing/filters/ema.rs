//! Exponential moving average for joint positions
//!
//! value = alpha * sample + (1 - alpha) * value
//! - Higher alpha follows the tracker closely, lower alpha hides jitter
//! - The first sample seeds the state so a joint shows no lag when it appears

use super::SampleFilter;
use crate::config::MAX_POSITION_ALPHA;
use crate::processing::geometry::Point;
use crate::processing::landmarks::{Joint, Side};
use std::collections::HashMap;

/// Scalar EMA accumulator
#[derive(Debug, Clone, Copy)]
pub struct Ema {
    alpha: f64,
    value: Option<f64>,
}

impl Ema {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha: clamp_alpha(alpha),
            value: None,
        }
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn set_alpha(&mut self, alpha: f64) {
        self.alpha = clamp_alpha(alpha);
    }
}

impl SampleFilter for Ema {
    fn filter_sample(&mut self, sample: f64) -> Option<f64> {
        let next = match self.value {
            None => sample,
            Some(state) => self.alpha * sample + (1.0 - self.alpha) * state,
        };
        self.value = Some(next);
        self.value
    }

    fn current(&self) -> Option<f64> {
        self.value
    }

    fn reset(&mut self) {
        self.value = None;
    }
}

fn clamp_alpha(alpha: f64) -> f64 {
    if alpha.is_finite() {
        alpha.clamp(0.0, MAX_POSITION_ALPHA)
    } else {
        0.0
    }
}

/// Pair of EMAs for a 2D position
#[derive(Debug, Clone, Copy)]
struct Ema2D {
    x: Ema,
    y: Ema,
}

impl Ema2D {
    fn new(alpha: f64) -> Self {
        Self {
            x: Ema::new(alpha),
            y: Ema::new(alpha),
        }
    }

    fn filter(&mut self, pos: Point) -> Point {
        let x = self.x.filter_sample(pos.0).unwrap_or(pos.0);
        let y = self.y.filter_sample(pos.1).unwrap_or(pos.1);
        (x, y)
    }

    fn set_alpha(&mut self, alpha: f64) {
        self.x.set_alpha(alpha);
        self.y.set_alpha(alpha);
    }
}

/// Independent position EMAs, one per tracked joint of each side.
///
/// Accumulators are created lazily on a joint's first sample and never
/// influence each other.
#[derive(Debug, Clone)]
pub struct PositionSmoother {
    alpha: f64,
    joints: HashMap<(Side, Joint), Ema2D>,
}

impl PositionSmoother {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha: clamp_alpha(alpha),
            joints: HashMap::new(),
        }
    }

    pub fn smooth(&mut self, side: Side, joint: Joint, pos: Point) -> Point {
        let alpha = self.alpha;
        self.joints
            .entry((side, joint))
            .or_insert_with(|| Ema2D::new(alpha))
            .filter(pos)
    }

    /// Last smoothed position for a joint, if it has been seen.
    pub fn position(&self, side: Side, joint: Joint) -> Option<Point> {
        let ema = self.joints.get(&(side, joint))?;
        Some((ema.x.current()?, ema.y.current()?))
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Retune without discarding accumulated state.
    pub fn set_alpha(&mut self, alpha: f64) {
        self.alpha = clamp_alpha(alpha);
        for ema in self.joints.values_mut() {
            ema.set_alpha(self.alpha);
        }
    }

    pub fn tracked_joints(&self) -> usize {
        self.joints.len()
    }

    pub fn reset(&mut self) {
        self.joints.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_seeds_state() {
        let mut ema = Ema::new(0.2);
        assert_eq!(ema.current(), None);
        assert_eq!(ema.filter_sample(100.0), Some(100.0));
    }

    #[test]
    fn follows_recurrence() {
        let mut ema = Ema::new(0.2);
        ema.filter_sample(100.0);
        let v = ema.filter_sample(200.0).unwrap();
        assert!((v - 120.0).abs() < 1e-9);
        let v = ema.filter_sample(200.0).unwrap();
        assert!((v - 136.0).abs() < 1e-9);
    }

    #[test]
    fn alpha_is_clamped() {
        assert_eq!(Ema::new(1.0).alpha(), MAX_POSITION_ALPHA);
        assert_eq!(Ema::new(-2.0).alpha(), 0.0);
        assert_eq!(Ema::new(f64::NAN).alpha(), 0.0);
    }

    #[test]
    fn joints_are_independent() {
        let mut smoother = PositionSmoother::new(0.5);
        smoother.smooth(Side::Left, Joint::Knee, (10.0, 10.0));
        smoother.smooth(Side::Left, Joint::Hip, (0.0, 0.0));
        let knee = smoother.smooth(Side::Left, Joint::Knee, (20.0, 30.0));
        assert_eq!(knee, (15.0, 20.0));
        assert_eq!(smoother.position(Side::Left, Joint::Hip), Some((0.0, 0.0)));
        assert_eq!(smoother.position(Side::Right, Joint::Knee), None);
        assert_eq!(smoother.tracked_joints(), 2);
    }

    #[test]
    fn late_joint_has_no_lag() {
        let mut smoother = PositionSmoother::new(0.2);
        for i in 0..10 {
            smoother.smooth(Side::Right, Joint::Hip, (i as f64, 0.0));
        }
        let wrist = smoother.smooth(Side::Right, Joint::Wrist, (400.0, 300.0));
        assert_eq!(wrist, (400.0, 300.0));
    }

    #[test]
    fn retune_keeps_state() {
        let mut smoother = PositionSmoother::new(0.2);
        smoother.smooth(Side::Left, Joint::Ankle, (0.0, 0.0));
        smoother.set_alpha(0.5);
        let p = smoother.smooth(Side::Left, Joint::Ankle, (10.0, 10.0));
        assert_eq!(p, (5.0, 5.0));
        smoother.reset();
        assert_eq!(smoother.tracked_joints(), 0);
    }
}
