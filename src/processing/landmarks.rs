//! Tracked joints as delivered by the upstream pose tracker.
//!
//! Coordinates are normalized to 0..1 of the frame, with an optional
//! visibility score per joint.

use super::geometry::Point;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Joint {
    Shoulder,
    Elbow,
    Wrist,
    Hip,
    Knee,
    Ankle,
}

impl Joint {
    pub const ALL: [Joint; 6] = [
        Joint::Shoulder,
        Joint::Elbow,
        Joint::Wrist,
        Joint::Hip,
        Joint::Knee,
        Joint::Ankle,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Joint::Shoulder => "shoulder",
            Joint::Elbow => "elbow",
            Joint::Wrist => "wrist",
            Joint::Hip => "hip",
            Joint::Knee => "knee",
            Joint::Ankle => "ankle",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn name(&self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single joint position (normalized coordinates)
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64, // 0-1 normalized
    pub y: f64, // 0-1 normalized, growing downwards
    pub visibility: Option<f64>,
}

impl Landmark {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            visibility: None,
        }
    }

    pub fn with_visibility(mut self, visibility: f64) -> Self {
        self.visibility = Some(visibility);
        self
    }

    /// Scale to pixel space so angles respect the frame's aspect ratio.
    pub fn to_pixels(&self, width: u32, height: u32) -> Point {
        (self.x * width as f64, self.y * height as f64)
    }

    /// Missing visibility counts as fully visible.
    pub fn is_visible(&self, min_visibility: f64) -> bool {
        self.visibility.map_or(true, |v| v >= min_visibility)
    }
}

/// The joints of one body side. Any joint may be absent for a frame.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SideLandmarks {
    pub shoulder: Option<Landmark>,
    pub elbow: Option<Landmark>,
    pub wrist: Option<Landmark>,
    pub hip: Option<Landmark>,
    pub knee: Option<Landmark>,
    pub ankle: Option<Landmark>,
}

impl SideLandmarks {
    pub fn get(&self, joint: Joint) -> Option<&Landmark> {
        match joint {
            Joint::Shoulder => self.shoulder.as_ref(),
            Joint::Elbow => self.elbow.as_ref(),
            Joint::Wrist => self.wrist.as_ref(),
            Joint::Hip => self.hip.as_ref(),
            Joint::Knee => self.knee.as_ref(),
            Joint::Ankle => self.ankle.as_ref(),
        }
    }

    pub fn set(&mut self, joint: Joint, landmark: Landmark) {
        let slot = match joint {
            Joint::Shoulder => &mut self.shoulder,
            Joint::Elbow => &mut self.elbow,
            Joint::Wrist => &mut self.wrist,
            Joint::Hip => &mut self.hip,
            Joint::Knee => &mut self.knee,
            Joint::Ankle => &mut self.ankle,
        };
        *slot = Some(landmark);
    }
}

/// Everything the tracker reports for one video frame.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LandmarkFrame {
    /// Seconds since the start of the session
    pub timestamp: f64,
    pub left: SideLandmarks,
    pub right: SideLandmarks,
}

impl LandmarkFrame {
    pub fn new(timestamp: f64) -> Self {
        Self {
            timestamp,
            ..Default::default()
        }
    }

    pub fn side(&self, side: Side) -> &SideLandmarks {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    pub fn side_mut(&mut self, side: Side) -> &mut SideLandmarks {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }

    /// The side facing the camera, judged by knee visibility.
    pub fn facing_side(&self) -> Side {
        choose_side(
            self.left.knee.and_then(|lm| lm.visibility),
            self.right.knee.and_then(|lm| lm.visibility),
        )
    }
}

/// Pick the side with the greater visibility. Missing scores rank below any
/// reported one and ties go to the left side.
pub fn choose_side(left_visibility: Option<f64>, right_visibility: Option<f64>) -> Side {
    let left = left_visibility.unwrap_or(-1.0);
    let right = right_visibility.unwrap_or(-1.0);
    if left >= right {
        Side::Left
    } else {
        Side::Right
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn more_visible_side_wins() {
        assert_eq!(choose_side(Some(0.4), Some(0.9)), Side::Right);
        assert_eq!(choose_side(Some(0.9), Some(0.4)), Side::Left);
    }

    #[test]
    fn ties_and_missing_scores_default_left() {
        assert_eq!(choose_side(Some(0.5), Some(0.5)), Side::Left);
        assert_eq!(choose_side(None, None), Side::Left);
        assert_eq!(choose_side(None, Some(0.0)), Side::Right);
    }

    #[test]
    fn facing_side_reads_knee_visibility() {
        let mut frame = LandmarkFrame::new(0.0);
        frame.left.knee = Some(Landmark::new(0.5, 0.5).with_visibility(0.2));
        frame.right.knee = Some(Landmark::new(0.5, 0.5).with_visibility(0.8));
        assert_eq!(frame.facing_side(), Side::Right);
    }

    #[test]
    fn pixel_scaling_uses_frame_size() {
        let lm = Landmark::new(0.5, 0.25);
        assert_eq!(lm.to_pixels(1280, 720), (640.0, 180.0));
    }

    #[test]
    fn visibility_gate() {
        assert!(Landmark::new(0.0, 0.0).is_visible(0.5));
        assert!(!Landmark::new(0.0, 0.0).with_visibility(0.3).is_visible(0.5));
    }

    #[test]
    fn set_and_get_round_through_joint() {
        let mut side = SideLandmarks::default();
        for (i, joint) in Joint::ALL.iter().enumerate() {
            side.set(*joint, Landmark::new(i as f64, 0.0));
        }
        assert_eq!(side.get(Joint::Knee).map(|lm| lm.x), Some(4.0));
    }
}
