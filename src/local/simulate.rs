//! Synthetic rower for demos and tests.
//!
//! Knee angle follows a half-cosine drive from catch to finish and a slower
//! half-cosine recovery back, so drive and recovery have different lengths
//! like on a real erg.

use crate::processing::geometry::Point;
use crate::processing::landmarks::{Landmark, LandmarkFrame, SideLandmarks};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;

const THIGH_PX: f64 = 160.0;
const SHIN_PX: f64 = 150.0;
const TORSO_PX: f64 = 220.0;
const KNEE_PX: Point = (640.0, 470.0);
const TRACKED_VISIBILITY: f64 = 0.95;

#[derive(Clone, Debug)]
pub struct SyntheticRower {
    pub stroke_period_sec: f64,
    pub catch_angle_deg: f64,
    pub finish_angle_deg: f64,
    /// Share of the stroke spent on the drive
    pub drive_fraction: f64,
    pub sample_rate_hz: f64,
    /// Uniform noise amplitude added to the knee angle
    pub noise_deg: f64,
    pub seed: u64,
    pub frame_width: u32,
    pub frame_height: u32,
}

impl Default for SyntheticRower {
    fn default() -> Self {
        Self {
            stroke_period_sec: 2.0,
            catch_angle_deg: 95.0,
            finish_angle_deg: 165.0,
            drive_fraction: 1.0 / 3.0,
            sample_rate_hz: 30.0,
            noise_deg: 0.0,
            seed: 7,
            frame_width: 1280,
            frame_height: 720,
        }
    }
}

impl SyntheticRower {
    /// Noise-free knee angle at `t`; t = 0 is a catch.
    pub fn knee_angle(&self, t: f64) -> f64 {
        let phase = (t / self.stroke_period_sec).rem_euclid(1.0);
        let drive = self.drive_fraction.clamp(0.05, 0.95);
        let extension = if phase < drive {
            (1.0 - (PI * phase / drive).cos()) / 2.0
        } else {
            (1.0 + (PI * (phase - drive) / (1.0 - drive)).cos()) / 2.0
        };
        self.catch_angle_deg + (self.finish_angle_deg - self.catch_angle_deg) * extension
    }

    /// `(timestamp, knee angle)` pairs covering `seconds`.
    pub fn knee_trace(&self, seconds: f64) -> Vec<(f64, f64)> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        self.timestamps(seconds)
            .map(|t| (t, self.noisy_angle(&mut rng, t)))
            .collect()
    }

    /// Landmark frames covering `seconds`, seen from the rower's right side.
    pub fn frames(&self, seconds: f64) -> Vec<LandmarkFrame> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        self.timestamps(seconds)
            .map(|t| {
                let knee = self.noisy_angle(&mut rng, t);
                pose_frame(t, knee, self.back_lean(knee), self.frame_width, self.frame_height)
            })
            .collect()
    }

    fn timestamps(&self, seconds: f64) -> impl Iterator<Item = f64> {
        let rate = self.sample_rate_hz.max(1.0);
        let count = (seconds.max(0.0) * rate) as usize;
        (0..count).map(move |i| i as f64 / rate)
    }

    fn noisy_angle(&self, rng: &mut StdRng, t: f64) -> f64 {
        let noise = if self.noise_deg > 0.0 {
            rng.gen_range(-self.noise_deg..=self.noise_deg)
        } else {
            0.0
        };
        (self.knee_angle(t) + noise).clamp(0.0, 180.0)
    }

    /// Forward lean at the catch, laid back at the finish.
    fn back_lean(&self, knee: f64) -> f64 {
        let range = self.finish_angle_deg - self.catch_angle_deg;
        let extension = if range.abs() > f64::EPSILON {
            ((knee - self.catch_angle_deg) / range).clamp(0.0, 1.0)
        } else {
            0.0
        };
        30.0 - 45.0 * extension
    }
}

/// A single frame with the right side posed at the given knee angle and back
/// lean (degrees from vertical, positive leaning forward). The shin is vertical.
pub fn pose_frame(
    timestamp: f64,
    knee_deg: f64,
    lean_deg: f64,
    width: u32,
    height: u32,
) -> LandmarkFrame {
    let (kx, ky) = KNEE_PX;
    let knee_rad = knee_deg.to_radians();
    let lean_rad = lean_deg.to_radians();

    let ankle = (kx, ky + SHIN_PX);
    let hip = (kx + THIGH_PX * knee_rad.sin(), ky + THIGH_PX * knee_rad.cos());
    let shoulder = (hip.0 + TORSO_PX * lean_rad.sin(), hip.1 - TORSO_PX * lean_rad.cos());

    let normalize = |(x, y): Point| {
        Landmark::new(x / width as f64, y / height as f64).with_visibility(TRACKED_VISIBILITY)
    };

    let mut frame = LandmarkFrame::new(timestamp);
    frame.right = SideLandmarks {
        shoulder: Some(normalize(shoulder)),
        hip: Some(normalize(hip)),
        knee: Some(normalize(KNEE_PX)),
        ankle: Some(normalize(ankle)),
        ..Default::default()
    };
    frame
}
