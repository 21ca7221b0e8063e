use super::TimedWindow;
use crate::config::DetectorConfig;
use serde::{Deserialize, Serialize};

/// Fraction of the recent angle range above the window minimum where the adaptive threshold sits.
pub const ADAPTIVE_FRACTION: f64 = 0.35;
/// Lower clamp of the adaptive threshold, in degrees.
pub const ADAPTIVE_MIN_DEG: f64 = 70.0;
/// Upper clamp of the adaptive threshold, in degrees.
pub const ADAPTIVE_MAX_DEG: f64 = 130.0;
/// Samples the adaptive window must hold before it replaces the fixed threshold.
pub const ADAPTIVE_MIN_SAMPLES: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThresholdSource {
    Fixed,
    Adaptive,
}

/// The catch-angle threshold in force for one update.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatchThreshold {
    pub degrees: f64,
    pub source: ThresholdSource,
}

impl CatchThreshold {
    pub fn fixed(degrees: f64) -> Self {
        Self {
            degrees,
            source: ThresholdSource::Fixed,
        }
    }

    /// Resolve the threshold for the update at `now`.
    ///
    /// Adaptive mode takes the recent angle range `[min, max]` over the trailing
    /// `adaptive_window_sec` and places the threshold at `min + 0.35 * (max - min)`,
    /// clamped to [70, 130]. With too few samples the operator's fixed value applies.
    pub fn resolve(config: &DetectorConfig, history: &TimedWindow, now: f64) -> Self {
        if !config.adaptive_threshold_enabled {
            return Self::fixed(config.catch_angle_max);
        }

        let mut count = 0usize;
        let mut window_min = f64::INFINITY;
        let mut window_max = f64::NEG_INFINITY;
        for sample in history.since(now - config.adaptive_window_sec) {
            count += 1;
            window_min = window_min.min(sample.angle);
            window_max = window_max.max(sample.angle);
        }

        if count < ADAPTIVE_MIN_SAMPLES {
            return Self::fixed(config.catch_angle_max);
        }

        let degrees = (window_min + ADAPTIVE_FRACTION * (window_max - window_min))
            .clamp(ADAPTIVE_MIN_DEG, ADAPTIVE_MAX_DEG);
        Self {
            degrees,
            source: ThresholdSource::Adaptive,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::detectors::JointSample;

    fn adaptive_config() -> DetectorConfig {
        DetectorConfig {
            adaptive_threshold_enabled: true,
            catch_angle_max: 104.5,
            ..DetectorConfig::default()
        }
    }

    fn window_with(angles: &[f64], dt: f64) -> TimedWindow {
        let mut window = TimedWindow::new(8.0, 9);
        for (i, &angle) in angles.iter().enumerate() {
            window.push(JointSample {
                timestamp: i as f64 * dt,
                angle,
            });
        }
        window
    }

    #[test]
    fn fixed_when_adaptive_disabled() {
        let config = DetectorConfig::default();
        let window = window_with(&[90.0; 40], 0.1);
        let threshold = CatchThreshold::resolve(&config, &window, 3.9);
        assert_eq!(threshold, CatchThreshold::fixed(110.0));
    }

    #[test]
    fn fixed_until_enough_samples() {
        let config = adaptive_config();
        let window = window_with(&[80.0, 150.0, 90.0, 140.0, 85.0, 150.0, 80.0, 150.0, 95.0], 0.1);
        let threshold = CatchThreshold::resolve(&config, &window, 0.8);
        assert_eq!(threshold.degrees, 104.5);
        assert_eq!(threshold.source, ThresholdSource::Fixed);
    }

    #[test]
    fn adaptive_interpolates_recent_range() {
        let config = adaptive_config();
        let angles: Vec<f64> = (0..20).map(|i| if i % 2 == 0 { 80.0 } else { 160.0 }).collect();
        let window = window_with(&angles, 0.1);
        let threshold = CatchThreshold::resolve(&config, &window, 1.9);
        assert_eq!(threshold.source, ThresholdSource::Adaptive);
        assert!((threshold.degrees - 108.0).abs() < 1e-9);
    }

    #[test]
    fn adaptive_is_clamped() {
        let config = adaptive_config();
        let low = window_with(&[10.0, 40.0].repeat(10), 0.1);
        assert_eq!(CatchThreshold::resolve(&config, &low, 1.9).degrees, ADAPTIVE_MIN_DEG);

        let high = window_with(&[170.0, 180.0].repeat(10), 0.1);
        assert_eq!(CatchThreshold::resolve(&config, &high, 1.9).degrees, ADAPTIVE_MAX_DEG);
    }

    #[test]
    fn old_samples_fall_outside_window() {
        let config = DetectorConfig {
            adaptive_window_sec: 1.0,
            ..adaptive_config()
        };
        // 20 samples spread over 9.5s: only 3 fall inside the last second
        let window = window_with(&[100.0; 20], 0.5);
        let threshold = CatchThreshold::resolve(&config, &window, 9.5);
        assert_eq!(threshold.source, ThresholdSource::Fixed);
    }
}
