//! Joint angle geometry
//!
//! Pure functions over 2D points in image space (x right, y down). Both return
//! `None` when a ray or segment has no length, which happens when the tracker
//! stacks two landmarks on top of each other during occlusion.

/// A 2D point in image space.
pub type Point = (f64, f64);

/// Direction of the vertical reference, measured against +x in image space.
const VERTICAL_REFERENCE_DEG: f64 = -90.0;

/// Rays shorter than this carry no direction.
const DEGENERATE_LENGTH: f64 = 1e-9;

/// Interior angle at `b` between rays b→a and b→c, in degrees within [0, 180].
///
/// Uses cos(θ) = (v1 · v2) / (|v1| × |v2|) with the cosine clamped to [-1, 1]
/// so rounding never pushes `acos` out of its domain.
pub fn angle_at(a: Point, b: Point, c: Point) -> Option<f64> {
    let v1 = (a.0 - b.0, a.1 - b.1);
    let v2 = (c.0 - b.0, c.1 - b.1);

    let mag1 = v1.0.hypot(v1.1);
    let mag2 = v2.0.hypot(v2.1);
    if !is_usable_length(mag1) || !is_usable_length(mag2) {
        return None;
    }

    let dot = v1.0 * v2.0 + v1.1 * v2.1;
    let cos_angle = (dot / (mag1 * mag2)).clamp(-1.0, 1.0);
    Some(cos_angle.acos().to_degrees())
}

/// Absolute tilt of the segment p1→p2 away from vertical, in degrees within [0, 180].
///
/// 0 means the segment points straight along the vertical reference, 90 means horizontal.
pub fn angle_to_vertical(p1: Point, p2: Point) -> Option<f64> {
    let dx = p2.0 - p1.0;
    let dy = p2.1 - p1.1;
    if !is_usable_length(dx.hypot(dy)) {
        return None;
    }

    let theta = dy.atan2(dx).to_degrees();
    let diff = (VERTICAL_REFERENCE_DEG - theta).abs();
    // Fold into (-180, 180] before taking the magnitude
    let folded = (diff + 180.0).rem_euclid(360.0) - 180.0;
    Some(folded.abs())
}

fn is_usable_length(length: f64) -> bool {
    length.is_finite() && length > DEGENERATE_LENGTH
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perpendicular_rays_make_right_angle() {
        let angle = angle_at((0.0, 1.0), (0.0, 0.0), (1.0, 0.0)).unwrap();
        assert!((angle - 90.0).abs() < 1e-6);
    }

    #[test]
    fn straight_leg_is_180() {
        let angle = angle_at((0.0, 0.0), (0.5, 0.0), (1.0, 0.0)).unwrap();
        assert!((angle - 180.0).abs() < 1e-6);
    }

    #[test]
    fn folded_leg_is_zero() {
        let angle = angle_at((1.0, 0.0), (0.0, 0.0), (2.0, 0.0)).unwrap();
        assert!(angle.abs() < 1e-6);
    }

    #[test]
    fn coincident_points_are_undefined() {
        assert_eq!(angle_at((1.0, 1.0), (1.0, 1.0), (2.0, 0.0)), None);
        assert_eq!(angle_at((0.0, 1.0), (2.0, 2.0), (2.0, 2.0)), None);
        assert_eq!(angle_to_vertical((3.0, 3.0), (3.0, 3.0)), None);
    }

    #[test]
    fn vertical_segment_has_no_tilt() {
        let tilt = angle_to_vertical((0.0, 1.0), (0.0, 0.0)).unwrap();
        assert!(tilt.abs() < 1e-6);
    }

    #[test]
    fn horizontal_and_inverted_segments() {
        let right = angle_to_vertical((0.0, 0.0), (1.0, 0.0)).unwrap();
        let left = angle_to_vertical((0.0, 0.0), (-1.0, 0.0)).unwrap();
        let inverted = angle_to_vertical((0.0, 0.0), (0.0, 1.0)).unwrap();
        assert!((right - 90.0).abs() < 1e-6);
        assert!((left - 90.0).abs() < 1e-6);
        assert!((inverted - 180.0).abs() < 1e-6);
    }

    #[test]
    fn forty_five_degree_lean() {
        let tilt = angle_to_vertical((0.0, 0.0), (1.0, -1.0)).unwrap();
        assert!((tilt - 45.0).abs() < 1e-6);
    }

    #[test]
    fn tilt_stays_in_range_for_arbitrary_inputs() {
        let coords = [-250.0, -3.5, -1.0, -0.01, 0.0, 0.02, 0.7, 1.0, 42.0, 1e6];
        for &x1 in &coords {
            for &y1 in &coords {
                for &(x2, y2) in &[(0.3, -7.0), (-1e5, 2.0), (5.0, 5.0), (-0.5, -0.5)] {
                    if let Some(tilt) = angle_to_vertical((x1, y1), (x2, y2)) {
                        assert!((0.0..=180.0).contains(&tilt), "tilt {tilt} out of range");
                    }
                }
            }
        }
    }

    #[test]
    fn non_finite_input_is_undefined() {
        assert_eq!(angle_at((f64::NAN, 0.0), (0.0, 0.0), (1.0, 0.0)), None);
        assert_eq!(angle_to_vertical((0.0, 0.0), (f64::INFINITY, 1.0)), None);
    }
}
