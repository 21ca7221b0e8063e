use crate::config::DetectorConfig;
use crate::error::AnalysisError;
use crate::processing::detectors::StrokeDetector;
use crate::processing::geometry;
use crate::processing::metrics::StrokeSummary;

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

impl From<AnalysisError> for PyErr {
    fn from(err: AnalysisError) -> PyErr {
        PyValueError::new_err(err.to_string())
    }
}

#[pyclass(name = "StrokeSummary")]
#[derive(Clone)]
pub struct PyStrokeSummary {
    #[pyo3(get)]
    pub stroke_count: usize,
    #[pyo3(get)]
    pub strokes_per_minute: f64,
    #[pyo3(get)]
    pub drive_recovery_ratio: Option<f64>,
}

impl From<StrokeSummary> for PyStrokeSummary {
    fn from(summary: StrokeSummary) -> Self {
        Self {
            stroke_count: summary.stroke_count,
            strokes_per_minute: summary.strokes_per_minute,
            drive_recovery_ratio: summary.drive_recovery_ratio,
        }
    }
}

#[pymethods]
impl PyStrokeSummary {
    fn __repr__(&self) -> String {
        format!(
            "StrokeSummary(stroke_count={}, strokes_per_minute={:.2}, drive_recovery_ratio={:?})",
            self.stroke_count, self.strokes_per_minute, self.drive_recovery_ratio
        )
    }
}

/// Stroke detector for a host that measures its own knee angles.
#[pyclass(name = "StrokeAnalyzer")]
pub struct PyStrokeAnalyzer {
    detector: StrokeDetector,
}

#[pymethods]
impl PyStrokeAnalyzer {
    #[new]
    #[pyo3(signature = (
        catch_angle_max = 110.0,
        raw_smoothing_window = 5,
        min_catch_interval_sec = 0.9,
        confirm_frames = 2,
        local_min_window_size = 9,
        adaptive_threshold_enabled = false,
        adaptive_window_sec = 8.0,
        max_stroke_history = Some(1024)
    ))]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        catch_angle_max: f64,
        raw_smoothing_window: usize,
        min_catch_interval_sec: f64,
        confirm_frames: usize,
        local_min_window_size: usize,
        adaptive_threshold_enabled: bool,
        adaptive_window_sec: f64,
        max_stroke_history: Option<usize>,
    ) -> Self {
        let config = DetectorConfig {
            catch_angle_max,
            raw_smoothing_window,
            min_catch_interval_sec,
            confirm_frames,
            local_min_window_size,
            adaptive_threshold_enabled,
            adaptive_window_sec,
            max_stroke_history,
        };
        PyStrokeAnalyzer {
            detector: StrokeDetector::new(config),
        }
    }

    /// Feed one angle; returns the `(event, timestamp)` pairs it produced.
    /// `None` or NaN angles are skipped.
    pub fn update(&mut self, timestamp: f64, angle: Option<f64>) -> PyResult<Vec<(String, f64)>> {
        let outcome = self.detector.update(timestamp, angle.unwrap_or(f64::NAN))?;
        Ok(outcome
            .events()
            .into_iter()
            .map(|e| (e.name().to_string(), e.timestamp()))
            .collect())
    }

    pub fn summary(&self) -> PyStrokeSummary {
        self.detector.summary().into()
    }

    pub fn catches(&self) -> Vec<f64> {
        self.detector.catches()
    }

    pub fn finishes(&self) -> Vec<f64> {
        self.detector.finishes()
    }

    pub fn reset(&mut self) {
        self.detector.reset();
    }
}

#[pyfunction]
pub fn angle_at(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> Option<f64> {
    geometry::angle_at(a, b, c)
}

#[pyfunction]
pub fn angle_to_vertical(p1: (f64, f64), p2: (f64, f64)) -> Option<f64> {
    geometry::angle_to_vertical(p1, p2)
}

/// A Python module implemented in Rust.
#[pymodule]
pub fn erg_kinematics(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyStrokeAnalyzer>()?;
    m.add_class::<PyStrokeSummary>()?;
    m.add_function(wrap_pyfunction!(angle_at, m)?)?;
    m.add_function(wrap_pyfunction!(angle_to_vertical, m)?)?;
    Ok(())
}
