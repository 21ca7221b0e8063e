use super::SampleFilter;
use std::collections::VecDeque;

/// Arithmetic mean of the last `window` samples.
///
/// Not ready until the window has filled once. Kept apart from the position
/// EMA so threshold checks see real motion without coordinate smoothing lag.
#[derive(Debug, Clone)]
pub struct TrailingMean {
    window: usize,
    samples: VecDeque<f64>,
    sum: f64,
}

impl TrailingMean {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            samples: VecDeque::with_capacity(window),
            sum: 0.0,
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn is_ready(&self) -> bool {
        self.samples.len() >= self.window
    }
}

impl SampleFilter for TrailingMean {
    fn filter_sample(&mut self, sample: f64) -> Option<f64> {
        self.samples.push_back(sample);
        if self.samples.len() > self.window {
            self.samples.pop_front();
        }
        // Recomputed from the window so float drift never accumulates
        self.sum = self.samples.iter().sum();
        self.current()
    }

    fn current(&self) -> Option<f64> {
        if self.is_ready() {
            Some(self.sum / self.window as f64)
        } else {
            None
        }
    }

    fn reset(&mut self) {
        self.samples.clear();
        self.sum = 0.0;
    }
}
