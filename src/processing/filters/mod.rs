pub mod ema;
pub mod trailing_mean;

pub use ema::{Ema, PositionSmoother};
pub use trailing_mean::TrailingMean;

/// A single-channel streaming filter fed one sample per frame.
pub trait SampleFilter: Send {
    /// Push a sample and return the filtered value, or `None` while the filter is warming up.
    fn filter_sample(&mut self, sample: f64) -> Option<f64>;

    /// Latest filtered value without pushing anything.
    fn current(&self) -> Option<f64>;

    fn reset(&mut self);
}
