pub mod detectors;
pub mod filters;
pub mod frame_processor;
pub mod geometry;
pub mod landmarks;
pub mod metrics;
