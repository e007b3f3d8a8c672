pub mod algorithm;
pub mod config;
pub mod engine;

pub use algorithm::{segment_samples, Segmentation};
pub use config::SegmentationConfig;
pub use engine::{PassReport, SegmentationEngine};
