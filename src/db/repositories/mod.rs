pub mod classifications;
pub mod raw_samples;
pub mod rules;
pub mod sessions;

pub use raw_samples::SampleScan;
