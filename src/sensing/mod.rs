//! Adaptive sampling of the focused application and window.

pub mod controller;
pub mod loop_worker;
pub mod probe;
pub mod source;
pub mod state;

#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(not(target_os = "macos"))]
pub mod noop;

pub use controller::SensingController;
pub use loop_worker::SamplingLoopConfig;
pub use source::{ActivitySample, ActivitySource, PowerState, SampleError};
pub use state::{SamplingCadence, SamplingMode};

/// Activity source for the platform this binary was built for.
#[cfg(target_os = "macos")]
pub type PlatformSource = macos::MacOSActivitySource;

#[cfg(not(target_os = "macos"))]
pub type PlatformSource = noop::NoopActivitySource;
