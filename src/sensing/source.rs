use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// What the focused application and window looked like at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivitySample {
    pub app_name: String,
    pub window_title: String,
}

impl ActivitySample {
    pub fn new(app_name: impl Into<String>, window_title: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            window_title: window_title.into(),
        }
    }
}

/// Machine power snapshot, only used for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PowerState {
    pub is_sleeping: bool,
    pub is_locked: bool,
    pub is_display_sleeping: bool,
    pub is_idle: bool,
    pub observed_at: DateTime<Utc>,
}

impl PowerState {
    /// First reason sampling should not happen, if any.
    pub fn unavailable_reason(&self) -> Option<&'static str> {
        if self.is_sleeping {
            Some("system is sleeping")
        } else if self.is_locked {
            Some("screen is locked")
        } else if self.is_display_sleeping {
            Some("display is sleeping")
        } else if self.is_idle {
            Some("system is idle")
        } else {
            None
        }
    }
}

#[derive(Debug, Error)]
pub enum SampleError {
    /// The machine is asleep, locked or idle. Drives the sampling loop into
    /// its paused mode.
    #[error("power state unavailable: {0}")]
    PowerStateUnavailable(String),
    #[error("activity sample failed: {0:#}")]
    Transient(#[from] anyhow::Error),
}

/// Platform seam for reading the focused window.
///
/// Implementations are called from the sampling loop on the async runtime,
/// so anything that shells out or blocks must do so off-thread.
#[async_trait::async_trait]
pub trait ActivitySource: Send + Sync {
    async fn sample(&self) -> Result<ActivitySample, SampleError>;

    /// Best effort; `None` when the state cannot be determined.
    async fn power_state(&self) -> Option<PowerState>;
}
