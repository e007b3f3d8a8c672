//! Raw focus samples captured by the sampling loop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single point-in-time observation of the focused application/window.
///
/// Rows are append-only; the segmentation engine deletes them once they
/// have been folded into a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSample {
    pub id: Option<i64>,
    pub timestamp: DateTime<Utc>,
    pub app_name: String,
    pub window_title: String,
}

impl RawSample {
    pub fn new(
        timestamp: DateTime<Utc>,
        app_name: impl Into<String>,
        window_title: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            timestamp,
            app_name: app_name.into(),
            window_title: window_title.into(),
        }
    }

    /// True when both samples describe the same (app, window title) pair.
    pub fn same_identity(&self, app_name: &str, window_title: &str) -> bool {
        self.app_name == app_name && self.window_title == window_title
    }
}
