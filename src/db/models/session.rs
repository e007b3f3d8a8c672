use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A contiguous span of time attributed to one (application, window title) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivitySession {
    pub id: Option<i64>,
    pub app_name: String,
    pub window_title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_seconds: i64,
    pub classification_id: Option<i64>,
}

impl ActivitySession {
    pub fn new(
        app_name: impl Into<String>,
        window_title: impl Into<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: None,
            app_name: app_name.into(),
            window_title: window_title.into(),
            start_time,
            end_time,
            duration_seconds: whole_seconds_rounded_up(end_time - start_time),
            classification_id: None,
        }
    }
}

/// A partial second counts as a full one, so a stored duration never reads
/// lower than the span that was kept.
fn whole_seconds_rounded_up(elapsed: Duration) -> i64 {
    let whole = elapsed.num_seconds();
    if elapsed > Duration::seconds(whole) {
        whole + 1
    } else {
        whole
    }
}

/// Unclassified sessions grouped by identity, used to prompt the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnclassifiedActivity {
    pub app_name: String,
    pub window_title: String,
    pub total_duration_seconds: i64,
}

/// Identity of the sessions a batch classification applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIdentifier {
    pub app_name: String,
    pub window_title: String,
}

/// Classified time per classification name for the current day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodaySummaryItem {
    pub user_defined_name: String,
    pub total_duration_seconds: i64,
}

/// A recently classified session joined with its classification name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentActivity {
    pub session_id: i64,
    pub app_name: String,
    pub window_title: String,
    pub user_defined_name: String,
    pub start_time: DateTime<Utc>,
}
