use chrono::{DateTime, Utc};

use crate::db::models::{ActivitySession, RawSample};
use crate::segmentation::config::SegmentationConfig;

/// The session currently being extended. At most one exists at a time.
#[derive(Debug, Clone)]
struct OpenSession {
    app_name: String,
    window_title: String,
    start_time: DateTime<Utc>,
    last_seen: DateTime<Utc>,
}

impl OpenSession {
    fn open(sample: &RawSample) -> Self {
        Self {
            app_name: sample.app_name.clone(),
            window_title: sample.window_title.clone(),
            start_time: sample.timestamp,
            last_seen: sample.timestamp,
        }
    }

    fn close(self) -> ActivitySession {
        ActivitySession::new(
            self.app_name,
            self.window_title,
            self.start_time,
            self.last_seen,
        )
    }
}

/// Output of folding one backlog.
#[derive(Debug, Default)]
pub struct Segmentation {
    /// Sessions long enough to persist, in chronological order.
    pub sessions: Vec<ActivitySession>,
    /// Closed sessions at or under the minimum duration.
    pub dropped: usize,
}

/// Folds samples (already ordered by timestamp, then insertion) into sessions.
///
/// A boundary falls wherever the (app, window title) identity changes or the
/// gap since the previously folded sample exceeds the gap threshold. The
/// trailing session is always closed at the last sample's timestamp.
pub fn segment_samples(samples: &[RawSample], config: &SegmentationConfig) -> Segmentation {
    let gap_threshold = config.gap_threshold();
    let mut result = Segmentation::default();
    let mut current: Option<OpenSession> = None;

    for sample in samples {
        match &mut current {
            Some(open)
                if sample.same_identity(&open.app_name, &open.window_title)
                    && sample.timestamp - open.last_seen <= gap_threshold =>
            {
                open.last_seen = sample.timestamp;
            }
            _ => {
                if let Some(open) = current.take() {
                    close_into(&mut result, open, config);
                }
                current = Some(OpenSession::open(sample));
            }
        }
    }

    if let Some(open) = current {
        close_into(&mut result, open, config);
    }

    result
}

fn close_into(result: &mut Segmentation, open: OpenSession, config: &SegmentationConfig) {
    let session = open.close();
    if session.end_time - session.start_time > config.min_session_duration() {
        result.sessions.push(session);
    } else {
        result.dropped += 1;
    }
}
