use anyhow::{Context, Result};
use serde::Serialize;

use crate::db::Database;
use crate::rules::RuleMatcher;
use crate::segmentation::{algorithm::segment_samples, config::SegmentationConfig};

/// Counters for one pass, logged by the processing loop.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct PassReport {
    pub samples_scanned: usize,
    pub samples_skipped: usize,
    pub sessions_saved: usize,
    pub sessions_dropped: usize,
    pub sessions_classified: usize,
}

impl PassReport {
    pub fn is_empty(&self) -> bool {
        self.samples_scanned == 0 && self.samples_skipped == 0
    }
}

/// Turns the raw sample backlog into classified sessions.
#[derive(Clone)]
pub struct SegmentationEngine {
    db: Database,
    matcher: RuleMatcher,
    config: SegmentationConfig,
}

impl SegmentationEngine {
    pub fn new(db: Database, config: SegmentationConfig) -> Self {
        Self {
            matcher: RuleMatcher::new(db.clone()),
            db,
            config,
        }
    }

    pub fn config(&self) -> &SegmentationConfig {
        &self.config
    }

    /// Runs one pass over everything currently in the event store.
    ///
    /// Only the rows read at the start of the pass are deleted, so samples
    /// appended while the pass runs are left for the next one. Sessions are
    /// saved and the scanned rows deleted in a single transaction; on error
    /// neither happens and the next pass sees the same backlog.
    pub async fn run_pass(&self) -> Result<PassReport> {
        let scan = self
            .db
            .scan_raw_samples()
            .await
            .context("could not query raw events")?;

        let scanned_ids = scan.scanned_ids();
        let mut report = PassReport {
            samples_scanned: scan.samples.len(),
            samples_skipped: scan.unreadable_ids.len() + scan.skipped,
            ..PassReport::default()
        };

        if scanned_ids.is_empty() {
            return Ok(report);
        }

        let segmentation = segment_samples(&scan.samples, &self.config);
        report.sessions_dropped = segmentation.dropped;

        let mut sessions = segmentation.sessions;
        for session in &mut sessions {
            session.classification_id = self
                .matcher
                .classification_for(&session.app_name, &session.window_title)
                .await;
            if session.classification_id.is_some() {
                report.sessions_classified += 1;
            }
        }

        let saved = self
            .db
            .commit_segmentation_pass(sessions, scanned_ids)
            .await
            .context("could not save sessions")?;
        report.sessions_saved = saved.len();

        Ok(report)
    }
}
