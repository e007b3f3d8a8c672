//! SQLite persistence: the event store (raw samples) and the session store
//! (sessions, classifications and rules).

mod connection;
mod helpers;
mod migrations;
pub mod models;
pub mod repositories;

pub use connection::Database;
pub use models::{
    ActivitySession, BatchClassificationRequest, Classification, ClassificationInput,
    ClassificationRequest, ClassificationRule, CreateRuleRequest, RawSample, ReclassifyRequest,
    RecentActivity, RuleInfo, SessionIdentifier, TodaySummaryItem, UnclassifiedActivity,
};
pub use repositories::SampleScan;
