pub mod classification;
pub mod raw_sample;
pub mod session;

pub use classification::{
    BatchClassificationRequest, Classification, ClassificationInput, ClassificationRequest,
    ClassificationRule, CreateRuleRequest, ReclassifyRequest, RuleInfo,
};
pub use raw_sample::RawSample;
pub use session::{
    ActivitySession, RecentActivity, SessionIdentifier, TodaySummaryItem, UnclassifiedActivity,
};
