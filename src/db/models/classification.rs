//! Classification labels and the rules that assign them automatically.

use serde::{Deserialize, Serialize};

use super::session::SessionIdentifier;

/// A user-defined label, unique by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub id: i64,
    pub user_defined_name: String,
    pub is_helpful: bool,
    /// e.g. "Work", "Relax", "Learn"
    pub goal_context: String,
}

/// Label attributes used when a classification is found or created by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationInput {
    pub user_defined_name: String,
    pub is_helpful: bool,
    pub goal_context: String,
}

/// "Sessions of `app_name` whose title contains `window_title_contains`
/// receive `classification_id`."
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationRule {
    pub id: i64,
    pub app_name: String,
    pub window_title_contains: String,
    pub classification_id: i64,
    pub priority: i64,
}

/// A rule joined with the name of the classification it assigns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleInfo {
    pub id: i64,
    pub app_name: String,
    pub window_title_contains: String,
    pub user_defined_name: String,
    pub priority: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationRequest {
    pub app_name: String,
    pub window_title: String,
    pub classification: ClassificationInput,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchClassificationRequest {
    pub sessions: Vec<SessionIdentifier>,
    pub classification: ClassificationInput,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReclassifyRequest {
    pub session_id: i64,
    pub classification: ClassificationInput,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRuleRequest {
    pub app_name: String,
    pub window_title_contains: String,
    pub priority: i64,
    pub classification: ClassificationInput,
}
