//! Automatic classification of finished sessions.

pub mod matcher;

pub use matcher::{best_match, rule_matches};

use log::{debug, warn};

use crate::db::Database;

/// Looks up the classification a new session should receive.
///
/// Lookup failures never propagate: they are logged and treated as "no
/// match" so saving the session is not held up.
#[derive(Clone)]
pub struct RuleMatcher {
    db: Database,
}

impl RuleMatcher {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn classification_for(&self, app_name: &str, window_title: &str) -> Option<i64> {
        match self.db.find_matching_rule(app_name, window_title).await {
            Ok(Some(rule)) => {
                debug!(
                    "Rule {} classified session for '{}' as {}",
                    rule.id, app_name, rule.classification_id
                );
                Some(rule.classification_id)
            }
            Ok(None) => None,
            Err(err) => {
                warn!("Error checking classification rules for '{app_name}': {err:#}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{ClassificationInput, CreateRuleRequest};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn lookup_error_reads_as_no_match() {
        let db = Database::open_in_memory().unwrap();
        db.create_rule(CreateRuleRequest {
            app_name: "Editor".into(),
            window_title_contains: String::new(),
            priority: 0,
            classification: ClassificationInput {
                user_defined_name: "Coding".into(),
                is_helpful: true,
                goal_context: "Work".into(),
            },
        })
        .await
        .unwrap();
        let matcher = RuleMatcher::new(db.clone());
        assert!(matcher.classification_for("Editor", "main.rs").await.is_some());

        db.execute(|conn| {
            conn.execute_batch("DROP TABLE classification_rules;")?;
            Ok(())
        })
        .await
        .unwrap();

        assert_eq!(matcher.classification_for("Editor", "main.rs").await, None);
    }
}
