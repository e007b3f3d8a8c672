use anyhow::{Context, Result};
use rusqlite::params;

use crate::db::{
    connection::Database,
    models::{ClassificationRule, CreateRuleRequest, RuleInfo},
    repositories::classifications::find_or_create_classification_in,
};
use crate::rules::best_match;

impl Database {
    /// Creates the rule's classification if needed and inserts the rule in
    /// one transaction. Returns the new rule id.
    pub async fn create_rule(&self, request: CreateRuleRequest) -> Result<i64> {
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let class_id = find_or_create_classification_in(&tx, &request.classification)?;
            tx.execute(
                "INSERT INTO classification_rules
                    (app_name, window_title_contains, classification_id, priority)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    request.app_name,
                    request.window_title_contains,
                    class_id,
                    request.priority,
                ],
            )
            .context("failed to insert classification rule")?;
            let rule_id = tx.last_insert_rowid();
            tx.commit()?;
            Ok(rule_id)
        })
        .await
    }

    /// Rules joined with their classification name, newest first.
    pub async fn list_rules(&self) -> Result<Vec<RuleInfo>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT r.id, r.app_name, r.window_title_contains, c.user_defined_name, r.priority
                 FROM classification_rules r
                 JOIN classifications c ON r.classification_id = c.id
                 ORDER BY r.id DESC",
            )?;
            let rules = stmt
                .query_map([], |row| {
                    Ok(RuleInfo {
                        id: row.get(0)?,
                        app_name: row.get(1)?,
                        window_title_contains: row.get(2)?,
                        user_defined_name: row.get(3)?,
                        priority: row.get(4)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rules)
        })
        .await
    }

    /// Returns whether a rule was removed; a missing id is not an error.
    pub async fn delete_rule(&self, rule_id: i64) -> Result<bool> {
        self.execute(move |conn| {
            let removed = conn.execute(
                "DELETE FROM classification_rules WHERE id = ?1",
                params![rule_id],
            )?;
            Ok(removed > 0)
        })
        .await
    }

    pub async fn rules_for_app(&self, app_name: &str) -> Result<Vec<ClassificationRule>> {
        let app_name = app_name.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, app_name, window_title_contains, classification_id, priority
                 FROM classification_rules
                 WHERE app_name = ?1",
            )?;
            let rules = stmt
                .query_map(params![app_name], |row| {
                    Ok(ClassificationRule {
                        id: row.get(0)?,
                        app_name: row.get(1)?,
                        window_title_contains: row.get(2)?,
                        classification_id: row.get(3)?,
                        priority: row.get(4)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()
                .context("failed to load classification rules")?;
            Ok(rules)
        })
        .await
    }

    /// Best-priority rule for a session identity, if any.
    pub async fn find_matching_rule(
        &self,
        app_name: &str,
        window_title: &str,
    ) -> Result<Option<ClassificationRule>> {
        let rules = self.rules_for_app(app_name).await?;
        Ok(best_match(&rules, app_name, window_title).cloned())
    }
}
