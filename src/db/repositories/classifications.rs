use anyhow::{bail, Context, Result};
use log::info;
use rusqlite::{params, params_from_iter, types::Value, Connection, OptionalExtension};

use crate::db::{
    connection::Database,
    models::{
        BatchClassificationRequest, Classification, ClassificationInput, ClassificationRequest,
        ReclassifyRequest,
    },
};

/// Looks a classification up by its unique name, creating it when missing.
/// Attributes of an existing classification are left untouched.
pub(crate) fn find_or_create_classification_in(
    conn: &Connection,
    input: &ClassificationInput,
) -> Result<i64> {
    let existing: Option<i64> = conn
        .query_row(
            "SELECT id FROM classifications WHERE user_defined_name = ?1",
            params![input.user_defined_name],
            |row| row.get(0),
        )
        .optional()
        .context("failed to look up classification")?;

    if let Some(id) = existing {
        return Ok(id);
    }

    conn.execute(
        "INSERT INTO classifications (user_defined_name, is_helpful, goal_context)
         VALUES (?1, ?2, ?3)",
        params![input.user_defined_name, input.is_helpful, input.goal_context],
    )
    .with_context(|| format!("failed to create classification '{}'", input.user_defined_name))?;
    Ok(conn.last_insert_rowid())
}

impl Database {
    pub async fn find_or_create_classification(&self, input: &ClassificationInput) -> Result<i64> {
        let input = input.clone();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let id = find_or_create_classification_in(&tx, &input)?;
            tx.commit()?;
            Ok(id)
        })
        .await
    }

    pub async fn list_classifications(&self) -> Result<Vec<Classification>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_defined_name, is_helpful, goal_context
                 FROM classifications
                 ORDER BY user_defined_name ASC",
            )?;
            let classifications = stmt
                .query_map([], |row| {
                    Ok(Classification {
                        id: row.get(0)?,
                        user_defined_name: row.get(1)?,
                        is_helpful: row.get(2)?,
                        goal_context: row.get(3)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(classifications)
        })
        .await
    }

    /// Labels every still-unclassified session with the request's identity.
    /// Returns the number of sessions updated.
    pub async fn apply_classification(&self, request: ClassificationRequest) -> Result<usize> {
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let class_id = find_or_create_classification_in(&tx, &request.classification)?;
            let updated = tx
                .execute(
                    "UPDATE activity_sessions
                     SET classification_id = ?1
                     WHERE app_name = ?2 AND window_title = ?3 AND classification_id IS NULL",
                    params![class_id, request.app_name, request.window_title],
                )
                .context("failed to classify sessions")?;
            tx.commit()?;
            Ok(updated)
        })
        .await
    }

    /// Same as [`Database::apply_classification`] for several identities in
    /// one transaction. An empty batch does nothing.
    pub async fn apply_classification_batch(
        &self,
        request: BatchClassificationRequest,
    ) -> Result<usize> {
        if request.sessions.is_empty() {
            return Ok(0);
        }

        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let class_id = find_or_create_classification_in(&tx, &request.classification)?;

            let mut args: Vec<Value> = vec![Value::Integer(class_id)];
            let mut clauses = Vec::with_capacity(request.sessions.len());
            for session in &request.sessions {
                clauses.push("(app_name = ? AND window_title = ?)");
                args.push(Value::Text(session.app_name.clone()));
                args.push(Value::Text(session.window_title.clone()));
            }
            let query = format!(
                "UPDATE activity_sessions SET classification_id = ?
                 WHERE classification_id IS NULL AND ({})",
                clauses.join(" OR ")
            );

            let updated = tx
                .execute(&query, params_from_iter(args))
                .context("failed to classify session batch")?;
            tx.commit()?;

            info!("Batch classification updated {updated} sessions");
            Ok(updated)
        })
        .await
    }

    /// Replaces the label of a single session, whether or not it had one.
    pub async fn reclassify_session(&self, request: ReclassifyRequest) -> Result<()> {
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let class_id = find_or_create_classification_in(&tx, &request.classification)?;
            let updated = tx.execute(
                "UPDATE activity_sessions SET classification_id = ?1 WHERE id = ?2",
                params![class_id, request.session_id],
            )?;
            if updated == 0 {
                // Dropping the transaction rolls back the classification insert.
                bail!("session {} not found", request.session_id);
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{ActivitySession, SessionIdentifier};
    use chrono::{DateTime, Utc};

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    fn label(name: &str) -> ClassificationInput {
        ClassificationInput {
            user_defined_name: name.to_string(),
            is_helpful: true,
            goal_context: "Work".to_string(),
        }
    }

    async fn seed(db: &Database, app: &str, title: &str) -> i64 {
        db.insert_session(&ActivitySession::new(app, title, at(0), at(60)))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn find_or_create_reuses_existing_name() {
        let db = Database::open_in_memory().unwrap();
        let first = db.find_or_create_classification(&label("Coding")).await.unwrap();
        let mut changed = label("Coding");
        changed.is_helpful = false;
        let second = db.find_or_create_classification(&changed).await.unwrap();

        assert_eq!(first, second);
        let all = db.list_classifications().await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].is_helpful);
    }

    #[tokio::test]
    async fn classify_only_touches_unclassified_matches() {
        let db = Database::open_in_memory().unwrap();
        let a = seed(&db, "Editor", "a.rs").await;
        let b = seed(&db, "Editor", "b.rs").await;

        let updated = db
            .apply_classification(ClassificationRequest {
                app_name: "Editor".into(),
                window_title: "a.rs".into(),
                classification: label("Coding"),
            })
            .await
            .unwrap();
        assert_eq!(updated, 1);

        let again = db
            .apply_classification(ClassificationRequest {
                app_name: "Editor".into(),
                window_title: "a.rs".into(),
                classification: label("Other"),
            })
            .await
            .unwrap();
        assert_eq!(again, 0);

        assert!(db.get_session(a).await.unwrap().unwrap().classification_id.is_some());
        assert!(db.get_session(b).await.unwrap().unwrap().classification_id.is_none());
    }

    #[tokio::test]
    async fn batch_classification_updates_every_identity() {
        let db = Database::open_in_memory().unwrap();
        seed(&db, "Editor", "a.rs").await;
        seed(&db, "Browser", "docs").await;
        let untouched = seed(&db, "Chat", "general").await;

        let updated = db
            .apply_classification_batch(BatchClassificationRequest {
                sessions: vec![
                    SessionIdentifier {
                        app_name: "Editor".into(),
                        window_title: "a.rs".into(),
                    },
                    SessionIdentifier {
                        app_name: "Browser".into(),
                        window_title: "docs".into(),
                    },
                ],
                classification: label("Work"),
            })
            .await
            .unwrap();

        assert_eq!(updated, 2);
        assert!(db
            .get_session(untouched)
            .await
            .unwrap()
            .unwrap()
            .classification_id
            .is_none());

        let empty = db
            .apply_classification_batch(BatchClassificationRequest {
                sessions: Vec::new(),
                classification: label("Nothing"),
            })
            .await
            .unwrap();
        assert_eq!(empty, 0);
        assert_eq!(db.list_classifications().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn reclassify_missing_session_rolls_back() {
        let db = Database::open_in_memory().unwrap();
        let id = seed(&db, "Editor", "a.rs").await;

        db.reclassify_session(ReclassifyRequest {
            session_id: id,
            classification: label("Coding"),
        })
        .await
        .unwrap();
        db.reclassify_session(ReclassifyRequest {
            session_id: id,
            classification: label("Reading"),
        })
        .await
        .unwrap();

        let reading = db.find_or_create_classification(&label("Reading")).await.unwrap();
        assert_eq!(
            db.get_session(id).await.unwrap().unwrap().classification_id,
            Some(reading)
        );

        let result = db
            .reclassify_session(ReclassifyRequest {
                session_id: id + 100,
                classification: label("Ghost"),
            })
            .await;
        assert!(result.is_err());
        let names: Vec<_> = db
            .list_classifications()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.user_defined_name)
            .collect();
        assert!(!names.contains(&"Ghost".to_string()));
    }
}
