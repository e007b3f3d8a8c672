use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::{
    connection::Database,
    helpers::{format_datetime, parse_datetime},
    models::{ActivitySession, RecentActivity, TodaySummaryItem, UnclassifiedActivity},
    repositories::raw_samples::delete_raw_samples_in,
};

const SESSION_COLUMNS: &str =
    "id, app_name, window_title, start_time, end_time, duration_seconds, classification_id";

fn row_to_session(row: &Row) -> Result<ActivitySession> {
    let start_time: String = row.get("start_time")?;
    let end_time: String = row.get("end_time")?;

    Ok(ActivitySession {
        id: Some(row.get("id")?),
        app_name: row.get("app_name")?,
        window_title: row.get("window_title")?,
        start_time: parse_datetime(&start_time, "start_time")?,
        end_time: parse_datetime(&end_time, "end_time")?,
        duration_seconds: row.get("duration_seconds")?,
        classification_id: row.get("classification_id")?,
    })
}

fn insert_session_in(conn: &Connection, session: &ActivitySession) -> Result<i64> {
    conn.execute(
        "INSERT INTO activity_sessions (
            app_name,
            window_title,
            start_time,
            end_time,
            duration_seconds,
            classification_id
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            session.app_name,
            session.window_title,
            format_datetime(session.start_time),
            format_datetime(session.end_time),
            session.duration_seconds,
            session.classification_id,
        ],
    )
    .with_context(|| {
        format!(
            "failed to insert session for '{}' - '{}'",
            session.app_name, session.window_title
        )
    })?;
    Ok(conn.last_insert_rowid())
}

/// Start of the current UTC day.
pub fn utc_day_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|midnight| midnight.and_utc())
        .unwrap_or(now)
}

impl Database {
    pub async fn insert_session(&self, session: &ActivitySession) -> Result<i64> {
        let record = session.clone();
        self.execute(move |conn| insert_session_in(conn, &record))
            .await
    }

    /// Persists the sessions produced by one segmentation pass and deletes
    /// the raw events that pass scanned, atomically. Returns the new
    /// session ids in insertion order.
    pub async fn commit_segmentation_pass(
        &self,
        sessions: Vec<ActivitySession>,
        scanned_ids: Vec<i64>,
    ) -> Result<Vec<i64>> {
        self.execute(move |conn| {
            let tx = conn
                .transaction()
                .context("failed to open segmentation transaction")?;

            let mut inserted = Vec::with_capacity(sessions.len());
            for session in &sessions {
                inserted.push(insert_session_in(&tx, session)?);
            }
            delete_raw_samples_in(&tx, &scanned_ids)?;

            tx.commit().context("failed to commit segmentation pass")?;
            Ok(inserted)
        })
        .await
    }

    pub async fn get_session(&self, session_id: i64) -> Result<Option<ActivitySession>> {
        self.execute(move |conn| {
            let query = format!("SELECT {SESSION_COLUMNS} FROM activity_sessions WHERE id = ?1");
            let mut stmt = conn.prepare(&query)?;
            let mut rows = stmt.query(params![session_id])?;
            let session = match rows.next()? {
                Some(row) => Some(row_to_session(row)?),
                None => None,
            };
            Ok(session)
        })
        .await
    }

    /// Most recent sessions first.
    pub async fn list_sessions(&self, limit: u32) -> Result<Vec<ActivitySession>> {
        self.execute(move |conn| {
            let query = format!(
                "SELECT {SESSION_COLUMNS} FROM activity_sessions
                 ORDER BY start_time DESC, id DESC
                 LIMIT ?1"
            );
            let mut stmt = conn.prepare(&query)?;
            let mut rows = stmt.query(params![limit])?;
            let mut sessions = Vec::new();
            while let Some(row) = rows.next()? {
                sessions.push(row_to_session(row)?);
            }
            Ok(sessions)
        })
        .await
    }

    pub async fn delete_session(&self, session_id: i64) -> Result<()> {
        self.execute(move |conn| {
            let rows_affected = conn.execute(
                "DELETE FROM activity_sessions WHERE id = ?1",
                params![session_id],
            )?;
            if rows_affected == 0 {
                bail!("session {session_id} not found");
            }
            Ok(())
        })
        .await
    }

    /// Unlabelled time grouped by identity, longest first.
    pub async fn unclassified_activities(&self) -> Result<Vec<UnclassifiedActivity>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT app_name, window_title, SUM(duration_seconds) AS total_duration
                 FROM activity_sessions
                 WHERE classification_id IS NULL
                 GROUP BY app_name, window_title
                 ORDER BY total_duration DESC, app_name ASC, window_title ASC",
            )?;

            let activities = stmt
                .query_map([], |row| {
                    Ok(UnclassifiedActivity {
                        app_name: row.get(0)?,
                        window_title: row.get(1)?,
                        total_duration_seconds: row.get(2)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(activities)
        })
        .await
    }

    /// Classified time since UTC midnight, grouped by classification name.
    pub async fn today_summary(&self, now: DateTime<Utc>) -> Result<Vec<TodaySummaryItem>> {
        let day_start = format_datetime(utc_day_start(now));
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT c.user_defined_name, SUM(s.duration_seconds) AS total_duration
                 FROM activity_sessions s
                 JOIN classifications c ON s.classification_id = c.id
                 WHERE s.start_time >= ?1
                 GROUP BY c.user_defined_name
                 HAVING total_duration > 0
                 ORDER BY total_duration DESC",
            )?;

            let summary = stmt
                .query_map(params![day_start], |row| {
                    Ok(TodaySummaryItem {
                        user_defined_name: row.get(0)?,
                        total_duration_seconds: row.get(1)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()
                .context("failed to read today summary")?;
            Ok(summary)
        })
        .await
    }

    pub async fn recent_classified_sessions(&self, limit: u32) -> Result<Vec<RecentActivity>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT s.id, s.app_name, s.window_title, c.user_defined_name, s.start_time
                 FROM activity_sessions s
                 JOIN classifications c ON s.classification_id = c.id
                 ORDER BY s.start_time DESC, s.id DESC
                 LIMIT ?1",
            )?;

            let mut rows = stmt.query(params![limit])?;
            let mut activities = Vec::new();
            while let Some(row) = rows.next()? {
                let start_time: String = row.get(4)?;
                activities.push(RecentActivity {
                    session_id: row.get(0)?,
                    app_name: row.get(1)?,
                    window_title: row.get(2)?,
                    user_defined_name: row.get(3)?,
                    start_time: parse_datetime(&start_time, "start_time")?,
                });
            }
            Ok(activities)
        })
        .await
    }

    pub async fn session_exists(&self, session_id: i64) -> Result<bool> {
        self.execute(move |conn| {
            let found = conn
                .query_row(
                    "SELECT 1 FROM activity_sessions WHERE id = ?1",
                    params![session_id],
                    |_| Ok(()),
                )
                .optional()?;
            Ok(found.is_some())
        })
        .await
    }
}
