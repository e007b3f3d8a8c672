//! Event store: the append-only backlog of raw focus samples.

use anyhow::{Context, Result};
use log::warn;
use rusqlite::{params, params_from_iter, Row};

use crate::db::{
    connection::Database,
    helpers::{format_datetime, numbered_placeholders, parse_datetime},
    models::RawSample,
};

/// Result of scanning the backlog once.
#[derive(Debug, Default)]
pub struct SampleScan {
    /// Readable samples ordered by timestamp, then insertion order.
    pub samples: Vec<RawSample>,
    /// Ids of rows that could not be decoded. They can never be folded into a
    /// session, so the pass deletes them together with the readable ones.
    pub unreadable_ids: Vec<i64>,
    /// Rows skipped without a usable id.
    pub skipped: usize,
}

impl SampleScan {
    /// Every id this scan observed, which is exactly the set a pass may delete.
    pub fn scanned_ids(&self) -> Vec<i64> {
        self.samples
            .iter()
            .filter_map(|sample| sample.id)
            .chain(self.unreadable_ids.iter().copied())
            .collect()
    }
}

fn row_to_sample(row: &Row) -> Result<RawSample> {
    let timestamp: String = row.get("timestamp")?;
    Ok(RawSample {
        id: Some(row.get("id")?),
        timestamp: parse_datetime(&timestamp, "timestamp")?,
        app_name: row.get("app_name")?,
        window_title: row.get("window_title")?,
    })
}

impl Database {
    pub async fn insert_raw_sample(&self, sample: &RawSample) -> Result<i64> {
        let record = sample.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO raw_events (timestamp, app_name, window_title)
                 VALUES (?1, ?2, ?3)",
                params![
                    format_datetime(record.timestamp),
                    record.app_name,
                    record.window_title,
                ],
            )
            .context("failed to insert raw event")?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    /// Reads the whole backlog in processing order. Undecodable rows are
    /// logged and skipped rather than failing the scan.
    pub async fn scan_raw_samples(&self) -> Result<SampleScan> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, timestamp, app_name, window_title
                 FROM raw_events
                 ORDER BY timestamp ASC, id ASC",
            )?;

            let mut rows = stmt.query([]).context("could not query raw events")?;
            let mut scan = SampleScan::default();
            while let Some(row) = rows.next()? {
                match row_to_sample(row) {
                    Ok(sample) => scan.samples.push(sample),
                    Err(err) => match row.get::<_, i64>("id") {
                        Ok(id) => {
                            warn!("Skipping unreadable raw event {id}: {err:#}");
                            scan.unreadable_ids.push(id);
                        }
                        Err(_) => {
                            warn!("Skipping unreadable raw event without id: {err:#}");
                            scan.skipped += 1;
                        }
                    },
                }
            }

            Ok(scan)
        })
        .await
    }

    pub async fn delete_raw_samples(&self, ids: &[i64]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let ids = ids.to_vec();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let deleted = delete_raw_samples_in(&tx, &ids)?;
            tx.commit()?;
            Ok(deleted)
        })
        .await
    }

    pub async fn count_raw_samples(&self) -> Result<i64> {
        self.execute(|conn| {
            let count = conn.query_row("SELECT COUNT(*) FROM raw_events", [], |row| row.get(0))?;
            Ok(count)
        })
        .await
    }
}

/// SQLite caps bound parameters per statement, so ids are deleted in chunks.
const DELETE_CHUNK: usize = 500;

pub(crate) fn delete_raw_samples_in(conn: &rusqlite::Connection, ids: &[i64]) -> Result<usize> {
    let mut deleted = 0;
    for chunk in ids.chunks(DELETE_CHUNK) {
        let query = format!(
            "DELETE FROM raw_events WHERE id IN ({})",
            numbered_placeholders(1, chunk.len())
        );
        deleted += conn
            .execute(&query, params_from_iter(chunk.iter()))
            .context("failed to delete processed raw events")?;
    }
    Ok(deleted)
}
