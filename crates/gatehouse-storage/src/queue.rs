//! Durable queue of access events awaiting delivery.
//!
//! Every event produced at the gate that could not be delivered right away
//! lands here. `append` returns only after SQLite has committed the row (the
//! connection runs with `synchronous = FULL`), so an appended event survives
//! power loss. Rows are read back in insertion order and removed only by an
//! explicit [`EventQueue::acknowledge`] after the sync worker has seen a
//! successful delivery.
//!
//! A row whose payload no longer decodes (for example a torn write) is moved
//! to `quarantined_events` and skipped; it never stops the rest of the queue
//! from draining.

use crate::connection::Database;
use crate::error::StorageResult;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use gatehouse_core::{AccessEvent, CardUid, Decision, EventId};
use serde::Deserialize;
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Outcome of a legacy queue import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LegacyImport {
    /// Lines turned into pending events.
    pub imported: usize,
    /// Lines whose event was already queued by an earlier import.
    pub already_queued: usize,
    /// Blank, unparseable or invalid lines.
    pub skipped: usize,
}

/// SQLite-backed FIFO of pending access events.
///
/// Cloning is cheap and every clone shares the same single-connection pool,
/// which serializes all mutations.
#[derive(Debug, Clone)]
pub struct EventQueue {
    pool: SqlitePool,
}

impl EventQueue {
    /// Create a queue over an open database.
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }

    /// Persist `event` at the tail of the queue.
    ///
    /// Appending the same event twice is a no-op; returns `true` when the
    /// event was newly stored.
    pub async fn append(&self, event: &AccessEvent) -> StorageResult<bool> {
        let payload = serde_json::to_string(event)?;
        let result = sqlx::query(
            r#"
            INSERT INTO pending_events (event_id, payload, enqueued_at)
            VALUES (?, ?, ?)
            ON CONFLICT(event_id) DO NOTHING
            "#,
        )
        .bind(event.id().to_string())
        .bind(payload)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        let stored = result.rows_affected() > 0;
        if stored {
            debug!(event_id = %event.id(), card_uid = %event.identifier(), "event queued");
        }
        Ok(stored)
    }

    /// All pending events in FIFO order. Nothing is removed.
    pub async fn drain(&self) -> StorageResult<Vec<AccessEvent>> {
        self.fetch(-1).await
    }

    /// The oldest `limit` pending events in FIFO order.
    pub async fn drain_limit(&self, limit: usize) -> StorageResult<Vec<AccessEvent>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.fetch(limit).await
    }

    /// Remove a delivered event. Returns `false` if it was not queued.
    pub async fn acknowledge(&self, id: EventId) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM pending_events WHERE event_id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        let removed = result.rows_affected() > 0;
        if removed {
            debug!(event_id = %id, "event acknowledged");
        }
        Ok(removed)
    }

    /// Number of events waiting for delivery.
    pub async fn pending_count(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM pending_events").await
    }

    /// Number of rows set aside because they could not be decoded.
    pub async fn quarantined_count(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM quarantined_events").await
    }

    /// Whether nothing is waiting for delivery.
    pub async fn is_empty(&self) -> StorageResult<bool> {
        let row = sqlx::query("SELECT EXISTS(SELECT 1 FROM pending_events)")
            .fetch_one(&self.pool)
            .await?;
        let exists: i64 = row.try_get(0)?;
        Ok(exists == 0)
    }

    /// Import a JSON-lines queue file left behind by older firmware.
    ///
    /// Each line is `{"uid": "0x..", "status": true, "timestamp": 1700000000}`
    /// or `{"card_uid": "0x..", "status": true, "created_at": "2025-01-10T18:02:00+02:00"}`.
    /// `timestamp` is seconds since the Unix epoch, `created_at` is RFC 3339
    /// (a value without offset is read as UTC); both are optional. Lines that
    /// do not parse are skipped.
    ///
    /// Event ids are derived from the line text and its occurrence count, so
    /// importing the same file again while its events are still pending
    /// queues nothing new. Events already delivered are not tracked and would
    /// be queued again.
    pub async fn import_legacy_log(&self, path: impl AsRef<Path>) -> StorageResult<LegacyImport> {
        let path = path.as_ref();
        let contents = tokio::fs::read_to_string(path).await?;
        let mut outcome = LegacyImport::default();
        let mut seen: HashMap<&str, usize> = HashMap::new();

        for (number, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match parse_legacy_line(line) {
                Some(event) => {
                    let occurrence = seen.entry(line).or_default();
                    *occurrence += 1;
                    let key = format!("{line}\n{occurrence}");
                    let event = event.with_id(EventId::derived(key.as_bytes()));
                    if self.append(&event).await? {
                        outcome.imported += 1;
                    } else {
                        outcome.already_queued += 1;
                    }
                }
                None => {
                    warn!(
                        path = %path.display(),
                        line = number + 1,
                        "skipping unreadable legacy queue line"
                    );
                    outcome.skipped += 1;
                }
            }
        }

        info!(
            path = %path.display(),
            imported = outcome.imported,
            already_queued = outcome.already_queued,
            skipped = outcome.skipped,
            "legacy queue imported"
        );
        Ok(outcome)
    }

    async fn fetch(&self, limit: i64) -> StorageResult<Vec<AccessEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT seq, event_id, payload
            FROM pending_events
            ORDER BY seq ASC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            let seq: i64 = row.try_get("seq")?;
            let event_id: String = row.try_get("event_id")?;
            let payload: String = row.try_get("payload")?;

            match decode_row(&event_id, &payload) {
                Ok(event) => events.push(event),
                Err(reason) => self.quarantine(seq, &event_id, &payload, &reason).await?,
            }
        }
        Ok(events)
    }

    async fn quarantine(
        &self,
        seq: i64,
        event_id: &str,
        payload: &str,
        reason: &str,
    ) -> StorageResult<()> {
        warn!(seq, event_id, reason, "quarantining corrupt queue record");

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO quarantined_events (original_seq, event_id, payload, reason, quarantined_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(seq)
        .bind(event_id)
        .bind(payload)
        .bind(reason)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM pending_events WHERE seq = ?")
            .bind(seq)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn count(&self, sql: &str) -> StorageResult<u64> {
        let row = sqlx::query(sql).fetch_one(&self.pool).await?;
        let count: i64 = row.try_get(0)?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

fn decode_row(event_id: &str, payload: &str) -> Result<AccessEvent, String> {
    let event: AccessEvent = serde_json::from_str(payload).map_err(|e| e.to_string())?;
    if event.id().to_string() != event_id {
        return Err(format!("payload id {} does not match row id", event.id()));
    }
    Ok(event)
}

#[derive(Debug, Deserialize)]
struct LegacyEntry {
    #[serde(alias = "card_uid")]
    uid: String,
    status: bool,
    #[serde(default)]
    timestamp: Option<f64>,
    #[serde(default)]
    created_at: Option<String>,
}

fn parse_legacy_line(line: &str) -> Option<AccessEvent> {
    let entry: LegacyEntry = serde_json::from_str(line).ok()?;
    let uid = CardUid::parse(&entry.uid).ok()?;
    let observed_at = entry
        .timestamp
        .and_then(legacy_timestamp)
        .or_else(|| entry.created_at.as_deref().and_then(legacy_created_at))
        .unwrap_or_else(Utc::now);
    Some(AccessEvent::new_at(
        uid,
        Decision::from_authorized(entry.status),
        observed_at,
    ))
}

fn legacy_timestamp(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }
    Utc.timestamp_opt(seconds as i64, 0).single()
}

fn legacy_created_at(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Some(at.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
}
