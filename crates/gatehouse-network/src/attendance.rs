//! Attendance data served by the hosted REST store.
//!
//! Table layout:
//!
//! | table | columns used |
//! |---|---|
//! | access logs | `card_uid`, `lock`, `status`, `created_at` |
//! | unidentified cards | `card_uid`, `lock`, `created_at` |
//! | persons | `id`, `name`, `surname`, `grade`, `card_uid` |
//! | roster | `person_id`, `year` |
//! | practice dates | `date` |
//! | manual attendance | `id`, `person_id`, `attended`, `excuse`, `created_at`, `updated_at` |
//!
//! Manual attendance rows carry no date column; a row belongs to the local
//! day its `created_at` falls in. When a day holds several rows for one
//! person, the newest one wins.

use crate::client::RestClient;
use crate::error::NetworkError;
use chrono::{
    DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, Offset, SecondsFormat, TimeZone,
    Utc,
};
use gatehouse_attendance::model::year_bounds;
use gatehouse_attendance::{
    AttendanceError, AttendanceSource, AttendanceStore, DEFAULT_UTC_OFFSET_SECS, DeliveredEvent,
    ManualOverride, PersonId, PracticeDate, Result, RosterEntry, TimeRange,
};
use gatehouse_core::CardUid;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct LogRow {
    card_uid: String,
    #[serde(default)]
    lock: Option<String>,
    #[serde(default)]
    status: Option<bool>,
    #[serde(deserialize_with = "timestamp")]
    created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct OverrideRow {
    id: i64,
    person_id: i64,
    #[serde(default, deserialize_with = "flag")]
    attended: bool,
    #[serde(default, deserialize_with = "flag")]
    excuse: bool,
}

#[derive(Debug, Serialize)]
struct OverrideInsert {
    person_id: i64,
    attended: bool,
    excuse: bool,
    created_at: String,
}

#[derive(Debug, Serialize)]
struct OverridePatch {
    attended: bool,
    excuse: bool,
    updated_at: String,
}

#[derive(Debug, Deserialize)]
struct RegisterRow {
    person_id: i64,
}

#[derive(Debug, Deserialize)]
struct PersonRow {
    id: i64,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    surname: Option<String>,
    #[serde(default)]
    grade: Option<serde_json::Value>,
    #[serde(default)]
    card_uid: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PracticeDateRow {
    date: NaiveDate,
}

/// [`AttendanceSource`] and [`AttendanceStore`] over the REST tables.
#[derive(Debug, Clone)]
pub struct RestAttendanceSource {
    client: RestClient,
    offset: FixedOffset,
}

impl RestAttendanceSource {
    pub fn new(client: RestClient) -> Self {
        let offset = FixedOffset::east_opt(DEFAULT_UTC_OFFSET_SECS).unwrap_or_else(|| Utc.fix());
        Self { client, offset }
    }

    /// Offset used to map override rows onto calendar days.
    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    async fn logs(
        &self,
        table: &str,
        range: TimeRange,
        granted: bool,
    ) -> Result<Vec<DeliveredEvent>> {
        let columns = if granted {
            "card_uid,lock,status,created_at"
        } else {
            "card_uid,lock,created_at"
        };
        let (from, to) = created_between(range);
        let rows: Vec<LogRow> = self
            .client
            .select(
                table,
                &[
                    ("select", columns.to_string()),
                    ("created_at", from),
                    ("created_at", to),
                    ("order", "created_at.asc".to_string()),
                ],
            )
            .await
            .map_err(into_attendance)?;

        let events = rows
            .into_iter()
            .filter_map(|row| match CardUid::parse(&row.card_uid) {
                Ok(card_uid) => Some(DeliveredEvent {
                    card_uid,
                    granted: granted && row.status.unwrap_or(true),
                    lock: row.lock,
                    received_at: row.created_at,
                }),
                Err(e) => {
                    warn!(table, card_uid = %row.card_uid, error = %e, "Skipping log row");
                    None
                }
            })
            .collect();
        Ok(events)
    }

    async fn override_rows(
        &self,
        date: NaiveDate,
        person: Option<PersonId>,
    ) -> Result<Vec<OverrideRow>> {
        let (from, to) = created_between(TimeRange::local_day(date, self.offset));
        let mut filter = vec![
            ("select", "id,person_id,attended,excuse,created_at".to_string()),
            ("created_at", from),
            ("created_at", to),
            ("order", "created_at.asc".to_string()),
        ];
        if let Some(person) = person {
            filter.push(("person_id", format!("eq.{person}")));
        }
        self.client
            .select(&self.client.config().tables.manual_attendance, &filter)
            .await
            .map_err(into_attendance)
    }

    /// Timestamp for a new override row on `date`.
    fn stamp_for(&self, date: NaiveDate) -> DateTime<Utc> {
        let day = TimeRange::local_day(date, self.offset);
        let now = Utc::now();
        if day.contains(now) {
            now
        } else {
            day.start + Duration::hours(12)
        }
    }
}

impl AttendanceSource for RestAttendanceSource {
    async fn events_between(&self, range: TimeRange) -> Result<Vec<DeliveredEvent>> {
        let tables = &self.client.config().tables;
        let mut events = self.logs(&tables.access_logs, range, true).await?;
        events.extend(self.logs(&tables.unidentified_cards, range, false).await?);
        events.sort_by_key(|e| e.received_at);
        Ok(events)
    }

    async fn overrides_on(
        &self,
        date: NaiveDate,
        person: Option<PersonId>,
    ) -> Result<Vec<ManualOverride>> {
        let mut latest = BTreeMap::new();
        for row in self.override_rows(date, person).await? {
            latest.insert(
                row.person_id,
                ManualOverride {
                    person_id: PersonId(row.person_id),
                    date,
                    attended: row.attended,
                    excuse: row.excuse,
                },
            );
        }
        Ok(latest.into_values().collect())
    }

    async fn roster(&self, year: i32) -> Result<Vec<RosterEntry>> {
        let tables = &self.client.config().tables;
        let register: Vec<RegisterRow> = self
            .client
            .select(
                &tables.roster,
                &[
                    ("select", "person_id".to_string()),
                    ("year", format!("eq.{year}")),
                ],
            )
            .await
            .map_err(into_attendance)?;
        if register.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = register.iter().map(|r| r.person_id.to_string()).collect();
        let persons: Vec<PersonRow> = self
            .client
            .select(
                &tables.persons,
                &[
                    ("select", "id,name,surname,grade,card_uid".to_string()),
                    ("id", format!("in.({})", ids.join(","))),
                ],
            )
            .await
            .map_err(into_attendance)?;

        let mut by_id: HashMap<i64, PersonRow> = persons.into_iter().map(|p| (p.id, p)).collect();
        let mut roster = Vec::with_capacity(register.len());
        for row in register {
            match by_id.remove(&row.person_id) {
                Some(person) => roster.push(roster_entry(person)),
                None => warn!(person_id = row.person_id, year, "Registered person not found"),
            }
        }
        roster.sort_by(|a, b| (&a.surname, &a.name).cmp(&(&b.surname, &b.name)));
        Ok(roster)
    }

    async fn practice_dates(&self, year: i32) -> Result<Vec<PracticeDate>> {
        let Some((first, last)) = year_bounds(year) else {
            return Ok(Vec::new());
        };
        let rows: Vec<PracticeDateRow> = self
            .client
            .select(
                &self.client.config().tables.practice_dates,
                &[
                    ("select", "date".to_string()),
                    ("date", format!("gte.{first}")),
                    ("date", format!("lte.{last}")),
                    ("order", "date.asc".to_string()),
                ],
            )
            .await
            .map_err(into_attendance)?;
        let mut dates: Vec<_> = rows.into_iter().map(|r| PracticeDate(r.date)).collect();
        dates.dedup();
        Ok(dates)
    }
}

impl AttendanceStore for RestAttendanceSource {
    async fn upsert_override(&self, record: ManualOverride) -> Result<()> {
        let table = &self.client.config().tables.manual_attendance;
        let existing = self
            .override_rows(record.date, Some(record.person_id))
            .await?;

        let result = match existing.last() {
            Some(row) => {
                let patch = OverridePatch {
                    attended: record.attended,
                    excuse: record.excuse,
                    updated_at: format_timestamp(Utc::now()),
                };
                self.client
                    .update(table, &[("id", format!("eq.{}", row.id))], &patch)
                    .await
            }
            None => {
                let insert = OverrideInsert {
                    person_id: record.person_id.0,
                    attended: record.attended,
                    excuse: record.excuse,
                    created_at: format_timestamp(self.stamp_for(record.date)),
                };
                self.client.insert(table, &insert).await
            }
        };
        result.map_err(into_attendance)?;

        debug!(
            person_id = %record.person_id,
            date = %record.date,
            attended = record.attended,
            excuse = record.excuse,
            "Override stored"
        );
        Ok(())
    }

    async fn create_practice_date(&self, date: NaiveDate) -> Result<bool> {
        let table = &self.client.config().tables.practice_dates;
        let existing: Vec<PracticeDateRow> = self
            .client
            .select(
                table,
                &[
                    ("select", "date".to_string()),
                    ("date", format!("eq.{date}")),
                ],
            )
            .await
            .map_err(into_attendance)?;
        if !existing.is_empty() {
            return Ok(false);
        }
        self.client
            .insert(table, &PracticeDateRow { date })
            .await
            .map_err(into_attendance)?;
        Ok(true)
    }
}

fn roster_entry(person: PersonRow) -> RosterEntry {
    let card_uid = person
        .card_uid
        .filter(|raw| !raw.trim().is_empty())
        .and_then(|raw| match CardUid::parse(&raw) {
            Ok(uid) => Some(uid),
            Err(e) => {
                warn!(person_id = person.id, card_uid = %raw, error = %e, "Ignoring invalid card");
                None
            }
        });
    let grade = match person.grade {
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };
    RosterEntry {
        person_id: PersonId(person.id),
        name: person.name.unwrap_or_default(),
        surname: person.surname.unwrap_or_default(),
        grade,
        card_uid,
    }
}

fn into_attendance(e: NetworkError) -> AttendanceError {
    match e {
        NetworkError::InvalidResponse(message) => AttendanceError::InvalidRecord(message),
        other => AttendanceError::unavailable(other.to_string()),
    }
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn created_between(range: TimeRange) -> (String, String) {
    (
        format!("gte.{}", format_timestamp(range.start)),
        format!("lt.{}", format_timestamp(range.end)),
    )
}

/// Accepts RFC 3339 timestamps and naive ones, the latter read as UTC.
fn timestamp<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(at) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(at.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(&raw, "%Y-%m-%d %H:%M:%S%.f"))
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(serde::de::Error::custom)
}

/// Booleans stored as bools, strings, or numbers.
fn flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::Bool(b)) => b,
        Some(serde_json::Value::String(s)) => {
            let s = s.trim();
            !s.is_empty() && !s.eq_ignore_ascii_case("false")
        }
        Some(serde_json::Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
        _ => false,
    })
}
