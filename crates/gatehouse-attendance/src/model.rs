//! Attendance domain types.
//!
//! These mirror the fields the reconciliation engine reads from the remote
//! store; anything else the store keeps is ignored.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, TimeZone, Utc};
use gatehouse_core::CardUid;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a person in the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersonId(pub i64);

impl fmt::Display for PersonId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for PersonId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(PersonId)
    }
}

/// A tracked person for one year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub person_id: PersonId,
    pub name: String,
    pub surname: String,
    pub grade: Option<String>,
    pub card_uid: Option<CardUid>,
}

impl RosterEntry {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.name, self.surname).trim().to_string()
    }
}

/// A calendar date on which a session counts toward attendance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PracticeDate(pub NaiveDate);

impl PracticeDate {
    pub fn date(self) -> NaiveDate {
        self.0
    }
}

impl fmt::Display for PracticeDate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

/// An access event as stored remotely, stamped with reception time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveredEvent {
    pub card_uid: CardUid,
    pub granted: bool,
    pub lock: Option<String>,
    pub received_at: DateTime<Utc>,
}

impl DeliveredEvent {
    /// Calendar date of reception in `offset`.
    pub fn local_date(&self, offset: FixedOffset) -> NaiveDate {
        self.received_at.with_timezone(&offset).date_naive()
    }
}

/// A manually entered attendance record for one person on one date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualOverride {
    pub person_id: PersonId,
    pub date: NaiveDate,
    pub attended: bool,
    pub excuse: bool,
}

/// A single manual change to a person's day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideAction {
    SetAttended(bool),
    SetExcused(bool),
}

/// Half-open UTC interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// The local calendar day `date` in `offset`.
    pub fn local_day(date: NaiveDate, offset: FixedOffset) -> Self {
        Self::local_days(date, date, offset)
    }

    /// Local calendar days `first..=last` in `offset`.
    pub fn local_days(first: NaiveDate, last: NaiveDate, offset: FixedOffset) -> Self {
        Self {
            start: local_midnight(first, offset),
            end: local_midnight(last, offset) + Duration::days(1),
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }
}

fn local_midnight(date: NaiveDate, offset: FixedOffset) -> DateTime<Utc> {
    let midnight = date.and_time(chrono::NaiveTime::MIN);
    // a fixed offset has no gaps or folds, so the mapping is always single
    offset
        .from_local_datetime(&midnight)
        .single()
        .map(|local| local.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
}

/// First and last day of `year`.
pub fn year_bounds(year: i32) -> Option<(NaiveDate, NaiveDate)> {
    Some((
        NaiveDate::from_ymd_opt(year, 1, 1)?,
        NaiveDate::from_ymd_opt(year, 12, 31)?,
    ))
}

/// Whether `date` falls in `year`.
pub fn in_year(date: NaiveDate, year: i32) -> bool {
    date.year() == year
}
