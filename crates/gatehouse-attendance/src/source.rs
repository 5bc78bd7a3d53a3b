//! Read and write surfaces of the attendance store.
//!
//! The engine needs exactly four query shapes and two writes. Anything that
//! can answer them can back a report: the REST client in
//! `gatehouse-network`, or [`MemoryAttendanceStore`] in tests.

use crate::error::{AttendanceError, Result};
use crate::model::{
    in_year, DeliveredEvent, ManualOverride, PersonId, PracticeDate, RosterEntry, TimeRange,
};
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::{Mutex, MutexGuard};

/// Queries the reconciliation engine runs against the store.
pub trait AttendanceSource: Send + Sync {
    /// Delivered access events received within `range`.
    fn events_between(
        &self,
        range: TimeRange,
    ) -> impl Future<Output = Result<Vec<DeliveredEvent>>> + Send;

    /// Manual override records for `date`, optionally for one person only.
    fn overrides_on(
        &self,
        date: NaiveDate,
        person: Option<PersonId>,
    ) -> impl Future<Output = Result<Vec<ManualOverride>>> + Send;

    /// Tracked persons registered for `year`.
    fn roster(&self, year: i32) -> impl Future<Output = Result<Vec<RosterEntry>>> + Send;

    /// Practice dates falling in `year`.
    fn practice_dates(&self, year: i32) -> impl Future<Output = Result<Vec<PracticeDate>>> + Send;
}

/// Writes issued on behalf of an operator.
pub trait AttendanceStore: AttendanceSource {
    /// Insert or replace the override for `(record.person_id, record.date)`.
    ///
    /// Both flags are written in a single operation.
    fn upsert_override(&self, record: ManualOverride) -> impl Future<Output = Result<()>> + Send;

    /// Flag `date` as a practice date. Returns `false` if it already was one.
    fn create_practice_date(&self, date: NaiveDate) -> impl Future<Output = Result<bool>> + Send;
}

#[derive(Debug, Default)]
struct StoreState {
    events: Vec<DeliveredEvent>,
    overrides: HashMap<(PersonId, NaiveDate), ManualOverride>,
    rosters: HashMap<i32, Vec<RosterEntry>>,
    dates: BTreeSet<NaiveDate>,
    failures: Failures,
}

#[derive(Debug, Default)]
struct Failures {
    roster: bool,
    practice_dates: bool,
    overrides: bool,
    writes: bool,
    events: Vec<TimeRange>,
}

/// In-memory attendance store with failure injection.
#[derive(Debug, Default)]
pub struct MemoryAttendanceStore {
    state: Mutex<StoreState>,
}

impl MemoryAttendanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_event(&self, event: DeliveredEvent) {
        self.state().events.push(event);
    }

    pub fn add_roster_entry(&self, year: i32, entry: RosterEntry) {
        self.state().rosters.entry(year).or_default().push(entry);
    }

    pub fn add_practice_date(&self, date: NaiveDate) {
        self.state().dates.insert(date);
    }

    /// Stored override for a key.
    pub fn override_for(&self, person: PersonId, date: NaiveDate) -> Option<ManualOverride> {
        self.state().overrides.get(&(person, date)).copied()
    }

    /// Seed a raw override without going through the engine.
    pub fn put_override(&self, record: ManualOverride) {
        self.state()
            .overrides
            .insert((record.person_id, record.date), record);
    }

    /// Make event queries overlapping `range` fail.
    pub fn fail_events_in(&self, range: TimeRange) {
        self.state().failures.events.push(range);
    }

    pub fn fail_roster(&self, fail: bool) {
        self.state().failures.roster = fail;
    }

    pub fn fail_practice_dates(&self, fail: bool) {
        self.state().failures.practice_dates = fail;
    }

    pub fn fail_overrides(&self, fail: bool) {
        self.state().failures.overrides = fail;
    }

    pub fn fail_writes(&self, fail: bool) {
        self.state().failures.writes = fail;
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn unavailable(dataset: &str) -> AttendanceError {
    AttendanceError::unavailable(format!("{dataset} unavailable"))
}

impl AttendanceSource for MemoryAttendanceStore {
    async fn events_between(&self, range: TimeRange) -> Result<Vec<DeliveredEvent>> {
        let state = self.state();
        let overlaps = state
            .failures
            .events
            .iter()
            .any(|failing| failing.start < range.end && range.start < failing.end);
        if overlaps {
            return Err(unavailable("events"));
        }

        let mut events: Vec<_> = state
            .events
            .iter()
            .filter(|e| range.contains(e.received_at))
            .cloned()
            .collect();
        events.sort_by_key(|e| e.received_at);
        Ok(events)
    }

    async fn overrides_on(
        &self,
        date: NaiveDate,
        person: Option<PersonId>,
    ) -> Result<Vec<ManualOverride>> {
        let state = self.state();
        if state.failures.overrides {
            return Err(unavailable("overrides"));
        }
        Ok(state
            .overrides
            .values()
            .filter(|o| o.date == date && person.is_none_or(|p| o.person_id == p))
            .copied()
            .collect())
    }

    async fn roster(&self, year: i32) -> Result<Vec<RosterEntry>> {
        let state = self.state();
        if state.failures.roster {
            return Err(unavailable("roster"));
        }
        Ok(state.rosters.get(&year).cloned().unwrap_or_default())
    }

    async fn practice_dates(&self, year: i32) -> Result<Vec<PracticeDate>> {
        let state = self.state();
        if state.failures.practice_dates {
            return Err(unavailable("practice dates"));
        }
        Ok(state
            .dates
            .iter()
            .filter(|d| in_year(**d, year))
            .map(|d| PracticeDate(*d))
            .collect())
    }
}

impl AttendanceStore for MemoryAttendanceStore {
    async fn upsert_override(&self, record: ManualOverride) -> Result<()> {
        let mut state = self.state();
        if state.failures.writes {
            return Err(unavailable("override store"));
        }
        state
            .overrides
            .insert((record.person_id, record.date), record);
        Ok(())
    }

    async fn create_practice_date(&self, date: NaiveDate) -> Result<bool> {
        let mut state = self.state();
        if state.failures.writes {
            return Err(unavailable("practice date store"));
        }
        Ok(state.dates.insert(date))
    }
}
