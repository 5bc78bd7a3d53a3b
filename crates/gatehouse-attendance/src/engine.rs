//! Reconciliation of card scans, manual attendance and excuses.
//!
//! For every (person, practice date) the engine combines three signals:
//! a granted card scan on that local day, a manual "attended" flag and a
//! manual "excused" flag. See [`PresenceRecord`] for how they combine.
//!
//! Reports never fail. When a dataset cannot be loaded the report carries a
//! [`ReportWarning`] and the affected part degrades: no roster or no practice
//! dates gives an empty report, missing events for a date make that date
//! `NoData` for anyone not manually marked present, and missing overrides
//! leave the date card-only.

use crate::error::{AttendanceError, Result};
use crate::labeling::{DirectionLabeler, ParityLabeler};
use crate::ledger::PresenceLedger;
use crate::model::{
    DeliveredEvent, ManualOverride, OverrideAction, PersonId, PracticeDate, RosterEntry, TimeRange,
    in_year,
};
use crate::record::{DayStatus, PresenceRecord};
use crate::report::{
    AccessHistory, DailyRow, DailySheet, Dataset, HistoryEntry, PersonYearSummary, ReportWarning,
    YearlyReport,
};
use crate::source::{AttendanceSource, AttendanceStore};
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Offset, Utc};
use gatehouse_core::CardUid;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Default reporting offset, UTC+02:00.
pub const DEFAULT_UTC_OFFSET_SECS: i32 = 2 * 3600;

/// Everything known about one date.
struct DaySignals {
    /// First granted scan per card, or `None` if events could not be loaded.
    first_scans: Option<HashMap<CardUid, DateTime<Utc>>>,
    overrides: HashMap<PersonId, ManualOverride>,
}

impl DaySignals {
    fn record(&self, person: &RosterEntry) -> Option<PresenceRecord> {
        let (attended, excuse) = self
            .overrides
            .get(&person.person_id)
            .map(|o| (o.attended, o.excuse))
            .unwrap_or_default();

        match &self.first_scans {
            Some(scans) => {
                let via_card = person
                    .card_uid
                    .as_ref()
                    .is_some_and(|uid| scans.contains_key(uid));
                Some(PresenceRecord::from_flags(via_card, attended, excuse))
            }
            // a manual mark is enough to know the person was present
            None if attended => Some(PresenceRecord::from_flags(false, true, false)),
            None => None,
        }
    }

    fn status(&self, person: &RosterEntry) -> DayStatus {
        self.record(person)
            .map_or(DayStatus::NoData, |record| record.status())
    }

    fn first_scan(&self, person: &RosterEntry) -> Option<DateTime<Utc>> {
        let uid = person.card_uid.as_ref()?;
        self.first_scans.as_ref()?.get(uid).copied()
    }
}

/// Builds attendance reports from an [`AttendanceSource`].
#[derive(Debug)]
pub struct ReconciliationEngine<S, L = ParityLabeler> {
    source: S,
    labeler: L,
    offset: FixedOffset,
    ledger: PresenceLedger,
}

impl<S: AttendanceSource> ReconciliationEngine<S> {
    /// Engine with parity labeling and the default UTC+02:00 offset.
    pub fn new(source: S) -> Self {
        Self {
            source,
            labeler: ParityLabeler,
            offset: default_offset(),
            ledger: PresenceLedger::new(),
        }
    }
}

fn default_offset() -> FixedOffset {
    FixedOffset::east_opt(DEFAULT_UTC_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

impl<S: AttendanceSource, L: DirectionLabeler> ReconciliationEngine<S, L> {
    /// Replace the IN/OUT labeler.
    pub fn with_labeler<L2: DirectionLabeler>(self, labeler: L2) -> ReconciliationEngine<S, L2> {
        ReconciliationEngine {
            source: self.source,
            labeler,
            offset: self.offset,
            ledger: self.ledger,
        }
    }

    /// Bucket events into days at this UTC offset.
    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Attendance per person per practice date of `year`.
    pub async fn yearly_report(&self, year: i32) -> YearlyReport {
        let mut warnings = Vec::new();
        let dates = self.practice_dates(year, &mut warnings).await;
        let roster = self.roster(year, &mut warnings).await;

        let mut days = Vec::with_capacity(dates.len());
        for date in &dates {
            days.push(self.load_day(date.date(), &mut warnings).await);
        }

        let people = roster
            .into_iter()
            .map(|person| {
                let statuses = days.iter().map(|day| day.status(&person)).collect();
                PersonYearSummary::from_days(person, statuses)
            })
            .collect();

        debug!(year, dates = dates.len(), warnings = warnings.len(), "yearly report built");
        YearlyReport {
            year,
            dates,
            people,
            warnings,
        }
    }

    /// Attendance sheet for one date. Empty unless `date` is a practice date.
    pub async fn daily_sheet(&self, date: NaiveDate) -> DailySheet {
        let mut warnings = Vec::new();
        let is_practice_date = self
            .practice_dates(date.year(), &mut warnings)
            .await
            .contains(&PracticeDate(date));

        if !is_practice_date {
            return DailySheet {
                date,
                is_practice_date,
                rows: Vec::new(),
                warnings,
            };
        }

        let roster = self.roster(date.year(), &mut warnings).await;
        let day = self.load_day(date, &mut warnings).await;

        let rows = roster
            .into_iter()
            .map(|person| {
                let record = day.record(&person);
                let time_in = day
                    .first_scan(&person)
                    .map(|at| at.with_timezone(&self.offset).time());
                DailyRow {
                    via_card: record.is_some_and(|r| r.via_card()),
                    time_in,
                    manual_attended: record.is_some_and(|r| r.via_manual()),
                    manual_excused: record.is_some_and(|r| r.via_excuse()),
                    status: record.map_or(DayStatus::NoData, |r| r.status()),
                    person,
                }
            })
            .collect();

        DailySheet {
            date,
            is_practice_date,
            rows,
            warnings,
        }
    }

    /// Delivered events for local days `first..=last`, labeled IN/OUT.
    pub async fn access_history(&self, first: NaiveDate, last: NaiveDate) -> AccessHistory {
        let mut warnings = Vec::new();
        let range = TimeRange::local_days(first, last, self.offset);

        let mut events = match self.source.events_between(range).await {
            Ok(events) => events,
            Err(e) => {
                warn!(error = %e, "access history unavailable");
                warnings.push(ReportWarning::new(Dataset::Events, None, e));
                Vec::new()
            }
        };
        events.sort_by_key(|e| e.received_at);

        let mut holders = HashMap::new();
        for year in first.year()..=last.year() {
            for person in self.roster(year, &mut warnings).await {
                if let Some(uid) = person.card_uid.clone() {
                    holders.insert(uid, person.full_name());
                }
            }
        }

        let labels = self.labeler.label(&events, self.offset);
        let entries = events
            .into_iter()
            .zip(labels)
            .map(|(event, direction)| HistoryEntry {
                local_time: event.received_at.with_timezone(&self.offset),
                holder: holders.get(&event.card_uid).cloned(),
                direction,
                event,
            })
            .collect();

        AccessHistory {
            first,
            last,
            entries,
            warnings,
        }
    }

    async fn practice_dates(
        &self,
        year: i32,
        warnings: &mut Vec<ReportWarning>,
    ) -> Vec<PracticeDate> {
        match self.source.practice_dates(year).await {
            Ok(mut dates) => {
                dates.retain(|d| in_year(d.date(), year));
                dates.sort();
                dates.dedup();
                dates
            }
            Err(e) => {
                warn!(year, error = %e, "practice dates unavailable");
                warnings.push(ReportWarning::new(Dataset::PracticeDates, None, e));
                Vec::new()
            }
        }
    }

    async fn roster(&self, year: i32, warnings: &mut Vec<ReportWarning>) -> Vec<RosterEntry> {
        match self.source.roster(year).await {
            Ok(roster) => roster,
            Err(e) => {
                warn!(year, error = %e, "roster unavailable");
                warnings.push(ReportWarning::new(Dataset::Roster, None, e));
                Vec::new()
            }
        }
    }

    async fn load_day(&self, date: NaiveDate, warnings: &mut Vec<ReportWarning>) -> DaySignals {
        let first_scans = match self
            .source
            .events_between(TimeRange::local_day(date, self.offset))
            .await
        {
            Ok(events) => Some(self.first_granted_scans(date, events)),
            Err(e) => {
                warn!(%date, error = %e, "access events unavailable");
                warnings.push(ReportWarning::new(Dataset::Events, Some(date), e));
                None
            }
        };

        let overrides = match self.source.overrides_on(date, None).await {
            Ok(records) => records
                .into_iter()
                .filter(|o| o.date == date)
                .map(|o| (o.person_id, o))
                .collect(),
            Err(e) => {
                warn!(%date, error = %e, "manual attendance unavailable");
                warnings.push(ReportWarning::new(Dataset::Overrides, Some(date), e));
                HashMap::new()
            }
        };

        DaySignals {
            first_scans,
            overrides,
        }
    }

    fn first_granted_scans(
        &self,
        date: NaiveDate,
        events: Vec<DeliveredEvent>,
    ) -> HashMap<CardUid, DateTime<Utc>> {
        let mut first: HashMap<CardUid, DateTime<Utc>> = HashMap::new();
        for event in events
            .into_iter()
            .filter(|e| e.granted && e.local_date(self.offset) == date)
        {
            first
                .entry(event.card_uid)
                .and_modify(|at| *at = (*at).min(event.received_at))
                .or_insert(event.received_at);
        }
        first
    }
}

impl<S: AttendanceStore, L: DirectionLabeler> ReconciliationEngine<S, L> {
    /// Apply a manual change for `person` on `date` and persist it.
    ///
    /// Writers for the same (person, date) are serialized; the stored flag
    /// pair is re-read first so the change applies to the latest state, and
    /// both flags are written together. The returned record includes the
    /// person's granted scans for that local day, so its status matches
    /// [`ReconciliationEngine::daily_sheet`].
    ///
    /// # Errors
    ///
    /// Fails if `date` is not a practice date, the person is not on that
    /// year's roster, or the store cannot be read or written.
    pub async fn set_override(
        &self,
        person: PersonId,
        date: NaiveDate,
        action: OverrideAction,
    ) -> Result<PresenceRecord> {
        let dates = self.source.practice_dates(date.year()).await?;
        if !dates.contains(&PracticeDate(date)) {
            return Err(AttendanceError::NotAPracticeDate(date));
        }
        let roster = self.source.roster(date.year()).await?;
        let entry = roster
            .into_iter()
            .find(|p| p.person_id == person)
            .ok_or(AttendanceError::UnknownPerson(person))?;

        let writer = self.ledger.writer_lock(person, date);
        let result = {
            let _guard = writer.lock().await;
            self.write_override(&entry, date, action).await
        };
        drop(writer);
        self.ledger.release(person, date);

        let record = result?;
        info!(
            person = %person,
            %date,
            via_card = record.via_card(),
            attended = record.via_manual(),
            excused = record.via_excuse(),
            "manual attendance updated"
        );
        Ok(record)
    }

    /// Rebuild the record from the store, apply `action`, persist the flags.
    /// Caller holds the writer lock for the key.
    async fn write_override(
        &self,
        entry: &RosterEntry,
        date: NaiveDate,
        action: OverrideAction,
    ) -> Result<PresenceRecord> {
        let person = entry.person_id;

        if let Some(uid) = &entry.card_uid {
            match self
                .source
                .events_between(TimeRange::local_day(date, self.offset))
                .await
            {
                Ok(events) => {
                    if self.first_granted_scans(date, events).contains_key(uid) {
                        self.ledger.record_card(person, date);
                    }
                }
                Err(e) => warn!(
                    %date,
                    person = %person,
                    error = %e,
                    "access events unavailable, card presence unknown"
                ),
            }
        }

        let stored = self.source.overrides_on(date, Some(person)).await?;
        let (attended, excuse) = stored
            .iter()
            .rev()
            .find(|o| o.person_id == person && o.date == date)
            .map(|o| (o.attended, o.excuse))
            .unwrap_or_default();
        self.ledger.load_manual(person, date, attended, excuse);

        let record = self.ledger.apply(person, date, action);
        self.source
            .upsert_override(ManualOverride {
                person_id: person,
                date,
                attended: record.via_manual(),
                excuse: record.via_excuse(),
            })
            .await?;
        Ok(record)
    }

    /// Flag `date` as a practice date. Returns `false` if it already was one.
    pub async fn add_practice_date(&self, date: NaiveDate) -> Result<bool> {
        let created = self.source.create_practice_date(date).await?;
        info!(%date, created, "practice date");
        Ok(created)
    }
}
