//! Report types produced by the reconciliation engine.

use crate::labeling::Direction;
use crate::model::{DeliveredEvent, PracticeDate, RosterEntry};
use crate::record::DayStatus;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use serde::Serialize;
use std::fmt;

/// Which upstream dataset a warning refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dataset {
    Roster,
    PracticeDates,
    Events,
    Overrides,
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Dataset::Roster => "roster",
            Dataset::PracticeDates => "practice dates",
            Dataset::Events => "access events",
            Dataset::Overrides => "manual attendance",
        })
    }
}

/// A dataset that could not be loaded while building a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportWarning {
    pub dataset: Dataset,
    pub date: Option<NaiveDate>,
    pub message: String,
}

impl ReportWarning {
    pub fn new(dataset: Dataset, date: Option<NaiveDate>, error: impl fmt::Display) -> Self {
        Self {
            dataset,
            date,
            message: error.to_string(),
        }
    }
}

impl fmt::Display for ReportWarning {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.date {
            Some(date) => write!(f, "{} for {} unavailable: {}", self.dataset, date, self.message),
            None => write!(f, "{} unavailable: {}", self.dataset, self.message),
        }
    }
}

/// Share of counted practice dates a person attended.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum AttendancePercentage {
    Percent(f64),
    /// Every counted date was excused, or none were counted.
    NotApplicable,
}

impl AttendancePercentage {
    /// `present / (counted - excused)`, where `counted` is the number of
    /// dates with data.
    pub fn compute(present: usize, counted: usize, excused: usize) -> Self {
        let denominator = counted.saturating_sub(excused);
        if denominator == 0 {
            AttendancePercentage::NotApplicable
        } else {
            AttendancePercentage::Percent(present as f64 / denominator as f64 * 100.0)
        }
    }

    pub fn value(self) -> Option<f64> {
        match self {
            AttendancePercentage::Percent(p) => Some(p),
            AttendancePercentage::NotApplicable => None,
        }
    }
}

impl fmt::Display for AttendancePercentage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AttendancePercentage::Percent(p) => write!(f, "{:.1}%", p),
            AttendancePercentage::NotApplicable => f.write_str("N/A"),
        }
    }
}

/// One person's row in the yearly report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonYearSummary {
    pub person: RosterEntry,
    /// Index-aligned with [`YearlyReport::dates`].
    pub days: Vec<DayStatus>,
    pub present: usize,
    pub excused: usize,
    pub absent: usize,
    pub no_data: usize,
    pub percentage: AttendancePercentage,
}

impl PersonYearSummary {
    pub(crate) fn from_days(person: RosterEntry, days: Vec<DayStatus>) -> Self {
        let count = |status| days.iter().filter(|d| **d == status).count();
        let present = count(DayStatus::Present);
        let excused = count(DayStatus::Excused);
        let absent = count(DayStatus::Absent);
        let no_data = count(DayStatus::NoData);
        let percentage = AttendancePercentage::compute(present, days.len() - no_data, excused);

        Self {
            person,
            days,
            present,
            excused,
            absent,
            no_data,
            percentage,
        }
    }
}

/// Attendance per person per practice date for a year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearlyReport {
    pub year: i32,
    pub dates: Vec<PracticeDate>,
    pub people: Vec<PersonYearSummary>,
    pub warnings: Vec<ReportWarning>,
}

/// One roster member on the daily sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyRow {
    pub person: RosterEntry,
    pub via_card: bool,
    /// Local time of the first granted scan.
    pub time_in: Option<NaiveTime>,
    pub manual_attended: bool,
    pub manual_excused: bool,
    pub status: DayStatus,
}

/// Attendance sheet for a single date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailySheet {
    pub date: NaiveDate,
    /// Rows are only produced for practice dates.
    pub is_practice_date: bool,
    pub rows: Vec<DailyRow>,
    pub warnings: Vec<ReportWarning>,
}

/// A delivered event with its inferred direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub event: DeliveredEvent,
    pub local_time: DateTime<FixedOffset>,
    pub direction: Option<Direction>,
    /// Name of the roster member holding the card, if known.
    pub holder: Option<String>,
}

/// Access history for a range of local days, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessHistory {
    pub first: NaiveDate,
    pub last: NaiveDate,
    pub entries: Vec<HistoryEntry>,
    pub warnings: Vec<ReportWarning>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(2, 4, 1, "66.7%")]
    #[case(3, 3, 0, "100.0%")]
    #[case(0, 5, 0, "0.0%")]
    #[case(0, 2, 2, "N/A")]
    #[case(0, 0, 0, "N/A")]
    fn test_percentage(
        #[case] present: usize,
        #[case] counted: usize,
        #[case] excused: usize,
        #[case] expected: &str,
    ) {
        assert_eq!(
            AttendancePercentage::compute(present, counted, excused).to_string(),
            expected
        );
    }

    #[test]
    fn test_summary_excludes_no_data_from_denominator() {
        let person = RosterEntry {
            person_id: crate::model::PersonId(1),
            name: "A".to_string(),
            surname: "B".to_string(),
            grade: None,
            card_uid: None,
        };
        let summary = PersonYearSummary::from_days(
            person,
            vec![
                DayStatus::Present,
                DayStatus::NoData,
                DayStatus::Absent,
                DayStatus::Excused,
            ],
        );

        assert_eq!(summary.present, 1);
        assert_eq!(summary.no_data, 1);
        assert_eq!(summary.percentage.to_string(), "50.0%");
    }

    #[test]
    fn test_warning_display() {
        let warning = ReportWarning::new(
            Dataset::Events,
            NaiveDate::from_ymd_opt(2025, 1, 10),
            "timeout",
        );
        assert_eq!(warning.to_string(), "access events for 2025-01-10 unavailable: timeout");
    }
}
