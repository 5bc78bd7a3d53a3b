//! Plain-text tables for attendance reports.

use std::fmt::Write;

use gatehouse_attendance::{AccessHistory, DailySheet, ReportWarning, YearlyReport};

const MIN_NAME_WIDTH: usize = 4;

fn name_width<'a>(names: impl Iterator<Item = &'a str>) -> usize {
    names.map(|n| n.chars().count()).max().unwrap_or(0).max(MIN_NAME_WIDTH)
}

fn warnings(out: &mut String, warnings: &[ReportWarning]) {
    for warning in warnings {
        let _ = writeln!(out, "warning: {warning}");
    }
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

/// One column per practice date, marked P/E/A/?.
pub fn yearly(report: &YearlyReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Attendance {}", report.year);

    if report.dates.is_empty() || report.people.is_empty() {
        let _ = writeln!(out, "No practice dates or roster for {}", report.year);
        warnings(&mut out, &report.warnings);
        return out;
    }

    let names: Vec<String> = report.people.iter().map(|p| p.person.full_name()).collect();
    let width = name_width(names.iter().map(String::as_str));

    let _ = write!(out, "{:<width$}", "Name");
    for date in &report.dates {
        let _ = write!(out, " {}", date.date().format("%m-%d"));
    }
    let _ = writeln!(out, "  Present Excused Absent    Rate");

    for (name, summary) in names.iter().zip(&report.people) {
        let _ = write!(out, "{name:<width$}");
        for day in &summary.days {
            let _ = write!(out, " {:<5}", day.marker());
        }
        let _ = writeln!(
            out,
            "  {:>7} {:>7} {:>6} {:>7}",
            summary.present,
            summary.excused,
            summary.absent,
            summary.percentage.to_string()
        );
    }

    warnings(&mut out, &report.warnings);
    out
}

/// One row per roster member for a single date.
pub fn daily(sheet: &DailySheet) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Attendance {}", sheet.date);

    if !sheet.is_practice_date {
        let _ = writeln!(out, "{} is not a practice date", sheet.date);
        warnings(&mut out, &sheet.warnings);
        return out;
    }

    let names: Vec<String> = sheet.rows.iter().map(|r| r.person.full_name()).collect();
    let width = name_width(names.iter().map(String::as_str));

    let _ = writeln!(
        out,
        "{:<width$}  Card  Time in  Manual  Excused  Status",
        "Name"
    );
    for (name, row) in names.iter().zip(&sheet.rows) {
        let time_in = row
            .time_in
            .map(|t| t.format("%H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "{name:<width$}  {:<4}  {:<7}  {:<6}  {:<7}  {}",
            yes_no(row.via_card),
            time_in,
            yes_no(row.manual_attended),
            yes_no(row.manual_excused),
            row.status
        );
    }

    warnings(&mut out, &sheet.warnings);
    out
}

/// Delivered events, oldest first. Directions are inferred by alternation.
pub fn history(history: &AccessHistory) -> String {
    let mut out = String::new();
    if history.first == history.last {
        let _ = writeln!(out, "Access history {}", history.first);
    } else {
        let _ = writeln!(out, "Access history {} to {}", history.first, history.last);
    }

    if history.entries.is_empty() {
        let _ = writeln!(out, "No access events");
        warnings(&mut out, &history.warnings);
        return out;
    }

    let uid_width = history
        .entries
        .iter()
        .map(|e| e.event.card_uid.as_str().len())
        .max()
        .unwrap_or(0);

    let _ = writeln!(out, "{:<19}  {:<uid_width$}  Dir  Result   Holder", "Time", "Card");
    for entry in &history.entries {
        let direction = entry
            .direction
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string());
        let result = if entry.event.granted { "granted" } else { "denied" };
        let _ = writeln!(
            out,
            "{}  {:<uid_width$}  {:<3}  {:<7}  {}",
            entry.local_time.format("%Y-%m-%d %H:%M:%S"),
            entry.event.card_uid.as_str(),
            direction,
            result,
            entry.holder.as_deref().unwrap_or("-")
        );
    }

    warnings(&mut out, &history.warnings);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
    use gatehouse_attendance::{
        AttendancePercentage, DailyRow, Dataset, DayStatus, DeliveredEvent, Direction,
        HistoryEntry, PersonId, PersonYearSummary, PracticeDate, RosterEntry,
    };

    fn date(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, month, day).unwrap()
    }

    fn person(id: i64, name: &str, surname: &str) -> RosterEntry {
        RosterEntry {
            person_id: PersonId(id),
            name: name.to_string(),
            surname: surname.to_string(),
            grade: None,
            card_uid: None,
        }
    }

    #[test]
    fn test_yearly_table() {
        let report = YearlyReport {
            year: 2024,
            dates: vec![PracticeDate(date(3, 5)), PracticeDate(date(3, 12))],
            people: vec![PersonYearSummary {
                person: person(1, "Thandi", "Mokoena"),
                days: vec![DayStatus::Present, DayStatus::Excused],
                present: 1,
                excused: 1,
                absent: 0,
                no_data: 0,
                percentage: AttendancePercentage::compute(1, 2, 1),
            }],
            warnings: vec![ReportWarning::new(Dataset::Overrides, Some(date(3, 12)), "timeout")],
        };

        let text = yearly(&report);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "Attendance 2024");
        assert!(lines[1].starts_with("Name"));
        assert!(lines[1].contains("03-05 03-12"));
        assert!(lines[2].starts_with("Thandi Mokoena P     E"));
        assert!(lines[2].ends_with("100.0%"));
        assert_eq!(lines[3], "warning: manual attendance for 2024-03-12 unavailable: timeout");
    }

    #[test]
    fn test_yearly_without_dates() {
        let report = YearlyReport {
            year: 2025,
            dates: Vec::new(),
            people: Vec::new(),
            warnings: Vec::new(),
        };
        assert_eq!(
            yearly(&report),
            "Attendance 2025\nNo practice dates or roster for 2025\n"
        );
    }

    #[test]
    fn test_daily_table() {
        let sheet = DailySheet {
            date: date(3, 5),
            is_practice_date: true,
            rows: vec![
                DailyRow {
                    person: person(1, "Ann", "Lee"),
                    via_card: true,
                    time_in: NaiveTime::from_hms_opt(18, 2, 0),
                    manual_attended: false,
                    manual_excused: false,
                    status: DayStatus::Present,
                },
                DailyRow {
                    person: person(2, "Bo", "Chen"),
                    via_card: false,
                    time_in: None,
                    manual_attended: false,
                    manual_excused: false,
                    status: DayStatus::Absent,
                },
            ],
            warnings: Vec::new(),
        };

        let text = daily(&sheet);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[2], "Ann Lee  yes   18:02    no      no       present");
        assert_eq!(lines[3], "Bo Chen  no    -        no      no       absent");
    }

    #[test]
    fn test_daily_not_practice_date() {
        let sheet = DailySheet {
            date: date(3, 6),
            is_practice_date: false,
            rows: Vec::new(),
            warnings: Vec::new(),
        };
        assert!(daily(&sheet).contains("2024-03-06 is not a practice date"));
    }

    #[test]
    fn test_history_table() {
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let received_at = Utc.with_ymd_and_hms(2024, 3, 5, 16, 0, 0).unwrap();
        let report = AccessHistory {
            first: date(3, 5),
            last: date(3, 5),
            entries: vec![HistoryEntry {
                event: DeliveredEvent {
                    card_uid: "0xa1b2c3".parse().unwrap(),
                    granted: true,
                    lock: Some("lock-1".to_string()),
                    received_at,
                },
                local_time: received_at.with_timezone(&offset),
                direction: Some(Direction::In),
                holder: Some("Ann Lee".to_string()),
            }],
            warnings: Vec::new(),
        };

        let text = history(&report);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "Access history 2024-03-05");
        assert_eq!(lines[2], "2024-03-05 18:00:00  0xa1b2c3  IN   granted  Ann Lee");
    }
}
