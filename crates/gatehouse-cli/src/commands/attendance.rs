//! `gatehouse attendance`: reports and manual overrides.

use anyhow::{Context, Result, bail};
use chrono::{Datelike, NaiveDate, Utc};
use clap::{Args, Subcommand};
use gatehouse_attendance::{OverrideAction, PersonId, ReconciliationEngine};
use gatehouse_controller::GateConfig;
use gatehouse_network::RestAttendanceSource;

use super::rest_client;
use crate::render;

#[derive(Subcommand, Debug)]
pub enum AttendanceCommand {
    /// Yearly attendance per person per practice date
    Report {
        /// Calendar year (defaults to the current year)
        #[arg(long)]
        year: Option<i32>,
    },

    /// Attendance sheet for one practice date
    Daily {
        /// Date as YYYY-MM-DD (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Access events labeled IN/OUT for a range of days
    History {
        /// First day (defaults to the last day)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Last day (defaults to today)
        #[arg(long)]
        to: Option<NaiveDate>,
    },

    /// Set or clear a manual attendance or excuse flag
    Mark(MarkArgs),

    /// Flag a date as a practice date
    AddDate {
        /// Date as YYYY-MM-DD (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

#[derive(Args, Debug)]
pub struct MarkArgs {
    /// Person identifier
    #[arg(long)]
    pub person: PersonId,

    /// Practice date as YYYY-MM-DD (defaults to today)
    #[arg(long)]
    pub date: Option<NaiveDate>,

    #[command(flatten)]
    pub action: MarkAction,
}

/// Exactly one flag per invocation.
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct MarkAction {
    /// Set (true) or clear (false) manual attendance
    #[arg(long, value_name = "BOOL")]
    pub attended: Option<bool>,

    /// Set (true) or clear (false) the excuse
    #[arg(long, value_name = "BOOL")]
    pub excused: Option<bool>,
}

impl MarkAction {
    fn to_action(&self) -> Result<OverrideAction> {
        match (self.attended, self.excused) {
            (Some(attended), None) => Ok(OverrideAction::SetAttended(attended)),
            (None, Some(excused)) => Ok(OverrideAction::SetExcused(excused)),
            _ => bail!("pass exactly one of --attended or --excused"),
        }
    }
}

pub async fn run(config: &GateConfig, command: &AttendanceCommand) -> Result<()> {
    let offset = config.attendance.offset()?;
    let source = RestAttendanceSource::new(rest_client(config)?).with_offset(offset);
    let engine = ReconciliationEngine::new(source).with_offset(offset);
    let today = Utc::now().with_timezone(&offset).date_naive();

    match command {
        AttendanceCommand::Report { year } => {
            let report = engine.yearly_report(year.unwrap_or(today.year())).await;
            print!("{}", render::yearly(&report));
        }
        AttendanceCommand::Daily { date } => {
            let sheet = engine.daily_sheet(date.unwrap_or(today)).await;
            print!("{}", render::daily(&sheet));
        }
        AttendanceCommand::History { from, to } => {
            let last = to.unwrap_or(today);
            let first = from.unwrap_or(last);
            if first > last {
                bail!("--from {first} is after --to {last}");
            }
            let history = engine.access_history(first, last).await;
            print!("{}", render::history(&history));
        }
        AttendanceCommand::Mark(args) => {
            let date = args.date.unwrap_or(today);
            let record = engine
                .set_override(args.person, date, args.action.to_action()?)
                .await
                .with_context(|| format!("failed to update person {} on {date}", args.person))?;
            println!("Person {} on {date}: {}", args.person, record.status());
        }
        AttendanceCommand::AddDate { date } => {
            let date = date.unwrap_or(today);
            if engine.add_practice_date(date).await? {
                println!("Added practice date {date}");
            } else {
                println!("{date} is already a practice date");
            }
        }
    }

    Ok(())
}
