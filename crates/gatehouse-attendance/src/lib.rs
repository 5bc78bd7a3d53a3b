//! Attendance reconciliation.
//!
//! Merges three independent signals into one presence state per person per
//! practice date:
//!
//! - granted card scans delivered by the gate,
//! - manually entered "attended" marks,
//! - manually entered excuses.
//!
//! Manual attendance and excuse are mutually exclusive; setting one clears
//! the other. A card scan is never undone by a manual action. A person
//! counts as present with a scan or a manual mark, and as excused only when
//! excused and not present.
//!
//! # Examples
//!
//! ```
//! use gatehouse_attendance::{MemoryAttendanceStore, ReconciliationEngine};
//!
//! # async fn example() {
//! let engine = ReconciliationEngine::new(MemoryAttendanceStore::new());
//! let report = engine.yearly_report(2025).await;
//! for row in &report.people {
//!     println!("{}: {}", row.person.full_name(), row.percentage);
//! }
//! # }
//! ```

pub mod engine;
pub mod error;
pub mod labeling;
pub mod ledger;
pub mod model;
pub mod record;
pub mod report;
pub mod source;

pub use engine::{DEFAULT_UTC_OFFSET_SECS, ReconciliationEngine};
pub use error::{AttendanceError, Result};
pub use labeling::{Direction, DirectionLabeler, ParityLabeler};
pub use ledger::PresenceLedger;
pub use model::{
    DeliveredEvent, ManualOverride, OverrideAction, PersonId, PracticeDate, RosterEntry, TimeRange,
};
pub use record::{DayStatus, PresenceRecord};
pub use report::{
    AccessHistory, AttendancePercentage, DailyRow, DailySheet, Dataset, HistoryEntry,
    PersonYearSummary, ReportWarning, YearlyReport,
};
pub use source::{AttendanceSource, AttendanceStore, MemoryAttendanceStore};
