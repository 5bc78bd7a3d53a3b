use crate::model::PersonId;
use chrono::NaiveDate;
use thiserror::Error;

/// Errors raised by attendance sources and override writes.
///
/// Report generation never returns these; a failing dataset becomes a
/// [`ReportWarning`](crate::report::ReportWarning) on the report instead.
#[derive(Debug, Error)]
pub enum AttendanceError {
    /// The backing store could not be queried or written
    #[error("Attendance source error: {0}")]
    Source(String),

    /// A record from the store did not match the expected schema
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// The person is not on the roster for that year
    #[error("Unknown person: {0}")]
    UnknownPerson(PersonId),

    /// The date has no practice session
    #[error("{0} is not a practice date")]
    NotAPracticeDate(NaiveDate),

    /// Core type validation failed
    #[error(transparent)]
    Core(#[from] gatehouse_core::Error),
}

impl AttendanceError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Source(message.into())
    }
}

/// Result type for attendance operations
pub type Result<T> = std::result::Result<T, AttendanceError>;
