//! Per-person, per-day presence state.

use crate::model::OverrideAction;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Attendance status of one person on one practice date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayStatus {
    Present,
    Excused,
    Absent,
    /// The card-scan data for the date could not be loaded.
    NoData,
}

impl DayStatus {
    /// Short marker for tabular output.
    pub fn marker(self) -> &'static str {
        match self {
            DayStatus::Present => "P",
            DayStatus::Excused => "E",
            DayStatus::Absent => "A",
            DayStatus::NoData => "?",
        }
    }
}

impl fmt::Display for DayStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            DayStatus::Present => "present",
            DayStatus::Excused => "excused",
            DayStatus::Absent => "absent",
            DayStatus::NoData => "no data",
        };
        f.write_str(s)
    }
}

/// The three attendance signals for a (person, date) pair.
///
/// `via_manual` and `via_excuse` are never both set: every mutator that sets
/// one clears the other. `via_card` comes from delivered access events and
/// is never cleared by a manual action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct PresenceRecord {
    via_card: bool,
    via_manual: bool,
    via_excuse: bool,
}

impl PresenceRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from a stored flag pair.
    ///
    /// Stored data may carry both flags set; attended wins in that case.
    pub fn from_flags(via_card: bool, attended: bool, excuse: bool) -> Self {
        Self {
            via_card,
            via_manual: attended,
            via_excuse: excuse && !attended,
        }
    }

    pub fn via_card(&self) -> bool {
        self.via_card
    }

    pub fn via_manual(&self) -> bool {
        self.via_manual
    }

    pub fn via_excuse(&self) -> bool {
        self.via_excuse
    }

    /// Record a granted card scan for the day.
    pub fn mark_card_seen(&mut self) {
        self.via_card = true;
    }

    /// Apply a manual change. Setting one manual flag clears the other.
    pub fn apply(&mut self, action: OverrideAction) {
        match action {
            OverrideAction::SetAttended(attended) => {
                self.via_manual = attended;
                if attended {
                    self.via_excuse = false;
                }
            }
            OverrideAction::SetExcused(excused) => {
                self.via_excuse = excused;
                if excused {
                    self.via_manual = false;
                }
            }
        }
    }

    /// Present by card or by manual entry.
    pub fn is_present(&self) -> bool {
        self.via_card || self.via_manual
    }

    /// Excused and not otherwise present.
    pub fn is_excused(&self) -> bool {
        self.via_excuse && !self.is_present()
    }

    pub fn status(&self) -> DayStatus {
        if self.is_present() {
            DayStatus::Present
        } else if self.is_excused() {
            DayStatus::Excused
        } else {
            DayStatus::Absent
        }
    }
}
