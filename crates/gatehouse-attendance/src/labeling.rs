//! IN/OUT labeling of raw access history.
//!
//! The gate has a single reader, so whether a scan was an entry or an exit is
//! not observed. [`ParityLabeler`] infers it: per card and local day, granted
//! scans in time order alternate IN, OUT, IN, ... A single missed scan shifts
//! every later label for that card and day. Treat the labels as a hint.

use crate::model::DeliveredEvent;
use chrono::{FixedOffset, NaiveDate};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Inferred direction of a granted scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Direction {
    In,
    Out,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Direction::In => f.write_str("IN"),
            Direction::Out => f.write_str("OUT"),
        }
    }
}

/// Assigns directions to a batch of delivered events.
pub trait DirectionLabeler: Send + Sync {
    /// Label `events`, which are sorted by reception time.
    ///
    /// The result is index-aligned with `events`; `None` means unlabeled.
    fn label(&self, events: &[DeliveredEvent], offset: FixedOffset) -> Vec<Option<Direction>>;
}

/// Alternates IN/OUT per card per local day. Denied scans are unlabeled.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParityLabeler;

impl DirectionLabeler for ParityLabeler {
    fn label(&self, events: &[DeliveredEvent], offset: FixedOffset) -> Vec<Option<Direction>> {
        let mut seen: HashMap<(&str, NaiveDate), usize> = HashMap::new();

        events
            .iter()
            .map(|event| {
                if !event.granted {
                    return None;
                }
                let count = seen
                    .entry((event.card_uid.as_str(), event.local_date(offset)))
                    .or_default();
                let direction = if *count % 2 == 0 {
                    Direction::In
                } else {
                    Direction::Out
                };
                *count += 1;
                Some(direction)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_core::CardUid;

    fn sast() -> FixedOffset {
        FixedOffset::east_opt(2 * 3600).unwrap()
    }

    fn event(uid: &str, granted: bool, at: &str) -> DeliveredEvent {
        DeliveredEvent {
            card_uid: CardUid::parse(uid).unwrap(),
            granted,
            lock: Some("lock-1".to_string()),
            received_at: at.parse().unwrap(),
        }
    }

    #[test]
    fn test_alternates_per_card() {
        let events = vec![
            event("0x01", true, "2025-01-10T06:00:00Z"),
            event("0x02", true, "2025-01-10T06:05:00Z"),
            event("0x01", true, "2025-01-10T10:00:00Z"),
            event("0x01", true, "2025-01-10T12:00:00Z"),
            event("0x02", true, "2025-01-10T14:00:00Z"),
        ];
        let labels = ParityLabeler.label(&events, sast());

        assert_eq!(
            labels,
            vec![
                Some(Direction::In),
                Some(Direction::In),
                Some(Direction::Out),
                Some(Direction::In),
                Some(Direction::Out),
            ]
        );
    }

    #[test]
    fn test_denied_scans_are_unlabeled_and_not_counted() {
        let events = vec![
            event("0x01", true, "2025-01-10T06:00:00Z"),
            event("0x01", false, "2025-01-10T07:00:00Z"),
            event("0x01", true, "2025-01-10T08:00:00Z"),
        ];
        let labels = ParityLabeler.label(&events, sast());

        assert_eq!(labels, vec![Some(Direction::In), None, Some(Direction::Out)]);
    }

    #[test]
    fn test_parity_resets_on_local_day() {
        // 21:30Z and 22:30Z fall on different days at +02:00
        let events = vec![
            event("0x01", true, "2025-01-10T21:30:00Z"),
            event("0x01", true, "2025-01-10T22:30:00Z"),
        ];
        let labels = ParityLabeler.label(&events, sast());

        assert_eq!(labels, vec![Some(Direction::In), Some(Direction::In)]);
    }

    #[test]
    fn test_direction_display() {
        assert_eq!(Direction::In.to_string(), "IN");
        assert_eq!(Direction::Out.to_string(), "OUT");
    }
}
