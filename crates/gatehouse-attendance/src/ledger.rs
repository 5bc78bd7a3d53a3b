//! Shared presence state with per-key write serialization.

use crate::model::{OverrideAction, PersonId};
use crate::record::PresenceRecord;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

type Key = (PersonId, NaiveDate);

/// Presence records keyed by (person, date).
///
/// Records are created on the first signal for a key and amended while a
/// writer holds the key. Each mutation happens under the map lock, so the
/// manual and excuse flags always change together.
/// [`PresenceLedger::writer_lock`] hands out a per-key async lock for callers
/// that must also persist the result before the next writer for the same key
/// runs; [`PresenceLedger::release`] drops the key once no writer holds it.
#[derive(Debug, Default)]
pub struct PresenceLedger {
    records: Mutex<HashMap<Key, PresenceRecord>>,
    writers: Mutex<HashMap<Key, Arc<tokio::sync::Mutex<()>>>>,
}

impl PresenceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a granted card scan.
    pub fn record_card(&self, person: PersonId, date: NaiveDate) -> PresenceRecord {
        let mut records = self.records();
        let record = records.entry((person, date)).or_default();
        record.mark_card_seen();
        *record
    }

    /// Replace the manual flags with a stored pair, keeping card presence.
    pub fn load_manual(
        &self,
        person: PersonId,
        date: NaiveDate,
        attended: bool,
        excuse: bool,
    ) -> PresenceRecord {
        let mut records = self.records();
        let record = records.entry((person, date)).or_default();
        *record = PresenceRecord::from_flags(record.via_card(), attended, excuse);
        *record
    }

    /// Apply a manual change and return the resulting record.
    pub fn apply(
        &self,
        person: PersonId,
        date: NaiveDate,
        action: OverrideAction,
    ) -> PresenceRecord {
        let mut records = self.records();
        let record = records.entry((person, date)).or_default();
        record.apply(action);
        *record
    }

    /// Async lock serializing writers for one key.
    pub fn writer_lock(&self, person: PersonId, date: NaiveDate) -> Arc<tokio::sync::Mutex<()>> {
        let mut writers = self
            .writers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(writers.entry((person, date)).or_default())
    }

    /// Forget the key once no other writer holds or waits on its lock.
    ///
    /// Call after dropping the handle returned by
    /// [`PresenceLedger::writer_lock`]. Returns `true` if the key was removed.
    pub fn release(&self, person: PersonId, date: NaiveDate) -> bool {
        let mut writers = self
            .writers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let key = (person, date);
        let idle = writers
            .get(&key)
            .is_none_or(|writer| Arc::strong_count(writer) == 1);
        if idle {
            writers.remove(&key);
            self.records().remove(&key);
        }
        idle
    }

    /// Number of keys currently tracked.
    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }

    fn records(&self) -> MutexGuard<'_, HashMap<Key, PresenceRecord>> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
