//! Authorized card list.
//!
//! The set is loaded once at start-up from a JSON card file and never changes
//! while the gate runs; lookups are plain in-memory set membership. The card
//! file is a JSON array of identifiers:
//!
//! ```json
//! ["0xdeadbeef", "0x04a1b2c3d4e5f6"]
//! ```

use crate::error::{StorageError, StorageResult};
use gatehouse_core::{CardUid, Decision};
use std::collections::HashSet;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;
use tracing::{info, warn};

/// Identifiers allowed through the gate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizationSet {
    cards: HashSet<CardUid>,
}

impl AuthorizationSet {
    /// An empty set. Every card is denied.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `uid` may trigger a grant.
    #[inline]
    pub fn is_authorized(&self, uid: &CardUid) -> bool {
        self.cards.contains(uid)
    }

    /// Decision for `uid`.
    #[inline]
    pub fn decide(&self, uid: &CardUid) -> Decision {
        Decision::from_authorized(self.is_authorized(uid))
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Identifiers in canonical order.
    pub fn sorted(&self) -> Vec<&CardUid> {
        let mut cards: Vec<_> = self.cards.iter().collect();
        cards.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        cards
    }

    /// Parse a JSON card list. Entries that are not valid identifiers are
    /// skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not a JSON array.
    pub fn from_json_str(json: &str) -> StorageResult<Self> {
        let entries: Vec<serde_json::Value> = serde_json::from_str(json)?;
        let mut cards = HashSet::with_capacity(entries.len());

        for entry in entries {
            match entry.as_str().map(CardUid::parse) {
                Some(Ok(uid)) => {
                    cards.insert(uid);
                }
                Some(Err(e)) => warn!(error = %e, "skipping invalid card entry"),
                None => warn!(entry = %entry, "skipping non-string card entry"),
            }
        }

        Ok(Self { cards })
    }

    /// Load the card file at `path`.
    ///
    /// A missing file yields an empty set.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or is not a
    /// JSON array.
    pub fn load_json(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let json = match fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(path = %path.display(), "card file not found, every card will be denied");
                return Ok(Self::new());
            }
            Err(e) => return Err(e.into()),
        };

        let set = Self::from_json_str(&json)?;
        info!(path = %path.display(), cards = set.len(), "authorized cards loaded");
        Ok(set)
    }

    /// Atomically replace the card file at `path` with this set.
    ///
    /// # Errors
    ///
    /// Refuses to write an empty set, and returns any I/O error.
    pub fn save_json(&self, path: impl AsRef<Path>) -> StorageResult<()> {
        let path = path.as_ref();
        if self.is_empty() {
            return Err(StorageError::Validation(
                "refusing to replace card file with an empty list".to_string(),
            ));
        }

        let json = serde_json::to_string_pretty(&self.sorted())?;
        let tmp = path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, path)?;

        info!(path = %path.display(), cards = self.len(), "card file written");
        Ok(())
    }
}

impl FromIterator<CardUid> for AuthorizationSet {
    fn from_iter<I: IntoIterator<Item = CardUid>>(iter: I) -> Self {
        Self {
            cards: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn uid(s: &str) -> CardUid {
        CardUid::parse(s).unwrap()
    }

    #[test]
    fn test_membership_ignores_hex_case() {
        let set: AuthorizationSet = [uid("0xDEADBEEF")].into_iter().collect();
        assert!(set.is_authorized(&uid("0xdeadbeef")));
        assert_eq!(set.decide(&uid("0xA1B2C3")), Decision::Denied);
    }

    #[test]
    fn test_from_json_skips_bad_entries() {
        let set =
            AuthorizationSet::from_json_str(r#"["0xdeadbeef", "nope", 42, "0x0102"]"#).unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.is_authorized(&uid("0x0102")));
    }

    #[test]
    fn test_from_json_rejects_non_array() {
        assert!(AuthorizationSet::from_json_str(r#"{"cards": []}"#).is_err());
    }

    #[test]
    fn test_missing_file_is_empty_set() {
        let dir = tempfile::tempdir().unwrap();
        let set = AuthorizationSet::load_json(dir.path().join("cards.json")).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cards.json");
        let set: AuthorizationSet = [uid("0x02"), uid("0x01")].into_iter().collect();

        set.save_json(&path).unwrap();
        assert_eq!(AuthorizationSet::load_json(&path).unwrap(), set);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_save_refuses_empty_set() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cards.json");
        std::fs::write(&path, r#"["0x01"]"#).unwrap();

        assert!(AuthorizationSet::new().save_json(&path).is_err());
        assert_eq!(AuthorizationSet::load_json(&path).unwrap().len(), 1);
    }

    proptest! {
        #[test]
        fn prop_decision_is_set_membership(
            members in proptest::collection::hash_set(proptest::collection::vec(any::<u8>(), 1..=10), 0..16),
            probe in proptest::collection::vec(any::<u8>(), 1..=10),
        ) {
            let set: AuthorizationSet = members
                .iter()
                .map(|bytes| CardUid::from_bytes(bytes).unwrap())
                .collect();
            let probe_uid = CardUid::from_bytes(&probe).unwrap();

            let expected = Decision::from_authorized(members.contains(&probe));
            prop_assert_eq!(set.decide(&probe_uid), expected);
            prop_assert_eq!(set.decide(&probe_uid), set.decide(&probe_uid));
        }
    }
}
