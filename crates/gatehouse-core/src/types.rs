use crate::{
    Result,
    constants::{MAX_UID_BYTES, MIN_UID_BYTES, UID_PREFIX},
    error::Error,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use subtle::ConstantTimeEq;
use uuid::Uuid;

/// Card identifier read from a proximity card.
///
/// Always held in canonical form: `0x` followed by the lowercase hex digits
/// of the UID bytes, e.g. `0x04abcdef`.
///
/// # Security
/// This type implements constant-time comparison so that authorization
/// lookups do not leak how much of an identifier matched.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CardUid(String);

impl CardUid {
    /// Build an identifier from raw UID bytes.
    ///
    /// # Errors
    /// Returns `Error::InvalidIdentifier` if the UID is shorter than
    /// `MIN_UID_BYTES` or longer than `MAX_UID_BYTES`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let len = bytes.len();
        if !(MIN_UID_BYTES..=MAX_UID_BYTES).contains(&len) {
            return Err(Error::InvalidIdentifier(format!(
                "UID must be {MIN_UID_BYTES}-{MAX_UID_BYTES} bytes, got {len}"
            )));
        }

        let mut text = String::with_capacity(UID_PREFIX.len() + len * 2);
        text.push_str(UID_PREFIX);
        for byte in bytes {
            text.push_str(&format!("{byte:02x}"));
        }
        Ok(CardUid(text))
    }

    /// Parse an identifier from text.
    ///
    /// The `0x` prefix is optional and hex digits may be in either case.
    /// Surrounding whitespace is ignored.
    ///
    /// # Errors
    /// Returns `Error::InvalidIdentifier` if the text is not an even number
    /// of hex digits or decodes to an out-of-range UID length.
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if digits.is_empty() || digits.len() % 2 != 0 {
            return Err(Error::InvalidIdentifier(format!(
                "expected an even number of hex digits, got {trimmed:?}"
            )));
        }

        let bytes = (0..digits.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&digits[i..i + 2], 16))
            .collect::<std::result::Result<Vec<u8>, _>>()
            .map_err(|_| Error::InvalidIdentifier(format!("not hexadecimal: {trimmed:?}")))?;

        Self::from_bytes(&bytes)
    }

    /// Get the canonical identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decode the identifier back into UID bytes.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let digits = &self.0[UID_PREFIX.len()..];
        (0..digits.len())
            .step_by(2)
            .filter_map(|i| u8::from_str_radix(&digits[i..i + 2], 16).ok())
            .collect()
    }

    /// Number of UID bytes.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        (self.0.len() - UID_PREFIX.len()) / 2
    }
}

impl fmt::Display for CardUid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for CardUid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        CardUid::parse(s)
    }
}

impl TryFrom<String> for CardUid {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        CardUid::parse(&value)
    }
}

impl From<CardUid> for String {
    fn from(uid: CardUid) -> String {
        uid.0
    }
}

/// Constant-time comparison implementation for CardUid
impl PartialEq for CardUid {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_bytes().ct_eq(other.0.as_bytes()).into()
    }
}

impl std::hash::Hash for CardUid {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

/// Outcome of an access decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Granted,
    Denied,
}

impl Decision {
    /// Map set membership to a decision.
    #[inline]
    #[must_use]
    pub fn from_authorized(authorized: bool) -> Self {
        if authorized {
            Decision::Granted
        } else {
            Decision::Denied
        }
    }

    /// Returns `true` if the decision is `Granted`.
    #[inline]
    #[must_use]
    pub fn is_granted(self) -> bool {
        matches!(self, Decision::Granted)
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Decision::Granted => write!(f, "Granted"),
            Decision::Denied => write!(f, "Denied"),
        }
    }
}

/// Delivery lifecycle of an access event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryState {
    Pending,
    Delivered,
}

/// Unique identifier of an access event, assigned at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

/// Namespace for ids derived from imported records.
const DERIVED_ID_NAMESPACE: Uuid = Uuid::from_u128(0x6a1f_4c2e_93b7_5d08_b4e1_27c9_0f3a_8d56);

impl EventId {
    /// Generate a fresh random event id.
    #[must_use]
    pub fn new() -> Self {
        EventId(Uuid::new_v4())
    }

    /// Id derived from `content`; the same bytes always give the same id.
    #[must_use]
    pub fn derived(content: &[u8]) -> Self {
        EventId(Uuid::new_v5(&DERIVED_ID_NAMESPACE, content))
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for EventId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(EventId)
            .map_err(|_| Error::InvalidEventId(s.to_string()))
    }
}

/// A single access attempt at the gate.
///
/// Created by the decision loop at the moment of a card read. Everything but
/// the delivery state is immutable; the delivery state moves from
/// `Pending` to `Delivered` exactly once.
///
/// `observed_at` is the device's own clock reading. It is kept for local
/// ordering and diagnostics only; the remote store assigns the
/// authoritative reception time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessEvent {
    id: EventId,
    identifier: CardUid,
    decision: Decision,
    observed_at: DateTime<Utc>,
    delivery_state: DeliveryState,
}

impl AccessEvent {
    /// Create a pending event stamped with the current device time.
    #[must_use]
    pub fn new(identifier: CardUid, decision: Decision) -> Self {
        Self::new_at(identifier, decision, Utc::now())
    }

    /// Create a pending event with an explicit device timestamp.
    #[must_use]
    pub fn new_at(identifier: CardUid, decision: Decision, observed_at: DateTime<Utc>) -> Self {
        Self {
            id: EventId::new(),
            identifier,
            decision,
            observed_at,
            delivery_state: DeliveryState::Pending,
        }
    }

    /// Replace the event id.
    #[must_use]
    pub fn with_id(mut self, id: EventId) -> Self {
        self.id = id;
        self
    }

    #[must_use]
    pub fn id(&self) -> EventId {
        self.id
    }

    #[must_use]
    pub fn identifier(&self) -> &CardUid {
        &self.identifier
    }

    #[must_use]
    pub fn decision(&self) -> Decision {
        self.decision
    }

    #[must_use]
    pub fn observed_at(&self) -> DateTime<Utc> {
        self.observed_at
    }

    #[must_use]
    pub fn delivery_state(&self) -> DeliveryState {
        self.delivery_state
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.delivery_state == DeliveryState::Pending
    }

    /// Record a confirmed delivery.
    ///
    /// # Errors
    /// Returns `Error::AlreadyDelivered` if the event was already marked.
    pub fn mark_delivered(&mut self) -> Result<()> {
        if self.delivery_state == DeliveryState::Delivered {
            return Err(Error::AlreadyDelivered(self.id.to_string()));
        }
        self.delivery_state = DeliveryState::Delivered;
        Ok(())
    }
}
