//! Core constants for the gate controller.
//!
//! Timing values are the defaults of the access-control core. Every one of
//! them can be overridden through configuration; these are the values used
//! when a configuration file leaves a field out.
//!
//! # Usage
//!
//! ```
//! use gatehouse_core::constants::*;
//! use std::time::Duration;
//!
//! let unlock = Duration::from_secs(DEFAULT_UNLOCK_SECS);
//! assert_eq!(unlock.as_secs(), 5);
//! assert_eq!(UID_PREFIX, "0x");
//! ```

// ============================================================================
// Card Identifiers
// ============================================================================

/// Prefix of the canonical textual form of a card identifier.
pub const UID_PREFIX: &str = "0x";

/// Minimum UID length in bytes accepted by the core.
pub const MIN_UID_BYTES: usize = 1;

/// Maximum UID length in bytes (ISO 14443 triple-size UID).
pub const MAX_UID_BYTES: usize = 10;

// ============================================================================
// Reader Timing
// ============================================================================

/// Default bound on a single card read, in milliseconds.
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 500;

/// Default interval between transport polls while waiting for a reply frame.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

// ============================================================================
// Actuation Profile
// ============================================================================

/// Default time the lock stays open after a grant, in seconds.
pub const DEFAULT_UNLOCK_SECS: u64 = 5;

/// Default length of the single grant tone, in milliseconds.
pub const DEFAULT_GRANT_TONE_MS: u64 = 200;

/// Default length of each deny tone, in milliseconds.
pub const DEFAULT_DENY_TONE_MS: u64 = 100;

/// Default silence between deny tones, in milliseconds.
pub const DEFAULT_DENY_GAP_MS: u64 = 100;

/// Number of tones emitted on a deny.
pub const DEFAULT_DENY_TONE_COUNT: u8 = 3;

// ============================================================================
// Delivery
// ============================================================================

/// Default slow-path sync interval, in seconds.
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 60;

/// Default bound on one remote delivery attempt, in milliseconds.
pub const DEFAULT_DELIVERY_TIMEOUT_MS: u64 = 3000;

/// Default maximum number of events delivered in one sync pass.
pub const DEFAULT_SYNC_BATCH_LIMIT: usize = 100;

/// Gate identifier used when none is configured.
pub const DEFAULT_GATE_ID: &str = "lock-1";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uid_bounds() {
        assert!(MIN_UID_BYTES >= 1);
        assert!(MIN_UID_BYTES <= MAX_UID_BYTES);
    }

    #[test]
    fn test_deny_profile_fits_in_a_second() {
        let total = DEFAULT_DENY_TONE_COUNT as u64 * (DEFAULT_DENY_TONE_MS + DEFAULT_DENY_GAP_MS);
        assert!(total <= 1000);
    }
}
