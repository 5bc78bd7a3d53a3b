//! Gate actuator: turns a decision into lock and buzzer activity.
//!
//! A grant sounds one short tone, releases the lock for the unlock window and
//! re-engages it. A deny sounds a burst of short tones and never touches the
//! lock. Output errors are logged rather than returned; the lock is always
//! commanded back to engaged at the end of a grant, even when releasing it
//! failed.

use crate::traits::{BuzzerOutput, LockOutput};
use gatehouse_core::constants::{
    DEFAULT_DENY_GAP_MS, DEFAULT_DENY_TONE_COUNT, DEFAULT_DENY_TONE_MS, DEFAULT_GRANT_TONE_MS,
    DEFAULT_UNLOCK_SECS,
};
use gatehouse_core::Decision;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Timings used by the [`Actuator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActuationProfile {
    /// Length of the grant tone.
    pub grant_tone: Duration,
    /// How long the lock stays released after a grant.
    pub unlock: Duration,
    /// Length of each deny tone.
    pub deny_tone: Duration,
    /// Silence between deny tones.
    pub deny_gap: Duration,
    /// Number of deny tones.
    pub deny_tone_count: u8,
}

impl Default for ActuationProfile {
    fn default() -> Self {
        Self {
            grant_tone: Duration::from_millis(DEFAULT_GRANT_TONE_MS),
            unlock: Duration::from_secs(DEFAULT_UNLOCK_SECS),
            deny_tone: Duration::from_millis(DEFAULT_DENY_TONE_MS),
            deny_gap: Duration::from_millis(DEFAULT_DENY_GAP_MS),
            deny_tone_count: DEFAULT_DENY_TONE_COUNT,
        }
    }
}

/// Drives the lock and buzzer for a decision.
#[derive(Debug)]
pub struct Actuator<L, B> {
    lock: L,
    buzzer: B,
    profile: ActuationProfile,
}

impl<L: LockOutput, B: BuzzerOutput> Actuator<L, B> {
    /// Create an actuator with the given outputs and timings.
    pub fn new(lock: L, buzzer: B, profile: ActuationProfile) -> Self {
        Self {
            lock,
            buzzer,
            profile,
        }
    }

    /// Timings in use.
    pub fn profile(&self) -> &ActuationProfile {
        &self.profile
    }

    /// Command the lock to its engaged state, e.g. at start-up.
    pub async fn secure(&mut self) {
        if let Err(e) = self.lock.set_engaged(true).await {
            error!(error = %e, "failed to engage lock");
        }
    }

    /// Perform the feedback for `decision`. Returns once the sequence is over.
    pub async fn actuate(&mut self, decision: Decision) {
        match decision {
            Decision::Granted => self.grant().await,
            Decision::Denied => self.deny().await,
        }
    }

    /// One tone, release for the unlock window, re-engage.
    pub async fn grant(&mut self) {
        info!(unlock_ms = self.profile.unlock.as_millis() as u64, "access granted");
        self.tone(self.profile.grant_tone).await;

        match self.lock.set_engaged(false).await {
            Ok(()) => tokio::time::sleep(self.profile.unlock).await,
            Err(e) => warn!(error = %e, "failed to release lock"),
        }

        if let Err(e) = self.lock.set_engaged(true).await {
            error!(error = %e, "failed to re-engage lock");
        }
    }

    /// A burst of short tones. The lock is not touched.
    pub async fn deny(&mut self) {
        info!("access denied");
        for i in 0..self.profile.deny_tone_count {
            if i > 0 {
                tokio::time::sleep(self.profile.deny_gap).await;
            }
            self.tone(self.profile.deny_tone).await;
        }
    }

    async fn tone(&mut self, length: Duration) {
        debug!(length_ms = length.as_millis() as u64, "tone");
        if let Err(e) = self.buzzer.set_tone(true).await {
            warn!(error = %e, "buzzer failed");
            return;
        }
        tokio::time::sleep(length).await;
        if let Err(e) = self.buzzer.set_tone(false).await {
            warn!(error = %e, "buzzer failed to stop");
        }
    }
}
