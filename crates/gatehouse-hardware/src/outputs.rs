//! Outputs that only log.
//!
//! Used when the gate runs without a relay board attached, for example on a
//! bench with only the reader connected.

use crate::error::Result;
use crate::traits::{BuzzerOutput, LockOutput};
use tracing::info;

/// Lock output that logs transitions.
#[derive(Debug, Clone, Default)]
pub struct LoggingLock;

impl LockOutput for LoggingLock {
    async fn set_engaged(&mut self, engaged: bool) -> Result<()> {
        info!(engaged, "lock");
        Ok(())
    }
}

/// Buzzer output that logs transitions.
#[derive(Debug, Clone, Default)]
pub struct LoggingBuzzer;

impl BuzzerOutput for LoggingBuzzer {
    async fn set_tone(&mut self, on: bool) -> Result<()> {
        tracing::debug!(on, "buzzer");
        Ok(())
    }
}
