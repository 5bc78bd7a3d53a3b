//! Recording lock and buzzer outputs.
//!
//! Both outputs append to a shared [`OutputLog`] stamped with
//! `tokio::time::Instant`, so paused-clock tests can assert exact timings.

use crate::error::{HardwareError, Result};
use crate::traits::{BuzzerOutput, LockOutput};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

/// A single output transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSignal {
    LockEngaged,
    LockReleased,
    ToneOn,
    ToneOff,
}

/// A recorded transition and when it happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputEvent {
    pub at: Instant,
    pub signal: OutputSignal,
}

#[derive(Debug, Default)]
struct LogState {
    events: Vec<OutputEvent>,
    fail_release: bool,
}

/// Shared log of lock and buzzer transitions.
#[derive(Debug, Clone, Default)]
pub struct OutputLog {
    state: Arc<Mutex<LogState>>,
}

impl OutputLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// A lock output that records into this log.
    pub fn lock_output(&self) -> RecordingLock {
        RecordingLock { log: self.clone() }
    }

    /// A buzzer output that records into this log.
    pub fn buzzer_output(&self) -> RecordingBuzzer {
        RecordingBuzzer { log: self.clone() }
    }

    /// Make the lock refuse to release. Re-engaging still succeeds.
    pub fn fail_release(&self, fail: bool) {
        self.lock().fail_release = fail;
    }

    /// All recorded transitions.
    pub fn events(&self) -> Vec<OutputEvent> {
        self.lock().events.clone()
    }

    /// Recorded signals without timestamps.
    pub fn signals(&self) -> Vec<OutputSignal> {
        self.lock().events.iter().map(|e| e.signal).collect()
    }

    /// Number of tones started.
    pub fn tone_count(&self) -> usize {
        self.count(OutputSignal::ToneOn)
    }

    /// Number of times the lock was released.
    pub fn release_count(&self) -> usize {
        self.count(OutputSignal::LockReleased)
    }

    /// Time between the first occurrence of `from` and the first `to` after it.
    pub fn span(&self, from: OutputSignal, to: OutputSignal) -> Option<Duration> {
        let events = self.events();
        let start = events.iter().position(|e| e.signal == from)?;
        let end = events[start..].iter().find(|e| e.signal == to)?;
        Some(end.at - events[start].at)
    }

    /// Whether the last lock transition left the door locked.
    pub fn is_locked(&self) -> bool {
        self.lock()
            .events
            .iter()
            .rev()
            .find_map(|e| match e.signal {
                OutputSignal::LockEngaged => Some(true),
                OutputSignal::LockReleased => Some(false),
                _ => None,
            })
            .unwrap_or(true)
    }

    fn count(&self, signal: OutputSignal) -> usize {
        self.lock().events.iter().filter(|e| e.signal == signal).count()
    }

    fn record(&self, signal: OutputSignal) {
        self.lock().events.push(OutputEvent {
            at: Instant::now(),
            signal,
        });
    }

    fn lock(&self) -> MutexGuard<'_, LogState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Lock output that records transitions.
#[derive(Debug, Clone)]
pub struct RecordingLock {
    log: OutputLog,
}

impl LockOutput for RecordingLock {
    async fn set_engaged(&mut self, engaged: bool) -> Result<()> {
        if engaged {
            self.log.record(OutputSignal::LockEngaged);
        } else {
            if self.log.lock().fail_release {
                return Err(HardwareError::output("lock release refused"));
            }
            self.log.record(OutputSignal::LockReleased);
        }
        Ok(())
    }
}

/// Buzzer output that records transitions.
#[derive(Debug, Clone)]
pub struct RecordingBuzzer {
    log: OutputLog,
}

impl BuzzerOutput for RecordingBuzzer {
    async fn set_tone(&mut self, on: bool) -> Result<()> {
        self.log.record(if on {
            OutputSignal::ToneOn
        } else {
            OutputSignal::ToneOff
        });
        Ok(())
    }
}
