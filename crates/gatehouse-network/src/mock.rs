//! In-memory event sink for tests and offline runs.

use crate::sink::{DeliveryOutcome, EventSink};
use gatehouse_core::{AccessEvent, EventId};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

#[derive(Debug)]
struct SinkState {
    reachable: bool,
    attempts: usize,
    delivered: Vec<AccessEvent>,
}

/// Sink that records delivered events and can be taken offline.
///
/// Clones share state, so a test keeps one clone and hands another to the
/// code under test.
///
/// # Example
///
/// ```
/// use gatehouse_core::{AccessEvent, CardUid, Decision};
/// use gatehouse_network::{DeliveryOutcome, EventSink, MemorySink};
///
/// # async fn example() {
/// let sink = MemorySink::new();
/// sink.set_reachable(false);
///
/// let event = AccessEvent::new(CardUid::parse("0xa1b2c3").unwrap(), Decision::Denied);
/// assert!(matches!(sink.deliver(&event).await, DeliveryOutcome::Failed(_)));
///
/// sink.set_reachable(true);
/// assert_eq!(sink.deliver(&event).await, DeliveryOutcome::Delivered);
/// assert_eq!(sink.delivered().len(), 1);
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MemorySink {
    state: Arc<Mutex<SinkState>>,
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySink {
    /// A reachable sink with nothing delivered.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SinkState {
                reachable: true,
                attempts: 0,
                delivered: Vec::new(),
            })),
        }
    }

    /// A sink that fails every delivery until made reachable.
    pub fn unreachable() -> Self {
        let sink = Self::new();
        sink.set_reachable(false);
        sink
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.state().reachable = reachable;
    }

    pub fn is_reachable(&self) -> bool {
        self.state().reachable
    }

    /// Every accepted event, in delivery order, duplicates included.
    pub fn delivered(&self) -> Vec<AccessEvent> {
        self.state().delivered.clone()
    }

    pub fn delivered_ids(&self) -> Vec<EventId> {
        self.state().delivered.iter().map(AccessEvent::id).collect()
    }

    /// Number of delivery attempts, successful or not.
    pub fn attempts(&self) -> usize {
        self.state().attempts
    }

    fn state(&self) -> MutexGuard<'_, SinkState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl EventSink for MemorySink {
    async fn deliver(&self, event: &AccessEvent) -> DeliveryOutcome {
        let mut state = self.state();
        state.attempts += 1;
        if !state.reachable {
            debug!(event_id = %event.id(), "Sink unreachable");
            return DeliveryOutcome::Failed("sink unreachable".to_string());
        }
        state.delivered.push(event.clone());
        DeliveryOutcome::Delivered
    }
}
