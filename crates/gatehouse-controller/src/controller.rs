//! Access decision loop.
//!
//! One cycle reads at most one card, decides, actuates, then records the
//! event:
//!
//! ```text
//! Idle ──read──> Reading ──card──> Deciding ──> Actuating ──record──> Idle
//!                   │
//!                   └──no card──> Idle
//! ```
//!
//! Recording follows the fast path only while the queue is empty: one
//! bounded delivery attempt, and the event is appended to the queue if that
//! attempt fails. When earlier events are still pending the new event goes
//! straight to the tail of the queue and the sync worker is nudged, so
//! delivery order always matches decision order.

use crate::state_machine::{GateState, GateStateMachine};
use crate::sync_worker::SyncNudge;
use gatehouse_core::AccessEvent;
use gatehouse_core::constants::DEFAULT_READ_TIMEOUT_MS;
use gatehouse_hardware::{Actuator, BuzzerOutput, CardReader, LockOutput};
use gatehouse_network::{DeliveryOutcome, EventSink};
use gatehouse_storage::{AuthorizationSet, EventQueue};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// How a cycle's event was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleHandling {
    /// The immediate delivery attempt succeeded
    DeliveredImmediately,
    /// The event is in the durable queue awaiting the sync worker
    Queued,
    /// Neither delivery nor the queue append succeeded; the event is lost
    QueueFailed,
}

/// Result of a cycle that read a card.
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    pub event: AccessEvent,
    pub handling: CycleHandling,
}

/// The decision loop. Sole producer of access events.
pub struct AccessController<R, L, B, K> {
    reader: R,
    authorizations: AuthorizationSet,
    actuator: Actuator<L, B>,
    queue: EventQueue,
    sink: K,
    nudge: SyncNudge,
    read_timeout: Duration,
    state: GateStateMachine,
}

impl<R, L, B, K> AccessController<R, L, B, K>
where
    R: CardReader,
    L: LockOutput,
    B: BuzzerOutput,
    K: EventSink,
{
    pub fn new(
        reader: R,
        authorizations: AuthorizationSet,
        actuator: Actuator<L, B>,
        queue: EventQueue,
        sink: K,
    ) -> Self {
        Self {
            reader,
            authorizations,
            actuator,
            queue,
            sink,
            nudge: SyncNudge::new(),
            read_timeout: Duration::from_millis(DEFAULT_READ_TIMEOUT_MS),
            state: GateStateMachine::new(),
        }
    }

    /// Bound on each card read.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Connect to a sync worker so queued events trigger an early pass.
    pub fn with_nudge(mut self, nudge: SyncNudge) -> Self {
        self.nudge = nudge;
        self
    }

    pub fn state(&self) -> &GateStateMachine {
        &self.state
    }

    pub fn authorizations(&self) -> &AuthorizationSet {
        &self.authorizations
    }

    /// Run one iteration of the loop.
    ///
    /// Returns `None` when no card was presented within the read timeout.
    pub async fn run_cycle(&mut self) -> Option<CycleOutcome> {
        if self.state.current_state() != GateState::Idle {
            warn!(state = %self.state.current_state(), "Recovering from interrupted cycle");
            self.state.reset();
        }

        self.enter(GateState::Reading);
        let Some(uid) = self.reader.read(self.read_timeout).await else {
            self.enter(GateState::Idle);
            return None;
        };

        self.enter(GateState::Deciding);
        let decision = self.authorizations.decide(&uid);
        let mut event = AccessEvent::new(uid, decision);
        info!(
            event_id = %event.id(),
            card_uid = %event.identifier(),
            decision = %decision,
            "Access decision"
        );

        self.enter(GateState::Actuating);
        self.actuator.actuate(decision).await;
        let handling = self.record(&mut event).await;
        self.enter(GateState::Idle);

        Some(CycleOutcome { event, handling })
    }

    /// Loop until `shutdown` turns `true` or its sender is dropped.
    ///
    /// Shutdown is checked between cycles; a running actuation always
    /// finishes and leaves the lock engaged.
    pub async fn run(&mut self, shutdown: watch::Receiver<bool>) {
        self.actuator.secure().await;
        info!(
            authorized_cards = self.authorizations.len(),
            read_timeout_ms = self.read_timeout.as_millis() as u64,
            "Decision loop started"
        );

        while !*shutdown.borrow() && shutdown.has_changed().is_ok() {
            if let Some(outcome) = self.run_cycle().await {
                debug!(
                    event_id = %outcome.event.id(),
                    handling = ?outcome.handling,
                    "Cycle finished"
                );
            }
        }

        self.actuator.secure().await;
        info!(
            cycles = self.state.completed_cycles(),
            "Decision loop stopped"
        );
    }

    async fn record(&mut self, event: &mut AccessEvent) -> CycleHandling {
        let backlog = match self.queue.is_empty().await {
            Ok(empty) => !empty,
            Err(e) => {
                warn!(error = %e, "Queue check failed, skipping immediate delivery");
                true
            }
        };

        if !backlog {
            match self.sink.deliver(event).await {
                DeliveryOutcome::Delivered => {
                    if let Err(e) = event.mark_delivered() {
                        debug!(event_id = %event.id(), error = %e, "Event already delivered");
                    }
                    return CycleHandling::DeliveredImmediately;
                }
                DeliveryOutcome::Failed(reason) => {
                    debug!(event_id = %event.id(), reason = %reason, "Immediate delivery failed");
                }
            }
        }

        match self.queue.append(event).await {
            Ok(_) => {
                if backlog {
                    self.nudge.nudge();
                }
                debug!(event_id = %event.id(), "Event queued");
                CycleHandling::Queued
            }
            Err(e) => {
                error!(event_id = %event.id(), error = %e, "Failed to queue event");
                CycleHandling::QueueFailed
            }
        }
    }

    fn enter(&mut self, next: GateState) {
        if let Err(e) = self.state.transition_to(next) {
            error!(error = %e, "Gate state machine out of step");
            self.state.reset();
        }
    }
}
