//! Gate state machine.
//!
//! Tracks the phase of the access decision loop and rejects out-of-order
//! phase changes.
//!
//! # States
//!
//! - `Idle`: between cycles
//! - `Reading`: polling the reader with a bounded timeout
//! - `Deciding`: looking the card up in the authorization set
//! - `Actuating`: playing the grant or deny sequence, then recording the event
//!
//! # Valid Transitions
//!
//! - Idle → Reading → Idle (no card)
//! - Idle → Reading → Deciding → Actuating → Idle
//!
//! # Examples
//!
//! ```
//! use gatehouse_controller::{GateState, GateStateMachine};
//!
//! let mut machine = GateStateMachine::new();
//! machine.transition_to(GateState::Reading).unwrap();
//! machine.transition_to(GateState::Deciding).unwrap();
//! assert!(machine.transition_to(GateState::Idle).is_err());
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use gatehouse_core::{Error, Result};

/// Maximum number of transitions kept in history.
///
/// A full access cycle is four transitions, so this covers the last 25
/// cycles.
const MAX_HISTORY_SIZE: usize = 100;

/// Phase of the access decision loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    /// Between cycles, lock engaged.
    Idle,

    /// Waiting on the reader.
    Reading,

    /// A card was read; the decision is being made.
    Deciding,

    /// Driving the lock and buzzer, then recording the event.
    Actuating,
}

impl fmt::Display for GateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state_str = match self {
            GateState::Idle => "Idle",
            GateState::Reading => "Reading",
            GateState::Deciding => "Deciding",
            GateState::Actuating => "Actuating",
        };
        write!(f, "{}", state_str)
    }
}

impl GateState {
    /// Whether the loop may move from this state to `target`.
    ///
    /// ```
    /// use gatehouse_controller::GateState;
    ///
    /// assert!(GateState::Reading.can_transition_to(&GateState::Idle));
    /// assert!(!GateState::Idle.can_transition_to(&GateState::Actuating));
    /// ```
    pub fn can_transition_to(&self, target: &GateState) -> bool {
        matches!(
            (self, target),
            (GateState::Idle, GateState::Reading)
                | (GateState::Reading, GateState::Idle | GateState::Deciding)
                | (GateState::Deciding, GateState::Actuating)
                | (GateState::Actuating, GateState::Idle)
        )
    }
}

/// A single state change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: GateState,
    pub to: GateState,

    /// Not serialized; set to the deserialization time when read back.
    #[serde(skip, default = "Instant::now")]
    pub timestamp: Instant,
}

impl StateTransition {
    pub fn new(from: GateState, to: GateState) -> Self {
        Self {
            from,
            to,
            timestamp: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.timestamp.elapsed()
    }
}

/// Validated state tracking for the decision loop.
///
/// Not thread-safe; the decision loop owns it.
#[derive(Debug)]
pub struct GateStateMachine {
    current_state: GateState,
    state_entered_at: Instant,
    history: VecDeque<StateTransition>,
    cycles: u64,
}

impl GateStateMachine {
    /// A machine in the `Idle` state with empty history.
    pub fn new() -> Self {
        Self {
            current_state: GateState::Idle,
            state_entered_at: Instant::now(),
            history: VecDeque::with_capacity(MAX_HISTORY_SIZE),
            cycles: 0,
        }
    }

    pub fn current_state(&self) -> GateState {
        self.current_state
    }

    pub fn time_in_current_state(&self) -> Duration {
        self.state_entered_at.elapsed()
    }

    /// Recent transitions, oldest first.
    pub fn history(&self) -> &VecDeque<StateTransition> {
        &self.history
    }

    /// The last `count` transitions, oldest first.
    pub fn last_transitions(&self, count: usize) -> Vec<StateTransition> {
        self.history
            .iter()
            .rev()
            .take(count)
            .rev()
            .cloned()
            .collect()
    }

    /// Number of completed cycles that reached `Actuating`.
    pub fn completed_cycles(&self) -> u64 {
        self.cycles
    }

    /// Move to `new_state`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidStateTransition` if the move is not allowed
    /// from the current state; the machine is left unchanged.
    pub fn transition_to(&mut self, new_state: GateState) -> Result<StateTransition> {
        if !self.current_state.can_transition_to(&new_state) {
            return Err(Error::InvalidStateTransition {
                from: self.current_state.to_string(),
                to: new_state.to_string(),
            });
        }

        if self.current_state == GateState::Actuating && new_state == GateState::Idle {
            self.cycles += 1;
        }

        let transition = StateTransition::new(self.current_state, new_state);
        self.perform_state_change(new_state, transition.clone());
        Ok(transition)
    }

    /// Force the machine back to `Idle`, e.g. after an interrupted cycle.
    pub fn reset(&mut self) -> StateTransition {
        let transition = StateTransition::new(self.current_state, GateState::Idle);
        self.perform_state_change(GateState::Idle, transition.clone());
        transition
    }

    fn perform_state_change(&mut self, new_state: GateState, transition: StateTransition) {
        self.current_state = new_state;
        self.state_entered_at = Instant::now();

        self.history.push_back(transition);
        if self.history.len() > MAX_HISTORY_SIZE {
            self.history.pop_front();
        }
    }
}

impl Default for GateStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
