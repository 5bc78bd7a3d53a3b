//! Gate controller runtime.
//!
//! Two activities share the durable event queue:
//!
//! - the **decision loop** ([`AccessController`]): reads a card, decides
//!   against the authorization set, drives the lock and buzzer, then
//!   delivers the event or queues it;
//! - the **sync worker** ([`SyncWorker`]): drains the queue into the remote
//!   sink on a fixed interval or when nudged, retrying without limit.
//!
//! # Example
//!
//! ```no_run
//! use gatehouse_controller::{AccessController, GateConfig, SyncWorker};
//! use gatehouse_hardware::mock::MockReader;
//! use gatehouse_hardware::{Actuator, LoggingBuzzer, LoggingLock};
//! use gatehouse_network::MemorySink;
//! use gatehouse_storage::{AuthorizationSet, Database, EventQueue};
//! use tokio::sync::watch;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GateConfig::from_file("gatehouse.toml")?;
//! let db = Database::new(config.queue.database_config()).await?;
//! let queue = EventQueue::new(&db);
//! let sink = MemorySink::new();
//!
//! let worker = SyncWorker::new(queue.clone(), sink.clone(), config.sync.sync_config());
//! let (reader, _handle) = MockReader::new();
//! let actuator = Actuator::new(LoggingLock, LoggingBuzzer, config.actuator.profile());
//! let mut controller = AccessController::new(
//!     reader,
//!     AuthorizationSet::load_json(&config.gate.card_file)?,
//!     actuator,
//!     queue,
//!     sink,
//! )
//! .with_nudge(worker.nudge_handle());
//!
//! let (_stop, shutdown) = watch::channel(false);
//! tokio::spawn(worker.run(shutdown.clone()));
//! controller.run(shutdown).await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod controller;
pub mod error;
pub mod state_machine;
pub mod sync_worker;

pub use config::{API_KEY_ENV, GateConfig};
pub use controller::{AccessController, CycleHandling, CycleOutcome};
pub use error::{ControllerError, Result};
pub use state_machine::{GateState, GateStateMachine, StateTransition};
pub use sync_worker::{SyncConfig, SyncNudge, SyncReport, SyncWorker};
