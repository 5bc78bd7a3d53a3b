//! Storage layer for the gate controller.
//!
//! - [`Database`]: SQLite connection pool with embedded migrations
//! - [`EventQueue`]: durable FIFO of access events awaiting delivery
//! - [`AuthorizationSet`]: the authorized card list and its JSON card file
//!
//! # Examples
//!
//! ```no_run
//! use gatehouse_core::{AccessEvent, CardUid};
//! use gatehouse_storage::{AuthorizationSet, Database, DatabaseConfig, EventQueue};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let cards = AuthorizationSet::load_json("cards.json")?;
//! let db = Database::new(DatabaseConfig::new("queue.db")).await?;
//! let queue = EventQueue::new(&db);
//!
//! let uid = CardUid::parse("0xa1b2c3")?;
//! let event = AccessEvent::new(uid.clone(), cards.decide(&uid));
//! queue.append(&event).await?;
//!
//! for pending in queue.drain().await? {
//!     // deliver, then:
//!     queue.acknowledge(pending.id()).await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod authorization;
pub mod connection;
pub mod error;
pub mod queue;

pub use authorization::AuthorizationSet;
pub use connection::{Database, DatabaseConfig};
pub use error::{StorageError, StorageResult};
pub use queue::{EventQueue, LegacyImport};
