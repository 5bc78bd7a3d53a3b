//! Remote store access for the gate controller.
//!
//! The gate and the attendance engine share one hosted REST store. This
//! crate wraps it:
//!
//! - **RestEventSink**: delivers access events ([`EventSink`])
//! - **fetch_card_uids**: downloads the authorized card list
//! - **RestAttendanceSource**: answers attendance queries and stores
//!   manual overrides
//! - **MemorySink**: in-memory sink with a reachability switch
//!
//! # Example
//!
//! ```no_run
//! use gatehouse_core::{AccessEvent, CardUid, Decision};
//! use gatehouse_network::{EventSink, RemoteConfig, RestClient, RestEventSink};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = RestClient::new(RemoteConfig::new("https://example.supabase.co", "key"))?;
//! let sink = RestEventSink::new(client, "lock-1");
//!
//! let event = AccessEvent::new(CardUid::parse("0xa1b2c3")?, Decision::Granted);
//! let outcome = sink.deliver(&event).await;
//! println!("{outcome:?}");
//! # Ok(())
//! # }
//! ```

mod attendance;
mod cards;
mod client;
mod config;
mod error;
mod mock;
mod sink;

pub use attendance::RestAttendanceSource;
pub use cards::fetch_card_uids;
pub use client::{Filter, RestClient};
pub use config::{RemoteConfig, RemoteTables};
pub use error::{NetworkError, Result};
pub use mock::MemorySink;
pub use sink::{DeliveryOutcome, EventSink, RestEventSink};
