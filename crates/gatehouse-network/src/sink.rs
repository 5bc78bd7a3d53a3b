//! Remote event sink.
//!
//! Granted events land in the access-log table, denied ones in the
//! unidentified-card table. The server stamps reception time, so no device
//! clock value is sent. Duplicate submissions are accepted by contract.

use crate::client::RestClient;
use gatehouse_core::{AccessEvent, Decision};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// Result of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The remote accepted the event
    Delivered,
    /// The attempt failed; the event is still pending
    Failed(String),
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }
}

/// Destination for access events.
///
/// `deliver` never fails with an error: transport faults, timeouts and
/// rejections all come back as [`DeliveryOutcome::Failed`].
pub trait EventSink: Send + Sync {
    fn deliver(&self, event: &AccessEvent) -> impl Future<Output = DeliveryOutcome> + Send;
}

impl<K: EventSink> EventSink for Arc<K> {
    fn deliver(&self, event: &AccessEvent) -> impl Future<Output = DeliveryOutcome> + Send {
        (**self).deliver(event)
    }
}

#[derive(Debug, Serialize)]
struct EventRow<'a> {
    card_uid: &'a str,
    lock: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<bool>,
}

/// Sink posting events to the hosted REST store.
#[derive(Debug, Clone)]
pub struct RestEventSink {
    client: RestClient,
    gate_id: String,
}

impl RestEventSink {
    pub fn new(client: RestClient, gate_id: impl Into<String>) -> Self {
        Self {
            client,
            gate_id: gate_id.into(),
        }
    }

    pub fn gate_id(&self) -> &str {
        &self.gate_id
    }

    fn table_for(&self, decision: Decision) -> &str {
        let tables = &self.client.config().tables;
        match decision {
            Decision::Granted => &tables.access_logs,
            Decision::Denied => &tables.unidentified_cards,
        }
    }
}

impl EventSink for RestEventSink {
    async fn deliver(&self, event: &AccessEvent) -> DeliveryOutcome {
        let decision = event.decision();
        let row = EventRow {
            card_uid: event.identifier().as_str(),
            lock: &self.gate_id,
            status: decision.is_granted().then_some(true),
        };
        let table = self.table_for(decision);

        match self.client.insert(table, &row).await {
            Ok(()) => {
                debug!(event_id = %event.id(), table, "Event delivered");
                DeliveryOutcome::Delivered
            }
            Err(e) => {
                warn!(
                    event_id = %event.id(),
                    card_uid = %event.identifier(),
                    timeout = e.is_timeout(),
                    error = %e,
                    "Event delivery failed"
                );
                DeliveryOutcome::Failed(e.to_string())
            }
        }
    }
}
