//! Subcommand implementations.

pub mod attendance;
pub mod cards;
pub mod queue;
pub mod run;

use anyhow::{Context, Result};
use gatehouse_controller::GateConfig;
use gatehouse_network::{RestClient, RestEventSink};
use gatehouse_storage::{Database, EventQueue};

/// Open the queue database named in the configuration.
pub async fn open_queue(config: &GateConfig) -> Result<(Database, EventQueue)> {
    let db = Database::new(config.queue.database_config())
        .await
        .with_context(|| format!("failed to open queue at {}", config.queue.database_path))?;
    let queue = EventQueue::new(&db);
    Ok((db, queue))
}

pub fn rest_client(config: &GateConfig) -> Result<RestClient> {
    RestClient::new(config.remote.clone()).context("invalid remote configuration")
}

pub fn event_sink(config: &GateConfig) -> Result<RestEventSink> {
    Ok(RestEventSink::new(rest_client(config)?, config.gate.id.clone()))
}
