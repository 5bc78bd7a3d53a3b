//! `gatehouse queue`: inspect and drain the local event queue.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use gatehouse_controller::{GateConfig, SyncWorker};

use super::{event_sink, open_queue};

#[derive(Subcommand, Debug)]
pub enum QueueCommand {
    /// Show pending and quarantined event counts
    Status,

    /// Run one sync pass now
    Flush,

    /// Import a JSON-lines queue file left by older firmware
    Import {
        /// Path to the legacy queue file
        file: PathBuf,
    },
}

pub async fn run(config: &GateConfig, command: &QueueCommand) -> Result<()> {
    let (db, queue) = open_queue(config).await?;

    match command {
        QueueCommand::Status => {
            let pending = queue.pending_count().await?;
            let quarantined = queue.quarantined_count().await?;
            println!("Queue:       {}", config.queue.database_path);
            println!("Pending:     {pending}");
            println!("Quarantined: {quarantined}");
        }
        QueueCommand::Flush => {
            let worker = SyncWorker::new(queue, event_sink(config)?, config.sync.sync_config());
            let report = worker.run_once().await.context("sync pass failed")?;
            println!(
                "Delivered {}, failed {}, {} still pending",
                report.delivered, report.failed, report.remaining
            );
        }
        QueueCommand::Import { file } => {
            let outcome = queue
                .import_legacy_log(file)
                .await
                .with_context(|| format!("failed to import {}", file.display()))?;
            println!(
                "Imported {} events from {} ({} already queued, {} lines skipped)",
                outcome.imported,
                file.display(),
                outcome.already_queued,
                outcome.skipped
            );
        }
    }

    db.close().await;
    Ok(())
}
