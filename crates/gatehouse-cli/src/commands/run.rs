//! `gatehouse run`: the gate itself.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use gatehouse_controller::{AccessController, GateConfig, SyncWorker};
use gatehouse_core::CardUid;
use gatehouse_hardware::mock::{MockReader, MockReaderHandle};
use gatehouse_hardware::{
    Actuator, AnyCardReader, LoggingBuzzer, LoggingLock, Pn532Reader, SerialTransport,
};
use gatehouse_storage::AuthorizationSet;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{error, info, warn};

use super::{event_sink, open_queue};

const READER_INIT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Take card identifiers from stdin, one per line, instead of the reader
    #[arg(long)]
    pub simulate: bool,
}

pub async fn run(config: &GateConfig, args: &RunArgs) -> Result<()> {
    let (db, queue) = open_queue(config).await?;
    let authorizations = AuthorizationSet::load_json(&config.gate.card_file)
        .with_context(|| format!("failed to load {}", config.gate.card_file.display()))?;
    let sink = Arc::new(event_sink(config)?);

    let reader = if args.simulate {
        let (reader, handle) = MockReader::new();
        tokio::spawn(feed_from_stdin(handle));
        AnyCardReader::from(reader)
    } else {
        open_reader(config).await?
    };
    let actuator = Actuator::new(LoggingLock, LoggingBuzzer, config.actuator.profile());

    let worker = SyncWorker::new(queue.clone(), Arc::clone(&sink), config.sync.sync_config());
    let mut controller = AccessController::new(reader, authorizations, actuator, queue, sink)
        .read_timeout(config.reader.read_timeout())
        .with_nudge(worker.nudge_handle());

    info!(gate = %config.gate.id, simulate = args.simulate, "Gate starting");

    let (stop, shutdown) = watch::channel(false);
    let worker_task = tokio::spawn(worker.run(shutdown.clone()));
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Shutdown requested");
        let _ = stop.send(true);
    });

    controller.run(shutdown).await;
    worker_task.await.context("sync worker task failed")?;
    db.close().await;

    info!("Gate stopped");
    Ok(())
}

async fn open_reader(config: &GateConfig) -> Result<AnyCardReader> {
    let transport = SerialTransport::open(&config.reader.port, config.reader.baud_rate)
        .with_context(|| format!("failed to open reader on {}", config.reader.port))?;
    let mut reader = Pn532Reader::new(transport).with_poll_interval(config.reader.poll_interval());

    // the loop keeps polling; a reader that comes up late still works
    if let Err(e) = reader.initialize(READER_INIT_TIMEOUT).await {
        warn!(
            port = %config.reader.port,
            error = %e,
            "Reader did not acknowledge SAM configuration"
        );
    }

    Ok(AnyCardReader::from(reader))
}

async fn feed_from_stdin(handle: MockReaderHandle) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match CardUid::parse(line) {
                    Ok(uid) => {
                        if handle.present(uid).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(input = line, error = %e, "Ignoring card identifier"),
                }
            }
            Ok(None) => break,
            Err(e) => {
                error!(error = %e, "Failed to read stdin");
                break;
            }
        }
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(e) => {
            warn!(error = %e, "Failed to register SIGTERM handler");
            ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    ctrl_c().await;
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
