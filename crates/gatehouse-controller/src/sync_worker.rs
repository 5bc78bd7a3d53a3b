//! Background delivery of queued access events.
//!
//! The worker wakes on a fixed interval (the slow path) or when the decision
//! loop nudges it, drains the queue head in FIFO order and hands each event
//! to the sink. An event is acknowledged only after the sink accepted it.
//! A pass reads the queue in batches until it is empty. The first failure
//! ends the pass, so a later event is never delivered ahead of an earlier
//! one that is still pending. Failed events are retried
//! on every following pass without limit.

use crate::error::Result;
use gatehouse_core::constants::{DEFAULT_SYNC_BATCH_LIMIT, DEFAULT_SYNC_INTERVAL_SECS};
use gatehouse_network::{DeliveryOutcome, EventSink};
use gatehouse_storage::EventQueue;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Sync worker settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    /// Slow-path interval between passes
    pub interval: Duration,
    /// Maximum events read from the queue at once
    pub batch_limit: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_SYNC_INTERVAL_SECS),
            batch_limit: DEFAULT_SYNC_BATCH_LIMIT,
        }
    }
}

impl SyncConfig {
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn batch_limit(mut self, limit: usize) -> Self {
        self.batch_limit = limit.max(1);
        self
    }
}

/// Result of one sync pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Events delivered and acknowledged
    pub delivered: usize,
    /// Failed attempts (0 or 1; a failure ends the pass)
    pub failed: usize,
    /// Events still pending after the pass
    pub remaining: u64,
}

/// Wakes the sync worker ahead of its next tick.
///
/// A nudge sent while the worker is busy is kept and consumed by the next
/// wait, so it is never lost.
#[derive(Debug, Clone, Default)]
pub struct SyncNudge(Arc<Notify>);

impl SyncNudge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nudge(&self) {
        self.0.notify_one();
    }

    async fn notified(&self) {
        self.0.notified().await;
    }
}

/// Drains the durable queue into an [`EventSink`].
#[derive(Debug)]
pub struct SyncWorker<K> {
    queue: EventQueue,
    sink: K,
    config: SyncConfig,
    nudge: SyncNudge,
}

impl<K: EventSink> SyncWorker<K> {
    pub fn new(queue: EventQueue, sink: K, config: SyncConfig) -> Self {
        Self {
            queue,
            sink,
            config,
            nudge: SyncNudge::new(),
        }
    }

    /// Handle the decision loop uses to request an early pass.
    pub fn nudge_handle(&self) -> SyncNudge {
        self.nudge.clone()
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Run one pass: deliver queued events until the queue is empty or a
    /// delivery fails.
    ///
    /// Events are read `batch_limit` at a time.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the queue cannot be read or an
    /// acknowledgement cannot be written. Events not yet acknowledged stay
    /// pending and are delivered again later.
    pub async fn run_once(&self) -> Result<SyncReport> {
        let mut report = SyncReport::default();

        'pass: loop {
            let batch = self.queue.drain_limit(self.config.batch_limit).await?;
            if batch.is_empty() {
                break;
            }

            for mut event in batch {
                match self.sink.deliver(&event).await {
                    DeliveryOutcome::Delivered => {
                        if let Err(e) = event.mark_delivered() {
                            debug!(
                                event_id = %event.id(),
                                error = %e,
                                "Event already marked delivered"
                            );
                        }
                        self.queue.acknowledge(event.id()).await?;
                        report.delivered += 1;
                    }
                    DeliveryOutcome::Failed(reason) => {
                        warn!(
                            event_id = %event.id(),
                            reason = %reason,
                            "Delivery failed, will retry"
                        );
                        report.failed += 1;
                        break 'pass;
                    }
                }
            }
        }

        report.remaining = self.queue.pending_count().await?;
        Ok(report)
    }

    /// Run passes until `shutdown` turns `true` or its sender is dropped.
    ///
    /// The first pass starts immediately so events left over from a previous
    /// run are retried at start-up.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            interval_ms = self.config.interval.as_millis() as u64,
            batch_limit = self.config.batch_limit,
            "Sync worker started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.nudge.notified() => debug!("Sync worker nudged"),
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            }

            match self.run_once().await {
                Ok(report) if report.delivered > 0 || report.failed > 0 => info!(
                    delivered = report.delivered,
                    failed = report.failed,
                    remaining = report.remaining,
                    "Sync pass finished"
                ),
                Ok(_) => {}
                Err(e) => error!(error = %e, "Sync pass aborted"),
            }
        }

        info!("Sync worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_core::{AccessEvent, CardUid, Decision};
    use gatehouse_network::MemorySink;
    use gatehouse_storage::Database;

    async fn queue() -> EventQueue {
        EventQueue::new(&Database::in_memory().await.unwrap())
    }

    fn event(uid: &str) -> AccessEvent {
        AccessEvent::new(CardUid::parse(uid).unwrap(), Decision::Granted)
    }

    #[test]
    fn test_config_builder() {
        let config = SyncConfig::default()
            .interval(Duration::from_secs(5))
            .batch_limit(0);
        assert_eq!(config.interval, Duration::from_secs(5));
        assert_eq!(config.batch_limit, 1);
        assert_eq!(SyncConfig::default().interval, Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_empty_queue_pass() {
        let worker = SyncWorker::new(queue().await, MemorySink::new(), SyncConfig::default());
        assert_eq!(worker.run_once().await.unwrap(), SyncReport::default());
    }

    #[tokio::test]
    async fn test_pass_delivers_in_fifo_order() {
        let queue = queue().await;
        let events: Vec<_> = ["0x01", "0x02", "0x03"].iter().map(|u| event(u)).collect();
        for e in &events {
            queue.append(e).await.unwrap();
        }
        let sink = MemorySink::new();
        let worker = SyncWorker::new(queue.clone(), sink.clone(), SyncConfig::default());

        let report = worker.run_once().await.unwrap();
        assert_eq!(report.delivered, 3);
        assert_eq!(report.remaining, 0);
        assert_eq!(
            sink.delivered_ids(),
            events.iter().map(AccessEvent::id).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn test_failure_stops_pass_and_keeps_events() {
        let queue = queue().await;
        queue.append(&event("0x01")).await.unwrap();
        queue.append(&event("0x02")).await.unwrap();
        let sink = MemorySink::unreachable();
        let worker = SyncWorker::new(queue.clone(), sink.clone(), SyncConfig::default());

        let report = worker.run_once().await.unwrap();
        assert_eq!(report.delivered, 0);
        assert_eq!(report.failed, 1);
        assert_eq!(report.remaining, 2);
        assert_eq!(sink.attempts(), 1);
    }

    #[tokio::test]
    async fn test_pass_drains_beyond_batch_limit() {
        let queue = queue().await;
        let events: Vec<_> = (1..=150u8).map(|i| event(&format!("0x{i:02x}"))).collect();
        for e in &events {
            queue.append(e).await.unwrap();
        }
        let sink = MemorySink::new();
        let worker = SyncWorker::new(queue.clone(), sink.clone(), SyncConfig::default());

        let report = worker.run_once().await.unwrap();
        assert_eq!(report.delivered, 150);
        assert_eq!(report.remaining, 0);
        assert_eq!(
            sink.delivered_ids(),
            events.iter().map(AccessEvent::id).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn test_small_batches_still_empty_queue() {
        let queue = queue().await;
        for i in 1..=5u8 {
            queue.append(&event(&format!("0x{i:02x}"))).await.unwrap();
        }
        let worker = SyncWorker::new(
            queue.clone(),
            MemorySink::new(),
            SyncConfig::default().batch_limit(2),
        );

        let report = worker.run_once().await.unwrap();
        assert_eq!(report.delivered, 5);
        assert_eq!(report.remaining, 0);
    }

    #[tokio::test]
    async fn test_nudge_is_not_lost() {
        let nudge = SyncNudge::new();
        nudge.nudge();
        tokio::time::timeout(Duration::from_secs(1), nudge.notified())
            .await
            .unwrap();
    }
}
