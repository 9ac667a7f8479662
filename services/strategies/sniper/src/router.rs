//! Trigger routing
//!
//! Decoded events and pending matches become [`Trigger`]s and are executed
//! one at a time. Pending matches only reach the router when the watcher has
//! a selector trigger configured. Execution failures end that trigger only; the next one
//! builds a fresh bundle from fresh chain state.

use mev::{BundleExecutor, ExecutionReport, SubmitMode, Trigger};
use network::ShutdownSignal;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use watcher::{DecodedEvent, PendingMatch};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterStats {
    pub triggers: u64,
    /// Decoded events not listed in `bundle.trigger_events`
    pub ignored: u64,
    pub accepted: u64,
    pub simulated: u64,
    pub rejected: u64,
    /// Below the minimum trigger amount
    pub skipped: u64,
    pub failed: u64,
}

pub struct TriggerRouter {
    /// `None` in observe-only mode
    executor: Option<Arc<BundleExecutor>>,
    mode: SubmitMode,
    trigger_events: Vec<String>,
    stats: RouterStats,
}

impl TriggerRouter {
    pub fn new(
        executor: Option<Arc<BundleExecutor>>,
        mode: SubmitMode,
        trigger_events: Vec<String>,
    ) -> Self {
        Self {
            executor,
            mode,
            trigger_events,
            stats: RouterStats::default(),
        }
    }

    pub fn stats(&self) -> RouterStats {
        self.stats
    }

    pub fn event_trigger(&self, event: &DecodedEvent) -> Option<Trigger> {
        if !self.trigger_events.is_empty() && !self.trigger_events.contains(&event.name) {
            return None;
        }
        Some(
            Trigger::event(&event.name, event.block_number, event.tx_hash)
                .with_amount(event.event.amount()),
        )
    }

    pub fn pending_trigger(found: &PendingMatch) -> Trigger {
        Trigger::pending(found.tx.hash)
    }

    pub async fn handle(&mut self, trigger: Trigger) {
        self.stats.triggers += 1;
        let Some(executor) = &self.executor else {
            info!(trigger = %trigger.label(), amount = ?trigger.amount, "👀 Trigger observed");
            return;
        };

        match executor.execute(&trigger, self.mode).await {
            Ok(report) => self.record(&report),
            Err(e) if e.is_retryable_with_fresh_bundle() => {
                self.stats.failed += 1;
                warn!(
                    trigger = %trigger.label(),
                    "⚠️ Submission failed, the next trigger rebuilds: {}",
                    e
                );
            }
            Err(e) => {
                self.stats.failed += 1;
                error!(trigger = %trigger.label(), "❌ Trigger failed: {}", e);
            }
        }
    }

    fn record(&mut self, report: &ExecutionReport) {
        match report {
            ExecutionReport::Skipped { .. } => self.stats.skipped += 1,
            ExecutionReport::Accepted { .. } => self.stats.accepted += 1,
            ExecutionReport::Simulated { .. } => self.stats.simulated += 1,
            ExecutionReport::Rejected { .. } => self.stats.rejected += 1,
        }
    }

    /// Route until shutdown or until the event feed closes.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<DecodedEvent>,
        mut pending: Option<mpsc::Receiver<PendingMatch>>,
        shutdown: ShutdownSignal,
    ) -> RouterStats {
        info!(mode = ?self.mode, observe_only = self.executor.is_none(), "🚀 Trigger router started");
        loop {
            // queued pending matches are handled before a closed event feed ends the loop
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => break,

                received = next_pending(&mut pending) => match received {
                    Some(found) => self.handle(Self::pending_trigger(&found)).await,
                    None => {
                        warn!("⚠️ Pending feed closed");
                        pending = None;
                    }
                },

                received = events.recv() => match received {
                    Some(event) => match self.event_trigger(&event) {
                        Some(trigger) => self.handle(trigger).await,
                        None => {
                            self.stats.ignored += 1;
                            debug!(event = %event.name, "Event not configured as a trigger");
                        }
                    },
                    None => {
                        warn!("⚠️ Event feed closed");
                        break;
                    }
                },
            }
        }
        info!(stats = ?self.stats, "🛑 Trigger router stopped");
        self.stats
    }
}

async fn next_pending(pending: &mut Option<mpsc::Receiver<PendingMatch>>) -> Option<PendingMatch> {
    match pending {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
