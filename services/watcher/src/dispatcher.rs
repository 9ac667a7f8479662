//! Contract log dispatch
//!
//! One log subscription per contract, filtered on the signature table's
//! topics. Each log is classified, decoded and forwarded on a bounded
//! channel. A full channel blocks the receive loop: losing a pool-creation
//! or parameter-change event is worse than stalling ingestion, and the
//! back-pressure eventually surfaces as a subscription error from the node
//! side rather than as a silent gap.
//!
//! Latency-sensitive deployments can instead `try_send` and count
//! drops; that variant is not built in.

use abi::{decode_event, Classification, ContractEvent, SignatureTable};
use config::RestartConfig;
use network::{ChainClient, LogFilter, Shutdown, ShutdownSignal};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use types::{Address, LogEvent, H256};

use crate::error::WatcherError;
use crate::supervisor::Supervisor;

const FEED: &str = "logs";

/// A matched and decoded contract log
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedEvent {
    pub name: String,
    pub address: Address,
    pub block_number: u64,
    pub tx_hash: H256,
    pub event: ContractEvent,
}

/// Dispatch counters, readable while the loop runs
#[derive(Debug, Default)]
pub struct DispatcherStats {
    received: AtomicU64,
    matched: AtomicU64,
    unknown: AtomicU64,
    decode_errors: AtomicU64,
    forwarded: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatcherStatsSnapshot {
    pub received: u64,
    pub matched: u64,
    /// Unmatched first topic or no topics at all
    pub unknown: u64,
    pub decode_errors: u64,
    pub forwarded: u64,
}

impl DispatcherStats {
    pub fn snapshot(&self) -> DispatcherStatsSnapshot {
        DispatcherStatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            matched: self.matched.load(Ordering::Relaxed),
            unknown: self.unknown.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            forwarded: self.forwarded.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Clone)]
pub struct EventDispatcher {
    client: Arc<dyn ChainClient>,
    table: Arc<SignatureTable>,
    buffer: usize,
    from_block: Option<u64>,
    stats: Arc<DispatcherStats>,
}

impl EventDispatcher {
    pub fn new(client: Arc<dyn ChainClient>, table: Arc<SignatureTable>, buffer: usize) -> Self {
        Self {
            client,
            table,
            buffer: buffer.max(1),
            from_block: None,
            stats: Arc::new(DispatcherStats::default()),
        }
    }

    /// Start the first subscription at `block` instead of the node's head.
    /// Restarts always resume from the head.
    pub fn with_from_block(mut self, block: Option<u64>) -> Self {
        self.from_block = block;
        self
    }

    pub fn stats(&self) -> Arc<DispatcherStats> {
        self.stats.clone()
    }

    pub fn table(&self) -> &SignatureTable {
        &self.table
    }

    /// Look up `topics[0]`. Pure; never touches the counters.
    pub fn classify<'a>(&'a self, log: &LogEvent) -> Classification<'a> {
        self.table.classify(log)
    }

    /// Classify and decode one log; `None` for anything not forwarded.
    pub fn process(&self, log: &LogEvent) -> Option<DecodedEvent> {
        DispatcherStats::bump(&self.stats.received);

        let signature = match self.classify(log) {
            Classification::Matched(signature) => signature,
            Classification::Unknown(topic) => {
                DispatcherStats::bump(&self.stats.unknown);
                warn!(
                    block = log.block_number,
                    tx = ?log.tx_hash,
                    topic = ?topic,
                    "❓ Unknown event topic"
                );
                return None;
            }
            Classification::NoTopics => {
                DispatcherStats::bump(&self.stats.unknown);
                warn!(block = log.block_number, tx = ?log.tx_hash, "❓ Log without topics");
                return None;
            }
        };
        DispatcherStats::bump(&self.stats.matched);

        match decode_event(signature, log) {
            Ok(event) => Some(DecodedEvent {
                name: signature.name.clone(),
                address: log.address,
                block_number: log.block_number,
                tx_hash: log.tx_hash,
                event,
            }),
            Err(e) => {
                DispatcherStats::bump(&self.stats.decode_errors);
                warn!(block = log.block_number, tx = ?log.tx_hash, "⚠️ Skipping log: {}", e);
                None
            }
        }
    }

    /// Run one subscription until shutdown (`Ok`) or a subscription failure.
    pub async fn run(
        &self,
        contract: Address,
        from_block: Option<u64>,
        out: &mpsc::Sender<DecodedEvent>,
        shutdown: &ShutdownSignal,
    ) -> Result<(), WatcherError> {
        let filter = LogFilter::new(contract, self.table.topics()).from_block(from_block);
        let mut sub = self
            .client
            .subscribe_logs(filter, self.buffer)
            .await
            .map_err(|e| WatcherError::subscription(FEED, e))?;

        info!(
            contract = ?contract,
            events = ?self.table.names(),
            from_block = ?from_block,
            "📡 Subscribed to contract logs"
        );

        loop {
            let log = tokio::select! {
                _ = shutdown.cancelled() => break,
                received = sub.recv() => match received {
                    Ok(log) => log,
                    Err(e) => return Err(WatcherError::subscription(FEED, e)),
                },
            };

            let Some(decoded) = self.process(&log) else {
                continue;
            };
            debug!(
                event = %decoded.name,
                block = decoded.block_number,
                tx = ?decoded.tx_hash,
                "🎯 Matched event"
            );

            tokio::select! {
                _ = shutdown.cancelled() => break,
                sent = out.send(decoded) => {
                    if sent.is_err() {
                        sub.unsubscribe().await;
                        return Err(WatcherError::ChannelClosed { feed: FEED });
                    }
                    DispatcherStats::bump(&self.stats.forwarded);
                }
            }
        }

        sub.unsubscribe().await;
        info!(contract = ?contract, "🛑 Log subscription stopped");
        Ok(())
    }

    /// Spawn the supervised receive loop.
    pub fn start(
        &self,
        contract: Address,
        restart: &RestartConfig,
        out: mpsc::Sender<DecodedEvent>,
    ) -> DispatcherHandle {
        let shutdown = Shutdown::new();
        let signal = shutdown.signal();
        let supervisor = Supervisor::new(FEED, restart, signal.clone());
        let dispatcher = self.clone();
        let first_run = Arc::new(AtomicBool::new(true));

        let task = tokio::spawn(async move {
            supervisor
                .run(|| {
                    let dispatcher = dispatcher.clone();
                    let out = out.clone();
                    let signal = signal.clone();
                    let from_block = if first_run.swap(false, Ordering::SeqCst) {
                        dispatcher.from_block
                    } else {
                        None
                    };
                    async move { dispatcher.run(contract, from_block, &out, &signal).await }
                })
                .await
        });

        DispatcherHandle {
            shutdown,
            task,
            stats: self.stats.clone(),
        }
    }
}

/// Owner side of a running dispatcher
pub struct DispatcherHandle {
    shutdown: Shutdown,
    task: JoinHandle<Result<(), WatcherError>>,
    stats: Arc<DispatcherStats>,
}

impl DispatcherHandle {
    pub fn stats(&self) -> DispatcherStatsSnapshot {
        self.stats.snapshot()
    }

    /// Wait for the loop to end on its own (a fatal error).
    pub async fn join(self) -> Result<(), WatcherError> {
        let Self { shutdown, task, .. } = self;
        let result = task.await.map_err(|e| WatcherError::TaskFailed {
            feed: FEED,
            message: e.to_string(),
        })?;
        drop(shutdown);
        result
    }

    /// Signal shutdown and wait for the unsubscribe to complete.
    pub async fn stop(self) -> Result<(), WatcherError> {
        self.shutdown.trigger();
        self.join().await
    }
}
