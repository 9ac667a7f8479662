//! Chain head telemetry
//!
//! Height sampling and inter-block timing. Nothing here feeds the bundle
//! builder: it always re-queries the head itself.

use network::{ChainClient, ChainError, ShutdownSignal};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use types::{BlockHeader, H256};

use crate::error::WatcherError;

const FEED: &str = "newHeads";

#[derive(Clone)]
pub struct ChainMonitor {
    client: Arc<dyn ChainClient>,
    interval: Duration,
    /// 0 until the first successful sample
    last_sampled: Arc<AtomicU64>,
}

impl ChainMonitor {
    pub fn new(client: Arc<dyn ChainClient>, interval: Duration) -> Self {
        Self {
            client,
            interval,
            last_sampled: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Query the head once.
    pub async fn sample(&self) -> Result<u64, ChainError> {
        let height = self.client.block_number().await?;
        self.last_sampled.store(height, Ordering::Relaxed);
        Ok(height)
    }

    /// Last sampled height. Diagnostics only.
    pub fn last_sampled(&self) -> Option<u64> {
        match self.last_sampled.load(Ordering::Relaxed) {
            0 => None,
            height => Some(height),
        }
    }

    /// Sample on a fixed interval until shutdown. Failed samples are logged
    /// and the loop carries on.
    pub async fn run_poller(&self, shutdown: ShutdownSignal) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => match self.sample().await {
                    Ok(height) => info!(block = height, "⛓️ Head sampled"),
                    Err(e) => warn!("⚠️ Head sample failed: {}", e),
                },
            }
        }
        debug!("Head poller stopped");
    }

    /// Consume the header feed, emitting timing for each block until
    /// shutdown (`Ok`) or a subscription failure.
    pub async fn run_head_timing(
        &self,
        buffer: usize,
        out: &mpsc::Sender<BlockTiming>,
        shutdown: &ShutdownSignal,
    ) -> Result<(), WatcherError> {
        let mut sub = self
            .client
            .subscribe_new_heads(buffer.max(1))
            .await
            .map_err(|e| WatcherError::subscription(FEED, e))?;
        info!("📡 Subscribed to new heads");

        let mut timer = BlockTimer::default();
        let result = loop {
            let header = tokio::select! {
                _ = shutdown.cancelled() => break Ok(()),
                received = sub.recv() => match received {
                    Ok(header) => header,
                    Err(e) => break Err(WatcherError::subscription(FEED, e)),
                },
            };

            let timing = timer.observe(&header);
            match timing.since_previous {
                Some(gap) => info!(
                    block = timing.number,
                    block_time_secs = gap.as_secs(),
                    "🧱 New block"
                ),
                None => info!(block = timing.number, "🧱 New block"),
            }

            // Telemetry: never stall the feed on a slow reader
            if out.try_send(timing).is_err() && out.is_closed() {
                break Err(WatcherError::ChannelClosed { feed: FEED });
            }
        };

        sub.unsubscribe().await;
        result
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockTiming {
    pub number: u64,
    pub hash: H256,
    pub timestamp: u64,
    /// Elapsed chain time since the previous header seen
    pub since_previous: Option<Duration>,
}

/// Tracks the previous header timestamp
#[derive(Debug, Default)]
pub struct BlockTimer {
    previous: Option<u64>,
}

impl BlockTimer {
    pub fn observe(&mut self, header: &BlockHeader) -> BlockTiming {
        // timestamps can repeat or regress across reorgs
        let since_previous = self
            .previous
            .map(|prev| Duration::from_secs(header.timestamp.saturating_sub(prev)));
        self.previous = Some(header.timestamp);
        BlockTiming {
            number: header.number,
            hash: header.hash,
            timestamp: header.timestamp,
            since_previous,
        }
    }
}
