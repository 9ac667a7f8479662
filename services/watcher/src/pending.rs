//! Pending transaction feed
//!
//! Hashes from the pending feed are only handles. Each one is resolved with a
//! bounded number of concurrent lookups. Unknown, mined and failed lookups
//! are counted and dropped. Every transaction still pending is inspected and
//! logged; only calls matching the configured [`SelectorTrigger`] are
//! forwarded. Without a trigger the feed is inspect-only.

use network::{ChainClient, Shutdown, ShutdownSignal, TxLookup};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};
use types::words::split_calldata;
use types::{Address, PendingTransaction, PendingTxHandle, H256};

use crate::error::WatcherError;

const FEED: &str = "newPendingTransactions";

/// Calls to `contract` whose calldata starts with `selector`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorTrigger {
    pub contract: Address,
    pub selector: [u8; 4],
    pub function: String,
}

/// A transaction confirmed pending at lookup time, with its calldata split
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMatch {
    pub tx: PendingTransaction,
    /// Present when the calldata is at least four bytes long
    pub selector: Option<[u8; 4]>,
    /// Whole 32-byte argument words after the selector
    pub args: Vec<H256>,
}

impl PendingMatch {
    pub fn from_transaction(tx: PendingTransaction) -> Self {
        let (selector, args) = match split_calldata(&tx.input) {
            Ok((selector, args)) => (Some(selector), args),
            Err(_) => (None, Vec::new()),
        };
        Self { tx, selector, args }
    }

    /// Selector as bare hex, empty when the calldata is shorter than four bytes
    pub fn selector_hex(&self) -> String {
        self.selector.map(hex::encode).unwrap_or_default()
    }

    pub fn args_hex(&self) -> Vec<String> {
        self.args.iter().map(|word| hex::encode(word.as_bytes())).collect()
    }
}

/// How an inspected pending transaction relates to the trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// No trigger configured
    InspectOnly,
    Mismatch,
    Triggered,
}

#[derive(Debug, Default)]
pub struct PendingStats {
    announced: AtomicU64,
    still_pending: AtomicU64,
    not_pending: AtomicU64,
    lookup_errors: AtomicU64,
    inspect_only: AtomicU64,
    selector_mismatch: AtomicU64,
    forwarded: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingStatsSnapshot {
    pub announced: u64,
    pub still_pending: u64,
    /// Unknown to the node or already mined
    pub not_pending: u64,
    pub lookup_errors: u64,
    /// Still pending, seen while no trigger was configured
    pub inspect_only: u64,
    pub selector_mismatch: u64,
    pub forwarded: u64,
}

impl PendingStats {
    pub fn snapshot(&self) -> PendingStatsSnapshot {
        PendingStatsSnapshot {
            announced: self.announced.load(Ordering::Relaxed),
            still_pending: self.still_pending.load(Ordering::Relaxed),
            not_pending: self.not_pending.load(Ordering::Relaxed),
            lookup_errors: self.lookup_errors.load(Ordering::Relaxed),
            inspect_only: self.inspect_only.load(Ordering::Relaxed),
            selector_mismatch: self.selector_mismatch.load(Ordering::Relaxed),
            forwarded: self.forwarded.load(Ordering::Relaxed),
        }
    }
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

#[derive(Clone)]
pub struct PendingTxWatcher {
    client: Arc<dyn ChainClient>,
    buffer: usize,
    workers: usize,
    trigger: Option<SelectorTrigger>,
    stats: Arc<PendingStats>,
}

impl PendingTxWatcher {
    pub fn new(client: Arc<dyn ChainClient>, buffer: usize, workers: usize) -> Self {
        Self {
            client,
            buffer: buffer.max(1),
            workers: workers.max(1),
            trigger: None,
            stats: Arc::new(PendingStats::default()),
        }
    }

    /// Forward calls matching `trigger`. `None` keeps the feed inspect-only.
    pub fn with_trigger(mut self, trigger: Option<SelectorTrigger>) -> Self {
        self.trigger = trigger;
        self
    }

    pub fn stats(&self) -> Arc<PendingStats> {
        self.stats.clone()
    }

    /// Log one still-pending transaction and match it against the trigger.
    pub fn inspect(&self, tx: PendingTransaction) -> (PendingMatch, Verdict) {
        let found = PendingMatch::from_transaction(tx);
        let verdict = match &self.trigger {
            None => Verdict::InspectOnly,
            Some(trigger) if found.tx.calls(trigger.contract, trigger.selector) => Verdict::Triggered,
            Some(_) => Verdict::Mismatch,
        };
        info!(
            tx = ?found.tx.hash,
            from = ?found.tx.from,
            to = ?found.tx.to,
            value = %found.tx.value,
            gas = %found.tx.gas,
            gas_price = ?found.tx.gas_price,
            nonce = %found.tx.nonce,
            selector = %found.selector_hex(),
            args = ?found.args_hex(),
            ?verdict,
            "🔍 Pending transaction"
        );
        (found, verdict)
    }

    /// Apply the lookup outcome, inspect, and keep only trigger matches.
    pub fn accept(&self, handle: PendingTxHandle, lookup: network::Result<TxLookup>) -> Option<PendingMatch> {
        let tx = match lookup.map(TxLookup::into_pending) {
            Ok(Some(tx)) => PendingTransaction::from(tx),
            Ok(None) => {
                bump(&self.stats.not_pending);
                debug!(tx = %handle, "Handle no longer pending");
                return None;
            }
            Err(e) => {
                bump(&self.stats.lookup_errors);
                debug!(tx = %handle, "Lookup failed: {}", e);
                return None;
            }
        };
        bump(&self.stats.still_pending);

        match self.inspect(tx) {
            (found, Verdict::Triggered) => {
                if let Some(trigger) = &self.trigger {
                    info!(
                        tx = ?found.tx.hash,
                        function = %trigger.function,
                        "🎯 Pending call to watched contract"
                    );
                }
                Some(found)
            }
            (_, Verdict::Mismatch) => {
                bump(&self.stats.selector_mismatch);
                None
            }
            (_, Verdict::InspectOnly) => {
                bump(&self.stats.inspect_only);
                None
            }
        }
    }

    /// Receive handles until shutdown or a subscription failure.
    pub async fn run(
        &self,
        out: &mpsc::Sender<PendingMatch>,
        shutdown: &ShutdownSignal,
    ) -> Result<(), WatcherError> {
        let mut sub = self
            .client
            .subscribe_pending_tx_hashes(self.buffer)
            .await
            .map_err(|e| WatcherError::subscription(FEED, e))?;
        info!(workers = self.workers, "📡 Subscribed to pending transactions");

        let mut lookups: JoinSet<Option<PendingMatch>> = JoinSet::new();
        let result = loop {
            tokio::select! {
                _ = shutdown.cancelled() => break Ok(()),

                Some(joined) = lookups.join_next(), if !lookups.is_empty() => {
                    let Ok(Some(found)) = joined else { continue };
                    tokio::select! {
                        _ = shutdown.cancelled() => break Ok(()),
                        sent = out.send(found) => {
                            if sent.is_err() {
                                break Err(WatcherError::ChannelClosed { feed: FEED });
                            }
                            bump(&self.stats.forwarded);
                        }
                    }
                }

                received = sub.recv(), if lookups.len() < self.workers => {
                    let handle = match received {
                        Ok(handle) => handle,
                        Err(e) => break Err(WatcherError::subscription(FEED, e)),
                    };
                    bump(&self.stats.announced);
                    let watcher = self.clone();
                    lookups.spawn(async move {
                        let lookup = watcher.client.transaction_by_hash(handle.hash()).await;
                        watcher.accept(handle, lookup)
                    });
                }
            }
        };

        lookups.shutdown().await;
        sub.unsubscribe().await;
        if result.is_ok() {
            info!("🛑 Pending transaction subscription stopped");
        } else {
            warn!("⚠️ Pending transaction loop ended");
        }
        result
    }

    /// Spawn the receive loop under a restart supervisor.
    pub fn start(
        &self,
        restart: &config::RestartConfig,
        out: mpsc::Sender<PendingMatch>,
    ) -> PendingHandle {
        let shutdown = Shutdown::new();
        let signal = shutdown.signal();
        let supervisor = crate::supervisor::Supervisor::new(FEED, restart, signal.clone());
        let watcher = self.clone();

        let task = tokio::spawn(async move {
            supervisor
                .run(|| {
                    let watcher = watcher.clone();
                    let out = out.clone();
                    let signal = signal.clone();
                    async move { watcher.run(&out, &signal).await }
                })
                .await
        });
        PendingHandle { shutdown, task }
    }
}

pub struct PendingHandle {
    shutdown: Shutdown,
    task: JoinHandle<Result<(), WatcherError>>,
}

impl PendingHandle {
    pub async fn stop(self) -> Result<(), WatcherError> {
        self.shutdown.trigger();
        self.task.await.map_err(|e| WatcherError::TaskFailed {
            feed: FEED,
            message: e.to_string(),
        })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::RestartConfig;
    use ethers_core::types::{Transaction, U64};
    use network::testing::ScriptedChainClient;
    use network::ChainError;
    use types::{Bytes, U256};

    const SELECTOR: [u8; 4] = [0xa8, 0x2b, 0x44, 0x8e];

    fn tx(hash: u8, to: Address, input: Vec<u8>) -> Transaction {
        Transaction {
            hash: H256::repeat_byte(hash),
            from: Address::repeat_byte(0xf0),
            to: Some(to),
            value: U256::from(1u64),
            gas: U256::from(50_000u64),
            input: Bytes::from(input),
            ..Default::default()
        }
    }

    fn restart() -> RestartConfig {
        RestartConfig {
            max_restarts: 0,
            base_backoff_ms: 1,
            max_backoff_ms: 1,
        }
    }

    fn trigger(contract: Address) -> Option<SelectorTrigger> {
        Some(SelectorTrigger {
            contract,
            selector: SELECTOR,
            function: "enablePresale".into(),
        })
    }

    fn call_data(words: usize) -> Vec<u8> {
        let mut call = SELECTOR.to_vec();
        for i in 0..words {
            call.extend_from_slice(H256::from_low_u64_be(i as u64 + 1).as_bytes());
        }
        call
    }

    #[test]
    fn test_only_still_pending_handles_pass() {
        let contract = Address::repeat_byte(0xc0);
        let watcher = PendingTxWatcher::new(Arc::new(ScriptedChainClient::new(1)), 4, 2)
            .with_trigger(trigger(contract));
        let handle = PendingTxHandle(H256::repeat_byte(1));

        let mined = Transaction {
            block_number: Some(U64::from(5u64)),
            ..tx(1, contract, call_data(0))
        };
        assert!(watcher.accept(handle, Ok(TxLookup::Mined(Box::new(mined)))).is_none());
        assert!(watcher.accept(handle, Ok(TxLookup::NotFound)).is_none());
        assert!(watcher
            .accept(handle, Err(ChainError::timeout("eth_getTransactionByHash", 5_000)))
            .is_none());

        let found = watcher
            .accept(handle, Ok(TxLookup::Pending(Box::new(tx(1, contract, call_data(0))))))
            .unwrap();
        assert_eq!(found.tx.to, Some(contract));
        assert_eq!(found.selector, Some(SELECTOR));
        assert!(found.args.is_empty());

        let stats = watcher.stats().snapshot();
        assert_eq!(stats.not_pending, 2);
        assert_eq!(stats.lookup_errors, 1);
        assert_eq!(stats.still_pending, 1);
    }

    #[test]
    fn test_without_trigger_nothing_is_forwarded() {
        let watcher = PendingTxWatcher::new(Arc::new(ScriptedChainClient::new(1)), 4, 2);
        let handle = PendingTxHandle(H256::repeat_byte(9));
        let transfer = Transaction {
            value: U256::exp10(18),
            gas: U256::from(21_000u64),
            ..tx(9, Address::repeat_byte(0x01), vec![])
        };
        let contract_call = tx(10, Address::repeat_byte(0xc0), call_data(1));

        assert!(watcher.accept(handle, Ok(TxLookup::Pending(Box::new(transfer)))).is_none());
        assert!(watcher
            .accept(handle, Ok(TxLookup::Pending(Box::new(contract_call))))
            .is_none());

        let stats = watcher.stats().snapshot();
        assert_eq!(stats.still_pending, 2);
        assert_eq!(stats.inspect_only, 2);
        assert_eq!(stats.selector_mismatch, 0);
    }

    #[test]
    fn test_inspection_splits_calldata() {
        let contract = Address::repeat_byte(0xc0);
        let watcher = PendingTxWatcher::new(Arc::new(ScriptedChainClient::new(1)), 4, 2);
        let pending = Transaction {
            gas_price: Some(U256::from(30_000_000_000u64)),
            ..tx(5, contract, call_data(2))
        };

        let (found, verdict) = watcher.inspect(PendingTransaction::from(pending));
        assert_eq!(verdict, Verdict::InspectOnly);
        assert_eq!(found.tx.from, Address::repeat_byte(0xf0));
        assert_eq!(found.tx.value, U256::from(1u64));
        assert_eq!(found.tx.gas, U256::from(50_000u64));
        assert_eq!(found.tx.gas_price, Some(U256::from(30_000_000_000u64)));
        assert_eq!(found.selector_hex(), "a82b448e");
        assert_eq!(
            found.args_hex(),
            vec![
                format!("{:064x}", 1),
                format!("{:064x}", 2),
            ]
        );

        let (plain, _) = watcher.inspect(PendingTransaction::from(tx(6, contract, vec![0xaa])));
        assert_eq!(plain.selector_hex(), "");
        assert!(plain.args_hex().is_empty());
    }

    #[test]
    fn test_selector_trigger_filters_calls() {
        let contract = Address::repeat_byte(0xc0);
        let watcher = PendingTxWatcher::new(Arc::new(ScriptedChainClient::new(1)), 4, 2)
            .with_trigger(trigger(contract));
        let handle = PendingTxHandle(H256::zero());

        let (_, verdict) = watcher.inspect(PendingTransaction::from(tx(2, contract, call_data(1))));
        assert_eq!(verdict, Verdict::Triggered);

        let mut call = SELECTOR.to_vec();
        call.extend_from_slice(&[0u8; 32]);
        let found = watcher
            .accept(handle, Ok(TxLookup::Pending(Box::new(tx(2, contract, call)))))
            .unwrap();
        assert_eq!(found.selector, Some(SELECTOR));
        assert_eq!(found.args, vec![H256::zero()]);

        let other = Address::repeat_byte(0x01);
        assert!(watcher
            .accept(handle, Ok(TxLookup::Pending(Box::new(tx(3, other, SELECTOR.to_vec())))))
            .is_none());
        assert!(watcher
            .accept(handle, Ok(TxLookup::Pending(Box::new(tx(4, contract, vec![1, 2, 3, 4])))))
            .is_none());
        assert_eq!(watcher.stats().snapshot().selector_mismatch, 2);
    }

    #[tokio::test]
    async fn test_feed_forwards_only_pending_matches() {
        let client = Arc::new(ScriptedChainClient::new(1));
        let mut feed = client.pending_feed();
        let contract = Address::repeat_byte(0xc0);

        client.set_pending_tx(tx(0x11, contract, call_data(0)));
        client.set_pending_tx(tx(0x55, Address::repeat_byte(0x01), vec![]));
        client.set_lookup(
            H256::repeat_byte(0x22),
            Ok(TxLookup::Mined(Box::new(tx(0x22, contract, call_data(0))))),
        );
        client.set_lookup(
            H256::repeat_byte(0x33),
            Err(ChainError::rpc("eth_getTransactionByHash", "boom")),
        );

        let watcher = PendingTxWatcher::new(client.clone(), 4, 2).with_trigger(trigger(contract));
        let (tx_out, mut rx) = mpsc::channel(4);
        let handle = watcher.start(&restart(), tx_out);

        for byte in [0x22, 0x33, 0x44, 0x55, 0x11] {
            assert!(feed.push(PendingTxHandle(H256::repeat_byte(byte))).await);
        }

        let found = rx.recv().await.unwrap();
        assert_eq!(found.tx.hash, H256::repeat_byte(0x11));

        handle.stop().await.unwrap();
        assert!(rx.try_recv().is_err());

        let stats = watcher.stats().snapshot();
        assert_eq!(stats.announced, 5);
        assert_eq!(stats.forwarded, 1);
        assert!(client.call_count("eth_getTransactionByHash") >= 1);
    }
}
