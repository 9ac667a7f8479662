//! Deterministic chain client for tests
//!
//! Shipped outside `#[cfg(test)]` so downstream crates and the e2e suite can
//! drive components without a node.
//!
//! ```rust
//! # tokio_test::block_on(async {
//! use network::{ChainClient, testing::ScriptedChainClient};
//!
//! let client = ScriptedChainClient::new(1).with_heights([500, 501]);
//! assert_eq!(client.block_number().await.unwrap(), 500);
//! assert_eq!(client.block_number().await.unwrap(), 501);
//! assert_eq!(client.block_number().await.unwrap(), 501);
//! # });
//! ```

use async_trait::async_trait;
use ethers::types::{Address, Transaction, H256, U256};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::oneshot;
use types::{BlockHeader, LogEvent, PendingTxHandle};

use crate::client::{ChainClient, LogFilter, TxLookup};
use crate::error::{ChainError, Result};
use crate::subscription::{Subscription, SubscriptionSink};

/// Test side of a scripted subscription.
///
/// Created before the component subscribes; becomes live when it does.
pub struct Feed<T> {
    pending: Option<oneshot::Receiver<SubscriptionSink<T>>>,
    sink: Option<SubscriptionSink<T>>,
}

impl<T> Feed<T> {
    fn new() -> (Self, oneshot::Sender<SubscriptionSink<T>>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                pending: Some(rx),
                sink: None,
            },
            tx,
        )
    }

    async fn attach(&mut self) -> Option<&mut SubscriptionSink<T>> {
        if let Some(pending) = self.pending.take() {
            self.sink = pending.await.ok();
        }
        self.sink.as_mut()
    }

    /// Wait for the subscriber, then deliver `item` (blocking on a full buffer).
    /// Returns false once the subscriber is gone.
    pub async fn push(&mut self, item: T) -> bool {
        match self.attach().await {
            Some(sink) => sink.items.send(item).await.is_ok(),
            None => false,
        }
    }

    /// Report a fatal subscription error and close the feed.
    pub async fn fail(mut self, error: ChainError) {
        self.attach().await;
        if let Some(sink) = self.sink.take() {
            sink.fail(error);
        }
    }

    /// True if the subscriber unsubscribed or dropped its handle within `wait`.
    pub async fn released_within(&mut self, wait: Duration) -> bool {
        let Some(sink) = self.attach().await else {
            return true;
        };
        tokio::time::timeout(wait, &mut sink.stop).await.is_ok()
    }
}

/// Chain client answering from scripted state
pub struct ScriptedChainClient {
    chain_id: u64,
    heights: Mutex<VecDeque<u64>>,
    nonces: Mutex<HashMap<Address, u64>>,
    tip: Mutex<U256>,
    gas_price: Mutex<U256>,
    lookups: Mutex<HashMap<H256, Result<TxLookup>>>,
    storage: Mutex<HashMap<(Address, H256), H256>>,
    raw: Mutex<HashMap<&'static str, serde_json::Value>>,
    failures: Mutex<HashMap<&'static str, VecDeque<ChainError>>>,
    log_feeds: Mutex<VecDeque<oneshot::Sender<SubscriptionSink<LogEvent>>>>,
    head_feeds: Mutex<VecDeque<oneshot::Sender<SubscriptionSink<BlockHeader>>>>,
    pending_feeds: Mutex<VecDeque<oneshot::Sender<SubscriptionSink<PendingTxHandle>>>>,
    log_filters: Mutex<Vec<LogFilter>>,
    calls: Mutex<Vec<&'static str>>,
}

impl ScriptedChainClient {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            heights: Mutex::new(VecDeque::from([0])),
            nonces: Mutex::new(HashMap::new()),
            tip: Mutex::new(U256::from(2_000_000_000u64)),
            gas_price: Mutex::new(U256::from(30_000_000_000u64)),
            lookups: Mutex::new(HashMap::new()),
            storage: Mutex::new(HashMap::new()),
            raw: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            log_feeds: Mutex::new(VecDeque::new()),
            head_feeds: Mutex::new(VecDeque::new()),
            pending_feeds: Mutex::new(VecDeque::new()),
            log_filters: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Successive `block_number` answers; the last one repeats.
    pub fn with_heights(self, heights: impl IntoIterator<Item = u64>) -> Self {
        self.set_heights(heights);
        self
    }

    pub fn with_fees(self, gas_price: U256, tip: U256) -> Self {
        *self.gas_price.lock() = gas_price;
        *self.tip.lock() = tip;
        self
    }

    pub fn set_heights(&self, heights: impl IntoIterator<Item = u64>) {
        let heights: VecDeque<u64> = heights.into_iter().collect();
        if !heights.is_empty() {
            *self.heights.lock() = heights;
        }
    }

    pub fn set_pending_nonce(&self, address: Address, nonce: u64) {
        self.nonces.lock().insert(address, nonce);
    }

    pub fn set_lookup(&self, hash: H256, outcome: Result<TxLookup>) {
        self.lookups.lock().insert(hash, outcome);
    }

    pub fn set_pending_tx(&self, tx: Transaction) {
        self.set_lookup(tx.hash, Ok(TxLookup::Pending(Box::new(tx))));
    }

    pub fn set_storage(&self, address: Address, slot: H256, value: H256) {
        self.storage.lock().insert((address, slot), value);
    }

    pub fn set_raw_response(&self, method: &'static str, value: serde_json::Value) {
        self.raw.lock().insert(method, value);
    }

    /// Make the next call to `operation` (an RPC method name) fail.
    pub fn fail_next(&self, operation: &'static str, error: ChainError) {
        self.failures
            .lock()
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    pub fn log_feed(&self) -> Feed<LogEvent> {
        let (feed, slot) = Feed::new();
        self.log_feeds.lock().push_back(slot);
        feed
    }

    pub fn head_feed(&self) -> Feed<BlockHeader> {
        let (feed, slot) = Feed::new();
        self.head_feeds.lock().push_back(slot);
        feed
    }

    pub fn pending_feed(&self) -> Feed<PendingTxHandle> {
        let (feed, slot) = Feed::new();
        self.pending_feeds.lock().push_back(slot);
        feed
    }

    /// Filters passed to `subscribe_logs`, in call order.
    pub fn log_filters(&self) -> Vec<LogFilter> {
        self.log_filters.lock().clone()
    }

    /// RPC method names called so far, in order.
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self, operation: &str) -> usize {
        self.calls.lock().iter().filter(|c| **c == operation).count()
    }

    fn enter(&self, operation: &'static str) -> Result<()> {
        self.calls.lock().push(operation);
        match self.failures.lock().get_mut(operation).and_then(VecDeque::pop_front) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn open<T>(
        kind: &'static str,
        slots: &Mutex<VecDeque<oneshot::Sender<SubscriptionSink<T>>>>,
        buffer: usize,
    ) -> Result<Subscription<T>> {
        let slot = slots
            .lock()
            .pop_front()
            .ok_or_else(|| ChainError::subscribe(kind, "no scripted feed"))?;
        let (handle, sink) = Subscription::channel(kind, buffer);
        slot.send(sink)
            .map_err(|_| ChainError::subscribe(kind, "feed dropped by test"))?;
        Ok(handle)
    }
}

#[async_trait]
impl ChainClient for ScriptedChainClient {
    async fn block_number(&self) -> Result<u64> {
        self.enter("eth_blockNumber")?;
        let mut heights = self.heights.lock();
        let height = if heights.len() > 1 {
            heights.pop_front()
        } else {
            heights.front().copied()
        };
        Ok(height.unwrap_or_default())
    }

    async fn subscribe_logs(
        &self,
        filter: LogFilter,
        buffer: usize,
    ) -> Result<Subscription<LogEvent>> {
        self.enter("eth_subscribe:logs")?;
        self.log_filters.lock().push(filter);
        Self::open("logs", &self.log_feeds, buffer)
    }

    async fn subscribe_new_heads(&self, buffer: usize) -> Result<Subscription<BlockHeader>> {
        self.enter("eth_subscribe:newHeads")?;
        Self::open("newHeads", &self.head_feeds, buffer)
    }

    async fn subscribe_pending_tx_hashes(
        &self,
        buffer: usize,
    ) -> Result<Subscription<PendingTxHandle>> {
        self.enter("eth_subscribe:newPendingTransactions")?;
        Self::open("newPendingTransactions", &self.pending_feeds, buffer)
    }

    async fn transaction_by_hash(&self, hash: H256) -> Result<TxLookup> {
        self.enter("eth_getTransactionByHash")?;
        self.lookups
            .lock()
            .get(&hash)
            .cloned()
            .unwrap_or(Ok(TxLookup::NotFound))
    }

    async fn pending_nonce_at(&self, address: Address) -> Result<u64> {
        self.enter("eth_getTransactionCount")?;
        Ok(self.nonces.lock().get(&address).copied().unwrap_or_default())
    }

    async fn suggest_gas_tip_cap(&self) -> Result<U256> {
        self.enter("eth_maxPriorityFeePerGas")?;
        Ok(*self.tip.lock())
    }

    async fn suggest_gas_price(&self) -> Result<U256> {
        self.enter("eth_gasPrice")?;
        Ok(*self.gas_price.lock())
    }

    async fn chain_id(&self) -> Result<u64> {
        self.enter("eth_chainId")?;
        Ok(self.chain_id)
    }

    async fn storage_at(&self, address: Address, slot: H256) -> Result<H256> {
        self.enter("eth_getStorageAt")?;
        Ok(self
            .storage
            .lock()
            .get(&(address, slot))
            .copied()
            .unwrap_or_default())
    }

    async fn raw_request(
        &self,
        method: &'static str,
        _params: serde_json::Value,
    ) -> Result<serde_json::Value> {
        self.enter(method)?;
        self.raw
            .lock()
            .get(method)
            .cloned()
            .ok_or_else(|| ChainError::rpc(method, "method not scripted"))
    }
}
