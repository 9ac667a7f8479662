//! ethers-backed chain client over a single WebSocket connection

use async_trait::async_trait;
use ethers::providers::{Middleware, Provider, ProviderError, SubscriptionStream, Ws};
use ethers::types::{Address, BlockNumber, Filter, Topic, ValueOrArray, H256, U256};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use types::{BlockHeader, LogEvent, PendingTxHandle};

use crate::client::{ChainClient, LogFilter, TxLookup};
use crate::error::{ChainError, Result};
use crate::subscription::{Subscription, SubscriptionSink};

pub struct EthersClient {
    provider: Arc<Provider<Ws>>,
    timeout: Duration,
}

impl EthersClient {
    /// Dial `ws_url`, bounded by `timeout`.
    pub async fn connect(ws_url: &str, timeout: Duration) -> Result<Self> {
        info!("🔌 Connecting to {}", ws_url);
        let ws = tokio::time::timeout(timeout, Ws::connect(ws_url))
            .await
            .map_err(|_| ChainError::timeout("connect", timeout.as_millis() as u64))?
            .map_err(|e| ChainError::connection(e.to_string()))?;
        info!("✅ WebSocket connected");

        Ok(Self {
            provider: Arc::new(Provider::new(ws)),
            timeout,
        })
    }

    pub fn provider(&self) -> Arc<Provider<Ws>> {
        self.provider.clone()
    }

    fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }

    async fn bounded<T, F>(&self, operation: &'static str, call: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, ProviderError>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(ChainError::rpc(operation, e.to_string())),
            Err(_) => Err(ChainError::timeout(operation, self.timeout_ms())),
        }
    }

    /// Wait for the forwarding task to report that `eth_subscribe` succeeded.
    async fn await_ready<T>(
        &self,
        kind: &'static str,
        handle: Subscription<T>,
        ready: oneshot::Receiver<Result<()>>,
    ) -> Result<Subscription<T>> {
        match tokio::time::timeout(self.timeout, ready).await {
            Ok(Ok(Ok(()))) => {
                info!(kind, "📡 Subscription active");
                Ok(handle)
            }
            Ok(Ok(Err(e))) => Err(e),
            Ok(Err(_)) => Err(ChainError::subscribe(kind, "subscription task exited")),
            Err(_) => {
                handle.unsubscribe().await;
                Err(ChainError::timeout(kind, self.timeout_ms()))
            }
        }
    }
}

fn to_ethers_filter(filter: &LogFilter) -> Filter {
    let mut out = Filter::new().address(ValueOrArray::Value(filter.address));
    if !filter.topics.is_empty() {
        let topic0: Topic = ValueOrArray::Array(filter.topics.iter().copied().map(Some).collect());
        out = out.topic0(topic0);
    }
    if let Some(block) = filter.from_block {
        out = out.from_block(BlockNumber::Number(block.into()));
    }
    out
}

/// Pump a node subscription into the sink until stopped or the stream ends.
async fn forward<R, T>(
    kind: &'static str,
    mut stream: SubscriptionStream<'_, Ws, R>,
    map: impl Fn(R) -> T,
    sink: SubscriptionSink<T>,
) where
    R: DeserializeOwned,
{
    let SubscriptionSink {
        items,
        errors,
        mut stop,
    } = sink;

    loop {
        tokio::select! {
            _ = &mut stop => {
                if let Err(e) = stream.unsubscribe().await {
                    debug!(kind, "eth_unsubscribe failed: {}", e);
                }
                return;
            }
            next = stream.next() => match next {
                // blocking send: a full buffer back-pressures the node feed
                Some(raw) => {
                    if items.send(map(raw)).await.is_err() {
                        let _ = stream.unsubscribe().await;
                        return;
                    }
                }
                None => {
                    warn!(kind, "⚠️ Subscription stream ended");
                    let _ = errors.send(ChainError::SubscriptionClosed { kind });
                    return;
                }
            }
        }
    }
}

#[async_trait]
impl ChainClient for EthersClient {
    async fn block_number(&self) -> Result<u64> {
        self.bounded("eth_blockNumber", self.provider.get_block_number())
            .await
            .map(|n| n.as_u64())
    }

    async fn subscribe_logs(
        &self,
        filter: LogFilter,
        buffer: usize,
    ) -> Result<Subscription<LogEvent>> {
        const KIND: &str = "logs";
        let (handle, sink) = Subscription::channel(KIND, buffer);
        let (ready_tx, ready_rx) = oneshot::channel();
        let provider = self.provider.clone();
        let filter = to_ethers_filter(&filter);

        let task = tokio::spawn(async move {
            match provider.subscribe_logs(&filter).await {
                Ok(stream) => {
                    let _ = ready_tx.send(Ok(()));
                    forward(KIND, stream, LogEvent::from, sink).await;
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(ChainError::subscribe(KIND, e.to_string())));
                }
            }
        });
        self.await_ready(KIND, handle.with_task(task), ready_rx).await
    }

    async fn subscribe_new_heads(&self, buffer: usize) -> Result<Subscription<BlockHeader>> {
        const KIND: &str = "newHeads";
        let (handle, sink) = Subscription::channel(KIND, buffer);
        let (ready_tx, ready_rx) = oneshot::channel();
        let provider = self.provider.clone();

        let task = tokio::spawn(async move {
            match provider.subscribe_blocks().await {
                Ok(stream) => {
                    let _ = ready_tx.send(Ok(()));
                    forward(KIND, stream, BlockHeader::from, sink).await;
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(ChainError::subscribe(KIND, e.to_string())));
                }
            }
        });
        self.await_ready(KIND, handle.with_task(task), ready_rx).await
    }

    async fn subscribe_pending_tx_hashes(
        &self,
        buffer: usize,
    ) -> Result<Subscription<PendingTxHandle>> {
        const KIND: &str = "newPendingTransactions";
        let (handle, sink) = Subscription::channel(KIND, buffer);
        let (ready_tx, ready_rx) = oneshot::channel();
        let provider = self.provider.clone();

        let task = tokio::spawn(async move {
            match provider.subscribe_pending_txs().await {
                Ok(stream) => {
                    let _ = ready_tx.send(Ok(()));
                    forward(KIND, stream, PendingTxHandle::from, sink).await;
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(ChainError::subscribe(KIND, e.to_string())));
                }
            }
        });
        self.await_ready(KIND, handle.with_task(task), ready_rx).await
    }

    async fn transaction_by_hash(&self, hash: H256) -> Result<TxLookup> {
        self.bounded("eth_getTransactionByHash", self.provider.get_transaction(hash))
            .await
            .map(TxLookup::from_transaction)
    }

    async fn pending_nonce_at(&self, address: Address) -> Result<u64> {
        let count = self
            .bounded(
                "eth_getTransactionCount",
                self.provider
                    .get_transaction_count(address, Some(BlockNumber::Pending.into())),
            )
            .await?;
        Ok(count.as_u64())
    }

    async fn suggest_gas_tip_cap(&self) -> Result<U256> {
        let value = self
            .raw_request("eth_maxPriorityFeePerGas", serde_json::json!([]))
            .await?;
        serde_json::from_value(value)
            .map_err(|e| ChainError::rpc("eth_maxPriorityFeePerGas", e.to_string()))
    }

    async fn suggest_gas_price(&self) -> Result<U256> {
        self.bounded("eth_gasPrice", self.provider.get_gas_price())
            .await
    }

    async fn chain_id(&self) -> Result<u64> {
        self.bounded("eth_chainId", self.provider.get_chainid())
            .await
            .map(|id| id.as_u64())
    }

    async fn storage_at(&self, address: Address, slot: H256) -> Result<H256> {
        self.bounded(
            "eth_getStorageAt",
            self.provider.get_storage_at(address, slot, None),
        )
        .await
    }

    async fn raw_request(
        &self,
        method: &'static str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value> {
        self.bounded(method, self.provider.request(method, params))
            .await
    }
}
