//! The chain client capability consumed by the watcher and the bundle builder

use async_trait::async_trait;
use ethers::types::{Address, Transaction, H256, U256};
use types::{BlockHeader, LogEvent, PendingTxHandle};

use crate::error::Result;
use crate::subscription::Subscription;

/// Log subscription filter: one contract, OR of first-topic hashes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFilter {
    pub address: Address,
    /// Matched against `topics[0]` only. Empty matches every event.
    pub topics: Vec<H256>,
    pub from_block: Option<u64>,
}

impl LogFilter {
    pub fn new(address: Address, topics: Vec<H256>) -> Self {
        Self {
            address,
            topics,
            from_block: None,
        }
    }

    pub fn from_block(mut self, block: Option<u64>) -> Self {
        self.from_block = block;
        self
    }
}

/// Outcome of resolving a transaction hash
#[derive(Debug, Clone, PartialEq)]
pub enum TxLookup {
    /// Known and not yet in a block
    Pending(Box<Transaction>),
    /// Already included in a block
    Mined(Box<Transaction>),
    NotFound,
}

impl TxLookup {
    pub fn from_transaction(tx: Option<Transaction>) -> Self {
        match tx {
            Some(tx) if tx.block_number.is_none() => Self::Pending(Box::new(tx)),
            Some(tx) => Self::Mined(Box::new(tx)),
            None => Self::NotFound,
        }
    }

    pub fn into_pending(self) -> Option<Transaction> {
        match self {
            Self::Pending(tx) => Some(*tx),
            _ => None,
        }
    }
}

/// Chain access used by every component.
///
/// Every call is bounded in time by the implementation and a timeout
/// surfaces as [`ChainError::Timeout`](crate::ChainError::Timeout).
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn block_number(&self) -> Result<u64>;

    async fn subscribe_logs(&self, filter: LogFilter, buffer: usize)
        -> Result<Subscription<LogEvent>>;

    async fn subscribe_new_heads(&self, buffer: usize) -> Result<Subscription<BlockHeader>>;

    async fn subscribe_pending_tx_hashes(
        &self,
        buffer: usize,
    ) -> Result<Subscription<PendingTxHandle>>;

    async fn transaction_by_hash(&self, hash: H256) -> Result<TxLookup>;

    async fn pending_nonce_at(&self, address: Address) -> Result<u64>;

    async fn suggest_gas_tip_cap(&self) -> Result<U256>;

    async fn suggest_gas_price(&self) -> Result<U256>;

    async fn chain_id(&self) -> Result<u64>;

    async fn storage_at(&self, address: Address, slot: H256) -> Result<H256>;

    /// Untyped JSON-RPC passthrough
    async fn raw_request(
        &self,
        method: &'static str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value>;
}
