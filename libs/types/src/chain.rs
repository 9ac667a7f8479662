//! Records received from the chain feeds
//!
//! These are transient: a `LogEvent` is consumed by the dispatcher's
//! classification step and a `PendingTxHandle` must be resolved through a
//! lookup before anything downstream may treat it as a transaction.

use ethers_core::types::{Address, Block, Bytes, Log, Transaction, H256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::words::word_to_address;

/// Raw contract log as delivered by a log subscription
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    pub address: Address,
    /// `topics[0]` is the event signature hash; the rest are indexed parameters
    pub topics: Vec<H256>,
    pub data: Bytes,
    pub block_number: u64,
    pub tx_hash: H256,
}

impl LogEvent {
    /// First topic, which identifies the event. Anonymous events have none.
    pub fn signature_topic(&self) -> Option<&H256> {
        self.topics.first()
    }

    /// Indexed parameter `i` (0-based, not counting the signature topic).
    pub fn indexed(&self, i: usize) -> Option<&H256> {
        self.topics.get(i + 1)
    }

    /// Indexed parameter `i` read as an address from the low 20 bytes.
    pub fn indexed_address(&self, i: usize) -> Option<Address> {
        self.indexed(i).map(word_to_address)
    }
}

impl From<Log> for LogEvent {
    fn from(log: Log) -> Self {
        Self {
            address: log.address,
            topics: log.topics,
            data: log.data,
            block_number: log.block_number.map(|n| n.as_u64()).unwrap_or_default(),
            tx_hash: log.transaction_hash.unwrap_or_default(),
        }
    }
}

/// New block header from a head subscription
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub number: u64,
    pub hash: H256,
    /// Unix seconds
    pub timestamp: u64,
    pub base_fee: Option<U256>,
}

impl<TX> From<Block<TX>> for BlockHeader {
    fn from(block: Block<TX>) -> Self {
        Self {
            number: block.number.map(|n| n.as_u64()).unwrap_or_default(),
            hash: block.hash.unwrap_or_default(),
            timestamp: block.timestamp.low_u64(),
            base_fee: block.base_fee_per_gas,
        }
    }
}

/// Hash announced by the pending-transaction feed.
///
/// Not a transaction: the lookup may report it unknown, already mined,
/// or fail outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PendingTxHandle(pub H256);

impl PendingTxHandle {
    pub fn hash(&self) -> H256 {
        self.0
    }
}

impl From<H256> for PendingTxHandle {
    fn from(hash: H256) -> Self {
        Self(hash)
    }
}

impl fmt::Display for PendingTxHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

/// A handle confirmed to still be in the mempool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTransaction {
    pub hash: H256,
    pub from: Address,
    pub to: Option<Address>,
    pub nonce: U256,
    pub value: U256,
    pub gas: U256,
    pub gas_price: Option<U256>,
    pub input: Bytes,
}

impl PendingTransaction {
    /// True when the transaction calls `contract` with calldata starting with `selector`.
    pub fn calls(&self, contract: Address, selector: [u8; 4]) -> bool {
        self.to == Some(contract) && self.input.as_ref().starts_with(&selector)
    }
}

impl From<Transaction> for PendingTransaction {
    fn from(tx: Transaction) -> Self {
        Self {
            hash: tx.hash,
            from: tx.from,
            to: tx.to,
            nonce: tx.nonce,
            value: tx.value,
            gas: tx.gas,
            gas_price: tx.gas_price,
            input: tx.input,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers_core::types::U64;

    fn sample_log() -> Log {
        Log {
            address: Address::from([0xaa; 20]),
            topics: vec![H256::from([0x01; 32]), H256::from(Address::from([0x22; 20]))],
            data: Bytes::from(vec![0u8; 32]),
            block_number: Some(U64::from(100u64)),
            transaction_hash: Some(H256::from([0x33; 32])),
            ..Default::default()
        }
    }

    #[test]
    fn log_conversion_keeps_topic_order() {
        let event = LogEvent::from(sample_log());
        assert_eq!(event.block_number, 100);
        assert_eq!(event.signature_topic(), Some(&H256::from([0x01; 32])));
        assert_eq!(event.indexed_address(0), Some(Address::from([0x22; 20])));
        assert_eq!(event.indexed(1), None);
    }

    #[test]
    fn anonymous_log_has_no_signature_topic() {
        let mut log = sample_log();
        log.topics.clear();
        let event = LogEvent::from(log);
        assert!(event.signature_topic().is_none());
    }

    #[test]
    fn pending_transaction_matches_selector_and_target() {
        let contract = Address::from([0x44; 20]);
        let tx = PendingTransaction {
            hash: H256::zero(),
            from: Address::zero(),
            to: Some(contract),
            nonce: U256::zero(),
            value: U256::zero(),
            gas: U256::from(21_000u64),
            gas_price: None,
            input: Bytes::from(vec![0xde, 0xad, 0xbe, 0xef, 0x00]),
        };
        assert!(tx.calls(contract, [0xde, 0xad, 0xbe, 0xef]));
        assert!(!tx.calls(contract, [0x00, 0x00, 0x00, 0x00]));
        assert!(!tx.calls(Address::zero(), [0xde, 0xad, 0xbe, 0xef]));
    }
}
