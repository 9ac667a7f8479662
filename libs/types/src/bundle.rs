//! Bundle records from request to relay submission
//!
//! ```text
//! BundleRequest ──sign──▶ SignedBundle ──submit──▶ SubmissionState
//!  nonce_base..+k          raw txs + target         Built → Submitted → Accepted | Rejected
//! ```

use ethers_core::types::{Address, Bytes, H256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// Transaction envelope used when signing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxType {
    /// Type-2 transaction with fee cap and tip cap
    #[default]
    Eip1559,
    /// EIP-155 replay-protected legacy transaction, `gas_price = fee cap`
    Legacy,
}

/// Fee-cap / tip-cap pair shared by every transaction of a bundle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeParams {
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
}

impl FeeParams {
    /// Fee cap as suggested gas price plus tip.
    pub fn from_suggestion(gas_price: U256, tip: U256) -> Self {
        Self {
            max_fee_per_gas: gas_price.saturating_add(tip),
            max_priority_fee_per_gas: tip,
        }
    }
}

/// One unsigned transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxSpec {
    pub nonce: u64,
    pub to: Address,
    pub value: U256,
    pub gas_limit: U256,
    pub fees: FeeParams,
    pub data: Bytes,
    pub chain_id: u64,
    pub tx_type: TxType,
}

/// Ordered unsigned transactions sharing nonce base, destination, value,
/// gas limit and fees.
///
/// Transaction `i` carries nonce `nonce_base + i` and payload `payloads[i]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleRequest {
    pub nonce_base: u64,
    pub to: Address,
    pub value: U256,
    pub gas_limit: U256,
    pub fees: FeeParams,
    pub payloads: Vec<Bytes>,
    pub chain_id: u64,
    pub tx_type: TxType,
}

impl BundleRequest {
    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }

    /// The contiguous nonce range `nonce_base..nonce_base + len`.
    pub fn nonces(&self) -> Range<u64> {
        self.nonce_base..self.nonce_base + self.len() as u64
    }

    pub fn tx_specs(&self) -> Vec<TxSpec> {
        self.nonces()
            .zip(self.payloads.iter())
            .map(|(nonce, data)| TxSpec {
                nonce,
                to: self.to,
                value: self.value,
                gas_limit: self.gas_limit,
                fees: self.fees,
                data: data.clone(),
                chain_id: self.chain_id,
                tx_type: self.tx_type,
            })
            .collect()
    }
}

/// A signed transaction in canonical broadcast encoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTx {
    pub hash: H256,
    pub nonce: u64,
    pub raw: Bytes,
}

impl SignedTx {
    /// `0x`-prefixed hex, the form relays expect.
    pub fn raw_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.raw))
    }
}

/// Signed transactions valid for exactly one target block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedBundle {
    pub transactions: Vec<SignedTx>,
    pub target_block: u64,
    /// Head height read immediately before signing
    pub observed_head: u64,
}

impl SignedBundle {
    pub fn raw_transactions(&self) -> Vec<String> {
        self.transactions.iter().map(SignedTx::raw_hex).collect()
    }

    pub fn target_block_hex(&self) -> String {
        format!("0x{:x}", self.target_block)
    }

    pub fn nonces(&self) -> Vec<u64> {
        self.transactions.iter().map(|tx| tx.nonce).collect()
    }
}

/// Observable submission lifecycle.
///
/// Inclusion (landed / expired) is not tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionState {
    Built,
    Submitted,
    Accepted,
    /// Run through `eth_callBundle` only; never sent for inclusion
    Simulated,
    Rejected,
}

impl fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SubmissionState::Built => "built",
            SubmissionState::Submitted => "submitted",
            SubmissionState::Accepted => "accepted",
            SubmissionState::Simulated => "simulated",
            SubmissionState::Rejected => "rejected",
        };
        f.write_str(name)
    }
}
