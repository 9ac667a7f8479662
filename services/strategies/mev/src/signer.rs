//! Transaction signing
//!
//! The wallet is bound to one chain id at construction. Type-2 transactions
//! carry fee cap and tip cap; legacy ones are EIP-155 protected and pay the
//! fee cap as gas price.

use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Eip1559TransactionRequest, TransactionRequest};
use ethers::utils::keccak256;
use types::{Address, SignedTx, TxSpec, TxType, H256};

use crate::error::BuildError;

pub struct TxSigner {
    wallet: LocalWallet,
    chain_id: u64,
}

impl TxSigner {
    pub fn new(wallet: LocalWallet, chain_id: u64) -> Self {
        Self {
            wallet: wallet.with_chain_id(chain_id),
            chain_id,
        }
    }

    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn typed(&self, spec: &TxSpec) -> TypedTransaction {
        match spec.tx_type {
            TxType::Eip1559 => Eip1559TransactionRequest::new()
                .from(self.address())
                .to(spec.to)
                .value(spec.value)
                .gas(spec.gas_limit)
                .max_fee_per_gas(spec.fees.max_fee_per_gas)
                .max_priority_fee_per_gas(spec.fees.max_priority_fee_per_gas)
                .data(spec.data.clone())
                .nonce(spec.nonce)
                .chain_id(spec.chain_id)
                .into(),
            TxType::Legacy => TransactionRequest::new()
                .from(self.address())
                .to(spec.to)
                .value(spec.value)
                .gas(spec.gas_limit)
                .gas_price(spec.fees.max_fee_per_gas)
                .data(spec.data.clone())
                .nonce(spec.nonce)
                .chain_id(spec.chain_id)
                .into(),
        }
    }

    /// Sign and encode one transaction in broadcast form.
    pub fn sign(&self, spec: &TxSpec) -> Result<SignedTx, BuildError> {
        if spec.chain_id != self.chain_id {
            return Err(BuildError::Signing(format!(
                "transaction for chain {} but signer bound to chain {}",
                spec.chain_id, self.chain_id
            )));
        }

        let typed = self.typed(spec);
        let signature = self
            .wallet
            .sign_transaction_sync(&typed)
            .map_err(|e| BuildError::Signing(e.to_string()))?;
        let raw = typed.rlp_signed(&signature);

        Ok(SignedTx {
            hash: H256(keccak256(&raw)),
            nonce: spec.nonce,
            raw,
        })
    }
}
