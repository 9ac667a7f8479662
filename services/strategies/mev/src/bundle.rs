//! Bundle construction
//!
//! Every build re-reads nonce, fees and head from the chain client right
//! before signing. Nothing is cached between builds: a stale head would
//! produce a bundle for a block that already exists.

use abi::CallEncoder;
use config::BundleConfig;
use network::ChainClient;
use std::sync::Arc;
use tracing::{debug, info};
use types::{Address, BundleRequest, Bytes, FeeParams, SignedBundle, SubmissionState, TxType, U256};

use crate::error::BuildError;
use crate::nonce::NonceTracker;
use crate::signer::TxSigner;
use crate::trigger::Trigger;

/// Static parameters shared by every bundle
#[derive(Debug, Clone)]
pub struct BundleTemplate {
    pub to: Address,
    pub value: U256,
    /// Already includes the configured buffer
    pub gas_limit: U256,
    pub tx_count: usize,
    pub target_block_offset: u64,
    pub min_trigger_amount: Option<U256>,
    pub tx_type: TxType,
    /// Default payload when the trigger carries none
    pub payload: Bytes,
}

impl BundleTemplate {
    /// Encode the configured call once at startup.
    pub fn from_config(cfg: &BundleConfig, encoder: &CallEncoder) -> Result<Self, BuildError> {
        let payload = encoder
            .encode_args(&cfg.args)
            .map_err(|e| BuildError::Encode(e.to_string()))?;
        Ok(Self {
            to: cfg.contract_address,
            value: cfg.value_wei,
            gas_limit: cfg.buffered_gas_limit(),
            tx_count: cfg.tx_count.max(1),
            target_block_offset: cfg.target_block_offset.max(1),
            min_trigger_amount: cfg.min_trigger_amount,
            tx_type: cfg.tx_type,
            payload,
        })
    }
}

/// Chain state read for one build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainSnapshot {
    pub pending_nonce: u64,
    pub fees: FeeParams,
    pub head: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    Built(SignedBundle),
    /// Trigger amount below the configured minimum
    Skipped { amount: U256, minimum: U256 },
}

pub struct BundleBuilder {
    client: Arc<dyn ChainClient>,
    signer: TxSigner,
    template: BundleTemplate,
    nonces: NonceTracker,
}

impl BundleBuilder {
    pub fn new(client: Arc<dyn ChainClient>, signer: TxSigner, template: BundleTemplate) -> Self {
        Self {
            client,
            signer,
            template,
            nonces: NonceTracker::new(),
        }
    }

    pub fn signer_address(&self) -> Address {
        self.signer.address()
    }

    pub fn template(&self) -> &BundleTemplate {
        &self.template
    }

    pub fn nonce_tracker(&self) -> &NonceTracker {
        &self.nonces
    }

    /// Nonce, fees and head, fetched concurrently. Any failure aborts.
    pub async fn snapshot(&self) -> Result<ChainSnapshot, BuildError> {
        let (pending_nonce, tip, gas_price, head) = tokio::try_join!(
            self.client.pending_nonce_at(self.signer.address()),
            self.client.suggest_gas_tip_cap(),
            self.client.suggest_gas_price(),
            self.client.block_number(),
        )?;
        Ok(ChainSnapshot {
            pending_nonce,
            fees: FeeParams::from_suggestion(gas_price, tip),
            head,
        })
    }

    /// Unsigned request for `payloads` against `snapshot`.
    pub fn request(&self, snapshot: &ChainSnapshot, payloads: Vec<Bytes>) -> BundleRequest {
        BundleRequest {
            nonce_base: snapshot.pending_nonce,
            to: self.template.to,
            value: self.template.value,
            gas_limit: self.template.gas_limit,
            fees: snapshot.fees,
            payloads,
            chain_id: self.signer.chain_id(),
            tx_type: self.template.tx_type,
        }
    }

    pub async fn build(&self, trigger: &Trigger) -> Result<BuildOutcome, BuildError> {
        if let Some((amount, minimum)) = trigger.below_minimum(self.template.min_trigger_amount) {
            info!(
                trigger = %trigger.label(),
                amount = %amount,
                minimum = %minimum,
                "⏭️ Trigger below minimum amount, skipping build"
            );
            return Ok(BuildOutcome::Skipped { amount, minimum });
        }

        let payloads = match &trigger.payloads {
            Some(payloads) if !payloads.is_empty() => payloads.clone(),
            _ => vec![self.template.payload.clone(); self.template.tx_count],
        };

        let snapshot = self.snapshot().await?;
        self.nonces.check(snapshot.pending_nonce, snapshot.head)?;

        let request = self.request(&snapshot, payloads);
        let target_block = snapshot.head + self.template.target_block_offset;
        debug!(
            nonces = ?request.nonces(),
            head = snapshot.head,
            target_block,
            max_fee = %snapshot.fees.max_fee_per_gas,
            tip = %snapshot.fees.max_priority_fee_per_gas,
            "Signing bundle"
        );

        let transactions = request
            .tx_specs()
            .iter()
            .map(|spec| self.signer.sign(spec))
            .collect::<Result<Vec<_>, _>>()?;

        let bundle = SignedBundle {
            transactions,
            target_block,
            observed_head: snapshot.head,
        };
        info!(
            state = %SubmissionState::Built,
            trigger = %trigger.label(),
            txs = bundle.transactions.len(),
            nonces = ?bundle.nonces(),
            target_block,
            "📦 Bundle built"
        );
        Ok(BuildOutcome::Built(bundle))
    }
}
