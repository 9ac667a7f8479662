//! What starts a build

use types::{Bytes, H256, U256};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerSource {
    /// A decoded contract log
    Event {
        name: String,
        block_number: u64,
        tx_hash: H256,
    },
    /// A pending call matching the watched selector
    PendingTx { hash: H256 },
    /// Operator invocation
    Manual,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    pub source: TriggerSource,
    /// Amount carried by the trigger, compared against the minimum
    pub amount: Option<U256>,
    /// Per-transaction payloads; the configured call is used when absent
    pub payloads: Option<Vec<Bytes>>,
}

impl Trigger {
    pub fn manual() -> Self {
        Self {
            source: TriggerSource::Manual,
            amount: None,
            payloads: None,
        }
    }

    pub fn event(name: impl Into<String>, block_number: u64, tx_hash: H256) -> Self {
        Self {
            source: TriggerSource::Event {
                name: name.into(),
                block_number,
                tx_hash,
            },
            amount: None,
            payloads: None,
        }
    }

    pub fn pending(hash: H256) -> Self {
        Self {
            source: TriggerSource::PendingTx { hash },
            amount: None,
            payloads: None,
        }
    }

    pub fn with_amount(mut self, amount: Option<U256>) -> Self {
        self.amount = amount;
        self
    }

    pub fn with_payloads(mut self, payloads: Vec<Bytes>) -> Self {
        self.payloads = Some(payloads);
        self
    }

    /// `Some((amount, minimum))` when the amount is present and below `minimum`.
    /// A trigger without an amount always passes.
    pub fn below_minimum(&self, minimum: Option<U256>) -> Option<(U256, U256)> {
        match (self.amount, minimum) {
            (Some(amount), Some(minimum)) if amount < minimum => Some((amount, minimum)),
            _ => None,
        }
    }

    pub fn label(&self) -> String {
        match &self.source {
            TriggerSource::Event { name, block_number, .. } => format!("{name}@{block_number}"),
            TriggerSource::PendingTx { hash } => format!("pending {hash:?}"),
            TriggerSource::Manual => "manual".to_string(),
        }
    }
}
