//! Build-and-submit for one signer
//!
//! At most one operation runs at a time: the pending nonce read by a build
//! must not be read again until that bundle's submission has settled.

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use types::{SignedBundle, SubmissionState, H256, U256};

use crate::bundle::{BuildOutcome, BundleBuilder};
use crate::error::{ExecutionError, RelayError};
use crate::flashbots::{BundleRelay, SimulationResult};
use crate::trigger::Trigger;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitMode {
    /// `eth_sendBundle`
    Send,
    /// `eth_callBundle` against the configured state block
    Simulate,
}

impl SubmitMode {
    pub fn from_simulate_flag(simulate: bool) -> Self {
        if simulate {
            Self::Simulate
        } else {
            Self::Send
        }
    }
}

/// Caller-visible result of one trigger
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionReport {
    Skipped {
        amount: U256,
        minimum: U256,
    },
    Accepted {
        bundle: SignedBundle,
        bundle_hash: H256,
    },
    Simulated {
        bundle: SignedBundle,
        result: SimulationResult,
    },
    /// The relay refused the bundle. Not retried.
    Rejected {
        bundle: SignedBundle,
        code: i64,
        message: String,
    },
}

impl ExecutionReport {
    /// Last lifecycle state reached; `None` when nothing was built.
    pub fn state(&self) -> Option<SubmissionState> {
        match self {
            Self::Skipped { .. } => None,
            Self::Accepted { .. } => Some(SubmissionState::Accepted),
            Self::Simulated { .. } => Some(SubmissionState::Simulated),
            Self::Rejected { .. } => Some(SubmissionState::Rejected),
        }
    }

    pub fn bundle(&self) -> Option<&SignedBundle> {
        match self {
            Self::Skipped { .. } => None,
            Self::Accepted { bundle, .. }
            | Self::Simulated { bundle, .. }
            | Self::Rejected { bundle, .. } => Some(bundle),
        }
    }
}

pub struct BundleExecutor {
    builder: BundleBuilder,
    relay: Arc<dyn BundleRelay>,
    in_flight: Mutex<()>,
}

impl BundleExecutor {
    pub fn new(builder: BundleBuilder, relay: Arc<dyn BundleRelay>) -> Self {
        Self {
            builder,
            relay,
            in_flight: Mutex::new(()),
        }
    }

    pub fn builder(&self) -> &BundleBuilder {
        &self.builder
    }

    /// Build a fresh bundle for `trigger` and hand it to the relay.
    pub async fn execute(
        &self,
        trigger: &Trigger,
        mode: SubmitMode,
    ) -> Result<ExecutionReport, ExecutionError> {
        let _guard = self.in_flight.lock().await;

        let bundle = match self.builder.build(trigger).await {
            Ok(BuildOutcome::Built(bundle)) => bundle,
            Ok(BuildOutcome::Skipped { amount, minimum }) => {
                return Ok(ExecutionReport::Skipped { amount, minimum })
            }
            Err(e) => {
                error!(trigger = %trigger.label(), "❌ Bundle build failed: {}", e);
                return Err(e.into());
            }
        };
        info!(
            state = %SubmissionState::Submitted,
            target_block = bundle.target_block,
            txs = bundle.transactions.len(),
            ?mode,
            "📦 Submitting bundle"
        );

        let submitted = match mode {
            SubmitMode::Send => self
                .relay
                .send_bundle(&bundle)
                .await
                .map(|bundle_hash| ExecutionReport::Accepted {
                    bundle: bundle.clone(),
                    bundle_hash,
                }),
            SubmitMode::Simulate => self
                .relay
                .call_bundle(&bundle)
                .await
                .map(|result| ExecutionReport::Simulated {
                    bundle: bundle.clone(),
                    result,
                }),
        };

        match submitted {
            Ok(report) => {
                if let ExecutionReport::Accepted { bundle_hash, .. } = &report {
                    self.builder.nonce_tracker().record(&bundle);
                    info!(
                        state = %SubmissionState::Accepted,
                        bundle_hash = ?bundle_hash,
                        target_block = bundle.target_block,
                        nonces = ?bundle.nonces(),
                        "✅ Bundle accepted by relay"
                    );
                }
                if let ExecutionReport::Simulated { result, .. } = &report {
                    match result.first_failure() {
                        Some(failure) => warn!(
                            target_block = bundle.target_block,
                            "⚠️ Simulation reported a failing transaction: {}",
                            failure
                        ),
                        None => info!(
                            state = %SubmissionState::Simulated,
                            target_block = bundle.target_block,
                            gas_used = ?result.total_gas_used,
                            coinbase_diff = ?result.coinbase_diff,
                            "🧪 Simulation succeeded"
                        ),
                    }
                }
                Ok(report)
            }
            Err(RelayError::Rejected { code, message }) => {
                warn!(
                    state = %SubmissionState::Rejected,
                    target_block = bundle.target_block,
                    code,
                    "🚫 Relay rejected bundle: {}",
                    message
                );
                Ok(ExecutionReport::Rejected {
                    bundle,
                    code,
                    message,
                })
            }
            Err(e) => {
                error!(target_block = bundle.target_block, "❌ Relay submission failed: {}", e);
                Err(e.into())
            }
        }
    }
}
