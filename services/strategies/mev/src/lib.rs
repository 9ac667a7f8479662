//! # Bundle Pipeline
//!
//! Turns a trigger into signed transactions for one future block and submits
//! them to a private relay.
//!
//! ```text
//! Trigger → [BundleBuilder] → SignedBundle → [RelaySubmitter] → ExecutionReport
//!              │                                  │
//!   nonce + fees + head, fresh          eth_sendBundle | eth_callBundle
//! ```
//!
//! [`BundleExecutor`] serializes build and submit per signer. Relay
//! rejections are reported as [`ExecutionReport::Rejected`]; transport
//! failures come back as errors the caller may answer with a rebuilt bundle.
//! Nothing in this crate resubmits on its own.

pub mod bundle;
pub mod error;
pub mod executor;
pub mod flashbots;
pub mod nonce;
pub mod signer;
pub mod trigger;

pub use bundle::{BuildOutcome, BundleBuilder, BundleTemplate, ChainSnapshot};
pub use error::{BuildError, ExecutionError, RelayError};
pub use executor::{BundleExecutor, ExecutionReport, SubmitMode};
pub use flashbots::{BundleRelay, RelaySubmitter, SimulationResult, SIGNATURE_HEADER};
pub use nonce::NonceTracker;
pub use signer::TxSigner;
pub use trigger::{Trigger, TriggerSource};
