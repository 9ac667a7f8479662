//! # Chainwatch Types
//!
//! Records shared by every chainwatch crate. Nothing in here talks to the
//! network; these are the values that flow between the chain client, the
//! event dispatcher, the bundle builder and the relay submitter.
//!
//! ```text
//! ChainClient ──► LogEvent / BlockHeader / PendingTxHandle ──► watcher
//!                                                                 │
//!                                              trigger            ▼
//!                               BundleRequest ──► SignedBundle ──► relay
//! ```
//!
//! The [`words`] module holds the fixed-width decoders used wherever a
//! 32-byte word (log topic, storage slot, calldata argument) has to be
//! split into narrower values.

pub mod bundle;
pub mod chain;
pub mod words;

pub use bundle::{
    BundleRequest, FeeParams, SignedBundle, SignedTx, SubmissionState, TxSpec, TxType,
};
pub use chain::{BlockHeader, LogEvent, PendingTransaction, PendingTxHandle};
pub use words::{WordError, WORD_SIZE};

pub use ethers_core::types::{Address, Bytes, H256, U256};
