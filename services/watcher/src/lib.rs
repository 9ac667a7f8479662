//! # Chain Watcher
//!
//! Reactive side of the pipeline. Three independent receive loops share one
//! [`network::ChainClient`]:
//!
//! - [`EventDispatcher`]: contract logs, classified against an immutable
//!   [`abi::SignatureTable`] and decoded into [`abi::ContractEvent`]s
//! - [`PendingTxWatcher`]: pending transaction hashes, resolved, inspected
//!   and filtered down to calls matching a [`SelectorTrigger`]
//! - [`ChainMonitor`]: head sampling and inter-block timing
//!
//! Each loop observes a [`network::ShutdownSignal`] and runs under a
//! [`Supervisor`] that restarts it with exponential backoff after a
//! subscription failure. No ordering holds across loops.
//!
//! [`storage`] is a read-only diagnostic path outside the pipeline.

pub mod dispatcher;
pub mod error;
pub mod monitor;
pub mod pending;
pub mod storage;
pub mod supervisor;

pub use dispatcher::{
    DecodedEvent, DispatcherHandle, DispatcherStats, DispatcherStatsSnapshot, EventDispatcher,
};
pub use error::WatcherError;
pub use monitor::{BlockTimer, BlockTiming, ChainMonitor};
pub use pending::{
    PendingHandle, PendingMatch, PendingStats, PendingStatsSnapshot, PendingTxWatcher,
    SelectorTrigger, Verdict,
};
pub use storage::{read_lock_array, LockEntry};
pub use supervisor::{Backoff, Supervisor};
