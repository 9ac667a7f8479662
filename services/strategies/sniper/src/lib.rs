//! # Sniper
//!
//! Wires the watcher feeds to the bundle executor.
//!
//! ```text
//! logs ───────► EventDispatcher ──┐
//! pending txs ► PendingTxWatcher ─┼─► TriggerRouter ─► BundleExecutor ─► relay
//! new heads ──► ChainMonitor      │
//!                                 └─ (observe-only: log and drop)
//! ```
//!
//! The binary in `main.rs` owns process concerns: argument parsing,
//! subscriber installation, signal handling. Everything it assembles is
//! built here so tests can drive it without a node.

pub mod cli;
pub mod logging;
pub mod output;
pub mod pipeline;
pub mod router;

pub use cli::{Cli, Command};
pub use router::{RouterStats, TriggerRouter};
