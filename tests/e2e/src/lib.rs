//! End-to-end harness for the sniper pipeline
//!
//! Drives the real dispatcher, router, builder and relay client against a
//! scripted chain and an HTTP relay stand-in.
//!
//! ```text
//! Feed<LogEvent>         → EventDispatcher  ┐
//!                                            ├→ TriggerRouter → BundleExecutor → relay (HTTP)
//! Feed<PendingTxHandle>  → PendingTxWatcher ┘
//! ```

pub mod fixtures;

pub use fixtures::{
    abi_dir, app_config, pending_config, pending_tx, pool_created_log, topic, transfer_log,
    watched, Pipeline, SIGNER_KEY, WATCHED_CONTRACT,
};
