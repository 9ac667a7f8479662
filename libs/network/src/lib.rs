//! Chain Client Infrastructure
//!
//! The [`ChainClient`] trait is the only way the rest of the workspace talks
//! to a node. [`EthersClient`] implements it over one ethers WebSocket
//! connection with every call bounded by a timeout; [`testing`] provides a
//! scripted implementation for tests.
//!
//! Subscriptions are bounded channels with a separate error side channel, see
//! [`Subscription`]. [`Shutdown`] is the run-until-cancelled signal observed
//! by every receive loop.

pub mod client;
pub mod error;
pub mod ethers_client;
pub mod shutdown;
pub mod subscription;
pub mod testing;

// Re-export commonly used types
pub use client::{ChainClient, LogFilter, TxLookup};
pub use error::{ChainError, Result};
pub use ethers_client::EthersClient;
pub use shutdown::{Shutdown, ShutdownSignal};
pub use subscription::{Subscription, SubscriptionSink};

/// Default per-call bound for RPC requests
pub const DEFAULT_RPC_TIMEOUT_MS: u64 = 5_000;
