//! Chain client error types

use thiserror::Error;

/// Failures of the chain client capability
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// Dialing the node failed
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// The node refused or failed a subscription request
    #[error("Subscribe error: {kind}: {message}")]
    Subscribe { kind: &'static str, message: String },

    /// A live subscription stopped delivering
    #[error("Subscription closed: {kind}")]
    SubscriptionClosed { kind: &'static str },

    /// A request/response call returned an error
    #[error("RPC error: {operation}: {message}")]
    Rpc {
        operation: &'static str,
        message: String,
    },

    /// A call did not complete within its bound
    #[error("Timeout error: {operation} exceeded {timeout_ms}ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },
}

/// Result type alias for chain client operations
pub type Result<T> = std::result::Result<T, ChainError>;

impl ChainError {
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    pub fn subscribe(kind: &'static str, message: impl Into<String>) -> Self {
        Self::Subscribe {
            kind,
            message: message.into(),
        }
    }

    pub fn rpc(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Rpc {
            operation,
            message: message.into(),
        }
    }

    pub fn timeout(operation: &'static str, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation,
            timeout_ms,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Connection-level failure, as opposed to the node answering with an error
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::SubscriptionClosed { .. } | Self::Timeout { .. }
        )
    }

    /// Fatal to the subscription it was raised on
    pub fn is_subscription_fatal(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::Subscribe { .. } | Self::SubscriptionClosed { .. }
        )
    }
}
