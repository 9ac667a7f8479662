//! Build, relay and execution error types

use network::ChainError;
use thiserror::Error;

/// Failures while turning a trigger into a signed bundle.
/// Each aborts that build only; nothing is retried inside the builder.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuildError {
    /// Nonce, fee or head lookup failed
    #[error("State fetch failed: {0}")]
    StateFetch(#[from] ChainError),

    #[error("Payload encoding failed: {0}")]
    Encode(String),

    /// The fetched pending nonce overlaps a bundle whose target block has not passed
    #[error("Nonce {pending} overlaps in-flight bundle {start}..{end} targeting block {target_block} (head {head})")]
    NonceConflict {
        pending: u64,
        start: u64,
        end: u64,
        target_block: u64,
        head: u64,
    },

    /// Configuration defect such as a chain id mismatch; never fall back
    #[error("Signing failed: {0}")]
    Signing(String),
}

impl BuildError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::StateFetch(e) if e.is_timeout())
    }
}

/// Relay submission failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// Structured rejection from the relay; resubmitting the same bundle is pointless
    #[error("Relay rejected bundle ({code}): {message}")]
    Rejected { code: i64, message: String },

    #[error("Relay transport error: {message}")]
    Transport { message: String },

    #[error("Relay timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Invalid relay response: {message}")]
    InvalidResponse { message: String },

    /// Signing the request with the relay identity failed
    #[error("Relay authentication failed: {message}")]
    Authentication { message: String },
}

impl RelayError {
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Timeout { .. })
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutionError {
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Relay(#[from] RelayError),
}

impl ExecutionError {
    /// The caller may rebuild against a fresh head and submit again.
    ///
    /// Holds for transport failures on either side. Rejections, encoding
    /// and signing failures would fail the same way again.
    pub fn is_retryable_with_fresh_bundle(&self) -> bool {
        match self {
            Self::Build(BuildError::StateFetch(e)) => e.is_transport(),
            Self::Build(_) => false,
            Self::Relay(e) => e.is_transport(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Build(e) => e.is_timeout(),
            Self::Relay(e) => e.is_timeout(),
        }
    }
}
