//! Error types for ABI loading, encoding and log decoding

use std::path::PathBuf;
use types::WordError;

/// Startup-time failures: loading the ABI, resolving names, encoding calls
#[derive(Debug, thiserror::Error)]
pub enum AbiError {
    #[error("Failed to read ABI file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("ABI parsing failed for {origin}: {message}")]
    Parse { origin: String, message: String },

    #[error("Event '{0}' not found in ABI")]
    UnknownEvent(String),

    #[error("Function '{0}' not found in ABI")]
    UnknownFunction(String),

    #[error("Invalid event signature '{signature}': {message}")]
    InvalidSignature { signature: String, message: String },

    #[error("{function} takes {expected} arguments, got {got}")]
    ArgumentCount {
        function: String,
        expected: usize,
        got: usize,
    },

    #[error("Cannot encode argument {index} of {function}: {message}")]
    Encode {
        function: String,
        index: usize,
        message: String,
    },
}

/// A log matched a known signature but its contents do not fit the event shape
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("{event}: missing indexed topic {index}")]
    MissingTopic { event: String, index: usize },

    #[error("{event}: {source}")]
    Payload {
        event: String,
        #[source]
        source: WordError,
    },

    #[error("{event}: ABI decoding failed: {message}")]
    Abi { event: String, message: String },
}
