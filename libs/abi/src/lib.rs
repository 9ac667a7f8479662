//! ABI definitions, event classification and call encoding
//!
//! This crate provides:
//! - ABI loading from `abis/<file>` relative to the working directory
//! - An immutable topic → event table used to classify raw logs
//! - A closed [`ContractEvent`] type resolved once at classification time
//! - Positional call encoding for the bundle payload
//!
//! Loading failures are meant to be fatal at startup; nothing here is
//! reloaded while the pipeline runs.

pub mod calls;
pub mod error;
pub mod events;
pub mod loader;
pub mod signatures;

pub use calls::CallEncoder;
pub use error::{AbiError, DecodeError};
pub use events::{decode_event, ContractEvent};
pub use loader::{load_abi, parse_abi};
pub use signatures::{Classification, EventKind, EventSignature, SignatureTable};

pub use ethabi::{Contract, Event, Token};
