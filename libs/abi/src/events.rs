//! Typed decoding of matched logs
//!
//! Indexed address parameters are read from the low 20 bytes of their topic;
//! fixed-width payload values come from 32-byte data words. Events without a
//! dedicated variant fall back to a generic ethabi decode.

use ethabi::{RawLog, Token};
use serde_json::json;
use types::words::{data_word, word_to_address, word_to_u256};
use types::{Address, LogEvent, U256};

use crate::error::DecodeError;
use crate::signatures::{EventKind, EventSignature};

/// Decoded payload of a classified log
#[derive(Debug, Clone, PartialEq)]
pub enum ContractEvent {
    /// A new IDO / pool contract was deployed
    PoolCreated { pool: Address },
    PoolParametersSet { pool: Option<Address> },
    Transfer {
        from: Address,
        to: Address,
        value: U256,
    },
    Generic {
        name: String,
        params: Vec<(String, Token)>,
    },
}

impl ContractEvent {
    /// Amount carried by the event, used by trigger threshold filters
    pub fn amount(&self) -> Option<U256> {
        match self {
            Self::Transfer { value, .. } => Some(*value),
            _ => None,
        }
    }

    /// Compact JSON view for logs and CLI output
    pub fn summary(&self) -> serde_json::Value {
        match self {
            Self::PoolCreated { pool } => json!({ "pool": format!("{pool:?}") }),
            Self::PoolParametersSet { pool } => {
                json!({ "pool": pool.map(|p| format!("{p:?}")) })
            }
            Self::Transfer { from, to, value } => json!({
                "from": format!("{from:?}"),
                "to": format!("{to:?}"),
                "value": value.to_string(),
            }),
            Self::Generic { name, params } => {
                let fields: serde_json::Map<String, serde_json::Value> = params
                    .iter()
                    .map(|(k, v)| (k.clone(), json!(v.to_string())))
                    .collect();
                json!({ "event": name, "params": fields })
            }
        }
    }
}

/// Decode `log` according to the shape bound to `signature`.
pub fn decode_event(signature: &EventSignature, log: &LogEvent) -> Result<ContractEvent, DecodeError> {
    let name = &signature.name;
    match signature.kind {
        EventKind::PoolCreated => {
            // indexed in the IDO factory; fall back to the first data word otherwise
            let pool = match log.indexed_address(0) {
                Some(pool) => pool,
                None => {
                    let word = data_word(&log.data, 0).map_err(|source| DecodeError::Payload {
                        event: name.clone(),
                        source,
                    })?;
                    word_to_address(&word)
                }
            };
            Ok(ContractEvent::PoolCreated { pool })
        }
        EventKind::PoolParametersSet => Ok(ContractEvent::PoolParametersSet {
            pool: log.indexed_address(0),
        }),
        EventKind::Transfer => {
            let from = log.indexed_address(0).ok_or_else(|| DecodeError::MissingTopic {
                event: name.clone(),
                index: 1,
            })?;
            let to = log.indexed_address(1).ok_or_else(|| DecodeError::MissingTopic {
                event: name.clone(),
                index: 2,
            })?;
            let value = data_word(&log.data, 0)
                .map(|w| word_to_u256(&w))
                .map_err(|source| DecodeError::Payload {
                    event: name.clone(),
                    source,
                })?;
            Ok(ContractEvent::Transfer { from, to, value })
        }
        EventKind::Generic => {
            let raw = RawLog {
                topics: log.topics.clone(),
                data: log.data.to_vec(),
            };
            let parsed = signature
                .event
                .parse_log(raw)
                .map_err(|e| DecodeError::Abi {
                    event: name.clone(),
                    message: e.to_string(),
                })?;
            Ok(ContractEvent::Generic {
                name: name.clone(),
                params: parsed.params.into_iter().map(|p| (p.name, p.value)).collect(),
            })
        }
    }
}
