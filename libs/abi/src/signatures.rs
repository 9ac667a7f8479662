//! Event signature table
//!
//! Built once from the ABI (and optional human-readable signatures), then
//! only read. Classification looks at `topics[0]` and nothing else.

use ethabi::{Contract, Event};
use ethers_core::abi::HumanReadableParser;
use std::collections::HashMap;
use tracing::debug;
use types::{LogEvent, H256};

use crate::error::AbiError;

/// Decoded shape an event is bound to at table-build time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// `NewIDOContract(address)` / `NewPoolContract(address)`
    PoolCreated,
    /// `PoolParametersSet(address, ...)`
    PoolParametersSet,
    /// ERC-20 `Transfer(address,address,uint256)`
    Transfer,
    /// Anything else, decoded generically against its ABI
    Generic,
}

impl EventKind {
    pub fn for_name(name: &str) -> Self {
        match name {
            "NewIDOContract" | "NewPoolContract" => Self::PoolCreated,
            "PoolParametersSet" => Self::PoolParametersSet,
            "Transfer" => Self::Transfer,
            _ => Self::Generic,
        }
    }
}

/// An event name and its topic hash
#[derive(Debug, Clone, PartialEq)]
pub struct EventSignature {
    pub name: String,
    pub topic: H256,
    pub kind: EventKind,
    pub event: Event,
}

impl EventSignature {
    pub fn from_event(event: Event) -> Self {
        Self {
            name: event.name.clone(),
            topic: event.signature(),
            kind: EventKind::for_name(&event.name),
            event,
        }
    }

    /// Parse a human-readable signature such as
    /// `Transfer(address indexed from, address indexed to, uint256 value)`.
    pub fn from_text(signature: &str) -> Result<Self, AbiError> {
        let trimmed = signature.trim();
        let text = if trimmed.starts_with("event ") {
            trimmed.to_string()
        } else {
            format!("event {trimmed}")
        };
        let event =
            HumanReadableParser::parse_event(&text).map_err(|e| AbiError::InvalidSignature {
                signature: signature.to_string(),
                message: e.to_string(),
            })?;
        Ok(Self::from_event(event))
    }
}

/// Result of looking up a log's first topic
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Classification<'a> {
    Matched(&'a EventSignature),
    /// First topic not in the table; surfaced for diagnostics
    Unknown(H256),
    /// Anonymous event or malformed log
    NoTopics,
}

impl<'a> Classification<'a> {
    pub fn is_matched(&self) -> bool {
        matches!(self, Self::Matched(_))
    }

    pub fn signature(&self) -> Option<&'a EventSignature> {
        match self {
            Self::Matched(sig) => Some(sig),
            _ => None,
        }
    }

    /// `(event name, matched)`; the name is empty when unmatched.
    pub fn as_pair(&self) -> (&'a str, bool) {
        match self {
            Self::Matched(sig) => (sig.name.as_str(), true),
            _ => ("", false),
        }
    }
}

/// Immutable topic → signature map
#[derive(Debug, Clone, Default)]
pub struct SignatureTable {
    by_topic: HashMap<H256, EventSignature>,
    /// Insertion order, for stable subscription filters
    order: Vec<H256>,
}

impl SignatureTable {
    pub fn from_events(events: impl IntoIterator<Item = Event>) -> Self {
        let mut table = Self::default();
        for event in events {
            table.insert(EventSignature::from_event(event));
        }
        table
    }

    /// Events named in `names`, or every event when `names` is empty.
    /// A name missing from the ABI is an error.
    pub fn from_contract(contract: &Contract, names: &[String]) -> Result<Self, AbiError> {
        if names.is_empty() {
            let mut all: Vec<&Event> = contract.events().collect();
            all.sort_by(|a, b| a.name.cmp(&b.name));
            return Ok(Self::from_events(all.into_iter().cloned()));
        }

        let mut events = Vec::with_capacity(names.len());
        for name in names {
            let event = contract
                .event(name)
                .map_err(|_| AbiError::UnknownEvent(name.clone()))?;
            events.push(event.clone());
        }
        Ok(Self::from_events(events))
    }

    /// Add human-readable signatures to a table under construction.
    pub fn with_text_signatures(mut self, signatures: &[String]) -> Result<Self, AbiError> {
        for text in signatures {
            self.insert(EventSignature::from_text(text)?);
        }
        Ok(self)
    }

    fn insert(&mut self, signature: EventSignature) {
        debug!(
            name = %signature.name,
            topic = ?signature.topic,
            "Registered event signature"
        );
        if self.by_topic.insert(signature.topic, signature.clone()).is_none() {
            self.order.push(signature.topic);
        }
    }

    pub fn classify(&self, log: &LogEvent) -> Classification<'_> {
        match log.signature_topic() {
            Some(topic) => match self.by_topic.get(topic) {
                Some(sig) => Classification::Matched(sig),
                None => Classification::Unknown(*topic),
            },
            None => Classification::NoTopics,
        }
    }

    pub fn get(&self, topic: &H256) -> Option<&EventSignature> {
        self.by_topic.get(topic)
    }

    /// Topic hashes in registration order, for the `topics[0]` filter
    pub fn topics(&self) -> Vec<H256> {
        self.order.clone()
    }

    pub fn names(&self) -> Vec<&str> {
        self.order
            .iter()
            .filter_map(|t| self.by_topic.get(t))
            .map(|s| s.name.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_topic.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_topic.is_empty()
    }
}
