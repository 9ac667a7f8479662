//! Nonce reuse guard for one signer
//!
//! The pending nonce from the node is authoritative. The tracker only
//! remembers the last accepted bundle so that a second build cannot reuse
//! its nonces while that bundle may still land.

use parking_lot::Mutex;
use std::ops::Range;
use types::SignedBundle;

use crate::error::BuildError;

#[derive(Debug, Clone, PartialEq, Eq)]
struct InFlight {
    nonces: Range<u64>,
    target_block: u64,
}

#[derive(Debug, Default)]
pub struct NonceTracker {
    in_flight: Mutex<Option<InFlight>>,
}

impl NonceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check a freshly fetched pending nonce against the in-flight bundle.
    ///
    /// Once `head` reaches the old target, the block it was meant for exists;
    /// if the pending nonce has not moved past it, the bundle did not land
    /// and its nonces are free again.
    pub fn check(&self, pending: u64, head: u64) -> Result<(), BuildError> {
        let guard = self.in_flight.lock();
        match &*guard {
            Some(prev) if head < prev.target_block && pending < prev.nonces.end => {
                Err(BuildError::NonceConflict {
                    pending,
                    start: prev.nonces.start,
                    end: prev.nonces.end,
                    target_block: prev.target_block,
                    head,
                })
            }
            _ => Ok(()),
        }
    }

    /// Remember an accepted bundle.
    pub fn record(&self, bundle: &SignedBundle) {
        let nonces = bundle.nonces();
        let (Some(first), Some(last)) = (nonces.first(), nonces.last()) else {
            return;
        };
        *self.in_flight.lock() = Some(InFlight {
            nonces: *first..*last + 1,
            target_block: bundle.target_block,
        });
    }
}
