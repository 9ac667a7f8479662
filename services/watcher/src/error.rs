//! Watcher error types

use network::ChainError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WatcherError {
    /// Fatal to one receive loop; surfaced to the owner
    #[error("{feed} subscription failed: {source}")]
    Subscription {
        feed: &'static str,
        #[source]
        source: ChainError,
    },

    #[error("{feed} gave up after {restarts} restarts: {last}")]
    RestartsExhausted {
        feed: &'static str,
        restarts: u32,
        last: Box<WatcherError>,
    },

    /// The consumer dropped its receiver
    #[error("{feed} output channel closed")]
    ChannelClosed { feed: &'static str },

    #[error("{feed} task failed: {message}")]
    TaskFailed { feed: &'static str, message: String },
}

impl WatcherError {
    pub fn subscription(feed: &'static str, source: ChainError) -> Self {
        Self::Subscription { feed, source }
    }

    /// Worth restarting under supervision
    pub fn is_restartable(&self) -> bool {
        matches!(self, Self::Subscription { .. })
    }
}
