//! Subscription handles
//!
//! A subscription is a bounded item channel plus a one-shot error side
//! channel. The producer sets the error before closing the item channel, so a
//! consumer that drains items until `None` always finds out why the feed ended.

use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::ChainError;

/// Upper bound on waiting for the forwarding task after an unsubscribe
const UNSUBSCRIBE_GRACE: Duration = Duration::from_secs(2);

/// Producer half, held by whatever feeds the subscription
pub struct SubscriptionSink<T> {
    pub items: mpsc::Sender<T>,
    pub errors: oneshot::Sender<ChainError>,
    pub stop: oneshot::Receiver<()>,
}

impl<T> SubscriptionSink<T> {
    /// Report a fatal error and close the feed.
    pub fn fail(self, error: ChainError) {
        let _ = self.errors.send(error);
    }
}

#[derive(Debug)]
pub struct Subscription<T> {
    kind: &'static str,
    items: mpsc::Receiver<T>,
    errors: Option<oneshot::Receiver<ChainError>>,
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl<T> Subscription<T> {
    /// Create a connected handle / sink pair with `buffer` slots.
    pub fn channel(kind: &'static str, buffer: usize) -> (Self, SubscriptionSink<T>) {
        let (items_tx, items_rx) = mpsc::channel(buffer.max(1));
        let (errors_tx, errors_rx) = oneshot::channel();
        let (stop_tx, stop_rx) = oneshot::channel();

        let handle = Self {
            kind,
            items: items_rx,
            errors: Some(errors_rx),
            stop: Some(stop_tx),
            task: None,
        };
        let sink = SubscriptionSink {
            items: items_tx,
            errors: errors_tx,
            stop: stop_rx,
        };
        (handle, sink)
    }

    /// Attach the task that drives the sink so `unsubscribe` can wait for it.
    pub fn with_task(mut self, task: JoinHandle<()>) -> Self {
        self.task = Some(task);
        self
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Next item, or the error that ended the feed.
    ///
    /// Cancel-safe: usable as a `tokio::select!` branch.
    pub async fn recv(&mut self) -> Result<T, ChainError> {
        if let Some(item) = self.items.recv().await {
            return Ok(item);
        }
        let closed = ChainError::SubscriptionClosed { kind: self.kind };
        let error = match self.errors.as_mut() {
            Some(rx) => rx.await.unwrap_or(closed),
            None => closed,
        };
        self.errors = None;
        Err(error)
    }

    /// Stop the feed and release the underlying subscription.
    pub async fn unsubscribe(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        // unblocks a producer parked on a full buffer
        self.items.close();

        if let Some(task) = self.task.take() {
            let abort = task.abort_handle();
            if tokio::time::timeout(UNSUBSCRIBE_GRACE, task).await.is_err() {
                warn!(kind = self.kind, "Subscription task did not stop in time, aborting");
                abort.abort();
            }
        }
        debug!(kind = self.kind, "Unsubscribed");
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}
