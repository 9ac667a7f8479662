//! Supervised restart of subscription loops
//!
//! A loop that fails with a restartable error is run again after an
//! exponential backoff, up to `max_restarts` times in a row. A run that stays
//! up for at least `max_backoff_ms` counts as healthy and clears both the
//! restart count and the backoff. `max_restarts = 0` makes the first failure
//! fatal.

use config::RestartConfig;
use network::ShutdownSignal;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::error::WatcherError;

/// Backoff doubling caps at 2^6
const MAX_BACKOFF_EXPONENT: u32 = 6;

#[derive(Debug, Clone)]
pub struct Backoff {
    base_ms: u64,
    max_ms: u64,
    exponent: u32,
}

impl Backoff {
    pub fn new(base_ms: u64, max_ms: u64) -> Self {
        Self {
            base_ms,
            max_ms,
            exponent: 0,
        }
    }

    /// `base * 2^n` capped at `max`; `n` grows with each call.
    pub fn next_delay(&mut self) -> Duration {
        let delay_ms = self
            .base_ms
            .saturating_mul(2u64.saturating_pow(self.exponent))
            .min(self.max_ms);
        self.exponent = (self.exponent + 1).min(MAX_BACKOFF_EXPONENT);
        Duration::from_millis(delay_ms)
    }

    pub fn reset(&mut self) {
        self.exponent = 0;
    }
}

pub struct Supervisor {
    feed: &'static str,
    max_restarts: u32,
    backoff: Backoff,
    /// A run that lasted this long resets the backoff and the restart count
    healthy_after: Duration,
    shutdown: ShutdownSignal,
}

impl Supervisor {
    pub fn new(feed: &'static str, policy: &RestartConfig, shutdown: ShutdownSignal) -> Self {
        Self {
            feed,
            max_restarts: policy.max_restarts,
            backoff: Backoff::new(policy.base_backoff_ms, policy.max_backoff_ms),
            healthy_after: Duration::from_millis(policy.max_backoff_ms),
            shutdown,
        }
    }

    /// Drive `run` until it returns `Ok`, fails with a non-restartable error,
    /// shutdown is triggered, or the restart budget is spent.
    pub async fn run<F, Fut>(mut self, mut run: F) -> Result<(), WatcherError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), WatcherError>>,
    {
        let mut restarts = 0u32;
        loop {
            let started = Instant::now();
            let err = match run().await {
                Ok(()) => return Ok(()),
                Err(err) => err,
            };

            if self.shutdown.is_triggered() {
                return Ok(());
            }
            if !err.is_restartable() {
                error!(feed = self.feed, "❌ {}", err);
                return Err(err);
            }
            if started.elapsed() >= self.healthy_after {
                restarts = 0;
                self.backoff.reset();
            }
            if restarts >= self.max_restarts {
                error!(feed = self.feed, restarts, "❌ Restart budget exhausted: {}", err);
                return Err(WatcherError::RestartsExhausted {
                    feed: self.feed,
                    restarts,
                    last: Box::new(err),
                });
            }

            let delay = self.backoff.next_delay();
            restarts += 1;
            warn!(
                feed = self.feed,
                attempt = restarts,
                max = self.max_restarts,
                "⚠️ {}; restarting in {}ms",
                err,
                delay.as_millis()
            );

            tokio::select! {
                _ = self.shutdown.cancelled() => return Ok(()),
                _ = tokio::time::sleep(delay) => {}
            }
            info!(feed = self.feed, attempt = restarts, "🔄 Restarting");
        }
    }
}
