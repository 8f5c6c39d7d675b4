//! Bounded polling.
//!
//! Every "wait until X is ready" in the workflows (tunnel process alive,
//! database answering through the tunnel, replica set info readable) is
//! the same loop: probe, and on failure sleep a fixed interval, up to a
//! fixed number of attempts. [`RetryPolicy`] is that loop.

use crate::config::RetryConfig;
use crate::error::{ConnectError, Result};
use std::future::Future;
use tokio::time::sleep;
use tracing::debug;

/// Fixed-interval, bounded poll loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    /// Create a policy from configuration.
    #[must_use]
    pub const fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// The configuration.
    #[must_use]
    pub const fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Call `probe` until it yields a value or the budget runs out.
    ///
    /// `probe` receives the 1-based attempt number. Returns the value and
    /// the attempt that produced it. An always-failing probe is called
    /// exactly `max_attempts` times (at least once) with `interval` between
    /// calls and no sleep after the last.
    ///
    /// # Errors
    ///
    /// [`ConnectError::Exhausted`] when no attempt succeeded.
    pub async fn poll_for<T, F, Fut>(&self, mut probe: F) -> Result<(T, u32)>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Option<T>>,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;

            if let Some(value) = probe(attempt).await {
                debug!(attempt, "probe ready");
                return Ok((value, attempt));
            }

            if !self.config.should_retry(attempt) {
                debug!(attempt, "probe budget exhausted");
                return Err(ConnectError::exhausted(attempt));
            }

            debug!(attempt, interval_ms = self.config.interval.as_millis() as u64, "probe not ready, retrying");
            sleep(self.config.interval).await;
        }
    }

    /// [`poll_for`](Self::poll_for) for a yes/no probe. Returns the
    /// attempt number that succeeded.
    ///
    /// # Errors
    ///
    /// [`ConnectError::Exhausted`] when no attempt succeeded.
    pub async fn poll<F, Fut>(&self, mut probe: F) -> Result<u32>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = bool>,
    {
        let ((), attempt) = self
            .poll_for(|attempt| {
                let ready = probe(attempt);
                async move { ready.await.then_some(()) }
            })
            .await?;
        Ok(attempt)
    }
}
