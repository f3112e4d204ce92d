//! Boundary around external provider calls.
//!
//! Every embedding or completion request goes through a [`RetryPolicy`]:
//! each attempt is bounded by a timeout, and transient failures
//! ([`RagError::is_transient`]) are retried after a fixed delay until
//! `max_attempts` is reached. Non-transient errors are returned at once.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::config::RetryConfig;
use crate::error::{RagError, Result};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub delay: Duration,
    pub timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(retry: &RetryConfig, timeout_secs: u64) -> Self {
        Self {
            max_attempts: retry.max_attempts.max(1),
            delay: Duration::from_millis(retry.delay_ms),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// A single attempt with no retry, bounded by `timeout`.
    pub fn once(timeout: Duration) -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::ZERO,
            timeout,
        }
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match with_timeout(self.timeout, op()).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    warn!(
                        "{} failed (attempt {}/{}): {}; retrying in {:?}",
                        what, attempt, self.max_attempts, e, self.delay
                    );
                    attempt += 1;
                    tokio::time::sleep(self.delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Bound `fut` by `limit`; expiry becomes [`RagError::ProviderTimeout`].
pub async fn with_timeout<T, Fut>(limit: Duration, fut: Fut) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(RagError::ProviderTimeout(limit.as_secs())),
    }
}
