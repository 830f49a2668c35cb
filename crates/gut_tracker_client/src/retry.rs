use rand::{RngExt, rng};
use std::time::Duration;

/// Exponential backoff with jitter for idempotent repository reads.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    pub async fn retry_async<F, Fut, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        self.retry_async_if(f, |_| true).await
    }

    /// Retry only while `should_retry` accepts the error; anything else is
    /// returned immediately.
    pub async fn retry_async_if<F, Fut, T, E, P>(&self, mut f: F, should_retry: P) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
    {
        let mut attempt = 0u32;
        loop {
            match f().await {
                Ok(v) => return Ok(v),
                Err(e) => {
                    attempt += 1;
                    if attempt > self.max_retries || !should_retry(&e) {
                        return Err(e);
                    }
                    let max_delay = self.base_delay * (1u32 << attempt.min(16));
                    let max_ms = max_delay.as_millis() as u64;
                    let delay = if max_ms == 0 {
                        Duration::ZERO
                    } else {
                        Duration::from_millis(rng().random_range(0..max_ms))
                    };
                    tracing::debug!(attempt, ?delay, "retrying repository request");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
