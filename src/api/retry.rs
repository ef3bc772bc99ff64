use std::future::Future;
use std::time::Duration;

use crate::config::ExchangeSettings;
use crate::error::BotError;
use crate::Result;

/// Fixed-delay, capped retry of transient exchange errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(2),
        }
    }
}

impl From<&ExchangeSettings> for RetryPolicy {
    fn from(settings: &ExchangeSettings) -> Self {
        Self {
            max_attempts: settings.max_retries.max(1),
            delay: settings.retry_delay(),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::ZERO,
        }
    }

    /// Retry `op` while it fails with a transient error
    pub async fn run<T, F, Fut>(&self, what: &str, op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.run_if(what, BotError::is_transient, op).await
    }

    /// Order submissions: a timeout may mean the order landed, so only retry
    /// errors where the exchange definitely did not accept it.
    pub async fn run_order<T, F, Fut>(&self, what: &str, op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.run_if(
            what,
            |e| matches!(e, BotError::RateLimited(_) | BotError::Exchange { .. }) && e.is_transient(),
            op,
        )
        .await
    }

    pub async fn run_if<T, F, Fut, P>(&self, what: &str, should_retry: P, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
        P: Fn(&BotError) -> bool,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < max_attempts && should_retry(&e) => {
                    tracing::warn!(
                        "{} failed: {}, retrying in {:?} (attempt {}/{})",
                        what,
                        e,
                        self.delay,
                        attempt,
                        max_attempts
                    );
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
