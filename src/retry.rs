//! Retry and health-check policies for exchange calls.

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};

/// Re-run a failing operation up to `max_attempts` times with a fixed delay.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run `op` until it succeeds or attempts run out; the last error is returned.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_attempts => {
                    tracing::warn!(
                        label,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = self.delay.as_millis() as u64,
                        error = %e,
                        "Attempt failed, retrying"
                    );
                    tokio::time::sleep(self.delay).await;
                }
                Err(e) => {
                    return Err(e).with_context(|| {
                        format!("{} failed after {} attempts", label, attempt)
                    });
                }
            }
        }
    }
}

/// Probe the exchange before doing real work.
#[derive(Debug, Clone, Copy)]
pub struct HealthCheck {
    max_attempts: u32,
    delay: Duration,
}

impl Default for HealthCheck {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(5))
    }
}

impl HealthCheck {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Succeeds on the first healthy probe; errors once every attempt failed.
    pub async fn ensure_healthy<F, Fut>(&self, mut probe: F) -> Result<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match probe().await {
                Ok(()) => {
                    tracing::info!(attempt, "Exchange health check passed");
                    return Ok(());
                }
                Err(e) if attempt < self.max_attempts => {
                    tracing::warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "Health check failed, waiting before retry"
                    );
                    tokio::time::sleep(self.delay).await;
                }
                Err(e) => {
                    tracing::error!(attempt, error = %e, "Exchange unhealthy after all attempts");
                    return Err(e).context("exchange health check failed");
                }
            }
        }
    }
}
