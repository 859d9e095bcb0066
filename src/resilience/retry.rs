use crate::errors::GatewayResult;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Configuration for retry behavior.
///
/// Fixed per deployment, never varied per call.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total number of attempts, including the first (minimum 1)
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_backoff: Duration,
    /// Ceiling on the computed delay
    pub max_backoff: Duration,
    /// Exponent applied per attempt
    pub backoff_multiplier: f64,
    /// Whether to add randomized jitter (disable for deterministic tests)
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Executes operations under a bounded retry policy with exponential backoff.
///
/// The operation receives the current attempt number (starting at 1) so it
/// can fetch a fresh client handle per attempt. Retry eligibility is decided
/// by [`GatewayError::is_retryable`](crate::errors::GatewayError::is_retryable);
/// errors that reach the caller are always already classified.
pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    /// Create a new retry executor with the given configuration
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Execute the given operation with retry logic
    pub async fn execute<F, Fut, T>(&self, operation: &str, mut f: F) -> GatewayResult<T>
    where
        F: FnMut(u32) -> Fut + Send,
        Fut: Future<Output = GatewayResult<T>> + Send,
        T: Send,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match f(attempt).await {
                Ok(result) => return Ok(result),
                Err(e) if !e.is_retryable() || attempt >= max_attempts => return Err(e),
                Err(e) => {
                    let delay = self.backoff_delay(attempt, e.retry_after());
                    warn!(
                        operation,
                        attempt = attempt + 1,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retry attempt {} of {}",
                        attempt + 1,
                        max_attempts
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Calculate the backoff delay for a given attempt (1-based)
    fn backoff_delay(&self, attempt: u32, server_retry_after: Option<Duration>) -> Duration {
        let base = self.config.initial_backoff.as_millis() as f64
            * self.config.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);
        let capped = base.min(self.config.max_backoff.as_millis() as f64);

        let with_jitter = if self.config.jitter {
            // +/- 25% around the computed delay.
            let jitter = (rand::random::<f64>() * 2.0 - 1.0) * 0.25 * capped;
            (capped + jitter).clamp(0.0, self.config.max_backoff.as_millis() as f64)
        } else {
            capped
        };

        let calculated = Duration::from_millis(with_jitter as u64);

        // Honor the server's retry-after when it asks for a longer wait.
        match server_retry_after {
            Some(server_delay) if server_delay > calculated => server_delay,
            _ => calculated,
        }
    }
}
