use rand::Rng;
use std::future::Future;
use tokio::time::{sleep, Duration};

use crate::logging::{log, obj, v_str, Domain, Level};

/// Retry configuration
#[derive(Clone, Debug)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 100,
            max_delay_ms: 2000,
            jitter_factor: 0.3,
        }
    }
}

impl RetryConfig {
    /// Exponential backoff with jitter
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.base_delay_ms as f64 * 2.0_f64.powi(attempt as i32);
        let clamped = base.min(self.max_delay_ms as f64);

        let jitter_range = clamped * self.jitter_factor;
        let jitter: f64 = if jitter_range > 0.0 {
            rand::thread_rng().gen_range(-jitter_range..=jitter_range)
        } else {
            0.0
        };
        let final_delay = (clamped + jitter).max(0.0);

        Duration::from_millis(final_delay as u64)
    }
}

/// Outcome of one attempt: permanent failures stop the loop early.
#[derive(Debug)]
pub enum Attempt<T, E> {
    Done(T),
    Retry(E),
    Fail(E),
}

/// Retry a fallible async operation with exponential backoff.
///
/// Only for idempotent reads; the operation decides which failures are worth
/// another attempt.
pub async fn retry_async<F, Fut, T, E>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Attempt<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Attempt::Done(result) => return Ok(result),
            Attempt::Fail(e) => return Err(e),
            Attempt::Retry(e) if attempt >= config.max_retries => return Err(e),
            Attempt::Retry(e) => {
                let delay = config.delay_for_attempt(attempt);
                log(
                    Level::Debug,
                    Domain::Backend,
                    "retry",
                    obj(&[
                        ("operation", v_str(operation_name)),
                        ("attempt", serde_json::json!(attempt + 1)),
                        ("max_attempts", serde_json::json!(config.max_retries + 1)),
                        ("error", v_str(&e.to_string())),
                        ("delay_ms", serde_json::json!(delay.as_millis() as u64)),
                    ]),
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Categorize HTTP statuses for retry decisions
pub fn is_retryable_http_error(status: u16) -> bool {
    matches!(status,
        408 |   // Request Timeout
        429 |   // Too Many Requests
        500 |   // Internal Server Error
        502 |   // Bad Gateway
        503 |   // Service Unavailable
        504     // Gateway Timeout
    )
}

/// Categorize network errors
pub fn is_retryable_network_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
