//! Retry Engine (§4.I): a single generic backoff loop reused for both LLM
//! and embedding provider calls, since both only differ in error type.

use rag_model::Retryable;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

const MAX_DELAY: Duration = Duration::from_secs(10);

/// Retries `operation` up to `max_attempts` times total. Errors classified
/// as non-retryable (per [`Retryable::is_retryable`]) are rethrown
/// immediately without consuming an attempt's delay.
pub async fn retry<F, Fut, T, E>(mut operation: F, max_attempts: u32, initial_delay: Duration) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable,
{
    let mut delay = initial_delay;
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !err.is_retryable() || attempt >= max_attempts {
                    return Err(err);
                }
                debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying after a retryable failure");
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
}
