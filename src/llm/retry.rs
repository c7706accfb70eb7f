use std::future::Future;
use std::time::Duration;

use crate::llm::LlmError;

/// Total attempts per call, including the first
pub const MAX_ATTEMPTS: u32 = 3;
/// Delay before the first retry; doubles after each rate-limited attempt
pub const INITIAL_BACKOFF: Duration = Duration::from_secs(2);

/// Run `op` with the shared retry policy: retry only on a rate-limit signal,
/// with exponentially doubling delays, and propagate the last error once the
/// attempt budget is spent. Any other error fails immediately.
pub async fn with_backoff<T, F, Fut>(label: &str, op: F) -> Result<T, LlmError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
{
    retry_with(MAX_ATTEMPTS, INITIAL_BACKOFF, label, op).await
}

/// Policy core with explicit knobs, used directly by the timing tests.
pub async fn retry_with<T, F, Fut>(
    max_attempts: u32,
    initial_delay: Duration,
    label: &str,
    mut op: F,
) -> Result<T, LlmError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
{
    let mut delay = initial_delay;
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(LlmError::RateLimited) if attempt < max_attempts => {
                tracing::warn!(
                    "{label}: rate limited, retrying in {delay:?} (attempt {attempt}/{max_attempts})"
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
            Err(e) => return Err(e),
        }
    }
}
