//! Exponential back-off with jitter for source HTTP calls.

use std::future::Future;
use std::time::Duration;

use crate::error::SourceError;

const MAX_DELAY_MS: u64 = 60_000;

/// Transient failures: network errors, timeouts, HTTP 429 and 5xx.
///
/// Authentication, deserialization and 4xx failures are returned at once.
pub(crate) fn is_retriable(err: &SourceError) -> bool {
    match err {
        SourceError::Http(e) => {
            e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
        }
        SourceError::RateLimited { .. } | SourceError::Timeout { .. } => true,
        SourceError::UnexpectedStatus { status, .. } => *status >= 500,
        _ => false,
    }
}

/// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`,
/// capped at 60 s.
pub(crate) fn backoff_delay_ms(backoff_base_ms: u64, attempt: u32) -> u64 {
    backoff_base_ms
        .saturating_mul(1u64 << attempt.saturating_sub(1).min(10))
        .min(MAX_DELAY_MS)
}

/// Runs `operation` with up to `max_retries` additional attempts on transient
/// errors, sleeping `base * 2^n` ms ± 25% between attempts.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, SourceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SourceError>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                let capped = backoff_delay_ms(backoff_base_ms, attempt);
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    clippy::cast_precision_loss
                )]
                let delay_ms = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms,
                    error = %err,
                    "transient source error, retrying after back-off"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}
