use super::error::QueryError;
use crate::api::ApiError;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Retries an async operation with a fixed delay between attempts
///
/// # Parameters
/// - `operation`: Closure returning a future
/// - `retries`: Number of retry attempts (total runs = 1 initial + retries)
/// - `delay`: Pause between attempts
///
/// # Returns
/// Either the successful result or `RetriesExhausted` carrying the last failure
pub async fn with_retry<F, Fut, T>(
    mut operation: F,
    retries: u32,
    delay: Duration,
) -> Result<T, QueryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(err) => {
                if attempt > retries {
                    return Err(QueryError::RetriesExhausted {
                        attempts: attempt,
                        last: err,
                    });
                }
                debug!(
                    "Attempt {}/{} failed: {}. Retrying...",
                    attempt,
                    retries + 1,
                    err
                );
                attempt += 1;
                tokio::time::sleep(delay).await;
            }
        }
    }
}
