use crate::errors::{is_lock_contention, is_unique_violation, ServiceError};
use metrics::counter;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total number of attempts, the first one included
    pub max_attempts: u32,
    /// Lower bound of the random wait between attempts
    pub min_delay: Duration,
    /// Upper bound of the random wait between attempts
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            min_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
        }
    }
}

impl RetryConfig {
    /// Picks a uniformly random delay in `[min_delay, max_delay]`.
    pub fn next_delay(&self) -> Duration {
        let low = self.min_delay.as_millis() as u64;
        let high = (self.max_delay.as_millis() as u64).max(low);
        Duration::from_millis(rand::thread_rng().gen_range(low..=high))
    }
}

/// Retry policy for determining if an error is retryable
pub trait RetryPolicy<E> {
    fn is_retryable(&self, error: &E) -> bool;
}

/// Retries unique-constraint violations and lock contention.
///
/// Used for writes that read before inserting: a concurrent writer either
/// takes the same key or holds the write lock when the upgrade is attempted.
pub struct WriteConflictPolicy;

impl RetryPolicy<sea_orm::DbErr> for WriteConflictPolicy {
    fn is_retryable(&self, error: &sea_orm::DbErr) -> bool {
        is_unique_violation(error) || is_lock_contention(error)
    }
}

impl RetryPolicy<ServiceError> for WriteConflictPolicy {
    fn is_retryable(&self, error: &ServiceError) -> bool {
        error.is_write_conflict()
    }
}

/// Execute an async operation, retrying the errors accepted by `policy`.
///
/// The last error is returned unchanged once attempts are exhausted.
pub async fn with_retry<F, Fut, T, E, P>(
    config: &RetryConfig,
    policy: &P,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: RetryPolicy<E>,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation(attempt).await {
            Ok(result) => {
                if attempt > 1 {
                    debug!(attempt, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(error) => {
                if attempt >= config.max_attempts || !policy.is_retryable(&error) {
                    if attempt > 1 {
                        warn!(attempt, error = %error, "Operation failed after retries");
                    }
                    return Err(error);
                }

                let delay = config.next_delay();
                warn!(attempt, error = %error, delay_ms = delay.as_millis() as u64, "Retryable failure, retrying");
                counter!("gespack_retry.attempts", 1);
                sleep(delay).await;
            }
        }
    }
}
