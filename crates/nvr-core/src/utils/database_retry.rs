//! Database retry utilities for handling transient failures.
//!
//! Retry mechanism for repository operations, with exponential backoff and
//! configurable policies (reused verbatim from the teacher's shape, adapted
//! to classify `sea_orm::DbErr` instead of `sqlx::Error`).

use crate::errors::{RepositoryError, RepositoryResult};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Configuration for database retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_attempts: u32,
    /// Initial delay before first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Create a conservative retry policy for read operations
    pub fn for_reads() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_millis(500),
            backoff_multiplier: 1.5,
            jitter: true,
        }
    }

    /// Create a more aggressive retry policy for write operations
    pub fn for_writes() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(3),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }

    /// Create a minimal retry policy for critical operations
    pub fn for_critical() -> Self {
        Self {
            max_attempts: 7,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }
}

/// Execute a database operation with retry logic
pub async fn with_retry<T, F, Fut>(
    config: &RetryConfig,
    mut operation: F,
    operation_name: &str,
) -> RepositoryResult<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = RepositoryResult<T>>,
{
    let mut last_error = None;

    for attempt in 1..=config.max_attempts {
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    debug!(
                        "Database operation '{}' succeeded on attempt {}/{}",
                        operation_name, attempt, config.max_attempts
                    );
                }
                return Ok(result);
            }
            Err(err) => {
                let should_retry = is_retryable_error(&err);

                if !should_retry {
                    debug!(
                        "Database operation '{}' failed with non-retryable error: {}",
                        operation_name, err
                    );
                    return Err(err);
                }

                last_error = Some(err);

                if attempt < config.max_attempts {
                    let delay = calculate_delay(config, attempt);

                    warn!(
                        "Database operation '{}' failed on attempt {}/{}, retrying in {:?}: {}",
                        operation_name,
                        attempt,
                        config.max_attempts,
                        delay,
                        last_error.as_ref().unwrap()
                    );

                    sleep(delay).await;
                } else {
                    warn!(
                        "Database operation '{}' failed after {} attempts: {}",
                        operation_name,
                        config.max_attempts,
                        last_error.as_ref().unwrap()
                    );
                }
            }
        }
    }

    Err(last_error.unwrap())
}

/// Determine if an error is worth retrying. `sea_orm::DbErr` doesn't expose a
/// structured "is this a lock/busy condition" variant across backends, so
/// this falls back to the same message-pattern match the teacher used for
/// its `sqlx::Error` source.
fn is_retryable_error(error: &RepositoryError) -> bool {
    match error {
        RepositoryError::Database(db_err) => {
            let msg = db_err.to_string().to_lowercase();
            msg.contains("database is locked")
                || msg.contains("database is busy")
                || msg.contains("connection reset")
                || msg.contains("pool timed out")
                || msg.contains("pool closed")
                || msg.contains("timeout")
        }
        // Record-not-found, constraint violations and serialization failures
        // are never transient.
        _ => false,
    }
}

/// Calculate delay with exponential backoff and optional jitter
fn calculate_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let exponential_delay =
        config.initial_delay.as_millis() as f64 * config.backoff_multiplier.powi((attempt - 1) as i32);

    let delay_ms = exponential_delay.min(config.max_delay.as_millis() as f64) as u64;

    let final_delay = if config.jitter {
        let jitter_range = (delay_ms / 4).max(10);
        delay_ms + super::jitter::generate_jitter_ms(jitter_range)
    } else {
        delay_ms
    };

    Duration::from_millis(final_delay)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calculate_delay_respects_max() {
        let config = RetryConfig {
            max_attempts: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(300),
            backoff_multiplier: 3.0,
            jitter: false,
        };
        assert_eq!(calculate_delay(&config, 1), Duration::from_millis(100));
        assert_eq!(calculate_delay(&config, 3), Duration::from_millis(300));
    }

    #[tokio::test]
    async fn with_retry_returns_first_success() {
        let config = RetryConfig::for_reads();
        let result: RepositoryResult<i32> = with_retry(&config, || async { Ok(42) }, "noop").await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn with_retry_does_not_retry_record_not_found() {
        use std::sync::atomic::{AtomicU32, Ordering};
        let calls = AtomicU32::new(0);
        let config = RetryConfig::for_reads();
        let result: RepositoryResult<i32> = with_retry(
            &config,
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(RepositoryError::RecordNotFound {
                        table: "streams".into(),
                        field: "name".into(),
                        value: "cam1".into(),
                    })
                }
            },
            "find_by_id",
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
