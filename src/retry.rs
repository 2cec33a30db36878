//! Bounded retry with exponential backoff.
//!
//! `with_retry` is error-type-agnostic: every failure from the wrapped
//! operation is retried until the attempt budget is spent. Non-retriable
//! conditions (denylisted interaction content, unknown branch/version) must
//! be raised *before* entering the retried body; the capture orchestrator
//! validates interaction scripts up front for exactly this reason.

use std::fmt;
use std::thread;
use std::time::Duration;

/// Retry budget and backoff bounds for one wrapped operation.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Number of retries after the initial attempt (total invocations = max_retries + 1)
    pub max_retries: u32,
    /// Base backoff delay, doubled per attempt
    pub base_delay: Duration,
    /// Backoff cap
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Policy from the capture settings.
    pub fn from_config(settings: &crate::config::CaptureSettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            base_delay: Duration::from_millis(settings.retry_base_ms),
            max_delay: Duration::from_millis(settings.retry_max_ms),
        }
    }

    /// Policy with no sleeping, for tests.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Backoff before retry number `attempt` (0-based): min(base * 2^attempt, cap). No jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&crate::config::CaptureSettings::defaults())
    }
}

/// Aggregated error raised once the retry budget is exhausted.
#[derive(Debug)]
pub struct RetryError {
    /// Total invocations performed
    pub attempts: u32,
    /// Message of the final underlying failure
    pub last_error: String,
}

impl fmt::Display for RetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Operation failed after {} attempts: {}",
            self.attempts, self.last_error
        )
    }
}

impl std::error::Error for RetryError {}

/// Invoke `op` until it succeeds or the policy's budget is spent.
///
/// An operation failing `k <= max_retries` times and then succeeding is
/// invoked exactly `k + 1` times; one that always fails is invoked
/// `max_retries + 1` times and yields a single [`RetryError`] embedding the
/// final failure message.
pub fn with_retry<T, E, F>(policy: &RetryPolicy, mut op: F) -> Result<T, RetryError>
where
    E: fmt::Display,
    F: FnMut() -> Result<T, E>,
{
    let total = policy.max_retries + 1;
    let mut last_error = String::new();

    for attempt in 0..total {
        match op() {
            Ok(value) => return Ok(value),
            Err(err) => {
                last_error = err.to_string();
                if attempt + 1 < total {
                    let delay = policy.backoff(attempt);
                    if !delay.is_zero() {
                        thread::sleep(delay);
                    }
                }
            }
        }
    }

    Err(RetryError {
        attempts: total,
        last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_first_try() {
        let mut calls = 0;
        let result: Result<i32, RetryError> = with_retry(&RetryPolicy::immediate(3), || {
            calls += 1;
            Ok::<_, String>(42)
        });
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_fail_k_then_succeed() {
        let mut calls = 0;
        let result = with_retry(&RetryPolicy::immediate(3), || {
            calls += 1;
            if calls <= 2 {
                Err("transient".to_string())
            } else {
                Ok(calls)
            }
        });
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_exhaustion_counts_and_message() {
        let mut calls = 0;
        let result: Result<(), RetryError> = with_retry(&RetryPolicy::immediate(2), || {
            calls += 1;
            Err::<(), _>(format!("boom {}", calls))
        });
        let err = result.unwrap_err();
        assert_eq!(calls, 3);
        assert_eq!(err.attempts, 3);
        assert!(err.last_error.contains("boom 3"));
        assert!(err.to_string().contains("after 3 attempts"));
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
        };
        assert_eq!(policy.backoff(0), Duration::from_millis(100));
        assert_eq!(policy.backoff(1), Duration::from_millis(200));
        assert_eq!(policy.backoff(2), Duration::from_millis(350));
        assert_eq!(policy.backoff(30), Duration::from_millis(350));
    }
}
