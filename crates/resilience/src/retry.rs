// crates/resilience/src/retry.rs
//! Doubling backoff for background work

use crate::error::{ResilienceError, ResilienceResult};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Longest wait between two attempts, however many retries came before
pub const MAX_BACKOFF: Duration = Duration::from_secs(60 * 60);

/// How many times to run a job and how long to wait in between
///
/// The wait before retry `n` (1-based) is `initial_backoff * 2^(n-1)`,
/// capped at [`MAX_BACKOFF`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: usize,
    initial_backoff: Duration,
}

impl RetryPolicy {
    /// One first run plus `max_retries` retries
    pub fn with_retries(max_retries: usize, initial_backoff: Duration) -> Self {
        Self {
            max_attempts: max_retries.saturating_add(1),
            initial_backoff,
        }
    }

    pub fn validate(&self) -> ResilienceResult<()> {
        if self.max_attempts > 1 && self.initial_backoff.is_zero() {
            return Err(ResilienceError::InvalidPolicy(
                "retries need a non-zero backoff".to_string(),
            ));
        }
        if self.initial_backoff > MAX_BACKOFF {
            return Err(ResilienceError::InvalidPolicy(format!(
                "backoff of {:?} exceeds the {:?} cap",
                self.initial_backoff, MAX_BACKOFF
            )));
        }
        Ok(())
    }

    /// Wait before `attempt`, where 0 is the first run
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let doublings = u32::try_from(attempt - 1).unwrap_or(u32::MAX).min(31);
        self.initial_backoff
            .checked_mul(1u32 << doublings)
            .map_or(MAX_BACKOFF, |delay| delay.min(MAX_BACKOFF))
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub fn initial_backoff(&self) -> Duration {
        self.initial_backoff
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::with_retries(3, Duration::from_secs(30))
    }
}

/// Runs `operation` until it succeeds or the policy runs out of attempts
///
/// The closure receives the zero-based attempt number and the task sleeps
/// [`RetryPolicy::delay_for_attempt`] before each retry.
pub async fn with_retry<F, Fut, T, E>(policy: &RetryPolicy, mut operation: F) -> ResilienceResult<T>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut last_error = String::new();

    for attempt in 0..policy.max_attempts() {
        let delay = policy.delay_for_attempt(attempt);
        if !delay.is_zero() {
            log::debug!("Retry {} in {:?}", attempt, delay);
            tokio::time::sleep(delay).await;
        }

        match operation(attempt).await {
            Ok(result) => return Ok(result),
            Err(e) => last_error = e.to_string(),
        }
    }

    Err(ResilienceError::RetriesExhausted {
        attempts: policy.max_attempts(),
        last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_three_retries_from_thirty_seconds() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 4);
        assert_eq!(policy.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(30));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(60));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(120));
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy::with_retries(100, Duration::from_secs(30));
        assert_eq!(policy.delay_for_attempt(7), Duration::from_secs(1920));
        assert_eq!(policy.delay_for_attempt(8), MAX_BACKOFF);
        assert_eq!(policy.delay_for_attempt(99), MAX_BACKOFF);
    }

    #[test]
    fn test_no_retries_needs_no_backoff() {
        let policy = RetryPolicy::with_retries(0, Duration::ZERO);
        assert_eq!(policy.max_attempts(), 1);
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_invalid_policies() {
        assert!(RetryPolicy::with_retries(2, Duration::ZERO).validate().is_err());
        assert!(RetryPolicy::with_retries(2, Duration::from_secs(2 * 60 * 60))
            .validate()
            .is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_retry_success_first_attempt() {
        let policy = RetryPolicy::default();
        let mut calls = 0;

        let result = with_retry(&policy, |_| {
            calls += 1;
            async { Ok::<_, String>(42) }
        })
        .await;

        assert_eq!(result, Ok(42));
        assert_eq!(calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_retry_success_after_failures() {
        let policy = RetryPolicy::with_retries(2, Duration::from_secs(30));
        let started = tokio::time::Instant::now();
        let mut seen = Vec::new();

        let result = with_retry(&policy, |attempt| {
            seen.push(attempt);
            async move {
                if attempt < 2 {
                    Err("backend unreachable")
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(2));
        assert_eq!(seen, vec![0, 1, 2]);
        // 30 s before the second attempt, 60 s before the third
        assert!(started.elapsed() >= Duration::from_secs(90));
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_retry_reports_last_error() {
        let policy = RetryPolicy::with_retries(2, Duration::from_millis(1));
        let mut calls = 0;

        let result = with_retry(&policy, |attempt| {
            calls += 1;
            async move { Err::<i32, _>(format!("attempt {} failed", attempt)) }
        })
        .await;

        assert_eq!(calls, 3);
        assert_eq!(
            result,
            Err(ResilienceError::RetriesExhausted {
                attempts: 3,
                last_error: "attempt 2 failed".to_string(),
            })
        );
    }
}
