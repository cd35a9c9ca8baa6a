//! # Generic Retry Executor
//! Retries an async operation with deterministic exponential backoff.
//!
//! The delay curve is intentionally jitter-free so tests can assert exact
//! values: retry `n` waits `min(base * 2^(n-1), max)`.

use std::future::Future;

use metrics::counter;
use tokio::time::{sleep, Duration, Instant};

use crate::error::JobError;

/// Invoked before each backoff sleep with `(error, retry_number, delay_ms)`.
pub type RetryHook<'a> = &'a mut (dyn FnMut(&JobError, u32, u64) + Send);

#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
        }
    }
}

/// Outcome of a successful (possibly retried) operation.
#[derive(Debug, Clone)]
pub struct RetryOutcome<T> {
    pub result: T,
    /// Total invocations of the operation, `>= 1`.
    pub attempt_count: u32,
    /// `attempt_count - 1`.
    pub retry_count: u32,
    pub total_elapsed_ms: u64,
    /// Whether any attempt failed along the way.
    pub exception_occurred: bool,
}

/// Backoff delay for retry number `retry` (1-based), in milliseconds.
pub fn backoff_delay_ms(retry: u32, cfg: &RetryConfig) -> u64 {
    let shift = retry.saturating_sub(1).min(62);
    cfg.base_delay_ms
        .saturating_mul(1u64 << shift)
        .min(cfg.max_delay_ms)
}

/// Run `op`, retrying retryable failures up to `cfg.max_retries` times.
///
/// Errors marked non-retryable abort immediately; once the budget is spent
/// the last error is returned. The operation runs at most
/// `cfg.max_retries + 1` times.
pub async fn execute_with_retry<T, F, Fut>(
    mut op: F,
    cfg: &RetryConfig,
    mut on_retry: Option<RetryHook<'_>>,
) -> Result<RetryOutcome<T>, JobError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, JobError>>,
{
    let started = Instant::now();
    let mut attempt: u32 = 1;

    loop {
        match op().await {
            Ok(result) => {
                return Ok(RetryOutcome {
                    result,
                    attempt_count: attempt,
                    retry_count: attempt - 1,
                    total_elapsed_ms: started.elapsed().as_millis() as u64,
                    exception_occurred: attempt > 1,
                });
            }
            Err(err) => {
                if !err.is_retryable() || attempt > cfg.max_retries {
                    return Err(err);
                }
                let delay_ms = backoff_delay_ms(attempt, cfg);
                counter!("job_retries_total").increment(1);
                tracing::warn!(
                    kind = err.kind(),
                    retry = attempt,
                    delay_ms,
                    error = %err,
                    "retrying after failure"
                );
                if let Some(hook) = on_retry.as_mut() {
                    hook(&err, attempt, delay_ms);
                }
                sleep(Duration::from_millis(delay_ms)).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_curve_is_exponential() {
        let cfg = RetryConfig::default();
        let delays: Vec<u64> = (1..=4).map(|n| backoff_delay_ms(n, &cfg)).collect();
        assert_eq!(delays, [1_000, 2_000, 4_000, 8_000]);
    }

    #[test]
    fn delay_curve_caps_at_max() {
        let cfg = RetryConfig {
            max_delay_ms: 2_500,
            ..RetryConfig::default()
        };
        let delays: Vec<u64> = (1..=4).map(|n| backoff_delay_ms(n, &cfg)).collect();
        assert_eq!(delays, [1_000, 2_000, 2_500, 2_500]);
    }

    #[tokio::test(start_paused = true)]
    async fn success_on_first_attempt_has_no_retries() {
        let cfg = RetryConfig::default();
        let outcome = execute_with_retry(|| async { Ok::<_, JobError>(7) }, &cfg, None)
            .await
            .unwrap();
        assert_eq!(outcome.result, 7);
        assert_eq!(outcome.attempt_count, 1);
        assert_eq!(outcome.retry_count, 0);
        assert!(!outcome.exception_occurred);
    }

    #[tokio::test(start_paused = true)]
    async fn always_failing_op_runs_exactly_max_retries_plus_one() {
        let cfg = RetryConfig::default();
        let mut calls = 0u32;
        let mut delays = Vec::new();
        let mut hook = |_: &JobError, _retry: u32, delay_ms: u64| delays.push(delay_ms);

        let err = execute_with_retry(
            || {
                calls += 1;
                async { Err::<(), _>(JobError::network("still down")) }
            },
            &cfg,
            Some(&mut hook),
        )
        .await
        .unwrap_err();

        assert_eq!(calls, 4);
        assert_eq!(delays, [1_000, 2_000, 4_000]);
        assert_eq!(err.kind(), "network");
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_error_aborts_immediately() {
        let cfg = RetryConfig::default();
        let mut calls = 0u32;
        let err = execute_with_retry(
            || {
                calls += 1;
                async {
                    Err::<(), _>(JobError::Upstream {
                        provider: "newsapi".into(),
                        status: 401,
                        message: "bad key".into(),
                    })
                }
            },
            &cfg,
            None,
        )
        .await
        .unwrap_err();
        assert_eq!(calls, 1);
        assert_eq!(err.kind(), "upstream-api");
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failures() {
        let cfg = RetryConfig::default();
        let mut calls = 0u32;
        let outcome = execute_with_retry(
            || {
                calls += 1;
                let fail = calls < 3;
                async move {
                    if fail {
                        Err(JobError::network("flaky"))
                    } else {
                        Ok("ok")
                    }
                }
            },
            &cfg,
            None,
        )
        .await
        .unwrap();
        assert_eq!(outcome.attempt_count, 3);
        assert_eq!(outcome.retry_count, 2);
        assert!(outcome.exception_occurred);
    }
}
