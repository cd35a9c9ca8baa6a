//! # Rate-Limit Aware Executor
//! Retries only on rate-limit signals, waiting for the server-provided
//! retry-after hint instead of an exponential curve.
//!
//! Fractional hints are rounded up to whole seconds; missing hints fall back
//! to `default_wait_secs`; both are clamped to `max_wait_secs`. Any error
//! that is not a rate limit propagates untouched.

use std::future::Future;

use metrics::counter;
use tokio::time::{sleep, Duration};

use crate::error::JobError;
use crate::retry::RetryHook;

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub max_retries: u32,
    pub default_wait_secs: u64,
    pub max_wait_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            default_wait_secs: 60,
            max_wait_secs: 300,
        }
    }
}

/// Seconds to wait before the next attempt, derived from the error's hint.
pub fn wait_secs_for(err: &JobError, cfg: &RateLimitConfig) -> u64 {
    let hinted = err
        .retry_after_secs()
        .map(|s| s.max(0.0).ceil() as u64)
        .unwrap_or(cfg.default_wait_secs);
    hinted.min(cfg.max_wait_secs)
}

/// Run `op`, retrying up to `cfg.max_retries` times on rate-limit errors.
///
/// Once the budget is spent, returns a rate-limit error carrying the last
/// known hint.
pub async fn execute_rate_limited<T, F, Fut>(
    mut op: F,
    cfg: &RateLimitConfig,
    mut on_retry: Option<RetryHook<'_>>,
) -> Result<T, JobError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, JobError>>,
{
    let mut last_hint: Option<f64> = None;

    for retry in 1..=cfg.max_retries {
        match op().await {
            Ok(v) => return Ok(v),
            Err(err) if err.is_rate_limited() => {
                last_hint = err.retry_after_secs().or(last_hint);
                let wait_secs = wait_secs_for(&err, cfg);
                counter!("rate_limit_waits_total").increment(1);
                tracing::warn!(retry, wait_secs, error = %err, "rate limited, backing off");
                if let Some(hook) = on_retry.as_mut() {
                    hook(&err, retry, wait_secs * 1_000);
                }
                sleep(Duration::from_secs(wait_secs)).await;
            }
            Err(err) => return Err(err),
        }
    }

    match op().await {
        Ok(v) => Ok(v),
        Err(err) if err.is_rate_limited() => {
            last_hint = err.retry_after_secs().or(last_hint);
            Err(JobError::RateLimit {
                retry_after_secs: last_hint,
                message: format!("rate limit persisted after {} retries", cfg.max_retries),
            })
        }
        Err(err) => Err(err),
    }
}
