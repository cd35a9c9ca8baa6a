//! # Deadline Guard
//! Races a whole job invocation against its wall-clock budget.
//!
//! Built on `tokio::time::timeout`, which drops the guarded future when the
//! timer fires; pending collaborator calls inside it are cancelled at their
//! next await point rather than left running behind a stale result.

use std::future::Future;

use tokio::time::{timeout, Duration, Instant};

use crate::error::JobError;

/// Default per-invocation budget: 5 minutes.
pub const DEFAULT_DEADLINE_MS: u64 = 300_000;

/// Elapsed time observed when the guard gave up.
#[derive(Debug, Clone, Copy)]
pub struct DeadlineExceeded {
    pub limit_ms: u64,
    pub elapsed_ms: u64,
}

impl DeadlineExceeded {
    pub fn to_error(self) -> JobError {
        JobError::Timeout {
            limit_ms: self.limit_ms,
        }
    }
}

/// Run `fut` to completion unless `limit_ms` elapses first.
pub async fn run_with_deadline<T>(
    limit_ms: u64,
    fut: impl Future<Output = T>,
) -> Result<T, DeadlineExceeded> {
    let started = Instant::now();
    match timeout(Duration::from_millis(limit_ms), fut).await {
        Ok(v) => Ok(v),
        Err(_) => Err(DeadlineExceeded {
            limit_ms,
            elapsed_ms: started.elapsed().as_millis() as u64,
        }),
    }
}
