//! Tagged error taxonomy for the batch jobs.
//!
//! One sum type with a `kind` discriminant plus kind-specific payload fields;
//! retry and logging code matches on the discriminant. `ErrorEntry` is the
//! flattened, append-only record attached to a `JobResult`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Which storage operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageOp {
    Read,
    Write,
    Delete,
}

/// Sub-kind for duplicate-check failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicateCheckStage {
    HistoryFetchFailed,
    CheckFailed,
    RegenerationFailed,
    MaxRegenerationsExceeded,
}

#[derive(Debug, Clone, Error)]
pub enum JobError {
    #[error("network error: {message}")]
    Network { message: String },

    #[error("{provider} returned status {status}: {message}")]
    Upstream {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("rate limited: {message}")]
    RateLimit {
        /// Server-provided retry-after hint, in (possibly fractional) seconds.
        retry_after_secs: Option<f64>,
        message: String,
    },

    #[error("AI request timed out: {message}")]
    AiTimeout { message: String },

    #[error("AI service unavailable (status {status})")]
    AiUnavailable { status: u16 },

    #[error("storage {op:?} failed: {message}")]
    Storage { op: StorageOp, message: String },

    #[error("duplicate check failed ({stage:?}): {message}")]
    DuplicateCheck {
        stage: DuplicateCheckStage,
        message: String,
    },

    #[error("job exceeded its {limit_ms} ms deadline")]
    Timeout { limit_ms: u64 },

    #[error("{message}")]
    Unknown { message: String },
}

impl JobError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::Unknown {
            message: message.into(),
        }
    }

    pub fn storage(op: StorageOp, message: impl Into<String>) -> Self {
        Self::Storage {
            op,
            message: message.into(),
        }
    }

    /// Stable kind tag used in `ErrorEntry` and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network { .. } => "network",
            Self::Upstream { .. } => "upstream-api",
            Self::RateLimit { .. } => "rate-limit",
            Self::AiTimeout { .. } => "ai-timeout",
            Self::AiUnavailable { .. } => "ai-unavailable",
            Self::Storage { .. } => "storage",
            Self::DuplicateCheck { .. } => "duplicate-check",
            Self::Timeout { .. } => "timeout",
            Self::Unknown { .. } => "unknown",
        }
    }

    /// Whether the generic retry executor may try again after this error.
    ///
    /// Client errors (4xx other than 429) and duplicate-check/timeout outcomes
    /// are terminal; everything transient is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. }
            | Self::RateLimit { .. }
            | Self::AiTimeout { .. }
            | Self::AiUnavailable { .. }
            | Self::Storage { .. }
            | Self::Unknown { .. } => true,
            Self::Upstream { status, .. } => *status == 429 || *status >= 500,
            Self::DuplicateCheck { .. } | Self::Timeout { .. } => false,
        }
    }

    /// Whether this error is a rate-limit signal (dedicated kind or HTTP 429).
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimit { .. }) || matches!(self, Self::Upstream { status, .. } if *status == 429)
    }

    /// Server-provided retry-after hint, if the error carried one.
    pub fn retry_after_secs(&self) -> Option<f64> {
        match self {
            Self::RateLimit {
                retry_after_secs, ..
            } => *retry_after_secs,
            _ => None,
        }
    }
}

/// One failure observed during a job run. Appended in detection order.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEntry {
    pub kind: String,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

impl ErrorEntry {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            occurred_at: Utc::now(),
        }
    }

    pub fn from_error(err: &JobError) -> Self {
        Self::new(err.kind(), err.to_string())
    }

    /// Entry for a failure attributed to a named source.
    pub fn tagged(source: &str, err: &JobError) -> Self {
        Self::new(err.kind(), format!("{source}: {err}"))
    }
}
