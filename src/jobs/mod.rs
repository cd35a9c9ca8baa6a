// src/jobs/mod.rs
pub mod news;
pub mod terms;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_gauge};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::error::{ErrorEntry, JobError};

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("job_runs_total", "Completed job runs, any outcome.");
        describe_counter!("job_failures_total", "Job runs that ended in full failure.");
        describe_counter!("job_retries_total", "Whole-job and per-call retries.");
        describe_counter!("rate_limit_waits_total", "Waits honoring a rate-limit signal.");
        describe_counter!("regenerations_total", "Rejected candidates in the regeneration loop.");
        describe_gauge!("job_last_run_ts", "Unix ts when a job last finished.");
    });
}

/// End-to-end result of one job invocation.
///
/// `success` implies an empty error list; `partial_success` implies
/// `!success`; both false only on full failure or timeout.
#[derive(Debug, Clone, Serialize)]
pub struct JobResult<P> {
    pub success: bool,
    pub partial_success: bool,
    pub payload: Option<P>,
    pub persisted: bool,
    pub metadata_updated: bool,
    pub duration_ms: u64,
    /// ISO calendar day the run belongs to.
    pub date: String,
    pub errors: Vec<ErrorEntry>,
}

impl<P> JobResult<P> {
    pub fn failed(date: String, duration_ms: u64, errors: Vec<ErrorEntry>) -> Self {
        Self {
            success: false,
            partial_success: false,
            payload: None,
            persisted: false,
            metadata_updated: false,
            duration_ms,
            date,
            errors,
        }
    }
}

/// Record the run outcome in metrics and the durable log.
pub(crate) fn observe_result<P>(job: &'static str, result: &JobResult<P>) {
    ensure_metrics_described();
    counter!("job_runs_total", "job" => job).increment(1);
    metrics::gauge!("job_last_run_ts", "job" => job).set(Utc::now().timestamp() as f64);

    if result.success {
        tracing::info!(job, date = %result.date, duration_ms = result.duration_ms, "job succeeded");
    } else if result.partial_success {
        tracing::warn!(
            job,
            date = %result.date,
            duration_ms = result.duration_ms,
            errors = ?result.errors,
            "job finished partially"
        );
    } else {
        counter!("job_failures_total", "job" => job).increment(1);
        tracing::error!(
            job,
            date = %result.date,
            duration_ms = result.duration_ms,
            errors = ?result.errors,
            "job failed"
        );
    }
}

/// A fetched article, as delivered by a source fetcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub url: String,
    pub source: String,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

/// Upstream article fetcher for one named source.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    fn name(&self) -> &str;
    async fn fetch(&self) -> Result<Vec<Article>, JobError>;
}

/// Text generation collaborator (summaries).
#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn generate(&self, prompt: &str, opts: &GenerateOptions) -> Result<Generation, JobError>;
}

#[derive(Debug, Clone, Copy)]
pub struct GenerateOptions {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            max_tokens: 400,
            temperature: 0.4,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Generation {
    pub text: String,
    pub token_usage: Option<u32>,
    pub model: String,
}

/// Read-side history used to seed the duplicate index at job start.
#[async_trait]
pub trait HistoryRepository: Send + Sync {
    async fn delivered_names(&self, lookback_days: u32) -> Result<Vec<String>, JobError>;
}

/// Persistence collaborator. Each call fails independently; the controllers
/// never abort a run over a write failure.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn upsert(&self, record: &NewsRecord) -> Result<(), JobError>;
    async fn insert_many(&self, records: &[TermRecord]) -> Result<(), JobError>;
    async fn update_metadata(&self, field: &str, at: DateTime<Utc>) -> Result<(), JobError>;
}

/// Daily news document, keyed by date (last-write-wins upsert).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsRecord {
    pub date: String,
    pub world: Option<NewsSection>,
    pub japan: Option<NewsSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsSection {
    pub summary: String,
    pub articles: Vec<Article>,
}

/// One delivered investment term.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermRecord {
    pub date: String,
    pub name: String,
    pub definition: String,
    #[serde(default)]
    pub model: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_result_has_both_flags_down() {
        let r = JobResult::<()>::failed("2026-08-29".into(), 12, vec![]);
        assert!(!r.success);
        assert!(!r.partial_success);
        assert!(!r.persisted);
        assert!(r.payload.is_none());
    }
}
