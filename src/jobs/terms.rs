//! # Terms job controller
//! Generate three mutually distinct investment terms, each verified against
//! the rolling delivery history, then persist the batch.
//!
//! Terms are generated strictly sequentially: every accepted name seeds the
//! next call's exclusion set, so same-day terms cannot collide with each
//! other or with history.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::time::Instant;

use crate::deadline::{run_with_deadline, DEFAULT_DEADLINE_MS};
use crate::dedup::{DuplicateIndex, DEFAULT_SIMILARITY_THRESHOLD};
use crate::error::{DuplicateCheckStage, ErrorEntry, JobError};
use crate::jobs::{observe_result, HistoryRepository, JobResult, Storage, TermRecord};
use crate::rate_limit::{execute_rate_limited, RateLimitConfig};
use crate::regen::{generate_unique, GeneratedTerm, RegenOptions, TermGenerator};

#[derive(Debug, Clone)]
pub struct TermsJobConfig {
    pub deadline_ms: u64,
    /// How far back the duplicate history reaches.
    pub lookback_days: u32,
    pub terms_per_day: u32,
    pub regen: RegenOptions,
    pub rate_limit: RateLimitConfig,
    pub similarity_threshold: f64,
}

impl Default for TermsJobConfig {
    fn default() -> Self {
        Self {
            deadline_ms: DEFAULT_DEADLINE_MS,
            lookback_days: 90,
            terms_per_day: 3,
            regen: RegenOptions::default(),
            rate_limit: RateLimitConfig::default(),
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

/// Generation collaborator wrapped in the rate-limit aware executor, so a
/// quota-bound provider waits out its own hint instead of losing the slot.
struct RateLimitedGenerator {
    inner: Arc<dyn TermGenerator>,
    cfg: RateLimitConfig,
}

#[async_trait]
impl TermGenerator for RateLimitedGenerator {
    async fn generate(&self, exclusions: &[String]) -> Result<GeneratedTerm, JobError> {
        execute_rate_limited(|| self.inner.generate(exclusions), &self.cfg, None).await
    }
}

struct RunOutcome {
    accepted: Vec<TermRecord>,
    persisted: bool,
    metadata_updated: bool,
    errors: Vec<ErrorEntry>,
}

pub struct TermsJob {
    history: Arc<dyn HistoryRepository>,
    generator: Arc<dyn TermGenerator>,
    storage: Arc<dyn Storage>,
    cfg: TermsJobConfig,
}

impl TermsJob {
    pub fn new(
        history: Arc<dyn HistoryRepository>,
        generator: Arc<dyn TermGenerator>,
        storage: Arc<dyn Storage>,
        cfg: TermsJobConfig,
    ) -> Self {
        Self {
            history,
            generator,
            storage,
            cfg,
        }
    }

    pub async fn execute(&self) -> JobResult<Vec<TermRecord>> {
        let started = Instant::now();
        let date = Utc::now().date_naive().to_string();

        let guarded = run_with_deadline(self.cfg.deadline_ms, self.run_once(date.clone())).await;

        let duration_ms = started.elapsed().as_millis() as u64;
        let result = match guarded {
            Ok(Ok(run)) => {
                let success =
                    run.accepted.len() as u32 == self.cfg.terms_per_day && run.errors.is_empty();
                let partial_success = !success && !run.accepted.is_empty();
                JobResult {
                    success,
                    partial_success,
                    payload: (!run.accepted.is_empty()).then_some(run.accepted),
                    persisted: run.persisted,
                    metadata_updated: run.metadata_updated,
                    duration_ms,
                    date,
                    errors: run.errors,
                }
            }
            Ok(Err(err)) => {
                JobResult::failed(date, duration_ms, vec![ErrorEntry::from_error(&err)])
            }
            Err(exceeded) => JobResult::failed(
                date,
                exceeded.elapsed_ms,
                vec![ErrorEntry::from_error(&exceeded.to_error())],
            ),
        };

        observe_result("terms", &result);
        result
    }

    async fn run_once(&self, date: String) -> Result<RunOutcome, JobError> {
        let delivered = self
            .history
            .delivered_names(self.cfg.lookback_days)
            .await
            .map_err(|err| JobError::DuplicateCheck {
                stage: DuplicateCheckStage::HistoryFetchFailed,
                message: err.to_string(),
            })?;

        let mut index = DuplicateIndex::with_threshold(delivered, self.cfg.similarity_threshold);
        let mut errors: Vec<ErrorEntry> = Vec::new();
        let mut exclusions: Vec<String> = Vec::new();
        let mut accepted: Vec<TermRecord> = Vec::new();

        let generator = RateLimitedGenerator {
            inner: Arc::clone(&self.generator),
            cfg: self.cfg.rate_limit,
        };

        for slot in 0..self.cfg.terms_per_day {
            match generate_unique(
                &generator,
                &mut index,
                exclusions.clone(),
                self.cfg.regen,
            )
            .await
            {
                Ok(outcome) => {
                    tracing::debug!(
                        slot,
                        term = %outcome.item.name,
                        regenerated = outcome.regenerated_count,
                        "accepted term"
                    );
                    index.add(outcome.item.name.clone());
                    exclusions.push(outcome.item.name.clone());
                    accepted.push(TermRecord {
                        date: date.clone(),
                        name: outcome.item.name,
                        definition: outcome.item.definition,
                        model: outcome.item.model,
                    });
                }
                Err(failure) => {
                    let exhausted = matches!(
                        failure.error,
                        JobError::DuplicateCheck {
                            stage: DuplicateCheckStage::MaxRegenerationsExceeded,
                            ..
                        }
                    );
                    if exhausted {
                        // This slot is lost; later slots may still land.
                        errors.push(ErrorEntry::from_error(&failure.error));
                        continue;
                    }
                    if accepted.is_empty() {
                        // Generator is down and nothing was produced: terminal.
                        return Err(failure.error);
                    }
                    errors.push(ErrorEntry::from_error(&failure.error));
                    break;
                }
            }
        }

        let mut persisted = false;
        let mut metadata_updated = false;
        if !accepted.is_empty() {
            match self.storage.insert_many(&accepted).await {
                Ok(()) => persisted = true,
                Err(err) => errors.push(ErrorEntry::from_error(&err)),
            }
            match self
                .storage
                .update_metadata("terms_last_updated_at", Utc::now())
                .await
            {
                Ok(()) => metadata_updated = true,
                Err(err) => errors.push(ErrorEntry::from_error(&err)),
            }
        }

        let checks = index.stats();
        tracing::info!(
            accepted = accepted.len(),
            total_checks = checks.total_checks,
            duplicates_found = checks.duplicates_found,
            "terms generation finished"
        );

        Ok(RunOutcome {
            accepted,
            persisted,
            metadata_updated,
            errors,
        })
    }
}
