//! # Regeneration Loop
//! Produces one guaranteed-non-duplicate item from a generation collaborator,
//! bounded by a maximum regeneration count.
//!
//! Generator errors abort the loop immediately; retrying generation is the
//! retry executor's job at a different layer. Duplicate rejections grow the
//! exclusion set handed to the next generation call.

use async_trait::async_trait;
use metrics::counter;
use serde::Serialize;

use crate::dedup::{DuplicateIndex, MatchMode};
use crate::error::{DuplicateCheckStage, JobError};
use crate::normalize::normalize;

/// Default regeneration budget on top of the initial attempt.
pub const DEFAULT_MAX_REGENERATIONS: u32 = 5;

/// One generated item, as returned by the collaborator.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedTerm {
    pub name: String,
    pub definition: String,
    pub model: Option<String>,
}

/// Generation collaborator: produce a candidate avoiding `exclusions`.
#[async_trait]
pub trait TermGenerator: Send + Sync {
    async fn generate(&self, exclusions: &[String]) -> Result<GeneratedTerm, JobError>;
}

/// Why a candidate was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RejectReason {
    Duplicate,
    Invalid,
    Error,
}

/// One rejected round, kept for observability.
#[derive(Debug, Clone, Serialize)]
pub struct RegenerationAttempt {
    pub rejected_name: String,
    pub reason: RejectReason,
    pub attempt_number: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct RegenOptions {
    pub max_regenerations: u32,
    pub mode: MatchMode,
}

impl Default for RegenOptions {
    fn default() -> Self {
        Self {
            max_regenerations: DEFAULT_MAX_REGENERATIONS,
            mode: MatchMode::Exact,
        }
    }
}

/// Successful loop result.
#[derive(Debug, Clone, Serialize)]
pub struct RegenOutcome {
    pub item: GeneratedTerm,
    /// Generation calls made, `>= 1`.
    pub attempts: u32,
    /// `attempts - 1`.
    pub regenerated_count: u32,
    pub history: Vec<RegenerationAttempt>,
}

/// Exhausted budget or a hard generator failure, with the rejection history.
#[derive(Debug)]
pub struct RegenFailure {
    pub error: JobError,
    pub attempts: u32,
    pub regenerated_count: u32,
    pub history: Vec<RegenerationAttempt>,
}

/// Generate one item that is not a duplicate of anything in `index`, seeding
/// the generator's exclusion set with `exclusions` plus every rejected name.
pub async fn generate_unique(
    generator: &dyn TermGenerator,
    index: &mut DuplicateIndex,
    exclusions: Vec<String>,
    opts: RegenOptions,
) -> Result<RegenOutcome, RegenFailure> {
    let mut exclusions = exclusions;
    let mut history: Vec<RegenerationAttempt> = Vec::new();
    let budget = 1 + opts.max_regenerations;

    for attempt in 1..=budget {
        let term = match generator.generate(&exclusions).await {
            Ok(term) => term,
            Err(error) => {
                return Err(RegenFailure {
                    error,
                    attempts: attempt,
                    regenerated_count: attempt - 1,
                    history,
                });
            }
        };

        if normalize(&term.name).is_empty() {
            history.push(RegenerationAttempt {
                rejected_name: term.name,
                reason: RejectReason::Invalid,
                attempt_number: attempt,
            });
            counter!("regenerations_total").increment(1);
            continue;
        }

        let check = index.check(&term.name, opts.mode);
        if !check.is_duplicate {
            return Ok(RegenOutcome {
                item: term,
                attempts: attempt,
                regenerated_count: attempt - 1,
                history,
            });
        }

        tracing::debug!(
            rejected = %term.name,
            matched = ?check.matched_item,
            attempt,
            "regenerating duplicate candidate"
        );
        counter!("regenerations_total").increment(1);
        exclusions.push(term.name.clone());
        history.push(RegenerationAttempt {
            rejected_name: term.name,
            reason: RejectReason::Duplicate,
            attempt_number: attempt,
        });
    }

    Err(RegenFailure {
        error: JobError::DuplicateCheck {
            stage: DuplicateCheckStage::MaxRegenerationsExceeded,
            message: format!(
                "no unique item after {} regenerations",
                opts.max_regenerations
            ),
        },
        attempts: budget,
        regenerated_count: opts.max_regenerations,
        history,
    })
}
