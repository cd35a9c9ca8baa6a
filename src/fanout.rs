//! # Parallel Source Orchestrator
//! Runs a fixed set of named fetch operations concurrently, waits for all of
//! them to settle, and classifies the combined outcome.
//!
//! A wait-group over independently supervised tasks: one source failing never
//! cancels its siblings, and settlement order carries no meaning. Only the
//! final aggregate classification is deterministic.

use std::future::Future;
use std::pin::Pin;

use serde::Serialize;
use tokio::task::JoinSet;

use crate::error::{ErrorEntry, JobError};

/// Boxed fetch operation, paired with its source name by the caller.
pub type SourceFuture<T> = Pin<Box<dyn Future<Output = Result<T, JobError>> + Send>>;

/// Settled result of one named source.
#[derive(Debug)]
pub struct SourceOutcome<T> {
    pub name: String,
    pub result: Result<T, JobError>,
}

/// Aggregate shape of a fan-out run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "class", content = "sources")]
pub enum FanoutClass {
    /// Every source succeeded.
    FullSuccess,
    /// Exactly one source succeeded.
    SourceOnly(String),
    /// More than one but not all sources succeeded.
    Partial(Vec<String>),
    /// No source succeeded.
    FullFailure,
}

impl FanoutClass {
    /// Save whenever at least one source delivered.
    pub fn should_save(&self) -> bool {
        !matches!(self, FanoutClass::FullFailure)
    }

    /// Only a run with nothing to show is worth retrying wholesale.
    pub fn should_retry_whole_job(&self) -> bool {
        matches!(self, FanoutClass::FullFailure)
    }
}

/// Run all operations concurrently and wait until each has resolved or
/// failed. Never short-circuits on the first failure.
///
/// Outcomes are reported in the caller's input order regardless of
/// settlement order.
pub async fn settle_all<T: Send + 'static>(
    ops: Vec<(String, SourceFuture<T>)>,
) -> Vec<SourceOutcome<T>> {
    let mut slots: Vec<Option<SourceOutcome<T>>> = (0..ops.len()).map(|_| None).collect();

    let mut set = JoinSet::new();
    for (idx, (name, fut)) in ops.into_iter().enumerate() {
        set.spawn(async move { (idx, name, fut.await) });
    }

    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((idx, name, result)) => slots[idx] = Some(SourceOutcome { name, result }),
            Err(err) => {
                // A panicked fetch task loses its slot; classification then
                // runs over the sources that did settle.
                tracing::error!(error = %err, "source task aborted");
            }
        }
    }

    slots.into_iter().flatten().collect()
}

/// Classify a settled fan-out. An empty outcome set counts as full failure.
pub fn classify<T>(outcomes: &[SourceOutcome<T>]) -> FanoutClass {
    let succeeded: Vec<&str> = outcomes
        .iter()
        .filter(|o| o.result.is_ok())
        .map(|o| o.name.as_str())
        .collect();

    match succeeded.len() {
        0 => FanoutClass::FullFailure,
        1 if outcomes.len() == 1 => FanoutClass::FullSuccess,
        1 => FanoutClass::SourceOnly(succeeded[0].to_string()),
        n if n == outcomes.len() => FanoutClass::FullSuccess,
        _ => FanoutClass::Partial(succeeded.iter().map(|s| s.to_string()).collect()),
    }
}

/// Collect failure reasons from unsuccessful sources, tagged by source name,
/// in outcome order.
pub fn failure_entries<T>(outcomes: &[SourceOutcome<T>]) -> Vec<ErrorEntry> {
    outcomes
        .iter()
        .filter_map(|o| match &o.result {
            Ok(_) => None,
            Err(err) => Some(ErrorEntry::tagged(&o.name, err)),
        })
        .collect()
}
