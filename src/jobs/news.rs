//! # News job controller
//! Fetch the world and japan sources concurrently, summarize whatever
//! arrived, persist, and shape the combined outcome.
//!
//! The whole run is wrapped in the generic retry executor (full failure
//! only) and raced against the job deadline. Summaries go through the
//! rate-limit aware executor because the generation provider is quota-bound.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::Serialize;
use tokio::time::Instant;

use crate::deadline::{run_with_deadline, DEFAULT_DEADLINE_MS};
use crate::error::{ErrorEntry, JobError};
use crate::fanout::{classify, failure_entries, settle_all, SourceFuture, SourceOutcome};
use crate::jobs::{
    observe_result, Article, GenerateOptions, GenerationService, JobResult, NewsRecord,
    NewsSection, SourceFetcher, Storage,
};
use crate::rate_limit::{execute_rate_limited, RateLimitConfig};
use crate::retry::{execute_with_retry, RetryConfig};

#[derive(Debug, Clone)]
pub struct NewsJobConfig {
    pub deadline_ms: u64,
    pub retry: RetryConfig,
    pub rate_limit: RateLimitConfig,
    pub generate: GenerateOptions,
}

impl Default for NewsJobConfig {
    fn default() -> Self {
        Self {
            deadline_ms: DEFAULT_DEADLINE_MS,
            retry: RetryConfig::default(),
            rate_limit: RateLimitConfig::default(),
            generate: GenerateOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewsPayload {
    pub world: Option<NewsSection>,
    pub japan: Option<NewsSection>,
}

struct RunOutcome {
    payload: Option<NewsPayload>,
    persisted: bool,
    metadata_updated: bool,
    errors: Vec<ErrorEntry>,
}

pub struct NewsJob {
    world: Arc<dyn SourceFetcher>,
    japan: Arc<dyn SourceFetcher>,
    generator: Arc<dyn GenerationService>,
    storage: Arc<dyn Storage>,
    cfg: NewsJobConfig,
}

impl NewsJob {
    pub fn new(
        world: Arc<dyn SourceFetcher>,
        japan: Arc<dyn SourceFetcher>,
        generator: Arc<dyn GenerationService>,
        storage: Arc<dyn Storage>,
        cfg: NewsJobConfig,
    ) -> Self {
        Self {
            world,
            japan,
            generator,
            storage,
            cfg,
        }
    }

    /// Run the whole job once, inside deadline and whole-job retry.
    pub async fn execute(&self) -> JobResult<NewsPayload> {
        let started = Instant::now();
        let date = Utc::now().date_naive().to_string();

        // Per-source reasons from every failed attempt survive the retry
        // closure so a terminal failure can report the full history.
        let sink: Arc<Mutex<Vec<ErrorEntry>>> = Arc::new(Mutex::new(Vec::new()));

        let mut retries_seen = 0u32;
        let mut on_retry = |err: &JobError, retry: u32, delay_ms: u64| {
            retries_seen = retry;
            tracing::warn!(retry, delay_ms, error = %err, "whole news job failed, retrying");
        };
        let guarded = run_with_deadline(
            self.cfg.deadline_ms,
            execute_with_retry(
                || self.run_once(date.clone(), sink.clone()),
                &self.cfg.retry,
                Some(&mut on_retry),
            ),
        )
        .await;

        let duration_ms = started.elapsed().as_millis() as u64;
        let result = match guarded {
            Ok(Ok(retry_outcome)) => {
                let run = retry_outcome.result;
                if retry_outcome.retry_count > 0 {
                    tracing::info!(
                        attempts = retry_outcome.attempt_count,
                        "news job recovered after whole-job retries"
                    );
                }
                let complete = matches!(
                    &run.payload,
                    Some(NewsPayload {
                        world: Some(_),
                        japan: Some(_),
                    })
                );
                let success = complete && run.errors.is_empty();
                let partial_success = !success && run.payload.is_some();
                JobResult {
                    success,
                    partial_success,
                    payload: run.payload,
                    persisted: run.persisted,
                    metadata_updated: run.metadata_updated,
                    duration_ms,
                    date,
                    errors: run.errors,
                }
            }
            Ok(Err(err)) => {
                let mut errors = std::mem::take(&mut *sink.lock().expect("error sink poisoned"));
                if errors.is_empty() {
                    errors.push(ErrorEntry::from_error(&err));
                }
                tracing::error!(
                    attempts = retries_seen + 1,
                    error_count = errors.len(),
                    last_error = %err,
                    "news job failed terminally"
                );
                JobResult::failed(date, duration_ms, errors)
            }
            Err(exceeded) => JobResult::failed(
                date,
                exceeded.elapsed_ms,
                vec![ErrorEntry::from_error(&exceeded.to_error())],
            ),
        };

        observe_result("news", &result);
        result
    }

    async fn run_once(
        &self,
        date: String,
        sink: Arc<Mutex<Vec<ErrorEntry>>>,
    ) -> Result<RunOutcome, JobError> {
        let ops: Vec<(String, SourceFuture<Vec<Article>>)> = vec![
            Self::fetch_op(&self.world),
            Self::fetch_op(&self.japan),
        ];
        let outcomes = settle_all(ops).await;
        // An empty feed counts as a failed source so it shapes the outcome
        // like any other fetch failure instead of a blank section.
        let outcomes: Vec<SourceOutcome<Vec<Article>>> = outcomes
            .into_iter()
            .map(|o| match o.result {
                Ok(articles) if articles.is_empty() => SourceOutcome {
                    result: Err(JobError::Upstream {
                        provider: o.name.clone(),
                        status: 200,
                        message: "returned no articles".into(),
                    }),
                    name: o.name,
                },
                result => SourceOutcome {
                    name: o.name,
                    result,
                },
            })
            .collect();
        let class = classify(&outcomes);
        let mut errors = failure_entries(&outcomes);

        tracing::info!(class = ?class, date = %date, "news sources settled");

        if class.should_retry_whole_job() {
            sink.lock().expect("error sink poisoned").extend(errors);
            // The first source error decides retryability of the whole run.
            let first = outcomes
                .into_iter()
                .find_map(|o| o.result.err())
                .unwrap_or_else(|| JobError::unknown("no news sources configured"));
            return Err(first);
        }

        let world_name = self.world.name().to_string();
        let mut world = None;
        let mut japan = None;
        for outcome in outcomes {
            let SourceOutcome { name, result } = outcome;
            let articles = match result {
                Ok(a) => a,
                Err(_) => continue, // already recorded above
            };
            match self.summarize(&name, &articles).await {
                Ok(section) => {
                    if name == world_name {
                        world = Some(section);
                    } else {
                        japan = Some(section);
                    }
                }
                Err(err) => errors.push(ErrorEntry::tagged(&name, &err)),
            }
        }

        let payload = (world.is_some() || japan.is_some()).then(|| NewsPayload {
            world: world.clone(),
            japan: japan.clone(),
        });

        let mut persisted = false;
        let mut metadata_updated = false;
        if payload.is_some() {
            let record = NewsRecord {
                date: date.clone(),
                world,
                japan,
            };
            match self.storage.upsert(&record).await {
                Ok(()) => persisted = true,
                Err(err) => errors.push(ErrorEntry::from_error(&err)),
            }
            match self
                .storage
                .update_metadata("news_last_updated_at", Utc::now())
                .await
            {
                Ok(()) => metadata_updated = true,
                Err(err) => errors.push(ErrorEntry::from_error(&err)),
            }
        }

        Ok(RunOutcome {
            payload,
            persisted,
            metadata_updated,
            errors,
        })
    }

    fn fetch_op(fetcher: &Arc<dyn SourceFetcher>) -> (String, SourceFuture<Vec<Article>>) {
        let name = fetcher.name().to_string();
        let fetcher = Arc::clone(fetcher);
        (name, Box::pin(async move { fetcher.fetch().await }))
    }

    /// Summarize one source's articles, retrying rate-limited generation
    /// calls with the server-provided wait hint.
    async fn summarize(&self, source: &str, articles: &[Article]) -> Result<NewsSection, JobError> {
        let prompt = summary_prompt(source, articles);
        let generation = execute_rate_limited(
            || self.generator.generate(&prompt, &self.cfg.generate),
            &self.cfg.rate_limit,
            None,
        )
        .await?;
        Ok(NewsSection {
            summary: generation.text,
            articles: articles.to_vec(),
        })
    }
}

fn summary_prompt(source: &str, articles: &[Article]) -> String {
    let mut prompt = format!(
        "Summarize today's {source} financial news in a few short sentences.\nHeadlines:\n"
    );
    for article in articles.iter().take(10) {
        prompt.push_str("- ");
        prompt.push_str(&article.title);
        prompt.push('\n');
    }
    prompt
}
