// tests/terms_job.rs
// End-to-end terms job scenarios with a scripted generator and the
// in-memory store.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use daily_brief_jobs::clients::memory::MemoryStore;
use daily_brief_jobs::error::JobError;
use daily_brief_jobs::jobs::terms::{TermsJob, TermsJobConfig};
use daily_brief_jobs::jobs::TermRecord;
use daily_brief_jobs::regen::{GeneratedTerm, TermGenerator};

/// Pops one scripted response per call and records the exclusions it saw.
struct ScriptedGenerator {
    script: Mutex<Vec<Result<GeneratedTerm, JobError>>>,
    seen_exclusions: Mutex<Vec<Vec<String>>>,
}

impl ScriptedGenerator {
    fn new(script: Vec<Result<GeneratedTerm, JobError>>) -> Self {
        let mut script = script;
        script.reverse();
        Self {
            script: Mutex::new(script),
            seen_exclusions: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl TermGenerator for ScriptedGenerator {
    async fn generate(&self, exclusions: &[String]) -> Result<GeneratedTerm, JobError> {
        self.seen_exclusions.lock().unwrap().push(exclusions.to_vec());
        self.script
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| Err(JobError::unknown("script exhausted")))
    }
}

fn term(name: &str) -> Result<GeneratedTerm, JobError> {
    Ok(GeneratedTerm {
        name: name.into(),
        definition: format!("what {name} means"),
        model: Some("stub".into()),
    })
}

fn delivered(name: &str) -> TermRecord {
    TermRecord {
        date: Utc::now().date_naive().to_string(),
        name: name.into(),
        definition: String::new(),
        model: None,
    }
}

#[tokio::test]
async fn delivers_three_mutually_distinct_terms() {
    let store = Arc::new(MemoryStore::new());
    let generator = Arc::new(ScriptedGenerator::new(vec![
        term("nisa"),
        term("ideco"),
        term("etf"),
    ]));

    let job = TermsJob::new(
        store.clone(),
        generator.clone(),
        store.clone(),
        TermsJobConfig::default(),
    );
    let result = job.execute().await;

    assert!(result.success);
    assert!(result.persisted);
    assert!(result.metadata_updated);
    let names: Vec<String> = result
        .payload
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(names, ["nisa", "ideco", "etf"]);
    assert_eq!(store.terms().len(), 3);

    // Each accepted name seeds the next call's exclusion set.
    let seen = generator.seen_exclusions.lock().unwrap();
    assert_eq!(seen[0], Vec::<String>::new());
    assert_eq!(seen[1], ["nisa"]);
    assert_eq!(seen[2], ["nisa", "ideco"]);
}

#[tokio::test(start_paused = true)]
async fn rate_limited_generation_waits_out_the_hint_then_succeeds() {
    let store = Arc::new(MemoryStore::new());
    // One 429 with a one-second hint, then the full batch.
    let generator = Arc::new(ScriptedGenerator::new(vec![
        Err(JobError::RateLimit {
            retry_after_secs: Some(1.0),
            message: "quota exceeded".into(),
        }),
        term("nisa"),
        term("ideco"),
        term("etf"),
    ]));

    let job = TermsJob::new(
        store.clone(),
        generator.clone(),
        store.clone(),
        TermsJobConfig::default(),
    );
    let result = job.execute().await;

    assert!(result.success);
    assert!(result.errors.is_empty());
    let names: Vec<String> = result
        .payload
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(names, ["nisa", "ideco", "etf"]);
    // The rate-limited call was retried, not surfaced as a slot failure.
    assert_eq!(generator.seen_exclusions.lock().unwrap().len(), 4);
}

#[tokio::test]
async fn regenerates_past_history_duplicates() {
    let store = Arc::new(MemoryStore::with_terms(vec![delivered("nisa")]));
    let generator = Arc::new(ScriptedGenerator::new(vec![
        term("nisa"), // historical duplicate, regenerated
        term("ideco"),
        term("ideco"), // same-day duplicate, regenerated
        term("etf"),
        term("reit"),
    ]));

    let job = TermsJob::new(
        store.clone(),
        generator,
        store.clone(),
        TermsJobConfig::default(),
    );
    let result = job.execute().await;

    assert!(result.success);
    let names: Vec<String> = result
        .payload
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(names, ["ideco", "etf", "reit"]);
    // Previously delivered plus the new batch.
    assert_eq!(store.terms().len(), 4);
}

#[tokio::test]
async fn exhausted_regeneration_budget_loses_only_that_slot() {
    let store = Arc::new(MemoryStore::with_terms(vec![delivered("nisa")]));
    // First slot burns its whole budget on duplicates, later slots recover.
    let mut script = vec![term("nisa"); 6];
    script.push(term("etf"));
    script.push(term("reit"));
    let generator = Arc::new(ScriptedGenerator::new(script));

    let job = TermsJob::new(
        store.clone(),
        generator,
        store.clone(),
        TermsJobConfig::default(),
    );
    let result = job.execute().await;

    assert!(!result.success);
    assert!(result.partial_success);
    let names: Vec<String> = result
        .payload
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(names, ["etf", "reit"]);
    assert!(result.persisted);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].kind, "duplicate-check");
}

#[tokio::test]
async fn generator_outage_before_any_term_is_full_failure() {
    let store = Arc::new(MemoryStore::new());
    let generator = Arc::new(ScriptedGenerator::new(vec![Err(JobError::AiUnavailable {
        status: 503,
    })]));

    let job = TermsJob::new(
        store.clone(),
        generator,
        store.clone(),
        TermsJobConfig::default(),
    );
    let result = job.execute().await;

    assert!(!result.success);
    assert!(!result.partial_success);
    assert!(result.payload.is_none());
    assert!(!result.persisted);
    assert_eq!(result.errors[0].kind, "ai-unavailable");
    assert!(store.terms().is_empty());
}

#[tokio::test]
async fn history_fetch_failure_is_terminal_with_its_own_kind() {
    struct BrokenHistory;
    #[async_trait]
    impl daily_brief_jobs::jobs::HistoryRepository for BrokenHistory {
        async fn delivered_names(&self, _lookback_days: u32) -> Result<Vec<String>, JobError> {
            Err(JobError::storage(
                daily_brief_jobs::error::StorageOp::Read,
                "history table unavailable",
            ))
        }
    }

    let store = Arc::new(MemoryStore::new());
    let generator = Arc::new(ScriptedGenerator::new(vec![term("nisa")]));
    let job = TermsJob::new(
        Arc::new(BrokenHistory),
        generator,
        store,
        TermsJobConfig::default(),
    );
    let result = job.execute().await;

    assert!(!result.success);
    assert!(!result.partial_success);
    assert_eq!(result.errors[0].kind, "duplicate-check");
    assert!(result.errors[0].message.contains("history"));
}
