// tests/news_job.rs
// End-to-end news job scenarios with stubbed collaborators.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use daily_brief_jobs::clients::memory::MemoryStore;
use daily_brief_jobs::error::JobError;
use daily_brief_jobs::jobs::news::{NewsJob, NewsJobConfig};
use daily_brief_jobs::jobs::{
    Article, GenerateOptions, Generation, GenerationService, SourceFetcher,
};
use daily_brief_jobs::retry::RetryConfig;

struct StubFetcher {
    name: &'static str,
    articles: Result<Vec<Article>, JobError>,
    calls: AtomicU32,
}

impl StubFetcher {
    fn ok(name: &'static str, titles: &[&str]) -> Self {
        let articles = titles
            .iter()
            .map(|t| Article {
                title: t.to_string(),
                url: format!("https://example.com/{t}"),
                source: name.to_string(),
                published_at: None,
            })
            .collect();
        Self {
            name,
            articles: Ok(articles),
            calls: AtomicU32::new(0),
        }
    }

    fn failing(name: &'static str, err: JobError) -> Self {
        Self {
            name,
            articles: Err(err),
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl SourceFetcher for StubFetcher {
    fn name(&self) -> &str {
        self.name
    }

    async fn fetch(&self) -> Result<Vec<Article>, JobError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.articles.clone()
    }
}

struct StubSummarizer;

#[async_trait]
impl GenerationService for StubSummarizer {
    async fn generate(
        &self,
        _prompt: &str,
        _opts: &GenerateOptions,
    ) -> Result<Generation, JobError> {
        Ok(Generation {
            text: "A quiet day on the markets.".into(),
            token_usage: Some(42),
            model: "stub".into(),
        })
    }
}

struct HangingFetcher;

#[async_trait]
impl SourceFetcher for HangingFetcher {
    fn name(&self) -> &str {
        "world"
    }

    async fn fetch(&self) -> Result<Vec<Article>, JobError> {
        tokio::time::sleep(tokio::time::Duration::from_secs(3_600)).await;
        Ok(vec![])
    }
}

fn job(
    world: Arc<dyn SourceFetcher>,
    japan: Arc<dyn SourceFetcher>,
    store: Arc<MemoryStore>,
    cfg: NewsJobConfig,
) -> NewsJob {
    NewsJob::new(world, japan, Arc::new(StubSummarizer), store, cfg)
}

#[tokio::test]
async fn full_success_saves_and_updates_metadata() {
    let store = Arc::new(MemoryStore::new());
    let result = job(
        Arc::new(StubFetcher::ok("world", &["Markets rally"])),
        Arc::new(StubFetcher::ok("japan", &["Yen steadies"])),
        store.clone(),
        NewsJobConfig::default(),
    )
    .execute()
    .await;

    assert!(result.success);
    assert!(!result.partial_success);
    assert!(result.errors.is_empty());
    assert!(result.persisted);
    assert!(result.metadata_updated);

    let payload = result.payload.unwrap();
    assert!(payload.world.is_some());
    assert!(payload.japan.is_some());

    assert!(store.news_for(&result.date).is_some());
    assert!(store.metadata("news_last_updated_at").is_some());
}

#[tokio::test]
async fn one_failed_source_yields_partial_success() {
    let store = Arc::new(MemoryStore::new());
    let result = job(
        Arc::new(StubFetcher::ok("world", &["Markets rally", "Oil slides"])),
        Arc::new(StubFetcher::failing("japan", JobError::network("reset"))),
        store.clone(),
        NewsJobConfig::default(),
    )
    .execute()
    .await;

    assert!(!result.success);
    assert!(result.partial_success);
    let payload = result.payload.unwrap();
    assert!(payload.world.is_some());
    assert!(payload.japan.is_none());

    // The surviving source is still persisted.
    assert!(result.persisted);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].kind, "network");
    assert!(result.errors[0].message.starts_with("japan: "));
}

#[tokio::test(start_paused = true)]
async fn full_failure_retries_the_whole_job_then_reports_500_shape() {
    let world = Arc::new(StubFetcher::failing("world", JobError::network("down")));
    let japan = Arc::new(StubFetcher::failing("japan", JobError::network("down")));
    let store = Arc::new(MemoryStore::new());

    let cfg = NewsJobConfig {
        retry: RetryConfig {
            max_retries: 2,
            ..RetryConfig::default()
        },
        ..NewsJobConfig::default()
    };
    let result = job(world.clone(), japan.clone(), store.clone(), cfg)
        .execute()
        .await;

    assert!(!result.success);
    assert!(!result.partial_success);
    assert!(result.payload.is_none());
    assert!(!result.persisted);

    // Initial run plus two whole-job retries.
    assert_eq!(world.calls.load(Ordering::SeqCst), 3);
    assert_eq!(japan.calls.load(Ordering::SeqCst), 3);

    // Per-source reasons from every attempt survive into the terminal
    // result: two sources across three attempts.
    assert_eq!(result.errors.len(), 6);
    assert!(result.errors.iter().all(|e| e.kind == "network"));
    assert!(store.news_for(&result.date).is_none());
}

#[tokio::test]
async fn empty_feed_counts_as_a_failed_source() {
    let store = Arc::new(MemoryStore::new());
    let result = job(
        Arc::new(StubFetcher::ok("world", &["Markets rally"])),
        Arc::new(StubFetcher::ok("japan", &[])),
        store.clone(),
        NewsJobConfig::default(),
    )
    .execute()
    .await;

    assert!(!result.success);
    assert!(result.partial_success);
    let payload = result.payload.unwrap();
    assert!(payload.world.is_some());
    assert!(payload.japan.is_none());
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].kind, "upstream-api");
    assert!(result.errors[0].message.starts_with("japan: "));
}

#[tokio::test(start_paused = true)]
async fn two_empty_feeds_are_full_failure_without_whole_job_retry() {
    let world = Arc::new(StubFetcher::ok("world", &[]));
    let japan = Arc::new(StubFetcher::ok("japan", &[]));
    let store = Arc::new(MemoryStore::new());

    let result = job(world.clone(), japan.clone(), store.clone(), NewsJobConfig::default())
        .execute()
        .await;

    assert!(!result.success);
    assert!(!result.partial_success);
    assert!(result.payload.is_none());
    // An empty answer is not a transport fault, so no whole-job retry.
    assert_eq!(world.calls.load(Ordering::SeqCst), 1);
    assert_eq!(japan.calls.load(Ordering::SeqCst), 1);
    assert_eq!(result.errors.len(), 2);
    assert!(result.errors.iter().all(|e| e.kind == "upstream-api"));
    assert!(store.news_for(&result.date).is_none());
}

#[tokio::test(start_paused = true)]
async fn non_retryable_failure_aborts_without_whole_job_retry() {
    let bad_key = JobError::Upstream {
        provider: "newsapi".into(),
        status: 401,
        message: "bad key".into(),
    };
    let world = Arc::new(StubFetcher::failing("world", bad_key.clone()));
    let japan = Arc::new(StubFetcher::failing("japan", bad_key));
    let store = Arc::new(MemoryStore::new());

    let result = job(world.clone(), japan.clone(), store, NewsJobConfig::default())
        .execute()
        .await;

    assert!(!result.success);
    assert!(!result.partial_success);
    assert_eq!(world.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn deadline_produces_a_timeout_result() {
    let store = Arc::new(MemoryStore::new());
    let cfg = NewsJobConfig {
        deadline_ms: 300_000,
        ..NewsJobConfig::default()
    };
    let result = job(
        Arc::new(HangingFetcher),
        Arc::new(StubFetcher::ok("japan", &["Yen steadies"])),
        store,
        cfg,
    )
    .execute()
    .await;

    assert!(!result.success);
    assert!(!result.partial_success);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].kind, "timeout");
    assert!(result.duration_ms >= 300_000);
}
