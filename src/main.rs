//! Daily Brief Jobs — Binary Entrypoint
//! Boots the Axum HTTP server, wiring the two job controllers, shared state,
//! and the Prometheus exporter.

use std::sync::Arc;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use daily_brief_jobs::api::{create_router, AppState};
use daily_brief_jobs::clients::memory::MemoryStore;
use daily_brief_jobs::clients::news::NewsSourceFetcher;
use daily_brief_jobs::clients::openai::OpenAiClient;
use daily_brief_jobs::config::AppConfig;
use daily_brief_jobs::jobs::news::NewsJob;
use daily_brief_jobs::jobs::terms::TermsJob;
use daily_brief_jobs::metrics::Metrics;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("daily_brief_jobs=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    init_tracing();

    let cfg = AppConfig::from_env()?;
    let metrics = Metrics::init(cfg.news.deadline_ms);

    let openai = Arc::new(OpenAiClient::from_env()?);
    let store = Arc::new(MemoryStore::new());

    let news = NewsJob::new(
        Arc::new(NewsSourceFetcher::new(cfg.world_source.clone())),
        Arc::new(NewsSourceFetcher::new(cfg.japan_source.clone())),
        openai.clone(),
        store.clone(),
        cfg.news.clone(),
    );
    let terms = TermsJob::new(store.clone(), openai, store.clone(), cfg.terms.clone());

    let state = AppState {
        news: Arc::new(news),
        terms: Arc::new(terms),
    };
    let router = create_router(state).merge(metrics.router());

    let addr = format!("0.0.0.0:{}", cfg.port);
    tracing::info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}
