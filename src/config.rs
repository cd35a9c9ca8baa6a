//! Environment-driven configuration.
//!
//! Every knob falls back to its contract value; only provider credentials
//! are required.

use std::env;

use anyhow::Context;

use crate::clients::news::NewsSourceConfig;
use crate::dedup::{MatchMode, DEFAULT_SIMILARITY_THRESHOLD};
use crate::deadline::DEFAULT_DEADLINE_MS;
use crate::jobs::news::NewsJobConfig;
use crate::jobs::terms::TermsJobConfig;
use crate::rate_limit::RateLimitConfig;
use crate::regen::{RegenOptions, DEFAULT_MAX_REGENERATIONS};
use crate::retry::RetryConfig;

const DEFAULT_NEWS_ENDPOINT: &str = "https://newsapi.org/v2/top-headlines";

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub news: NewsJobConfig,
    pub terms: TermsJobConfig,
    pub world_source: NewsSourceConfig,
    pub japan_source: NewsSourceConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let deadline_ms = env_parse("JOB_DEADLINE_MS", DEFAULT_DEADLINE_MS);

        let retry = RetryConfig {
            max_retries: env_parse("RETRY_MAX", 3),
            base_delay_ms: env_parse("RETRY_BASE_DELAY_MS", 1_000),
            max_delay_ms: env_parse("RETRY_MAX_DELAY_MS", 30_000),
        };
        let rate_limit = RateLimitConfig {
            max_retries: env_parse("RATE_LIMIT_MAX_RETRIES", 3),
            default_wait_secs: env_parse("RATE_LIMIT_DEFAULT_WAIT_SECS", 60),
            max_wait_secs: env_parse("RATE_LIMIT_MAX_WAIT_SECS", 300),
        };

        let news = NewsJobConfig {
            deadline_ms,
            retry,
            rate_limit,
            ..NewsJobConfig::default()
        };

        let mode = match env::var("DUP_MATCH_MODE").unwrap_or_default().as_str() {
            "partial" => MatchMode::Partial,
            "similarity" => MatchMode::Similarity,
            _ => MatchMode::Exact,
        };
        let terms = TermsJobConfig {
            deadline_ms,
            lookback_days: env_parse("HISTORY_LOOKBACK_DAYS", 90),
            terms_per_day: env_parse("TERMS_PER_DAY", 3),
            regen: RegenOptions {
                max_regenerations: env_parse("MAX_REGENERATIONS", DEFAULT_MAX_REGENERATIONS),
                mode,
            },
            rate_limit,
            similarity_threshold: env_parse("SIMILARITY_THRESHOLD", DEFAULT_SIMILARITY_THRESHOLD),
        };

        let news_api_key =
            env::var("NEWS_API_KEY").context("Missing NEWS_API_KEY env var")?;
        let endpoint =
            env::var("NEWS_ENDPOINT").unwrap_or_else(|_| DEFAULT_NEWS_ENDPOINT.to_string());
        let daily_limit = env_parse("NEWS_DAILY_LIMIT", 100);

        let world_source = NewsSourceConfig {
            name: "world".into(),
            endpoint: endpoint.clone(),
            api_key: news_api_key.clone(),
            query: env::var("WORLD_NEWS_QUERY")
                .unwrap_or_else(|_| "world economy".to_string()),
            daily_limit,
        };
        let japan_source = NewsSourceConfig {
            name: "japan".into(),
            endpoint,
            api_key: news_api_key,
            query: env::var("JAPAN_NEWS_QUERY")
                .unwrap_or_else(|_| "japan economy".to_string()),
            daily_limit,
        };

        Ok(Self {
            port: env_parse("PORT", 8000),
            news,
            terms,
            world_source,
            japan_source,
        })
    }
}
