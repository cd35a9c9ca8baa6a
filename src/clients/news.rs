//! HTTP article fetcher for one named news source.
//!
//! Thin wrapper over a NewsAPI-style endpoint. Carries its own daily request
//! quota so a retry storm cannot burn the provider allowance.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::clients::{retry_after_secs, transport_error};
use crate::error::JobError;
use crate::jobs::{Article, SourceFetcher};
use crate::quota::DailyQuota;

#[derive(Debug, Clone)]
pub struct NewsSourceConfig {
    /// Source name as it appears in classifications ("world", "japan").
    pub name: String,
    pub endpoint: String,
    pub api_key: String,
    /// Query sent to the provider, e.g. a region/keyword filter.
    pub query: String,
    pub daily_limit: u32,
}

pub struct NewsSourceFetcher {
    http: reqwest::Client,
    cfg: NewsSourceConfig,
    quota: Mutex<DailyQuota>,
}

#[derive(Deserialize)]
struct ProviderArticle {
    title: String,
    url: String,
    #[serde(default)]
    source: Option<ProviderSource>,
    #[serde(default, rename = "publishedAt")]
    published_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct ProviderSource {
    name: String,
}

#[derive(Deserialize)]
struct ProviderResponse {
    articles: Vec<ProviderArticle>,
}

impl NewsSourceFetcher {
    pub fn new(cfg: NewsSourceConfig) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("daily-brief-jobs/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(10))
            .build()
            .expect("reqwest client");
        Self {
            http,
            cfg,
            quota: Mutex::new(DailyQuota::for_now(Utc::now())),
        }
    }

    fn take_quota(&self) -> Result<(), JobError> {
        let now = Utc::now();
        let mut quota = self.quota.lock().expect("quota mutex poisoned");
        *quota = quota.rolled_over(now);
        if quota.is_exhausted(self.cfg.daily_limit) {
            return Err(JobError::RateLimit {
                retry_after_secs: None,
                message: format!(
                    "{}: daily request limit ({}) reached",
                    self.cfg.name, self.cfg.daily_limit
                ),
            });
        }
        quota.record(now);
        Ok(())
    }
}

#[async_trait]
impl SourceFetcher for NewsSourceFetcher {
    fn name(&self) -> &str {
        &self.cfg.name
    }

    async fn fetch(&self) -> Result<Vec<Article>, JobError> {
        self.take_quota()?;

        let resp = self
            .http
            .get(&self.cfg.endpoint)
            .query(&[("q", self.cfg.query.as_str())])
            .header("X-Api-Key", &self.cfg.api_key)
            .send()
            .await
            .map_err(|e| transport_error(&self.cfg.name, e))?;

        let status = resp.status().as_u16();
        if status == 429 {
            return Err(JobError::RateLimit {
                retry_after_secs: retry_after_secs(&resp),
                message: format!("{}: provider rate limit", self.cfg.name),
            });
        }
        if !resp.status().is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(JobError::Upstream {
                provider: self.cfg.name.clone(),
                status,
                message,
            });
        }

        let body: ProviderResponse = resp
            .json()
            .await
            .map_err(|e| transport_error(&self.cfg.name, e))?;

        Ok(body
            .articles
            .into_iter()
            .map(|a| Article {
                title: a.title,
                url: a.url,
                source: a
                    .source
                    .map(|s| s.name)
                    .unwrap_or_else(|| self.cfg.name.clone()),
                published_at: a.published_at,
            })
            .collect())
    }
}
