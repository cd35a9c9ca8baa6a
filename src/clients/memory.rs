//! In-memory storage and history repository.
//!
//! Satisfies the persistence contracts for local runs and end-to-end tests.
//! Upserts are last-write-wins keyed by date, matching what the real store
//! guarantees.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::error::JobError;
use crate::jobs::{HistoryRepository, NewsRecord, Storage, TermRecord};

#[derive(Default)]
struct Inner {
    news: HashMap<String, NewsRecord>,
    terms: Vec<TermRecord>,
    metadata: HashMap<String, DateTime<Utc>>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-load delivered terms, for seeding test scenarios.
    pub fn with_terms(terms: Vec<TermRecord>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                terms,
                ..Inner::default()
            }),
        }
    }

    pub fn news_for(&self, date: &str) -> Option<NewsRecord> {
        self.inner
            .lock()
            .expect("store mutex poisoned")
            .news
            .get(date)
            .cloned()
    }

    pub fn terms(&self) -> Vec<TermRecord> {
        self.inner.lock().expect("store mutex poisoned").terms.clone()
    }

    pub fn metadata(&self, field: &str) -> Option<DateTime<Utc>> {
        self.inner
            .lock()
            .expect("store mutex poisoned")
            .metadata
            .get(field)
            .copied()
    }
}

#[async_trait]
impl Storage for MemoryStore {
    async fn upsert(&self, record: &NewsRecord) -> Result<(), JobError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        inner.news.insert(record.date.clone(), record.clone());
        Ok(())
    }

    async fn insert_many(&self, records: &[TermRecord]) -> Result<(), JobError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        inner.terms.extend_from_slice(records);
        Ok(())
    }

    async fn update_metadata(&self, field: &str, at: DateTime<Utc>) -> Result<(), JobError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        inner.metadata.insert(field.to_string(), at);
        Ok(())
    }
}

#[async_trait]
impl HistoryRepository for MemoryStore {
    async fn delivered_names(&self, lookback_days: u32) -> Result<Vec<String>, JobError> {
        let cutoff = (Utc::now() - Duration::days(lookback_days as i64))
            .date_naive()
            .to_string();
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner
            .terms
            .iter()
            .filter(|t| t.date.as_str() >= cutoff.as_str())
            .map(|t| t.name.clone())
            .collect())
    }
}
