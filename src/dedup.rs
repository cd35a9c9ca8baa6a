//! # Duplicate Index
//! In-memory membership index over previously delivered item names.
//!
//! Built once per job invocation from a history snapshot, mutated only by
//! `add` as the invocation accepts new items. Never shared across concurrent
//! invocations and never persisted; the storage layer is the system of record.
//!
//! Similarity: `strsim::normalized_levenshtein` (`1 - distance / max_len`),
//! the same measure the rest of the pipeline uses for near-duplicate text.

use serde::Serialize;
use strsim::normalized_levenshtein;

use crate::normalize::normalize;

/// Default threshold for `MatchMode::Similarity`.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.7;

/// How strict a membership query is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Normalized equality only.
    Exact,
    /// Equality, or substring containment in either direction.
    Partial,
    /// Equality, or best Levenshtein similarity at or above the threshold.
    Similarity,
}

/// How a duplicate was matched, when one was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Exact,
    Partial,
    Similarity,
}

#[derive(Debug, Clone, Serialize)]
pub struct DuplicateCheckResult {
    pub candidate: String,
    pub is_duplicate: bool,
    /// The original (un-normalized) index entry that matched.
    pub matched_item: Option<String>,
    pub match_kind: Option<MatchKind>,
    pub similarity_score: Option<f64>,
}

impl DuplicateCheckResult {
    fn clean(candidate: &str) -> Self {
        Self {
            candidate: candidate.to_string(),
            is_duplicate: false,
            matched_item: None,
            match_kind: None,
            similarity_score: None,
        }
    }
}

/// Counters since construction or the last `reset_stats`.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct IndexStats {
    pub total_checks: u64,
    pub duplicates_found: u64,
}

#[derive(Debug, Clone)]
struct Entry {
    original: String,
    normalized: String,
}

/// Exclusively owned by one job invocation; no interior locking needed.
#[derive(Debug)]
pub struct DuplicateIndex {
    entries: Vec<Entry>,
    threshold: f64,
    stats: IndexStats,
}

/// Levenshtein-based similarity in `[0, 1]`; symmetric, and `1.0` for equal
/// strings (including two empty strings).
pub fn similarity(a: &str, b: &str) -> f64 {
    normalized_levenshtein(a, b)
}

impl DuplicateIndex {
    pub fn new<I, S>(history: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_threshold(history, DEFAULT_SIMILARITY_THRESHOLD)
    }

    pub fn with_threshold<I, S>(history: I, threshold: f64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entries = history
            .into_iter()
            .map(|s| {
                let original = s.into();
                let normalized = normalize(&original);
                Entry {
                    original,
                    normalized,
                }
            })
            .collect();
        Self {
            entries,
            threshold,
            stats: IndexStats::default(),
        }
    }

    /// Append an accepted item; subsequent checks see it immediately.
    pub fn add(&mut self, item: impl Into<String>) {
        let original = item.into();
        let normalized = normalize(&original);
        self.entries.push(Entry {
            original,
            normalized,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> IndexStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = IndexStats::default();
    }

    /// Membership query. An empty index never reports a duplicate.
    pub fn check(&mut self, candidate: &str, mode: MatchMode) -> DuplicateCheckResult {
        self.stats.total_checks += 1;
        let result = self.check_inner(candidate, mode);
        if result.is_duplicate {
            self.stats.duplicates_found += 1;
        }
        result
    }

    pub fn check_many(
        &mut self,
        candidates: &[String],
        mode: MatchMode,
    ) -> Vec<DuplicateCheckResult> {
        candidates.iter().map(|c| self.check(c, mode)).collect()
    }

    /// The subset of `candidates` that are duplicates.
    pub fn filter_duplicates(&mut self, candidates: &[String], mode: MatchMode) -> Vec<String> {
        self.check_many(candidates, mode)
            .into_iter()
            .filter(|r| r.is_duplicate)
            .map(|r| r.candidate)
            .collect()
    }

    /// The subset of `candidates` that are not duplicates.
    pub fn filter_non_duplicates(&mut self, candidates: &[String], mode: MatchMode) -> Vec<String> {
        self.check_many(candidates, mode)
            .into_iter()
            .filter(|r| !r.is_duplicate)
            .map(|r| r.candidate)
            .collect()
    }

    fn check_inner(&self, candidate: &str, mode: MatchMode) -> DuplicateCheckResult {
        let needle = normalize(candidate);

        // Exact matches win in every mode.
        if let Some(entry) = self.entries.iter().find(|e| e.normalized == needle) {
            return DuplicateCheckResult {
                candidate: candidate.to_string(),
                is_duplicate: true,
                matched_item: Some(entry.original.clone()),
                match_kind: Some(MatchKind::Exact),
                similarity_score: match mode {
                    MatchMode::Similarity => Some(1.0),
                    _ => None,
                },
            };
        }

        match mode {
            MatchMode::Exact => DuplicateCheckResult::clean(candidate),
            MatchMode::Partial => {
                // Substring containment in either direction. Empty strings
                // would contain-match everything, so they never match here.
                let hit = (!needle.is_empty()).then(|| {
                    self.entries.iter().find(|e| {
                        !e.normalized.is_empty()
                            && (needle.contains(&e.normalized) || e.normalized.contains(&needle))
                    })
                });
                match hit.flatten() {
                    Some(entry) => DuplicateCheckResult {
                        candidate: candidate.to_string(),
                        is_duplicate: true,
                        matched_item: Some(entry.original.clone()),
                        match_kind: Some(MatchKind::Partial),
                        similarity_score: None,
                    },
                    None => DuplicateCheckResult::clean(candidate),
                }
            }
            MatchMode::Similarity => {
                // Best score wins; ties keep the first entry in index order.
                let mut best: Option<(&Entry, f64)> = None;
                for entry in &self.entries {
                    let score = similarity(&needle, &entry.normalized);
                    if best.map_or(true, |(_, s)| score > s) {
                        best = Some((entry, score));
                    }
                }
                match best {
                    Some((entry, score)) if score >= self.threshold => DuplicateCheckResult {
                        candidate: candidate.to_string(),
                        is_duplicate: true,
                        matched_item: Some(entry.original.clone()),
                        match_kind: Some(MatchKind::Similarity),
                        similarity_score: Some(score),
                    },
                    Some((_, score)) => DuplicateCheckResult {
                        similarity_score: Some(score),
                        ..DuplicateCheckResult::clean(candidate)
                    },
                    None => DuplicateCheckResult::clean(candidate),
                }
            }
        }
    }
}
