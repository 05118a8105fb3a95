//! Novelty classification of strategy summaries against the persistent corpus.
//!
//! Each run fits a fresh TF-IDF space over every stored record plus the
//! incoming batch, then walks the batch in order. Every item is compared
//! against all stored records and all batch items processed before it, so
//! duplicates inside one batch are caught too. Every item is upserted into
//! the store whatever its classification: duplicates are flagged, not dropped.
//!
//! Because the vocabulary is rebuilt every run, scores for the same pair can
//! drift as the corpus grows.

mod stopwords;
pub mod tfidf;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use strategy_scout_shared::{
    Classification, DedupedStrategy, Result, ScoutError, SimilarityConfig, SimilarityResult,
    StrategyRecord, StrategySummary,
};
use strategy_scout_storage::{StrategyStore, UpsertOutcome};

use crate::tfidf::{SparseVector, TfidfModel, cosine, tokenize};

/// Map a similarity score onto a class.
///
/// Lower bounds are inclusive: a score equal to a threshold lands in the
/// higher-similarity class.
pub fn classify(score: f64, config: &SimilarityConfig) -> Classification {
    if score >= config.duplicate_threshold {
        Classification::Duplicate
    } else if score >= config.similar_threshold {
        Classification::Similar
    } else {
        Classification::Novel
    }
}

/// Per-run dedup counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupStats {
    pub duplicate: usize,
    pub similar: usize,
    pub novel: usize,
    pub inserted: usize,
    pub updated: usize,
}

/// Output of one dedup pass.
#[derive(Debug, Clone)]
pub struct DedupOutcome {
    /// Annotated batch, same order and length as the input.
    pub strategies: Vec<DedupedStrategy>,
    pub results: Vec<SimilarityResult>,
    pub stats: DedupStats,
}

/// TF-IDF cosine similarity engine.
#[derive(Debug, Clone)]
pub struct SimilarityEngine {
    config: SimilarityConfig,
}

impl SimilarityEngine {
    pub fn new(config: SimilarityConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SimilarityConfig {
        &self.config
    }

    /// Classify `batch` against `store`, upserting every item.
    ///
    /// `seen_at` stamps `first_seen`/`last_seen` on the upserted records.
    #[instrument(skip_all, fields(stored = store.len(), batch = batch.len()))]
    pub fn dedup_batch(
        &self,
        store: &mut StrategyStore,
        batch: Vec<StrategySummary>,
        seen_at: DateTime<Utc>,
    ) -> Result<DedupOutcome> {
        let remove_stop_words = self.config.remove_stop_words;

        let stored: Vec<(String, Vec<String>)> = store
            .all()
            .map(|r| {
                (
                    r.id().to_string(),
                    tokenize(&r.summary.corpus_text(), remove_stop_words),
                )
            })
            .collect();
        let incoming: Vec<Vec<String>> = batch
            .iter()
            .map(|s| tokenize(&s.corpus_text(), remove_stop_words))
            .collect();

        let corpus: Vec<&[String]> = stored
            .iter()
            .map(|(_, tokens)| tokens.as_slice())
            .chain(incoming.iter().map(Vec::as_slice))
            .collect();
        let model = TfidfModel::fit(&corpus);

        debug!(
            documents = corpus.len(),
            vocabulary = model.vocabulary_len(),
            "tf-idf space fitted"
        );

        let mut comparison = ComparisonSet::default();
        for (id, tokens) in &stored {
            comparison.insert(id.clone(), model.transform(tokens));
        }

        let mut outcome = DedupOutcome {
            strategies: Vec::with_capacity(batch.len()),
            results: Vec::with_capacity(batch.len()),
            stats: DedupStats::default(),
        };

        for (summary, tokens) in batch.into_iter().zip(incoming.iter()) {
            let vector = model.transform(tokens);
            let result = self.compare(&summary.id, &vector, &comparison)?;

            match result.classification {
                Classification::Duplicate => outcome.stats.duplicate += 1,
                Classification::Similar => outcome.stats.similar += 1,
                Classification::Novel => outcome.stats.novel += 1,
            }
            info!(
                id = %summary.id,
                score = result.score,
                classification = %result.classification,
                best_match = result.best_match.as_deref().unwrap_or("-"),
                "classified"
            );

            let deduped = DedupedStrategy::annotate(summary.clone(), &result);
            // A record never points back at itself.
            let back_reference = deduped
                .duplicate_of
                .clone()
                .filter(|target| *target != summary.id);

            match store.upsert(StrategyRecord::sighted(summary.clone(), seen_at, back_reference)) {
                UpsertOutcome::Inserted => outcome.stats.inserted += 1,
                UpsertOutcome::Updated => outcome.stats.updated += 1,
            }

            comparison.insert(summary.id, vector);
            outcome.strategies.push(deduped);
            outcome.results.push(result);
        }

        info!(
            duplicate = outcome.stats.duplicate,
            similar = outcome.stats.similar,
            novel = outcome.stats.novel,
            inserted = outcome.stats.inserted,
            updated = outcome.stats.updated,
            "dedup complete"
        );

        Ok(outcome)
    }

    /// Best match of `vector` within `comparison`. Ties keep the earliest entry.
    fn compare(
        &self,
        target: &str,
        vector: &SparseVector,
        comparison: &ComparisonSet,
    ) -> Result<SimilarityResult> {
        let mut best: Option<(&str, f64)> = None;
        for (id, candidate) in comparison.iter() {
            let raw = cosine(vector, candidate);
            if !raw.is_finite() {
                return Err(ScoutError::Similarity(format!(
                    "non-finite similarity between '{target}' and '{id}'"
                )));
            }
            if best.is_none_or(|(_, score)| raw > score) {
                best = Some((id, raw));
            }
        }

        // Nothing to compare against: novel whatever the thresholds say.
        let Some((id, raw)) = best else {
            return Ok(SimilarityResult {
                target: target.to_string(),
                best_match: None,
                score: 0.0,
                classification: Classification::Novel,
            });
        };

        let score = self.round(raw)?;
        if !score.is_finite() {
            return Err(ScoutError::Similarity(format!(
                "score between '{target}' and '{id}' is not finite after rounding"
            )));
        }

        Ok(SimilarityResult {
            target: target.to_string(),
            best_match: Some(id.to_string()),
            score,
            classification: classify(score, &self.config),
        })
    }

    fn round(&self, raw: f64) -> Result<f64> {
        let decimals = i32::try_from(self.config.score_decimals).map_err(|_| {
            ScoutError::Similarity(format!(
                "score_decimals {} is out of range",
                self.config.score_decimals
            ))
        })?;
        let factor = 10f64.powi(decimals);
        Ok(((raw * factor).round() / factor).clamp(0.0, 1.0))
    }
}

/// Vectors compared against, in insertion order, keyed by identifier.
#[derive(Debug, Default)]
struct ComparisonSet {
    entries: Vec<(String, SparseVector)>,
    index: HashMap<String, usize>,
}

impl ComparisonSet {
    /// Append a vector, or replace the vector already held for `id`.
    fn insert(&mut self, id: String, vector: SparseVector) {
        match self.index.get(&id) {
            Some(&position) => self.entries[position].1 = vector,
            None => {
                self.index.insert(id.clone(), self.entries.len());
                self.entries.push((id, vector));
            }
        }
    }

    fn iter(&self) -> impl Iterator<Item = (&str, &SparseVector)> {
        self.entries.iter().map(|(id, v)| (id.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use chrono::Duration;

    const RSI_TEXT: &str = "RSI reversal entry on 4-hour candles, exit on trailing stop";

    fn temp_store() -> (PathBuf, StrategyStore) {
        let dir =
            std::env::temp_dir().join(format!("scout-similarity-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        let store = StrategyStore::load(&dir.join("strategy_db.json")).unwrap();
        (dir, store)
    }

    fn engine() -> SimilarityEngine {
        SimilarityEngine::new(SimilarityConfig::default())
    }

    fn summary(id: &str, concept: &str) -> StrategySummary {
        StrategySummary::new(id, concept)
    }

    #[test]
    fn thresholds_are_inclusive_lower_bounds() {
        let config = SimilarityConfig::default();
        assert_eq!(classify(0.8, &config), Classification::Duplicate);
        assert_eq!(classify(0.7999, &config), Classification::Similar);
        assert_eq!(classify(0.5, &config), Classification::Similar);
        assert_eq!(classify(0.4999, &config), Classification::Novel);
        assert_eq!(classify(1.0, &config), Classification::Duplicate);
        assert_eq!(classify(0.0, &config), Classification::Novel);
    }

    #[test]
    fn configured_thresholds_are_honoured() {
        let config = SimilarityConfig {
            duplicate_threshold: 0.9,
            similar_threshold: 0.3,
            ..SimilarityConfig::default()
        };
        assert_eq!(classify(0.85, &config), Classification::Similar);
        assert_eq!(classify(0.3, &config), Classification::Similar);
        assert_eq!(classify(0.29, &config), Classification::Novel);
    }

    #[test]
    fn empty_store_single_item_is_novel() {
        let (dir, mut store) = temp_store();
        let outcome = engine()
            .dedup_batch(&mut store, vec![summary("a/rsi", RSI_TEXT)], Utc::now())
            .unwrap();

        let result = &outcome.results[0];
        assert_eq!(result.classification, Classification::Novel);
        assert_eq!(result.score, 0.0);
        assert!(result.best_match.is_none());
        assert_eq!(store.len(), 1);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn no_candidates_is_novel_even_with_zero_similar_threshold() {
        let (dir, mut store) = temp_store();
        let engine = SimilarityEngine::new(SimilarityConfig {
            similar_threshold: 0.0,
            ..SimilarityConfig::default()
        });
        let outcome = engine
            .dedup_batch(&mut store, vec![summary("a/x", RSI_TEXT)], Utc::now())
            .unwrap();

        let deduped = &outcome.strategies[0];
        assert_eq!(deduped.classification, Classification::Novel);
        assert!(deduped.duplicate_of.is_none());
        assert!(deduped.validate().is_ok());
        assert_eq!(outcome.stats.novel, 1);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn unrepresentable_rounding_is_an_error() {
        let (dir, mut store) = temp_store();
        store.upsert(StrategyRecord::sighted(
            summary("a/rsi", RSI_TEXT),
            Utc::now(),
            None,
        ));
        let engine = SimilarityEngine::new(SimilarityConfig {
            score_decimals: 400,
            ..SimilarityConfig::default()
        });
        let err = engine
            .dedup_batch(&mut store, vec![summary("b/rsi", RSI_TEXT)], Utc::now())
            .unwrap_err();
        assert!(matches!(err, ScoutError::Similarity(_)));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn empty_store_distinct_batch_is_all_novel() {
        let (dir, mut store) = temp_store();
        let batch = vec![
            summary("a/rsi", "RSI reversal on 4-hour candles"),
            summary("b/bb", "Bollinger band squeeze breakout on equities"),
            summary("c/pairs", "Cointegrated pairs spread mean reversion"),
        ];
        let outcome = engine().dedup_batch(&mut store, batch, Utc::now()).unwrap();

        assert!(
            outcome
                .strategies
                .iter()
                .all(|s| s.classification == Classification::Novel)
        );
        assert_eq!(outcome.stats.novel, 3);
        assert_eq!(outcome.stats.inserted, 3);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn identical_text_against_store_is_duplicate() {
        let (dir, mut store) = temp_store();
        let first_seen = Utc::now() - Duration::days(7);
        store.upsert(StrategyRecord::sighted(
            summary("alice/rsi-bot", RSI_TEXT),
            first_seen,
            None,
        ));

        let now = Utc::now();
        let outcome = engine()
            .dedup_batch(&mut store, vec![summary("bob/rsi-clone", RSI_TEXT)], now)
            .unwrap();

        let deduped = &outcome.strategies[0];
        assert_eq!(deduped.classification, Classification::Duplicate);
        assert_eq!(deduped.similarity_score, 1.0);
        assert_eq!(deduped.duplicate_of.as_deref(), Some("alice/rsi-bot"));

        // Flagged, not removed: the duplicate is stored with its back-reference.
        let stored = store.get("bob/rsi-clone").unwrap();
        assert_eq!(stored.duplicate_of.as_deref(), Some("alice/rsi-bot"));
        assert_eq!(store.get("alice/rsi-bot").unwrap().first_seen, first_seen);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn resighting_same_identifier_updates_last_seen_only() {
        let (dir, mut store) = temp_store();
        let first_seen = Utc::now() - Duration::days(2);
        store.upsert(StrategyRecord::sighted(
            summary("alice/rsi-bot", RSI_TEXT),
            first_seen,
            None,
        ));

        let now = Utc::now();
        let outcome = engine()
            .dedup_batch(&mut store, vec![summary("alice/rsi-bot", RSI_TEXT)], now)
            .unwrap();

        assert_eq!(outcome.strategies[0].classification, Classification::Duplicate);
        assert_eq!(outcome.strategies[0].similarity_score, 1.0);
        assert_eq!(
            outcome.strategies[0].duplicate_of.as_deref(),
            Some("alice/rsi-bot")
        );

        assert_eq!(store.len(), 1);
        let stored = store.get("alice/rsi-bot").unwrap();
        assert_eq!(stored.first_seen, first_seen);
        assert_eq!(stored.last_seen, now);
        assert!(stored.duplicate_of.is_none());
        assert_eq!(outcome.stats.updated, 1);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn within_batch_duplicates_are_detected() {
        let (dir, mut store) = temp_store();
        let batch = vec![
            summary("a/rsi", RSI_TEXT),
            summary("b/macd", "MACD histogram momentum on daily equities"),
            summary("c/rsi-fork", RSI_TEXT),
        ];
        let outcome = engine().dedup_batch(&mut store, batch, Utc::now()).unwrap();

        assert_eq!(outcome.strategies.len(), 3);
        assert_eq!(outcome.strategies[0].classification, Classification::Novel);
        assert_eq!(outcome.strategies[2].classification, Classification::Duplicate);
        assert_eq!(outcome.strategies[2].duplicate_of.as_deref(), Some("a/rsi"));
        assert_eq!(store.len(), 3);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn output_preserves_batch_order_and_length() {
        let (dir, mut store) = temp_store();
        let ids = ["z/one", "a/two", "m/three", "a/two"];
        let batch: Vec<StrategySummary> = ids
            .iter()
            .map(|id| summary(id, "grid trading on ranging crypto pairs"))
            .collect();
        let outcome = engine().dedup_batch(&mut store, batch, Utc::now()).unwrap();

        let out_ids: Vec<&str> = outcome
            .strategies
            .iter()
            .map(|s| s.summary.id.as_str())
            .collect();
        assert_eq!(out_ids, ids);
        assert_eq!(store.len(), 3);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn item_without_indexable_text_is_novel() {
        let (dir, mut store) = temp_store();
        store.upsert(StrategyRecord::sighted(
            summary("a/rsi", RSI_TEXT),
            Utc::now(),
            None,
        ));
        let outcome = engine()
            .dedup_batch(&mut store, vec![summary("b/empty", "the of and")], Utc::now())
            .unwrap();

        assert_eq!(outcome.results[0].score, 0.0);
        assert_eq!(outcome.results[0].classification, Classification::Novel);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn scores_are_symmetric_between_stored_and_incoming() {
        let a = "Funding rate mean reversion on BTC perpetuals with RSI filter";
        let b = "RSI filter on BTC spot with funding rate signal";

        let (dir_ab, mut store_ab) = temp_store();
        store_ab.upsert(StrategyRecord::sighted(summary("a", a), Utc::now(), None));
        let ab = engine()
            .dedup_batch(&mut store_ab, vec![summary("b", b)], Utc::now())
            .unwrap();

        let (dir_ba, mut store_ba) = temp_store();
        store_ba.upsert(StrategyRecord::sighted(summary("b", b), Utc::now(), None));
        let ba = engine()
            .dedup_batch(&mut store_ba, vec![summary("a", a)], Utc::now())
            .unwrap();

        assert_eq!(ab.results[0].score, ba.results[0].score);
        assert!(ab.results[0].score > 0.0);

        let _ = std::fs::remove_dir_all(&dir_ab);
        let _ = std::fs::remove_dir_all(&dir_ba);
    }
}
