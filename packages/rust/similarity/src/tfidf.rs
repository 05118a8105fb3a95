//! TF-IDF vectorization and cosine similarity over sparse vectors.
//!
//! Weighting: raw term counts, smoothed inverse document frequency
//! `ln((1 + n) / (1 + df)) + 1`, then L2 normalization. The vocabulary is
//! fitted per corpus and never persisted.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::stopwords::is_stop_word;

/// Tokens of two or more word characters.
static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?u)\b\w\w+\b").expect("valid regex"));

/// Lowercase and split `text` into indexable tokens.
pub fn tokenize(text: &str, remove_stop_words: bool) -> Vec<String> {
    let lowered = text.to_lowercase();
    TOKEN_RE
        .find_iter(&lowered)
        .map(|m| m.as_str())
        .filter(|token| !remove_stop_words || !is_stop_word(token))
        .map(str::to_string)
        .collect()
}

// ---------------------------------------------------------------------------
// SparseVector
// ---------------------------------------------------------------------------

/// Sparse vector with entries sorted by term index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseVector {
    entries: Vec<(usize, f64)>,
}

impl SparseVector {
    /// Build from `(term, weight)` pairs; zero weights are dropped.
    pub fn from_weights(weights: impl IntoIterator<Item = (usize, f64)>) -> Self {
        let mut entries: Vec<(usize, f64)> = weights.into_iter().filter(|(_, w)| *w != 0.0).collect();
        entries.sort_by_key(|(term, _)| *term);
        Self { entries }
    }

    pub fn is_zero(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn norm(&self) -> f64 {
        self.entries.iter().map(|(_, w)| w * w).sum::<f64>().sqrt()
    }

    /// Dot product by merge-join over term indices.
    ///
    /// Products are accumulated in ascending term order, so `a.dot(b)` and
    /// `b.dot(a)` perform identical floating-point operations.
    pub fn dot(&self, other: &SparseVector) -> f64 {
        let (mut i, mut j) = (0, 0);
        let mut sum = 0.0;
        while i < self.entries.len() && j < other.entries.len() {
            let (ti, wi) = self.entries[i];
            let (tj, wj) = other.entries[j];
            match ti.cmp(&tj) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    sum += wi * wj;
                    i += 1;
                    j += 1;
                }
            }
        }
        sum
    }

    fn normalized(mut self) -> Self {
        let norm = self.norm();
        if norm > 0.0 {
            for (_, w) in &mut self.entries {
                *w /= norm;
            }
        }
        self
    }
}

/// Cosine similarity of two non-negative vectors, in [0,1].
///
/// A zero vector has no direction; its similarity to anything is 0.
pub fn cosine(a: &SparseVector, b: &SparseVector) -> f64 {
    if a.is_zero() || b.is_zero() {
        return 0.0;
    }
    let denom = a.norm() * b.norm();
    if denom == 0.0 {
        return 0.0;
    }
    a.dot(b) / denom
}

// ---------------------------------------------------------------------------
// TfidfModel
// ---------------------------------------------------------------------------

/// Vocabulary and IDF weights fitted on one corpus.
#[derive(Debug, Clone)]
pub struct TfidfModel {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
}

impl TfidfModel {
    /// Fit the vocabulary and IDF weights on tokenized documents.
    pub fn fit<D: AsRef<[String]>>(documents: &[D]) -> Self {
        let n = documents.len() as f64;

        // Sorted vocabulary keeps term indices deterministic across runs.
        let mut document_frequency: BTreeMap<&str, usize> = BTreeMap::new();
        for doc in documents {
            let unique: HashSet<&str> = doc.as_ref().iter().map(String::as_str).collect();
            for term in unique {
                *document_frequency.entry(term).or_insert(0) += 1;
            }
        }

        let mut vocabulary = HashMap::with_capacity(document_frequency.len());
        let mut idf = Vec::with_capacity(document_frequency.len());
        for (index, (term, df)) in document_frequency.into_iter().enumerate() {
            vocabulary.insert(term.to_string(), index);
            idf.push(((1.0 + n) / (1.0 + df as f64)).ln() + 1.0);
        }

        Self { vocabulary, idf }
    }

    pub fn vocabulary_len(&self) -> usize {
        self.idf.len()
    }

    /// L2-normalized TF-IDF vector for a tokenized document.
    ///
    /// Terms outside the fitted vocabulary are ignored.
    pub fn transform(&self, tokens: &[String]) -> SparseVector {
        let mut counts: HashMap<usize, f64> = HashMap::new();
        for token in tokens {
            if let Some(&index) = self.vocabulary.get(token) {
                *counts.entry(index).or_insert(0.0) += 1.0;
            }
        }
        SparseVector::from_weights(
            counts
                .into_iter()
                .map(|(index, tf)| (index, tf * self.idf[index])),
        )
        .normalized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs(texts: &[&str]) -> Vec<Vec<String>> {
        texts.iter().map(|t| tokenize(t, true)).collect()
    }

    #[test]
    fn tokenize_lowercases_and_drops_short_tokens() {
        let tokens = tokenize("RSI reversal on 4-hour candles, exit at a stop", true);
        assert_eq!(tokens, vec!["rsi", "reversal", "hour", "candles", "exit", "stop"]);
    }

    #[test]
    fn tokenize_keeps_stop_words_when_asked() {
        let tokens = tokenize("exit on the stop", false);
        assert_eq!(tokens, vec!["exit", "on", "the", "stop"]);
    }

    #[test]
    fn idf_weights_rare_terms_higher() {
        let corpus = docs(&["rsi momentum", "rsi reversal", "rsi breakout"]);
        let model = TfidfModel::fit(&corpus);
        let common = model.idf[model.vocabulary["rsi"]];
        let rare = model.idf[model.vocabulary["momentum"]];
        assert!(rare > common);
        // Term present in every document: ln(4/4) + 1
        assert!((common - 1.0).abs() < 1e-12);
    }

    #[test]
    fn transformed_vectors_are_unit_length() {
        let corpus = docs(&["rsi momentum momentum", "macd crossover"]);
        let model = TfidfModel::fit(&corpus);
        let v = model.transform(&corpus[0]);
        assert!((v.norm() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn identical_documents_have_unit_similarity() {
        let corpus = docs(&[
            "RSI reversal entry on 4-hour candles, exit on trailing stop",
            "RSI reversal entry on 4-hour candles, exit on trailing stop",
            "Bollinger band squeeze breakout",
        ]);
        let model = TfidfModel::fit(&corpus);
        let a = model.transform(&corpus[0]);
        let b = model.transform(&corpus[1]);
        assert!((cosine(&a, &b) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn disjoint_documents_have_zero_similarity() {
        let corpus = docs(&["rsi reversal", "bollinger squeeze"]);
        let model = TfidfModel::fit(&corpus);
        let a = model.transform(&corpus[0]);
        let b = model.transform(&corpus[1]);
        assert_eq!(cosine(&a, &b), 0.0);
    }

    #[test]
    fn cosine_is_commutative() {
        let corpus = docs(&[
            "mean reversion on btc funding rate with rsi filter",
            "funding rate arbitrage between perpetual and spot btc",
            "rsi and macd momentum on daily equities",
        ]);
        let model = TfidfModel::fit(&corpus);
        let vectors: Vec<SparseVector> = corpus.iter().map(|d| model.transform(d)).collect();
        for a in &vectors {
            for b in &vectors {
                assert_eq!(cosine(a, b), cosine(b, a));
            }
        }
    }

    #[test]
    fn empty_document_is_zero_vector() {
        let corpus = docs(&["the and of", "rsi reversal"]);
        let model = TfidfModel::fit(&corpus);
        let empty = model.transform(&corpus[0]);
        assert!(empty.is_zero());
        assert_eq!(cosine(&empty, &model.transform(&corpus[1])), 0.0);
    }
}
