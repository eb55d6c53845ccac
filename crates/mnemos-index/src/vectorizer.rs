//! TF-IDF Vectorizer.
//!
//! ## Model
//!
//! [`Vectorizer::fit`] tokenizes a corpus of `N` documents, builds a
//! lexicographically sorted vocabulary and computes one IDF weight per term:
//!
//! ```text
//! idf[w] = ln(N / df[w]) + 1
//! ```
//!
//! [`Vectorizer::transform`] weights every term present in a text by
//!
//! ```text
//! w = ln(1 + tf) × idf[w]
//! ```
//!
//! and L2-normalizes the result, so every produced vector has unit length or
//! is all zeros when the text shares no term with the vocabulary.  Because
//! vectors are pre-normalized, [`cosine_similarity`] is a plain dot product.
//!
//! Documents added with [`Vectorizer::add_document`] are transformed against
//! the current vocabulary without refitting; their IDF weights go stale until
//! the next [`fit`][Vectorizer::fit].
//!
//! # Example
//!
//! ```rust
//! use mnemos_index::Vectorizer;
//!
//! let mut v = Vectorizer::new();
//! v.fit_transform(&["the cat sat on the mat", "the dog ran in the park"]);
//!
//! let hits = v.search_similar("cat on a mat", 1);
//! assert_eq!(hits[0].index, 0);
//! ```

use std::collections::HashMap;

use tracing::debug;

use crate::tokenizer::tokenize;

// ─────────────────────────────────────────────────────────────────────────────
// Similarity helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Cosine similarity of two pre-normalized vectors (their dot product).
///
/// Returns `0.0` for mismatched lengths, empty vectors, or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Cosine similarity of two arbitrary vectors, normalizing on the fly.
///
/// Used for externally supplied embeddings whose norm is not guaranteed.
/// Returns `0.0` for mismatched lengths, empty vectors, or zero-norm vectors.
pub fn cosine_with_norms(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Vectorizer
// ─────────────────────────────────────────────────────────────────────────────

/// One result of [`Vectorizer::search_similar`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    /// Index of the cached document.
    pub index: usize,
    /// Cosine similarity to the query.
    pub score: f32,
}

/// TF-IDF index over a document corpus.
///
/// An unfitted vectorizer never errors: transforms return an empty vector and
/// searches return no hits.
#[derive(Debug, Clone, Default)]
pub struct Vectorizer {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f32>,
    documents: Vec<Vec<f32>>,
}

impl Vectorizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the vocabulary and IDF weights from `docs`.
    ///
    /// Replaces any previous vocabulary and drops the cached document vectors,
    /// which were computed against the old vocabulary.
    pub fn fit<S: AsRef<str>>(&mut self, docs: &[S]) {
        self.vocabulary.clear();
        self.idf.clear();
        self.documents.clear();
        if docs.is_empty() {
            return;
        }

        let mut df: HashMap<String, usize> = HashMap::new();
        for doc in docs {
            let mut seen: Vec<String> = tokenize(doc.as_ref());
            seen.sort_unstable();
            seen.dedup();
            for token in seen {
                *df.entry(token).or_default() += 1;
            }
        }

        let mut words: Vec<String> = df.keys().cloned().collect();
        words.sort_unstable();

        let n = docs.len() as f32;
        self.idf = words
            .iter()
            .map(|w| (n / df[w] as f32).ln() + 1.0)
            .collect();
        self.vocabulary = words
            .into_iter()
            .enumerate()
            .map(|(i, w)| (w, i))
            .collect();

        debug!(
            documents = docs.len(),
            vocabulary = self.vocabulary.len(),
            "vectorizer fitted"
        );
    }

    /// Turn `text` into an L2-normalized TF-IDF vector over the current
    /// vocabulary.  Returns an empty vector when the vocabulary is empty.
    pub fn transform(&self, text: &str) -> Vec<f32> {
        if self.vocabulary.is_empty() {
            return Vec::new();
        }
        let mut tf: HashMap<usize, u32> = HashMap::new();
        for token in tokenize(text) {
            if let Some(&idx) = self.vocabulary.get(&token) {
                *tf.entry(idx).or_default() += 1;
            }
        }
        let mut vector = vec![0.0f32; self.vocabulary.len()];
        for (idx, count) in tf {
            vector[idx] = (1.0 + count as f32).ln() * self.idf[idx];
        }
        l2_normalize(&mut vector);
        vector
    }

    /// Fit on `docs`, then transform and cache every document.
    pub fn fit_transform<S: AsRef<str>>(&mut self, docs: &[S]) -> Vec<Vec<f32>> {
        self.fit(docs);
        let vectors: Vec<Vec<f32>> = docs.iter().map(|d| self.transform(d.as_ref())).collect();
        self.documents = vectors.clone();
        vectors
    }

    /// Transform `text` against the current vocabulary (no refit) and append
    /// it to the cached documents.  Returns its index.
    pub fn add_document(&mut self, text: &str) -> usize {
        let vector = self.transform(text);
        self.documents.push(vector);
        self.documents.len() - 1
    }

    /// Score `query` against every cached document and return the `top_k`
    /// best hits by descending similarity.  Ties keep document order.
    pub fn search_similar(&self, query: &str, top_k: usize) -> Vec<SearchHit> {
        let q = self.transform(query);
        if q.is_empty() {
            return Vec::new();
        }
        let mut hits: Vec<SearchHit> = self
            .documents
            .iter()
            .enumerate()
            .map(|(index, doc)| SearchHit {
                index,
                score: cosine_similarity(&q, doc),
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(top_k);
        hits
    }

    /// Convenience wrapper around the free [`cosine_similarity`].
    pub fn cosine_similarity(&self, a: &[f32], b: &[f32]) -> f32 {
        cosine_similarity(a, b)
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary.len()
    }

    /// Column index of `word` in produced vectors.
    pub fn index_of(&self, word: &str) -> Option<usize> {
        self.vocabulary.get(word).copied()
    }

    pub fn is_fitted(&self) -> bool {
        !self.vocabulary.is_empty()
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    pub fn document_vector(&self, index: usize) -> Option<&[f32]> {
        self.documents.get(index).map(Vec::as_slice)
    }

    /// Forget the vocabulary and every cached document.
    pub fn clear(&mut self) {
        self.vocabulary.clear();
        self.idf.clear();
        self.documents.clear();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
