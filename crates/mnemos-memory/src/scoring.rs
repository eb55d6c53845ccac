//! Ranking and eviction helpers shared by every tier.
//!
//! ## Composite score
//!
//! ```text
//! recency = 1 / (1 + age_in_days)
//! score   = (similarity × w + recency × (1 − w)) × (0.8 + importance × 0.4)
//! ```
//!
//! `w` is [`EPISODIC_SIMILARITY_WEIGHT`] for the working and episodic tiers
//! and [`SEMANTIC_SIMILARITY_WEIGHT`] for the semantic tier.  Holding
//! similarity and importance fixed, an older item never outranks a newer one.

use chrono::{DateTime, Duration, Utc};
use mnemos_index::{Vectorizer, cosine_similarity, tokenize};
use mnemos_types::{ForgetOptions, ForgetStrategy, MemoryError, MemoryItem};

/// Similarity share of the composite score for working and episodic recall.
pub const EPISODIC_SIMILARITY_WEIGHT: f32 = 0.8;
/// Similarity share of the composite score for semantic search.
pub const SEMANTIC_SIMILARITY_WEIGHT: f32 = 0.7;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Age of `ts` in fractional days, never negative.
pub fn age_days(ts: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let secs = (now - ts).num_milliseconds() as f64 / 1000.0;
    (secs / SECONDS_PER_DAY).max(0.0)
}

/// `1 / (1 + age_in_days)`.
pub fn recency(ts: DateTime<Utc>, now: DateTime<Utc>) -> f32 {
    (1.0 / (1.0 + age_days(ts, now))) as f32
}

/// Blend similarity and recency, then scale by importance.
pub fn composite_score(similarity: f32, recency: f32, importance: f32, similarity_weight: f32) -> f32 {
    (similarity * similarity_weight + recency * (1.0 - similarity_weight)) * (0.8 + importance * 0.4)
}

/// Fraction of `query_tokens` that occur as substrings of `content`
/// (case-insensitive).  Returns `0.0` for an empty query.
pub fn keyword_similarity(query_tokens: &[String], content: &str) -> f32 {
    if query_tokens.is_empty() {
        return 0.0;
    }
    let haystack = content.to_lowercase();
    let matched = query_tokens.iter().filter(|t| haystack.contains(t.as_str())).count();
    matched as f32 / query_tokens.len() as f32
}

/// Tokenize a query once for repeated [`keyword_similarity`] calls.
pub fn query_tokens(query: &str) -> Vec<String> {
    tokenize(query)
}

/// Human-readable age of `ts` relative to `now`.
///
/// `just now`, `N minutes ago`, `N hours ago`, `yesterday`, `N days ago`,
/// `N weeks ago`, or the absolute date beyond 30 days.
pub fn relative_time(ts: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now - ts;
    if elapsed < Duration::minutes(1) {
        "just now".to_string()
    } else if elapsed < Duration::hours(1) {
        format!("{} minutes ago", elapsed.num_minutes())
    } else if elapsed < Duration::hours(24) {
        format!("{} hours ago", elapsed.num_hours())
    } else if elapsed < Duration::hours(48) {
        "yesterday".to_string()
    } else if elapsed < Duration::days(7) {
        format!("{} days ago", elapsed.num_days())
    } else if elapsed <= Duration::days(30) {
        format!("{} weeks ago", elapsed.num_days() / 7)
    } else {
        ts.format("%Y-%m-%d").to_string()
    }
}

/// Anything a store can rank or forget.
pub trait Recollection {
    fn content(&self) -> &str;
    fn importance(&self) -> f32;
    fn timestamp(&self) -> DateTime<Utc>;
}

impl Recollection for MemoryItem {
    fn content(&self) -> &str {
        &self.content
    }
    fn importance(&self) -> f32 {
        self.importance
    }
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Two-tier ranking
// ─────────────────────────────────────────────────────────────────────────────

/// Rank `items` against `query` and return `(index, score)` pairs, best first.
///
/// `vectorizer` must have been fitted on the contents of `items` in order, so
/// that cached document `i` belongs to `items[i]`.  The first non-empty tier
/// wins:
///
/// 1. TF-IDF cosine, keeping items with similarity above zero, when the
///    vocabulary is non-empty;
/// 2. keyword overlap over every item.
///
/// Ties keep insertion order.
pub fn rank<T: Recollection>(
    items: &[T],
    vectorizer: &Vectorizer,
    query: &str,
    similarity_weight: f32,
    now: DateTime<Utc>,
) -> Vec<(usize, f32)> {
    let mut similarities: Vec<(usize, f32)> = Vec::new();

    if vectorizer.is_fitted() {
        let q = vectorizer.transform(query);
        similarities = items
            .iter()
            .enumerate()
            .filter_map(|(i, _)| {
                let doc = vectorizer.document_vector(i)?;
                let sim = cosine_similarity(&q, doc);
                (sim > 0.0).then_some((i, sim))
            })
            .collect();
    }

    if similarities.is_empty() {
        let tokens = query_tokens(query);
        similarities = items
            .iter()
            .enumerate()
            .map(|(i, item)| (i, keyword_similarity(&tokens, item.content())))
            .collect();
    }

    let mut scored: Vec<(usize, f32)> = similarities
        .into_iter()
        .map(|(i, sim)| {
            let item = &items[i];
            let score = composite_score(
                sim,
                recency(item.timestamp(), now),
                item.importance(),
                similarity_weight,
            );
            (i, score)
        })
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored
}

// ─────────────────────────────────────────────────────────────────────────────
// Forgetting
// ─────────────────────────────────────────────────────────────────────────────

/// Apply `strategy` to `items` in place and return how many were removed.
///
/// * [`ForgetStrategy::Importance`] drops items below the threshold.
/// * [`ForgetStrategy::Time`] drops items older than `now - max_age_days`.
///   An age too large to represent keeps everything; a NaN or negative age
///   is [`MemoryError::InvalidInput`].
/// * [`ForgetStrategy::Capacity`] is a no-op at or under the target;
///   otherwise it keeps the `target` most important items and re-sorts them
///   chronologically.
pub fn apply_forget<T: Recollection>(
    items: &mut Vec<T>,
    strategy: ForgetStrategy,
    opts: &ForgetOptions,
    default_target: usize,
    now: DateTime<Utc>,
) -> Result<usize, MemoryError> {
    let before = items.len();
    match strategy {
        ForgetStrategy::Importance => {
            let threshold = opts.threshold();
            items.retain(|i| i.importance() >= threshold);
        }
        ForgetStrategy::Time => {
            if let Some(cutoff) = age_cutoff(opts.max_age_days(), now)? {
                items.retain(|i| i.timestamp() >= cutoff);
            }
        }
        ForgetStrategy::Capacity => {
            let target = opts.target_size_or(default_target);
            if items.len() <= target {
                return Ok(0);
            }
            items.sort_by(|a, b| b.importance().total_cmp(&a.importance()));
            items.truncate(target);
            items.sort_by_key(|i| i.timestamp());
        }
    }
    Ok(before - items.len())
}

/// `now - max_age_days`, or `None` when that instant is out of range.
fn age_cutoff(max_age_days: f64, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, MemoryError> {
    if max_age_days.is_nan() || max_age_days < 0.0 {
        return Err(MemoryError::InvalidInput(format!(
            "max_age_days must be a non-negative number, got {max_age_days}"
        )));
    }
    let millis = max_age_days * SECONDS_PER_DAY * 1000.0;
    if millis >= i64::MAX as f64 {
        return Ok(None);
    }
    Ok(Duration::try_milliseconds(millis as i64).and_then(|age| now.checked_sub_signed(age)))
}
