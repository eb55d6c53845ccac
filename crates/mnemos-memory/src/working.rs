//! Working Memory Store.
//!
//! A bounded, time-boxed window of recent conversational items.
//!
//! * **Size bound** – when more than `max_items` are held, the oldest excess
//!   items are evicted (FIFO on insertion, not LRU on access).
//! * **TTL** – items older than `ttl_secs` are dropped before reads
//!   (`ttl_secs = 0` disables expiry).
//! * **Token budget** – [`WorkingStore::get_messages_within_token_limit`]
//!   walks from newest to oldest, estimating `chars / 3` tokens per item, and
//!   stops at the first item that would exceed the budget.
//!
//! Retrieval uses the same similarity/recency/importance composite as the
//! episodic tier, backed by a store-local [`Vectorizer`].
//!
//! # Example
//!
//! ```rust
//! # tokio_test_block(async {
//! use mnemos_memory::working::{WorkingConfig, WorkingStore};
//!
//! let store = WorkingStore::new(WorkingConfig::default());
//! store.add_message("user", "How do I pin a future?").await.unwrap();
//! store.add_message("assistant", "Use Box::pin or the pin! macro.").await.unwrap();
//!
//! let history = store.get_history(0).await;
//! assert_eq!(history.len(), 2);
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f);
//! # }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use mnemos_index::Vectorizer;
use mnemos_types::{
    DEFAULT_CAPACITY_TARGET, DEFAULT_IMPORTANCE, ForgetOptions, ForgetStrategy, MemoryError,
    MemoryItem, MemoryStats, MemoryType, MemoryUpdate, Metadata, RetrieveOptions, ScoredItem,
};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::scoring::{
    EPISODIC_SIMILARITY_WEIGHT, apply_forget, composite_score, keyword_similarity, query_tokens,
    rank, recency,
};
use crate::traits::{Forgetter, Memory};

/// Metadata key holding the speaker of a conversational item.
pub const ROLE_KEY: &str = "role";

/// Rough token estimate used for the working-memory budget.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 3
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for [`WorkingStore`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkingConfig {
    /// Maximum number of items held; `0` disables the bound.
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    /// Token budget for context assembly.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    /// Time-to-live in seconds; `0` disables expiry.
    #[serde(default)]
    pub ttl_secs: u64,
}

fn default_max_items() -> usize {
    100
}
fn default_max_tokens() -> usize {
    4000
}

impl Default for WorkingConfig {
    fn default() -> Self {
        Self {
            max_items: default_max_items(),
            max_tokens: default_max_tokens(),
            ttl_secs: 0,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// WorkingStore
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct WorkingState {
    /// Oldest first.
    items: Vec<MemoryItem>,
    vectorizer: Vectorizer,
}

impl WorkingState {
    fn reindex(&mut self) {
        let docs: Vec<&str> = self.items.iter().map(|i| i.content.as_str()).collect();
        self.vectorizer.fit_transform(&docs);
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.items.iter().position(|i| i.id == id)
    }
}

/// Recency window of conversational items.
pub struct WorkingStore {
    config: WorkingConfig,
    state: RwLock<WorkingState>,
}

impl Default for WorkingStore {
    fn default() -> Self {
        Self::new(WorkingConfig::default())
    }
}

impl WorkingStore {
    pub fn new(config: WorkingConfig) -> Self {
        Self {
            config,
            state: RwLock::new(WorkingState::default()),
        }
    }

    pub fn config(&self) -> &WorkingConfig {
        &self.config
    }

    /// Record a conversational turn with default importance.
    pub async fn add_message(&self, role: &str, content: &str) -> Result<String, MemoryError> {
        self.add_message_with_importance(role, content, DEFAULT_IMPORTANCE).await
    }

    /// Record a conversational turn with an explicit importance.
    pub async fn add_message_with_importance(
        &self,
        role: &str,
        content: &str,
        importance: f32,
    ) -> Result<String, MemoryError> {
        let mut metadata = Metadata::new();
        metadata.insert(ROLE_KEY.to_string(), role.into());
        let item = MemoryItem::new(content, MemoryType::Working, importance)?.with_metadata(metadata);
        self.insert(item).await
    }

    async fn insert(&self, item: MemoryItem) -> Result<String, MemoryError> {
        item.validate()?;
        let id = item.id.clone();
        let mut state = self.state.write().await;
        state.items.push(item);
        if self.config.max_items > 0 && state.items.len() > self.config.max_items {
            let excess = state.items.len() - self.config.max_items;
            state.items.drain(..excess);
            debug!(evicted = excess, "working memory over capacity");
        }
        state.reindex();
        Ok(id)
    }

    /// Oldest timestamp still live, or `None` when nothing can expire
    /// (TTL disabled, or too long to represent).
    fn expiry_cutoff(&self) -> Option<DateTime<Utc>> {
        if self.config.ttl_secs == 0 {
            return None;
        }
        let secs = i64::try_from(self.config.ttl_secs).ok()?;
        Duration::try_seconds(secs).and_then(|ttl| Utc::now().checked_sub_signed(ttl))
    }

    /// Drop expired items; returns how many were removed.
    fn purge_expired(&self, state: &mut WorkingState) -> usize {
        let Some(cutoff) = self.expiry_cutoff() else {
            return 0;
        };
        let before = state.items.len();
        state.items.retain(|i| i.timestamp >= cutoff);
        let removed = before - state.items.len();
        if removed > 0 {
            debug!(removed, "expired working memory items");
            state.reindex();
        }
        removed
    }

    /// The most recent `limit` live items in chronological order
    /// (`0` returns all).
    pub async fn get_history(&self, limit: usize) -> Vec<MemoryItem> {
        let mut state = self.state.write().await;
        self.purge_expired(&mut state);
        let start = if limit == 0 {
            0
        } else {
            state.items.len().saturating_sub(limit)
        };
        state.items[start..].to_vec()
    }

    /// The `n` newest live items, newest first.
    pub async fn get_recent(&self, n: usize) -> Vec<MemoryItem> {
        let mut state = self.state.write().await;
        self.purge_expired(&mut state);
        state.items.iter().rev().take(n).cloned().collect()
    }

    /// Items at or above `threshold`, most important first.
    pub async fn get_important(&self, threshold: f32) -> Vec<MemoryItem> {
        let mut state = self.state.write().await;
        self.purge_expired(&mut state);
        let mut items: Vec<MemoryItem> = state
            .items
            .iter()
            .filter(|i| i.importance >= threshold)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        items
    }

    /// Greedily take items from newest to oldest while the estimated token
    /// total stays within `max_tokens`.  The result is chronological.
    pub async fn get_messages_within_token_limit(&self, max_tokens: usize) -> Vec<MemoryItem> {
        let mut state = self.state.write().await;
        self.purge_expired(&mut state);
        let mut used = 0usize;
        let mut picked = Vec::new();
        for item in state.items.iter().rev() {
            let tokens = estimate_tokens(&item.content);
            if used + tokens > max_tokens {
                break;
            }
            used += tokens;
            picked.push(item.clone());
        }
        picked.reverse();
        picked
    }

    /// Plain-text digest of the window that fits the configured token
    /// budget, one `role: content` line per item.
    pub async fn get_context_summary(&self) -> String {
        let items = self.get_messages_within_token_limit(self.config.max_tokens).await;
        items
            .iter()
            .map(|i| {
                let role = i
                    .metadata
                    .get(ROLE_KEY)
                    .and_then(|v| v.as_str())
                    .unwrap_or("memory");
                format!("{role}: {}", i.content)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Score `item` against `query` with the composite used by
    /// [`retrieve_scored`][Self::retrieve_scored].
    pub async fn calculate_score(&self, item: &MemoryItem, query: &str) -> f32 {
        let state = self.state.read().await;
        let similarity = if state.vectorizer.is_fitted() {
            let q = state.vectorizer.transform(query);
            let d = state.vectorizer.transform(&item.content);
            mnemos_index::cosine_similarity(&q, &d)
        } else {
            keyword_similarity(&query_tokens(query), &item.content)
        };
        composite_score(
            similarity,
            recency(item.timestamp, Utc::now()),
            item.importance,
            EPISODIC_SIMILARITY_WEIGHT,
        )
    }

    /// Rank live items against `query`.
    pub async fn retrieve_scored(&self, query: &str, opts: &RetrieveOptions) -> Vec<ScoredItem> {
        let mut state = self.state.write().await;
        self.purge_expired(&mut state);
        let ranked = rank(
            &state.items,
            &state.vectorizer,
            query,
            EPISODIC_SIMILARITY_WEIGHT,
            Utc::now(),
        );
        let mut results: Vec<ScoredItem> = ranked
            .into_iter()
            .filter(|(i, _)| match &opts.user_id {
                Some(user) => &state.items[*i].user_id == user,
                None => true,
            })
            .filter(|(_, score)| opts.min_score.is_none_or(|min| *score >= min))
            .map(|(i, score)| ScoredItem { item: state.items[i].clone(), score })
            .collect();
        if opts.limit > 0 {
            results.truncate(opts.limit);
        }
        results
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.items.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.items.is_empty()
    }
}

#[async_trait]
impl Memory for WorkingStore {
    fn memory_type(&self) -> MemoryType {
        MemoryType::Working
    }

    async fn add(&self, item: MemoryItem) -> Result<String, MemoryError> {
        self.insert(item).await
    }

    async fn retrieve(
        &self,
        query: &str,
        opts: &RetrieveOptions,
    ) -> Result<Vec<MemoryItem>, MemoryError> {
        Ok(self
            .retrieve_scored(query, opts)
            .await
            .into_iter()
            .map(|s| s.item)
            .collect())
    }

    async fn update(&self, id: &str, update: MemoryUpdate) -> Result<(), MemoryError> {
        let mut state = self.state.write().await;
        let pos = state
            .position(id)
            .ok_or_else(|| MemoryError::NotFound(id.to_string()))?;
        state.items[pos].apply(&update)?;
        if update.content.is_some() {
            state.reindex();
        }
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<(), MemoryError> {
        let mut state = self.state.write().await;
        let pos = state
            .position(id)
            .ok_or_else(|| MemoryError::NotFound(id.to_string()))?;
        state.items.remove(pos);
        state.reindex();
        Ok(())
    }

    async fn has(&self, id: &str) -> bool {
        self.state.read().await.position(id).is_some()
    }

    async fn clear(&self) -> Result<(), MemoryError> {
        let mut state = self.state.write().await;
        state.items.clear();
        state.vectorizer.clear();
        Ok(())
    }

    async fn stats(&self) -> MemoryStats {
        let state = self.state.read().await;
        MemoryStats::collect(state.items.iter().map(|i| (i.timestamp, i.importance)))
    }

    fn forgetter(&self) -> Option<&dyn Forgetter> {
        Some(self)
    }
}

/// Capacity passes default to [`DEFAULT_CAPACITY_TARGET`]; `max_items` only bounds inserts.
#[async_trait]
impl Forgetter for WorkingStore {
    async fn forget(
        &self,
        strategy: ForgetStrategy,
        opts: &ForgetOptions,
    ) -> Result<usize, MemoryError> {
        let mut state = self.state.write().await;
        let removed = apply_forget(
            &mut state.items,
            strategy,
            opts,
            DEFAULT_CAPACITY_TARGET,
            Utc::now(),
        )?;
        state.reindex();
        debug!(?strategy, removed, "working memory forget");
        Ok(removed)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
