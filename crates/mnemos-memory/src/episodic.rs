//! Episodic Memory Store.
//!
//! An append-mostly log of timestamped [`Episode`]s, grouped by session.
//!
//! Every mutation rebuilds the store's [`Vectorizer`] over the full corpus
//! while the write lock is held, so a search never observes a half-built
//! index.  The rebuild is O(n) per write; the store targets small in-memory
//! corpora.
//!
//! | Operation | Order |
//! |-----------|-------|
//! | [`get_episodes`][EpisodicStore::get_episodes] | newest first |
//! | [`get_by_time_range`][EpisodicStore::get_by_time_range] | oldest first |
//! | [`get_most_important`][EpisodicStore::get_most_important] | importance descending |
//! | [`get_session_episodes`][EpisodicStore::get_session_episodes] | oldest first |
//! | [`retrieve_episodes`][EpisodicStore::retrieve_episodes] | score descending |
//! | [`get_timeline`][EpisodicStore::get_timeline] | oldest first |

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mnemos_index::{Vectorizer, is_cjk, tokenize};
use mnemos_types::{
    DEFAULT_CAPACITY_TARGET, DEFAULT_IMPORTANCE, ForgetOptions, ForgetStrategy, MemoryError,
    MemoryItem, MemoryStats, MemoryType, MemoryUpdate, Metadata, RetrieveOptions, clamp_unit,
    new_id,
};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::scoring::{EPISODIC_SIMILARITY_WEIGHT, Recollection, apply_forget, rank, relative_time};
use crate::traits::{Forgetter, Memory};

/// Metadata keys used when mapping a [`MemoryItem`] onto an [`Episode`].
pub const EPISODE_TYPE_KEY: &str = "episode_type";
pub const SESSION_ID_KEY: &str = "session_id";
pub const OUTCOME_KEY: &str = "outcome";

const DEFAULT_EPISODE_TYPE: &str = "event";
const PATTERN_EXAMPLES: usize = 3;

// ─────────────────────────────────────────────────────────────────────────────
// Episode
// ─────────────────────────────────────────────────────────────────────────────

/// A discrete, timestamped event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    pub id: String,
    /// Free-text type tag (`"event"`, `"conversation"`, `"task"`, …).
    pub episode_type: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Metadata,
    pub importance: f32,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub outcome: String,
    #[serde(default)]
    pub context: Option<serde_json::Value>,
    #[serde(default)]
    pub user_id: String,
    /// Cached TF-IDF vector; recomputed on every rebuild.
    #[serde(skip)]
    pub embedding: Vec<f32>,
}

impl Episode {
    pub fn new(episode_type: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            episode_type: episode_type.into(),
            content: content.into(),
            timestamp: Utc::now(),
            metadata: Metadata::new(),
            importance: DEFAULT_IMPORTANCE,
            session_id: String::new(),
            outcome: String::new(),
            context: None,
            user_id: String::new(),
            embedding: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    pub fn with_outcome(mut self, outcome: impl Into<String>) -> Self {
        self.outcome = outcome.into();
        self
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = Some(context);
        self
    }

    /// Importance is clamped to `[0, 1]`.
    pub fn with_importance(mut self, importance: f32) -> Self {
        self.importance = clamp_unit(importance);
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    /// View this episode as a cross-tier [`MemoryItem`].
    pub fn to_memory_item(&self) -> MemoryItem {
        let mut metadata = self.metadata.clone();
        metadata.insert(EPISODE_TYPE_KEY.into(), self.episode_type.clone().into());
        if !self.session_id.is_empty() {
            metadata.insert(SESSION_ID_KEY.into(), self.session_id.clone().into());
        }
        if !self.outcome.is_empty() {
            metadata.insert(OUTCOME_KEY.into(), self.outcome.clone().into());
        }
        MemoryItem {
            id: self.id.clone(),
            content: self.content.clone(),
            memory_type: MemoryType::Episodic,
            user_id: self.user_id.clone(),
            timestamp: self.timestamp,
            importance: self.importance,
            metadata,
        }
    }
}

fn metadata_text(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    }
}

impl From<MemoryItem> for Episode {
    fn from(item: MemoryItem) -> Self {
        let mut metadata = item.metadata;
        let mut take = |key: &str| metadata.remove(key).map(metadata_text);
        let episode_type = take(EPISODE_TYPE_KEY).unwrap_or_else(|| DEFAULT_EPISODE_TYPE.into());
        let session_id = take(SESSION_ID_KEY).unwrap_or_default();
        let outcome = take(OUTCOME_KEY).unwrap_or_default();
        Self {
            id: item.id,
            episode_type,
            content: item.content,
            timestamp: item.timestamp,
            metadata,
            importance: item.importance,
            session_id,
            outcome,
            context: None,
            user_id: item.user_id,
            embedding: Vec::new(),
        }
    }
}

impl Recollection for Episode {
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

/// An episode with its retrieval score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredEpisode {
    pub episode: Episode,
    pub score: f32,
}

/// Filter for [`EpisodicStore::get_episodes`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EpisodeFilter {
    /// Accepted episode types; empty accepts every type.
    #[serde(default)]
    pub types: Vec<String>,
    pub min_importance: Option<f32>,
    /// Maximum results; `0` means unlimited.
    #[serde(default)]
    pub limit: usize,
}

/// A recurring token found by [`EpisodicStore::find_patterns`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub token: String,
    /// Number of episodes containing the token.
    pub frequency: usize,
    /// Up to three ids of episodes containing the token.
    pub examples: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternOptions {
    #[serde(default = "default_min_frequency")]
    pub min_frequency: usize,
    #[serde(default = "default_max_patterns")]
    pub max_patterns: usize,
}

fn default_min_frequency() -> usize {
    2
}
fn default_max_patterns() -> usize {
    10
}

impl Default for PatternOptions {
    fn default() -> Self {
        Self {
            min_frequency: default_min_frequency(),
            max_patterns: default_max_patterns(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimelineOptions {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    /// `0` means unlimited.
    #[serde(default)]
    pub limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub episode: Episode,
    /// `"just now"`, `"3 hours ago"`, `"yesterday"`, …
    pub relative_time: String,
}

/// Configuration for [`EpisodicStore`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodicConfig {
    /// Default target for capacity forgetting.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY_TARGET
}

impl Default for EpisodicConfig {
    fn default() -> Self {
        Self { capacity: default_capacity() }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// EpisodicStore
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct EpisodicState {
    /// Insertion order.
    episodes: Vec<Episode>,
    sessions: HashMap<String, Vec<String>>,
    vectorizer: Vectorizer,
}

impl EpisodicState {
    fn position(&self, id: &str) -> Option<usize> {
        self.episodes.iter().position(|e| e.id == id)
    }

    /// Rebuild the session index and the vectorizer from the corpus.
    fn rebuild(&mut self) {
        self.sessions.clear();
        for ep in &self.episodes {
            if !ep.session_id.is_empty() {
                self.sessions.entry(ep.session_id.clone()).or_default().push(ep.id.clone());
            }
        }
        self.reindex_content();
    }

    fn reindex_content(&mut self) {
        let docs: Vec<&str> = self.episodes.iter().map(|e| e.content.as_str()).collect();
        let vectors = self.vectorizer.fit_transform(&docs);
        for (ep, v) in self.episodes.iter_mut().zip(vectors) {
            ep.embedding = v;
        }
    }
}

/// Session-indexed log of episodes.
pub struct EpisodicStore {
    config: EpisodicConfig,
    state: RwLock<EpisodicState>,
}

impl Default for EpisodicStore {
    fn default() -> Self {
        Self::new(EpisodicConfig::default())
    }
}

impl EpisodicStore {
    pub fn new(config: EpisodicConfig) -> Self {
        Self {
            config,
            state: RwLock::new(EpisodicState::default()),
        }
    }

    /// Append `episode`, assigning an id when it has none.
    ///
    /// An episode whose id is already present replaces the stored one.
    pub async fn add_episode(&self, mut episode: Episode) -> Result<String, MemoryError> {
        if episode.content.trim().is_empty() {
            return Err(MemoryError::InvalidInput("content must be non-empty".into()));
        }
        if episode.importance.is_nan() {
            return Err(MemoryError::InvalidInput("importance must be a number".into()));
        }
        if episode.id.is_empty() {
            episode.id = new_id();
        }
        if episode.episode_type.is_empty() {
            episode.episode_type = DEFAULT_EPISODE_TYPE.into();
        }
        episode.importance = clamp_unit(episode.importance);
        let id = episode.id.clone();

        let mut state = self.state.write().await;
        match state.position(&id) {
            Some(pos) => state.episodes[pos] = episode,
            None => state.episodes.push(episode),
        }
        state.rebuild();
        debug!(id = %id, total = state.episodes.len(), "episode recorded");
        Ok(id)
    }

    pub async fn get_episode(&self, id: &str) -> Option<Episode> {
        let state = self.state.read().await;
        state.position(id).map(|pos| state.episodes[pos].clone())
    }

    pub async fn remove_episode(&self, id: &str) -> Result<Episode, MemoryError> {
        let mut state = self.state.write().await;
        let pos = state
            .position(id)
            .ok_or_else(|| MemoryError::NotFound(id.to_string()))?;
        let removed = state.episodes.remove(pos);
        state.rebuild();
        Ok(removed)
    }

    /// Episodes matching `filter`, newest first.
    pub async fn get_episodes(&self, filter: &EpisodeFilter) -> Vec<Episode> {
        let state = self.state.read().await;
        let mut out: Vec<Episode> = state
            .episodes
            .iter()
            .filter(|e| filter.types.is_empty() || filter.types.contains(&e.episode_type))
            .filter(|e| filter.min_importance.is_none_or(|min| e.importance >= min))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        if filter.limit > 0 {
            out.truncate(filter.limit);
        }
        out
    }

    /// Episodes with `start <= timestamp <= end`, oldest first.
    pub async fn get_by_time_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<Episode> {
        let state = self.state.read().await;
        let mut out: Vec<Episode> = state
            .episodes
            .iter()
            .filter(|e| e.timestamp >= start && e.timestamp <= end)
            .cloned()
            .collect();
        out.sort_by_key(|e| e.timestamp);
        out
    }

    /// The `limit` most important episodes (`0` returns all).
    pub async fn get_most_important(&self, limit: usize) -> Vec<Episode> {
        let state = self.state.read().await;
        let mut out = state.episodes.clone();
        out.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        if limit > 0 {
            out.truncate(limit);
        }
        out
    }

    /// Every episode of `session_id`, oldest first.
    pub async fn get_session_episodes(&self, session_id: &str) -> Vec<Episode> {
        let state = self.state.read().await;
        let Some(ids) = state.sessions.get(session_id) else {
            return Vec::new();
        };
        let mut out: Vec<Episode> = ids
            .iter()
            .filter_map(|id| state.position(id).map(|pos| state.episodes[pos].clone()))
            .collect();
        out.sort_by_key(|e| e.timestamp);
        out
    }

    pub async fn session_ids(&self) -> Vec<String> {
        let state = self.state.read().await;
        let mut ids: Vec<String> = state.sessions.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Rank episodes against `query`.
    ///
    /// TF-IDF cosine is used while the vocabulary is non-empty and some
    /// episode shares a term with the query; otherwise every episode is
    /// scored by keyword overlap.  The `min_score` filter is applied after
    /// ranking.
    pub async fn retrieve_episodes(&self, query: &str, opts: &RetrieveOptions) -> Vec<ScoredEpisode> {
        let state = self.state.read().await;
        let ranked = rank(
            &state.episodes,
            &state.vectorizer,
            query,
            EPISODIC_SIMILARITY_WEIGHT,
            Utc::now(),
        );
        let mut out: Vec<ScoredEpisode> = ranked
            .into_iter()
            .filter(|(i, _)| match &opts.user_id {
                Some(user) => &state.episodes[*i].user_id == user,
                None => true,
            })
            .filter(|(_, score)| opts.min_score.is_none_or(|min| *score >= min))
            .map(|(i, score)| ScoredEpisode { episode: state.episodes[i].clone(), score })
            .collect();
        if opts.limit > 0 {
            out.truncate(opts.limit);
        }
        out
    }

    /// Tokens that recur across episodes.
    ///
    /// A token counts once per episode.  Single-character Latin tokens are
    /// ignored; single CJK characters are kept.
    pub async fn find_patterns(&self, opts: &PatternOptions) -> Vec<Pattern> {
        let state = self.state.read().await;
        let mut counts: HashMap<String, (usize, Vec<String>)> = HashMap::new();
        for ep in &state.episodes {
            let distinct: HashSet<String> = tokenize(&ep.content)
                .into_iter()
                .filter(|t| t.chars().count() > 1 || t.chars().all(is_cjk))
                .collect();
            for token in distinct {
                let entry = counts.entry(token).or_default();
                entry.0 += 1;
                if entry.1.len() < PATTERN_EXAMPLES {
                    entry.1.push(ep.id.clone());
                }
            }
        }
        let mut patterns: Vec<Pattern> = counts
            .into_iter()
            .filter(|(_, (freq, _))| *freq >= opts.min_frequency)
            .map(|(token, (frequency, examples))| Pattern { token, frequency, examples })
            .collect();
        patterns.sort_by(|a, b| b.frequency.cmp(&a.frequency).then_with(|| a.token.cmp(&b.token)));
        patterns.truncate(opts.max_patterns);
        patterns
    }

    /// Episodes inside the optional range, oldest first, each labelled with
    /// its age relative to now.
    pub async fn get_timeline(&self, opts: &TimelineOptions) -> Vec<TimelineEntry> {
        let now = Utc::now();
        let state = self.state.read().await;
        let mut episodes: Vec<&Episode> = state
            .episodes
            .iter()
            .filter(|e| opts.start.is_none_or(|s| e.timestamp >= s))
            .filter(|e| opts.end.is_none_or(|end| e.timestamp <= end))
            .collect();
        episodes.sort_by_key(|e| e.timestamp);
        if opts.limit > 0 {
            episodes.truncate(opts.limit);
        }
        episodes
            .into_iter()
            .map(|e| TimelineEntry {
                episode: e.clone(),
                relative_time: relative_time(e.timestamp, now),
            })
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.episodes.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.episodes.is_empty()
    }
}

#[async_trait]
impl Memory for EpisodicStore {
    fn memory_type(&self) -> MemoryType {
        MemoryType::Episodic
    }

    async fn add(&self, item: MemoryItem) -> Result<String, MemoryError> {
        item.validate()?;
        self.add_episode(Episode::from(item)).await
    }

    async fn retrieve(
        &self,
        query: &str,
        opts: &RetrieveOptions,
    ) -> Result<Vec<MemoryItem>, MemoryError> {
        Ok(self
            .retrieve_episodes(query, opts)
            .await
            .into_iter()
            .map(|s| s.episode.to_memory_item())
            .collect())
    }

    async fn update(&self, id: &str, update: MemoryUpdate) -> Result<(), MemoryError> {
        let mut state = self.state.write().await;
        let pos = state
            .position(id)
            .ok_or_else(|| MemoryError::NotFound(id.to_string()))?;
        let ep = &mut state.episodes[pos];
        if let Some(content) = &update.content {
            if content.trim().is_empty() {
                return Err(MemoryError::InvalidInput("content must be non-empty".into()));
            }
            ep.content = content.clone();
        }
        if let Some(importance) = update.importance {
            ep.importance = clamp_unit(importance);
        }
        let mut session_changed = false;
        if let Some(metadata) = &update.metadata {
            for (k, v) in metadata {
                match k.as_str() {
                    EPISODE_TYPE_KEY => {
                        let episode_type = metadata_text(v.clone());
                        ep.episode_type = if episode_type.is_empty() {
                            DEFAULT_EPISODE_TYPE.into()
                        } else {
                            episode_type
                        };
                    }
                    SESSION_ID_KEY => {
                        let session_id = metadata_text(v.clone());
                        session_changed |= session_id != ep.session_id;
                        ep.session_id = session_id;
                    }
                    OUTCOME_KEY => ep.outcome = metadata_text(v.clone()),
                    _ => {
                        ep.metadata.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        if session_changed {
            state.rebuild();
        } else if update.content.is_some() {
            state.reindex_content();
        }
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<(), MemoryError> {
        self.remove_episode(id).await.map(|_| ())
    }

    async fn has(&self, id: &str) -> bool {
        self.state.read().await.position(id).is_some()
    }

    async fn clear(&self) -> Result<(), MemoryError> {
        let mut state = self.state.write().await;
        state.episodes.clear();
        state.sessions.clear();
        state.vectorizer.clear();
        Ok(())
    }

    async fn stats(&self) -> MemoryStats {
        let state = self.state.read().await;
        MemoryStats::collect(state.episodes.iter().map(|e| (e.timestamp, e.importance)))
    }

    fn forgetter(&self) -> Option<&dyn Forgetter> {
        Some(self)
    }
}

#[async_trait]
impl Forgetter for EpisodicStore {
    async fn forget(
        &self,
        strategy: ForgetStrategy,
        opts: &ForgetOptions,
    ) -> Result<usize, MemoryError> {
        let mut state = self.state.write().await;
        let removed = apply_forget(
            &mut state.episodes,
            strategy,
            opts,
            self.config.capacity,
            Utc::now(),
        )?;
        state.rebuild();
        debug!(?strategy, removed, "episodic forget");
        Ok(removed)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
