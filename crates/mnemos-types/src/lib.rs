//! `mnemos-types` – shared vocabulary of the memory engine.
//!
//! Every store, the manager, and any caller that talks to them agree on the
//! records defined here: the canonical [`MemoryItem`], the [`MemoryType`]
//! routing key, the option records passed to reads, writes and bulk
//! forgetting, and the [`MemoryError`] taxonomy.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Open key/value metadata attached to items, episodes and graph nodes.
pub type Metadata = HashMap<String, serde_json::Value>;

/// Importance threshold below which [`ForgetStrategy::Importance`] drops items.
pub const DEFAULT_FORGET_THRESHOLD: f32 = 0.3;
/// Maximum age kept by [`ForgetStrategy::Time`].
pub const DEFAULT_MAX_AGE_DAYS: f64 = 30.0;
/// Number of items kept by [`ForgetStrategy::Capacity`].
pub const DEFAULT_CAPACITY_TARGET: usize = 1000;
/// Default result limit for retrieval.
pub const DEFAULT_RETRIEVE_LIMIT: usize = 10;
/// Importance assigned when a caller supplies none.
pub const DEFAULT_IMPORTANCE: f32 = 0.5;

/// Clamp `value` into `[0, 1]`, mapping NaN to `0.0`.
pub fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}

/// Generate a fresh UUID v4 identifier.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

// ─────────────────────────────────────────────────────────────────────────────
// MemoryType
// ─────────────────────────────────────────────────────────────────────────────

/// Logical memory tier, also used as the manager's registry key.
///
/// Serialized as a lowercase string (`"working"`, `"episodic"`,
/// `"semantic"`, or any custom tag).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum MemoryType {
    /// Short-lived conversational context.
    Working,
    /// Timestamped events.
    Episodic,
    /// Durable facts.
    Semantic,
    /// A caller-defined tier served by a pluggable backend.
    Custom(String),
}

impl MemoryType {
    pub fn as_str(&self) -> &str {
        match self {
            MemoryType::Working => "working",
            MemoryType::Episodic => "episodic",
            MemoryType::Semantic => "semantic",
            MemoryType::Custom(tag) => tag.as_str(),
        }
    }

    /// A custom tag must be non-empty.
    pub fn is_valid(&self) -> bool {
        !self.as_str().trim().is_empty()
    }
}

impl fmt::Display for MemoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for MemoryType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "working" => MemoryType::Working,
            "episodic" => MemoryType::Episodic,
            "semantic" => MemoryType::Semantic,
            _ => MemoryType::Custom(s),
        }
    }
}

impl From<MemoryType> for String {
    fn from(t: MemoryType) -> Self {
        t.as_str().to_string()
    }
}

impl FromStr for MemoryType {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = MemoryType::from(s.trim().to_lowercase());
        if t.is_valid() {
            Ok(t)
        } else {
            Err(MemoryError::InvalidInput("memory type must be non-empty".into()))
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MemoryItem
// ─────────────────────────────────────────────────────────────────────────────

/// The canonical cross-tier record.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MemoryItem {
    pub id: String,
    pub content: String,
    #[schemars(with = "String")]
    pub memory_type: MemoryType,
    /// Owning user; empty when the item is not user-scoped.
    #[serde(default)]
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    /// Importance in `[0, 1]`.
    pub importance: f32,
    #[serde(default)]
    pub metadata: Metadata,
}

impl MemoryItem {
    /// Build a new item with a fresh id and the current timestamp.
    ///
    /// `importance` is clamped to `[0, 1]`.  Returns
    /// [`MemoryError::InvalidInput`] for empty content, an empty type tag, or
    /// a NaN importance.
    pub fn new(
        content: impl Into<String>,
        memory_type: MemoryType,
        importance: f32,
    ) -> Result<Self, MemoryError> {
        if importance.is_nan() {
            return Err(MemoryError::InvalidInput("importance must be a number".into()));
        }
        let item = Self {
            id: new_id(),
            content: content.into(),
            memory_type,
            user_id: String::new(),
            timestamp: Utc::now(),
            importance: clamp_unit(importance),
            metadata: Metadata::new(),
        };
        item.validate()?;
        Ok(item)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Check the record invariants.
    pub fn validate(&self) -> Result<(), MemoryError> {
        if self.content.trim().is_empty() {
            return Err(MemoryError::InvalidInput("content must be non-empty".into()));
        }
        if !self.memory_type.is_valid() {
            return Err(MemoryError::InvalidInput("memory type must be non-empty".into()));
        }
        if !(0.0..=1.0).contains(&self.importance) {
            return Err(MemoryError::InvalidInput(format!(
                "importance {} outside [0, 1]",
                self.importance
            )));
        }
        Ok(())
    }

    /// Apply a partial update in place.
    pub fn apply(&mut self, update: &MemoryUpdate) -> Result<(), MemoryError> {
        if let Some(content) = &update.content {
            if content.trim().is_empty() {
                return Err(MemoryError::InvalidInput("content must be non-empty".into()));
            }
            self.content = content.clone();
        }
        if let Some(importance) = update.importance {
            self.importance = clamp_unit(importance);
        }
        if let Some(metadata) = &update.metadata {
            for (k, v) in metadata {
                self.metadata.insert(k.clone(), v.clone());
            }
        }
        Ok(())
    }
}

/// Partial update applied by `Memory::update`.
///
/// Metadata keys are merged into the existing map.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryUpdate {
    pub content: Option<String>,
    pub importance: Option<f32>,
    pub metadata: Option<Metadata>,
}

impl MemoryUpdate {
    pub fn content(content: impl Into<String>) -> Self {
        Self { content: Some(content.into()), ..Default::default() }
    }

    pub fn importance(importance: f32) -> Self {
        Self { importance: Some(importance), ..Default::default() }
    }
}

/// A retrieved item together with its ranking score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredItem {
    pub item: MemoryItem,
    pub score: f32,
}

// ─────────────────────────────────────────────────────────────────────────────
// Options
// ─────────────────────────────────────────────────────────────────────────────

/// Options for writing through the manager.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct AddOptions {
    /// Explicit target tier; classified from the content when absent.
    #[schemars(with = "Option<String>")]
    pub memory_type: Option<MemoryType>,
    /// Explicit importance; estimated from the content when absent.
    pub importance: Option<f32>,
    pub user_id: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

/// Options for retrieval.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RetrieveOptions {
    /// Maximum number of results; `0` means unlimited.
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Results scoring below this are dropped after ranking.
    pub min_score: Option<f32>,
    /// Restrict manager retrieval to one tier.
    #[schemars(with = "Option<String>")]
    pub memory_type: Option<MemoryType>,
    /// Restrict results to one owner.
    pub user_id: Option<String>,
}

fn default_limit() -> usize {
    DEFAULT_RETRIEVE_LIMIT
}

impl Default for RetrieveOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_RETRIEVE_LIMIT,
            min_score: None,
            memory_type: None,
            user_id: None,
        }
    }
}

impl RetrieveOptions {
    pub fn with_limit(limit: usize) -> Self {
        Self { limit, ..Default::default() }
    }

    pub fn of_type(memory_type: MemoryType) -> Self {
        Self { memory_type: Some(memory_type), ..Default::default() }
    }
}

/// Bulk-eviction policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForgetStrategy {
    /// Drop items whose importance is below a threshold.
    Importance,
    /// Drop items older than a maximum age.
    Time,
    /// Keep only the most important items up to a target size.
    Capacity,
}

/// Parameters for a [`ForgetStrategy`]; unset fields fall back to defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ForgetOptions {
    pub threshold: Option<f32>,
    pub max_age_days: Option<f64>,
    pub target_size: Option<usize>,
}

impl ForgetOptions {
    pub fn threshold(&self) -> f32 {
        self.threshold.unwrap_or(DEFAULT_FORGET_THRESHOLD)
    }

    pub fn max_age_days(&self) -> f64 {
        self.max_age_days.unwrap_or(DEFAULT_MAX_AGE_DAYS)
    }

    /// Capacity target, falling back to the store's own default.
    pub fn target_size_or(&self, store_default: usize) -> usize {
        self.target_size.unwrap_or(store_default)
    }
}

/// Parameters for promoting items from one tier into another.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ConsolidateOptions {
    #[serde(default = "default_min_importance")]
    pub min_importance: f32,
    /// When set, only items at least this old are promoted.
    pub min_age_days: Option<f64>,
    #[serde(default = "default_source_type")]
    #[schemars(with = "String")]
    pub source_type: MemoryType,
    #[serde(default = "default_target_type")]
    #[schemars(with = "String")]
    pub target_type: MemoryType,
}

fn default_min_importance() -> f32 {
    0.7
}
fn default_source_type() -> MemoryType {
    MemoryType::Working
}
fn default_target_type() -> MemoryType {
    MemoryType::Episodic
}

impl Default for ConsolidateOptions {
    fn default() -> Self {
        Self {
            min_importance: default_min_importance(),
            min_age_days: None,
            source_type: default_source_type(),
            target_type: default_target_type(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MemoryStats
// ─────────────────────────────────────────────────────────────────────────────

/// Aggregate view of one store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub count: usize,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
    pub avg_importance: f32,
}

impl MemoryStats {
    /// Fold `(timestamp, importance)` pairs into a stats record.
    pub fn collect<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (DateTime<Utc>, f32)>,
    {
        let mut stats = MemoryStats::default();
        let mut total = 0.0f32;
        for (ts, importance) in entries {
            stats.count += 1;
            total += importance;
            stats.oldest = Some(stats.oldest.map_or(ts, |o| o.min(ts)));
            stats.newest = Some(stats.newest.map_or(ts, |n| n.max(ts)));
        }
        if stats.count > 0 {
            stats.avg_importance = total / stats.count as f32;
        }
        stats
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

/// Error taxonomy shared by every store and the manager.
///
/// None of these are fatal; every operation either returns a result or one of
/// these conditions.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MemoryError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("embedding failed: {0}")]
    EmbeddingFailed(String),

    #[error("memory type not registered: {0}")]
    MemoryTypeNotFound(MemoryType),

    #[error("memory type already registered: {0}")]
    MemoryTypeAlreadyRegistered(MemoryType),

    /// Every backend failed during fan-out retrieval and nothing was returned.
    #[error("retrieval failed: {0}")]
    RetrievalFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn importance_is_clamped_on_construction() {
        let low = MemoryItem::new("x", MemoryType::Working, -1.0).unwrap();
        assert_eq!(low.importance, 0.0);
        let high = MemoryItem::new("x", MemoryType::Working, 1.5).unwrap();
        assert_eq!(high.importance, 1.0);
    }

    #[test]
    fn empty_content_is_invalid() {
        let err = MemoryItem::new("   ", MemoryType::Semantic, 0.5).unwrap_err();
        assert!(matches!(err, MemoryError::InvalidInput(_)));
    }

    #[test]
    fn empty_custom_type_is_invalid() {
        let err = MemoryItem::new("x", MemoryType::Custom(String::new()), 0.5).unwrap_err();
        assert!(matches!(err, MemoryError::InvalidInput(_)));
    }

    #[test]
    fn nan_importance_is_invalid() {
        let err = MemoryItem::new("x", MemoryType::Working, f32::NAN).unwrap_err();
        assert!(matches!(err, MemoryError::InvalidInput(_)));
    }

    #[test]
    fn memory_type_string_forms() {
        assert_eq!(MemoryType::Episodic.to_string(), "episodic");
        assert_eq!("Semantic".parse::<MemoryType>().unwrap(), MemoryType::Semantic);
        assert_eq!(
            "procedural".parse::<MemoryType>().unwrap(),
            MemoryType::Custom("procedural".into())
        );
        assert!("".parse::<MemoryType>().is_err());
    }

    #[test]
    fn memory_item_serializes_type_as_plain_string() {
        let item = MemoryItem::new("hello", MemoryType::Episodic, 0.4).unwrap();
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["memory_type"], "episodic");
        let back: MemoryItem = serde_json::from_value(json).unwrap();
        assert_eq!(back.memory_type, MemoryType::Episodic);
    }

    #[test]
    fn apply_update_merges_metadata_and_clamps() {
        let mut item = MemoryItem::new("a", MemoryType::Working, 0.5).unwrap();
        item.metadata.insert("role".into(), "user".into());
        let mut extra = Metadata::new();
        extra.insert("topic".into(), "rust".into());
        item.apply(&MemoryUpdate {
            content: Some("b".into()),
            importance: Some(3.0),
            metadata: Some(extra),
        })
        .unwrap();
        assert_eq!(item.content, "b");
        assert_eq!(item.importance, 1.0);
        assert_eq!(item.metadata.len(), 2);
    }

    #[test]
    fn apply_rejects_empty_content() {
        let mut item = MemoryItem::new("a", MemoryType::Working, 0.5).unwrap();
        assert!(item.apply(&MemoryUpdate::content("")).is_err());
        assert_eq!(item.content, "a");
    }

    #[test]
    fn stats_collect_tracks_bounds_and_average() {
        let now = Utc::now();
        let earlier = now - Duration::days(2);
        let stats = MemoryStats::collect(vec![(now, 0.2), (earlier, 0.6)]);
        assert_eq!(stats.count, 2);
        assert_eq!(stats.oldest, Some(earlier));
        assert_eq!(stats.newest, Some(now));
        assert!((stats.avg_importance - 0.4).abs() < 1e-6);
        assert_eq!(MemoryStats::collect(Vec::new()), MemoryStats::default());
    }

    #[test]
    fn forget_options_defaults() {
        let opts = ForgetOptions::default();
        assert!((opts.threshold() - 0.3).abs() < 1e-6);
        assert_eq!(opts.max_age_days(), 30.0);
        assert_eq!(opts.target_size_or(1000), 1000);
    }

    #[test]
    fn retrieve_options_schema_lists_fields() {
        let schema = schemars::schema_for!(RetrieveOptions);
        let json = serde_json::to_string(&schema).unwrap();
        assert!(json.contains("limit"));
        assert!(json.contains("min_score"));
    }

    #[test]
    fn error_display() {
        let err = MemoryError::MemoryTypeNotFound(MemoryType::Semantic);
        assert!(err.to_string().contains("semantic"));
    }
}
