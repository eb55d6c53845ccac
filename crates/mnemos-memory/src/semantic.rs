//! Semantic Memory Store.
//!
//! Durable facts plus an embedded [`KnowledgeGraph`].
//!
//! ## Search tiers
//!
//! [`SemanticStore::search`] walks three tiers in order and stops as soon as
//! `top_k` results are available:
//!
//! 1. cosine similarity against embeddings from the configured [`Embedder`];
//! 2. cosine similarity against the store's own TF-IDF [`Vectorizer`];
//! 3. keyword overlap over every remaining record.
//!
//! Later tiers only contribute records the earlier ones did not return; the
//! merged set is re-sorted by the composite score
//! (similarity weight [`SEMANTIC_SIMILARITY_WEIGHT`]).
//!
//! An embedder is optional.  When it is absent or fails, the store degrades
//! to the local tiers and logs a warning.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mnemos_index::{Vectorizer, cosine_similarity, cosine_with_norms};
use mnemos_types::{
    DEFAULT_CAPACITY_TARGET, DEFAULT_IMPORTANCE, ForgetOptions, ForgetStrategy, MemoryError,
    MemoryItem, MemoryStats, MemoryType, MemoryUpdate, Metadata, RetrieveOptions, ScoredItem,
    clamp_unit, new_id,
};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::extraction::{EntityExtractor, PatternExtractor};
use crate::graph::{
    Entity, EntityType, EntityUpdate, KnowledgeGraph, RelatedEntity, Relation, RelationUpdate,
};
use crate::scoring::{
    Recollection, SEMANTIC_SIMILARITY_WEIGHT, apply_forget, composite_score, keyword_similarity,
    query_tokens, recency,
};
use crate::traits::{Embedder, Forgetter, Memory, embed_one};

/// Metadata keys read by [`SemanticStore::store`].
pub const IMPORTANCE_KEY: &str = "importance";
pub const USER_ID_KEY: &str = "user_id";

/// Configuration for [`SemanticStore`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticConfig {
    /// Default target for capacity forgetting.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Run entity/relation extraction on every stored fact.
    #[serde(default)]
    pub extract_entities: bool,
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY_TARGET
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            extract_entities: false,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Records
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct SemanticRecord {
    id: String,
    content: String,
    /// From the external embedder, when one succeeded.
    embedding: Option<Vec<f32>>,
    /// From the local vectorizer; refreshed on every rebuild.
    local_embedding: Vec<f32>,
    metadata: Metadata,
    importance: f32,
    timestamp: DateTime<Utc>,
    user_id: String,
}

impl SemanticRecord {
    fn to_item(&self) -> MemoryItem {
        MemoryItem {
            id: self.id.clone(),
            content: self.content.clone(),
            memory_type: MemoryType::Semantic,
            user_id: self.user_id.clone(),
            timestamp: self.timestamp,
            importance: self.importance,
            metadata: self.metadata.clone(),
        }
    }
}

impl Recollection for SemanticRecord {
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

#[derive(Default)]
struct SemanticState {
    /// Insertion order.
    records: Vec<SemanticRecord>,
    vectorizer: Vectorizer,
    graph: KnowledgeGraph,
}

impl SemanticState {
    fn position(&self, id: &str) -> Option<usize> {
        self.records.iter().position(|r| r.id == id)
    }

    fn reindex(&mut self) {
        let docs: Vec<&str> = self.records.iter().map(|r| r.content.as_str()).collect();
        let vectors = self.vectorizer.fit_transform(&docs);
        for (record, v) in self.records.iter_mut().zip(vectors) {
            record.local_embedding = v;
        }
    }

    fn upsert(&mut self, record: SemanticRecord) {
        match self.position(&record.id) {
            Some(pos) => self.records[pos] = record,
            None => self.records.push(record),
        }
        self.reindex();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SemanticStore
// ─────────────────────────────────────────────────────────────────────────────

/// Fact store with tiered search and a knowledge graph.
pub struct SemanticStore {
    config: SemanticConfig,
    embedder: Option<Arc<dyn Embedder>>,
    extractor: Box<dyn EntityExtractor>,
    state: RwLock<SemanticState>,
}

impl Default for SemanticStore {
    fn default() -> Self {
        Self::new(SemanticConfig::default())
    }
}

impl SemanticStore {
    pub fn new(config: SemanticConfig) -> Self {
        Self {
            config,
            embedder: None,
            extractor: Box::new(PatternExtractor),
            state: RwLock::new(SemanticState::default()),
        }
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_extractor(mut self, extractor: Box<dyn EntityExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn config(&self) -> &SemanticConfig {
        &self.config
    }

    /// Embed `text` with the external embedder, if any.  Failures are logged
    /// and yield `None`.
    async fn try_embed(&self, text: &str) -> Option<Vec<f32>> {
        let embedder = self.embedder.as_ref()?;
        match embed_one(embedder.as_ref(), text).await {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(error = %e, "embedder failed; falling back to local index");
                None
            }
        }
    }

    /// Insert or replace the fact `id` (a fresh id when `None`).
    ///
    /// `importance` and `user_id` are read from `metadata` when present.
    pub async fn store(
        &self,
        id: Option<&str>,
        content: &str,
        metadata: Metadata,
    ) -> Result<String, MemoryError> {
        let importance = metadata
            .get(IMPORTANCE_KEY)
            .and_then(|v| v.as_f64())
            .map(|v| v as f32)
            .unwrap_or(DEFAULT_IMPORTANCE);
        let user_id = metadata
            .get(USER_ID_KEY)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let id = id.filter(|s| !s.is_empty()).map_or_else(new_id, str::to_string);
        let item = MemoryItem::new(content, MemoryType::Semantic, importance)?
            .with_id(id)
            .with_user(user_id)
            .with_metadata(metadata);
        self.insert(item).await
    }

    async fn insert(&self, item: MemoryItem) -> Result<String, MemoryError> {
        item.validate()?;
        let embedding = self.try_embed(&item.content).await;
        let id = item.id.clone();
        let content = item.content.clone();
        {
            let mut state = self.state.write().await;
            state.upsert(SemanticRecord {
                id: item.id,
                content: item.content,
                embedding,
                local_embedding: Vec::new(),
                metadata: item.metadata,
                importance: item.importance,
                timestamp: item.timestamp,
                user_id: item.user_id,
            });
            debug!(id = %id, total = state.records.len(), "fact stored");
        }
        if self.config.extract_entities {
            if let Err(e) = self.extract_and_link(&content, &id).await {
                warn!(error = %e, id = %id, "entity extraction failed");
            }
        }
        Ok(id)
    }

    pub async fn get(&self, id: &str) -> Option<MemoryItem> {
        let state = self.state.read().await;
        state.position(id).map(|pos| state.records[pos].to_item())
    }

    pub async fn delete(&self, id: &str) -> Result<(), MemoryError> {
        let mut state = self.state.write().await;
        let pos = state
            .position(id)
            .ok_or_else(|| MemoryError::NotFound(id.to_string()))?;
        state.records.remove(pos);
        state.reindex();
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.records.is_empty()
    }

    /// Tiered search; `top_k = 0` returns every record.
    pub async fn search(&self, query: &str, top_k: usize) -> Vec<ScoredItem> {
        self.search_filtered(query, top_k, None).await
    }

    /// Over-fetch `2 * top_k` results, keep those scoring at least
    /// `min_score`, and return at most `top_k`.
    pub async fn search_with_threshold(&self, query: &str, top_k: usize, min_score: f32) -> Vec<ScoredItem> {
        let mut hits: Vec<ScoredItem> = self
            .search_filtered(query, top_k.saturating_mul(2), None)
            .await
            .into_iter()
            .filter(|h| h.score >= min_score)
            .collect();
        if top_k > 0 {
            hits.truncate(top_k);
        }
        hits
    }

    async fn search_filtered(&self, query: &str, top_k: usize, user_id: Option<&str>) -> Vec<ScoredItem> {
        let query_embedding = match &self.embedder {
            Some(_) if self.has_external_embeddings().await => self.try_embed(query).await,
            _ => None,
        };

        let now = Utc::now();
        let state = self.state.read().await;
        let wanted = if top_k == 0 { usize::MAX } else { top_k };
        let candidates: Vec<usize> = (0..state.records.len())
            .filter(|&i| user_id.is_none_or(|u| state.records[i].user_id == u))
            .collect();

        let mut seen: HashSet<usize> = HashSet::new();
        let mut hits: Vec<(usize, f32)> = Vec::new();
        let mut merge = |tier: Vec<(usize, f32)>, hits: &mut Vec<(usize, f32)>| {
            for (i, sim) in tier {
                if seen.insert(i) {
                    let r = &state.records[i];
                    let score = composite_score(
                        sim,
                        recency(r.timestamp, now),
                        r.importance,
                        SEMANTIC_SIMILARITY_WEIGHT,
                    );
                    hits.push((i, score));
                }
            }
        };

        if let Some(q) = &query_embedding {
            let tier: Vec<(usize, f32)> = candidates
                .iter()
                .filter_map(|&i| {
                    let emb = state.records[i].embedding.as_ref()?;
                    let sim = cosine_with_norms(q, emb);
                    (sim > 0.0).then_some((i, sim))
                })
                .collect();
            merge(tier, &mut hits);
        }

        if hits.len() < wanted && state.vectorizer.is_fitted() {
            let q = state.vectorizer.transform(query);
            let tier: Vec<(usize, f32)> = candidates
                .iter()
                .filter_map(|&i| {
                    let sim = cosine_similarity(&q, &state.records[i].local_embedding);
                    (sim > 0.0).then_some((i, sim))
                })
                .collect();
            merge(tier, &mut hits);
        }

        if hits.len() < wanted {
            let tokens = query_tokens(query);
            let tier: Vec<(usize, f32)> = candidates
                .iter()
                .map(|&i| (i, keyword_similarity(&tokens, &state.records[i].content)))
                .collect();
            merge(tier, &mut hits);
        }

        hits.sort_by(|a, b| b.1.total_cmp(&a.1));
        hits.truncate(wanted);
        hits.into_iter()
            .map(|(i, score)| ScoredItem { item: state.records[i].to_item(), score })
            .collect()
    }

    async fn has_external_embeddings(&self) -> bool {
        let state = self.state.read().await;
        state.records.iter().any(|r| r.embedding.is_some())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Knowledge graph
    // ─────────────────────────────────────────────────────────────────────────

    /// Add an entity, or bump the frequency of the existing entity with the
    /// same name.  New entities are embedded as `name: description` when an
    /// embedder is configured.
    pub async fn add_entity(&self, mut entity: Entity) -> Result<String, MemoryError> {
        let exists = self
            .state
            .read()
            .await
            .graph
            .find_entity_by_name(&entity.name)
            .is_some();
        if !exists && entity.embedding.is_none() {
            entity.embedding = self.try_embed(&entity.embedding_text()).await;
        }
        let (id, _) = self.state.write().await.graph.add_entity(entity)?;
        Ok(id)
    }

    pub async fn get_entity(&self, id: &str) -> Option<Entity> {
        self.state.read().await.graph.get_entity(id).cloned()
    }

    pub async fn find_entity_by_name(&self, name: &str) -> Option<Entity> {
        self.state.read().await.graph.find_entity_by_name(name).cloned()
    }

    pub async fn entities_by_type(&self, entity_type: EntityType) -> Vec<Entity> {
        let state = self.state.read().await;
        state.graph.entities_by_type(entity_type).into_iter().cloned().collect()
    }

    pub async fn update_entity(&self, id: &str, update: EntityUpdate) -> Result<(), MemoryError> {
        self.state.write().await.graph.update_entity(id, update)
    }

    /// Returns the number of relations removed with the entity.
    pub async fn delete_entity(&self, id: &str) -> Result<usize, MemoryError> {
        self.state.write().await.graph.delete_entity(id)
    }

    pub async fn add_relation(&self, relation: Relation) -> Result<String, MemoryError> {
        self.state.write().await.graph.add_relation(relation)
    }

    pub async fn get_relation(&self, id: &str) -> Option<Relation> {
        self.state.read().await.graph.get_relation(id).cloned()
    }

    pub async fn relations_of(&self, entity_id: &str) -> Vec<Relation> {
        let state = self.state.read().await;
        state.graph.relations_of(entity_id).into_iter().cloned().collect()
    }

    pub async fn update_relation(&self, id: &str, update: RelationUpdate) -> Result<(), MemoryError> {
        self.state.write().await.graph.update_relation(id, update)
    }

    pub async fn delete_relation(&self, id: &str) -> Result<Relation, MemoryError> {
        self.state.write().await.graph.delete_relation(id)
    }

    pub async fn get_related_entities(
        &self,
        entity_id: &str,
        max_depth: usize,
    ) -> Result<Vec<RelatedEntity>, MemoryError> {
        self.state.read().await.graph.get_related_entities(entity_id, max_depth)
    }

    pub async fn entity_count(&self) -> usize {
        self.state.read().await.graph.entity_count()
    }

    pub async fn relation_count(&self) -> usize {
        self.state.read().await.graph.relation_count()
    }

    /// Extract entities and relations from `text` and merge them into the
    /// graph, recording `evidence_id` on every relation.
    ///
    /// A relation that already exists between the same endpoints with the
    /// same type gains the evidence and keeps the higher strength.  Returns
    /// the ids of the touched entities and relations.
    pub async fn extract_and_link(
        &self,
        text: &str,
        evidence_id: &str,
    ) -> Result<(Vec<String>, Vec<String>), MemoryError> {
        let entities = self.extractor.extract_entities(text);
        let relations = self.extractor.extract_relations(text, &entities);

        let mut entity_ids = Vec::with_capacity(entities.len());
        for extracted in &entities {
            let mut properties = Metadata::new();
            properties.insert("confidence".into(), extracted.confidence.into());
            let entity = Entity::new(&extracted.name, extracted.entity_type).with_properties(properties);
            entity_ids.push(self.add_entity(entity).await?);
        }

        let mut relation_ids = Vec::with_capacity(relations.len());
        let mut state = self.state.write().await;
        for extracted in relations {
            let (Some(source), Some(target)) = (
                state.graph.find_entity_by_name(&extracted.source).map(|e| e.id.clone()),
                state.graph.find_entity_by_name(&extracted.target).map(|e| e.id.clone()),
            ) else {
                continue;
            };
            let existing = state
                .graph
                .find_relation(&source, &target, extracted.relation_type)
                .map(|r| (r.id.clone(), r.strength));
            let id = match existing {
                Some((id, strength)) => {
                    state.graph.update_relation(
                        &id,
                        RelationUpdate {
                            strength: Some(strength.max(extracted.confidence)),
                            evidence: vec![evidence_id.to_string()],
                            ..Default::default()
                        },
                    )?;
                    id
                }
                None => state.graph.add_relation(
                    Relation::new(source, target, extracted.relation_type)
                        .with_strength(extracted.confidence)
                        .with_evidence(evidence_id),
                )?,
            };
            relation_ids.push(id);
        }
        debug!(
            entities = entity_ids.len(),
            relations = relation_ids.len(),
            "linked extracted knowledge"
        );
        Ok((entity_ids, relation_ids))
    }
}

#[async_trait]
impl Memory for SemanticStore {
    fn memory_type(&self) -> MemoryType {
        MemoryType::Semantic
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
            .search_filtered(query, opts.limit, opts.user_id.as_deref())
            .await
            .into_iter()
            .filter(|h| opts.min_score.is_none_or(|min| h.score >= min))
            .map(|h| h.item)
            .collect())
    }

    async fn update(&self, id: &str, update: MemoryUpdate) -> Result<(), MemoryError> {
        let embedding = match &update.content {
            Some(content) => self.try_embed(content).await,
            None => None,
        };
        let mut state = self.state.write().await;
        let pos = state
            .position(id)
            .ok_or_else(|| MemoryError::NotFound(id.to_string()))?;
        let mut item = state.records[pos].to_item();
        item.apply(&update)?;
        let record = &mut state.records[pos];
        record.importance = clamp_unit(item.importance);
        record.metadata = item.metadata;
        if update.content.is_some() {
            record.content = item.content;
            record.embedding = embedding;
            state.reindex();
        }
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<(), MemoryError> {
        self.delete(id).await
    }

    async fn has(&self, id: &str) -> bool {
        self.state.read().await.position(id).is_some()
    }

    async fn clear(&self) -> Result<(), MemoryError> {
        let mut state = self.state.write().await;
        state.records.clear();
        state.vectorizer.clear();
        state.graph.clear();
        Ok(())
    }

    async fn stats(&self) -> MemoryStats {
        let state = self.state.read().await;
        MemoryStats::collect(state.records.iter().map(|r| (r.timestamp, r.importance)))
    }

    fn forgetter(&self) -> Option<&dyn Forgetter> {
        Some(self)
    }
}

#[async_trait]
impl Forgetter for SemanticStore {
    async fn forget(
        &self,
        strategy: ForgetStrategy,
        opts: &ForgetOptions,
    ) -> Result<usize, MemoryError> {
        let mut state = self.state.write().await;
        let removed = apply_forget(
            &mut state.records,
            strategy,
            opts,
            self.config.capacity,
            Utc::now(),
        )?;
        state.reindex();
        debug!(?strategy, removed, "semantic forget");
        Ok(removed)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;
    use crate::graph::RelationType;

    /// Embeds texts as `[has "rust", has "python"]`, with a small bias so
    /// unrelated texts are never the zero vector.
    struct TopicEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for TopicEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, MemoryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts
                .iter()
                .map(|t| {
                    let t = t.to_lowercase();
                    vec![
                        if t.contains("rust") { 1.0 } else { 0.0 },
                        if t.contains("python") { 1.0 } else { 0.0 },
                        0.01,
                    ]
                })
                .collect())
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, MemoryError> {
            Err(MemoryError::EmbeddingFailed("offline".into()))
        }
    }

    fn meta(pairs: &[(&str, serde_json::Value)]) -> Metadata {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    // ── store / get ──────────────────────────────────────────────────────────

    #[tokio::test]
    async fn store_reads_importance_and_user_from_metadata() {
        let store = SemanticStore::default();
        let id = store
            .store(None, "Water boils at 100C", meta(&[("importance", json!(0.9)), ("user_id", "u1".into())]))
            .await
            .unwrap();
        let item = store.get(&id).await.unwrap();
        assert!((item.importance - 0.9).abs() < 1e-6);
        assert_eq!(item.user_id, "u1");
        assert_eq!(item.memory_type, MemoryType::Semantic);
    }

    #[tokio::test]
    async fn store_defaults_importance() {
        let store = SemanticStore::default();
        let id = store.store(None, "fact", Metadata::new()).await.unwrap();
        assert!((store.get(&id).await.unwrap().importance - 0.5).abs() < 1e-6);
    }

    #[tokio::test]
    async fn store_upserts_by_id() {
        let store = SemanticStore::default();
        store.store(Some("f1"), "old fact", Metadata::new()).await.unwrap();
        store.store(Some("f1"), "new fact", Metadata::new()).await.unwrap();
        assert_eq!(store.len().await, 1);
        assert_eq!(store.get("f1").await.unwrap().content, "new fact");
    }

    #[tokio::test]
    async fn store_rejects_empty_content() {
        let store = SemanticStore::default();
        assert!(store.store(None, "", Metadata::new()).await.is_err());
    }

    #[tokio::test]
    async fn delete_missing_is_not_found() {
        let store = SemanticStore::default();
        assert!(matches!(store.delete("x").await, Err(MemoryError::NotFound(_))));
    }

    // ── search ───────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn local_search_ranks_matching_fact_first() {
        let store = SemanticStore::default();
        store.store(None, "Rust guarantees memory safety", Metadata::new()).await.unwrap();
        store.store(None, "Paris is the capital of France", Metadata::new()).await.unwrap();
        let hits = store.search("memory safety", 5).await;
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].item.content, "Rust guarantees memory safety");
    }

    #[tokio::test]
    async fn search_stops_at_top_k() {
        let store = SemanticStore::default();
        for i in 0..4 {
            store.store(None, &format!("fact number {i}"), Metadata::new()).await.unwrap();
        }
        assert_eq!(store.search("fact", 2).await.len(), 2);
        assert_eq!(store.search("fact", 0).await.len(), 4);
    }

    #[tokio::test]
    async fn search_with_threshold_filters_scores() {
        let store = SemanticStore::default();
        store.store(None, "alpha", Metadata::new()).await.unwrap();
        assert!(store.search_with_threshold("alpha", 3, 5.0).await.is_empty());
        assert_eq!(store.search_with_threshold("alpha", 3, 0.0).await.len(), 1);
    }

    #[tokio::test]
    async fn embedder_tier_is_used_when_available() {
        let embedder = Arc::new(TopicEmbedder { calls: AtomicUsize::new(0) });
        let store = SemanticStore::default().with_embedder(embedder.clone());
        store.store(None, "Python is dynamically typed", Metadata::new()).await.unwrap();
        store.store(None, "Rust has a borrow checker", Metadata::new()).await.unwrap();
        // The query shares no TF-IDF term with either fact.
        let hits = store.search("rustaceans", 1).await;
        assert_eq!(hits[0].item.content, "Rust has a borrow checker");
        assert!(embedder.calls.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test]
    async fn failing_embedder_degrades_to_local_tiers() {
        let store = SemanticStore::default().with_embedder(Arc::new(FailingEmbedder));
        store.store(None, "tokio schedules tasks", Metadata::new()).await.unwrap();
        let hits = store.search("tokio", 3).await;
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn retrieve_filters_by_user() {
        let store = SemanticStore::default();
        store.store(None, "shared fact a", meta(&[("user_id", "a".into())])).await.unwrap();
        store.store(None, "shared fact b", meta(&[("user_id", "b".into())])).await.unwrap();
        let opts = RetrieveOptions { user_id: Some("b".into()), ..Default::default() };
        let items = store.retrieve("shared", &opts).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].user_id, "b");
    }

    // ── graph ────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn add_entity_twice_bumps_frequency() {
        let store = SemanticStore::default();
        let a = store.add_entity(Entity::new("Alice", EntityType::Person)).await.unwrap();
        let b = store.add_entity(Entity::new("Alice", EntityType::Person)).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(store.entity_count().await, 1);
        assert_eq!(store.get_entity(&a).await.unwrap().frequency, 2);
    }

    #[tokio::test]
    async fn new_entities_are_embedded() {
        let store = SemanticStore::default()
            .with_embedder(Arc::new(TopicEmbedder { calls: AtomicUsize::new(0) }));
        let id = store
            .add_entity(Entity::new("Ferris", EntityType::Concept).with_description("the rust crab"))
            .await
            .unwrap();
        let entity = store.get_entity(&id).await.unwrap();
        assert_eq!(entity.embedding.unwrap()[0], 1.0);
    }

    #[tokio::test]
    async fn graph_chain_traversal() {
        let store = SemanticStore::default();
        let a = store.add_entity(Entity::new("Alice", EntityType::Person)).await.unwrap();
        let b = store.add_entity(Entity::new("Bob", EntityType::Person)).await.unwrap();
        let c = store.add_entity(Entity::new("Charlie", EntityType::Person)).await.unwrap();
        store.add_relation(Relation::new(&a, &b, RelationType::Knows)).await.unwrap();
        store.add_relation(Relation::new(&b, &c, RelationType::Knows)).await.unwrap();

        let related = store.get_related_entities(&a, 2).await.unwrap();
        let found: Vec<(String, usize)> = related.into_iter().map(|r| (r.entity.name, r.depth)).collect();
        assert_eq!(found, vec![("Bob".to_string(), 1), ("Charlie".to_string(), 2)]);

        assert_eq!(store.delete_entity(&b).await.unwrap(), 2);
        assert_eq!(store.relation_count().await, 0);
    }

    #[tokio::test]
    async fn add_relation_with_missing_endpoint_fails() {
        let store = SemanticStore::default();
        let a = store.add_entity(Entity::new("Alice", EntityType::Person)).await.unwrap();
        assert!(store.add_relation(Relation::new(&a, "nobody", RelationType::Knows)).await.is_err());
        assert_eq!(store.relation_count().await, 0);
    }

    #[tokio::test]
    async fn extract_and_link_records_evidence() {
        let store = SemanticStore::default();
        let (entities, relations) = store
            .extract_and_link("Alice Smith works at Acme Corp.", "m1")
            .await
            .unwrap();
        assert_eq!(entities.len(), 2);
        assert_eq!(relations.len(), 1);
        store.extract_and_link("Alice Smith works at Acme Corp.", "m2").await.unwrap();

        let rel = store.get_relation(&relations[0]).await.unwrap();
        assert_eq!(rel.relation_type, RelationType::WorksAt);
        assert_eq!(rel.evidence, vec!["m1".to_string(), "m2".to_string()]);
        assert_eq!(store.relation_count().await, 1);
        let alice = store.find_entity_by_name("alice smith").await.unwrap();
        assert_eq!(alice.frequency, 2);
    }

    #[tokio::test]
    async fn store_extracts_when_enabled() {
        let store = SemanticStore::new(SemanticConfig { extract_entities: true, ..Default::default() });
        let id = store
            .store(None, "Grace Hopper works at Harvard University.", Metadata::new())
            .await
            .unwrap();
        assert_eq!(store.entities_by_type(EntityType::Organization).await.len(), 1);
        let person = store.find_entity_by_name("Grace Hopper").await.unwrap();
        let relations = store.relations_of(&person.id).await;
        assert_eq!(relations[0].evidence, vec![id]);
    }

    // ── Memory contract / forgetting ─────────────────────────────────────────

    #[tokio::test]
    async fn update_content_reindexes() {
        let store = SemanticStore::default();
        let id = store.store(None, "draft", Metadata::new()).await.unwrap();
        store.update(&id, MemoryUpdate::content("published answer")).await.unwrap();
        let hits = store.search("published", 1).await;
        assert_eq!(hits[0].item.id, id);
    }

    #[tokio::test]
    async fn forget_by_importance_and_clear() {
        let store = SemanticStore::default();
        store.store(None, "keep", meta(&[("importance", json!(0.9))])).await.unwrap();
        store.store(None, "drop", meta(&[("importance", json!(0.1))])).await.unwrap();
        let removed = store.forget(ForgetStrategy::Importance, &ForgetOptions::default()).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.len().await, 1);
        store.clear().await.unwrap();
        assert!(store.is_empty().await);
        assert_eq!(store.stats().await.count, 0);
    }
}
