//! Memory Manager – the registry that routes writes and fans reads out.
//!
//! One backend is bound per [`MemoryType`].  Writes go to a single backend,
//! chosen by the caller or by [`classify`][crate::classifier::classify];
//! unfiltered reads run against every backend concurrently and are merged by
//! importance.
//!
//! # Fan-out semantics
//!
//! | Outcome | Result |
//! |---|---|
//! | at least one backend returned items | merged items, failures ignored |
//! | some backends failed, the rest returned nothing | empty list |
//! | every backend failed | [`MemoryError::RetrievalFailed`] |

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use mnemos_memory::scoring::age_days;
use mnemos_memory::{Embedder, EpisodicStore, Memory, SemanticStore, WorkingStore};
use mnemos_types::{
    AddOptions, ConsolidateOptions, ForgetOptions, ForgetStrategy, MemoryError, MemoryItem,
    MemoryStats, MemoryType, MemoryUpdate, RetrieveOptions,
};
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use crate::classifier::{classify, estimate_importance};
use crate::config::MnemosConfig;

/// Upper bound on items read from the source tier per consolidation pass.
pub const CONSOLIDATION_BATCH: usize = 1000;

/// Registry of memory backends keyed by tier.
pub struct MemoryManager {
    backends: RwLock<HashMap<MemoryType, Arc<dyn Memory>>>,
}

impl Default for MemoryManager {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryManager {
    /// An empty registry.
    pub fn new() -> Self {
        Self { backends: RwLock::new(HashMap::new()) }
    }

    /// Build a manager with the three built-in stores registered under
    /// `working`, `episodic` and `semantic`.
    ///
    /// `embedder` is handed to the semantic store; without one it falls back
    /// to TF-IDF and keyword search.
    pub fn from_config(config: &MnemosConfig, embedder: Option<Arc<dyn Embedder>>) -> Self {
        let mut semantic = SemanticStore::new(config.semantic.clone());
        if let Some(e) = embedder {
            semantic = semantic.with_embedder(e);
        }

        let mut backends: HashMap<MemoryType, Arc<dyn Memory>> = HashMap::new();
        backends.insert(
            MemoryType::Working,
            Arc::new(WorkingStore::new(config.working.clone())),
        );
        backends.insert(
            MemoryType::Episodic,
            Arc::new(EpisodicStore::new(config.episodic.clone())),
        );
        backends.insert(MemoryType::Semantic, Arc::new(semantic));

        Self { backends: RwLock::new(backends) }
    }

    // ── Registry ──────────────────────────────────────────────────────────────

    /// Bind `backend` to `memory_type`.
    pub async fn register(
        &self,
        memory_type: MemoryType,
        backend: Arc<dyn Memory>,
    ) -> Result<(), MemoryError> {
        let mut backends = self.backends.write().await;
        if backends.contains_key(&memory_type) {
            return Err(MemoryError::MemoryTypeAlreadyRegistered(memory_type));
        }
        info!(memory_type = %memory_type, "memory backend registered");
        backends.insert(memory_type, backend);
        Ok(())
    }

    /// Remove the backend bound to `memory_type` and return it.
    pub async fn unregister(&self, memory_type: &MemoryType) -> Result<Arc<dyn Memory>, MemoryError> {
        let removed = self
            .backends
            .write()
            .await
            .remove(memory_type)
            .ok_or_else(|| MemoryError::MemoryTypeNotFound(memory_type.clone()))?;
        info!(memory_type = %memory_type, "memory backend unregistered");
        Ok(removed)
    }

    pub async fn get_memory(&self, memory_type: &MemoryType) -> Result<Arc<dyn Memory>, MemoryError> {
        self.backends
            .read()
            .await
            .get(memory_type)
            .cloned()
            .ok_or_else(|| MemoryError::MemoryTypeNotFound(memory_type.clone()))
    }

    /// Registered tiers, sorted by name.
    pub async fn registered_types(&self) -> Vec<MemoryType> {
        let mut types: Vec<MemoryType> = self.backends.read().await.keys().cloned().collect();
        types.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        types
    }

    /// Backends in name order; the registry lock is released on return.
    async fn snapshot(&self) -> Vec<(MemoryType, Arc<dyn Memory>)> {
        let mut backends: Vec<_> = self
            .backends
            .read()
            .await
            .iter()
            .map(|(t, b)| (t.clone(), Arc::clone(b)))
            .collect();
        backends.sort_by(|a, b| a.0.as_str().cmp(b.0.as_str()));
        backends
    }

    // ── Writes ────────────────────────────────────────────────────────────────

    /// Store `content`, classifying it and estimating its importance when
    /// `opts` leaves either unset.
    #[instrument(skip(self, content, opts))]
    pub async fn add_memory(&self, content: &str, opts: AddOptions) -> Result<String, MemoryError> {
        let memory_type = opts.memory_type.unwrap_or_else(|| classify(content));
        let importance = match opts.importance {
            Some(i) => i,
            None => estimate_importance(content, &opts.metadata),
        };
        let backend = self.get_memory(&memory_type).await?;

        let mut item = MemoryItem::new(content, memory_type.clone(), importance)?
            .with_metadata(opts.metadata);
        if let Some(user) = opts.user_id {
            item = item.with_user(user);
        }
        let id = backend.add(item).await?;
        debug!(id = %id, memory_type = %memory_type, importance, "memory added");
        Ok(id)
    }

    pub async fn update_memory(
        &self,
        memory_type: &MemoryType,
        id: &str,
        update: MemoryUpdate,
    ) -> Result<(), MemoryError> {
        self.get_memory(memory_type).await?.update(id, update).await
    }

    pub async fn remove_memory(&self, memory_type: &MemoryType, id: &str) -> Result<(), MemoryError> {
        self.get_memory(memory_type).await?.remove(id).await
    }

    // ── Reads ─────────────────────────────────────────────────────────────────

    /// Retrieve items relevant to `query`.
    ///
    /// With `opts.memory_type` set only that backend is asked.  Otherwise one
    /// task per backend runs concurrently; results are merged in backend name
    /// order, stable-sorted by importance (highest first) and truncated to
    /// `opts.limit` (`0` keeps everything).
    #[instrument(skip(self, opts), fields(limit = opts.limit))]
    pub async fn retrieve_memories(
        &self,
        query: &str,
        opts: &RetrieveOptions,
    ) -> Result<Vec<MemoryItem>, MemoryError> {
        if let Some(memory_type) = &opts.memory_type {
            return self.get_memory(memory_type).await?.retrieve(query, opts).await;
        }

        let backends = self.snapshot().await;
        if backends.is_empty() {
            return Ok(Vec::new());
        }

        let mut tasks = JoinSet::new();
        for (slot, (memory_type, backend)) in backends.iter().enumerate() {
            let backend = Arc::clone(backend);
            let memory_type = memory_type.clone();
            let query = query.to_string();
            let opts = opts.clone();
            tasks.spawn(async move {
                let result = backend.retrieve(&query, &opts).await;
                (slot, memory_type, result)
            });
        }

        let mut slots: Vec<Vec<MemoryItem>> = vec![Vec::new(); backends.len()];
        let mut failures: Vec<String> = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((slot, _, Ok(items))) => slots[slot] = items,
                Ok((_, memory_type, Err(e))) => {
                    warn!(memory_type = %memory_type, error = %e, "backend retrieval failed");
                    failures.push(format!("{memory_type}: {e}"));
                }
                Err(e) => {
                    warn!(error = %e, "backend retrieval task aborted");
                    failures.push(e.to_string());
                }
            }
        }

        let mut merged: Vec<MemoryItem> = slots.into_iter().flatten().collect();
        if merged.is_empty() && failures.len() == backends.len() {
            return Err(MemoryError::RetrievalFailed(failures.join("; ")));
        }

        merged.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        if opts.limit > 0 {
            merged.truncate(opts.limit);
        }
        Ok(merged)
    }

    /// Per-tier statistics.
    pub async fn stats(&self) -> HashMap<MemoryType, MemoryStats> {
        let mut out = HashMap::new();
        for (memory_type, backend) in self.snapshot().await {
            out.insert(memory_type, backend.stats().await);
        }
        out
    }

    // ── Maintenance ───────────────────────────────────────────────────────────

    /// Run `strategy` on every backend that can forget and return the total
    /// number of items removed.  A failing backend is logged and skipped.
    #[instrument(skip(self, opts))]
    pub async fn forget_memories(&self, strategy: ForgetStrategy, opts: &ForgetOptions) -> usize {
        let mut removed = 0;
        for (memory_type, backend) in self.snapshot().await {
            let Some(forgetter) = backend.forgetter() else {
                debug!(memory_type = %memory_type, "backend does not forget; skipped");
                continue;
            };
            match forgetter.forget(strategy, opts).await {
                Ok(n) => removed += n,
                Err(e) => warn!(memory_type = %memory_type, error = %e, "forgetting failed"),
            }
        }
        info!(?strategy, removed, "forgetting pass complete");
        removed
    }

    /// Move qualifying items from `opts.source_type` into `opts.target_type`
    /// and return how many were moved.
    ///
    /// An item qualifies when its importance is at least `min_importance` and,
    /// if `min_age_days` is set, it is at least that old.  Each item keeps its
    /// id.  An item that cannot be added to the target stays in the source;
    /// one that cannot be removed from the source is not counted.
    #[instrument(skip(self, opts), fields(source = %opts.source_type, target = %opts.target_type))]
    pub async fn consolidate_memories(&self, opts: &ConsolidateOptions) -> Result<usize, MemoryError> {
        let source = self.get_memory(&opts.source_type).await?;
        let target = self.get_memory(&opts.target_type).await?;

        let now = Utc::now();
        let candidates: Vec<MemoryItem> = source
            .retrieve("", &RetrieveOptions::with_limit(CONSOLIDATION_BATCH))
            .await?
            .into_iter()
            .filter(|item| item.importance >= opts.min_importance)
            .filter(|item| {
                opts.min_age_days
                    .is_none_or(|min| age_days(item.timestamp, now) >= min)
            })
            .collect();

        let mut moved = 0;
        for item in candidates {
            let id = item.id.clone();
            let mut promoted = item;
            promoted.memory_type = opts.target_type.clone();

            if let Err(e) = target.add(promoted).await {
                warn!(id = %id, error = %e, "consolidation add failed; item kept in source");
                continue;
            }
            if let Err(e) = source.remove(&id).await {
                warn!(id = %id, error = %e, "consolidation remove failed");
                continue;
            }
            moved += 1;
        }

        info!(moved, "consolidation complete");
        Ok(moved)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::Duration;
    use mnemos_memory::Forgetter;
    use mnemos_types::Metadata;
    use serde_json::json;

    use super::*;

    /// Backend whose every operation fails.
    struct BrokenMemory;

    #[async_trait]
    impl Memory for BrokenMemory {
        fn memory_type(&self) -> MemoryType {
            MemoryType::Custom("broken".into())
        }
        async fn add(&self, _item: MemoryItem) -> Result<String, MemoryError> {
            Err(MemoryError::InvalidInput("read-only".into()))
        }
        async fn retrieve(&self, _q: &str, _o: &RetrieveOptions) -> Result<Vec<MemoryItem>, MemoryError> {
            Err(MemoryError::InvalidInput("offline".into()))
        }
        async fn update(&self, id: &str, _u: MemoryUpdate) -> Result<(), MemoryError> {
            Err(MemoryError::NotFound(id.into()))
        }
        async fn remove(&self, id: &str) -> Result<(), MemoryError> {
            Err(MemoryError::NotFound(id.into()))
        }
        async fn has(&self, _id: &str) -> bool {
            false
        }
        async fn clear(&self) -> Result<(), MemoryError> {
            Ok(())
        }
        async fn stats(&self) -> MemoryStats {
            MemoryStats::default()
        }
        fn forgetter(&self) -> Option<&dyn Forgetter> {
            Some(self)
        }
    }

    #[async_trait]
    impl Forgetter for BrokenMemory {
        async fn forget(&self, _s: ForgetStrategy, _o: &ForgetOptions) -> Result<usize, MemoryError> {
            Err(MemoryError::InvalidInput("offline".into()))
        }
    }

    fn working() -> Arc<dyn Memory> {
        Arc::new(WorkingStore::new(Default::default()))
    }

    fn episodic() -> Arc<dyn Memory> {
        Arc::new(EpisodicStore::new(Default::default()))
    }

    fn typed(memory_type: MemoryType, importance: f32) -> AddOptions {
        AddOptions {
            memory_type: Some(memory_type),
            importance: Some(importance),
            ..Default::default()
        }
    }

    // ── registry ─────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn duplicate_registration_fails() {
        let mgr = MemoryManager::new();
        mgr.register(MemoryType::Working, working()).await.unwrap();
        let err = mgr.register(MemoryType::Working, working()).await.unwrap_err();
        assert_eq!(err, MemoryError::MemoryTypeAlreadyRegistered(MemoryType::Working));
    }

    #[tokio::test]
    async fn unregister_and_lookup_of_unknown_type_fail() {
        let mgr = MemoryManager::new();
        let err = mgr.get_memory(&MemoryType::Semantic).await.err().unwrap();
        assert_eq!(err, MemoryError::MemoryTypeNotFound(MemoryType::Semantic));
        let err = mgr.unregister(&MemoryType::Semantic).await.err().unwrap();
        assert_eq!(err, MemoryError::MemoryTypeNotFound(MemoryType::Semantic));
    }

    #[tokio::test]
    async fn unregister_frees_the_slot() {
        let mgr = MemoryManager::new();
        mgr.register(MemoryType::Working, working()).await.unwrap();
        mgr.unregister(&MemoryType::Working).await.unwrap();
        assert!(mgr.registered_types().await.is_empty());
        mgr.register(MemoryType::Working, working()).await.unwrap();
    }

    #[tokio::test]
    async fn from_config_registers_three_tiers() {
        let mgr = MemoryManager::from_config(&MnemosConfig::default(), None);
        assert_eq!(
            mgr.registered_types().await,
            vec![MemoryType::Episodic, MemoryType::Semantic, MemoryType::Working]
        );
    }

    // ── add ──────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn add_routes_by_classification() {
        let mgr = MemoryManager::from_config(&MnemosConfig::default(), None);
        let id = mgr
            .add_memory("We had a meeting yesterday", AddOptions::default())
            .await
            .unwrap();
        let episodic = mgr.get_memory(&MemoryType::Episodic).await.unwrap();
        assert!(episodic.has(&id).await);
        let working = mgr.get_memory(&MemoryType::Working).await.unwrap();
        assert!(!working.has(&id).await);
    }

    #[tokio::test]
    async fn add_estimates_importance_from_metadata() {
        let mgr = MemoryManager::new();
        mgr.register(MemoryType::Working, working()).await.unwrap();
        let opts = AddOptions {
            metadata: Metadata::from([("importance".to_string(), json!(0.9))]),
            user_id: Some("u1".into()),
            ..Default::default()
        };
        mgr.add_memory("hello there", opts).await.unwrap();
        let items = mgr.retrieve_memories("hello", &RetrieveOptions::default()).await.unwrap();
        assert_eq!(items.len(), 1);
        assert!((items[0].importance - 0.9).abs() < 1e-6);
        assert_eq!(items[0].user_id, "u1");
    }

    #[tokio::test]
    async fn add_to_unregistered_type_fails() {
        let mgr = MemoryManager::new();
        let err = mgr.add_memory("what is the concept", AddOptions::default()).await.unwrap_err();
        assert_eq!(err, MemoryError::MemoryTypeNotFound(MemoryType::Semantic));
    }

    #[tokio::test]
    async fn add_rejects_empty_content() {
        let mgr = MemoryManager::from_config(&MnemosConfig::default(), None);
        let err = mgr.add_memory("  ", AddOptions::default()).await.unwrap_err();
        assert!(matches!(err, MemoryError::InvalidInput(_)));
    }

    // ── retrieve ─────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn fan_out_merges_by_importance() {
        let mgr = MemoryManager::new();
        mgr.register(MemoryType::Working, working()).await.unwrap();
        mgr.register(MemoryType::Episodic, episodic()).await.unwrap();
        mgr.add_memory("low priority note", typed(MemoryType::Working, 0.2)).await.unwrap();
        mgr.add_memory("deploy happened", typed(MemoryType::Episodic, 0.8)).await.unwrap();

        let items = mgr.retrieve_memories("query", &RetrieveOptions::default()).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].content, "deploy happened");
        assert_eq!(items[1].content, "low priority note");
    }

    #[tokio::test]
    async fn fan_out_truncates_to_limit() {
        let mgr = MemoryManager::new();
        mgr.register(MemoryType::Working, working()).await.unwrap();
        mgr.register(MemoryType::Episodic, episodic()).await.unwrap();
        for i in 0..3 {
            mgr.add_memory(&format!("note {i}"), typed(MemoryType::Working, 0.5)).await.unwrap();
            mgr.add_memory(&format!("event {i}"), typed(MemoryType::Episodic, 0.6)).await.unwrap();
        }
        let items = mgr.retrieve_memories("note", &RetrieveOptions::with_limit(4)).await.unwrap();
        assert_eq!(items.len(), 4);
        assert!(items[..3].iter().all(|i| i.memory_type == MemoryType::Episodic));
    }

    #[tokio::test]
    async fn type_filter_asks_one_backend() {
        let mgr = MemoryManager::new();
        mgr.register(MemoryType::Working, working()).await.unwrap();
        mgr.register(MemoryType::Episodic, episodic()).await.unwrap();
        mgr.add_memory("alpha", typed(MemoryType::Working, 0.5)).await.unwrap();
        mgr.add_memory("beta", typed(MemoryType::Episodic, 0.5)).await.unwrap();

        let items = mgr
            .retrieve_memories("alpha", &RetrieveOptions::of_type(MemoryType::Working))
            .await
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].content, "alpha");
    }

    #[tokio::test]
    async fn partial_failure_returns_survivors() {
        let mgr = MemoryManager::new();
        mgr.register(MemoryType::Working, working()).await.unwrap();
        mgr.register(MemoryType::Custom("broken".into()), Arc::new(BrokenMemory))
            .await
            .unwrap();
        mgr.add_memory("survivor", typed(MemoryType::Working, 0.5)).await.unwrap();

        let items = mgr.retrieve_memories("survivor", &RetrieveOptions::default()).await.unwrap();
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn failure_with_empty_survivor_is_not_an_error() {
        let mgr = MemoryManager::new();
        mgr.register(MemoryType::Working, working()).await.unwrap();
        mgr.register(MemoryType::Custom("broken".into()), Arc::new(BrokenMemory))
            .await
            .unwrap();
        let items = mgr.retrieve_memories("anything", &RetrieveOptions::default()).await.unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn total_failure_is_an_error() {
        let mgr = MemoryManager::new();
        mgr.register(MemoryType::Custom("broken".into()), Arc::new(BrokenMemory))
            .await
            .unwrap();
        let err = mgr.retrieve_memories("x", &RetrieveOptions::default()).await.unwrap_err();
        assert!(matches!(err, MemoryError::RetrievalFailed(_)));
    }

    #[tokio::test]
    async fn empty_registry_retrieves_nothing() {
        let mgr = MemoryManager::new();
        assert!(mgr.retrieve_memories("x", &RetrieveOptions::default()).await.unwrap().is_empty());
    }

    // ── update / remove ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn update_and_remove_delegate() {
        let mgr = MemoryManager::new();
        mgr.register(MemoryType::Working, working()).await.unwrap();
        let id = mgr.add_memory("draft", typed(MemoryType::Working, 0.5)).await.unwrap();

        mgr.update_memory(&MemoryType::Working, &id, MemoryUpdate::content("final"))
            .await
            .unwrap();
        let items = mgr.retrieve_memories("final", &RetrieveOptions::default()).await.unwrap();
        assert_eq!(items[0].content, "final");

        mgr.remove_memory(&MemoryType::Working, &id).await.unwrap();
        let err = mgr.remove_memory(&MemoryType::Working, &id).await.unwrap_err();
        assert!(matches!(err, MemoryError::NotFound(_)));
        let err = mgr.remove_memory(&MemoryType::Semantic, &id).await.unwrap_err();
        assert_eq!(err, MemoryError::MemoryTypeNotFound(MemoryType::Semantic));
    }

    // ── forget ───────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn forget_sums_and_skips_failing_backends() {
        let mgr = MemoryManager::new();
        mgr.register(MemoryType::Working, working()).await.unwrap();
        mgr.register(MemoryType::Episodic, episodic()).await.unwrap();
        mgr.register(MemoryType::Custom("broken".into()), Arc::new(BrokenMemory))
            .await
            .unwrap();
        mgr.add_memory("w low", typed(MemoryType::Working, 0.1)).await.unwrap();
        mgr.add_memory("w high", typed(MemoryType::Working, 0.9)).await.unwrap();
        mgr.add_memory("e low", typed(MemoryType::Episodic, 0.2)).await.unwrap();

        let removed = mgr
            .forget_memories(ForgetStrategy::Importance, &ForgetOptions::default())
            .await;
        assert_eq!(removed, 2);
        let stats = mgr.stats().await;
        assert_eq!(stats[&MemoryType::Working].count, 1);
        assert_eq!(stats[&MemoryType::Episodic].count, 0);
    }

    // ── consolidate ──────────────────────────────────────────────────────────

    #[tokio::test]
    async fn consolidation_moves_important_items() {
        let mgr = MemoryManager::new();
        mgr.register(MemoryType::Working, working()).await.unwrap();
        mgr.register(MemoryType::Episodic, episodic()).await.unwrap();
        let keep = mgr.add_memory("small talk", typed(MemoryType::Working, 0.3)).await.unwrap();
        let promote = mgr.add_memory("ship by friday", typed(MemoryType::Working, 0.8)).await.unwrap();

        let moved = mgr.consolidate_memories(&ConsolidateOptions::default()).await.unwrap();
        assert_eq!(moved, 1);

        let working = mgr.get_memory(&MemoryType::Working).await.unwrap();
        let episodic = mgr.get_memory(&MemoryType::Episodic).await.unwrap();
        assert!(working.has(&keep).await);
        assert!(!working.has(&promote).await);
        assert!(episodic.has(&promote).await);

        let items = mgr
            .retrieve_memories("friday", &RetrieveOptions::of_type(MemoryType::Episodic))
            .await
            .unwrap();
        assert_eq!(items[0].memory_type, MemoryType::Episodic);
    }

    #[tokio::test]
    async fn consolidation_respects_min_age() {
        let mgr = MemoryManager::new();
        let source = WorkingStore::new(Default::default());
        let old = MemoryItem::new("old but vital", MemoryType::Working, 0.9)
            .unwrap()
            .with_timestamp(Utc::now() - Duration::days(3));
        let old_id = source.add(old).await.unwrap();
        source
            .add(MemoryItem::new("fresh and vital", MemoryType::Working, 0.9).unwrap())
            .await
            .unwrap();
        mgr.register(MemoryType::Working, Arc::new(source)).await.unwrap();
        mgr.register(MemoryType::Episodic, episodic()).await.unwrap();

        let opts = ConsolidateOptions { min_age_days: Some(1.0), ..Default::default() };
        assert_eq!(mgr.consolidate_memories(&opts).await.unwrap(), 1);
        let episodic = mgr.get_memory(&MemoryType::Episodic).await.unwrap();
        assert!(episodic.has(&old_id).await);
    }

    #[tokio::test]
    async fn consolidation_keeps_items_the_target_rejects() {
        let mgr = MemoryManager::new();
        mgr.register(MemoryType::Working, working()).await.unwrap();
        mgr.register(MemoryType::Custom("broken".into()), Arc::new(BrokenMemory))
            .await
            .unwrap();
        let id = mgr.add_memory("vital", typed(MemoryType::Working, 0.95)).await.unwrap();

        let opts = ConsolidateOptions {
            target_type: MemoryType::Custom("broken".into()),
            ..Default::default()
        };
        assert_eq!(mgr.consolidate_memories(&opts).await.unwrap(), 0);
        assert!(mgr.get_memory(&MemoryType::Working).await.unwrap().has(&id).await);
    }

    #[tokio::test]
    async fn consolidation_needs_both_tiers() {
        let mgr = MemoryManager::new();
        mgr.register(MemoryType::Working, working()).await.unwrap();
        let err = mgr.consolidate_memories(&ConsolidateOptions::default()).await.unwrap_err();
        assert_eq!(err, MemoryError::MemoryTypeNotFound(MemoryType::Episodic));
    }
}
