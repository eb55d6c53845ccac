//! Store contracts.
//!
//! Every tier implements [`Memory`].  Bulk eviction is an optional capability:
//! a backend advertises it by returning `Some` from [`Memory::forgetter`], so
//! callers can ask "does this backend forget?" without inspecting concrete
//! types.

use async_trait::async_trait;
use mnemos_types::{
    ForgetOptions, ForgetStrategy, MemoryError, MemoryItem, MemoryStats, MemoryType,
    MemoryUpdate, RetrieveOptions,
};

/// The contract shared by every memory backend.
///
/// Implementations must be safe to share across tasks; the manager holds them
/// behind `Arc<dyn Memory>` and calls them concurrently.
#[async_trait]
pub trait Memory: Send + Sync {
    /// The tier this backend stores.
    fn memory_type(&self) -> MemoryType;

    /// Store `item` and return its id.
    async fn add(&self, item: MemoryItem) -> Result<String, MemoryError>;

    /// Return the items most relevant to `query`, best first.
    async fn retrieve(
        &self,
        query: &str,
        opts: &RetrieveOptions,
    ) -> Result<Vec<MemoryItem>, MemoryError>;

    async fn update(&self, id: &str, update: MemoryUpdate) -> Result<(), MemoryError>;

    async fn remove(&self, id: &str) -> Result<(), MemoryError>;

    async fn has(&self, id: &str) -> bool;

    async fn clear(&self) -> Result<(), MemoryError>;

    async fn stats(&self) -> MemoryStats;

    /// The bulk-forgetting capability, if this backend has one.
    fn forgetter(&self) -> Option<&dyn Forgetter> {
        None
    }
}

/// Optional bulk-eviction capability.
#[async_trait]
pub trait Forgetter: Send + Sync {
    /// Apply `strategy` and return the number of items removed.
    async fn forget(
        &self,
        strategy: ForgetStrategy,
        opts: &ForgetOptions,
    ) -> Result<usize, MemoryError>;
}

/// External embedding provider (for example a vendor embedding API).
///
/// Retry policy, if any, belongs to the implementation.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed each text, returning one vector per input.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, MemoryError>;
}

/// Embed a single text.
///
/// Returns [`MemoryError::EmbeddingFailed`] when the embedder yields no
/// vector or an empty one.
pub async fn embed_one(embedder: &dyn Embedder, text: &str) -> Result<Vec<f32>, MemoryError> {
    let mut vectors = embedder.embed(&[text.to_string()]).await?;
    match vectors.pop() {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(MemoryError::EmbeddingFailed(
            "embedder returned no vectors".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedEmbedder(Vec<Vec<f32>>);

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, MemoryError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn embed_one_returns_single_vector() {
        let e = FixedEmbedder(vec![vec![0.1, 0.2]]);
        assert_eq!(embed_one(&e, "x").await.unwrap(), vec![0.1, 0.2]);
    }

    #[tokio::test]
    async fn embed_one_without_vectors_fails() {
        let e = FixedEmbedder(Vec::new());
        let err = embed_one(&e, "x").await.unwrap_err();
        assert!(matches!(err, MemoryError::EmbeddingFailed(_)));
    }

    #[tokio::test]
    async fn embed_one_with_empty_vector_fails() {
        let e = FixedEmbedder(vec![Vec::new()]);
        assert!(embed_one(&e, "x").await.is_err());
    }
}
