//! `mnemos-memory` – The Memory Tiers.
//!
//! Three volatile, lock-guarded stores that share one contract
//! ([`Memory`][traits::Memory]) so the manager can route writes to them and
//! fan reads out across them.
//!
//! # Modules
//!
//! - [`traits`] – the [`Memory`][traits::Memory] contract, the optional
//!   [`Forgetter`][traits::Forgetter] capability, and the external
//!   [`Embedder`][traits::Embedder] collaborator.
//! - [`scoring`] – the similarity/recency/importance composite, keyword
//!   overlap, relative-time labels, and the three forgetting policies shared
//!   by every store.
//! - [`working`] – [`WorkingStore`][working::WorkingStore]: a bounded,
//!   time-boxed window of recent conversational items with a token budget.
//! - [`episodic`] – [`EpisodicStore`][episodic::EpisodicStore]: a
//!   session-indexed log of timestamped episodes with TF-IDF recall, pattern
//!   mining, and a relative-time timeline.
//! - [`semantic`] – [`SemanticStore`][semantic::SemanticStore]: a fact store
//!   with a three-tier search (embeddings → TF-IDF → keywords) and an
//!   embedded knowledge graph.
//! - [`graph`] – [`KnowledgeGraph`][graph::KnowledgeGraph]: entities with
//!   case-insensitive deduplication, strength-weighted relations, and
//!   breadth-first related-entity discovery.
//! - [`extraction`] – [`PatternExtractor`][extraction::PatternExtractor]: a
//!   regex-based [`EntityExtractor`][extraction::EntityExtractor] for English
//!   and Chinese text.

pub mod episodic;
pub mod extraction;
pub mod graph;
pub mod scoring;
pub mod semantic;
pub mod traits;
pub mod working;

pub use episodic::{Episode, EpisodeFilter, EpisodicConfig, EpisodicStore, Pattern, ScoredEpisode};
pub use extraction::{EntityExtractor, ExtractedEntity, ExtractedRelation, PatternExtractor};
pub use graph::{Entity, EntityType, KnowledgeGraph, RelatedEntity, Relation, RelationType};
pub use semantic::{SemanticConfig, SemanticStore};
pub use traits::{Embedder, Forgetter, Memory};
pub use working::{WorkingConfig, WorkingStore};
