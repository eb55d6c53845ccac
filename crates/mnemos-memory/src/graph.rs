//! Knowledge Graph.
//!
//! A small in-memory graph of named [`Entity`]s joined by typed,
//! strength-weighted [`Relation`]s.
//!
//! # Invariants
//!
//! * Entity names are unique case-insensitively.  Adding a name that already
//!   exists bumps the existing entity's `frequency` instead of creating a
//!   duplicate.
//! * Both endpoints of a relation exist when it is created.
//! * Deleting an entity deletes every relation that references it.
//!
//! The graph itself is not synchronized; [`SemanticStore`][crate::semantic::SemanticStore]
//! owns one behind its lock.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

use chrono::{DateTime, Utc};
use mnemos_types::{MemoryError, Metadata, clamp_unit, new_id};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Strength given to a relation created without an explicit one.
pub const DEFAULT_RELATION_STRENGTH: f32 = 1.0;

// ─────────────────────────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Person,
    Organization,
    Location,
    Concept,
    Event,
    Product,
    Other,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Person => "person",
            EntityType::Organization => "organization",
            EntityType::Location => "location",
            EntityType::Concept => "concept",
            EntityType::Event => "event",
            EntityType::Product => "product",
            EntityType::Other => "other",
        }
    }

    /// Parse a type tag; unknown tags map to [`EntityType::Other`].
    pub fn parse(tag: &str) -> Self {
        match tag.trim().to_lowercase().as_str() {
            "person" => EntityType::Person,
            "organization" => EntityType::Organization,
            "location" => EntityType::Location,
            "concept" => EntityType::Concept,
            "event" => EntityType::Event,
            "product" => EntityType::Product,
            _ => EntityType::Other,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    RelatedTo,
    PartOf,
    HasA,
    IsA,
    LocatedIn,
    WorksAt,
    Knows,
    CreatedBy,
    DependsOn,
    SimilarTo,
}

impl RelationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::RelatedTo => "related_to",
            RelationType::PartOf => "part_of",
            RelationType::HasA => "has_a",
            RelationType::IsA => "is_a",
            RelationType::LocatedIn => "located_in",
            RelationType::WorksAt => "works_at",
            RelationType::Knows => "knows",
            RelationType::CreatedBy => "created_by",
            RelationType::DependsOn => "depends_on",
            RelationType::SimilarTo => "similar_to",
        }
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named thing in the graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub name: String,
    pub entity_type: EntityType,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub properties: Metadata,
    /// How many times this name has been added.
    pub frequency: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity {
    pub fn new(name: impl Into<String>, entity_type: EntityType) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            name: name.into(),
            entity_type,
            description: String::new(),
            properties: Metadata::new(),
            frequency: 1,
            embedding: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_properties(mut self, properties: Metadata) -> Self {
        self.properties = properties;
        self
    }

    /// Text embedded for this entity: `name: description`.
    pub fn embedding_text(&self) -> String {
        format!("{}: {}", self.name, self.description)
    }
}

/// A typed, weighted edge between two entities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relation {
    pub id: String,
    pub source_id: String,
    pub target_id: String,
    pub relation_type: RelationType,
    /// Strength in `[0, 1]`.
    pub strength: f32,
    /// Ids of the items that support this relation, without duplicates.
    #[serde(default)]
    pub evidence: Vec<String>,
    #[serde(default)]
    pub properties: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Relation {
    pub fn new(
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        relation_type: RelationType,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            source_id: source_id.into(),
            target_id: target_id.into(),
            relation_type,
            strength: DEFAULT_RELATION_STRENGTH,
            evidence: Vec::new(),
            properties: Metadata::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_strength(mut self, strength: f32) -> Self {
        self.strength = strength;
        self
    }

    pub fn with_evidence(mut self, evidence_id: impl Into<String>) -> Self {
        self.evidence.push(evidence_id.into());
        self
    }

    /// The endpoint opposite `entity_id`, if this relation touches it.
    pub fn other_end(&self, entity_id: &str) -> Option<&str> {
        if self.source_id == entity_id {
            Some(&self.target_id)
        } else if self.target_id == entity_id {
            Some(&self.source_id)
        } else {
            None
        }
    }

    fn add_evidence(&mut self, evidence_id: &str) {
        if !evidence_id.is_empty() && !self.evidence.iter().any(|e| e == evidence_id) {
            self.evidence.push(evidence_id.to_string());
        }
    }
}

/// Partial update for [`KnowledgeGraph::update_entity`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityUpdate {
    pub name: Option<String>,
    pub entity_type: Option<EntityType>,
    pub description: Option<String>,
    /// Merged into the existing properties.
    pub properties: Option<Metadata>,
}

/// Partial update for [`KnowledgeGraph::update_relation`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelationUpdate {
    pub relation_type: Option<RelationType>,
    /// Clamped to `[0, 1]`.
    pub strength: Option<f32>,
    /// Appended, skipping ids already recorded.
    #[serde(default)]
    pub evidence: Vec<String>,
    pub properties: Option<Metadata>,
}

/// One entity reached by [`KnowledgeGraph::get_related_entities`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelatedEntity {
    pub entity: Entity,
    /// Hops from the start entity (1 = direct neighbour).
    pub depth: usize,
    /// `strength / depth` of the relation that reached this entity.
    pub score: f32,
    /// Relations walked from the start entity, in order.
    pub path: Vec<Relation>,
}

// ─────────────────────────────────────────────────────────────────────────────
// KnowledgeGraph
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct KnowledgeGraph {
    entities: HashMap<String, Entity>,
    /// Lowercased name → entity id.
    name_index: HashMap<String, String>,
    /// Insertion order; traversal follows it.
    relations: Vec<Relation>,
}

impl KnowledgeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    // ── entities ─────────────────────────────────────────────────────────────

    /// Insert `entity` or, when its name is already present, bump the
    /// existing entity's frequency.  Returns the id of the stored entity and
    /// whether it was newly created.
    ///
    /// On collision an empty description is filled in and properties are
    /// merged.
    pub fn add_entity(&mut self, mut entity: Entity) -> Result<(String, bool), MemoryError> {
        let name = entity.name.trim().to_string();
        if name.is_empty() {
            return Err(MemoryError::InvalidInput("entity name must be non-empty".into()));
        }
        let key = name.to_lowercase();

        if let Some(existing_id) = self.name_index.get(&key) {
            let existing_id = existing_id.clone();
            if let Some(existing) = self.entities.get_mut(&existing_id) {
                existing.frequency += 1;
                existing.updated_at = Utc::now();
                if existing.description.is_empty() && !entity.description.is_empty() {
                    existing.description = entity.description;
                }
                existing.properties.extend(entity.properties);
                return Ok((existing_id, false));
            }
        }

        if entity.id.is_empty() {
            entity.id = new_id();
        }
        entity.name = name;
        entity.frequency = entity.frequency.max(1);
        let id = entity.id.clone();
        self.name_index.insert(key, id.clone());
        self.entities.insert(id.clone(), entity);
        debug!(id = %id, "entity added");
        Ok((id, true))
    }

    pub fn get_entity(&self, id: &str) -> Option<&Entity> {
        self.entities.get(id)
    }

    /// Case-insensitive lookup.
    pub fn find_entity_by_name(&self, name: &str) -> Option<&Entity> {
        self.name_index
            .get(&name.trim().to_lowercase())
            .and_then(|id| self.entities.get(id))
    }

    /// Entities of `entity_type`, oldest first.
    pub fn entities_by_type(&self, entity_type: EntityType) -> Vec<&Entity> {
        let mut out: Vec<&Entity> = self
            .entities
            .values()
            .filter(|e| e.entity_type == entity_type)
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        out
    }

    pub fn update_entity(&mut self, id: &str, update: EntityUpdate) -> Result<(), MemoryError> {
        if !self.entities.contains_key(id) {
            return Err(MemoryError::NotFound(id.to_string()));
        }
        if let Some(name) = &update.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(MemoryError::InvalidInput("entity name must be non-empty".into()));
            }
            let key = name.to_lowercase();
            if self.name_index.get(&key).is_some_and(|owner| owner != id) {
                return Err(MemoryError::InvalidInput(format!("entity name already used: {name}")));
            }
        }

        let Some(entity) = self.entities.get_mut(id) else {
            return Err(MemoryError::NotFound(id.to_string()));
        };
        if let Some(name) = update.name {
            let name = name.trim().to_string();
            self.name_index.remove(&entity.name.to_lowercase());
            self.name_index.insert(name.to_lowercase(), id.to_string());
            entity.name = name;
        }
        if let Some(entity_type) = update.entity_type {
            entity.entity_type = entity_type;
        }
        if let Some(description) = update.description {
            entity.description = description;
        }
        if let Some(properties) = update.properties {
            entity.properties.extend(properties);
        }
        entity.updated_at = Utc::now();
        Ok(())
    }

    /// Remove an entity and every relation referencing it.  Returns the
    /// number of relations removed.
    pub fn delete_entity(&mut self, id: &str) -> Result<usize, MemoryError> {
        let entity = self
            .entities
            .remove(id)
            .ok_or_else(|| MemoryError::NotFound(id.to_string()))?;
        self.name_index.remove(&entity.name.to_lowercase());
        let before = self.relations.len();
        self.relations.retain(|r| r.source_id != id && r.target_id != id);
        let cascaded = before - self.relations.len();
        debug!(id = %id, cascaded, "entity deleted");
        Ok(cascaded)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    // ── relations ────────────────────────────────────────────────────────────

    /// Insert `relation`.  Both endpoints must exist.
    pub fn add_relation(&mut self, mut relation: Relation) -> Result<String, MemoryError> {
        for endpoint in [&relation.source_id, &relation.target_id] {
            if !self.entities.contains_key(endpoint) {
                return Err(MemoryError::InvalidInput(format!(
                    "relation endpoint does not exist: {endpoint}"
                )));
            }
        }
        if relation.strength.is_nan() {
            return Err(MemoryError::InvalidInput("relation strength must be a number".into()));
        }
        if relation.id.is_empty() {
            relation.id = new_id();
        }
        relation.strength = clamp_unit(relation.strength);
        let evidence = std::mem::take(&mut relation.evidence);
        for e in &evidence {
            relation.add_evidence(e);
        }
        let id = relation.id.clone();
        self.relations.push(relation);
        Ok(id)
    }

    pub fn get_relation(&self, id: &str) -> Option<&Relation> {
        self.relations.iter().find(|r| r.id == id)
    }

    /// The first relation of `relation_type` from `source_id` to `target_id`.
    pub fn find_relation(
        &self,
        source_id: &str,
        target_id: &str,
        relation_type: RelationType,
    ) -> Option<&Relation> {
        self.relations.iter().find(|r| {
            r.source_id == source_id && r.target_id == target_id && r.relation_type == relation_type
        })
    }

    /// Relations touching `entity_id` in either direction.
    pub fn relations_of(&self, entity_id: &str) -> Vec<&Relation> {
        self.relations
            .iter()
            .filter(|r| r.source_id == entity_id || r.target_id == entity_id)
            .collect()
    }

    pub fn update_relation(&mut self, id: &str, update: RelationUpdate) -> Result<(), MemoryError> {
        let relation = self
            .relations
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| MemoryError::NotFound(id.to_string()))?;
        if let Some(relation_type) = update.relation_type {
            relation.relation_type = relation_type;
        }
        if let Some(strength) = update.strength {
            relation.strength = clamp_unit(strength);
        }
        for e in &update.evidence {
            relation.add_evidence(e);
        }
        if let Some(properties) = update.properties {
            relation.properties.extend(properties);
        }
        relation.updated_at = Utc::now();
        Ok(())
    }

    pub fn delete_relation(&mut self, id: &str) -> Result<Relation, MemoryError> {
        let pos = self
            .relations
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| MemoryError::NotFound(id.to_string()))?;
        Ok(self.relations.remove(pos))
    }

    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    pub fn relation_count(&self) -> usize {
        self.relations.len()
    }

    // ── traversal ────────────────────────────────────────────────────────────

    /// Breadth-first discovery over the undirected relation graph.
    ///
    /// Each entity is visited at most once, at its shallowest depth, up to
    /// `max_depth` hops.  Every discovery is scored as the strength of the
    /// relation that reached it divided by its depth, and the result is
    /// sorted by score descending.
    pub fn get_related_entities(
        &self,
        entity_id: &str,
        max_depth: usize,
    ) -> Result<Vec<RelatedEntity>, MemoryError> {
        if !self.entities.contains_key(entity_id) {
            return Err(MemoryError::NotFound(entity_id.to_string()));
        }

        let mut queue: VecDeque<(&str, usize, Vec<&Relation>)> = VecDeque::new();
        let mut visited: HashSet<&str> = HashSet::new();
        let mut found: Vec<RelatedEntity> = Vec::new();

        queue.push_back((entity_id, 0, Vec::new()));
        visited.insert(entity_id);

        while let Some((current, depth, path)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            for relation in &self.relations {
                let Some(next) = relation.other_end(current) else {
                    continue;
                };
                if visited.contains(next) {
                    continue;
                }
                let Some(entity) = self.entities.get(next) else {
                    continue;
                };
                visited.insert(next);

                let next_depth = depth + 1;
                let mut next_path = path.clone();
                next_path.push(relation);
                found.push(RelatedEntity {
                    entity: entity.clone(),
                    depth: next_depth,
                    score: relation.strength / next_depth as f32,
                    path: next_path.iter().map(|r| (*r).clone()).collect(),
                });
                queue.push_back((next, next_depth, next_path));
            }
        }

        found.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(found)
    }

    pub fn clear(&mut self) {
        self.entities.clear();
        self.name_index.clear();
        self.relations.clear();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
