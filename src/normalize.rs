//! Scene graph normalization: raw dependency-parse output to [`SceneGraph`].
//!
//! The raw parse is validated into typed records at the boundary, then
//! filtered against the [`CategoryLexicon`]:
//!
//! 1. **Entities**: retained according to [`EntityRetention`], categorized by
//!    the first lexicon category containing the head word
//! 2. **Attributes**: `amod` modifiers, optionally restricted to the attribute
//!    vocabulary ([`AttributeFilter`])
//! 3. **Relations**: kept when the relation is in the relationship vocabulary,
//!    with subject/object indices rewritten to entity names

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::NormalizeError;
use crate::lexicon::CategoryLexicon;
use crate::scene::{Entity, Relationship, SceneGraph};

/// Dependency tag for adjectival modifiers.
pub const AMOD: &str = "amod";

/// A modifier attached to an entity head word.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawModifier {
    pub dep: String,
    pub span: String,
}

/// An entity as produced by the dependency parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEntity {
    pub head: String,
    pub modifiers: Vec<RawModifier>,
}

/// A directed relation between two entity indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRelation {
    pub relation: String,
    pub subject: usize,
    pub object: usize,
}

/// Raw parser output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSceneGraph {
    pub entities: Vec<RawEntity>,
    pub relations: Vec<RawRelation>,
}

impl RawSceneGraph {
    /// Decode parser JSON. Missing or mistyped fields are a `Malformed` error.
    pub fn from_json(value: serde_json::Value) -> Result<Self, NormalizeError> {
        serde_json::from_value(value).map_err(|e| NormalizeError::Malformed {
            message: e.to_string(),
        })
    }
}

/// Which parsed entities survive normalization, and how they are numbered.
///
/// Relation indices refer to the parser's entity positions, so the choice
/// decides which ids the resulting scene graph carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityRetention {
    /// Keep every entity; id = parser position.
    #[default]
    KeepAll,
    /// Drop heads outside the object vocabulary; renumber survivors 0..n.
    KnownRenumbered,
    /// Drop heads outside the object vocabulary; id = parser position (holes allowed).
    KnownSparse,
}

/// Which `amod` modifiers become entity attributes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeFilter {
    /// Every adjectival modifier.
    #[default]
    AnyAdjective,
    /// Adjectival modifiers that are also in the attribute vocabulary.
    Vocabulary,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizeOptions {
    #[serde(default)]
    pub retention: EntityRetention,
    #[serde(default)]
    pub attributes: AttributeFilter,
}

/// Converts raw parses into canonical scene graphs.
#[derive(Debug, Clone, Copy)]
pub struct Normalizer<'a> {
    lexicon: &'a CategoryLexicon,
    options: NormalizeOptions,
}

impl<'a> Normalizer<'a> {
    pub fn new(lexicon: &'a CategoryLexicon, options: NormalizeOptions) -> Self {
        Self { lexicon, options }
    }

    pub fn normalize(&self, raw: &RawSceneGraph) -> Result<SceneGraph, NormalizeError> {
        tracing::debug!(
            entities = raw.entities.len(),
            relations = raw.relations.len(),
            raw = ?raw,
            "normalizing parser output"
        );

        // Parser position -> normalized id, `None` when the entity was dropped.
        let mut ids: Vec<Option<u32>> = Vec::with_capacity(raw.entities.len());
        let mut entities = BTreeMap::new();
        let mut next_id = 0u32;

        for (position, raw_entity) in raw.entities.iter().enumerate() {
            let known = self.lexicon.is_object(&raw_entity.head);
            let id = match self.options.retention {
                EntityRetention::KeepAll => Some(position as u32),
                EntityRetention::KnownSparse => known.then_some(position as u32),
                EntityRetention::KnownRenumbered => known.then(|| {
                    let id = next_id;
                    next_id += 1;
                    id
                }),
            };
            ids.push(id);

            let Some(id) = id else {
                tracing::debug!(head = %raw_entity.head, "dropping entity outside object vocabulary");
                continue;
            };

            let attributes = raw_entity
                .modifiers
                .iter()
                .filter(|m| m.dep == AMOD)
                .filter(|m| match self.options.attributes {
                    AttributeFilter::AnyAdjective => true,
                    AttributeFilter::Vocabulary => self.lexicon.is_attribute(&m.span),
                })
                .map(|m| m.span.clone())
                .collect();

            entities.insert(
                id,
                Entity {
                    id,
                    name: raw_entity.head.clone(),
                    category: self.lexicon.category_of(&raw_entity.head).map(str::to_string),
                    attributes,
                },
            );
        }

        let mut relationships = Vec::new();
        for relation in &raw.relations {
            let subject = self.resolve(&ids, &entities, relation, relation.subject)?;
            let object = self.resolve(&ids, &entities, relation, relation.object)?;

            if !self.lexicon.is_relationship(&relation.relation) {
                tracing::debug!(relation = %relation.relation, "dropping relation outside vocabulary");
                continue;
            }
            let (Some(subject), Some(object)) = (subject, object) else {
                tracing::debug!(relation = %relation.relation, "dropping relation to a dropped entity");
                continue;
            };
            relationships.push(Relationship::new(relation.relation.clone(), subject, object));
        }

        Ok(SceneGraph {
            entities,
            relationships,
        })
    }

    /// Map a parser index to the retained entity's name.
    fn resolve(
        &self,
        ids: &[Option<u32>],
        entities: &BTreeMap<u32, Entity>,
        relation: &RawRelation,
        index: usize,
    ) -> Result<Option<String>, NormalizeError> {
        let slot = ids.get(index).ok_or_else(|| NormalizeError::DanglingIndex {
            relation: relation.relation.clone(),
            index,
            count: ids.len(),
        })?;
        Ok(slot
            .and_then(|id| entities.get(&id))
            .map(|entity| entity.name.clone()))
    }
}
