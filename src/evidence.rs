//! Evidence encoding: scene graph -> evidence tokens -> evidence vector.
//!
//! Encoding is strictly positive and open-world: observed features are
//! `Present`, everything else stays `Unknown` and is marginalized by the
//! oracle. No slot is ever set to "absent".
//!
//! Token templates:
//! - entity: `has_<name>` or `has_<category>` ([`EntityEvidence`])
//! - relationship: `<object>_<relation>_<subject>` (object first)
//!
//! Tokens missing from the [`FeatureVocabulary`] are dropped, never an error.

use serde::{Deserialize, Serialize};

use crate::scene::{Relationship, SceneGraph};
use crate::vocab::FeatureVocabulary;

/// The state of one feature slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Observation {
    #[default]
    Unknown,
    Present,
}

/// A fixed-length evidence vector over the feature vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EvidenceVector {
    slots: Vec<Observation>,
}

impl EvidenceVector {
    /// All-`Unknown` vector with `len` slots.
    pub fn unknown(len: usize) -> Self {
        Self {
            slots: vec![Observation::Unknown; len],
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[Observation] {
        &self.slots
    }

    pub fn get(&self, idx: usize) -> Option<Observation> {
        self.slots.get(idx).copied()
    }

    pub fn is_present(&self, idx: usize) -> bool {
        self.get(idx) == Some(Observation::Present)
    }

    /// Mark a slot present. Out-of-range indices are ignored.
    pub fn mark_present(&mut self, idx: usize) {
        if let Some(slot) = self.slots.get_mut(idx) {
            *slot = Observation::Present;
        }
    }

    /// A copy with one additional slot marked present.
    pub fn with_present(&self, idx: usize) -> Self {
        let mut next = self.clone();
        next.mark_present(idx);
        next
    }

    pub fn present_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| **s == Observation::Present)
            .count()
    }

    /// Indices of present slots, ascending.
    pub fn present_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| **s == Observation::Present)
            .map(|(idx, _)| idx)
    }
}

/// Which entity property becomes the per-entity evidence token.
///
/// The two are not interchangeable: `Name` needs one `has_<object>` feature
/// per object name, `Category` one per category. Pick the one the feature
/// vocabulary was trained against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityEvidence {
    #[default]
    Name,
    Category,
}

/// `has_<what>`
pub fn presence_feature(what: &str) -> String {
    format!("has_{what}")
}

/// `<object>_<relation>_<subject>`
pub fn relation_feature(object: &str, relation: &str, subject: &str) -> String {
    format!("{object}_{relation}_{subject}")
}

/// `<object>_attr_<attribute>`
pub fn attribute_feature(object: &str, attribute: &str) -> String {
    format!("{object}_attr_{attribute}")
}

/// Encodes scene graphs against a fixed feature vocabulary.
#[derive(Debug, Clone, Copy)]
pub struct EvidenceEncoder<'a> {
    vocab: &'a FeatureVocabulary,
    entity_evidence: EntityEvidence,
}

impl<'a> EvidenceEncoder<'a> {
    pub fn new(vocab: &'a FeatureVocabulary, entity_evidence: EntityEvidence) -> Self {
        Self {
            vocab,
            entity_evidence,
        }
    }

    /// Evidence tokens for a scene: entity tokens in id order, then
    /// relationship tokens in list order. Unrecognized tokens are skipped.
    pub fn encode(&self, scene: &SceneGraph) -> Vec<String> {
        let entity_tokens = scene.entities_in_order().filter_map(|entity| {
            match self.entity_evidence {
                EntityEvidence::Name => Some(presence_feature(&entity.name)),
                EntityEvidence::Category => entity.category.as_deref().map(presence_feature),
            }
        });
        let relation_tokens = scene.relationships.iter().map(
            |Relationship { name, subject, object }| relation_feature(object, name, subject),
        );

        entity_tokens
            .chain(relation_tokens)
            .filter(|token| {
                let known = self.vocab.contains(token);
                if !known {
                    tracing::debug!(%token, "dropping evidence token outside feature vocabulary");
                }
                known
            })
            .collect()
    }

    /// Vectorize tokens: all `Unknown`, then each known token `Present`.
    pub fn vectorize<S: AsRef<str>>(&self, tokens: &[S]) -> EvidenceVector {
        let mut vector = EvidenceVector::unknown(self.vocab.len());
        for token in tokens {
            if let Some(idx) = self.vocab.index_of(token.as_ref()) {
                vector.mark_present(idx);
            }
        }
        vector
    }

    pub fn vocab(&self) -> &FeatureVocabulary {
        self.vocab
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Entity;

    fn vocab(names: &[&str]) -> FeatureVocabulary {
        FeatureVocabulary::new(names.iter().map(|n| (*n).to_string()).collect()).unwrap()
    }

    fn ent(id: u32, name: &str, category: Option<&str>) -> Entity {
        Entity {
            id,
            name: name.into(),
            category: category.map(str::to_string),
            attributes: Vec::new(),
        }
    }

    #[test]
    fn object_precedes_subject_in_relation_tokens() {
        let vocab = vocab(&["has_man", "has_dog", "man_on_dog", "dog_on_man"]);
        let scene = SceneGraph::from_parts(
            [ent(0, "man", Some("person")), ent(1, "dog", Some("animal"))],
            vec![Relationship::new("on", "man", "dog")],
        );
        let tokens = EvidenceEncoder::new(&vocab, EntityEvidence::Name).encode(&scene);
        assert_eq!(tokens, vec!["has_man", "has_dog", "dog_on_man"]);
    }

    #[test]
    fn unknown_tokens_are_dropped() {
        let vocab = vocab(&["has_cat"]);
        let scene = SceneGraph::from_parts([ent(0, "dog", Some("animal"))], Vec::new());
        let tokens = EvidenceEncoder::new(&vocab, EntityEvidence::Name).encode(&scene);
        assert!(tokens.is_empty());
    }

    #[test]
    fn category_evidence_uses_category_slots() {
        let vocab = vocab(&["has_person", "has_animal", "has_man"]);
        let scene = SceneGraph::from_parts(
            [
                ent(0, "man", Some("person")),
                ent(1, "dog", Some("animal")),
                ent(2, "spaceship", None),
            ],
            Vec::new(),
        );
        let tokens = EvidenceEncoder::new(&vocab, EntityEvidence::Category).encode(&scene);
        assert_eq!(tokens, vec!["has_person", "has_animal"]);
    }

    #[test]
    fn empty_scene_encodes_to_nothing() {
        let vocab = vocab(&["has_man"]);
        let encoder = EvidenceEncoder::new(&vocab, EntityEvidence::Name);
        let tokens = encoder.encode(&SceneGraph::default());
        assert!(tokens.is_empty());
        assert_eq!(encoder.vectorize(&tokens).present_count(), 0);
    }

    #[test]
    fn vectorize_is_idempotent_for_duplicates() {
        let vocab = vocab(&["has_man", "has_dog", "man_on_dog"]);
        let encoder = EvidenceEncoder::new(&vocab, EntityEvidence::Name);
        let once = encoder.vectorize(&["has_man", "man_on_dog"]);
        let twice = encoder.vectorize(&["has_man", "man_on_dog", "has_man"]);
        assert_eq!(once, twice);
        assert_eq!(once.present_indices().collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(once.get(1), Some(Observation::Unknown));
    }

    #[test]
    fn vectorize_ignores_unknown_tokens() {
        let vocab = vocab(&["has_man"]);
        let encoder = EvidenceEncoder::new(&vocab, EntityEvidence::Name);
        let vector = encoder.vectorize(&["has_unicorn"]);
        assert_eq!(vector, EvidenceVector::unknown(1));
    }

    #[test]
    fn with_present_leaves_original_untouched() {
        let base = EvidenceVector::unknown(3);
        let next = base.with_present(1);
        assert!(!base.is_present(1));
        assert!(next.is_present(1));
        assert_eq!(next.with_present(1), next);
    }
}
