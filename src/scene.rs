//! Canonical scene graph: entities keyed by id, relationships by entity name.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// An object mentioned in a scene.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: u32,
    pub name: String,
    /// `None` when the name matches no lexicon category.
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub attributes: Vec<String>,
}

/// A directed relationship between two entities, referenced by *name*.
///
/// Entities that share a name cannot be told apart here; a relationship whose
/// subject or object matches no entity is kept as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub name: String,
    pub subject: String,
    pub object: String,
}

impl Relationship {
    pub fn new(name: impl Into<String>, subject: impl Into<String>, object: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subject: subject.into(),
            object: object.into(),
        }
    }
}

/// Entities keyed by stable id plus an ordered relationship list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneGraph {
    pub entities: BTreeMap<u32, Entity>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

impl SceneGraph {
    /// Build a scene graph from entities (keyed by their own ids).
    pub fn from_parts(entities: impl IntoIterator<Item = Entity>, relationships: Vec<Relationship>) -> Self {
        Self {
            entities: entities.into_iter().map(|e| (e.id, e)).collect(),
            relationships,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relationships.is_empty()
    }

    /// Entities in ascending id order.
    pub fn entities_in_order(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// The lowest-id entity with the given name.
    pub fn entity_named(&self, name: &str) -> Option<&Entity> {
        self.entities.values().find(|e| e.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_uses_string_entity_keys() {
        let scene = SceneGraph::from_parts(
            [Entity {
                id: 0,
                name: "man".into(),
                category: Some("person".into()),
                attributes: vec!["tall".into()],
            }],
            vec![Relationship::new("on", "man", "horse")],
        );
        let json = serde_json::to_value(&scene).unwrap();
        assert_eq!(json["entities"]["0"]["name"], "man");
        assert_eq!(json["relationships"][0]["object"], "horse");
    }

    #[test]
    fn parses_null_category_and_missing_attributes() {
        let scene: SceneGraph = serde_json::from_str(
            r#"{"entities": {"3": {"id": 3, "name": "spaceship", "category": null}},
                "relationships": []}"#,
        )
        .unwrap();
        let entity = &scene.entities[&3];
        assert_eq!(entity.category, None);
        assert!(entity.attributes.is_empty());
    }

    #[test]
    fn missing_name_is_rejected() {
        let result: Result<SceneGraph, _> =
            serde_json::from_str(r#"{"entities": {"0": {"id": 0}}, "relationships": []}"#);
        assert!(result.is_err());
    }

    #[test]
    fn entity_named_prefers_lowest_id() {
        let scene = SceneGraph::from_parts(
            [
                Entity { id: 4, name: "dog".into(), category: None, attributes: vec![] },
                Entity { id: 1, name: "dog".into(), category: None, attributes: vec!["small".into()] },
            ],
            Vec::new(),
        );
        assert_eq!(scene.entity_named("dog").map(|e| e.id), Some(1));
        assert!(scene.entity_named("cat").is_none());
    }
}
