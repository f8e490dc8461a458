//! Scene analysis: the full evidence + query fan-out for one scene graph.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::QueryError;
use crate::evidence::EvidenceEncoder;
use crate::lexicon::CategoryLexicon;
use crate::query::{QueryEngine, ScoredCandidate};
use crate::scene::{Entity, SceneGraph};

/// Everything computed for one scene graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneAnalysis {
    /// Evidence tokens derived from the scene.
    pub evidences: Vec<String>,
    /// Objects likely to co-occur with the scene.
    pub co_occur_probs: Vec<ScoredCandidate>,
    /// Entity name -> likely attributes.
    pub attr_probs: BTreeMap<String, Vec<ScoredCandidate>>,
    /// `<object>_<subject>` -> likely relationships (non-empty lists only).
    pub relation_probs: BTreeMap<String, Vec<ScoredCandidate>>,
}

/// Runs one co-occurrence query, one attribute query per known entity and one
/// relationship query per ordered pair of known entities.
///
/// A scene with no entities and no relationships yields an empty analysis
/// without consulting the oracle. Any failing sub-query aborts the analysis;
/// no partial result is returned.
pub fn analyze(
    scene: &SceneGraph,
    lexicon: &CategoryLexicon,
    encoder: &EvidenceEncoder<'_>,
    engine: &QueryEngine<'_>,
    top_k: usize,
) -> Result<SceneAnalysis, QueryError> {
    if scene.is_empty() {
        return Ok(SceneAnalysis::default());
    }

    let entities: Vec<&Entity> = scene
        .entities_in_order()
        .filter(|e| lexicon.is_object(&e.name))
        .collect();

    let evidences = encoder.encode(scene);
    let evidence = encoder.vectorize(&evidences);
    tracing::debug!(
        entities = entities.len(),
        evidences = evidences.len(),
        "analyzing scene graph"
    );

    let co_occur_probs = engine.co_occurrence(&evidence, top_k)?;

    let mut attr_probs = BTreeMap::new();
    for entity in &entities {
        let ranked = engine.attributes(&evidence, &entity.name, top_k)?;
        attr_probs.insert(entity.name.clone(), ranked);
    }

    let mut relation_probs = BTreeMap::new();
    for (i, first) in entities.iter().enumerate() {
        for second in &entities[i + 1..] {
            for (object, subject) in [(first, second), (second, first)] {
                let ranked = engine.relationships(&object.name, &subject.name, top_k)?;
                if !ranked.is_empty() {
                    relation_probs.insert(format!("{}_{}", object.name, subject.name), ranked);
                }
            }
        }
    }

    Ok(SceneAnalysis {
        evidences,
        co_occur_probs,
        attr_probs,
        relation_probs,
    })
}
