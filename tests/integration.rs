//! End-to-end integration tests for sgpc.
//!
//! These tests write a feature vocabulary, an SPN artifact and a TOML config to
//! a temporary directory, load them through `Service::from_config`, and run the
//! full prompt → scene graph → evidence → ranked query pipeline.
//!
//! The model is a product of independent Bernoulli leaves, so every
//! conditional probability equals the candidate feature's own leaf probability.

use std::path::Path;

use sgpc::config::{ConfigError, ServiceConfig};
use sgpc::error::{OracleError, SgpcError};
use sgpc::oracle::{SpnModel, SpnNode};
use sgpc::query::ScoredCandidate;
use sgpc::scene::{Entity, Relationship, SceneGraph};
use sgpc::service::Service;

const FEATURES: &[(&str, f64)] = &[
    ("has_man", 0.5),
    ("has_horse", 0.4),
    ("has_dog", 0.2),
    ("horse_attr_brown", 0.3),
    ("horse_attr_white", 0.6),
    ("man_attr_tall", 0.25),
    ("horse_on_man", 0.1),
    ("man_on_horse", 0.7),
    ("has_sky", 0.15),
    ("has_cat", 0.0),
];

fn independent_model() -> SpnModel {
    let mut nodes: Vec<SpnNode> = FEATURES
        .iter()
        .enumerate()
        .map(|(scope, &(_, p))| SpnNode::Bernoulli { scope, p })
        .collect();
    nodes.push(SpnNode::Product {
        children: (0..FEATURES.len()).collect(),
    });
    SpnModel::new(FEATURES.len(), nodes, FEATURES.len()).unwrap()
}

/// Write artifacts plus a config file and load the config back.
fn write_artifacts(dir: &Path, model_file: &str) -> ServiceConfig {
    let names: Vec<&str> = FEATURES.iter().map(|(name, _)| *name).collect();
    let feature_names = dir.join("feature_names.json");
    std::fs::write(&feature_names, serde_json::to_string(&names).unwrap()).unwrap();

    let model = dir.join(model_file);
    independent_model().save(&model).unwrap();

    let config_path = dir.join("sgpc.toml");
    std::fs::write(
        &config_path,
        format!(
            "feature_names = {:?}\nmodel = {:?}\ntop_k = 10\n",
            feature_names.display().to_string(),
            model.display().to_string()
        ),
    )
    .unwrap();
    ServiceConfig::load(&config_path).unwrap()
}

fn scored(pairs: &[(&str, f64)]) -> Vec<ScoredCandidate> {
    pairs
        .iter()
        .map(|&(name, p)| ScoredCandidate(name.to_string(), p))
        .collect()
}

#[test]
fn prompt_to_analysis_end_to_end() {
    let dir = tempfile::TempDir::new().unwrap();
    let service = Service::from_config(&write_artifacts(dir.path(), "spn_model.json")).unwrap();

    let scene = service.parse_prompt("A tall man on a brown horse").unwrap();
    assert_eq!(scene.entities.len(), 2);
    assert_eq!(scene.entities[&0].name, "man");
    assert_eq!(scene.entities[&0].category.as_deref(), Some("person"));
    assert_eq!(scene.entities[&1].attributes, vec!["brown"]);
    assert_eq!(scene.relationships, vec![Relationship::new("on", "man", "horse")]);

    let analysis = service.analyze(&scene).unwrap();
    assert_eq!(analysis.evidences, vec!["has_man", "has_horse", "horse_on_man"]);

    // `has_cat` has a zero leaf, so it ranks last.
    assert_eq!(
        analysis.co_occur_probs,
        scored(&[("dog", 0.2), ("sky", 0.15), ("cat", 0.0)])
    );
    assert_eq!(analysis.attr_probs["man"], scored(&[("tall", 0.25)]));
    assert_eq!(
        analysis.attr_probs["horse"],
        scored(&[("white", 0.6), ("brown", 0.3)])
    );

    // Each direction gets its own two-feature evidence.
    assert_eq!(analysis.relation_probs["man_horse"], scored(&[("on", 0.7)]));
    assert_eq!(analysis.relation_probs["horse_man"], scored(&[("on", 0.1)]));
}

#[test]
fn analysis_serializes_as_name_probability_pairs() {
    let dir = tempfile::TempDir::new().unwrap();
    let service = Service::from_config(&write_artifacts(dir.path(), "spn_model.json")).unwrap();

    let scene = SceneGraph::from_parts(
        [Entity {
            id: 0,
            name: "horse".into(),
            category: Some("animal".into()),
            attributes: Vec::new(),
        }],
        Vec::new(),
    );
    let json = serde_json::to_value(service.analyze(&scene).unwrap()).unwrap();
    assert_eq!(json["evidences"], serde_json::json!(["has_horse"]));
    assert_eq!(json["attr_probs"]["horse"][0], serde_json::json!(["white", 0.6]));
    assert_eq!(json["co_occur_probs"][0], serde_json::json!(["man", 0.5]));
}

#[test]
fn bincode_artifact_matches_json_artifact() {
    let json_dir = tempfile::TempDir::new().unwrap();
    let bin_dir = tempfile::TempDir::new().unwrap();
    let from_json = Service::from_config(&write_artifacts(json_dir.path(), "spn_model.json")).unwrap();
    let from_bin = Service::from_config(&write_artifacts(bin_dir.path(), "spn_model.bin")).unwrap();

    let evidence = ["has_man", "has_horse"];
    assert_eq!(
        from_json.co_occurrence(&evidence).unwrap(),
        from_bin.co_occurrence(&evidence).unwrap()
    );
}

#[test]
fn zero_likelihood_evidence_yields_zeros() {
    let dir = tempfile::TempDir::new().unwrap();
    let service = Service::from_config(&write_artifacts(dir.path(), "spn_model.json")).unwrap();

    let evidence = ["has_cat", "has_horse"];
    let co_occur = service.co_occurrence(&evidence).unwrap();
    assert!(!co_occur.is_empty());
    assert!(co_occur.iter().all(|c| c.probability() == 0.0));

    let attrs = service.attributes(&evidence, "horse").unwrap();
    // Ties keep attribute vocabulary order.
    assert_eq!(attrs, scored(&[("white", 0.0), ("brown", 0.0)]));

    // The pair query builds its own evidence, so it is unaffected.
    assert_eq!(
        service.relationships("man", "horse").unwrap(),
        scored(&[("on", 0.7)])
    );
}

#[test]
fn empty_prompt_yields_empty_analysis() {
    let dir = tempfile::TempDir::new().unwrap();
    let service = Service::from_config(&write_artifacts(dir.path(), "spn_model.json")).unwrap();

    let scene = service.parse_prompt("a quiet afternoon").unwrap();
    assert!(scene.is_empty());
    let analysis = service.analyze(&scene).unwrap();
    assert!(analysis.evidences.is_empty());
    assert!(analysis.co_occur_probs.is_empty());
    assert!(analysis.attr_probs.is_empty());
    assert!(analysis.relation_probs.is_empty());
}

#[test]
fn top_k_from_config_truncates() {
    let dir = tempfile::TempDir::new().unwrap();
    let mut config = write_artifacts(dir.path(), "spn_model.json");
    config.top_k = 1;
    let service = Service::from_config(&config).unwrap();

    assert_eq!(
        service.co_occurrence(&["has_man"]).unwrap(),
        scored(&[("horse", 0.4)])
    );
}

#[test]
fn mismatched_vocabulary_is_rejected_at_load() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = write_artifacts(dir.path(), "spn_model.json");
    let mut names: Vec<&str> = FEATURES.iter().map(|(name, _)| *name).collect();
    names.push("has_tree");
    std::fs::write(&config.feature_names, serde_json::to_string(&names).unwrap()).unwrap();

    let err = Service::from_config(&config).unwrap_err();
    assert!(matches!(
        err,
        SgpcError::Config(ConfigError::ShapeMismatch { model: 10, vocab: 11 })
    ));
}

#[test]
fn missing_model_artifact_is_reported() {
    let dir = tempfile::TempDir::new().unwrap();
    let mut config = write_artifacts(dir.path(), "spn_model.json");
    config.model = dir.path().join("absent.json");

    let err = Service::from_config(&config).unwrap_err();
    assert!(matches!(err, SgpcError::Oracle(OracleError::Io { .. })));
}
