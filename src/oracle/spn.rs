//! Sum-product network over binary features.
//!
//! The artifact lists nodes children-first, so a single forward pass over the
//! node array evaluates the network. Evaluation runs in log space:
//!
//! - **Bernoulli leaf**: `ln p` when its feature is present, `0` (= ln 1) when unknown
//! - **Product**: sum of child log-values
//! - **Sum**: log-sum-exp of `ln w_i + child_i`
//!
//! Artifacts ending in `.json` are decoded with serde_json, anything else
//! with bincode.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{check_shape, LikelihoodOracle};
use crate::error::{OracleError, OracleResult};
use crate::evidence::{EvidenceVector, Observation};

/// One node of the network. Child indices must be smaller than the node's own index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpnNode {
    Bernoulli { scope: usize, p: f64 },
    Product { children: Vec<usize> },
    Sum { children: Vec<usize>, weights: Vec<f64> },
}

/// A validated sum-product network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpnModel {
    num_features: usize,
    root: usize,
    nodes: Vec<SpnNode>,
}

impl SpnModel {
    /// Build and validate a network.
    pub fn new(num_features: usize, nodes: Vec<SpnNode>, root: usize) -> OracleResult<Self> {
        let model = Self {
            num_features,
            root,
            nodes,
        };
        model.validate()?;
        Ok(model)
    }

    /// Load a model artifact from disk.
    pub fn load(path: &Path) -> OracleResult<Self> {
        let bytes = std::fs::read(path).map_err(|e| OracleError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let model: Self = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_slice(&bytes).map_err(|e| OracleError::Decode {
                message: e.to_string(),
            })?
        } else {
            bincode::deserialize(&bytes).map_err(|e| OracleError::Decode {
                message: e.to_string(),
            })?
        };
        model.validate()?;
        tracing::info!(
            path = %path.display(),
            nodes = model.nodes.len(),
            features = model.num_features,
            "loaded SPN model"
        );
        Ok(model)
    }

    /// Persist the model; format chosen by extension as in [`load`](Self::load).
    pub fn save(&self, path: &Path) -> OracleResult<()> {
        let bytes = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::to_vec_pretty(self).map_err(|e| OracleError::Decode {
                message: e.to_string(),
            })?
        } else {
            bincode::serialize(self).map_err(|e| OracleError::Decode {
                message: e.to_string(),
            })?
        };
        std::fs::write(path, bytes).map_err(|e| OracleError::Io {
            path: path.display().to_string(),
            source: e,
        })
    }

    pub fn nodes(&self) -> &[SpnNode] {
        &self.nodes
    }

    fn validate(&self) -> OracleResult<()> {
        let invalid = |message: String| Err(OracleError::InvalidModel { message });

        if self.nodes.is_empty() {
            return invalid("network has no nodes".into());
        }
        if self.root >= self.nodes.len() {
            return invalid(format!(
                "root {} out of range for {} nodes",
                self.root,
                self.nodes.len()
            ));
        }

        for (idx, node) in self.nodes.iter().enumerate() {
            match node {
                SpnNode::Bernoulli { scope, p } => {
                    if *scope >= self.num_features {
                        return invalid(format!(
                            "leaf {idx} has scope {scope}, but the model has {} features",
                            self.num_features
                        ));
                    }
                    if !(0.0..=1.0).contains(p) {
                        return invalid(format!("leaf {idx} has probability {p} outside [0, 1]"));
                    }
                }
                SpnNode::Product { children } => {
                    check_children(idx, children)?;
                }
                SpnNode::Sum { children, weights } => {
                    check_children(idx, children)?;
                    if children.len() != weights.len() {
                        return invalid(format!(
                            "sum {idx} has {} children but {} weights",
                            children.len(),
                            weights.len()
                        ));
                    }
                    if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
                        return invalid(format!("sum {idx} has a negative or non-finite weight"));
                    }
                }
            }
        }
        Ok(())
    }

    /// Log-likelihood of one (shape-checked) evidence vector.
    fn log_likelihood(&self, evidence: &EvidenceVector) -> f64 {
        let mut values = vec![0.0f64; self.nodes.len()];
        for (idx, node) in self.nodes.iter().enumerate() {
            values[idx] = match node {
                SpnNode::Bernoulli { scope, p } => match evidence.get(*scope) {
                    Some(Observation::Present) => p.ln(),
                    _ => 0.0,
                },
                SpnNode::Product { children } => children.iter().map(|&c| values[c]).sum(),
                SpnNode::Sum { children, weights } => log_sum_exp(
                    children
                        .iter()
                        .zip(weights)
                        .map(|(&c, &w)| w.ln() + values[c]),
                ),
            };
        }
        values[self.root]
    }
}

impl LikelihoodOracle for SpnModel {
    fn feature_count(&self) -> usize {
        self.num_features
    }

    fn likelihood(&self, batch: &[EvidenceVector]) -> OracleResult<Vec<f64>> {
        batch
            .iter()
            .map(|evidence| {
                check_shape(self.num_features, evidence)?;
                Ok(self.log_likelihood(evidence).exp().clamp(0.0, 1.0))
            })
            .collect()
    }
}

fn check_children(idx: usize, children: &[usize]) -> OracleResult<()> {
    if children.is_empty() {
        return Err(OracleError::InvalidModel {
            message: format!("node {idx} has no children"),
        });
    }
    if let Some(bad) = children.iter().find(|&&c| c >= idx) {
        return Err(OracleError::InvalidModel {
            message: format!("node {idx} references child {bad}, which is not listed before it"),
        });
    }
    Ok(())
}

fn log_sum_exp(terms: impl Iterator<Item = f64>) -> f64 {
    let terms: Vec<f64> = terms.collect();
    let max = terms.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    max + terms.iter().map(|t| (t - max).exp()).sum::<f64>().ln()
}
