//! Probabilistic model oracle: joint likelihood of evidence vectors.
//!
//! The oracle is a frozen, pretrained model consumed through one pure
//! operation. `Unknown` slots are marginalized out, never treated as absent.

pub mod spn;

use crate::error::{OracleError, OracleResult};
use crate::evidence::EvidenceVector;

pub use spn::{SpnModel, SpnNode};

/// Joint-probability model over the feature vocabulary.
pub trait LikelihoodOracle: Send + Sync {
    /// Number of features (evidence vector length) the model was trained on.
    fn feature_count(&self) -> usize;

    /// Joint probability per row, each in `[0, 1]`.
    fn likelihood(&self, batch: &[EvidenceVector]) -> OracleResult<Vec<f64>>;

    /// Likelihood of a single evidence vector.
    fn likelihood_of(&self, evidence: &EvidenceVector) -> OracleResult<f64> {
        let out = self.likelihood(std::slice::from_ref(evidence))?;
        match out.as_slice() {
            [p] => Ok(*p),
            _ => Err(OracleError::BatchSize {
                expected: 1,
                actual: out.len(),
            }),
        }
    }
}

/// Reject a vector whose length differs from the model's feature count.
pub(crate) fn check_shape(expected: usize, evidence: &EvidenceVector) -> OracleResult<()> {
    if evidence.len() != expected {
        return Err(OracleError::ShapeMismatch {
            expected,
            actual: evidence.len(),
        });
    }
    Ok(())
}
