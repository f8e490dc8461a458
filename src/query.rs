//! Conditional query engine.
//!
//! Every query shares one algorithm: compute the marginal likelihood of the
//! base evidence, perturb the evidence by marking one candidate feature
//! present, and rank candidates by `p_joint / p_evidence`. The three queries
//! differ only in the candidate vocabulary and the feature-name template:
//!
//! | query          | candidates        | feature                       | evidence            |
//! |----------------|-------------------|-------------------------------|---------------------|
//! | co-occurrence  | lexicon objects   | `has_<object>`                | scene evidence      |
//! | attributes     | attribute vocab   | `<object>_attr_<attribute>`   | scene evidence      |
//! | relationships  | relationship vocab| `<object>_<relation>_<subject>` | `has_<object>`, `has_<subject>` |
//!
//! Perturbations are independent and evaluated in parallel with rayon; the
//! collected order is the candidate order, so the stable sort breaks ties by
//! vocabulary order.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{OracleError, QueryError};
use crate::evidence::{attribute_feature, presence_feature, relation_feature, EvidenceVector};
use crate::lexicon::CategoryLexicon;
use crate::oracle::LikelihoodOracle;
use crate::vocab::FeatureVocabulary;

/// Default number of ranked candidates returned per query.
pub const DEFAULT_TOP_K: usize = 10;

/// A candidate and its conditional probability, serialized as `[name, p]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate(pub String, pub f64);

impl ScoredCandidate {
    pub fn name(&self) -> &str {
        &self.0
    }

    pub fn probability(&self) -> f64 {
        self.1
    }
}

/// Runs conditional-probability queries against a likelihood oracle.
#[derive(Clone, Copy)]
pub struct QueryEngine<'a> {
    vocab: &'a FeatureVocabulary,
    lexicon: &'a CategoryLexicon,
    oracle: &'a dyn LikelihoodOracle,
}

impl<'a> QueryEngine<'a> {
    pub fn new(
        vocab: &'a FeatureVocabulary,
        lexicon: &'a CategoryLexicon,
        oracle: &'a dyn LikelihoodOracle,
    ) -> Self {
        Self {
            vocab,
            lexicon,
            oracle,
        }
    }

    /// Marginal likelihood of an evidence configuration.
    pub fn marginal(&self, evidence: &EvidenceVector) -> Result<f64, QueryError> {
        Ok(self.oracle.likelihood_of(evidence)?)
    }

    /// Objects likely to co-occur with the current evidence.
    pub fn co_occurrence(
        &self,
        evidence: &EvidenceVector,
        top_k: usize,
    ) -> Result<Vec<ScoredCandidate>, QueryError> {
        let candidates = self
            .lexicon
            .objects()
            .iter()
            .map(|object| (object.as_str(), presence_feature(object)));
        self.rank(evidence, candidates, top_k)
    }

    /// Attributes likely to hold for `object` given the current evidence.
    pub fn attributes(
        &self,
        evidence: &EvidenceVector,
        object: &str,
        top_k: usize,
    ) -> Result<Vec<ScoredCandidate>, QueryError> {
        let candidates = self
            .lexicon
            .attributes()
            .iter()
            .map(|attribute| (attribute.as_str(), attribute_feature(object, attribute)));
        self.rank(evidence, candidates, top_k)
    }

    /// Relationships likely to hold from `object` to `subject`.
    ///
    /// Evidence is built fresh from `has_<object>` and `has_<subject>` only, so
    /// `(a, b)` and `(b, a)` are independent queries.
    pub fn relationships(
        &self,
        object: &str,
        subject: &str,
        top_k: usize,
    ) -> Result<Vec<ScoredCandidate>, QueryError> {
        let evidence = self.pair_evidence(object, subject);
        let candidates = self
            .lexicon
            .relationships()
            .iter()
            .map(|relation| (relation.as_str(), relation_feature(object, relation, subject)));
        self.rank(&evidence, candidates, top_k)
    }

    /// Two-feature evidence for a relationship query.
    pub fn pair_evidence(&self, object: &str, subject: &str) -> EvidenceVector {
        let mut evidence = EvidenceVector::unknown(self.vocab.len());
        for token in [presence_feature(object), presence_feature(subject)] {
            if let Some(idx) = self.vocab.index_of(&token) {
                evidence.mark_present(idx);
            }
        }
        evidence
    }

    /// Rank `(label, feature)` candidates by conditional probability.
    ///
    /// Candidates whose feature is missing from the vocabulary or already
    /// present in `evidence` are skipped. A zero marginal yields zero for
    /// every candidate.
    pub fn rank<'c>(
        &self,
        evidence: &EvidenceVector,
        candidates: impl IntoIterator<Item = (&'c str, String)>,
        top_k: usize,
    ) -> Result<Vec<ScoredCandidate>, QueryError> {
        let p_evidence = self.oracle.likelihood_of(evidence)?;

        let tasks: Vec<(&str, usize)> = candidates
            .into_iter()
            .filter_map(|(label, feature)| {
                let idx = self.vocab.index_of(&feature)?;
                (!evidence.is_present(idx)).then_some((label, idx))
            })
            .collect();

        let oracle = self.oracle;
        let mut scored = tasks
            .par_iter()
            .map(|&(label, idx)| {
                let p_joint = oracle.likelihood_of(&evidence.with_present(idx))?;
                let p_cond = if p_evidence > 0.0 {
                    p_joint / p_evidence
                } else {
                    0.0
                };
                Ok((label, p_cond))
            })
            .collect::<Result<Vec<(&str, f64)>, OracleError>>()?;

        // Stable: equal probabilities keep candidate order.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        tracing::debug!(
            candidates = scored.len(),
            p_evidence,
            top_k,
            "ranked conditional query"
        );

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(label, p)| ScoredCandidate(label.to_string(), round4(p)))
            .collect())
    }
}

/// Round to 4 decimal places, halves to even.
fn round4(p: f64) -> f64 {
    (p * 10_000.0).round_ties_even() / 10_000.0
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::error::OracleResult;
    use crate::lexicon::Category;

    /// Independent features: likelihood = product of weights of present slots.
    struct Independent(Vec<f64>);

    impl LikelihoodOracle for Independent {
        fn feature_count(&self) -> usize {
            self.0.len()
        }

        fn likelihood(&self, batch: &[EvidenceVector]) -> OracleResult<Vec<f64>> {
            Ok(batch
                .iter()
                .map(|e| e.present_indices().map(|i| self.0[i]).product())
                .collect())
        }
    }

    struct Zero(usize);

    impl LikelihoodOracle for Zero {
        fn feature_count(&self) -> usize {
            self.0
        }

        fn likelihood(&self, batch: &[EvidenceVector]) -> OracleResult<Vec<f64>> {
            Ok(vec![0.0; batch.len()])
        }
    }

    /// Records every evidence vector it sees.
    struct Recording {
        inner: Independent,
        seen: Mutex<Vec<EvidenceVector>>,
    }

    impl LikelihoodOracle for Recording {
        fn feature_count(&self) -> usize {
            self.inner.feature_count()
        }

        fn likelihood(&self, batch: &[EvidenceVector]) -> OracleResult<Vec<f64>> {
            self.seen.lock().unwrap().extend(batch.iter().cloned());
            self.inner.likelihood(batch)
        }
    }

    fn lexicon() -> CategoryLexicon {
        CategoryLexicon::new(
            vec![
                Category {
                    name: "person".into(),
                    synonyms: vec!["man".into(), "woman".into()],
                },
                Category {
                    name: "animal".into(),
                    synonyms: vec!["dog".into(), "horse".into()],
                },
            ],
            vec!["tall".into(), "small".into(), "brown".into()],
            vec!["on".into(), "next to".into(), "under".into()],
        )
    }

    fn vocab(names: &[&str]) -> FeatureVocabulary {
        FeatureVocabulary::new(names.iter().map(|n| (*n).to_string()).collect()).unwrap()
    }

    fn names(ranked: &[ScoredCandidate]) -> Vec<&str> {
        ranked.iter().map(ScoredCandidate::name).collect()
    }

    #[test]
    fn co_occurrence_ranks_and_skips_present() {
        let vocab = vocab(&["has_man", "has_woman", "has_dog", "has_horse"]);
        let oracle = Independent(vec![0.5, 0.2, 0.7, 0.1]);
        let lexicon = lexicon();
        let engine = QueryEngine::new(&vocab, &lexicon, &oracle);

        let mut evidence = EvidenceVector::unknown(4);
        evidence.mark_present(0);
        let ranked = engine.co_occurrence(&evidence, DEFAULT_TOP_K).unwrap();

        assert_eq!(names(&ranked), vec!["dog", "woman", "horse"]);
        assert_eq!(ranked[0].probability(), 0.7);
    }

    #[test]
    fn rounding_sends_halves_to_even() {
        // 1/32 and 3/32 land exactly on a half at the fourth decimal.
        assert_eq!(round4(0.03125), 0.0312);
        assert_eq!(round4(0.09375), 0.0938);
        assert_eq!(round4(0.123456), 0.1235);
    }

    #[test]
    fn top_k_truncates_and_rounds() {
        let vocab = vocab(&["has_man", "has_woman", "has_dog"]);
        let oracle = Independent(vec![0.123_456, 0.9, 0.5]);
        let lexicon = lexicon();
        let engine = QueryEngine::new(&vocab, &lexicon, &oracle);

        let ranked = engine.co_occurrence(&EvidenceVector::unknown(3), 2).unwrap();
        assert_eq!(
            ranked,
            vec![
                ScoredCandidate("woman".into(), 0.9),
                ScoredCandidate("dog".into(), 0.5),
            ]
        );

        let all = engine.co_occurrence(&EvidenceVector::unknown(3), 10).unwrap();
        assert_eq!(all[2], ScoredCandidate("man".into(), 0.1235));
    }

    #[test]
    fn zero_marginal_gives_zero_everywhere() {
        let vocab = vocab(&[
            "has_man",
            "has_dog",
            "man_attr_tall",
            "man_on_dog",
            "man_under_dog",
        ]);
        let oracle = Zero(5);
        let lexicon = lexicon();
        let engine = QueryEngine::new(&vocab, &lexicon, &oracle);
        let evidence = EvidenceVector::unknown(5);

        let co = engine.co_occurrence(&evidence, 10).unwrap();
        let attrs = engine.attributes(&evidence, "man", 10).unwrap();
        let rels = engine.relationships("man", "dog", 10).unwrap();

        assert_eq!(co.len(), 2);
        assert_eq!(attrs.len(), 1);
        assert_eq!(rels.len(), 2);
        for scored in co.iter().chain(&attrs).chain(&rels) {
            assert_eq!(scored.probability(), 0.0);
        }
    }

    #[test]
    fn ties_keep_vocabulary_order_across_calls() {
        let vocab = vocab(&["man_under_dog", "man_next to_dog", "man_on_dog", "has_man", "has_dog"]);
        let oracle = Independent(vec![0.3, 0.3, 0.3, 1.0, 1.0]);
        let lexicon = lexicon();
        let engine = QueryEngine::new(&vocab, &lexicon, &oracle);

        let first = engine.relationships("man", "dog", 10).unwrap();
        assert_eq!(names(&first), vec!["on", "next to", "under"]);
        for _ in 0..5 {
            assert_eq!(engine.relationships("man", "dog", 10).unwrap(), first);
        }
    }

    #[test]
    fn attribute_query_uses_object_template() {
        let vocab = vocab(&["has_dog", "dog_attr_small", "dog_attr_brown", "man_attr_tall"]);
        let oracle = Independent(vec![0.5, 0.4, 0.8, 0.9]);
        let lexicon = lexicon();
        let engine = QueryEngine::new(&vocab, &lexicon, &oracle);

        let mut evidence = EvidenceVector::unknown(4);
        evidence.mark_present(0);
        let ranked = engine.attributes(&evidence, "dog", 10).unwrap();
        assert_eq!(names(&ranked), vec!["brown", "small"]);
    }

    #[test]
    fn relationship_directions_are_computed_independently() {
        let vocab = vocab(&["has_man", "has_horse", "horse_on_man", "man_on_horse", "horse_under_man"]);
        let oracle = Recording {
            inner: Independent(vec![0.5, 0.5, 0.9, 0.05, 0.2]),
            seen: Mutex::new(Vec::new()),
        };
        let lexicon = lexicon();
        let engine = QueryEngine::new(&vocab, &lexicon, &oracle);

        let forward = engine.relationships("horse", "man", 10).unwrap();
        let backward = engine.relationships("man", "horse", 10).unwrap();

        assert_eq!(names(&forward), vec!["on", "under"]);
        assert_eq!(names(&backward), vec!["on"]);
        assert_ne!(forward, backward);

        // Each query starts from a fresh `has_man` + `has_horse` base vector.
        let base = engine.pair_evidence("horse", "man");
        assert_eq!(base, engine.pair_evidence("man", "horse"));
        let seen = oracle.seen.lock().unwrap();
        let bases = seen.iter().filter(|e| **e == base).count();
        assert_eq!(bases, 2);
        assert!(seen.iter().all(|e| e.present_count() <= 3));
    }

    #[test]
    fn candidates_missing_from_vocabulary_are_skipped() {
        let vocab = vocab(&["has_man"]);
        let oracle = Independent(vec![0.5]);
        let lexicon = lexicon();
        let engine = QueryEngine::new(&vocab, &lexicon, &oracle);

        let mut evidence = EvidenceVector::unknown(1);
        evidence.mark_present(0);
        assert!(engine.co_occurrence(&evidence, 10).unwrap().is_empty());
        assert!(engine.relationships("man", "dog", 10).unwrap().is_empty());
    }

    #[test]
    fn oracle_shape_errors_propagate() {
        let vocab = vocab(&["has_man", "has_dog"]);
        let oracle = crate::oracle::SpnModel::new(
            3,
            vec![crate::oracle::SpnNode::Bernoulli { scope: 0, p: 0.5 }],
            0,
        )
        .unwrap();
        let lexicon = lexicon();
        let engine = QueryEngine::new(&vocab, &lexicon, &oracle);

        let err = engine.co_occurrence(&EvidenceVector::unknown(2), 10).unwrap_err();
        assert!(matches!(
            err,
            QueryError::Oracle(OracleError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn scored_candidate_serializes_as_pair() {
        let json = serde_json::to_string(&ScoredCandidate("dog".into(), 0.25)).unwrap();
        assert_eq!(json, r#"["dog",0.25]"#);
    }
}
