//! Feature vocabulary: the ordered feature names of the probabilistic model.
//!
//! Defines the dimensionality of every evidence vector and the name-to-index
//! mapping. Loaded once from the JSON array exported with the model artifact.

use std::collections::HashMap;
use std::path::Path;

use crate::error::VocabError;

#[derive(Debug, Clone)]
pub struct FeatureVocabulary {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl FeatureVocabulary {
    /// Build from an ordered name list. A repeated name resolves to its first index.
    pub fn new(names: Vec<String>) -> Result<Self, VocabError> {
        if names.is_empty() {
            return Err(VocabError::Empty);
        }
        let mut index = HashMap::with_capacity(names.len());
        for (idx, name) in names.iter().enumerate() {
            index.entry(name.clone()).or_insert(idx);
        }
        if index.len() != names.len() {
            tracing::warn!(
                names = names.len(),
                distinct = index.len(),
                "feature vocabulary contains duplicate names"
            );
        }
        Ok(Self { names, index })
    }

    pub fn from_json(content: &str) -> Result<Self, VocabError> {
        let names: Vec<String> = serde_json::from_str(content).map_err(|e| VocabError::Parse {
            message: e.to_string(),
        })?;
        Self::new(names)
    }

    pub fn load(path: &Path) -> Result<Self, VocabError> {
        let content = std::fs::read_to_string(path).map_err(|e| VocabError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let vocab = Self::from_json(&content)?;
        tracing::info!(path = %path.display(), features = vocab.len(), "loaded feature vocabulary");
        Ok(vocab)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn name(&self, idx: usize) -> Option<&str> {
        self.names.get(idx).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}
