//! Category lexicon: object categories, attribute and relationship vocabularies.
//!
//! The lexicon is static configuration. It is built once at startup (either the
//! bundled Visual Genome tables or a TOML override) and shared by reference with
//! the normalizer, the evidence encoder and the query engine.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::LexiconError;

/// A coarse object category and its synonym object names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub synonyms: Vec<String>,
}

/// Immutable object/attribute/relationship vocabularies.
#[derive(Debug, Clone)]
pub struct CategoryLexicon {
    categories: Vec<Category>,
    attributes: Vec<String>,
    relationships: Vec<String>,
    /// Flattened object list, category order then synonym order.
    objects: Vec<String>,
    /// object name -> index into `categories` (first match wins).
    object_category: HashMap<String, usize>,
}

#[derive(Debug, Deserialize)]
struct LexiconToml {
    attributes: Vec<String>,
    relationships: Vec<String>,
    #[serde(rename = "category")]
    categories: Vec<Category>,
}

impl CategoryLexicon {
    /// Build a lexicon from explicit tables. Does not validate; call
    /// [`validate`](Self::validate) for configuration loaded from disk.
    pub fn new(categories: Vec<Category>, attributes: Vec<String>, relationships: Vec<String>) -> Self {
        let objects: Vec<String> = categories
            .iter()
            .flat_map(|c| c.synonyms.iter().cloned())
            .collect();
        let mut object_category = HashMap::with_capacity(objects.len());
        for (idx, category) in categories.iter().enumerate() {
            for word in &category.synonyms {
                object_category.entry(word.clone()).or_insert(idx);
            }
        }
        Self {
            categories,
            attributes,
            relationships,
            objects,
            object_category,
        }
    }

    /// The bundled lexicon: nine Visual Genome object categories, 21 attributes
    /// and 10 spatial relationships.
    pub fn default_visual_genome() -> Self {
        let categories = vec![
            cat("person", &["man", "woman", "people", "boy", "girl", "person"]),
            cat(
                "body_part",
                &[
                    "hand", "leg", "ear", "eye", "nose", "head", "hair", "face", "mouth", "neck",
                    "arm", "foot",
                ],
            ),
            cat(
                "clothing",
                &[
                    "shirt", "pants", "jacket", "hat", "shoe", "shorts", "jeans", "cap", "shoes",
                    "glasses", "coat", "uniform", "dress", "t-shirt",
                ],
            ),
            cat(
                "animal",
                &[
                    "cat", "dog", "bird", "horse", "cow", "sheep", "pig", "zebra", "elepant",
                    "tiger", "giraffe",
                ],
            ),
            cat(
                "vehicle",
                &["car", "bus", "truck", "bike", "motorcycle", "airplane", "boat", "train"],
            ),
            cat(
                "furniture",
                &["table", "chair", "bench", "bed", "desk", "cabinet", "shelf"],
            ),
            cat(
                "building_part",
                &["window", "wall", "door", "roof", "floor", "ceiling", "sign"],
            ),
            cat(
                "nature",
                &["sky", "ground", "tree", "grass", "leaves", "flower", "bush", "branch"],
            ),
            cat(
                "food",
                &["food", "pizza", "banana", "broccoli", "orange", "fruit", "cheese", "donut"],
            ),
        ];

        let attributes = words(&[
            "tall", "short", "large", "small", "big", "little", "white", "black", "blue", "brown",
            "gray", "blonde", "red", "walking", "running", "jumping", "sitting", "standing",
            "lying", "sleeping", "flying",
        ]);

        // Declaration order is the tie-break order for relationship rankings.
        let relationships = words(&[
            "to the left of",
            "to the right of",
            "in front of",
            "behind",
            "on",
            "in",
            "above",
            "below",
            "next to",
            "under",
        ]);

        Self::new(categories, attributes, relationships)
    }

    /// Parse and validate a TOML lexicon.
    pub fn from_toml(content: &str) -> Result<Self, LexiconError> {
        let parsed: LexiconToml = toml::from_str(content).map_err(|e| LexiconError::Parse {
            message: e.to_string(),
        })?;
        let lexicon = Self::new(parsed.categories, parsed.attributes, parsed.relationships);
        lexicon.validate()?;
        Ok(lexicon)
    }

    /// Load and validate a TOML lexicon from disk.
    pub fn load(path: &Path) -> Result<Self, LexiconError> {
        let content = std::fs::read_to_string(path).map_err(|e| LexiconError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_toml(&content)
    }

    /// Check that categories partition the object vocabulary and that the
    /// attribute and relationship vocabularies have no duplicates.
    pub fn validate(&self) -> Result<(), LexiconError> {
        let mut seen: HashMap<&str, &str> = HashMap::new();
        for category in &self.categories {
            if category.synonyms.is_empty() {
                return Err(LexiconError::EmptyCategory {
                    category: category.name.clone(),
                });
            }
            for word in &category.synonyms {
                if let Some(first) = seen.insert(word.as_str(), category.name.as_str()) {
                    return Err(LexiconError::OverlappingCategories {
                        word: word.clone(),
                        first: first.to_string(),
                        second: category.name.clone(),
                    });
                }
            }
        }
        check_unique("attribute", &self.attributes)?;
        check_unique("relationship", &self.relationships)?;
        Ok(())
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// All object names, category order then synonym order.
    pub fn objects(&self) -> &[String] {
        &self.objects
    }

    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    /// Relationship vocabulary in its fixed iteration order.
    pub fn relationships(&self) -> &[String] {
        &self.relationships
    }

    pub fn is_object(&self, word: &str) -> bool {
        self.object_category.contains_key(word)
    }

    pub fn is_attribute(&self, word: &str) -> bool {
        self.attributes.iter().any(|a| a == word)
    }

    pub fn is_relationship(&self, word: &str) -> bool {
        self.relationships.iter().any(|r| r == word)
    }

    /// The first category whose synonym set contains `word`.
    pub fn category_of(&self, word: &str) -> Option<&str> {
        self.object_category
            .get(word)
            .map(|&idx| self.categories[idx].name.as_str())
    }
}

impl Default for CategoryLexicon {
    fn default() -> Self {
        Self::default_visual_genome()
    }
}

fn cat(name: &str, synonyms: &[&str]) -> Category {
    Category {
        name: name.to_string(),
        synonyms: words(synonyms),
    }
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| (*w).to_string()).collect()
}

fn check_unique(kind: &'static str, list: &[String]) -> Result<(), LexiconError> {
    let mut seen = std::collections::HashSet::new();
    for word in list {
        if !seen.insert(word.as_str()) {
            return Err(LexiconError::Duplicate {
                kind,
                word: word.clone(),
            });
        }
    }
    Ok(())
}
