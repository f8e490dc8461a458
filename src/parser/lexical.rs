//! Built-in rule-based scene parser.
//!
//! Three passes over the lowercased prompt:
//! 1. **Tokenize**: words (hyphenated words kept whole, e.g. `t-shirt`)
//! 2. **Heads**: lexicon objects, with a trailing plural `s` folded when the
//!    singular is known; attribute words directly before a head become `amod`
//!    modifiers
//! 3. **Relations**: the longest relationship phrase between two consecutive
//!    heads links them (earlier head = subject, later head = object)

use std::sync::{Arc, LazyLock};

use regex::Regex;

use super::{ParserResult, SceneParser};
use crate::lexicon::CategoryLexicon;
use crate::normalize::{RawEntity, RawModifier, RawRelation, RawSceneGraph, AMOD};

static RE_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-z]+(?:-[a-z]+)*").unwrap());

/// Lexicon-driven parser; no external service needed.
#[derive(Debug, Clone)]
pub struct LexicalParser {
    lexicon: Arc<CategoryLexicon>,
    /// Relationship phrases split into words, longest first.
    patterns: Vec<(Vec<String>, String)>,
}

impl LexicalParser {
    pub fn new(lexicon: Arc<CategoryLexicon>) -> Self {
        let mut patterns: Vec<(Vec<String>, String)> = lexicon
            .relationships()
            .iter()
            .map(|r| (r.split_whitespace().map(str::to_string).collect(), r.clone()))
            .collect();
        // Stable: equal-length phrases keep vocabulary order.
        patterns.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        Self { lexicon, patterns }
    }

    /// Canonical object name for a token, if it names a known object.
    fn head_of(&self, token: &str) -> Option<String> {
        if self.lexicon.is_object(token) {
            return Some(token.to_string());
        }
        let singular = token.strip_suffix('s')?;
        self.lexicon
            .is_object(singular)
            .then(|| singular.to_string())
    }

    /// Longest relationship phrase inside `words`.
    fn relation_in(&self, words: &[&str]) -> Option<&str> {
        self.patterns
            .iter()
            .find(|(pattern, _)| {
                !pattern.is_empty()
                    && pattern.len() <= words.len()
                    && words.windows(pattern.len()).any(|w| w == pattern.as_slice())
            })
            .map(|(_, name)| name.as_str())
    }
}

impl SceneParser for LexicalParser {
    fn parse(&self, text: &str) -> ParserResult<RawSceneGraph> {
        let lowered = text.to_lowercase();
        let tokens: Vec<&str> = RE_WORD.find_iter(&lowered).map(|m| m.as_str()).collect();

        // (token position, entity) for every head, in text order.
        let mut heads: Vec<(usize, RawEntity)> = Vec::new();
        for (pos, token) in tokens.iter().enumerate() {
            let Some(head) = self.head_of(token) else {
                continue;
            };
            let mut start = pos;
            while start > 0 && self.lexicon.is_attribute(tokens[start - 1]) {
                start -= 1;
            }
            let modifiers = tokens[start..pos]
                .iter()
                .map(|span| RawModifier {
                    dep: AMOD.into(),
                    span: (*span).to_string(),
                })
                .collect();
            heads.push((pos, RawEntity { head, modifiers }));
        }

        let mut relations = Vec::new();
        for (idx, pair) in heads.windows(2).enumerate() {
            let (left_pos, _) = &pair[0];
            let (right_pos, right) = &pair[1];
            let between_end = right_pos - right.modifiers.len();
            if between_end <= left_pos + 1 {
                continue;
            }
            if let Some(relation) = self.relation_in(&tokens[left_pos + 1..between_end]) {
                relations.push(RawRelation {
                    relation: relation.to_string(),
                    subject: idx,
                    object: idx + 1,
                });
            }
        }

        let raw = RawSceneGraph {
            entities: heads.into_iter().map(|(_, entity)| entity).collect(),
            relations,
        };
        tracing::debug!(
            entities = raw.entities.len(),
            relations = raw.relations.len(),
            "lexical parse"
        );
        Ok(raw)
    }
}
