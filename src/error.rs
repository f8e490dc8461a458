//! Rich diagnostic error types for sgpc.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so callers know exactly
//! what went wrong and how to fix it.

use miette::Diagnostic;
use thiserror::Error;

use crate::config::ConfigError;
use crate::diffusion::DiffusionError;
use crate::parser::ParserError;

/// Top-level error type for sgpc.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain through to the HTTP boundary or the CLI report.
#[derive(Debug, Error, Diagnostic)]
pub enum SgpcError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Lexicon(#[from] LexiconError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Vocab(#[from] VocabError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Normalize(#[from] NormalizeError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Oracle(#[from] OracleError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Parser(#[from] ParserError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Diffusion(#[from] DiffusionError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Lexicon errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum LexiconError {
    #[error("object \"{word}\" is listed under both \"{first}\" and \"{second}\"")]
    #[diagnostic(
        code(sgpc::lexicon::overlap),
        help(
            "Categories must partition the object vocabulary. \
             Remove the word from one of the two categories."
        )
    )]
    OverlappingCategories {
        word: String,
        first: String,
        second: String,
    },

    #[error("category \"{category}\" has no synonyms")]
    #[diagnostic(
        code(sgpc::lexicon::empty_category),
        help("List at least one object name under the category, or remove it.")
    )]
    EmptyCategory { category: String },

    #[error("duplicate {kind} \"{word}\"")]
    #[diagnostic(
        code(sgpc::lexicon::duplicate),
        help("Each attribute and relationship may appear only once in the lexicon.")
    )]
    Duplicate { kind: &'static str, word: String },

    #[error("failed to read lexicon file: {path}")]
    #[diagnostic(
        code(sgpc::lexicon::io),
        help("Ensure the lexicon file exists and is readable.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse lexicon: {message}")]
    #[diagnostic(
        code(sgpc::lexicon::parse),
        help(
            "The lexicon file must be TOML with `attributes`, `relationships` \
             and a `[[category]]` table per category (`name`, `synonyms`)."
        )
    )]
    Parse { message: String },
}

// ---------------------------------------------------------------------------
// Feature vocabulary errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum VocabError {
    #[error("failed to read feature vocabulary: {path}")]
    #[diagnostic(
        code(sgpc::vocab::io),
        help("Ensure the feature names file exists and is readable.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse feature vocabulary: {message}")]
    #[diagnostic(
        code(sgpc::vocab::parse),
        help("The feature names file must be a JSON array of strings.")
    )]
    Parse { message: String },

    #[error("feature vocabulary is empty")]
    #[diagnostic(
        code(sgpc::vocab::empty),
        help("The model artifact must be accompanied by at least one feature name.")
    )]
    Empty,
}

// ---------------------------------------------------------------------------
// Normalization errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum NormalizeError {
    #[error("malformed parser output: {message}")]
    #[diagnostic(
        code(sgpc::normalize::malformed),
        help(
            "The raw scene graph must have `entities` (each with `head` and \
             `modifiers`) and `relations` (each with `relation`, `subject`, `object`)."
        )
    )]
    Malformed { message: String },

    #[error("relation \"{relation}\" references entity index {index}, but only {count} entities exist")]
    #[diagnostic(
        code(sgpc::normalize::dangling_index),
        help("Relation subject/object fields are indices into the parser's entity list.")
    )]
    DanglingIndex {
        relation: String,
        index: usize,
        count: usize,
    },
}

// ---------------------------------------------------------------------------
// Oracle errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum OracleError {
    #[error("evidence vector has {actual} slots, model expects {expected}")]
    #[diagnostic(
        code(sgpc::oracle::shape_mismatch),
        help(
            "The feature vocabulary and the model artifact disagree on the number \
             of features. Load the feature names file exported with this model."
        )
    )]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("failed to read model artifact: {path}")]
    #[diagnostic(
        code(sgpc::oracle::io),
        help("Ensure the model file exists and is readable.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode model artifact: {message}")]
    #[diagnostic(
        code(sgpc::oracle::decode),
        help(
            "`.json` artifacts are decoded as JSON, everything else as bincode. \
             Check that the file was exported in the expected format."
        )
    )]
    Decode { message: String },

    #[error("invalid model: {message}")]
    #[diagnostic(
        code(sgpc::oracle::invalid_model),
        help(
            "Nodes must be listed children-first, sum weights must match their \
             children, and leaf scopes must lie within `num_features`."
        )
    )]
    InvalidModel { message: String },

    #[error("oracle returned {actual} likelihoods for a batch of {expected}")]
    #[diagnostic(
        code(sgpc::oracle::batch_size),
        help("The likelihood oracle must return exactly one probability per row.")
    )]
    BatchSize { expected: usize, actual: usize },
}

// ---------------------------------------------------------------------------
// Query errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum QueryError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Oracle(#[from] OracleError),

    #[error("query worker failed: {message}")]
    #[diagnostic(
        code(sgpc::query::worker),
        help("A blocking query task panicked or was cancelled. Check the server logs.")
    )]
    Worker { message: String },
}

/// Convenience alias for functions returning sgpc results.
pub type SgpcResult<T> = std::result::Result<T, SgpcError>;

/// Result alias for oracle calls.
pub type OracleResult<T> = std::result::Result<T, OracleError>;
