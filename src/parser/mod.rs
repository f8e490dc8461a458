//! Dependency-parse oracle: text to raw scene graph.
//!
//! Two implementations sit behind [`SceneParser`]:
//! - [`LexicalParser`]: built-in rule-based extraction over the category lexicon
//! - [`HttpSceneParser`]: delegates to an external parser service

pub mod http;
pub mod lexical;

use miette::Diagnostic;
use thiserror::Error;

use crate::error::NormalizeError;
use crate::normalize::RawSceneGraph;

pub use http::HttpSceneParser;
pub use lexical::LexicalParser;

#[derive(Debug, Error, Diagnostic)]
pub enum ParserError {
    #[error("parser service at {url} unreachable: {message}")]
    #[diagnostic(
        code(sgpc::parser::unreachable),
        help(
            "Check that the external scene-graph parser is running and that \
             `parser_url` in the configuration points at it."
        )
    )]
    Unreachable { url: String, message: String },

    #[error("parser service returned status {status}: {body}")]
    #[diagnostic(
        code(sgpc::parser::status),
        help("The external parser rejected the prompt. See its logs for details.")
    )]
    Status { status: u16, body: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Output(#[from] NormalizeError),
}

pub type ParserResult<T> = std::result::Result<T, ParserError>;

/// Extracts entities, modifiers and relations from a prompt.
pub trait SceneParser: Send + Sync {
    fn parse(&self, text: &str) -> ParserResult<RawSceneGraph>;
}
