//! Service configuration, persisted as TOML with environment overrides.
//!
//! Every field has a serde default, so an empty file (or no file at all) yields
//! a working configuration pointing at `feature_names.json` and `spn_model.json`
//! in the working directory.

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::evidence::EntityEvidence;
use crate::normalize::{AttributeFilter, EntityRetention, NormalizeOptions};
use crate::query::DEFAULT_TOP_K;

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(sgpc::config::read),
        help("Ensure the config file exists and is valid TOML.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {path}: {message}")]
    #[diagnostic(
        code(sgpc::config::parse),
        help("Check the TOML syntax in the config file.")
    )]
    Parse { path: String, message: String },

    #[error("failed to write config: {path}")]
    #[diagnostic(
        code(sgpc::config::write),
        help("Ensure you have write permissions to the config directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid value for {var}: \"{value}\"")]
    #[diagnostic(
        code(sgpc::config::env),
        help("{var} must be a positive integer.")
    )]
    InvalidEnv { var: &'static str, value: String },

    #[error("invalid config value for {field}: {message}")]
    #[diagnostic(
        code(sgpc::config::invalid),
        help("Fix the value in the config file or on the command line.")
    )]
    Invalid {
        field: &'static str,
        message: String,
    },

    #[error("model has {model} features but the feature vocabulary has {vocab}")]
    #[diagnostic(
        code(sgpc::config::shape),
        help(
            "The model artifact and the feature names file must come from the same \
             training run. Point `model` and `feature_names` at matching files."
        )
    )]
    ShapeMismatch { model: usize, vocab: usize },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Configuration for the scene-graph query service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Listen address.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Listen port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// JSON array of feature names exported with the model.
    #[serde(default = "default_feature_names")]
    pub feature_names: PathBuf,
    /// SPN model artifact (`.json` or bincode).
    #[serde(default = "default_model")]
    pub model: PathBuf,
    /// Optional TOML lexicon replacing the bundled one.
    #[serde(default)]
    pub lexicon: Option<PathBuf>,
    /// Which entity property is encoded as `has_<...>` evidence.
    #[serde(default)]
    pub entity_evidence: EntityEvidence,
    /// Which parsed entities survive normalization.
    #[serde(default)]
    pub entity_retention: EntityRetention,
    /// Which adjectival modifiers become attributes.
    #[serde(default)]
    pub attribute_filter: AttributeFilter,
    /// Ranked candidates per query.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// External parser endpoint; the built-in lexical parser is used when unset.
    #[serde(default)]
    pub parser_url: Option<String>,
    /// External text-to-image endpoint; image generation is disabled when unset.
    #[serde(default)]
    pub diffusion_url: Option<String>,
    /// Timeout for outbound parser/diffusion requests.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_bind() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8001
}
fn default_feature_names() -> PathBuf {
    PathBuf::from("feature_names.json")
}
fn default_model() -> PathBuf {
    PathBuf::from("spn_model.json")
}
fn default_top_k() -> usize {
    DEFAULT_TOP_K
}
fn default_request_timeout_secs() -> u64 {
    120
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            feature_names: default_feature_names(),
            model: default_model(),
            lexicon: None,
            entity_evidence: EntityEvidence::default(),
            entity_retention: EntityRetention::default(),
            attribute_filter: AttributeFilter::default(),
            top_k: default_top_k(),
            parser_url: None,
            diffusion_url: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ServiceConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make every query empty.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.top_k == 0 {
            return Err(ConfigError::Invalid {
                field: "top_k",
                message: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Save to a TOML file.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Apply `SGPC_*` environment overrides.
    pub fn apply_env(&mut self) -> ConfigResult<()> {
        self.apply_vars(|name| std::env::var(name).ok())
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) -> ConfigResult<()> {
        if let Some(bind) = var("SGPC_BIND") {
            self.bind = bind;
        }
        if let Some(port) = var("SGPC_PORT") {
            self.port = port.parse().map_err(|_| ConfigError::InvalidEnv {
                var: "SGPC_PORT",
                value: port.clone(),
            })?;
        }
        if let Some(path) = var("SGPC_FEATURE_NAMES") {
            self.feature_names = PathBuf::from(path);
        }
        if let Some(path) = var("SGPC_MODEL") {
            self.model = PathBuf::from(path);
        }
        if let Some(path) = var("SGPC_LEXICON") {
            self.lexicon = Some(PathBuf::from(path));
        }
        if let Some(url) = var("SGPC_PARSER_URL") {
            self.parser_url = Some(url);
        }
        if let Some(url) = var("SGPC_DIFFUSION_URL") {
            self.diffusion_url = Some(url);
        }
        if let Some(top_k) = var("SGPC_TOP_K") {
            self.top_k = top_k
                .parse()
                .ok()
                .filter(|k: &usize| *k > 0)
                .ok_or_else(|| ConfigError::InvalidEnv {
                    var: "SGPC_TOP_K",
                    value: top_k.clone(),
                })?;
        }
        Ok(())
    }

    pub fn normalize_options(&self) -> NormalizeOptions {
        NormalizeOptions {
            retention: self.entity_retention,
            attributes: self.attribute_filter,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}
