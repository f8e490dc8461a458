//! Service facade: the loaded artifacts plus every operation the binaries expose.
//!
//! A [`Service`] is immutable once built and cheap to clone, so request
//! handlers can move a copy onto the blocking pool without locking.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::analysis::{self, SceneAnalysis};
use crate::config::{ConfigError, ServiceConfig};
use crate::diffusion::{DiffusionError, HttpImageGenerator, ImageGenerator};
use crate::error::SgpcResult;
use crate::evidence::EvidenceEncoder;
use crate::lexicon::CategoryLexicon;
use crate::normalize::Normalizer;
use crate::oracle::{LikelihoodOracle, SpnModel};
use crate::parser::{HttpSceneParser, LexicalParser, SceneParser};
use crate::query::{QueryEngine, ScoredCandidate};
use crate::scene::SceneGraph;
use crate::vocab::FeatureVocabulary;

/// Summary of the loaded service, reported by `GET /health` and `sgpc info`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    pub features: usize,
    pub objects: usize,
    pub attributes: usize,
    pub relationships: usize,
    /// `"lexical"` or the external parser URL.
    pub parser: String,
    pub image_generation: bool,
}

#[derive(Clone)]
pub struct Service {
    config: Arc<ServiceConfig>,
    lexicon: Arc<CategoryLexicon>,
    vocab: Arc<FeatureVocabulary>,
    oracle: Arc<dyn LikelihoodOracle>,
    parser: Arc<dyn SceneParser>,
    generator: Option<Arc<dyn ImageGenerator>>,
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service")
            .field("config", &self.config)
            .field("features", &self.vocab.len())
            .field("image_generation", &self.generator.is_some())
            .finish_non_exhaustive()
    }
}

impl Service {
    /// Assemble a service from already-loaded parts.
    ///
    /// Fails when the oracle and the vocabulary disagree on the feature count.
    pub fn new(
        config: ServiceConfig,
        lexicon: Arc<CategoryLexicon>,
        vocab: Arc<FeatureVocabulary>,
        oracle: Arc<dyn LikelihoodOracle>,
        parser: Arc<dyn SceneParser>,
        generator: Option<Arc<dyn ImageGenerator>>,
    ) -> SgpcResult<Self> {
        if oracle.feature_count() != vocab.len() {
            return Err(ConfigError::ShapeMismatch {
                model: oracle.feature_count(),
                vocab: vocab.len(),
            }
            .into());
        }
        Ok(Self {
            config: Arc::new(config),
            lexicon,
            vocab,
            oracle,
            parser,
            generator,
        })
    }

    /// Load the lexicon, feature names and model named by `config`.
    pub fn from_config(config: &ServiceConfig) -> SgpcResult<Self> {
        config.validate()?;
        let lexicon = match &config.lexicon {
            Some(path) => CategoryLexicon::load(path)?,
            None => CategoryLexicon::default_visual_genome(),
        };
        lexicon.validate()?;
        let lexicon = Arc::new(lexicon);

        let vocab = Arc::new(FeatureVocabulary::load(&config.feature_names)?);
        let model = SpnModel::load(&config.model)?;

        let timeout = Duration::from_secs(config.request_timeout_secs);
        let parser: Arc<dyn SceneParser> = match &config.parser_url {
            Some(url) => Arc::new(HttpSceneParser::new(url.clone(), timeout)),
            None => Arc::new(LexicalParser::new(Arc::clone(&lexicon))),
        };
        let generator = config
            .diffusion_url
            .as_ref()
            .map(|url| Arc::new(HttpImageGenerator::new(url.clone(), timeout)) as Arc<dyn ImageGenerator>);

        tracing::info!(
            features = vocab.len(),
            objects = lexicon.objects().len(),
            model = %config.model.display(),
            "service loaded"
        );
        Self::new(
            config.clone(),
            lexicon,
            vocab,
            Arc::new(model),
            parser,
            generator,
        )
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn lexicon(&self) -> &CategoryLexicon {
        &self.lexicon
    }

    pub fn vocab(&self) -> &FeatureVocabulary {
        &self.vocab
    }

    pub fn encoder(&self) -> EvidenceEncoder<'_> {
        EvidenceEncoder::new(&self.vocab, self.config.entity_evidence)
    }

    pub fn engine(&self) -> QueryEngine<'_> {
        QueryEngine::new(&self.vocab, &self.lexicon, self.oracle.as_ref())
    }

    /// Parse a prompt and normalize it under the configured policies.
    pub fn parse_prompt(&self, text: &str) -> SgpcResult<SceneGraph> {
        let raw = self.parser.parse(text)?;
        let scene = Normalizer::new(&self.lexicon, self.config.normalize_options()).normalize(&raw)?;
        tracing::debug!(
            entities = scene.entities.len(),
            relationships = scene.relationships.len(),
            "parsed prompt"
        );
        Ok(scene)
    }

    /// Evidence tokens for a scene graph.
    pub fn evidence(&self, scene: &SceneGraph) -> Vec<String> {
        self.encoder().encode(scene)
    }

    pub fn analyze(&self, scene: &SceneGraph) -> SgpcResult<SceneAnalysis> {
        let encoder = self.encoder();
        let engine = self.engine();
        Ok(analysis::analyze(
            scene,
            &self.lexicon,
            &encoder,
            &engine,
            self.config.top_k,
        )?)
    }

    /// Co-occurring objects given raw evidence tokens.
    pub fn co_occurrence<S: AsRef<str>>(&self, tokens: &[S]) -> SgpcResult<Vec<ScoredCandidate>> {
        let evidence = self.encoder().vectorize(tokens);
        Ok(self.engine().co_occurrence(&evidence, self.config.top_k)?)
    }

    /// Attributes of `object` given raw evidence tokens.
    pub fn attributes<S: AsRef<str>>(
        &self,
        tokens: &[S],
        object: &str,
    ) -> SgpcResult<Vec<ScoredCandidate>> {
        let evidence = self.encoder().vectorize(tokens);
        Ok(self.engine().attributes(&evidence, object, self.config.top_k)?)
    }

    /// Relationships `<object>_<rel>_<subject>` for an ordered pair.
    pub fn relationships(&self, object: &str, subject: &str) -> SgpcResult<Vec<ScoredCandidate>> {
        Ok(self
            .engine()
            .relationships(object, subject, self.config.top_k)?)
    }

    pub fn generate_image(&self, text: &str) -> SgpcResult<Vec<u8>> {
        let generator = self
            .generator
            .as_ref()
            .ok_or(DiffusionError::NotConfigured)?;
        Ok(generator.generate(text)?)
    }

    pub fn info(&self) -> ServiceInfo {
        ServiceInfo {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            description: env!("CARGO_PKG_DESCRIPTION").to_string(),
            features: self.vocab.len(),
            objects: self.lexicon.objects().len(),
            attributes: self.lexicon.attributes().len(),
            relationships: self.lexicon.relationships().len(),
            parser: self
                .config
                .parser_url
                .clone()
                .unwrap_or_else(|| "lexical".to_string()),
            image_generation: self.generator.is_some(),
        }
    }
}
