//! Image diffusion oracle: prompt to PNG bytes.
//!
//! Entirely outside the probabilistic core; the service only forwards the
//! prompt to an external text-to-image endpoint.

use std::io::Read;
use std::time::Duration;

use miette::Diagnostic;
use thiserror::Error;

/// Upper bound on a generated image, in bytes.
const MAX_IMAGE_BYTES: u64 = 32 * 1024 * 1024;

#[derive(Debug, Error, Diagnostic)]
pub enum DiffusionError {
    #[error("no image generator configured")]
    #[diagnostic(
        code(sgpc::diffusion::not_configured),
        help("Set `diffusion_url` in the configuration (or SGPC_DIFFUSION_URL) to enable image generation.")
    )]
    NotConfigured,

    #[error("image service at {url} unreachable: {message}")]
    #[diagnostic(
        code(sgpc::diffusion::unreachable),
        help("Check that the text-to-image service is running and reachable.")
    )]
    Unreachable { url: String, message: String },

    #[error("image service returned status {status}: {body}")]
    #[diagnostic(
        code(sgpc::diffusion::status),
        help("The image service rejected the prompt. See its logs for details.")
    )]
    Status { status: u16, body: String },

    #[error("image exceeds the {limit}-byte limit")]
    #[diagnostic(
        code(sgpc::diffusion::too_large),
        help("The image service returned more data than a single PNG should need. Check its output resolution.")
    )]
    TooLarge { limit: u64 },

    #[error("image service returned {content_type}, expected image/png")]
    #[diagnostic(
        code(sgpc::diffusion::content_type),
        help("The configured endpoint must answer with raw PNG bytes.")
    )]
    NotPng { content_type: String },
}

pub type DiffusionResult<T> = std::result::Result<T, DiffusionError>;

/// Renders an image for a prompt.
pub trait ImageGenerator: Send + Sync {
    fn generate(&self, text: &str) -> DiffusionResult<Vec<u8>>;
}

/// POSTs `{"text": ...}` to a text-to-image endpoint that answers with PNG bytes.
#[derive(Debug, Clone)]
pub struct HttpImageGenerator {
    url: String,
    timeout: Duration,
    max_bytes: u64,
}

impl HttpImageGenerator {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
            max_bytes: MAX_IMAGE_BYTES,
        }
    }

    /// Override the response size limit.
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }
}

impl ImageGenerator for HttpImageGenerator {
    fn generate(&self, text: &str) -> DiffusionResult<Vec<u8>> {
        let agent = ureq::AgentBuilder::new().timeout(self.timeout).build();
        let body = serde_json::json!({ "text": text }).to_string();

        let response = match agent
            .post(&self.url)
            .set("Content-Type", "application/json")
            .send_string(&body)
        {
            Ok(response) => response,
            Err(ureq::Error::Status(status, response)) => {
                return Err(DiffusionError::Status {
                    status,
                    body: response.into_string().unwrap_or_default(),
                });
            }
            Err(ureq::Error::Transport(transport)) => {
                return Err(DiffusionError::Unreachable {
                    url: self.url.clone(),
                    message: transport.to_string(),
                });
            }
        };

        let content_type = response.content_type().to_string();
        if content_type != "image/png" {
            return Err(DiffusionError::NotPng { content_type });
        }

        // One byte past the limit tells an oversized body from one that fits exactly.
        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(self.max_bytes + 1)
            .read_to_end(&mut bytes)
            .map_err(|e| DiffusionError::Unreachable {
                url: self.url.clone(),
                message: e.to_string(),
            })?;
        if bytes.len() as u64 > self.max_bytes {
            return Err(DiffusionError::TooLarge {
                limit: self.max_bytes,
            });
        }
        tracing::info!(bytes = bytes.len(), "generated image");
        Ok(bytes)
    }
}
