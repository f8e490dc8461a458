//! Remote scene-graph parser over HTTP.

use std::time::Duration;

use super::{ParserError, ParserResult, SceneParser};
use crate::normalize::RawSceneGraph;

/// POSTs `{"text": ...}` to an external parser and decodes the raw scene graph
/// (`{"entities": [{"head", "modifiers"}], "relations": [...]}`).
#[derive(Debug, Clone)]
pub struct HttpSceneParser {
    url: String,
    timeout: Duration,
}

impl HttpSceneParser {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl SceneParser for HttpSceneParser {
    fn parse(&self, text: &str) -> ParserResult<RawSceneGraph> {
        let agent = ureq::AgentBuilder::new().timeout(self.timeout).build();
        let body = serde_json::json!({ "text": text }).to_string();

        let response = match agent
            .post(&self.url)
            .set("Content-Type", "application/json")
            .send_string(&body)
        {
            Ok(response) => response,
            Err(ureq::Error::Status(status, response)) => {
                return Err(ParserError::Status {
                    status,
                    body: response.into_string().unwrap_or_default(),
                });
            }
            Err(ureq::Error::Transport(transport)) => {
                return Err(ParserError::Unreachable {
                    url: self.url.clone(),
                    message: transport.to_string(),
                });
            }
        };

        let payload = response.into_string().map_err(|e| ParserError::Unreachable {
            url: self.url.clone(),
            message: e.to_string(),
        })?;
        let value: serde_json::Value =
            serde_json::from_str(&payload).map_err(|e| crate::error::NormalizeError::Malformed {
                message: e.to_string(),
            })?;
        tracing::debug!(url = %self.url, "received parser output");
        Ok(RawSceneGraph::from_json(value)?)
    }
}
