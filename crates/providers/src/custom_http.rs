//! Custom HTTP workflow provider.
//!
//! Posts the raw user query to a flow-runner endpoint and digs the reply out
//! of its nested result document. The endpoint keeps its own conversation
//! memory keyed by `session_id`, so only the current input is sent.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use sketchpal_config::ProviderConfig;
use sketchpal_core::error::ProviderError;
use sketchpal_core::provider::{Provider, ProviderRequest};
use std::time::Duration;
use tracing::debug;

use crate::{http_client, status_error, transport_error};

/// Locations probed for the reply text, in priority order.
///
/// All live under the first output of the first output node.
pub const EXTRACTION_PATHS: [&str; 8] = [
    "/outputs/0/outputs/0/results/message/text",
    "/outputs/0/outputs/0/outputs/message/message",
    "/outputs/0/outputs/0/artifacts/message",
    "/outputs/0/outputs/0/outputs/message",
    "/outputs/0/outputs/0/message",
    "/outputs/0/outputs/0/text",
    "/outputs/0/outputs/0",
    "/outputs/0/outputs/0/results/message/text_key",
];

/// Request envelope for the flow runner.
#[derive(Debug, Serialize)]
struct RunEnvelope<'a> {
    input_value: &'a str,
    output_type: &'a str,
    input_type: &'a str,
    session_id: &'a str,
}

/// A provider backed by a user-run HTTP workflow endpoint.
pub struct CustomHttpProvider {
    name: String,
    endpoint: String,
    session_id: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl CustomHttpProvider {
    pub fn new(
        endpoint: impl Into<String>,
        session_id: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            name: "custom".into(),
            endpoint: endpoint.into(),
            session_id: session_id.into(),
            api_key: None,
            client: http_client(timeout),
        }
    }

    /// Send an `x-api-key` header with every request.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Build from a `[custom]` configuration table.
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let endpoint = config
            .api_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| ProviderError::NotConfigured("custom endpoint URL is not set".into()))?;

        let provider = Self::new(
            endpoint,
            config.session_id.clone(),
            Duration::from_secs(config.timeout_secs),
        );

        Ok(match config.api_key.as_deref().filter(|k| !k.is_empty()) {
            Some(key) => provider.with_api_key(key),
            None => provider,
        })
    }
}

#[async_trait]
impl Provider for CustomHttpProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: ProviderRequest) -> Result<String, ProviderError> {
        let input = request.input_text();
        let envelope = RunEnvelope {
            input_value: &input,
            output_type: "chat",
            input_type: "chat",
            session_id: &self.session_id,
        };

        debug!(provider = %self.name, endpoint = %self.endpoint, "Running workflow");

        let mut builder = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .json(&envelope);
        if let Some(key) = &self.api_key {
            builder = builder.header("x-api-key", key);
        }

        let response = builder.send().await.map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let raw = response.text().await.map_err(transport_error)?;
        let body: Value = serde_json::from_str(&raw)
            .map_err(|e| {
                ProviderError::InvalidResponse(format!("Workflow reply is not JSON: {e}"))
            })?;

        Ok(extract_text(&body))
    }
}

/// Pull the reply text out of a workflow result document.
///
/// Takes the first present, truthy value along [`EXTRACTION_PATHS`]. Strings
/// come back verbatim, anything else as compact JSON. When no path matches,
/// the whole document is serialized.
pub fn extract_text(body: &Value) -> String {
    EXTRACTION_PATHS
        .iter()
        .filter_map(|p| body.pointer(p))
        .find(|v| is_truthy(v))
        .map(render)
        .unwrap_or_else(|| body.to_string())
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
