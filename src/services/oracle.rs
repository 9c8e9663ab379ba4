use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use thiserror::Error;

use crate::models::{parse_verdict, EvaluationRequest, OracleVerdict};

/// Errors from the evaluation oracle, classified for the retry policy.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("oracle rate limited the request")]
    RateLimited,

    #[error("oracle unavailable: status {0}")]
    Unavailable(u16),

    #[error("unauthorized: invalid oracle API key")]
    Unauthorized,

    #[error("oracle rejected the request: {0}")]
    Rejected(String),

    #[error("malformed oracle response: {0}")]
    Malformed(String),
}

impl OracleError {
    /// Transient errors are worth retrying with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Request(_) | Self::RateLimited | Self::Unavailable(_)
        )
    }

    /// Permanent rejections abort the current candidate instead of falling
    /// back to the rule-based decision.
    pub fn aborts_candidate(&self) -> bool {
        matches!(self, Self::Unauthorized | Self::Rejected(_))
    }
}

/// External eligibility oracle. Treated as opaque and possibly unreliable;
/// implementations return a structured verdict or a classified error.
#[async_trait]
pub trait Oracle: Send + Sync {
    async fn evaluate(
        &self,
        request: &EvaluationRequest<'_>,
    ) -> Result<OracleVerdict, OracleError>;
}

/// HTTP oracle client for a generative-model evaluation endpoint.
///
/// Sends the rendered prompt to a `generateContent`-style API and parses the
/// model's text answer into a verdict.
pub struct HttpOracle {
    base_url: String,
    api_key: String,
    model: String,
    client: Client,
}

impl HttpOracle {
    pub fn new(base_url: String, api_key: String, model: String, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url,
            api_key,
            model,
            client,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }

    /// Pull the generated text out of the response envelope.
    fn extract_text(body: &Value) -> Result<&str, OracleError> {
        body.get("candidates")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .and_then(|c| c.pointer("/content/parts/0/text"))
            .and_then(|t| t.as_str())
            .ok_or_else(|| OracleError::Malformed("missing candidate text".into()))
    }
}

#[async_trait]
impl Oracle for HttpOracle {
    async fn evaluate(
        &self,
        request: &EvaluationRequest<'_>,
    ) -> Result<OracleVerdict, OracleError> {
        let payload = json!({
            "contents": [{
                "parts": [{ "text": request.prompt() }]
            }]
        });

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status().as_u16();
        match status {
            200..=299 => {}
            401 | 403 => return Err(OracleError::Unauthorized),
            429 => return Err(OracleError::RateLimited),
            400..=499 => {
                let body = response.text().await.unwrap_or_default();
                return Err(OracleError::Rejected(format!("status {}: {}", status, body)));
            }
            _ => return Err(OracleError::Unavailable(status)),
        }

        let body: Value = response.json().await?;
        let text = Self::extract_text(&body)?;

        tracing::trace!("Oracle answered {} chars", text.len());

        parse_verdict(text)
            .ok_or_else(|| OracleError::Malformed(format!("unparseable verdict: {}", text)))
    }
}
