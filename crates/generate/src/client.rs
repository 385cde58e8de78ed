//! HTTP client for the AI gateway endpoints the generators call: chat with
//! registered prompts, query embeddings, and text-to-speech.

use std::time::Duration;

use bytes::Bytes;
use serde_json::{Map, Value, json};
use thiserror::Error;
use url::Url;

const CHAT_TIMEOUT: Duration = Duration::from_secs(120);
const EMBEDDING_TIMEOUT: Duration = Duration::from_secs(30);
const TTS_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Failed to reach AI gateway: {0}")]
    Connection(String),

    #[error("AI gateway returned error {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Invalid response structure from AI gateway: {0}")]
    InvalidResponse(String),
}

/// Client for the gateway endpoints the generator workers call.
#[derive(Clone)]
pub struct GatewayClient {
    client: reqwest::Client,
    base_url: Url,
}

impl GatewayClient {
    pub fn new(base_url: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.as_str().trim_end_matches('/'))
    }

    async fn post(&self, path: &str, body: Value, timeout: Duration) -> Result<reqwest::Response, ClientError> {
        let response = self
            .client
            .post(self.endpoint(path))
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| ClientError::Connection(e.to_string()))?;

        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| "<empty response>".to_string());

            return Err(ClientError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }

    /// Ask the auto-routed LLM to render a registered prompt and complete
    /// it, returning the assistant's text.
    pub async fn generate_text(
        &self,
        prompt_type: &str,
        prompt_version: &str,
        prompt_vars: Map<String, Value>,
    ) -> Result<String, ClientError> {
        let body = json!({
            "provider": "auto",
            "stream": false,
            "prompt_type": prompt_type,
            "prompt_version": prompt_version,
            "prompt_vars": prompt_vars,
        });

        let response = self.post("/v1/chat/completions", body, CHAT_TIMEOUT).await?;

        let data: Value = response
            .json()
            .await
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;

        let content = data["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string();

        if content.is_empty() {
            log::warn!("AI Gateway returned an empty response for prompt '{prompt_type}'");
        }

        Ok(content)
    }

    /// Embed a single query string with the default embedding model.
    pub async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>, ClientError> {
        let body = json!({
            "input": [text],
            "options": { "task": "retrieval.query" },
        });

        let response = self.post("/v1/embeddings", body, EMBEDDING_TIMEOUT).await?;

        let data: Value = response
            .json()
            .await
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;

        let embedding = data["data"][0]["embedding"]
            .as_array()
            .ok_or_else(|| ClientError::InvalidResponse("missing embedding in response data".to_string()))?;

        embedding
            .iter()
            .map(|v| {
                v.as_f64()
                    .map(|f| f as f32)
                    .ok_or_else(|| ClientError::InvalidResponse("non-numeric embedding value".to_string()))
            })
            .collect()
    }

    /// Synthesize one spoken line, returning WAV bytes.
    pub async fn generate_tts(
        &self,
        text: &str,
        voice: &str,
        model: &str,
        provider: &str,
    ) -> Result<Bytes, ClientError> {
        let body = json!({
            "provider": provider,
            "text": text,
            "model": model,
            "voice": voice,
            "options": { "response_format": "wav" },
        });

        let response = self.post("/v1/tts", body, TTS_TIMEOUT).await?;

        response
            .bytes()
            .await
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))
    }
}
