//! HTTP client for the AI gateway's embeddings endpoint.

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use url::Url;

// Large batches take a while to embed.
const EMBEDDINGS_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Failed to reach AI gateway: {0}")]
    Connection(String),

    #[error("AI gateway returned error {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Invalid response structure from AI gateway: {0}")]
    InvalidResponse(String),
}

/// Client for the gateway endpoints the ingestion workers call.
#[derive(Clone)]
pub struct GatewayClient {
    client: reqwest::Client,
    base_url: Url,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

impl GatewayClient {
    pub fn new(base_url: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    /// Request embeddings for a batch of chunks in one call, pinning the
    /// model with the full model string from the message.
    pub async fn embeddings(&self, chunks: &[String], full_model: &str) -> Result<Vec<Vec<f32>>, ClientError> {
        let url = format!("{}/v1/embeddings", self.base_url.as_str().trim_end_matches('/'));

        log::debug!("Requesting embeddings for {} chunks from {url}", chunks.len());

        let response = self
            .client
            .post(url)
            .timeout(EMBEDDINGS_TIMEOUT)
            .json(&json!({
                "fullModel": full_model,
                "input": chunks,
                "options": {},
            }))
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

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;

        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}
