use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use url::Url;

use crate::{
    error::{GatewayError, GatewayResult},
    http_client::http_client,
    provider::{EmbeddingProvider, RerankOutcome, RerankProvider, RerankScore},
    schemas::{EmbeddingData, EmbeddingResponse},
};

const EMBEDDINGS_TIMEOUT: Duration = Duration::from_secs(30);
// Reranking can take longer than embeddings.
const RERANK_TIMEOUT: Duration = Duration::from_secs(30);

/// Driver for the hosted Jina embeddings and rerank API.
pub(crate) struct JinaProvider {
    client: reqwest::Client,
    name: String,
    api_key: SecretString,
    base_url: Url,
}

impl JinaProvider {
    pub fn new(name: String, api_key: SecretString, base_url: Url) -> Self {
        Self {
            client: http_client(),
            name,
            api_key,
            base_url,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url.as_str().trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct JinaEmbeddingResponse {
    model: Option<String>,
    data: Vec<EmbeddingData>,
    #[serde(default)]
    usage: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct JinaRerankResponse {
    model: Option<String>,
    results: Vec<RerankScore>,
}

#[async_trait]
impl EmbeddingProvider for JinaProvider {
    async fn embeddings(
        &self,
        input: Vec<String>,
        model: &str,
        options: &Map<String, Value>,
    ) -> GatewayResult<EmbeddingResponse> {
        let mut body = Map::new();
        body.insert("model".to_string(), json!(model));
        body.insert("input".to_string(), json!(input));

        for (key, value) in options {
            body.insert(key.clone(), value.clone());
        }

        let response = self
            .client
            .post(self.endpoint("embeddings"))
            .timeout(EMBEDDINGS_TIMEOUT)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key.expose_secret()))
            .json(&Value::Object(body))
            .send()
            .await
            .map_err(|e| GatewayError::ConnectionError(format!("Failed to reach '{}': {e}", self.name)))?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            log::error!("'{}' embeddings API error ({status}): {error_text}", self.name);

            return Err(GatewayError::from_upstream(status.as_u16(), error_text));
        }

        let upstream: JinaEmbeddingResponse = response.json().await.map_err(|e| {
            log::error!("Failed to parse '{}' embeddings response: {e}", self.name);
            GatewayError::InternalError(None)
        })?;

        Ok(EmbeddingResponse {
            object: "list".to_string(),
            provider: self.name.clone(),
            model: upstream.model.unwrap_or_else(|| model.to_string()),
            data: upstream.data,
            usage: upstream.usage,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl RerankProvider for JinaProvider {
    async fn rerank(
        &self,
        query: &str,
        documents: Vec<String>,
        model: &str,
        top_n: Option<usize>,
    ) -> GatewayResult<RerankOutcome> {
        let mut body = Map::new();
        body.insert("model".to_string(), json!(model));
        body.insert("query".to_string(), json!(query));
        body.insert("documents".to_string(), json!(documents));

        if let Some(top_n) = top_n {
            body.insert("top_n".to_string(), json!(top_n));
        }

        let response = self
            .client
            .post(self.endpoint("rerank"))
            .timeout(RERANK_TIMEOUT)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key.expose_secret()))
            .json(&Value::Object(body))
            .send()
            .await
            .map_err(|e| GatewayError::ConnectionError(format!("Failed to reach '{}': {e}", self.name)))?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            log::error!("'{}' rerank API error ({status}): {error_text}", self.name);

            return Err(GatewayError::from_upstream(status.as_u16(), error_text));
        }

        let upstream: JinaRerankResponse = response.json().await.map_err(|e| {
            log::error!("Failed to parse '{}' rerank response: {e}", self.name);
            GatewayError::InternalError(None)
        })?;

        Ok(RerankOutcome {
            model: upstream.model.unwrap_or_else(|| model.to_string()),
            results: upstream.results,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}
