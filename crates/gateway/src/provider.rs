//! Provider drivers and the capability registry.
//!
//! Drivers implement narrow capability traits rather than one wide provider
//! interface; the gateway dispatches by feature-checking and answers with a
//! typed error when a provider lacks the requested capability.

pub(crate) mod auto;
pub(crate) mod elevenlabs;
pub(crate) mod jina;
pub(crate) mod openai;

use std::{collections::BTreeSet, pin::Pin, sync::Arc};

use async_trait::async_trait;
use bytes::Bytes;
use config::{GatewayConfig, ProviderConfig, RouteTarget};
use futures::Stream;
use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::{
    error::{GatewayError, GatewayResult},
    prompts::PromptRegistry,
    schemas::{ChatCompletionRequest, ChatDelta, ChatMessage, EmbeddingResponse},
};

/// A stream of chat deltas produced by a streaming backend.
pub type ChatStream = Pin<Box<dyn Stream<Item = GatewayResult<ChatDelta>> + Send>>;

/// Chat completions, blocking and streaming.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Run a blocking completion. Returns the upstream response body so the
    /// route can normalize usage without losing backend-specific fields.
    async fn chat(&self, messages: &[ChatMessage], request: &ChatCompletionRequest) -> GatewayResult<Value>;

    /// Run a streaming completion. Returns the effective model together with
    /// the delta stream so SSE frames can carry it.
    async fn chat_stream(
        &self,
        messages: Vec<ChatMessage>,
        request: &ChatCompletionRequest,
    ) -> GatewayResult<(String, ChatStream)>;

    fn name(&self) -> &str;
}

/// Batched embeddings.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embeddings(
        &self,
        input: Vec<String>,
        model: &str,
        options: &Map<String, Value>,
    ) -> GatewayResult<EmbeddingResponse>;

    fn name(&self) -> &str;
}

/// A single reranked document score.
#[derive(Debug, serde::Deserialize)]
pub struct RerankScore {
    pub index: usize,
    pub relevance_score: f64,
}

/// The upstream rerank outcome before document echoing.
#[derive(Debug)]
pub struct RerankOutcome {
    pub model: String,
    pub results: Vec<RerankScore>,
}

/// Query + documents to a scored ordering.
#[async_trait]
pub trait RerankProvider: Send + Sync {
    async fn rerank(
        &self,
        query: &str,
        documents: Vec<String>,
        model: &str,
        top_n: Option<usize>,
    ) -> GatewayResult<RerankOutcome>;

    fn name(&self) -> &str;
}

/// Text + voice to audio bytes.
#[async_trait]
pub trait SpeechProvider: Send + Sync {
    async fn speech(
        &self,
        text: &str,
        model: &str,
        voice: &str,
        options: &Map<String, Value>,
    ) -> GatewayResult<Bytes>;

    fn name(&self) -> &str;
}

/// All configured drivers, indexed per capability.
pub struct ProviderSet {
    chat: IndexMap<String, Arc<dyn ChatProvider>>,
    embedding: IndexMap<String, Arc<dyn EmbeddingProvider>>,
    rerank: IndexMap<String, Arc<dyn RerankProvider>>,
    speech: IndexMap<String, Arc<dyn SpeechProvider>>,
    /// Every configured provider name, to tell "unknown provider" apart from
    /// "provider lacks this capability".
    names: BTreeSet<String>,
}

impl ProviderSet {
    /// Build all drivers from configuration. The auto-router is registered
    /// as a chat provider under the name `auto` when a routing table exists.
    pub fn from_config(config: &GatewayConfig, prompts: Arc<PromptRegistry>) -> ProviderSet {
        let mut chat: IndexMap<String, Arc<dyn ChatProvider>> = IndexMap::new();
        let mut embedding: IndexMap<String, Arc<dyn EmbeddingProvider>> = IndexMap::new();
        let mut rerank: IndexMap<String, Arc<dyn RerankProvider>> = IndexMap::new();
        let mut speech: IndexMap<String, Arc<dyn SpeechProvider>> = IndexMap::new();
        let mut names = BTreeSet::new();

        for (name, provider_config) in &config.providers {
            log::debug!("Initializing provider: {name}");
            names.insert(name.clone());

            match provider_config {
                ProviderConfig::Openai { api_key, base_url } => {
                    let provider = Arc::new(openai::OpenAiProvider::new(
                        name.clone(),
                        api_key.clone(),
                        base_url.clone(),
                    ));
                    chat.insert(name.clone(), provider);
                }
                ProviderConfig::Jina { api_key, base_url } => {
                    let provider = Arc::new(jina::JinaProvider::new(
                        name.clone(),
                        api_key.clone(),
                        base_url.clone(),
                    ));
                    embedding.insert(name.clone(), provider.clone());
                    rerank.insert(name.clone(), provider);
                }
                ProviderConfig::Elevenlabs { api_key, base_url } => {
                    let provider = Arc::new(elevenlabs::ElevenLabsProvider::new(
                        name.clone(),
                        api_key.clone(),
                        base_url.clone(),
                    ));
                    speech.insert(name.clone(), provider);
                }
            }
        }

        if !config.routing.is_empty() {
            let router = auto::AutoRouter::new(config.routing.clone(), prompts, chat.clone());
            names.insert("auto".to_string());
            chat.insert("auto".to_string(), Arc::new(router));
        }

        log::debug!(
            "Gateway initialized with {} provider(s): chat={}, embedding={}, rerank={}, speech={}",
            names.len(),
            chat.len(),
            embedding.len(),
            rerank.len(),
            speech.len()
        );

        ProviderSet {
            chat,
            embedding,
            rerank,
            speech,
            names,
        }
    }

    pub fn chat(&self, name: &str) -> GatewayResult<&Arc<dyn ChatProvider>> {
        self.chat.get(name).ok_or_else(|| self.missing(name, "chat completions"))
    }

    pub fn embedding(&self, name: &str) -> GatewayResult<&Arc<dyn EmbeddingProvider>> {
        self.embedding.get(name).ok_or_else(|| self.missing(name, "embeddings"))
    }

    pub fn rerank(&self, name: &str) -> GatewayResult<&Arc<dyn RerankProvider>> {
        self.rerank.get(name).ok_or_else(|| self.missing(name, "reranking"))
    }

    /// The first rerank-capable provider in configuration order.
    pub fn default_rerank(&self) -> GatewayResult<&Arc<dyn RerankProvider>> {
        self.rerank
            .values()
            .next()
            .ok_or_else(|| GatewayError::InternalError(Some("No rerank-capable provider configured".to_string())))
    }

    pub fn speech(&self, name: &str) -> GatewayResult<&Arc<dyn SpeechProvider>> {
        self.speech.get(name).ok_or_else(|| self.missing(name, "text-to-speech"))
    }

    fn missing(&self, name: &str, operation: &'static str) -> GatewayError {
        if self.names.contains(name) {
            GatewayError::UnsupportedOperation {
                provider: name.to_string(),
                operation,
            }
        } else {
            GatewayError::ProviderNotFound(name.to_string())
        }
    }
}

/// Resolve the routing table entry for a request's prompt metadata. Exposed
/// for the auto-router and its tests.
pub(crate) fn route_for_request<'a>(
    routing: &'a std::collections::BTreeMap<String, RouteTarget>,
    prompts: &PromptRegistry,
    request: &ChatCompletionRequest,
) -> GatewayResult<&'a RouteTarget> {
    let complexity = request
        .prompt_type
        .as_deref()
        .and_then(|prompt_type| {
            match prompts.get_entry(prompt_type, request.prompt_version.as_deref()) {
                Ok(entry) => entry.complexity().map(str::to_string),
                Err(_) => {
                    log::warn!("Prompt not found for auto-selection, using fallback.");
                    None
                }
            }
        })
        .unwrap_or_else(|| "default".to_string());

    routing
        .get(&complexity)
        .or_else(|| routing.get("default"))
        .ok_or_else(|| {
            GatewayError::InvalidRequest("Auto routing is not configured on this gateway".to_string())
        })
}
