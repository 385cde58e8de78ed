//! The fylr AI gateway: an OpenAI-compatible HTTP proxy over chat,
//! embeddings, rerank, and text-to-speech backends, with a prompt-template
//! registry and an auto-selecting meta-provider.

use std::{convert::Infallible, sync::Arc};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response, Sse, sse::Event},
    routing::{get, patch, post},
};
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use uuid::Uuid;

mod error;
mod http_client;
pub mod models;
pub mod prompts;
pub mod provider;
pub mod schemas;

pub use error::{GatewayError, GatewayResult as Result};

use error::GatewayResult;
use models::ModelsRegistry;
use prompts::{PromptError, PromptForm, PromptRegistry};
use provider::ProviderSet;
use schemas::{
    ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, ChatMessage,
    EmbeddingRequest, RerankRequest, RerankResponse, RerankResult, TtsRequest, normalize_usage,
};

/// Shared state behind every gateway route.
pub struct GatewayState {
    providers: ProviderSet,
    prompts: Arc<PromptRegistry>,
    models: ModelsRegistry,
    default_embedding: config::DefaultEmbeddingConfig,
}

/// Creates an axum router for the gateway endpoints.
pub fn router(config: &config::Config) -> anyhow::Result<Router> {
    let prompts = Arc::new(PromptRegistry::load(&config.gateway.prompts_dir)?);
    let models = ModelsRegistry::load(&config.gateway.models_file);
    let providers = ProviderSet::from_config(&config.gateway, prompts.clone());

    let state = Arc::new(GatewayState {
        providers,
        prompts,
        models,
        default_embedding: config.gateway.default_embedding.clone(),
    });

    let router = Router::new()
        .route("/", get(root))
        .route("/v1/chat/completions", post(chat_completions))
        .route("/v1/embeddings", post(embeddings))
        .route("/v1/embeddings/models", get(list_models))
        .route("/v1/embeddings/models/default", patch(set_default_model))
        .route("/v1/embeddings/models/deprecate", patch(deprecate_model))
        .route("/v1/rerank", post(rerank))
        .route("/v1/tts", post(text_to_speech))
        .route("/v1/prompts", get(list_prompts))
        .route("/v1/prompts/{prompt_id}", get(inspect_prompt))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state);

    Ok(router)
}

async fn root() -> impl IntoResponse {
    Json(json!({ "status": "AI Gateway is running" }))
}

impl From<PromptError> for GatewayError {
    fn from(error: PromptError) -> Self {
        match error {
            PromptError::NotFound(key) => GatewayError::PromptNotFound(key),
            PromptError::Validation { key, missing } => GatewayError::PromptValidation { key, missing },
            PromptError::Render { key, message } => GatewayError::PromptRender { key, message },
        }
    }
}

impl From<models::ModelsError> for GatewayError {
    fn from(error: models::ModelsError) -> Self {
        match error {
            models::ModelsError::NotFound { provider, model } => {
                GatewayError::ModelNotFound(format!("Model not found: {provider}/{model}"))
            }
            other => GatewayError::InternalError(Some(other.to_string())),
        }
    }
}

/// Assemble the message list for a chat request: rendered prompt messages
/// come first as system context, then the caller's own messages.
fn assemble_messages(state: &GatewayState, request: &ChatCompletionRequest) -> GatewayResult<Vec<ChatMessage>> {
    let mut messages = Vec::new();

    if let Some(prompt_type) = &request.prompt_type {
        let empty = Map::new();
        let vars = request.prompt_vars.as_ref().unwrap_or(&empty);

        let rendered = state
            .prompts
            .render(prompt_type, request.prompt_version.as_deref(), vars)?;

        match rendered.form {
            PromptForm::Messages => messages.extend(rendered.messages.unwrap_or_default()),
            PromptForm::Prompt => messages.push(ChatMessage::user(rendered.prompt.unwrap_or_default())),
        }
    }

    if let Some(user_messages) = &request.messages {
        messages.extend(user_messages.iter().cloned());
    }

    if messages.is_empty() {
        return Err(GatewayError::InvalidRequest(
            "Either 'messages' or 'prompt_type' must be provided.".to_string(),
        ));
    }

    Ok(messages)
}

/// Handle chat completion requests.
///
/// Supports both streaming and non-streaming responses. With `stream: true`
/// the response is a Server-Sent-Events stream of OpenAI-shaped chunks
/// terminated by `data: [DONE]`; a mid-stream failure emits one error frame
/// before the terminator.
async fn chat_completions(
    State(state): State<Arc<GatewayState>>,
    Json(request): Json<ChatCompletionRequest>,
) -> GatewayResult<Response> {
    let provider_name = request.provider.clone().unwrap_or_else(|| "auto".to_string());

    if provider_name != "auto" && request.model.is_none() {
        return Err(GatewayError::InvalidRequest(format!(
            "The 'model' field is required when provider is '{provider_name}'."
        )));
    }

    log::debug!(
        "Chat completions request: provider={provider_name}, prompt_type={:?}, streaming={}",
        request.prompt_type,
        request.stream
    );

    let messages = assemble_messages(&state, &request)?;
    let provider = state.providers.chat(&provider_name)?;

    if request.stream {
        let (model, stream) = provider.chat_stream(messages, &request).await?;

        let completion_id = format!("chatcmpl-{}", Uuid::new_v4());
        let created = jiff::Timestamp::now().as_second();

        // Stop relaying after the first error frame; the terminator below
        // still fires because of the chain.
        let stream = stream.scan(false, |errored, result| {
            if *errored {
                return futures::future::ready(None);
            }
            if result.is_err() {
                *errored = true;
            }
            futures::future::ready(Some(result))
        });

        let event_stream = stream.map(move |result| {
            let event = match result {
                Ok(delta) => {
                    let chunk = ChatCompletionChunk::new(&completion_id, created, &model, delta);
                    let data = serde_json::to_string(&chunk).unwrap_or_else(|e| {
                        log::error!("Failed to serialize chunk: {e}");
                        r#"{"error":"serialization failed"}"#.to_string()
                    });

                    Event::default().data(data)
                }
                Err(e) => {
                    log::error!("Stream error: {e}");
                    let data = serde_json::to_string(&json!({ "error": e.client_message() }))
                        .unwrap_or_else(|_| r#"{"error":"An error occurred during streaming"}"#.to_string());

                    Event::default().data(data)
                }
            };

            Ok::<_, Infallible>(event)
        });

        let with_done = event_stream.chain(futures::stream::once(async {
            Ok::<_, Infallible>(Event::default().data("[DONE]"))
        }));

        Ok(Sse::new(with_done).into_response())
    } else {
        let mut response = provider.chat(&messages, &request).await?;

        normalize_usage(&mut response);

        let response: ChatCompletionResponse = serde_json::from_value(response).map_err(|e| {
            log::error!("Backend returned an unexpected chat completion shape: {e}");
            GatewayError::InternalError(None)
        })?;

        log::debug!(
            "Chat completion successful, returning response with {} choices",
            response.choices.len()
        );

        Ok(Json(response).into_response())
    }
}

async fn embeddings(
    State(state): State<Arc<GatewayState>>,
    Json(request): Json<EmbeddingRequest>,
) -> GatewayResult<Response> {
    let (provider_name, model_name) = match &request.full_model {
        Some(full_model) => {
            let (provider, model) = models::parse_full_model(full_model).ok_or_else(|| {
                GatewayError::InvalidRequest(format!(
                    "Invalid fullModel '{full_model}': expected 'timestamp@version@provider/model'"
                ))
            })?;

            (provider.to_string(), model.to_string())
        }
        None => (
            request
                .provider
                .clone()
                .unwrap_or_else(|| state.default_embedding.provider.clone()),
            request
                .model
                .clone()
                .unwrap_or_else(|| state.default_embedding.model.clone()),
        ),
    };

    let input = request.input.into_batch();

    log::debug!(
        "Embedding request: provider={provider_name}, model={model_name}, input_count={}",
        input.len()
    );

    let provider = state.providers.embedding(&provider_name)?;
    let response = provider.embeddings(input, &model_name, &request.options).await?;

    Ok(Json(response).into_response())
}

async fn list_models(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    Json(state.models.all())
}

#[derive(Debug, Deserialize)]
struct SetDefaultModelRequest {
    provider: String,
    model: String,
}

async fn set_default_model(
    State(state): State<Arc<GatewayState>>,
    Json(request): Json<SetDefaultModelRequest>,
) -> GatewayResult<Response> {
    let full_model = state.models.set_default(&request.provider, &request.model)?;

    Ok(Json(json!({ "default": full_model })).into_response())
}

#[derive(Debug, Deserialize)]
struct DeprecateModelRequest {
    provider: String,
    model: String,
    #[serde(rename = "deprecationDate")]
    deprecation_date: String,
}

async fn deprecate_model(
    State(state): State<Arc<GatewayState>>,
    Json(request): Json<DeprecateModelRequest>,
) -> GatewayResult<Response> {
    state
        .models
        .deprecate(&request.provider, &request.model, &request.deprecation_date)?;

    Ok(Json(json!({ "deprecated": format!("{}/{}", request.provider, request.model) })).into_response())
}

/// Rerank documents by semantic relevance to a query. The upstream scores
/// come back with the original documents echoed so callers keep their
/// metadata.
async fn rerank(
    State(state): State<Arc<GatewayState>>,
    Json(request): Json<RerankRequest>,
) -> GatewayResult<Response> {
    if request.documents.is_empty() {
        return Ok(Json(RerankResponse {
            model: request.model,
            results: Vec::new(),
        })
        .into_response());
    }

    let provider = state.providers.default_rerank()?;

    log::debug!(
        "Rerank request: provider={}, model={}, num_documents={}",
        provider.name(),
        request.model,
        request.documents.len()
    );

    let texts: Vec<String> = request.documents.iter().map(|d| d.text.clone()).collect();
    let outcome = provider
        .rerank(&request.query, texts, &request.model, request.top_n)
        .await?;

    let mut results = Vec::with_capacity(outcome.results.len());

    for score in outcome.results {
        let Some(document) = request.documents.get(score.index) else {
            log::warn!("Rerank result index {} out of range, dropping", score.index);
            continue;
        };

        results.push(RerankResult {
            index: score.index,
            relevance_score: score.relevance_score,
            document: document.clone(),
        });
    }

    Ok(Json(RerankResponse {
        model: outcome.model,
        results,
    })
    .into_response())
}

async fn text_to_speech(
    State(state): State<Arc<GatewayState>>,
    Json(request): Json<TtsRequest>,
) -> GatewayResult<Response> {
    log::debug!(
        "TTS request: provider={}, model={}, text_length={}",
        request.provider,
        request.model,
        request.text.len()
    );

    let provider = state.providers.speech(&request.provider)?;
    let audio = provider
        .speech(&request.text, &request.model, &request.voice, &request.options)
        .await?;

    let content_type = match request.options.get("response_format").and_then(Value::as_str) {
        Some("wav") => "audio/wav",
        _ => "audio/mpeg",
    };

    Ok(([(header::CONTENT_TYPE, content_type)], audio).into_response())
}

async fn list_prompts(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    Json(json!({ "prompts": state.prompts.list() }))
}

#[derive(Debug, Deserialize)]
struct InspectQuery {
    version: Option<String>,
}

async fn inspect_prompt(
    State(state): State<Arc<GatewayState>>,
    Path(prompt_id): Path<String>,
    Query(query): Query<InspectQuery>,
) -> GatewayResult<Response> {
    let inspection = state.prompts.inspect(&prompt_id, query.version.as_deref())?;

    Ok(Json(inspection).into_response())
}
