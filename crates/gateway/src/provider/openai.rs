use std::time::Duration;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::header::AUTHORIZATION;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value, json};
use url::Url;

use crate::{
    error::{GatewayError, GatewayResult},
    http_client::http_client,
    provider::{ChatProvider, ChatStream},
    schemas::{ChatCompletionRequest, ChatDelta, ChatMessage, Reasoning},
};

const CHAT_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_ATTEMPTS: u32 = 3;

/// Driver for any OpenAI-compatible chat backend: OpenRouter, Ollama, vLLM,
/// or the upstream API itself.
pub(crate) struct OpenAiProvider {
    client: reqwest::Client,
    name: String,
    api_key: Option<SecretString>,
    base_url: Url,
}

impl OpenAiProvider {
    pub fn new(name: String, api_key: Option<SecretString>, base_url: Url) -> Self {
        Self {
            client: http_client(),
            name,
            api_key,
            base_url,
        }
    }

    fn request_model(&self, request: &ChatCompletionRequest) -> GatewayResult<String> {
        request.model.clone().ok_or_else(|| {
            GatewayError::InvalidRequest(format!("A model must be specified for the '{}' provider.", self.name))
        })
    }

    fn body(
        &self,
        model: &str,
        messages: &[ChatMessage],
        request: &ChatCompletionRequest,
        stream: bool,
    ) -> GatewayResult<Vec<u8>> {
        let mut body = Map::new();

        body.insert("model".to_string(), json!(model));
        body.insert("messages".to_string(), serde_json::to_value(messages).map_err(serialize_error)?);
        body.insert("stream".to_string(), json!(stream));

        for (key, value) in &request.options {
            body.insert(key.clone(), value.clone());
        }

        if let Some(user_id) = &request.user_id {
            body.insert("user".to_string(), json!(user_id));
        }

        if let Some(tools) = &request.tools {
            body.insert("tools".to_string(), serde_json::to_value(tools).map_err(serialize_error)?);
        }

        if let Some(tool_choice) = &request.tool_choice {
            body.insert("tool_choice".to_string(), tool_choice.clone());
        }

        match &request.reasoning {
            Some(Reasoning::Toggle(false)) => {
                body.insert("reasoning".to_string(), json!({ "exclude": true }));
            }
            Some(Reasoning::Toggle(true)) | None => {}
            Some(Reasoning::Config(config)) => {
                let value = serde_json::to_value(config).map_err(serialize_error)?;
                if value.as_object().is_some_and(|o| !o.is_empty()) {
                    body.insert("reasoning".to_string(), value);
                }
            }
        }

        serde_json::to_vec(&Value::Object(body)).map_err(serialize_error)
    }

    /// Send the completion request, retrying transient network failures with
    /// exponential backoff. Upstream HTTP errors are never retried.
    async fn send(&self, body: Vec<u8>) -> GatewayResult<reqwest::Response> {
        let url = format!("{}/chat/completions", self.base_url.as_str().trim_end_matches('/'));

        let mut last_error = None;

        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(250 * 2u64.pow(attempt - 1))).await;
            }

            let mut builder = self
                .client
                .post(&url)
                .timeout(CHAT_TIMEOUT)
                .header("Content-Type", "application/json")
                .body(body.clone());

            if let Some(key) = &self.api_key {
                builder = builder.header(AUTHORIZATION, format!("Bearer {}", key.expose_secret()));
            }

            match builder.send().await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    log::warn!(
                        "Request to '{}' failed (attempt {}/{MAX_ATTEMPTS}): {e}",
                        self.name,
                        attempt + 1
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(GatewayError::ConnectionError(format!(
            "Failed to send request to '{}': {}",
            self.name,
            last_error.map(|e| e.to_string()).unwrap_or_default()
        )))
    }
}

fn serialize_error(e: serde_json::Error) -> GatewayError {
    GatewayError::InvalidRequest(format!("Failed to serialize request: {e}"))
}

#[async_trait]
impl ChatProvider for OpenAiProvider {
    async fn chat(&self, messages: &[ChatMessage], request: &ChatCompletionRequest) -> GatewayResult<Value> {
        let model = self.request_model(request)?;
        let body = self.body(&model, messages, request, false)?;

        let response = self.send(body).await?;
        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            log::error!("'{}' API error ({status}): {error_text}", self.name);

            return Err(GatewayError::from_upstream(status.as_u16(), error_text));
        }

        let response_text = response.text().await.map_err(|e| {
            log::error!("Failed to read '{}' response body: {e}", self.name);
            GatewayError::InternalError(None)
        })?;

        serde_json::from_str(&response_text).map_err(|e| {
            log::error!("Failed to parse '{}' chat completion response: {e}", self.name);
            GatewayError::InternalError(None)
        })
    }

    async fn chat_stream(
        &self,
        messages: Vec<ChatMessage>,
        request: &ChatCompletionRequest,
    ) -> GatewayResult<(String, ChatStream)> {
        let model = self.request_model(request)?;
        let body = self.body(&model, &messages, request, true)?;

        let response = self.send(body).await?;
        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            log::error!("'{}' streaming API error ({status}): {error_text}", self.name);

            return Err(GatewayError::from_upstream(status.as_u16(), error_text));
        }

        let provider_name = self.name.clone();
        let event_stream = response.bytes_stream().eventsource();

        let delta_stream = event_stream.filter_map(move |event| {
            let provider = provider_name.clone();

            async move {
                let event = match event {
                    Ok(event) => event,
                    Err(e) => {
                        log::warn!("SSE parsing error in '{provider}' stream: {e}");
                        return None;
                    }
                };

                if event.data == "[DONE]" {
                    return None;
                }

                let Ok(chunk) = serde_json::from_str::<Value>(&event.data) else {
                    log::warn!("Failed to parse '{provider}' streaming chunk");
                    return None;
                };

                let delta = delta_from_chunk(&chunk);

                if delta.is_empty() {
                    return None;
                }

                Some(Ok(delta))
            }
        });

        Ok((model, Box::pin(delta_stream)))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Pull the relevant delta fields out of an upstream chunk. serde_json has
/// already replaced any invalid surrogate escapes during parsing, so the
/// content is safe to relay as-is.
fn delta_from_chunk(chunk: &Value) -> ChatDelta {
    let choice = &chunk["choices"][0];
    let delta = &choice["delta"];

    ChatDelta {
        role: delta["role"].as_str().map(str::to_string),
        content: delta["content"].as_str().map(str::to_string),
        tool_calls: delta["tool_calls"].as_array().cloned(),
        finish_reason: choice["finish_reason"].as_str().map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn delta_extraction_keeps_tool_call_fragments() {
        let chunk = json!({
            "choices": [{
                "delta": {
                    "role": "assistant",
                    "tool_calls": [{"index": 0, "function": {"name": "search", "arguments": "{\"q"}}],
                },
                "finish_reason": null,
            }]
        });

        let delta = delta_from_chunk(&chunk);

        assert_eq!(delta.role.as_deref(), Some("assistant"));
        assert!(delta.content.is_none());
        assert_eq!(delta.tool_calls.as_ref().map(Vec::len), Some(1));
        assert!(delta.finish_reason.is_none());
    }

    #[test]
    fn empty_deltas_are_detected() {
        let chunk = json!({"choices": [{"delta": {}, "finish_reason": null}]});
        assert!(delta_from_chunk(&chunk).is_empty());

        let finished = json!({"choices": [{"delta": {}, "finish_reason": "stop"}]});
        assert!(!delta_from_chunk(&finished).is_empty());
    }

    #[test]
    fn body_maps_reasoning_toggle_off_to_exclude() {
        let provider = OpenAiProvider::new(
            "openai".to_string(),
            None,
            Url::parse("http://localhost:11434/v1").unwrap(),
        );

        let request = ChatCompletionRequest {
            model: Some("test".to_string()),
            reasoning: Some(Reasoning::Toggle(false)),
            ..Default::default()
        };

        let body = provider.body("test", &[ChatMessage::user("hi")], &request, false).unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(value["reasoning"], json!({"exclude": true}));
        assert_eq!(value["stream"], json!(false));
        assert_eq!(value["messages"][0]["content"], json!("hi"));
    }
}
