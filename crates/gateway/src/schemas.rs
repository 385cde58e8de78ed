//! Request and response types for the gateway's OpenAI-compatible surface.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Configuration for reasoning/thinking tokens, following OpenRouter's
/// unified reasoning parameter. `Toggle(false)` maps to `{ exclude: true }`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Reasoning {
    Toggle(bool),
    Config(ReasoningConfig),
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ReasoningConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effort: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude: Option<bool>,
}

/// Function definition for tool calling.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FunctionDefinition {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

/// Tool definition following OpenAI's format.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolDefinition {
    #[serde(default = "function_type")]
    pub r#type: String,
    pub function: FunctionDefinition,
}

fn function_type() -> String {
    "function".to_string()
}

/// A tool call made by the model. `function` carries `name` and `arguments`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(default = "function_type")]
    pub r#type: String,
    pub function: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Set on tool response messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChatCompletionRequest {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub messages: Option<Vec<ChatMessage>>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub options: Map<String, Value>,

    pub prompt_type: Option<String>,
    pub prompt_version: Option<String>,
    pub prompt_vars: Option<Map<String, Value>>,

    pub user_id: Option<String>,

    pub tools: Option<Vec<ToolDefinition>>,
    /// "auto", "none", or a specific tool selector.
    pub tool_choice: Option<Value>,
    pub reasoning: Option<Reasoning>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    #[serde(default = "chat_completion_object")]
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<Value>,
    #[serde(default)]
    pub usage: Map<String, Value>,
}

fn chat_completion_object() -> String {
    "chat.completion".to_string()
}

/// One delta produced by a streaming chat backend, before it is wrapped in
/// the OpenAI chunk envelope.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChatDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<Value>>,
    #[serde(skip)]
    pub finish_reason: Option<String>,
}

impl ChatDelta {
    pub fn is_empty(&self) -> bool {
        self.role.is_none() && self.content.is_none() && self.tool_calls.is_none() && self.finish_reason.is_none()
    }
}

/// The OpenAI chat completion chunk envelope sent over SSE.
#[derive(Debug, Serialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub object: &'static str,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Serialize)]
pub struct ChunkChoice {
    pub index: u32,
    pub delta: ChatDelta,
    pub finish_reason: Option<String>,
}

impl ChatCompletionChunk {
    pub fn new(id: &str, created: i64, model: &str, delta: ChatDelta) -> Self {
        let finish_reason = delta.finish_reason.clone();

        Self {
            id: id.to_string(),
            object: "chat.completion.chunk",
            created,
            model: model.to_string(),
            choices: vec![ChunkChoice {
                index: 0,
                delta,
                finish_reason,
            }],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmbeddingRequest {
    pub provider: Option<String>,
    pub model: Option<String>,
    /// Format: `timestamp@version@provider/model`. Pins the model selection
    /// across the fleet; takes precedence over `provider`/`model`.
    #[serde(rename = "fullModel")]
    pub full_model: Option<String>,
    pub input: EmbeddingInput,
    #[serde(default)]
    pub options: Map<String, Value>,
}

/// A single string or a list; providers always receive a list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum EmbeddingInput {
    Single(String),
    Batch(Vec<String>),
}

impl EmbeddingInput {
    pub fn into_batch(self) -> Vec<String> {
        match self {
            Self::Single(text) => vec![text],
            Self::Batch(texts) => texts,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingData {
    #[serde(default = "embedding_object")]
    pub object: String,
    pub embedding: Vec<f32>,
    pub index: usize,
}

fn embedding_object() -> String {
    "embedding".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    #[serde(default = "list_object")]
    pub object: String,
    pub provider: String,
    pub model: String,
    pub data: Vec<EmbeddingData>,
    #[serde(default)]
    pub usage: Map<String, Value>,
}

fn list_object() -> String {
    "list".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RerankDocument {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RerankRequest {
    pub query: String,
    pub documents: Vec<RerankDocument>,
    #[serde(default = "default_rerank_model")]
    pub model: String,
    pub top_n: Option<usize>,
}

fn default_rerank_model() -> String {
    "jina-reranker-v2-base-multilingual".to_string()
}

#[derive(Debug, Serialize)]
pub struct RerankResult {
    /// Original index of the document.
    pub index: usize,
    pub relevance_score: f64,
    pub document: RerankDocument,
}

#[derive(Debug, Serialize)]
pub struct RerankResponse {
    pub model: String,
    pub results: Vec<RerankResult>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TtsRequest {
    #[serde(default = "default_tts_provider")]
    pub provider: String,
    pub text: String,
    pub model: String,
    pub voice: String,
    #[serde(default)]
    pub options: Map<String, Value>,
}

fn default_tts_provider() -> String {
    "elevenlabs".to_string()
}

/// Coerce a usage value to an integer. Some backends report dict-valued
/// usage shapes; a reasonable numeric member is extracted, anything else
/// collapses to zero.
pub fn usage_as_int(value: Option<&Value>) -> i64 {
    let Some(value) = value else { return 0 };

    match value {
        Value::Object(map) => {
            for key in ["total", "value", "count", "tokens"] {
                if let Some(candidate) = map.get(key)
                    && let Some(int) = numeric(candidate)
                {
                    return int;
                }
            }
            0
        }
        other => numeric(other).unwrap_or(0),
    }
}

fn numeric(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_f64().map(|f| f as i64),
        Value::String(s) => s.parse::<f64>().ok().map(|f| f as i64),
        _ => None,
    }
}

/// Normalize the usage counters of a non-streaming chat response in place.
pub fn normalize_usage(response: &mut Value) {
    let Some(usage) = response.get_mut("usage") else {
        return;
    };

    let Some(map) = usage.as_object() else { return };

    let mut normalized = Map::new();
    for key in [
        "prompt_tokens",
        "completion_tokens",
        "total_tokens",
        "completion_tokens_details",
        "prompt_tokens_details",
        "queue_time",
        "prompt_time",
        "completion_time",
        "total_time",
    ] {
        if map.contains_key(key) {
            normalized.insert(key.to_string(), Value::from(usage_as_int(map.get(key))));
        }
    }

    *usage = Value::Object(normalized);
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn usage_int_coercion_handles_dict_shapes() {
        assert_eq!(usage_as_int(Some(&json!(42))), 42);
        assert_eq!(usage_as_int(Some(&json!(41.7))), 41);
        assert_eq!(usage_as_int(Some(&json!("17"))), 17);
        assert_eq!(usage_as_int(Some(&json!({"total": 8}))), 8);
        assert_eq!(usage_as_int(Some(&json!({"tokens": "12"}))), 12);
        assert_eq!(usage_as_int(Some(&json!({"unexpected": 3}))), 0);
        assert_eq!(usage_as_int(Some(&json!(null))), 0);
        assert_eq!(usage_as_int(None), 0);
    }

    #[test]
    fn normalize_usage_flattens_nested_counters() {
        let mut response = json!({
            "usage": {
                "prompt_tokens": 10,
                "completion_tokens": {"total": 20},
                "total_tokens": "30",
                "queue_time": 0.004,
            }
        });

        normalize_usage(&mut response);

        assert_eq!(
            response["usage"],
            json!({
                "prompt_tokens": 10,
                "completion_tokens": 20,
                "total_tokens": 30,
                "queue_time": 0,
            })
        );
    }

    #[test]
    fn embedding_input_always_becomes_a_batch() {
        let single: EmbeddingRequest = serde_json::from_value(json!({"input": "hello"})).unwrap();
        assert_eq!(single.input.into_batch(), vec!["hello".to_string()]);

        let batch: EmbeddingRequest = serde_json::from_value(json!({"input": ["a", "b"]})).unwrap();
        assert_eq!(batch.input.into_batch().len(), 2);
    }

    #[test]
    fn chunk_envelope_shape() {
        let delta = ChatDelta {
            content: Some("Hello".to_string()),
            ..Default::default()
        };
        let chunk = ChatCompletionChunk::new("chatcmpl-test", 1700000000, "x-ai/grok-4-fast", delta);
        let value = serde_json::to_value(&chunk).unwrap();

        assert_eq!(value["object"], "chat.completion.chunk");
        assert_eq!(value["choices"][0]["delta"]["content"], "Hello");
        assert_eq!(value["choices"][0]["finish_reason"], Value::Null);
    }
}
