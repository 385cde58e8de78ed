use std::fmt;

use indexmap::IndexMap;
use secrecy::SecretString;
use serde::Deserialize;
use std::collections::BTreeMap;
use url::Url;

/// AI gateway settings: the HTTP client URL used by workers, the prompt
/// directory, the embedding-model registry file, provider credentials, and
/// the auto-router table.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatewayConfig {
    /// Base URL workers use to reach the gateway.
    pub url: Url,
    /// Directory of YAML prompt templates, loaded once at startup.
    pub prompts_dir: String,
    /// YAML registry of embedding models.
    pub models_file: String,
    /// Provider and model used for embeddings when a request names neither.
    pub default_embedding: DefaultEmbeddingConfig,
    /// Configured provider drivers, keyed by name. Order is preserved for
    /// deterministic startup logging.
    pub providers: IndexMap<String, ProviderConfig>,
    /// Auto-router table: prompt `complexity` tag to provider and model.
    /// A `default` entry is required as the fallback.
    pub routing: BTreeMap<String, RouteTarget>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: Url::parse("http://localhost:8000").expect("default gateway URL is valid"),
            prompts_dir: "prompts".to_string(),
            models_file: "models.yaml".to_string(),
            default_embedding: DefaultEmbeddingConfig::default(),
            providers: IndexMap::new(),
            routing: BTreeMap::new(),
        }
    }
}

/// Provider and model used for embeddings when a request names neither.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DefaultEmbeddingConfig {
    /// Provider name.
    pub provider: String,
    /// Model name.
    pub model: String,
}

impl Default for DefaultEmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "jina".to_string(),
            model: "jina-clip-v2".to_string(),
        }
    }
}

/// A single auto-router target.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RouteTarget {
    /// Provider to delegate to.
    pub provider: String,
    /// Model to request from that provider.
    pub model: String,
}

/// Configuration for a single provider driver.
#[derive(Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", deny_unknown_fields)]
pub enum ProviderConfig {
    /// An OpenAI-compatible chat backend.
    Openai {
        /// API key sent as a bearer token.
        #[serde(default)]
        api_key: Option<SecretString>,
        /// Base URL of the backend, e.g. an OpenRouter or Ollama endpoint.
        base_url: Url,
    },
    /// The Jina embeddings and rerank API.
    Jina {
        /// API key sent as a bearer token.
        api_key: SecretString,
        /// Base URL, overridable for tests.
        #[serde(default = "default_jina_url")]
        base_url: Url,
    },
    /// The ElevenLabs text-to-speech API.
    Elevenlabs {
        /// API key sent via the xi-api-key header.
        api_key: SecretString,
        /// Base URL, overridable for tests.
        #[serde(default = "default_elevenlabs_url")]
        base_url: Url,
    },
}

fn default_jina_url() -> Url {
    Url::parse("https://api.jina.ai/v1").expect("default Jina URL is valid")
}

fn default_elevenlabs_url() -> Url {
    Url::parse("https://api.elevenlabs.io").expect("default ElevenLabs URL is valid")
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Openai { base_url, .. } => f
                .debug_struct("Openai")
                .field("api_key", &"<redacted>")
                .field("base_url", base_url)
                .finish(),
            Self::Jina { base_url, .. } => f
                .debug_struct("Jina")
                .field("api_key", &"<redacted>")
                .field("base_url", base_url)
                .finish(),
            Self::Elevenlabs { base_url, .. } => f
                .debug_struct("Elevenlabs")
                .field("api_key", &"<redacted>")
                .field("base_url", base_url)
                .finish(),
        }
    }
}
