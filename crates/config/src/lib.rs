//! Fylr configuration structures to map the fylr.toml configuration.

#![deny(missing_docs)]

mod broker;
mod database;
mod gateway;
mod generator;
mod ingestor;
mod loader;
mod server;
mod storage;
mod telemetry;

use std::path::Path;

pub use broker::BrokerConfig;
pub use database::DatabaseConfig;
pub use gateway::{DefaultEmbeddingConfig, GatewayConfig, ProviderConfig, RouteTarget};
pub use generator::GeneratorConfig;
pub use ingestor::IngestorConfig;
pub use server::ServerConfig;
pub use storage::StorageConfig;
pub use telemetry::{ExportersConfig, OtlpExporterConfig, TelemetryConfig};

use serde::Deserialize;

/// Main configuration structure for the fylr services.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server configuration for the AI gateway.
    pub server: ServerConfig,
    /// Telemetry configuration settings.
    pub telemetry: TelemetryConfig,
    /// Relational database connection settings.
    pub database: DatabaseConfig,
    /// AMQP broker connection settings.
    pub broker: BrokerConfig,
    /// S3-compatible object storage settings.
    pub storage: StorageConfig,
    /// AI gateway settings (providers, prompts, routing, embedding models).
    pub gateway: GatewayConfig,
    /// Ingestion worker settings.
    pub ingestor: IngestorConfig,
    /// Generator worker settings.
    pub generator: GeneratorConfig,
}

impl Config {
    /// Load configuration from a file path, expanding `{{ env.VAR }}`
    /// placeholders and validating the auto-router table.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
        loader::load(path)
    }
}

#[cfg(test)]
mod tests {
    use insta::assert_debug_snapshot;

    use crate::Config;

    #[test]
    fn defaults() {
        let config: Config = toml::from_str("").unwrap();

        assert_debug_snapshot!(&config, @r#"
        Config {
            server: ServerConfig {
                listen_address: None,
            },
            telemetry: TelemetryConfig {
                service_name: None,
                exporters: ExportersConfig {
                    otlp: OtlpExporterConfig {
                        enabled: false,
                        endpoint: Url {
                            scheme: "http",
                            cannot_be_a_base: false,
                            username: "",
                            password: None,
                            host: Some(
                                Domain(
                                    "localhost",
                                ),
                            ),
                            port: Some(
                                4317,
                            ),
                            path: "/",
                            query: None,
                            fragment: None,
                        },
                    },
                },
            },
            database: DatabaseConfig {
                user: "postgres",
                password: "<redacted>",
                host: "localhost",
                port: 5432,
                name: "fylr",
                max_connections: 5,
            },
            broker: BrokerConfig {
                host: "localhost",
                port: 5672,
                user: "guest",
                password: "<redacted>",
                heartbeat: 600s,
                blocked_connection_timeout: 300s,
            },
            storage: StorageConfig {
                endpoint: None,
                region: "garage",
                key_id: None,
                secret_key: None,
                source_bucket: "fylr.chat-sources",
                podcast_bucket: "fylr.chat-podcasts",
            },
            gateway: GatewayConfig {
                url: Url {
                    scheme: "http",
                    cannot_be_a_base: false,
                    username: "",
                    password: None,
                    host: Some(
                        Domain(
                            "localhost",
                        ),
                    ),
                    port: Some(
                        8000,
                    ),
                    path: "/",
                    query: None,
                    fragment: None,
                },
                prompts_dir: "prompts",
                models_file: "models.yaml",
                default_embedding: DefaultEmbeddingConfig {
                    provider: "jina",
                    model: "jina-clip-v2",
                },
                providers: {},
                routing: {},
            },
            ingestor: IngestorConfig {
                queue: "file-processing",
                routing_keys: [
                    "text.v1",
                ],
                reingest_queue: "file-reingest",
                reingest_routing_key: "reingest.v1",
                ingestor_type: "text-rust",
                ingestor_version: "1.0.0",
            },
            generator: GeneratorConfig {
                tts_provider: "elevenlabs",
                tts_model: "eleven_multilingual_v2",
                host_a_voice: "pNInz6obpgDQGcFmaJgB",
                host_b_voice: "21m00Tcm4TlvDq8ikWAM",
                tts_pacing: 5s,
            },
        }
        "#);
    }

    #[test]
    fn provider_table_round_trips() {
        let config: Config = toml::from_str(indoc::indoc! {r#"
            [gateway.providers.openai]
            type = "openai"
            api_key = "sk-test"
            base_url = "https://openrouter.ai/api/v1"

            [gateway.providers.jina]
            type = "jina"
            api_key = "jina-test"

            [gateway.providers.elevenlabs]
            type = "elevenlabs"
            api_key = "el-test"

            [gateway.routing]
            default = { provider = "openai", model = "z-ai/glm-4.5-air:free" }
            synthesis = { provider = "openai", model = "x-ai/grok-4-fast" }
        "#})
        .unwrap();

        assert_eq!(config.gateway.providers.len(), 3);
        assert_eq!(config.gateway.routing["synthesis"].model, "x-ai/grok-4-fast");
    }
}
