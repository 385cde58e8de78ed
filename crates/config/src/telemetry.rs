use serde::Deserialize;
use url::Url;

/// Telemetry configuration settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct TelemetryConfig {
    /// Service name reported to the OTLP collector. Each binary falls back
    /// to its own name when unset.
    pub service_name: Option<String>,
    /// Exporter configuration.
    pub exporters: ExportersConfig,
}

/// Exporter configuration.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct ExportersConfig {
    /// OTLP exporter settings.
    pub otlp: OtlpExporterConfig,
}

/// OTLP exporter settings for logs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OtlpExporterConfig {
    /// Whether log export is enabled.
    pub enabled: bool,
    /// The gRPC endpoint of the collector.
    pub endpoint: Url,
}

impl Default for OtlpExporterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: Url::parse("http://localhost:4317").expect("default OTLP endpoint is valid"),
        }
    }
}
