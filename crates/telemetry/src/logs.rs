//! OpenTelemetry logs integration with logforth.

use std::{sync::Arc, time::SystemTime};

use anyhow::Result;
use config::TelemetryConfig;
use log::{Level, Record};
use logforth::{append::Append, diagnostic::Diagnostic};
use opentelemetry::{
    InstrumentationScope, KeyValue,
    logs::{LogRecord, Logger, LoggerProvider, Severity},
};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    Resource,
    logs::{BatchLogProcessor, LoggerProviderBuilder, SdkLoggerProvider},
};

/// Guard that ensures proper cleanup of logs resources.
pub struct LogsGuard {
    provider: SdkLoggerProvider,
}

impl LogsGuard {
    /// Force flush all pending logs immediately.
    pub fn force_flush(&self) -> Result<()> {
        self.provider
            .force_flush()
            .map_err(|errs| anyhow::anyhow!("Failed to flush logs: {:?}", errs))
    }
}

impl Drop for LogsGuard {
    fn drop(&mut self) {
        if let Err(e) = self.provider.shutdown() {
            log::error!("Failed to shutdown logs provider: {e}");
        }
    }
}

/// OpenTelemetry logs appender for logforth.
#[derive(Clone)]
pub struct OtelLogsAppender {
    provider: Arc<SdkLoggerProvider>,
    scope: InstrumentationScope,
}

impl std::fmt::Debug for OtelLogsAppender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OtelLogsAppender")
            .field("scope", &self.scope.name())
            .finish()
    }
}

impl OtelLogsAppender {
    fn new(provider: SdkLoggerProvider, service_name: String) -> Self {
        let scope = InstrumentationScope::builder(service_name).build();

        Self {
            provider: Arc::new(provider),
            scope,
        }
    }

    fn map_level(level: Level) -> Severity {
        match level {
            Level::Error => Severity::Error,
            Level::Warn => Severity::Warn,
            Level::Info => Severity::Info,
            Level::Debug => Severity::Debug,
            Level::Trace => Severity::Trace,
        }
    }
}

impl Append for OtelLogsAppender {
    fn append(&self, record: &Record<'_>, _diagnostics: &[Box<dyn Diagnostic>]) -> anyhow::Result<()> {
        let logger = self.provider.logger_with_scope(self.scope.clone());

        let mut log_record = logger.create_log_record();

        log_record.set_observed_timestamp(SystemTime::now());
        log_record.set_severity_number(Self::map_level(record.level()));
        log_record.set_severity_text(record.level().as_str());
        log_record.set_body(record.args().to_string().into());

        let mut attributes = Vec::new();

        if let Some(module) = record.module_path() {
            attributes.push(("code.namespace", module.to_string()));
        }

        if let Some(file) = record.file() {
            attributes.push(("code.filepath", file.to_string()));

            if let Some(line) = record.line() {
                attributes.push(("code.lineno", line.to_string()));
            }
        }

        if !attributes.is_empty() {
            log_record.add_attributes(attributes);
        }

        logger.emit(log_record);

        Ok(())
    }

    fn flush(&self) -> anyhow::Result<()> {
        self.provider
            .force_flush()
            .map_err(|errs| anyhow::anyhow!("Failed to flush logs: {:?}", errs))
    }
}

/// Initialize the OTLP logs pipeline when the exporter is enabled. Returns
/// the logforth appender plus the guard that flushes on shutdown.
pub fn init_logs(config: &TelemetryConfig, default_service: &str) -> Result<Option<(OtelLogsAppender, LogsGuard)>> {
    if !config.exporters.otlp.enabled {
        return Ok(None);
    }

    let service_name = config
        .service_name
        .clone()
        .unwrap_or_else(|| default_service.to_string());

    let resource = Resource::builder()
        .with_attribute(KeyValue::new("service.name", service_name.clone()))
        .build();

    let exporter = opentelemetry_otlp::LogExporter::builder()
        .with_tonic()
        .with_endpoint(config.exporters.otlp.endpoint.to_string())
        .build()?;

    let batch_processor = BatchLogProcessor::builder(exporter).build();

    let provider = LoggerProviderBuilder::default()
        .with_resource(resource)
        .with_log_processor(batch_processor)
        .build();

    let appender = OtelLogsAppender::new(provider.clone(), service_name);
    let guard = LogsGuard { provider };

    log::debug!(
        "OTLP logs exporter initialized to {}",
        config.exporters.otlp.endpoint
    );

    Ok(Some((appender, guard)))
}
