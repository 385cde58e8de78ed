//! OpenTelemetry integration for the fylr services: an OTLP logs appender
//! pluggable into logforth.

mod logs;

pub use logs::{LogsGuard, OtelLogsAppender, init_logs};
