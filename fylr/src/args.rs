use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// The fylr core services: AI gateway, ingestion workers, and generators.
#[derive(Debug, Parser)]
#[command(name = "fylr", version, about)]
pub struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, env = "FYLR_CONFIG", default_value = "fylr.toml")]
    pub config: PathBuf,

    /// Log filter, e.g. "info" or "gateway=debug,ingest=debug".
    #[arg(long, env = "FYLR_LOG", default_value = "info")]
    pub log_filter: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the AI gateway HTTP server.
    Gateway,
    /// Run the file-ingestion worker.
    Ingestor,
    /// Run the re-ingestion worker.
    Reingestor,
    /// Run the summary and podcast generators.
    Generator,
}

impl Command {
    /// The default OTLP service name for this process.
    pub fn service_name(&self) -> &'static str {
        match self {
            Command::Gateway => "fylr-gateway",
            Command::Ingestor => "fylr-ingestor",
            Command::Reingestor => "fylr-reingestor",
            Command::Generator => "fylr-generator",
        }
    }
}
