use args::{Args, Command};
use clap::Parser;

mod args;
mod logger;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // A bad configuration or unreachable dependency is fatal: exit 1 before
    // consuming anything.
    let config = config::Config::load(&args.config)
        .map_err(|e| anyhow::anyhow!("Failed to load configuration from {}: {e}", args.config.display()))?;

    let otel = telemetry::init_logs(&config.telemetry, args.command.service_name())?;

    let (appender, _logs_guard) = match otel {
        Some((appender, guard)) => (Some(appender), Some(guard)),
        None => (None, None),
    };

    logger::init(&args.log_filter, appender);

    log::info!("fylr {} ({})", env!("CARGO_PKG_VERSION"), args.command.service_name());

    match args.command {
        Command::Gateway => serve_gateway(&config).await,
        Command::Ingestor => ingest::worker::run(&config).await,
        Command::Reingestor => ingest::reingest::run(&config).await,
        Command::Generator => generate::run(&config).await,
    }
}

async fn serve_gateway(config: &config::Config) -> anyhow::Result<()> {
    let router = gateway::router(config)?;

    let listen_address = config.server.listen_address();
    let listener = tokio::net::TcpListener::bind(listen_address).await?;

    log::info!("AI gateway listening on {listen_address}");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log::info!("AI gateway shut down cleanly");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {e}");
    }
}
