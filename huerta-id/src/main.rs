//! huerta-id - Plant identification service
//!
//! Identifies a plant photo by consulting several identification sources and
//! ranking their answers by consensus.
//!
//! - `huerta-id identify <IMAGE>` prints the chat-formatted answer (or JSON)
//! - `huerta-id serve` runs the HTTP API (default port 5740)
//! - `huerta-id sources` lists the sources that would be consulted

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{error, info};

use huerta_common::config::{load_toml_config, resolve_config_path, CONFIG_ENV_VAR};
use huerta_id::config::ServiceConfig;
use huerta_id::consensus::ConsensusAggregator;
use huerta_id::formatter::{ChatFormatter, ResultFormatter};
use huerta_id::AppState;

/// Command-line arguments for huerta-id
#[derive(Parser, Debug)]
#[command(name = "huerta-id")]
#[command(about = "Multi-source plant identification with consensus ranking")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Identify a single image file
    Identify {
        /// JPEG or PNG photo of the plant
        image: PathBuf,

        /// Print the full result as JSON instead of the chat message
        #[arg(long)]
        json: bool,
    },

    /// Run the HTTP API
    Serve {
        /// Port to listen on (overrides [server] port)
        #[arg(short, long, env = "HUERTA_PORT")]
        port: Option<u16>,
    },

    /// List enabled identification sources
    Sources,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref(), CONFIG_ENV_VAR);
    let mut config: ServiceConfig =
        load_toml_config(config_path.as_deref()).context("Failed to load configuration")?;

    huerta_common::logging::init(&config.logging).context("Failed to initialize logging")?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?config_path,
        "Starting huerta-id"
    );

    config.identifier.resolve_credentials();
    let aggregator = ConsensusAggregator::from_config(&config.identifier)
        .context("Invalid identification configuration")?;

    match args.command {
        Command::Identify { image, json } => identify_file(aggregator, image, json).await,
        Command::Serve { port } => {
            let port = port.unwrap_or(config.server.port);
            serve(aggregator, &config.server.host, port).await
        }
        Command::Sources => {
            for source in aggregator.enabled_sources() {
                println!(
                    "{:<16} weight {:.2}  ({})",
                    source.name, source.weight, source.provenance
                );
            }
            if aggregator.source_count() == 0 {
                println!("No identification sources enabled");
            }
            Ok(())
        }
    }
}

async fn identify_file(aggregator: ConsensusAggregator, image: PathBuf, json: bool) -> Result<()> {
    let bytes = tokio::fs::read(&image)
        .await
        .with_context(|| format!("Failed to read {}", image.display()))?;
    let filename = image
        .file_name()
        .map(|name| name.to_string_lossy().to_string());

    let result = aggregator
        .identify(bytes, filename)
        .await
        .with_context(|| format!("Cannot identify {}", image.display()))?;
    let formatted = ChatFormatter.format(&result);

    if json {
        let output = serde_json::json!({ "result": result, "formatted": formatted });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", formatted.message);
    }

    Ok(())
}

async fn serve(aggregator: ConsensusAggregator, host: &str, port: u16) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", host, port))?;

    let state = AppState::new(aggregator);
    let app = huerta_id::build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
