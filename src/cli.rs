use crate::app_state::AppState;
use crate::config_loader::{load_config, FilterConfig};
use crate::content_filter::ContentFilter;
use crate::filterweb::build_filter_router;
use crate::log_sink::init_logging;
use crate::model_store::{fingerprint, ModelFiles};
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

/// Top-level CLI interface for the content filter
#[derive(Parser)]
#[command(
    name = "content_filter",
    version,
    about = "Classify text as allowed or blocked, with token attributions"
)]
pub struct Cli {
    /// TOML config file (defaults to $FILTER_CONFIG, then content_filter.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the HTTP API (filter endpoint, status, health)
    Serve {
        /// Host/IP to bind, overrides server.host
        #[arg(long)]
        host: Option<String>,
        /// Port to bind, overrides server.port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Classify one piece of text and print the verdict as JSON
    Classify {
        #[arg(short, long)]
        text: String,
        /// Skip the attribution pass
        #[arg(long)]
        no_explain: bool,
    },
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = load_config(cli.config.as_deref()).context("Failed to load config")?;
    init_logging(&config.logging)?;

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            serve(config)
        }
        Commands::Classify { text, no_explain } => classify(&config, &text, no_explain),
    }
}

/// Resolve files and build the filter. Slow: downloads and maps weights.
fn load_filter(config: &FilterConfig) -> anyhow::Result<(ContentFilter, Option<String>)> {
    let files = ModelFiles::resolve(&config.model)?;
    let weights_fingerprint = match fingerprint(&files.weights_path) {
        Ok(fp) => Some(fp),
        Err(e) => {
            tracing::warn!("Could not fingerprint model weights: {e}");
            None
        }
    };
    let filter = ContentFilter::load(config, &files).context("Failed to load classifier")?;
    Ok((filter, weights_fingerprint))
}

fn serve(config: FilterConfig) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let socket_addr: std::net::SocketAddr = addr
        .parse()
        .with_context(|| format!("Invalid bind address {addr}"))?;

    let (filter, weights_fingerprint) = load_filter(&config)?;
    let state = Arc::new(AppState::new(filter, weights_fingerprint));
    let app = build_filter_router(state);

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build Tokio runtime")?;

    rt.block_on(async move {
        let listener = tokio::net::TcpListener::bind(socket_addr)
            .await
            .with_context(|| format!("Failed to bind {addr}"))?;
        tracing::info!("HTTP server listening on http://{addr}");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("Server error")?;

        tracing::info!("Server stopped");
        Ok(())
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}

fn classify(config: &FilterConfig, text: &str, no_explain: bool) -> anyhow::Result<()> {
    let (filter, _) = load_filter(config)?;

    let output = if no_explain {
        let predictions = filter.predict(text)?;
        let blocked = filter.policy().is_blocked(&predictions);
        serde_json::json!({ "predictions": predictions, "blocked": blocked })
    } else {
        serde_json::to_value(filter.evaluate(text)?)?
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
