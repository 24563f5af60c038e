//! HTTP server binary for pdfsight.
//!
//! Serves the library's analysis pipeline over two routes:
//! `GET /ollama/models` and `POST /pdf/analyze`.

use anyhow::{Context, Result};
use clap::Parser;
use pdfsight::{server, AnalyzerConfig, PdfAnalyzer};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Serve PDF analysis over HTTP against a local Ollama instance.
#[derive(Parser, Debug)]
#[command(name = "pdfsight-server", version)]
struct Cli {
    /// Address to bind.
    #[arg(long, env = "PDFSIGHT_BIND", default_value = "127.0.0.1:8000")]
    bind: SocketAddr,

    /// Base URL of the Ollama instance.
    #[arg(
        long,
        env = "PDFSIGHT_OLLAMA_URL",
        default_value = "http://localhost:11434"
    )]
    url: String,

    /// Default vision model for the scan stage.
    #[arg(long, env = "PDFSIGHT_SCAN_MODEL")]
    scan_model: Option<String>,

    /// Default language model for the analysis stage.
    #[arg(long, env = "PDFSIGHT_ANALYSIS_MODEL")]
    analysis_model: Option<String>,

    /// Number of concurrent vision-model calls during the scan stage.
    #[arg(long, env = "PDFSIGHT_CONCURRENCY", default_value_t = 2)]
    concurrency: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let mut builder = AnalyzerConfig::builder()
        .ollama_base_url(&cli.url)
        .scan_concurrency(cli.concurrency);
    if let Some(m) = cli.scan_model {
        builder = builder.default_scan_model(m);
    }
    if let Some(m) = cli.analysis_model {
        builder = builder.default_analysis_model(m);
    }
    let config = builder.build().context("Invalid configuration")?;

    let analyzer =
        Arc::new(PdfAnalyzer::new(config).context("Failed to initialise the model client")?);
    let app = server::router(analyzer);

    let listener = tokio::net::TcpListener::bind(cli.bind)
        .await
        .with_context(|| format!("Failed to bind {}", cli.bind))?;
    info!("Listening on http://{} (Ollama at {})", cli.bind, cli.url);

    axum::serve(listener, app)
        .await
        .context("Server terminated")?;

    Ok(())
}
