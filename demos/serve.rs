//! Serves the media catalog of a config file.
//!
//! ```text
//! cargo run --example serve -- --config media-range.toml --root ./media
//! curl -H 'Range: bytes=0-1023' http://localhost:8080/api/audios/1/stream
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use media_range::config;
use media_range::{FsStorage, PremiumGate, StreamingService};

#[derive(Parser)]
#[command(name = "serve")]
#[command(about = "Stream media files over HTTP with range request support")]
struct Cli {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host to bind to, overrides the config file
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on, overrides the config file
    #[arg(short, long)]
    port: Option<u16>,

    /// Directory holding the media files, overrides the config file
    #[arg(long)]
    root: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let mut config = config::load_config_or_default(cli.config.as_deref())?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(root) = cli.root {
        config.storage.root = root;
    }

    let catalog = Arc::new(config.catalog());
    tracing::info!(
        "Serving {} media items from {:?}",
        catalog.len(),
        config.storage.root
    );

    let service = StreamingService::new(
        catalog.clone(),
        PremiumGate::new(catalog),
        FsStorage::new(config.storage.root.clone()),
        config.streaming.resolver(),
    )
    .with_default_content_type(&config.streaming.default_content_type);

    let app = media_range::router(Arc::new(service));

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.server.host, config.server.port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    tracing::info!("Listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
