//! Objgate Server - object gateway over a line-oriented TCP protocol.
//!
//! Serves the demonstration catalog from [`demo`]. Once bound, the chosen
//! port is printed on stdout as `GATEWAY_PORT=<port>` so a parent process
//! can discover it when started with `--port 0`.

mod demo;

use anyhow::{Context, Result};
use clap::Parser;
use objgate_core::{Dispatcher, GatewayServer, ServerConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "objgate-server")]
#[command(about = "Line-oriented TCP gateway to registered objects")]
struct Args {
    /// Port to listen on (0 = auto-assign)
    #[arg(short, long)]
    port: Option<u16>,

    /// Host to bind to
    #[arg(long)]
    host: Option<String>,

    /// Number of worker tasks serving connections
    #[arg(short, long)]
    workers: Option<usize>,

    /// Connections allowed to wait for a worker before new ones get BUSY
    #[arg(long)]
    max_waiting: Option<usize>,

    /// JSON configuration file; command-line flags take precedence
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

/// Merge the optional config file with command-line overrides.
fn resolve_config(args: &Args) -> Result<ServerConfig> {
    let base = match &args.config {
        Some(path) => load_config_file(path)?,
        None => ServerConfig::default(),
    };

    let config = ServerConfig::with_host(
        args.host.clone().unwrap_or_else(|| base.host().to_string()),
        args.port.unwrap_or(base.port()),
        args.workers.unwrap_or(base.workers()),
        args.max_waiting.unwrap_or(base.max_waiting()),
    )?;
    Ok(config)
}

fn load_config_file(path: &Path) -> Result<ServerConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read config file {}", path.display()))?;
    let config: ServerConfig = serde_json::from_str(&text)
        .with_context(|| format!("invalid config file {}", path.display()))?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    info!("Starting objgate server");

    let config = resolve_config(&args)?;
    let catalog = demo::catalog()?;
    info!("Serving {} registered types", catalog.len());

    let dispatcher = Arc::new(Dispatcher::new(catalog));
    let server = GatewayServer::start(&config, dispatcher).await?;

    // Port discovery line for parent processes (intentional stdout)
    println!("GATEWAY_PORT={}", server.port());

    info!("Gateway running on {}", server.addr());

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, draining workers");
    server.shutdown().await;

    Ok(())
}
