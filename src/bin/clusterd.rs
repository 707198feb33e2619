//! Cluster management daemon

use clap::Parser;
use clusterd::common::{retry_with_backoff, Config};
use clusterd::{EtcdClient, Supervisor, VolumeRepository};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "clusterd")]
#[command(about = "Cluster management daemon with a supervised coordination store")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to $CLUSTERD_CONFIG or ./clusterd.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level, overriding the configuration
    #[arg(long)]
    log_level: Option<String>,

    /// Stop the coordination store when the daemon exits
    #[arg(long)]
    stop_store_on_exit: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(&path.to_string_lossy())?,
        None => Config::load()?,
    };

    let level = cli.log_level.clone().unwrap_or_else(|| config.log_level.clone());
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| level.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(version = clusterd::VERSION, "Starting clusterd");

    let options = config.supervisor.resolve()?;
    let endpoints = config.store_endpoints(&options.urls);

    let mut supervisor = Supervisor::new(options);
    let identity = supervisor.start_initial().await.map_err(|e| {
        tracing::error!(error = %e, "Could not start the coordination store");
        e
    })?;
    tracing::info!(
        pid = identity.pid,
        client_url = %identity.client_url,
        peer_url = %identity.peer_url,
        "Coordination store ready"
    );

    let client = EtcdClient::new(endpoints, config.store.request_timeout())?;
    let repo = VolumeRepository::new(Arc::new(client));

    let volumes = retry_with_backoff(|| repo.list(), 5, Duration::from_millis(200)).await?;
    tracing::info!(count = volumes.len(), "Volume metadata loaded");
    for vol in &volumes {
        tracing::debug!(volume = %vol.name, id = %vol.id, vol_type = %vol.vol_type, "Known volume");
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    if cli.stop_store_on_exit {
        supervisor.stop().await?;
    } else {
        tracing::info!(pid = identity.pid, "Leaving coordination store running");
    }

    Ok(())
}
