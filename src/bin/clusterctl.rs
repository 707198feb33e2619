//! CLI for volume metadata and the coordination store

use anyhow::Context;
use clap::{Parser, Subcommand};
use clusterd::common::{parse_duration, Config};
use clusterd::ops::{find_brick_conflicts, verify_volumes};
use clusterd::supervisor::{HealthProbe, ProbeResult};
use clusterd::{Brick, EtcdClient, VolumeFilter, VolumeRepository};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "clusterctl")]
#[command(about = "clusterd control CLI")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to $CLUSTERD_CONFIG or ./clusterd.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Coordination store client URLs (comma-separated), overriding the configuration
    #[arg(long, value_delimiter = ',')]
    endpoints: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Volume metadata
    Volume {
        #[command(subcommand)]
        command: VolumeCommands,
    },

    /// Check every volume record for corruption and shared bricks
    Verify,

    /// Coordination store
    Store {
        #[command(subcommand)]
        command: StoreCommands,
    },
}

#[derive(Subcommand)]
enum VolumeCommands {
    /// List volumes, optionally filtered on metadata
    List {
        /// Metadata key that must be present
        #[arg(long)]
        key: Option<String>,

        /// Metadata value that must be present
        #[arg(long)]
        value: Option<String>,
    },

    /// Show one volume as JSON
    Info {
        name: String,
    },

    /// Delete a volume record
    Delete {
        name: String,
    },

    /// List the bricks of every volume
    Bricks,

    /// Check that a brick belongs to a volume
    CheckBrick {
        name: String,

        #[arg(long)]
        host: String,

        #[arg(long)]
        path: String,
    },

    /// Report which of the given bricks (host:/path) are already in use
    Conflicts {
        #[arg(required = true)]
        bricks: Vec<String>,
    },

    /// Whether another replicating volume is started
    SafeToModify {
        name: String,
    },
}

#[derive(Subcommand)]
enum StoreCommands {
    /// Probe the health endpoint of the store
    Health {
        /// Probe timeout
        #[arg(long, default_value = "2s")]
        timeout: String,
    },
}

/// `host:/path`. Hosts (IPv6 literals included) never contain `/`, so the
/// first `:/` ends the host.
fn parse_brick(raw: &str) -> anyhow::Result<Brick> {
    let (host, rest) = raw
        .split_once(":/")
        .filter(|(host, _)| !host.is_empty())
        .with_context(|| format!("brick must be host:/path, got {}", raw))?;
    Ok(Brick::new(host, format!("/{}", rest)))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(&path.to_string_lossy())?,
        None => Config::load()?,
    };
    let endpoints = if cli.endpoints.is_empty() {
        config.store_endpoints(&config.supervisor.launch_urls())
    } else {
        cli.endpoints.clone()
    };

    let client = EtcdClient::new(endpoints.clone(), config.store.request_timeout())?;
    let repo = VolumeRepository::new(Arc::new(client));

    match cli.command {
        Commands::Volume { command } => match command {
            VolumeCommands::List { key, value } => {
                let filter = VolumeFilter { key, value };
                for vol in repo.list_filtered(&filter).await? {
                    println!(
                        "{}\t{}\t{}\t{}\t{} bricks",
                        vol.name,
                        vol.id,
                        vol.vol_type,
                        vol.state,
                        vol.bricks.len()
                    );
                }
            }

            VolumeCommands::Info { name } => {
                let vol = repo.get(&name).await?;
                println!("{}", serde_json::to_string_pretty(&vol)?);
            }

            VolumeCommands::Delete { name } => {
                repo.delete(&name).await?;
                println!("Deleted {}", name);
            }

            VolumeCommands::Bricks => {
                for brick in repo.all_bricks().await? {
                    println!("{}", brick);
                }
            }

            VolumeCommands::CheckBrick { name, host, path } => {
                let vol = repo.get(&name).await?;
                match repo.validate_brick_location(&vol, &host, &path) {
                    Ok(()) => println!("{}:{} is a brick of {}", host, path, name),
                    Err(e) if e.is_brick_location() => {
                        println!("{}", e);
                        std::process::exit(1);
                    }
                    Err(e) => return Err(e.into()),
                }
            }

            VolumeCommands::Conflicts { bricks } => {
                let candidates = bricks
                    .iter()
                    .map(|b| parse_brick(b))
                    .collect::<anyhow::Result<Vec<_>>>()?;
                let conflicts = find_brick_conflicts(&repo, &candidates).await?;
                if conflicts.is_empty() {
                    println!("No conflicts");
                } else {
                    for brick in &conflicts {
                        println!("In use: {}", brick);
                    }
                    std::process::exit(1);
                }
            }

            VolumeCommands::SafeToModify { name } => {
                let vol = repo.get(&name).await?;
                println!("{}", repo.safe_to_modify(vol.id).await?);
            }
        },

        Commands::Verify => {
            let report = verify_volumes(&repo).await?;
            println!("Verification report:");
            println!("  Total records: {}", report.total_records);
            println!("  Healthy: {}", report.healthy);
            println!("  Corrupted: {}", report.corrupted.len());
            for key in &report.corrupted {
                println!("    {}", key);
            }
            println!("  Invalid: {}", report.invalid.len());
            for (name, reason) in &report.invalid {
                println!("    {}: {}", name, reason);
            }
            println!("  Shared bricks: {}", report.shared_bricks.len());
            for (brick, volumes) in &report.shared_bricks {
                println!("    {} ({})", brick, volumes.join(", "));
            }
            if !report.is_clean() {
                std::process::exit(1);
            }
        }

        Commands::Store { command } => match command {
            StoreCommands::Health { timeout } => {
                let timeout = parse_duration(&timeout)?;
                let mut healthy = true;
                for endpoint in &endpoints {
                    let result = HealthProbe::new(endpoint)?.check(timeout).await;
                    println!("{}\t{:?}", endpoint, result);
                    healthy &= result == ProbeResult::Healthy;
                }
                if !healthy {
                    std::process::exit(1);
                }
            }
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_brick() {
        assert_eq!(parse_brick("node1:/bricks/b1").unwrap(), Brick::new("node1", "/bricks/b1"));
        assert_eq!(parse_brick("fe80::1:/b").unwrap(), Brick::new("fe80::1", "/b"));
        assert_eq!(
            parse_brick("[fd00::2]:/data/b:1").unwrap(),
            Brick::new("[fd00::2]", "/data/b:1")
        );
        assert_eq!(parse_brick("n1:/a:/b").unwrap(), Brick::new("n1", "/a:/b"));
        assert!(parse_brick("node1").is_err());
        assert!(parse_brick(":/b").is_err());
    }
}
