//! Ring node binary

use chordfs::common::parse_duration;
use chordfs::{NodeConfig, NodeServer};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "chordfs-node")]
#[command(about = "chordfs ring node with quorum-replicated files")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a ring node
    Serve {
        /// TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Advertised address (host:port)
        #[arg(long)]
        address: Option<String>,

        /// Bind address for the RPC server
        #[arg(long)]
        bind: Option<String>,

        /// Data directory
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Replication factor
        #[arg(long)]
        replicas: Option<usize>,

        /// Distribution interval (e.g. 3s, 500ms)
        #[arg(long)]
        interval: Option<String>,

        /// Ring members (comma-separated)
        #[arg(long, value_delimiter = ',')]
        seeds: Vec<String>,

        /// Files to distribute from startup (comma-separated)
        #[arg(long, value_delimiter = ',')]
        files: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            config,
            address,
            bind,
            data_dir,
            replicas,
            interval,
            seeds,
            files,
        } => {
            // File and environment first, command line wins
            let mut node_config = NodeConfig::load(config.as_deref())?;
            if let Some(address) = address {
                node_config.address = address;
            }
            if let Some(bind) = bind {
                node_config.bind_addr = bind.parse()?;
            }
            if let Some(data_dir) = data_dir {
                node_config.data_dir = data_dir;
            }
            if let Some(replicas) = replicas {
                node_config.replicas = replicas;
            }
            if let Some(interval) = interval {
                node_config.distribution_interval_ms = parse_duration(&interval)?.as_millis() as u64;
            }
            if !seeds.is_empty() {
                node_config.seeds = seeds;
            }
            if !files.is_empty() {
                node_config.files = files;
            }
            node_config.validate()?;

            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| node_config.log_level.clone().into()),
                )
                .with(tracing_subscriber::fmt::layer())
                .init();

            tokio::fs::create_dir_all(&node_config.data_dir).await?;

            NodeServer::new(node_config).serve().await?;
        }
    }

    Ok(())
}
