//! CLI for quorum operations against a running ring

use chordfs::common::{parse_duration, ReplicaId};
use chordfs::replica::{QuorumCoordinator, QuorumOutcome, ReplicaDistributor, ReplicaKeyGenerator};
use chordfs::ring::{HttpLocator, Locator, RemoteNode, RingNode};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "chordfs")]
#[command(about = "chordfs replicated file storage CLI")]
#[command(version)]
struct Cli {
    /// Ring node that issues the requests
    #[arg(long, default_value = "127.0.0.1:9091")]
    node: String,

    /// Replication factor
    #[arg(long, default_value = "4")]
    replicas: usize,

    /// Timeout for each node call
    #[arg(long, default_value = "10s")]
    timeout: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Quorum read of a file
    Read {
        /// File name
        filename: String,
    },

    /// Quorum write of a file
    Write {
        /// File name
        filename: String,

        /// Inline content
        #[arg(long, conflicts_with = "file")]
        content: Option<String>,

        /// Read content from a local file
        #[arg(long)]
        file: Option<std::path::PathBuf>,
    },

    /// List the nodes currently holding a file
    Resolve {
        /// File name
        filename: String,
    },

    /// Add a file to the issuing node's working set and run one distribution pass for it
    Distribute {
        /// File name
        filename: String,
    },

    /// Dump the replica metadata of the issuing node
    Metadata,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let timeout = parse_duration(&cli.timeout)?;
    let locator: Arc<dyn Locator> = Arc::new(HttpLocator::new(timeout)?);
    let node: Arc<dyn RingNode> = Arc::new(RemoteNode::new(&cli.node, http_client(timeout)?));
    let keys = ReplicaKeyGenerator::new(cli.replicas)?;
    let distributor = Arc::new(ReplicaDistributor::new(
        node.clone(),
        locator.clone(),
        keys,
        Duration::from_secs(3),
    )?);

    match cli.command {
        Commands::Read { filename } => {
            let coordinator = QuorumCoordinator::new(node, locator, distributor);
            let outcome = coordinator.read(&filename).await?;
            print_outcome("READ", &filename, &outcome);
            if let Some(content) = outcome.content() {
                println!("{}", content);
            }
            exit_on_abort(&outcome);
        }

        Commands::Write {
            filename,
            content,
            file,
        } => {
            let content = match (content, file) {
                (Some(content), _) => content,
                (None, Some(path)) => tokio::fs::read_to_string(path).await?,
                (None, None) => anyhow::bail!("either --content or --file is required"),
            };
            let coordinator = QuorumCoordinator::new(node, locator, distributor);
            let outcome = coordinator.write(&filename, &content).await?;
            print_outcome("WRITE", &filename, &outcome);
            exit_on_abort(&outcome);
        }

        Commands::Resolve { filename } => {
            let coordinator = QuorumCoordinator::new(node, locator, distributor);
            let active = coordinator.resolver().resolve(&filename).await?;
            println!("Active nodes for {}: {}", filename, active.len());
            for member in active.iter() {
                println!("  {}", member);
            }
        }

        Commands::Distribute { filename } => {
            let ids = distributor.track(&filename).await?;
            let report = distributor.distribute_file(&filename).await?;
            println!("Distribution report for {}:", filename);
            println!("  Replica keys: {}", format_ids(&ids));
            println!("  Placed: {}", report.placed);
            println!("  Skipped: {}", report.skipped);
            println!("  Failed: {}", report.failed);
        }

        Commands::Metadata => {
            let mut records: Vec<_> = node.metadata().await?.into_values().collect();
            records.sort_by_key(|r| r.replica_id);
            println!("Replica records on {}: {}", cli.node, records.len());
            for record in records {
                println!(
                    "  {} -> {} (seeded by {})",
                    record.replica_id, record.holder, record.seeded_by.owner_ip
                );
            }
        }
    }

    Ok(())
}

fn http_client(timeout: Duration) -> anyhow::Result<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

fn format_ids(ids: &[ReplicaId]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn print_outcome(operation: &str, filename: &str, outcome: &QuorumOutcome) {
    println!("{} {} ({}):", operation, filename, outcome.request_id);
    println!("  Coordinator: {}", outcome.coordinator);
    println!(
        "  Acknowledgements: {}/{}",
        outcome.tally.acks, outcome.tally.active
    );
    println!("  Acknowledged: {}", outcome.acknowledged);
}

fn exit_on_abort(outcome: &QuorumOutcome) {
    if !outcome.acknowledged {
        std::process::exit(2);
    }
}
