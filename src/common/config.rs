//! Configuration for chordfs nodes

use crate::common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix for environment overrides (`CHORDFS_REPLICAS=3`, `CHORDFS_SEEDS=a:1,b:2`)
pub const ENV_PREFIX: &str = "CHORDFS";

/// Ring node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Advertised address (`host:port`); its hash is the node id
    pub address: String,

    /// Bind address for the RPC server
    pub bind_addr: SocketAddr,

    /// Root of the per-node data directories
    pub data_dir: PathBuf,

    /// Replication factor (N)
    pub replicas: usize,

    /// Replica distribution interval
    pub distribution_interval_ms: u64,

    /// Addresses of every ring member (static tracker)
    pub seeds: Vec<String>,

    /// Files whose replicas this node distributes from startup
    pub files: Vec<String>,

    /// Client timeout for remote node calls
    pub request_timeout_ms: u64,

    /// Logging level
    pub log_level: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:9091".to_string(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 9091)),
            data_dir: PathBuf::from("./data"),
            replicas: 4,
            distribution_interval_ms: 3000,
            seeds: Vec::new(),
            files: Vec::new(),
            request_timeout_ms: 10_000,
            log_level: "info".to_string(),
        }
    }
}

impl NodeConfig {
    /// Load defaults, then an optional TOML file, then `CHORDFS_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path.to_path_buf())
                    .format(config::FileFormat::Toml)
                    .required(false),
            );
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("seeds")
                    .with_list_parse_key("files"),
            )
            .build()?;

        let config: NodeConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.replicas == 0 {
            return Err(Error::InvalidConfig(
                "replication factor must be at least 1".into(),
            ));
        }
        if self.distribution_interval_ms == 0 {
            return Err(Error::InvalidConfig(
                "distribution interval must be positive".into(),
            ));
        }
        if self.address.trim().is_empty() {
            return Err(Error::InvalidConfig("node address cannot be empty".into()));
        }
        Ok(())
    }

    pub fn distribution_interval(&self) -> Duration {
        Duration::from_millis(self.distribution_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Seed list with this node's own address always present.
    pub fn ring_members(&self) -> Vec<String> {
        let mut members = self.seeds.clone();
        if !members.iter().any(|m| m == &self.address) {
            members.push(self.address.clone());
        }
        members
    }
}
