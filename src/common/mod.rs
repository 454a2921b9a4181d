//! Common utilities and types shared across chordfs

pub mod config;
pub mod error;
pub mod hash;
pub mod types;
pub mod utils;

pub use config::NodeConfig;
pub use error::{Error, Result};
pub use hash::{hash_of, replica_ids};
pub use types::{
    ActiveNodeSet, Ballot, ContentVersion, NodeRef, OperationType, PersistedReplicaRecord,
    ReplicaId, ReplicaRecord, ReplicaSeed, Tally, TrackedFile, VersionedContent,
};
pub use utils::{parse_duration, validate_filename};
