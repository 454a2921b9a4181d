//! Replica placement and quorum coordination
//!
//! The requesting side of the protocol:
//! - Replica key generation (N ring keys per file)
//! - Periodic distribution of replicas to their ring successors
//! - Resolution of the nodes currently holding a file
//! - Vote, lock, execute and release for one read or write

pub mod distributor;
pub mod keys;
pub mod operation;
pub mod quorum;
pub mod resolver;
pub mod select;

pub use distributor::{DistributionReport, ReplicaDistributor};
pub use keys::ReplicaKeyGenerator;
pub use operation::{FileOperation, OperationExecutor, OperationResult};
pub use quorum::{QuorumCoordinator, QuorumOutcome};
pub use resolver::ActiveNodeResolver;
pub use select::{CoordinatorSelector, RandomSelector, RoundRobinSelector};
