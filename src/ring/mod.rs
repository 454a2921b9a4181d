//! Ring node implementation
//!
//! Each participant:
//! - Resolves successors on the identifier ring
//! - Stores the replicas seeded to it (metadata map + per-node directory)
//! - Votes on quorum requests and guards its critical section
//! - Serves its RPC surface over HTTP

pub mod client;
pub mod http;
pub mod memory;
pub mod node;
pub mod rpc;
pub mod server;
pub mod store;
pub mod topology;
pub mod votes;

pub use client::{HttpLocator, RemoteNode};
pub use memory::MemoryNetwork;
pub use node::LocalNode;
pub use rpc::{Locator, RingNode};
pub use server::NodeServer;
pub use topology::{StaticRing, Topology};
