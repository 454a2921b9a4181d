//! # chordfs
//!
//! Replicated file storage on a Chord identifier ring with:
//! - N replica keys per file, hashed onto the ring
//! - Periodic replica distribution to each key's current successor
//! - Quorum reads and writes coordinated by a randomly chosen holder
//! - HTTP/JSON RPC between ring nodes
//!
//! ## Architecture

#![allow(clippy::result_large_err)]
//!
//! ```text
//!               hash(filename + i), i in 0..N
//!                          │
//!        ┌─────────────────▼──────────────────┐
//!        │          Identifier ring           │
//!        │  successor(key) = first id >= key  │
//!        └──┬──────────────┬───────────────┬──┘
//!           │              │               │
//!     ┌─────▼─────┐  ┌─────▼─────┐  ┌──────▼────┐
//!     │  Node A   │  │  Node B   │  │  Node C   │
//!     │ records + │  │ records + │  │ records + │
//!     │ vote table│  │ vote table│  │ vote table│
//!     └───────────┘  └───────────┘  └───────────┘
//! ```
//!
//! ## Usage
//!
//! ### Start a ring node
//! ```bash
//! chordfs-node serve \
//!   --address process1:9091 \
//!   --data-dir ./data \
//!   --seeds process1:9091,process2:9091,process3:9091 \
//!   --files notes.txt
//! ```
//!
//! ### Use the CLI
//! ```bash
//! # Quorum write through a node
//! chordfs --node process1:9091 write notes.txt --content "hello"
//!
//! # Quorum read
//! chordfs --node process1:9091 read notes.txt
//!
//! # Current holders of a file
//! chordfs --node process1:9091 resolve notes.txt
//! ```

pub mod common;
pub mod replica;
pub mod ring;

// Re-export commonly used types
pub use common::{Error, NodeConfig, Result};
pub use replica::{QuorumCoordinator, ReplicaDistributor};
pub use ring::{LocalNode, NodeServer};

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build info
pub const BUILD_INFO: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("CARGO_PKG_NAME"), ")");
