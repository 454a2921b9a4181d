//! Hashing utilities for chordfs
//!
//! - BLAKE3 truncated to 64 bits places node addresses and replica keys on the ring
//! - Replica keys are derived from `filename || index`

use crate::common::{Error, ReplicaId, Result};

/// Map an arbitrary string onto the 2^64 identifier ring
pub fn hash_of(value: &str) -> u64 {
    let hash = blake3::hash(value.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash.as_bytes()[0..8]);
    u64::from_le_bytes(bytes)
}

/// Derive the N replica identifiers of a file, in index order.
///
/// Pure function of `(filename, replicas)`; a larger factor extends the
/// sequence without changing its prefix.
pub fn replica_ids(filename: &str, replicas: usize) -> Result<Vec<ReplicaId>> {
    if replicas == 0 {
        return Err(Error::InvalidConfig(
            "replication factor must be at least 1".into(),
        ));
    }

    Ok((0..replicas)
        .map(|index| ReplicaId(hash_of(&format!("{}{}", filename, index))))
        .collect())
}
