//! Replica key generation

use crate::common::{replica_ids, Error, ReplicaId, Result};

/// Derives the N ring keys of a file. N is fixed for the generator's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplicaKeyGenerator {
    replicas: usize,
}

impl ReplicaKeyGenerator {
    pub fn new(replicas: usize) -> Result<Self> {
        if replicas == 0 {
            return Err(Error::InvalidConfig(
                "replication factor must be at least 1".into(),
            ));
        }
        Ok(Self { replicas })
    }

    pub fn replicas(&self) -> usize {
        self.replicas
    }

    pub fn generate(&self, filename: &str) -> Vec<ReplicaId> {
        // replicas >= 1 is checked in new()
        replica_ids(filename, self.replicas).unwrap_or_default()
    }
}
