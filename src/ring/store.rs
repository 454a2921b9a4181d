//! Persisted replica store of one ring node
//!
//! Layout under `data_dir/<node_id hex>/`:
//! - `<node_id hex>.node`  node identity (`address\nnode_id`)
//! - `<replica_id>`        seeding records, `ownerIP\nownerID\n` appended per new owner
//! - `<replica_id>.data`   latest written content of the replica, with its version (JSON)
//! - `tracked.json`        distribution working set of this node
//!
//! The in-memory maps are rebuilt from these files on open.

use crate::common::{
    NodeRef, PersistedReplicaRecord, ReplicaId, ReplicaRecord, ReplicaSeed, Result, TrackedFile,
    VersionedContent,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

const CONTENT_EXT: &str = "data";
const IDENTITY_EXT: &str = "node";
const TRACKED_FILE: &str = "tracked.json";

pub struct ReplicaStore {
    dir: PathBuf,
    holder: NodeRef,
    metadata: RwLock<HashMap<ReplicaId, ReplicaRecord>>,
    file_keys: RwLock<BTreeSet<ReplicaId>>,
    contents: RwLock<HashMap<ReplicaId, VersionedContent>>,
    tracked: RwLock<BTreeMap<String, Option<VersionedContent>>>,
}

impl ReplicaStore {
    /// Open or create the store of `holder` under `data_dir`
    pub async fn open(data_dir: impl AsRef<Path>, holder: NodeRef) -> Result<Self> {
        let dir = data_dir.as_ref().join(format!("{:016x}", holder.node_id));
        tokio::fs::create_dir_all(&dir).await?;

        let identity = dir.join(format!("{:016x}.{}", holder.node_id, IDENTITY_EXT));
        if !tokio::fs::try_exists(&identity).await? {
            tokio::fs::write(&identity, format!("{}\n{}", holder.address, holder.node_id))
                .await?;
        }

        let mut metadata = HashMap::new();
        let mut contents = HashMap::new();
        let mut tracked = BTreeMap::new();
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            if name == TRACKED_FILE {
                let files: Vec<TrackedFile> =
                    serde_json::from_str(&tokio::fs::read_to_string(&path).await?)?;
                tracked.extend(files.into_iter().map(|f| (f.filename, f.content)));
                continue;
            }

            if let Some(stem) = name.strip_suffix(&format!(".{}", CONTENT_EXT)) {
                let Some(id) = parse_replica_id(stem) else {
                    continue;
                };
                let text = tokio::fs::read_to_string(&path).await?;
                match serde_json::from_str::<VersionedContent>(&text) {
                    Ok(content) => {
                        contents.insert(id, content);
                    }
                    Err(e) => {
                        tracing::warn!("Ignoring unreadable content {}: {}", path.display(), e)
                    }
                }
                continue;
            }

            let Some(id) = parse_replica_id(name) else {
                continue;
            };
            let text = tokio::fs::read_to_string(&path).await?;
            match last_owner(&text) {
                Some(owner) => {
                    metadata.insert(
                        id,
                        ReplicaRecord {
                            replica_id: id,
                            holder: holder.clone(),
                            seeded_by: owner,
                        },
                    );
                }
                None => tracing::warn!("Ignoring unreadable replica record {}", path.display()),
            }
        }

        if !metadata.is_empty() {
            tracing::info!(
                "Recovered {} replica records and {} tracked files for node {}",
                metadata.len(),
                tracked.len(),
                holder
            );
        }

        let file_keys = metadata.keys().copied().collect();
        Ok(Self {
            dir,
            holder,
            metadata: RwLock::new(metadata),
            file_keys: RwLock::new(file_keys),
            contents: RwLock::new(contents),
            tracked: RwLock::new(tracked),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn add_file_key(&self, id: ReplicaId) {
        self.file_keys.write().await.insert(id);
    }

    pub async fn file_keys(&self) -> Vec<ReplicaId> {
        self.file_keys.read().await.iter().copied().collect()
    }

    /// Record a seed for `id`. Returns true when a new owner line was appended.
    pub async fn record_seed(&self, id: ReplicaId, seed: &ReplicaSeed) -> Result<bool> {
        let appended = {
            let mut metadata = self.metadata.write().await;
            let unchanged = metadata
                .get(&id)
                .is_some_and(|record| record.seeded_by == seed.owner);

            if !unchanged {
                let mut file = tokio::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(self.record_path(id))
                    .await?;
                file.write_all(format!("{}\n{}\n", seed.owner.owner_ip, seed.owner.owner_id).as_bytes())
                    .await?;
                file.flush().await?;

                metadata.insert(
                    id,
                    ReplicaRecord {
                        replica_id: id,
                        holder: self.holder.clone(),
                        seeded_by: seed.owner.clone(),
                    },
                );
            }
            !unchanged
        };

        if let Some(content) = &seed.content {
            self.write_content(id, content).await?;
        }
        Ok(appended)
    }

    /// Store `content` unless a newer version is already held. Returns true when stored.
    pub async fn write_content(&self, id: ReplicaId, content: &VersionedContent) -> Result<bool> {
        let mut contents = self.contents.write().await;
        if contents
            .get(&id)
            .is_some_and(|held| held.version > content.version)
        {
            return Ok(false);
        }
        tokio::fs::write(self.content_path(id), serde_json::to_vec(content)?).await?;
        contents.insert(id, content.clone());
        Ok(true)
    }

    pub async fn content(&self, id: ReplicaId) -> Option<VersionedContent> {
        self.contents.read().await.get(&id).cloned()
    }

    pub async fn read_content(&self, id: ReplicaId) -> Option<String> {
        self.content(id).await.map(|c| c.content)
    }

    /// Add `filename` to the working set, keeping the newer of the known contents
    pub async fn track(&self, filename: &str, content: Option<VersionedContent>) -> Result<()> {
        let mut tracked = self.tracked.write().await;
        let entry = tracked.entry(filename.to_string()).or_insert(None);
        let newer = match (entry.as_ref(), content.as_ref()) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(held), Some(new)) => new.version >= held.version,
        };
        if newer {
            *entry = content;
        }

        let files: Vec<TrackedFile> = tracked
            .iter()
            .map(|(filename, content)| TrackedFile {
                filename: filename.clone(),
                content: content.clone(),
            })
            .collect();
        tokio::fs::write(self.dir.join(TRACKED_FILE), serde_json::to_vec(&files)?).await?;
        Ok(())
    }

    pub async fn tracked(&self) -> Vec<TrackedFile> {
        self.tracked
            .read()
            .await
            .iter()
            .map(|(filename, content)| TrackedFile {
                filename: filename.clone(),
                content: content.clone(),
            })
            .collect()
    }

    pub async fn record(&self, id: ReplicaId) -> Option<ReplicaRecord> {
        self.metadata.read().await.get(&id).cloned()
    }

    pub async fn metadata(&self) -> HashMap<ReplicaId, ReplicaRecord> {
        self.metadata.read().await.clone()
    }

    fn record_path(&self, id: ReplicaId) -> PathBuf {
        self.dir.join(id.to_string())
    }

    fn content_path(&self, id: ReplicaId) -> PathBuf {
        self.dir.join(format!("{}.{}", id, CONTENT_EXT))
    }
}

fn parse_replica_id(name: &str) -> Option<ReplicaId> {
    if name.len() != 16 {
        return None;
    }
    u64::from_str_radix(name, 16).ok().map(ReplicaId)
}

/// Last complete `ownerIP\nownerID` pair of a record file
fn last_owner(text: &str) -> Option<PersistedReplicaRecord> {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let pair = lines.chunks_exact(2).last()?;
    Some(PersistedReplicaRecord {
        owner_ip: pair[0].trim().to_string(),
        owner_id: pair[1].trim().parse().ok()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ContentVersion;
    use tempfile::TempDir;

    fn versioned(clock: u64, content: &str) -> VersionedContent {
        VersionedContent {
            version: ContentVersion { clock, origin: 1 },
            content: content.to_string(),
        }
    }

    fn seed(owner: &str, content: Option<&str>) -> ReplicaSeed {
        ReplicaSeed {
            owner: PersistedReplicaRecord::from(&NodeRef::new(owner)),
            content: content.map(|c| versioned(1, c)),
        }
    }

    #[tokio::test]
    async fn test_open_writes_identity_file() {
        let dir = TempDir::new().unwrap();
        let holder = NodeRef::new("process1");
        let store = ReplicaStore::open(dir.path(), holder.clone()).await.unwrap();

        let hex = format!("{:016x}", holder.node_id);
        assert_eq!(store.dir(), dir.path().join(&hex));
        let text = std::fs::read_to_string(store.dir().join(format!("{}.node", hex))).unwrap();
        assert_eq!(text, format!("process1\n{}", holder.node_id));
    }

    #[tokio::test]
    async fn test_stale_content_is_not_stored() {
        let dir = TempDir::new().unwrap();
        let store = ReplicaStore::open(dir.path(), NodeRef::new("process1"))
            .await
            .unwrap();
        let id = ReplicaId(9);

        assert!(store.write_content(id, &versioned(5, "new")).await.unwrap());
        assert!(!store.write_content(id, &versioned(3, "old")).await.unwrap());
        assert_eq!(store.read_content(id).await.unwrap(), "new");
        assert!(store.write_content(id, &versioned(5, "new")).await.unwrap());
    }

    #[tokio::test]
    async fn test_tracked_files_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let holder = NodeRef::new("process1");
        {
            let store = ReplicaStore::open(dir.path(), holder.clone()).await.unwrap();
            store.track("a.txt", None).await.unwrap();
            store.track("b.txt", Some(versioned(4, "four"))).await.unwrap();
            store.track("b.txt", Some(versioned(2, "two"))).await.unwrap();
            store.track("b.txt", None).await.unwrap();
        }

        let store = ReplicaStore::open(dir.path(), holder).await.unwrap();
        let tracked = store.tracked().await;
        assert_eq!(tracked.len(), 2);
        assert_eq!(tracked[0].filename, "a.txt");
        assert!(tracked[0].content.is_none());
        assert_eq!(tracked[1].content.as_ref().unwrap().content, "four");
    }

    #[tokio::test]
    async fn test_reseed_appends_only_on_new_owner() {
        let dir = TempDir::new().unwrap();
        let store = ReplicaStore::open(dir.path(), NodeRef::new("process1"))
            .await
            .unwrap();
        let id = ReplicaId(42);

        assert!(store.record_seed(id, &seed("process1", None)).await.unwrap());
        assert!(!store.record_seed(id, &seed("process1", None)).await.unwrap());
        assert!(store.record_seed(id, &seed("process2", None)).await.unwrap());

        let text = std::fs::read_to_string(store.dir().join(id.to_string())).unwrap();
        assert_eq!(text.lines().count(), 4);
        assert_eq!(
            store.record(id).await.unwrap().seeded_by.owner_ip,
            "process2"
        );
    }

    #[tokio::test]
    async fn test_reopen_recovers_metadata_and_content() {
        let dir = TempDir::new().unwrap();
        let holder = NodeRef::new("process1");
        {
            let store = ReplicaStore::open(dir.path(), holder.clone()).await.unwrap();
            store
                .record_seed(ReplicaId(7), &seed("process2", Some("hello")))
                .await
                .unwrap();
        }

        let store = ReplicaStore::open(dir.path(), holder.clone()).await.unwrap();
        let record = store.record(ReplicaId(7)).await.unwrap();
        assert_eq!(record.holder, holder);
        assert_eq!(record.seeded_by.owner_ip, "process2");
        assert_eq!(store.read_content(ReplicaId(7)).await.unwrap(), "hello");
        assert_eq!(store.file_keys().await, vec![ReplicaId(7)]);
    }

    #[test]
    fn test_last_owner() {
        assert_eq!(
            last_owner("a\n1\nb\n2\n"),
            Some(PersistedReplicaRecord {
                owner_ip: "b".into(),
                owner_id: 2
            })
        );
        assert_eq!(last_owner("a\n"), None);
        assert_eq!(last_owner("a\nnot-a-number\n"), None);
    }
}
