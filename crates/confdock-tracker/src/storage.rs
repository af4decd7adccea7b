use crate::{Result, TrackedResourceRecord, TrackerError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

pub const CACHE_DIR_NAME: &str = ".confluence";

/// `<workspace>/.confluence`, or the same directory under the system temp dir
/// when no workspace is open.
pub fn cache_dir(workspace: Option<&Path>) -> PathBuf {
    workspace
        .map(Path::to_path_buf)
        .unwrap_or_else(std::env::temp_dir)
        .join(CACHE_DIR_NAME)
}

#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn load(&self, id: &str) -> Result<Option<TrackedResourceRecord>>;
    async fn save(&self, record: &TrackedResourceRecord) -> Result<()>;
    async fn list(&self) -> Result<Vec<TrackedResourceRecord>>;

    /// Most recently synchronized record tracking `source`.
    async fn find_by_source(&self, source: &Path) -> Result<Option<TrackedResourceRecord>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|record| record.tracks(source))
            .max_by_key(|record| record.last_updated))
    }
}

fn check_id(id: &str) -> Result<()> {
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(TrackerError::InvalidId(id.to_string()))
    }
}

/// One pretty-printed JSON file per record, named `page_{id}.json`.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn for_workspace(workspace: Option<&Path>) -> Self {
        Self::new(cache_dir(workspace))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn record_path(&self, id: &str) -> Result<PathBuf> {
        check_id(id)?;
        Ok(self.dir.join(format!("page_{id}.json")))
    }
}

#[async_trait]
impl MetadataStore for FileStorage {
    async fn load(&self, id: &str) -> Result<Option<TrackedResourceRecord>> {
        let path = self.record_path(id)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(TrackerError::io(path, e)),
        }
    }

    async fn save(&self, record: &TrackedResourceRecord) -> Result<()> {
        let path = self.record_path(&record.id)?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| TrackerError::io(&self.dir, e))?;

        let json = serde_json::to_vec_pretty(record)?;
        // Write then rename; readers never observe a partial record.
        let staging = path.with_extension("json.tmp");
        tokio::fs::write(&staging, &json)
            .await
            .map_err(|e| TrackerError::io(&staging, e))?;
        tokio::fs::rename(&staging, &path)
            .await
            .map_err(|e| TrackerError::io(&path, e))?;

        debug!(path = %path.display(), version = record.version, "saved metadata");
        Ok(())
    }

    async fn list(&self) -> Result<Vec<TrackedResourceRecord>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(TrackerError::io(&self.dir, e)),
        };

        let mut records = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| TrackerError::io(&self.dir, e))?
        {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !(name.starts_with("page_") && name.ends_with(".json")) {
                continue;
            }
            let path = entry.path();
            let bytes = match tokio::fs::read(&path).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable metadata");
                    continue;
                }
            };
            match serde_json::from_slice(&bytes) {
                Ok(record) => records.push(record),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping corrupt metadata"),
            }
        }
        records.sort_by(|a: &TrackedResourceRecord, b| a.id.cmp(&b.id));
        Ok(records)
    }
}

// In-memory storage implementation for development/testing
#[derive(Debug, Default, Clone)]
pub struct InMemoryStorage {
    records: Arc<RwLock<HashMap<String, TrackedResourceRecord>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataStore for InMemoryStorage {
    async fn load(&self, id: &str) -> Result<Option<TrackedResourceRecord>> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn save(&self, record: &TrackedResourceRecord) -> Result<()> {
        check_id(&record.id)?;
        self.records
            .write()
            .await
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<TrackedResourceRecord>> {
        let mut records: Vec<_> = self.records.read().await.values().cloned().collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records)
    }
}
