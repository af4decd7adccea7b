// Local metadata for pages tracked by the synchronization engine
use std::path::PathBuf;
use thiserror::Error;

mod storage;
mod tracker;
mod types;

pub use storage::{cache_dir, FileStorage, InMemoryStorage, MetadataStore, CACHE_DIR_NAME};
pub use tracker::ResourceTracker;
pub use types::*;

// Error Types
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid resource id: {0:?}")]
    InvalidId(String),
}

impl TrackerError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TrackerError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, TrackerError>;
