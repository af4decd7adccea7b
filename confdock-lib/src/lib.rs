use confdock_common::{Cancelled, ContentFormat};
use confdock_sdk::ApiError;
use serde::Serialize;
use thiserror::Error;

pub mod context;
pub mod format;
pub mod sync;

pub use confdock_common as common;
pub use confdock_sdk as sdk;
pub use confdock_tracker as tracker;

pub use context::{Session, SessionConfig};
pub use format::format_for_remote;
pub use sync::{intents_for, IntentChoice, SyncEngine, SyncIntent};

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Page {0} was not found; it may have been deleted")]
    NotFound(String),
    #[error("Confluence rejected the credentials")]
    Unauthorized,
    #[error("Could not reach Confluence: {0}")]
    NetworkError(String),
    #[error("Page {id} changed remotely; writing version {attempted} conflicts. Re-import before exporting again")]
    VersionConflict { id: String, attempted: u64 },
    #[error("Confluence returned status {status}: {body}")]
    RemoteError { status: u16, body: String },
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Page {id} has no {format} body")]
    MissingBody { id: String, format: ContentFormat },
    #[error("Cancelled")]
    Cancelled,
}

impl From<Cancelled> for SyncError {
    fn from(_: Cancelled) -> Self {
        SyncError::Cancelled
    }
}

impl SyncError {
    /// Maps a failure while reading page `id`.
    pub fn from_fetch(id: &str, err: ApiError) -> Self {
        match err {
            ApiError::NotFound(_) => SyncError::NotFound(id.to_string()),
            other => Self::from_api(other),
        }
    }

    /// Maps a failure while writing `attempted` as the new version of `id`.
    pub fn from_write(id: &str, attempted: u64, err: ApiError) -> Self {
        match err {
            ApiError::Conflict { .. } => SyncError::VersionConflict {
                id: id.to_string(),
                attempted,
            },
            ApiError::NotFound(_) => SyncError::NotFound(id.to_string()),
            other => Self::from_api(other),
        }
    }

    /// Maps a failure while creating a page in `space_key`. No page exists
    /// yet, so neither a missing page nor a stale version applies.
    pub fn from_create(space_key: &str, err: ApiError) -> Self {
        match err {
            ApiError::NotFound(_) => SyncError::RemoteError {
                status: 404,
                body: format!("space {space_key} was not found or is not visible to this user"),
            },
            other => Self::from_api(other),
        }
    }

    fn from_api(err: ApiError) -> Self {
        match err {
            ApiError::Network(e) => SyncError::NetworkError(e.to_string()),
            ApiError::Decode(e) => SyncError::NetworkError(format!("invalid response: {e}")),
            ApiError::Unauthorized { .. } => SyncError::Unauthorized,
            ApiError::NotFound(target) => SyncError::NotFound(target),
            ApiError::Conflict { body } => SyncError::RemoteError { status: 409, body },
            ApiError::Status { status, body } => SyncError::RemoteError { status, body },
            ApiError::InvalidRequest(message) => SyncError::InvalidRequest(message),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, SyncError::Cancelled)
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SyncKind {
    Created,
    Updated,
}

/// Result of a successful export.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub kind: SyncKind,
    pub id: String,
    pub title: String,
    pub space_key: String,
    /// Version the remote page now has.
    pub version: u64,
    pub format: ContentFormat,
    pub url: String,
    /// Set when the remote write succeeded but local metadata could not be saved.
    pub cache_warning: Option<String>,
}

/// Result of a successful import.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ImportOutcome {
    pub id: String,
    pub title: String,
    pub version: u64,
    pub format: ContentFormat,
    pub content: String,
    pub url: String,
    pub cache_warning: Option<String>,
}
