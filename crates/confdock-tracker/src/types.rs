use chrono::{DateTime, Utc};
use confdock_common::ContentFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// What is known locally about one remote page.
///
/// The version is only a hint: writes always re-fetch the authoritative
/// number from the remote first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedResourceRecord {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub space_key: Option<String>,
    pub version: u64,
    #[serde(default)]
    pub format: ContentFormat,
    pub last_updated: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<PathBuf>,
}

impl TrackedResourceRecord {
    pub fn new(id: impl Into<String>, title: impl Into<String>, version: u64) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            space_key: None,
            version,
            format: ContentFormat::default(),
            last_updated: Utc::now(),
            source_path: None,
        }
    }

    pub fn with_space_key(mut self, space_key: impl Into<String>) -> Self {
        self.space_key = Some(space_key.into());
        self
    }

    pub fn with_format(mut self, format: ContentFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_source(mut self, source: Option<&Path>) -> Self {
        self.source_path = source.map(Path::to_path_buf);
        self
    }

    /// Space key, treating an empty string as absent.
    pub fn space_key(&self) -> Option<&str> {
        self.space_key.as_deref().filter(|key| !key.trim().is_empty())
    }

    pub fn tracks(&self, source: &Path) -> bool {
        self.source_path.as_deref() == Some(source)
    }
}
