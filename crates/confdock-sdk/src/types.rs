use confdock_common::ContentFormat;
use serde::{Deserialize, Serialize};

use crate::ApiError;

/// Fields requested through the `expand` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expand {
    Version,
    Space,
    BodyStorage,
    BodyView,
}

impl Expand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Expand::Version => "version",
            Expand::Space => "space",
            Expand::BodyStorage => "body.storage",
            Expand::BodyView => "body.view",
        }
    }

    pub fn join(fields: &[Expand]) -> String {
        fields
            .iter()
            .map(Expand::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceRef {
    pub key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub number: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BodyValue {
    pub value: String,
    #[serde(default)]
    pub representation: String,
}

impl BodyValue {
    pub fn storage(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            representation: "storage".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Body {
    pub storage: Option<BodyValue>,
    pub view: Option<BodyValue>,
}

/// Snapshot of one remote page, valid only for the current operation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteDocument {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub space: Option<SpaceRef>,
    #[serde(default)]
    pub version: Option<VersionInfo>,
    #[serde(default)]
    pub body: Option<Body>,
}

impl RemoteDocument {
    pub fn version_number(&self) -> Option<u64> {
        self.version.map(|v| v.number)
    }

    pub fn space_key(&self) -> Option<&str> {
        self.space
            .as_ref()
            .map(|space| space.key.as_str())
            .filter(|key| !key.is_empty())
    }

    /// Body text in `format`, if the response carried it.
    pub fn body_value(&self, format: ContentFormat) -> Option<&str> {
        let body = self.body.as_ref()?;
        let value = match format {
            ContentFormat::Storage => body.storage.as_ref(),
            ContentFormat::Html => body.view.as_ref(),
        };
        value.map(|v| v.value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteBody {
    pub storage: BodyValue,
}

/// `POST /content` payload. Always a page with a storage-representation body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateDocumentRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub space: SpaceRef,
    pub body: WriteBody,
}

impl CreateDocumentRequest {
    pub fn new(
        space_key: impl Into<String>,
        title: impl Into<String>,
        storage_value: impl Into<String>,
    ) -> Self {
        Self {
            kind: "page".to_string(),
            title: title.into(),
            space: SpaceRef {
                key: space_key.into(),
            },
            body: WriteBody {
                storage: BodyValue::storage(storage_value),
            },
        }
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        if self.space.key.trim().is_empty() {
            return Err(ApiError::InvalidRequest("space key is required".to_string()));
        }
        if self.title.trim().is_empty() {
            return Err(ApiError::InvalidRequest("title is required".to_string()));
        }
        Ok(())
    }
}

/// `PUT /content/{id}` payload: the create shape plus the new version number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateDocumentRequest {
    #[serde(flatten)]
    pub document: CreateDocumentRequest,
    pub version: VersionInfo,
}

impl UpdateDocumentRequest {
    /// `version` is the number the write will produce, i.e. current + 1.
    pub fn new(
        space_key: impl Into<String>,
        title: impl Into<String>,
        storage_value: impl Into<String>,
        version: u64,
    ) -> Self {
        Self {
            document: CreateDocumentRequest::new(space_key, title, storage_value),
            version: VersionInfo { number: version },
        }
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        self.document.validate()?;
        if self.version.number < 2 {
            return Err(ApiError::InvalidRequest(format!(
                "an update must produce version 2 or later, got {}",
                self.version.number
            )));
        }
        Ok(())
    }
}
