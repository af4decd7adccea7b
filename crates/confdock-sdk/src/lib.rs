//! # Confluence content API client
//!
//! A small typed client for the subset of the Confluence REST API that a
//! single-page synchronization needs: fetch a page with selected expansions,
//! create a page, and update a page with an explicit version number.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use confdock_sdk::{ConfluenceClient, Credentials, DocumentApi, Expand};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ConfluenceClient::new("http://localhost:8090")?
//!         .with_credentials(Credentials::new("admin", "admin"));
//!
//!     let page = client.get_document("98305", &[Expand::Version]).await?;
//!     println!("{} is at version {:?}", page.title, page.version_number());
//!     Ok(())
//! }
//! ```
//!
//! Writes are never retried. A `409 Conflict` means someone else changed the
//! page since it was fetched and surfaces as [`ApiError::Conflict`].

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

pub mod types;

pub use types::{
    Body, BodyValue, CreateDocumentRequest, Expand, RemoteDocument, SpaceRef,
    UpdateDocumentRequest, VersionInfo, WriteBody,
};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8090";
pub const API_ROOT: &str = "/rest/api";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Authentication rejected (HTTP {status})")]
    Unauthorized { status: u16 },
    #[error("Content not found: {0}")]
    NotFound(String),
    #[error("Version conflict: {body}")]
    Conflict { body: String },
    #[error("API request failed with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Failed to parse response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Rejects ids that are not a single path segment, so a page id can never
/// address another endpoint.
pub fn check_content_id(id: &str) -> Result<(), ApiError> {
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ApiError::InvalidRequest(format!("invalid content id {id:?}")))
    }
}

/// Basic auth pair. The password is never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Remote document store boundary used by the synchronization engine.
#[async_trait]
pub trait DocumentApi: Send + Sync {
    async fn get_document(&self, id: &str, expand: &[Expand]) -> Result<RemoteDocument, ApiError>;

    async fn create_document(
        &self,
        request: &CreateDocumentRequest,
    ) -> Result<RemoteDocument, ApiError>;

    async fn update_document(
        &self,
        id: &str,
        request: &UpdateDocumentRequest,
    ) -> Result<RemoteDocument, ApiError>;

    /// Browser URL for a page.
    fn page_url(&self, id: &str) -> String;
}

/// `reqwest` implementation of [`DocumentApi`].
///
/// Cheap to clone; the underlying connection pool is shared.
#[derive(Debug, Clone)]
pub struct ConfluenceClient {
    client: Client,
    base_url: String,
    credentials: Option<Credentials>,
}

impl ConfluenceClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ApiError::InvalidRequest("base URL is required".to_string()));
        }
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            base_url,
            credentials: None,
        })
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, API_ROOT, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Some(c) => request.basic_auth(&c.username, Some(&c.password)),
            None => request,
        }
    }

    /// Sends `request`, requiring a 2xx status and a JSON body.
    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        target: &str,
    ) -> Result<T, ApiError> {
        let response = self
            .authorize(request)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(classify(status, target, body));
        }
        Ok(serde_json::from_str(&body)?)
    }
}

fn classify(status: StatusCode, target: &str, body: String) -> ApiError {
    match status {
        StatusCode::NOT_FOUND => ApiError::NotFound(target.to_string()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::Unauthorized {
            status: status.as_u16(),
        },
        StatusCode::CONFLICT => ApiError::Conflict { body },
        _ => ApiError::Status {
            status: status.as_u16(),
            body,
        },
    }
}

#[async_trait]
impl DocumentApi for ConfluenceClient {
    async fn get_document(&self, id: &str, expand: &[Expand]) -> Result<RemoteDocument, ApiError> {
        check_content_id(id)?;
        let mut request = self.client.get(self.endpoint(&format!("/content/{id}")));
        if !expand.is_empty() {
            request = request.query(&[("expand", Expand::join(expand))]);
        }
        self.send(request, id).await
    }

    async fn create_document(
        &self,
        request: &CreateDocumentRequest,
    ) -> Result<RemoteDocument, ApiError> {
        request.validate()?;
        let builder = self.client.post(self.endpoint("/content")).json(request);
        self.send(builder, &request.title).await
    }

    async fn update_document(
        &self,
        id: &str,
        request: &UpdateDocumentRequest,
    ) -> Result<RemoteDocument, ApiError> {
        check_content_id(id)?;
        request.validate()?;
        let builder = self
            .client
            .put(self.endpoint(&format!("/content/{id}")))
            .json(request);
        self.send(builder, id).await
    }

    fn page_url(&self, id: &str) -> String {
        format!("{}/pages/viewpage.action?pageId={}", self.base_url, id)
    }
}
