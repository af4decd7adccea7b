use confdock_common::Prompter;
use confdock_sdk::{ConfluenceClient, Credentials, DocumentApi, DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
use confdock_tracker::FileStorage;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use crate::SyncError;

pub const ENV_BASE_URL: &str = "CONFDOCK_BASE_URL";
pub const ENV_USERNAME: &str = "CONFDOCK_USERNAME";
pub const ENV_PASSWORD: &str = "CONFDOCK_PASSWORD";
pub const ENV_TIMEOUT_SECS: &str = "CONFDOCK_TIMEOUT_SECS";
pub const ENV_WORKSPACE: &str = "CONFDOCK_WORKSPACE";

/// Connection settings read once per process.
#[derive(Clone)]
pub struct SessionConfig {
    pub base_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout: Duration,
    /// Root under which `.confluence/` metadata lives.
    pub workspace: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            username: None,
            password: None,
            timeout: DEFAULT_TIMEOUT,
            workspace: None,
        }
    }
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .field("workspace", &self.workspace)
            .finish()
    }
}

impl SessionConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();
        Self {
            base_url: non_empty(ENV_BASE_URL).unwrap_or(defaults.base_url),
            username: non_empty(ENV_USERNAME),
            password: non_empty(ENV_PASSWORD),
            timeout: non_empty(ENV_TIMEOUT_SECS)
                .and_then(|v| v.trim().parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            workspace: non_empty(ENV_WORKSPACE).map(PathBuf::from),
        }
    }

    pub fn with_workspace(mut self, workspace: impl Into<PathBuf>) -> Self {
        self.workspace = Some(workspace.into());
        self
    }
}

/// Resolved configuration with credentials, created once and passed to the
/// client constructor.
#[derive(Debug, Clone)]
pub struct Session {
    config: SessionConfig,
    credentials: Credentials,
}

impl Session {
    /// Fills in missing credentials through `prompter`. An empty answer or a
    /// dismissed prompt cancels.
    pub async fn establish(
        mut config: SessionConfig,
        prompter: &dyn Prompter,
    ) -> Result<Self, SyncError> {
        let username = match config.username.take() {
            Some(username) => username,
            None => required(prompter.input("Enter your Confluence username", None).await?)?,
        };
        let password = match config.password.take() {
            Some(password) => password,
            None => required(prompter.password("Enter your Confluence password").await?)?,
        };
        info!(base_url = %config.base_url, %username, "session established");

        config.username = Some(username.clone());
        config.password = Some(password.clone());
        Ok(Self {
            config,
            credentials: Credentials::new(username, password),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn username(&self) -> &str {
        &self.credentials.username
    }

    pub fn client(&self) -> Result<ConfluenceClient, SyncError> {
        ConfluenceClient::with_timeout(&self.config.base_url, self.config.timeout)
            .map(|client| client.with_credentials(self.credentials.clone()))
            .map_err(|e| SyncError::InvalidRequest(e.to_string()))
    }

    pub fn metadata_store(&self) -> FileStorage {
        FileStorage::for_workspace(self.config.workspace.as_deref())
    }

    pub fn page_url(&self, id: &str) -> Result<String, SyncError> {
        Ok(self.client()?.page_url(id))
    }
}

fn required(answer: String) -> Result<String, SyncError> {
    if answer.trim().is_empty() {
        Err(SyncError::Cancelled)
    } else {
        Ok(answer)
    }
}
