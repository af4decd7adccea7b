//! Maps a local file to a remote page and writes it with optimistic
//! concurrency.
//!
//! Every write re-fetches the page first and sends `fetched + 1` as the new
//! version. The local record only decides whether an "update tracked page"
//! choice is offered; its version number is never trusted for a write.

use confdock_common::{ContentFormat, Prompter};
use confdock_sdk::{
    check_content_id, CreateDocumentRequest, DocumentApi, Expand, RemoteDocument,
    UpdateDocumentRequest,
};
use confdock_tracker::{MetadataStore, ResourceTracker, TrackedResourceRecord};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::format::format_for_remote;
use crate::{ImportOutcome, SyncError, SyncKind, SyncOutcome};

const SPACE_KEY_PROMPT: &str = "Enter the Confluence space key (e.g. DEV, TEAM)";

/// What an export should do with the content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncIntent {
    Create {
        space_key: String,
        title: String,
        format: ContentFormat,
    },
    /// Update the page the local record points at; title and format come
    /// from the record.
    UpdateTracked { record: TrackedResourceRecord },
    /// Update an arbitrary page; the title comes from the remote page.
    UpdateById { id: String, format: ContentFormat },
}

/// An entry of the export pick list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentChoice {
    UpdateTracked(TrackedResourceRecord),
    Create,
    UpdateOther,
}

impl IntentChoice {
    pub fn label(&self) -> String {
        match self {
            IntentChoice::UpdateTracked(record) => format!(
                "Update existing page \"{}\" (Page ID: {})",
                record.title, record.id
            ),
            IntentChoice::Create => "Create a new page".to_string(),
            IntentChoice::UpdateOther => "Update another page".to_string(),
        }
    }
}

/// Choices to offer for a file, tracked page first when there is one.
pub fn intents_for(record: Option<&TrackedResourceRecord>) -> Vec<IntentChoice> {
    let mut choices = Vec::with_capacity(3);
    if let Some(record) = record {
        choices.push(IntentChoice::UpdateTracked(record.clone()));
    }
    choices.push(IntentChoice::Create);
    choices.push(IntentChoice::UpdateOther);
    choices
}

pub struct SyncEngine {
    api: Arc<dyn DocumentApi>,
    tracker: ResourceTracker,
    prompter: Arc<dyn Prompter>,
}

impl SyncEngine {
    pub fn new(
        api: Arc<dyn DocumentApi>,
        store: Arc<dyn MetadataStore>,
        prompter: Arc<dyn Prompter>,
    ) -> Self {
        Self {
            api,
            tracker: ResourceTracker::new(store),
            prompter,
        }
    }

    /// Record tracking `source`. Store failures are logged and treated as
    /// "not tracked".
    pub async fn tracked_record(&self, source: &Path) -> Option<TrackedResourceRecord> {
        match self.tracker.lookup(source).await {
            Ok(record) => record,
            Err(e) => {
                warn!(source = %source.display(), error = %e, "could not read metadata cache");
                None
            }
        }
    }

    /// Walks the user through the export pick list and collects what the
    /// chosen intent needs. Nothing is read from or written to the remote.
    pub async fn choose_intent(
        &self,
        record: Option<&TrackedResourceRecord>,
        default_title: &str,
    ) -> Result<SyncIntent, SyncError> {
        let choices = intents_for(record);
        let labels: Vec<String> = choices.iter().map(IntentChoice::label).collect();
        let picked = self.prompter.select("Select an action", &labels).await?;
        let choice = choices
            .into_iter()
            .nth(picked)
            .ok_or_else(|| SyncError::InvalidRequest(format!("no action at index {picked}")))?;

        match choice {
            IntentChoice::UpdateTracked(record) => Ok(SyncIntent::UpdateTracked { record }),
            IntentChoice::Create => {
                let space_key = self.ask(SPACE_KEY_PROMPT, None).await?;
                let title = self
                    .ask("Enter a title for the new page", Some(default_title))
                    .await?;
                let format = self.choose_format("Select export format").await?;
                Ok(SyncIntent::Create {
                    space_key,
                    title,
                    format,
                })
            }
            IntentChoice::UpdateOther => {
                let id = self
                    .ask("Enter the Confluence page ID to update", None)
                    .await?;
                let format = self.choose_format("Select export format").await?;
                Ok(SyncIntent::UpdateById { id, format })
            }
        }
    }

    /// Prompts for the page id and the body representation to import.
    pub async fn choose_import(&self) -> Result<(String, ContentFormat), SyncError> {
        let id = self
            .ask("Enter the Confluence page ID to import", None)
            .await?;
        let format = self.choose_format("Select import format").await?;
        Ok((id, format))
    }

    pub async fn choose_format(&self, prompt: &str) -> Result<ContentFormat, SyncError> {
        let labels: Vec<String> = ContentFormat::ALL
            .iter()
            .map(|format| format.label().to_string())
            .collect();
        let picked = self.prompter.select(prompt, &labels).await?;
        ContentFormat::ALL
            .get(picked)
            .copied()
            .ok_or_else(|| SyncError::InvalidRequest(format!("no format at index {picked}")))
    }

    #[instrument(skip(self, content, intent, source), fields(source = ?source))]
    pub async fn export(
        &self,
        content: &str,
        source: Option<&Path>,
        intent: SyncIntent,
    ) -> Result<SyncOutcome, SyncError> {
        let body = format_for_remote(content);
        match intent {
            SyncIntent::Create {
                space_key,
                title,
                format,
            } => self.create(&body, source, space_key, title, format).await,
            SyncIntent::UpdateTracked { record } => {
                let remote = self.fetch(&record.id, &[Expand::Version, Expand::Space]).await?;
                let space_key = match record.space_key().or(remote.space_key()) {
                    Some(key) => key.to_string(),
                    None => self.ask(SPACE_KEY_PROMPT, None).await?,
                };
                self.update(&body, source, &remote, space_key, record.title.clone(), record.format)
                    .await
            }
            SyncIntent::UpdateById { id, format } => {
                let remote = self.fetch(id.trim(), &[Expand::Version, Expand::Space]).await?;
                let space_key = match remote.space_key() {
                    Some(key) => key.to_string(),
                    None => self.ask(SPACE_KEY_PROMPT, None).await?,
                };
                let title = remote.title.clone();
                self.update(&body, source, &remote, space_key, title, format)
                    .await
            }
        }
    }

    /// Fetches page `id` with both body representations and returns the one
    /// selected by `format`, recording the page as tracked by `source`.
    #[instrument(skip(self, source), fields(source = ?source))]
    pub async fn import(
        &self,
        id: &str,
        format: ContentFormat,
        source: Option<&Path>,
    ) -> Result<ImportOutcome, SyncError> {
        let id = id.trim();
        let remote = self
            .fetch(
                id,
                &[
                    Expand::Version,
                    Expand::Space,
                    Expand::BodyStorage,
                    Expand::BodyView,
                ],
            )
            .await?;
        let version = remote_version(&remote)?;
        let content = remote
            .body_value(format)
            .ok_or_else(|| SyncError::MissingBody {
                id: id.to_string(),
                format,
            })?
            .to_string();

        let mut record = TrackedResourceRecord::new(id, &remote.title, version)
            .with_format(format)
            .with_source(source);
        record.space_key = remote.space_key().map(str::to_string);
        let cache_warning = self.remember(record).await;

        info!(id, version, %format, "imported page");
        Ok(ImportOutcome {
            id: id.to_string(),
            title: remote.title.clone(),
            version,
            format,
            content,
            url: self.api.page_url(id),
            cache_warning,
        })
    }

    async fn create(
        &self,
        body: &str,
        source: Option<&Path>,
        space_key: String,
        title: String,
        format: ContentFormat,
    ) -> Result<SyncOutcome, SyncError> {
        let request = CreateDocumentRequest::new(space_key.trim(), title.trim(), body);
        request
            .validate()
            .map_err(|e| SyncError::from_create(&request.space.key, e))?;
        let created = self
            .api
            .create_document(&request)
            .await
            .map_err(|e| SyncError::from_create(&request.space.key, e))?;

        let record = TrackedResourceRecord::new(&created.id, &request.title, 1)
            .with_space_key(&request.space.key)
            .with_format(format)
            .with_source(source);
        let cache_warning = self.remember(record).await;

        info!(id = %created.id, title = %request.title, "created page");
        Ok(SyncOutcome {
            kind: SyncKind::Created,
            url: self.api.page_url(&created.id),
            id: created.id,
            title: request.title,
            space_key: request.space.key,
            version: 1,
            format,
            cache_warning,
        })
    }

    async fn update(
        &self,
        body: &str,
        source: Option<&Path>,
        remote: &RemoteDocument,
        space_key: String,
        title: String,
        format: ContentFormat,
    ) -> Result<SyncOutcome, SyncError> {
        let current = remote_version(remote)?;
        let next = current.checked_add(1).ok_or_else(|| SyncError::RemoteError {
            status: 200,
            body: format!("page {} reports version {current}, which cannot be incremented", remote.id),
        })?;
        let request = UpdateDocumentRequest::new(space_key, title, body, next);
        request
            .validate()
            .map_err(|e| SyncError::from_write(&remote.id, next, e))?;
        self.api
            .update_document(&remote.id, &request)
            .await
            .map_err(|e| SyncError::from_write(&remote.id, next, e))?;

        let record = TrackedResourceRecord::new(&remote.id, &request.document.title, next)
            .with_space_key(&request.document.space.key)
            .with_format(format)
            .with_source(source);
        let cache_warning = self.remember(record).await;

        info!(id = %remote.id, version = next, "updated page");
        Ok(SyncOutcome {
            kind: SyncKind::Updated,
            id: remote.id.clone(),
            title: request.document.title,
            space_key: request.document.space.key,
            version: next,
            format,
            url: self.api.page_url(&remote.id),
            cache_warning,
        })
    }

    async fn fetch(&self, id: &str, expand: &[Expand]) -> Result<RemoteDocument, SyncError> {
        if id.is_empty() {
            return Err(SyncError::InvalidRequest("page id is required".to_string()));
        }
        check_content_id(id).map_err(|e| SyncError::from_fetch(id, e))?;
        self.api
            .get_document(id, expand)
            .await
            .map_err(|e| SyncError::from_fetch(id, e))
    }

    /// Persists `record`; a failure becomes a warning on the outcome.
    async fn remember(&self, record: TrackedResourceRecord) -> Option<String> {
        match self.tracker.record(record).await {
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "remote write succeeded but metadata was not saved");
                Some(e.to_string())
            }
        }
    }

    /// Non-blank answer, or `Cancelled`.
    async fn ask(&self, prompt: &str, default: Option<&str>) -> Result<String, SyncError> {
        let answer = self.prompter.input(prompt, default).await?;
        let answer = answer.trim();
        if answer.is_empty() {
            return Err(SyncError::Cancelled);
        }
        Ok(answer.to_string())
    }
}

fn remote_version(remote: &RemoteDocument) -> Result<u64, SyncError> {
    remote.version_number().ok_or_else(|| SyncError::RemoteError {
        status: 200,
        body: format!("page {} was returned without a version", remote.id),
    })
}
