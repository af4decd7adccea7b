use async_trait::async_trait;
use confdock_lib::common::{Cancelled, ContentFormat, Prompter};
use confdock_lib::sdk::{
    ApiError, Body, BodyValue, CreateDocumentRequest, DocumentApi, Expand, RemoteDocument,
    SpaceRef, UpdateDocumentRequest, VersionInfo,
};
use confdock_lib::tracker::{
    InMemoryStorage, MetadataStore, TrackedResourceRecord, TrackerError,
};
use confdock_lib::{SyncEngine, SyncError, SyncIntent, SyncKind};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

// --- Fake remote store ---

#[derive(Clone)]
struct Page {
    title: String,
    space: Option<String>,
    version: u64,
    storage: String,
    view: Option<String>,
}

#[derive(Clone, Copy)]
enum Failure {
    NotFound,
    Unauthorized,
    Status(u16),
}

#[derive(Default)]
struct Remote {
    pages: HashMap<String, Page>,
    next_id: u64,
    reads: usize,
    writes: usize,
    /// Someone else saves the page right after each fetch.
    concurrent_edit_on_fetch: bool,
    fail_fetch: Option<Failure>,
}

#[derive(Default, Clone)]
struct FakeApi {
    remote: Arc<Mutex<Remote>>,
}

impl FakeApi {
    fn with_page(self, id: &str, page: Page) -> Self {
        self.remote
            .lock()
            .unwrap()
            .pages
            .insert(id.to_string(), page);
        self
    }

    fn page(&self, id: &str) -> Page {
        self.remote.lock().unwrap().pages[id].clone()
    }

    fn reads(&self) -> usize {
        self.remote.lock().unwrap().reads
    }

    fn writes(&self) -> usize {
        self.remote.lock().unwrap().writes
    }

    fn set(&self, f: impl FnOnce(&mut Remote)) {
        f(&mut self.remote.lock().unwrap());
    }
}

fn page(title: &str, space: Option<&str>, version: u64) -> Page {
    Page {
        title: title.to_string(),
        space: space.map(str::to_string),
        version,
        storage: "<p>remote</p>".to_string(),
        view: Some("<p>remote rendered</p>".to_string()),
    }
}

fn to_document(id: &str, page: &Page, expand: &[Expand]) -> RemoteDocument {
    let wants = |field| expand.contains(&field);
    RemoteDocument {
        id: id.to_string(),
        title: page.title.clone(),
        kind: Some("page".to_string()),
        space: if wants(Expand::Space) {
            page.space.clone().map(|key| SpaceRef { key })
        } else {
            None
        },
        version: wants(Expand::Version).then_some(VersionInfo {
            number: page.version,
        }),
        body: Some(Body {
            storage: wants(Expand::BodyStorage).then(|| BodyValue::storage(&page.storage)),
            view: page
                .view
                .clone()
                .filter(|_| wants(Expand::BodyView))
                .map(|value| BodyValue {
                    value,
                    representation: "view".to_string(),
                }),
        }),
    }
}

#[async_trait]
impl DocumentApi for FakeApi {
    async fn get_document(&self, id: &str, expand: &[Expand]) -> Result<RemoteDocument, ApiError> {
        let mut remote = self.remote.lock().unwrap();
        remote.reads += 1;
        match remote.fail_fetch {
            Some(Failure::NotFound) => return Err(ApiError::NotFound(id.to_string())),
            Some(Failure::Unauthorized) => return Err(ApiError::Unauthorized { status: 401 }),
            Some(Failure::Status(status)) => {
                return Err(ApiError::Status {
                    status,
                    body: "upstream failure".to_string(),
                })
            }
            None => {}
        }
        let concurrent = remote.concurrent_edit_on_fetch;
        let page = remote
            .pages
            .get_mut(id)
            .ok_or_else(|| ApiError::NotFound(id.to_string()))?;
        let document = to_document(id, page, expand);
        if concurrent {
            page.version += 1;
        }
        Ok(document)
    }

    async fn create_document(
        &self,
        request: &CreateDocumentRequest,
    ) -> Result<RemoteDocument, ApiError> {
        let mut remote = self.remote.lock().unwrap();
        remote.writes += 1;
        remote.next_id += 1;
        let id = format!("{}", 131072 + remote.next_id);
        let page = Page {
            title: request.title.clone(),
            space: Some(request.space.key.clone()),
            version: 1,
            storage: request.body.storage.value.clone(),
            view: None,
        };
        let document = to_document(&id, &page, &[Expand::Version, Expand::Space]);
        remote.pages.insert(id, page);
        Ok(document)
    }

    async fn update_document(
        &self,
        id: &str,
        request: &UpdateDocumentRequest,
    ) -> Result<RemoteDocument, ApiError> {
        let mut remote = self.remote.lock().unwrap();
        remote.writes += 1;
        let page = remote
            .pages
            .get_mut(id)
            .ok_or_else(|| ApiError::NotFound(id.to_string()))?;
        if request.version.number != page.version + 1 {
            return Err(ApiError::Conflict {
                body: format!("Current version is: {}", page.version),
            });
        }
        page.version = request.version.number;
        page.title = request.document.title.clone();
        page.storage = request.document.body.storage.value.clone();
        Ok(to_document(id, page, &[Expand::Version]))
    }

    fn page_url(&self, id: &str) -> String {
        format!("http://wiki.test/pages/viewpage.action?pageId={id}")
    }
}

// --- Scripted prompter ---

enum Answer {
    Text(&'static str),
    Pick(usize),
    Dismiss,
}

#[derive(Default)]
struct ScriptedPrompter {
    answers: Mutex<VecDeque<Answer>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    fn new(answers: Vec<Answer>) -> Arc<Self> {
        Arc::new(Self {
            answers: Mutex::new(answers.into()),
            prompts: Mutex::default(),
        })
    }

    fn next(&self, prompt: &str) -> Answer {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected prompt: {prompt}"))
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Prompter for ScriptedPrompter {
    async fn input(&self, prompt: &str, _default: Option<&str>) -> Result<String, Cancelled> {
        match self.next(prompt) {
            Answer::Text(text) => Ok(text.to_string()),
            Answer::Dismiss => Err(Cancelled),
            Answer::Pick(_) => panic!("expected a text answer for {prompt}"),
        }
    }

    async fn password(&self, prompt: &str) -> Result<String, Cancelled> {
        self.input(prompt, None).await
    }

    async fn select(&self, prompt: &str, items: &[String]) -> Result<usize, Cancelled> {
        match self.next(prompt) {
            Answer::Pick(index) => {
                assert!(index < items.len(), "{prompt}: no item {index} in {items:?}");
                Ok(index)
            }
            Answer::Dismiss => Err(Cancelled),
            Answer::Text(_) => panic!("expected a selection for {prompt}"),
        }
    }
}

/// Store whose writes always fail.
struct ReadOnlyStore;

#[async_trait]
impl MetadataStore for ReadOnlyStore {
    async fn load(&self, _id: &str) -> confdock_lib::tracker::Result<Option<TrackedResourceRecord>> {
        Ok(None)
    }

    async fn save(&self, _record: &TrackedResourceRecord) -> confdock_lib::tracker::Result<()> {
        Err(TrackerError::Io {
            path: PathBuf::from("/read-only/.confluence/page_1.json"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
        })
    }

    async fn list(&self) -> confdock_lib::tracker::Result<Vec<TrackedResourceRecord>> {
        Ok(Vec::new())
    }
}

struct Harness {
    api: FakeApi,
    store: Arc<InMemoryStorage>,
    prompter: Arc<ScriptedPrompter>,
    engine: SyncEngine,
}

fn harness(api: FakeApi, answers: Vec<Answer>) -> Harness {
    let store = Arc::new(InMemoryStorage::new());
    let prompter = ScriptedPrompter::new(answers);
    let engine = SyncEngine::new(Arc::new(api.clone()), store.clone(), prompter.clone());
    Harness {
        api,
        store,
        prompter,
        engine,
    }
}

const SOURCE: &str = "/work/runbook.html";

fn tracked(id: &str, title: &str, space: Option<&str>, version: u64) -> TrackedResourceRecord {
    let mut record = TrackedResourceRecord::new(id, title, version)
        .with_format(ContentFormat::Html)
        .with_source(Some(Path::new(SOURCE)));
    record.space_key = space.map(str::to_string);
    record
}

// --- Tests ---

#[tokio::test]
async fn test_create_round_trip() -> Result<(), anyhow::Error> {
    let h = harness(FakeApi::default(), vec![]);
    let outcome = h
        .engine
        .export(
            "hello world",
            Some(Path::new(SOURCE)),
            SyncIntent::Create {
                space_key: "DOCS".to_string(),
                title: "Release notes".to_string(),
                format: ContentFormat::Html,
            },
        )
        .await?;

    assert_eq!(outcome.kind, SyncKind::Created);
    assert_eq!(outcome.version, 1);
    assert!(outcome.cache_warning.is_none());
    assert!(outcome.url.ends_with(&format!("pageId={}", outcome.id)));

    let remote = h.api.page(&outcome.id);
    assert_eq!(remote.title, "Release notes");
    assert_eq!(remote.version, 1);
    assert!(remote.storage.contains("hello world"));

    let record = h.store.find_by_source(Path::new(SOURCE)).await?.unwrap();
    assert_eq!(record.id, outcome.id);
    assert_eq!(record.version, 1);
    assert_eq!(record.space_key(), Some("DOCS"));
    assert_eq!(record.format, ContentFormat::Html);
    Ok(())
}

#[tokio::test]
async fn test_update_uses_refetched_version() -> Result<(), anyhow::Error> {
    // The local record is stale (version 1); the remote is at 3.
    let api = FakeApi::default().with_page("98305", page("Runbook", Some("OPS"), 3));
    let h = harness(api, vec![]);
    let record = tracked("98305", "Runbook", Some("OPS"), 1);

    let outcome = h
        .engine
        .export(
            "<p>edited</p>",
            Some(Path::new(SOURCE)),
            SyncIntent::UpdateTracked { record },
        )
        .await?;

    assert_eq!(outcome.kind, SyncKind::Updated);
    assert_eq!(outcome.version, 4);
    assert_eq!(outcome.format, ContentFormat::Html);

    let saved = h.store.load("98305").await?.unwrap();
    assert_eq!(saved.version, 4);
    assert_eq!(saved.version, h.api.page("98305").version);
    Ok(())
}

#[tokio::test]
async fn test_conflict_is_not_retried_and_leaves_metadata_alone() -> Result<(), anyhow::Error> {
    let api = FakeApi::default().with_page("98305", page("Runbook", Some("OPS"), 3));
    api.set(|remote| remote.concurrent_edit_on_fetch = true);
    let h = harness(api, vec![]);
    let record = tracked("98305", "Runbook", Some("OPS"), 3);
    h.store.save(&record).await?;

    let err = h
        .engine
        .export("<p>mine</p>", Some(Path::new(SOURCE)), SyncIntent::UpdateTracked { record: record.clone() })
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::VersionConflict { attempted: 4, .. }));
    assert_eq!(h.api.writes(), 1);
    assert_eq!(h.store.load("98305").await?, Some(record));
    assert_eq!(h.api.page("98305").storage, "<p>remote</p>");
    Ok(())
}

#[tokio::test]
async fn test_storage_markup_is_sent_byte_identical() -> Result<(), anyhow::Error> {
    let api = FakeApi::default().with_page("7", page("Code", Some("DEV"), 1));
    let h = harness(api, vec![]);
    let content = "<ac:structured-macro ac:name=\"code\"><ac:plain-text-body><![CDATA[let x = 1;]]></ac:plain-text-body></ac:structured-macro>";

    h.engine
        .export(
            content,
            None,
            SyncIntent::UpdateById {
                id: "7".to_string(),
                format: ContentFormat::Storage,
            },
        )
        .await?;

    assert_eq!(h.api.page("7").storage, content);
    Ok(())
}

#[tokio::test]
async fn test_update_by_id_takes_title_from_remote() -> Result<(), anyhow::Error> {
    let api = FakeApi::default().with_page("7", page("Remote Title", Some("DEV"), 2));
    let h = harness(api, vec![]);

    let outcome = h
        .engine
        .export(
            "text",
            Some(Path::new("/work/other.txt")),
            SyncIntent::UpdateById {
                id: " 7 ".to_string(),
                format: ContentFormat::Storage,
            },
        )
        .await?;

    assert_eq!(outcome.title, "Remote Title");
    assert_eq!(outcome.version, 3);
    assert_eq!(h.api.page("7").storage, "<p>text</p>");
    let record = h.store.find_by_source(Path::new("/work/other.txt")).await?.unwrap();
    assert_eq!(record.format, ContentFormat::Storage);
    Ok(())
}

#[tokio::test]
async fn test_space_key_is_back_filled_from_remote() -> Result<(), anyhow::Error> {
    let api = FakeApi::default().with_page("98305", page("Runbook", Some("OPS"), 1));
    let h = harness(api, vec![]);

    let outcome = h
        .engine
        .export(
            "x",
            Some(Path::new(SOURCE)),
            SyncIntent::UpdateTracked {
                record: tracked("98305", "Runbook", None, 1),
            },
        )
        .await?;

    assert_eq!(outcome.space_key, "OPS");
    assert!(h.prompter.prompts().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_missing_space_key_is_prompted_and_cancel_stops_before_write() {
    let api = FakeApi::default().with_page("98305", page("Runbook", None, 1));
    let h = harness(api, vec![Answer::Dismiss]);

    let err = h
        .engine
        .export(
            "x",
            Some(Path::new(SOURCE)),
            SyncIntent::UpdateTracked {
                record: tracked("98305", "Runbook", Some(""), 1),
            },
        )
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(h.prompter.prompts().len(), 1);
    assert!(h.prompter.prompts()[0].contains("space key"));
    assert_eq!(h.api.writes(), 0);
    assert!(h.store.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_prompted_space_key_is_used_and_persisted() -> Result<(), anyhow::Error> {
    let api = FakeApi::default().with_page("98305", page("Runbook", None, 5));
    let h = harness(api, vec![Answer::Text("TEAM")]);

    let outcome = h
        .engine
        .export(
            "x",
            Some(Path::new(SOURCE)),
            SyncIntent::UpdateTracked {
                record: tracked("98305", "Runbook", None, 5),
            },
        )
        .await?;

    assert_eq!(outcome.space_key, "TEAM");
    assert_eq!(h.store.load("98305").await?.unwrap().space_key(), Some("TEAM"));
    Ok(())
}

#[tokio::test]
async fn test_fetch_failures_prevent_writes() {
    for (failure, expect_not_found) in [
        (Failure::NotFound, true),
        (Failure::Unauthorized, false),
        (Failure::Status(500), false),
    ] {
        let api = FakeApi::default().with_page("98305", page("Runbook", Some("OPS"), 1));
        api.set(|remote| remote.fail_fetch = Some(failure));
        let h = harness(api, vec![]);

        let err = h
            .engine
            .export(
                "x",
                None,
                SyncIntent::UpdateTracked {
                    record: tracked("98305", "Runbook", Some("OPS"), 1),
                },
            )
            .await
            .unwrap_err();

        match failure {
            Failure::NotFound => assert!(matches!(err, SyncError::NotFound(ref id) if id == "98305")),
            Failure::Unauthorized => assert!(matches!(err, SyncError::Unauthorized)),
            Failure::Status(_) => {
                assert!(matches!(err, SyncError::RemoteError { status: 500, .. }))
            }
        }
        assert_eq!(expect_not_found, matches!(err, SyncError::NotFound(_)));
        assert_eq!(h.api.writes(), 0);
    }
}

#[tokio::test]
async fn test_path_like_page_id_is_rejected_before_any_request() {
    let api = FakeApi::default().with_page("1", page("One", Some("DEV"), 1));
    let h = harness(api, vec![]);

    for id in ["1/../x", "../space/DEV", "1?x=2"] {
        let err = h
            .engine
            .export(
                "x",
                None,
                SyncIntent::UpdateById {
                    id: id.to_string(),
                    format: ContentFormat::Storage,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::InvalidRequest(_)), "{id}: {err}");

        let err = h
            .engine
            .import(id, ContentFormat::Storage, None)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::InvalidRequest(_)), "{id}: {err}");
    }
    assert_eq!(h.api.reads(), 0);
    assert_eq!(h.api.writes(), 0);
    assert!(h.store.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_exhausted_version_counter_is_a_remote_error() {
    let api = FakeApi::default().with_page("7", page("Code", Some("DEV"), u64::MAX));
    let h = harness(api, vec![]);

    let err = h
        .engine
        .export(
            "x",
            None,
            SyncIntent::UpdateById {
                id: "7".to_string(),
                format: ContentFormat::Storage,
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::RemoteError { status: 200, .. }));
    assert_eq!(h.api.writes(), 0);
    assert_eq!(h.api.page("7").version, u64::MAX);
}

#[tokio::test]
async fn test_cache_failure_is_reported_but_not_fatal() -> Result<(), anyhow::Error> {
    let api = FakeApi::default();
    let prompter = ScriptedPrompter::new(vec![]);
    let engine = SyncEngine::new(Arc::new(api.clone()), Arc::new(ReadOnlyStore), prompter);

    let outcome = engine
        .export(
            "x",
            None,
            SyncIntent::Create {
                space_key: "DOCS".to_string(),
                title: "T".to_string(),
                format: ContentFormat::Storage,
            },
        )
        .await?;

    assert_eq!(api.writes(), 1);
    assert!(outcome.cache_warning.unwrap().contains("read-only"));
    Ok(())
}

#[tokio::test]
async fn test_blank_create_fields_are_rejected_locally() {
    let h = harness(FakeApi::default(), vec![]);
    let err = h
        .engine
        .export(
            "x",
            None,
            SyncIntent::Create {
                space_key: " ".to_string(),
                title: "T".to_string(),
                format: ContentFormat::Storage,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::InvalidRequest(_)));
    assert_eq!(h.api.writes(), 0);
}

#[tokio::test]
async fn test_choose_intent_for_tracked_file() -> Result<(), anyhow::Error> {
    let h = harness(FakeApi::default(), vec![Answer::Pick(0)]);
    let record = tracked("98305", "Runbook", Some("OPS"), 2);

    let intent = h.engine.choose_intent(Some(&record), "runbook.html").await?;
    assert_eq!(intent, SyncIntent::UpdateTracked { record });
    Ok(())
}

#[tokio::test]
async fn test_choose_intent_collects_create_parameters() -> Result<(), anyhow::Error> {
    let h = harness(
        FakeApi::default(),
        vec![
            Answer::Pick(0),
            Answer::Text(" DOCS "),
            Answer::Text("runbook.html"),
            Answer::Pick(1),
        ],
    );

    let intent = h.engine.choose_intent(None, "runbook.html").await?;
    assert_eq!(
        intent,
        SyncIntent::Create {
            space_key: "DOCS".to_string(),
            title: "runbook.html".to_string(),
            format: ContentFormat::Html,
        }
    );
    assert_eq!(h.api.reads() + h.api.writes(), 0);
    Ok(())
}

#[tokio::test]
async fn test_cancellation_at_any_prompt_touches_nothing() {
    let scripts: Vec<Vec<Answer>> = vec![
        vec![Answer::Dismiss],
        vec![Answer::Pick(0), Answer::Dismiss],
        vec![Answer::Pick(0), Answer::Text("DOCS"), Answer::Text("")],
        vec![Answer::Pick(0), Answer::Text("DOCS"), Answer::Text("T"), Answer::Dismiss],
        vec![Answer::Pick(1), Answer::Dismiss],
    ];
    for answers in scripts {
        let h = harness(FakeApi::default(), answers);
        let err = h.engine.choose_intent(None, "file.html").await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(h.api.reads() + h.api.writes(), 0);
    }
}

#[tokio::test]
async fn test_import_selects_body_and_records_fetched_version() -> Result<(), anyhow::Error> {
    let api = FakeApi::default().with_page("98305", page("Runbook", Some("OPS"), 6));
    let h = harness(api, vec![Answer::Text("98305"), Answer::Pick(1)]);

    let (id, format) = h.engine.choose_import().await?;
    let outcome = h.engine.import(&id, format, Some(Path::new(SOURCE))).await?;

    assert_eq!(outcome.content, "<p>remote rendered</p>");
    assert_eq!(outcome.version, 6);
    let record = h.store.find_by_source(Path::new(SOURCE)).await?.unwrap();
    assert_eq!(record.version, 6);
    assert_eq!(record.format, ContentFormat::Html);
    assert_eq!(record.space_key(), Some("OPS"));

    // Export straight after import updates to the next version.
    let outcome = h
        .engine
        .export(&outcome.content, Some(Path::new(SOURCE)), SyncIntent::UpdateTracked { record })
        .await?;
    assert_eq!(outcome.version, 7);
    assert_eq!(h.api.page("98305").version, 7);
    Ok(())
}

#[tokio::test]
async fn test_import_without_requested_body_fails() {
    let mut missing_view = page("Runbook", Some("OPS"), 2);
    missing_view.view = None;
    let api = FakeApi::default().with_page("98305", missing_view);
    let h = harness(api, vec![]);

    let err = h
        .engine
        .import("98305", ContentFormat::Html, Some(Path::new(SOURCE)))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SyncError::MissingBody {
            format: ContentFormat::Html,
            ..
        }
    ));
    assert!(h.store.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_tracked_record_lookup_is_keyed_by_source() -> Result<(), anyhow::Error> {
    let h = harness(FakeApi::default(), vec![]);
    h.store.save(&tracked("1", "A", Some("X"), 1)).await?;

    assert!(h.engine.tracked_record(Path::new(SOURCE)).await.is_some());
    assert!(h
        .engine
        .tracked_record(Path::new("/work/unrelated.html"))
        .await
        .is_none());
    Ok(())
}
