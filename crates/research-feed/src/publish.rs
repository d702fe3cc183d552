/// Publication pipeline.
///
/// Each configured backend is attempted once, in order (content store, then commit
/// store), each awaited before the next. A failure is reported for that backend and
/// never stops the other one. Every success appends its own `TokenRecord`; with no
/// backend configured a single draft record is appended instead.
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::backends::{CommitStore, ContentStore, Credential};
use crate::error::BackendError;
use crate::model::{ArtifactMetadata, Document, RecordLocation, RepoRef, TokenRecord};
use crate::records::RecordStore;

pub const COMMIT_DIR: &str = "tokens/metadata";

/// Lower-cased file name with whitespace runs turned into `-` and anything outside
/// `[a-z0-9-_.]` dropped.
pub fn slugify(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_space = false;
    for ch in name.chars() {
        if ch.is_whitespace() {
            if !in_space {
                out.push('-');
                in_space = true;
            }
            continue;
        }
        in_space = false;
        if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.') {
            out.push(ch.to_ascii_lowercase());
        }
    }
    out
}

/// `tokens/metadata/<unix-millis>-<slug>.json`
pub fn commit_path(unix_millis: i64, document_name: &str) -> String {
    format!("{COMMIT_DIR}/{unix_millis}-{}.json", slugify(document_name))
}

/// Commit store credential plus the repository it writes to.
#[derive(Debug, Clone)]
pub struct CommitTarget {
    pub credential: Credential,
    pub repo: RepoRef,
}

#[derive(Debug, Clone, Default)]
pub struct BackendCredentials {
    pub content_store: Option<Credential>,
    pub commit_store: Option<CommitTarget>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    ContentStore,
    CommitStore,
}

impl Backend {
    pub fn as_str(self) -> &'static str {
        match self {
            Backend::ContentStore => "content_store",
            Backend::CommitStore => "commit_store",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Uploaded { cid: String, gateway_url: String },
    Committed { commit_url: String, path: String },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendOutcome {
    pub backend: Backend,
    pub outcome: Outcome,
}

impl BackendOutcome {
    pub fn succeeded(&self) -> bool {
        !matches!(self.outcome, Outcome::Failed { .. })
    }
}

#[derive(Debug, Clone)]
pub struct PublishReport {
    pub metadata: ArtifactMetadata,
    pub outcomes: Vec<BackendOutcome>,
    pub draft: bool,
    pub records_appended: usize,
}

pub struct PublishCoordinator {
    content_store: Arc<dyn ContentStore>,
    commit_store: Arc<dyn CommitStore>,
    records: Arc<RecordStore>,
    deadline: Duration,
    shutdown: watch::Receiver<bool>,
}

impl PublishCoordinator {
    pub fn new(
        content_store: Arc<dyn ContentStore>,
        commit_store: Arc<dyn CommitStore>,
        records: Arc<RecordStore>,
        deadline: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            content_store,
            commit_store,
            records,
            deadline,
            shutdown,
        }
    }

    /// Attempt every configured backend for `metadata`. Never returns an error;
    /// failures are in the report.
    pub async fn publish(
        &self,
        metadata: &ArtifactMetadata,
        source: &Document,
        credentials: &BackendCredentials,
    ) -> PublishReport {
        let mut outcomes = Vec::new();
        let mut records_appended = 0;

        if let Some(credential) = &credentials.content_store {
            let outcome = self.try_content_store(credential, metadata).await;
            if let Outcome::Uploaded { cid, .. } = &outcome {
                self.append(metadata, source, RecordLocation::ContentStore {
                    metadata_cid: cid.clone(),
                })
                .await;
                records_appended += 1;
            }
            outcomes.push(BackendOutcome {
                backend: Backend::ContentStore,
                outcome,
            });
        }

        if let Some(target) = &credentials.commit_store {
            let outcome = self.try_commit_store(target, metadata, source).await;
            if let Outcome::Committed { commit_url, path } = &outcome {
                self.append(metadata, source, RecordLocation::CommitStore {
                    commit_url: commit_url.clone(),
                    path: path.clone(),
                })
                .await;
                records_appended += 1;
            }
            outcomes.push(BackendOutcome {
                backend: Backend::CommitStore,
                outcome,
            });
        }

        let draft = credentials.content_store.is_none() && credentials.commit_store.is_none();
        if draft {
            info!(name = %source.name, "no storage credential, saving draft");
            self.append(metadata, source, RecordLocation::Draft {
                metadata: metadata.clone(),
            })
            .await;
            records_appended += 1;
        }

        info!(
            name = %source.name,
            attempted = outcomes.len(),
            succeeded = outcomes.iter().filter(|o| o.succeeded()).count(),
            records_appended,
            "publish finished"
        );

        PublishReport {
            metadata: metadata.clone(),
            outcomes,
            draft,
            records_appended,
        }
    }

    async fn try_content_store(
        &self,
        credential: &Credential,
        metadata: &ArtifactMetadata,
    ) -> Outcome {
        match self.bounded(self.content_store.upload(credential, metadata)).await {
            Ok(cid) => {
                info!(cid = %cid, "uploaded metadata to content store");
                Outcome::Uploaded {
                    gateway_url: self.content_store.gateway_url(&cid),
                    cid,
                }
            }
            Err(e) => {
                warn!(
                    backend = Backend::ContentStore.as_str(),
                    error = %e,
                    "content store upload failed"
                );
                Outcome::Failed { error: e.to_string() }
            }
        }
    }

    async fn try_commit_store(
        &self,
        target: &CommitTarget,
        metadata: &ArtifactMetadata,
        source: &Document,
    ) -> Outcome {
        let path = commit_path(Utc::now().timestamp_millis(), &source.name);
        let content = match serde_json::to_string_pretty(metadata) {
            Ok(content) => content,
            Err(e) => return Outcome::Failed { error: e.to_string() },
        };

        let attempt = self
            .commit_store
            .commit(&target.credential, &target.repo, &path, &content);
        match self.bounded(attempt).await {
            Ok(resp) => {
                let commit_url = resp.content.and_then(|c| c.html_url).unwrap_or_default();
                info!(path = %path, repo = %target.repo, "committed metadata");
                Outcome::Committed { commit_url, path }
            }
            Err(e) => {
                warn!(
                    backend = Backend::CommitStore.as_str(),
                    error = %e,
                    path = %path,
                    "commit failed"
                );
                Outcome::Failed { error: e.to_string() }
            }
        }
    }

    async fn append(
        &self,
        metadata: &ArtifactMetadata,
        source: &Document,
        location: RecordLocation,
    ) {
        self.records
            .append(TokenRecord {
                name: metadata.name.clone(),
                source_article: source.name.clone(),
                created_at: Utc::now().timestamp_millis(),
                location,
            })
            .await;
    }

    /// Run one backend call under the deadline, abandoning it on shutdown.
    async fn bounded<T, F>(&self, call: F) -> Result<T, BackendError>
    where
        F: Future<Output = Result<T, BackendError>>,
    {
        let mut shutdown = self.shutdown.clone();
        if *shutdown.borrow() {
            return Err(BackendError::Cancelled);
        }
        tokio::select! {
            result = tokio::time::timeout(self.deadline, call) => {
                result.unwrap_or(Err(BackendError::DeadlineExceeded(self.deadline)))
            }
            _ = wait_for_shutdown(&mut shutdown) => Err(BackendError::Cancelled),
        }
    }
}

/// Resolves once shutdown is signalled. Never resolves if the sender is gone.
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use band_common::redis::RedisCache;

    use super::*;
    use crate::artifact;
    use crate::backends::{CommitResponse, CommittedContent};
    use band_common::error::CommonError;

    #[derive(Default)]
    struct FakeContentStore {
        fail: bool,
        hang: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ContentStore for FakeContentStore {
        async fn upload(
            &self,
            _: &Credential,
            _: &ArtifactMetadata,
        ) -> Result<String, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.hang {
                std::future::pending::<()>().await;
            }
            if self.fail {
                return Err(BackendError::Malformed("upload rejected".to_string()));
            }
            Ok("bafyfake".to_string())
        }

        fn gateway_url(&self, cid: &str) -> String {
            format!("https://gateway.test/ipfs/{cid}")
        }
    }

    #[derive(Default)]
    struct FakeCommitStore {
        fail: bool,
        calls: AtomicUsize,
        last_content: std::sync::Mutex<Option<String>>,
    }

    #[async_trait]
    impl CommitStore for FakeCommitStore {
        async fn commit(
            &self,
            _: &Credential,
            _: &RepoRef,
            path: &str,
            content: &str,
        ) -> Result<CommitResponse, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_content.lock().unwrap() = Some(content.to_string());
            if self.fail {
                return Err(BackendError::Common(CommonError::Upstream {
                    status: reqwest::StatusCode::CONFLICT,
                    body: "sha mismatch".to_string(),
                }));
            }
            Ok(CommitResponse {
                content: Some(CommittedContent {
                    html_url: Some(format!("https://github.test/blob/{path}")),
                }),
            })
        }
    }

    struct Harness {
        content: Arc<FakeContentStore>,
        commit: Arc<FakeCommitStore>,
        records: Arc<RecordStore>,
        coordinator: PublishCoordinator,
        shutdown: watch::Sender<bool>,
    }

    fn harness(content: FakeContentStore, commit: FakeCommitStore, deadline: Duration) -> Harness {
        let content = Arc::new(content);
        let commit = Arc::new(commit);
        let records = Arc::new(RecordStore::new(RedisCache::disabled()));
        let (tx, rx) = watch::channel(false);
        let coordinator = PublishCoordinator::new(
            content.clone(),
            commit.clone(),
            records.clone(),
            deadline,
            rx,
        );
        Harness {
            content,
            commit,
            records,
            coordinator,
            shutdown: tx,
        }
    }

    fn document() -> Document {
        Document {
            path: "o/Alpha Notes.md".to_string(),
            name: "Alpha Notes.md".to_string(),
            content: "We submit a form and export data.".to_string(),
        }
    }

    fn both() -> BackendCredentials {
        BackendCredentials {
            content_store: Credential::new("w3s"),
            commit_store: Some(CommitTarget {
                credential: Credential::new("gh").unwrap(),
                repo: RepoRef::parse("acme/feed", None).unwrap(),
            }),
        }
    }

    #[test]
    fn slug_is_restricted_and_lowercase() {
        assert_eq!(slugify("Alpha  Notes\t(v2).MD"), "alpha-notes-v2.md");
        assert_eq!(slugify("über_plan-1.txt"), "ber_plan-1.txt");
        for name in ["A B C", "  lead", "x\n\ny", "ünï cödé!!.md", "a/b\\c.md"] {
            let slug = slugify(name);
            assert!(
                slug.chars().all(|c| c.is_ascii_lowercase()
                    || c.is_ascii_digit()
                    || matches!(c, '-' | '_' | '.')),
                "{name:?} -> {slug:?}"
            );
        }
    }

    #[test]
    fn commit_path_format() {
        assert_eq!(
            commit_path(1_700_000_000_123, "Alpha Notes.md"),
            "tokens/metadata/1700000000123-alpha-notes.md.json"
        );
    }

    #[tokio::test]
    async fn no_credentials_saves_one_draft() {
        let h = harness(
            FakeContentStore::default(),
            FakeCommitStore::default(),
            Duration::from_secs(5),
        );
        let doc = document();
        let meta = artifact::build(&doc, None);

        let report = h.coordinator.publish(&meta, &doc, &BackendCredentials::default()).await;

        assert!(report.draft);
        assert!(report.outcomes.is_empty());
        assert_eq!(report.records_appended, 1);
        assert_eq!(h.content.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.commit.calls.load(Ordering::SeqCst), 0);

        let records = h.records.list().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].source_article, "Alpha Notes.md");
        assert_eq!(records[0].location, RecordLocation::Draft { metadata: meta });
    }

    #[tokio::test]
    async fn both_backends_succeed_with_one_record_each() {
        let h = harness(
            FakeContentStore::default(),
            FakeCommitStore::default(),
            Duration::from_secs(5),
        );
        let doc = document();
        let meta = artifact::build(&doc, Some("0xabc"));

        let report = h.coordinator.publish(&meta, &doc, &both()).await;

        assert!(!report.draft);
        assert_eq!(report.records_appended, 2);
        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(
            report.outcomes[0].outcome,
            Outcome::Uploaded {
                cid: "bafyfake".to_string(),
                gateway_url: "https://gateway.test/ipfs/bafyfake".to_string(),
            }
        );

        let records = h.records.list().await;
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.source_article == "Alpha Notes.md"));
        assert!(matches!(records[0].location, RecordLocation::ContentStore { .. }));
        match &records[1].location {
            RecordLocation::CommitStore { commit_url, path } => {
                assert!(path.starts_with("tokens/metadata/"));
                assert!(path.ends_with("-alpha-notes.md.json"));
                assert_eq!(commit_url, &format!("https://github.test/blob/{path}"));
            }
            other => panic!("expected commit record, got {other:?}"),
        }

        let committed = h.commit.last_content.lock().unwrap().clone().unwrap();
        assert_eq!(committed, serde_json::to_string_pretty(&meta).unwrap());
    }

    #[tokio::test]
    async fn content_failure_does_not_stop_commit() {
        let h = harness(
            FakeContentStore { fail: true, ..Default::default() },
            FakeCommitStore::default(),
            Duration::from_secs(5),
        );
        let doc = document();
        let meta = artifact::build(&doc, None);

        let report = h.coordinator.publish(&meta, &doc, &both()).await;

        assert_eq!(report.records_appended, 1);
        assert!(!report.outcomes[0].succeeded());
        assert!(report.outcomes[1].succeeded());
        match &report.outcomes[0].outcome {
            Outcome::Failed { error } => assert!(error.contains("upload rejected")),
            other => panic!("expected failure, got {other:?}"),
        }
        let records = h.records.list().await;
        assert_eq!(records.len(), 1);
        assert!(matches!(records[0].location, RecordLocation::CommitStore { .. }));
    }

    #[tokio::test]
    async fn commit_failure_keeps_content_record() {
        let h = harness(
            FakeContentStore::default(),
            FakeCommitStore { fail: true, ..Default::default() },
            Duration::from_secs(5),
        );
        let doc = document();
        let meta = artifact::build(&doc, None);

        let report = h.coordinator.publish(&meta, &doc, &both()).await;

        assert_eq!(report.records_appended, 1);
        assert!(!report.draft);
        assert_eq!(h.commit.calls.load(Ordering::SeqCst), 1);
        let records = h.records.list().await;
        assert_eq!(records.len(), 1);
        assert!(matches!(records[0].location, RecordLocation::ContentStore { .. }));
    }

    #[tokio::test]
    async fn failed_only_backend_appends_nothing_and_no_draft() {
        let h = harness(
            FakeContentStore { fail: true, ..Default::default() },
            FakeCommitStore::default(),
            Duration::from_secs(5),
        );
        let doc = document();
        let meta = artifact::build(&doc, None);
        let credentials = BackendCredentials {
            content_store: Credential::new("w3s"),
            commit_store: None,
        };

        let report = h.coordinator.publish(&meta, &doc, &credentials).await;

        assert!(!report.draft);
        assert_eq!(report.records_appended, 0);
        assert!(h.records.list().await.is_empty());
    }

    #[tokio::test]
    async fn hung_backend_hits_deadline() {
        let h = harness(
            FakeContentStore { hang: true, ..Default::default() },
            FakeCommitStore::default(),
            Duration::from_millis(50),
        );
        let doc = document();
        let meta = artifact::build(&doc, None);

        let report = h.coordinator.publish(&meta, &doc, &both()).await;

        match &report.outcomes[0].outcome {
            Outcome::Failed { error } => assert!(error.contains("no response within"), "{error}"),
            other => panic!("expected deadline failure, got {other:?}"),
        }
        assert!(report.outcomes[1].succeeded());
        assert_eq!(report.records_appended, 1);
    }

    #[tokio::test]
    async fn shutdown_cancels_attempts() {
        let h = harness(
            FakeContentStore::default(),
            FakeCommitStore::default(),
            Duration::from_secs(5),
        );
        h.shutdown.send(true).unwrap();
        let doc = document();
        let meta = artifact::build(&doc, None);

        let report = h.coordinator.publish(&meta, &doc, &both()).await;

        assert_eq!(report.records_appended, 0);
        assert!(report.outcomes.iter().all(|o| !o.succeeded()));
        assert_eq!(h.content.calls.load(Ordering::SeqCst), 0);
    }
}
