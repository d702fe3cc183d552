/// MCP server for the research feed.
///
/// Exposes six tools:
/// - `load_documents`: Load the feed directory of a repository, replacing the current set
/// - `list_documents`: List loaded documents, optionally filtered by category
/// - `read_document`: Render one document with highlights and cross-references
/// - `publish_document`: Build artifact metadata from a document and publish it
/// - `list_records`: Show every locally recorded publication
/// - `list_categories`: Show the category rule table
use std::sync::Arc;

use rmcp::{
    Json, RoleServer, ServerHandler,
    handler::server::router::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::*,
    service::{QuitReason, RunningService},
    tool, tool_handler, tool_router,
};
use tokio::sync::watch;
use tracing::{info, warn};

use band_common::mcp_api::{
    ArtifactMetadataInfo, BackendOutcomeInfo, CategoryInfo, DocumentSummary,
    ListCategoriesResponse, ListDocumentsParams, ListDocumentsResponse, ListRecordsResponse,
    LoadDocumentsParams, LoadDocumentsResponse, PublishDocumentParams, PublishDocumentResponse,
    ReadDocumentParams, ReadDocumentResponse, TokenRecordInfo,
};

use crate::annotate::Annotator;
use crate::artifact;
use crate::backends::Credential;
use crate::config::Config;
use crate::corpus::{Corpus, DocumentFilter, Snapshot};
use crate::model::{ArtifactMetadata, RecordLocation, RepoRef, TokenRecord};
use crate::publish::{
    BackendCredentials, BackendOutcome, CommitTarget, Outcome, PublishCoordinator,
};
use crate::records::RecordStore;
use crate::source::GitHubSource;
use crate::tags::{self, Category, TagRuleSet};

#[derive(Clone)]
pub struct ResearchFeedServer {
    corpus: Arc<Corpus>,
    source: Arc<GitHubSource>,
    annotator: Annotator,
    coordinator: Arc<PublishCoordinator>,
    records: Arc<RecordStore>,
    config: Arc<Config>,
    tool_router: ToolRouter<ResearchFeedServer>,
}

impl ResearchFeedServer {
    pub fn new(
        corpus: Arc<Corpus>,
        source: Arc<GitHubSource>,
        coordinator: Arc<PublishCoordinator>,
        records: Arc<RecordStore>,
        config: Config,
    ) -> Self {
        Self {
            corpus,
            source,
            annotator: Annotator::new(config.annotate_mode),
            coordinator,
            records,
            config: Arc::new(config),
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_router]
impl ResearchFeedServer {
    #[tool(description = "Load every .txt/.md/.markdown document from the feed directory of a GitHub repository ('owner/repo'). Replaces the current document set only if every file loads.")]
    async fn load_documents(
        &self,
        Parameters(params): Parameters<LoadDocumentsParams>,
    ) -> Result<Json<LoadDocumentsResponse>, String> {
        let repo = RepoRef::parse(&params.repository, params.branch.as_deref())
            .map_err(|e| e.to_string())?;

        let documents = self
            .source
            .load(&repo, params.token.as_deref())
            .await
            .inspect_err(|e| {
                warn!(repo = %repo, error = %e, "load failed, keeping previous documents")
            })
            .map_err(|e| format!("load failed: {e}"))?;

        let names: Vec<String> = documents.iter().map(|d| d.name.clone()).collect();
        let response = LoadDocumentsResponse {
            repository: format!("{}/{}", repo.owner, repo.repo),
            branch: repo.branch.clone(),
            document_count: names.len(),
            names,
        };

        self.corpus.replace(Snapshot::new(repo, documents)).await;
        info!(documents = response.document_count, "document set replaced");

        Ok(Json(response))
    }

    #[tool(description = "List loaded documents with their category tags. Filter with 'all' (default) or a category: green, orange, blue, yellow, red, pink, purple.")]
    async fn list_documents(
        &self,
        Parameters(params): Parameters<ListDocumentsParams>,
    ) -> Result<Json<ListDocumentsResponse>, String> {
        let filter: DocumentFilter = params
            .filter
            .as_deref()
            .unwrap_or("all")
            .parse()
            .map_err(|e: crate::error::AppError| e.to_string())?;

        let snapshot = self.corpus.snapshot().await;
        let documents = snapshot
            .filter(filter)
            .into_iter()
            .map(|d| DocumentSummary {
                name: d.name.clone(),
                path: d.path.clone(),
                tags: tag_names(&tags::classify(&d.content)),
            })
            .collect();

        info!(filter = %filter, "listed documents");
        Ok(Json(ListDocumentsResponse {
            filter: filter.to_string(),
            documents,
        }))
    }

    #[tool(description = "Render a document as markup: escaped text, cross-reference links to other loaded documents, and category highlight spans.")]
    async fn read_document(
        &self,
        Parameters(params): Parameters<ReadDocumentParams>,
    ) -> Result<Json<ReadDocumentResponse>, String> {
        let snapshot = self.corpus.snapshot().await;
        let document = snapshot.find(&params.name).map_err(|e| e.to_string())?;
        let annotation = self.annotator.annotate(&document.content, &snapshot.names());

        Ok(Json(ReadDocumentResponse {
            name: document.name.clone(),
            path: document.path.clone(),
            html: annotation.html,
            tags: tag_names(&annotation.tags),
        }))
    }

    #[tool(description = "Create artifact metadata from a loaded document and publish it to every backend with a key (content-addressed store, repository commit). With no key the metadata is saved locally as a draft. Returns per-backend outcomes.")]
    async fn publish_document(
        &self,
        Parameters(params): Parameters<PublishDocumentParams>,
    ) -> Result<Json<PublishDocumentResponse>, String> {
        let snapshot = self.corpus.snapshot().await;
        let document = snapshot.find(&params.name).map_err(|e| e.to_string())?;

        let author = params
            .created_by
            .as_deref()
            .or(self.config.author_identity.as_deref());
        let metadata = artifact::build(document, author);

        let credentials = self.credentials(&snapshot, &params);
        info!(
            name = %document.name,
            content_store = credentials.content_store.is_some(),
            commit_store = credentials.commit_store.is_some(),
            "publishing document"
        );
        let report = self.coordinator.publish(&metadata, document, &credentials).await;

        Ok(Json(PublishDocumentResponse {
            metadata: to_api_metadata(&report.metadata),
            outcomes: report.outcomes.iter().map(to_api_outcome).collect(),
            draft: report.draft,
            records_appended: report.records_appended,
        }))
    }

    #[tool(description = "List every locally recorded publication (content-store uploads, commits, drafts), oldest first.")]
    async fn list_records(&self) -> Result<Json<ListRecordsResponse>, String> {
        let records = self.records.list().await;
        Ok(Json(ListRecordsResponse {
            records: records.iter().map(to_api_record).collect(),
        }))
    }

    #[tool(description = "List the seven categories with their inline marker and keyword pattern.")]
    async fn list_categories(&self) -> Result<Json<ListCategoriesResponse>, String> {
        let categories = TagRuleSet::standard()
            .rules()
            .iter()
            .map(|rule| CategoryInfo {
                name: rule.category.to_string(),
                marker: rule.category.marker(),
                pattern: rule.pattern.as_str().to_string(),
            })
            .collect();
        Ok(Json(ListCategoriesResponse { categories }))
    }
}

impl ResearchFeedServer {
    /// Keys from the call win over configured ones. Commits go to the repository the
    /// current document set came from.
    fn credentials(
        &self,
        snapshot: &Snapshot,
        params: &PublishDocumentParams,
    ) -> BackendCredentials {
        let content_store = params
            .content_store_key
            .clone()
            .and_then(Credential::new)
            .or_else(|| self.config.w3s_token.clone());

        let commit_key = params
            .commit_store_key
            .clone()
            .and_then(Credential::new)
            .or_else(|| self.config.github_commit_token.clone());
        let commit_store = commit_key
            .zip(snapshot.repo.clone())
            .map(|(credential, repo)| CommitTarget { credential, repo });

        BackendCredentials {
            content_store,
            commit_store,
        }
    }
}

fn tag_names<'a>(tags: impl IntoIterator<Item = &'a Category>) -> Vec<String> {
    tags.into_iter().map(|c| c.to_string()).collect()
}

fn to_api_metadata(metadata: &ArtifactMetadata) -> ArtifactMetadataInfo {
    ArtifactMetadataInfo {
        name: metadata.name.clone(),
        description: metadata.description.clone(),
        article_file: metadata.article_file.clone(),
        created_by: metadata.created_by.clone(),
        created_at: metadata.created_at.clone(),
        research_snippet: metadata.research_snippet.clone(),
    }
}

fn to_api_outcome(outcome: &BackendOutcome) -> BackendOutcomeInfo {
    let mut info = BackendOutcomeInfo {
        backend: outcome.backend.as_str().to_string(),
        succeeded: outcome.succeeded(),
        cid: None,
        gateway_url: None,
        commit_url: None,
        path: None,
        error: None,
    };
    match &outcome.outcome {
        Outcome::Uploaded { cid, gateway_url } => {
            info.cid = Some(cid.clone());
            info.gateway_url = Some(gateway_url.clone());
        }
        Outcome::Committed { commit_url, path } => {
            info.commit_url = Some(commit_url.clone());
            info.path = Some(path.clone());
        }
        Outcome::Failed { error } => info.error = Some(error.clone()),
    }
    info
}

fn to_api_record(record: &TokenRecord) -> TokenRecordInfo {
    let mut info = TokenRecordInfo {
        name: record.name.clone(),
        source_article: record.source_article.clone(),
        created_at: record.created_at,
        kind: String::new(),
        metadata_cid: None,
        commit_url: None,
        path: None,
        metadata: None,
    };
    match &record.location {
        RecordLocation::ContentStore { metadata_cid } => {
            info.kind = "content_store".to_string();
            info.metadata_cid = Some(metadata_cid.clone());
        }
        RecordLocation::CommitStore { commit_url, path } => {
            info.kind = "commit_store".to_string();
            info.commit_url = Some(commit_url.clone());
            info.path = Some(path.clone());
        }
        RecordLocation::Draft { metadata } => {
            info.kind = "draft".to_string();
            info.metadata = Some(to_api_metadata(metadata));
        }
    }
    info
}

#[tool_handler]
impl ServerHandler for ResearchFeedServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_06_18,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .build(),
            server_info: Implementation {
                name: "research-feed".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Research feed MCP server. Use load_documents to pull a repository's feed \
                 directory, list_documents to browse (optionally by category), read_document \
                 to see a document with highlights and cross-references, publish_document to \
                 turn a document into artifact metadata and publish it, and list_records to \
                 review past publications."
                    .to_string(),
            ),
        }
    }
}

/// Wait for the service to end, cancelling it once `shutdown` turns true.
pub async fn run_until_shutdown(
    service: RunningService<RoleServer, ResearchFeedServer>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<QuitReason, tokio::task::JoinError> {
    let cancel = service.cancellation_token();
    let watcher = tokio::spawn(async move {
        if shutdown.wait_for(|stop| *stop).await.is_ok() {
            info!("stopping MCP service");
            cancel.cancel();
        }
    });
    let reason = service.waiting().await;
    watcher.abort();
    reason
}
