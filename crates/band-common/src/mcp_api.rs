use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct LoadDocumentsParams {
    /// Repository in "owner/repo" form.
    pub repository: String,
    /// Branch to read from (default: "main").
    pub branch: Option<String>,
    /// Optional access token attached to every source request.
    pub token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListDocumentsParams {
    /// "all" (default) or a category such as "blue" or "pink".
    pub filter: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ReadDocumentParams {
    /// Document file name exactly as listed, e.g. "alpha.md".
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct PublishDocumentParams {
    /// Document file name exactly as listed.
    pub name: String,
    /// Content-addressed store key; falls back to the server's configured key.
    pub content_store_key: Option<String>,
    /// Commit store key; falls back to the server's configured key.
    pub commit_store_key: Option<String>,
    /// Author identity recorded in the artifact; falls back to configuration, then "anonymous".
    pub created_by: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LoadDocumentsResponse {
    pub repository: String,
    pub branch: String,
    pub document_count: usize,
    pub names: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DocumentSummary {
    pub name: String,
    pub path: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ListDocumentsResponse {
    pub filter: String,
    pub documents: Vec<DocumentSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ReadDocumentResponse {
    pub name: String,
    pub path: String,
    /// Escaped document text with cross-reference anchors and category highlight spans.
    pub html: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CategoryInfo {
    pub name: String,
    /// Inline marker that forces the category, e.g. "[tag:red]".
    pub marker: String,
    /// Keyword pattern (word-bounded, case-insensitive).
    pub pattern: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ListCategoriesResponse {
    pub categories: Vec<CategoryInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ArtifactMetadataInfo {
    pub name: String,
    pub description: String,
    pub article_file: String,
    pub created_by: String,
    pub created_at: String,
    pub research_snippet: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BackendOutcomeInfo {
    /// "content_store" or "commit_store".
    pub backend: String,
    pub succeeded: bool,
    pub cid: Option<String>,
    pub gateway_url: Option<String>,
    pub commit_url: Option<String>,
    pub path: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PublishDocumentResponse {
    pub metadata: ArtifactMetadataInfo,
    pub outcomes: Vec<BackendOutcomeInfo>,
    /// True when no backend was configured and the metadata was kept as a local draft.
    pub draft: bool,
    pub records_appended: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TokenRecordInfo {
    pub name: String,
    pub source_article: String,
    /// Unix milliseconds.
    pub created_at: i64,
    /// "content_store", "commit_store" or "draft".
    pub kind: String,
    pub metadata_cid: Option<String>,
    pub commit_url: Option<String>,
    pub path: Option<String>,
    pub metadata: Option<ArtifactMetadataInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ListRecordsResponse {
    pub records: Vec<TokenRecordInfo>,
}
