/// Publish backends: a content-addressed store (web3.storage, resolved through an
/// IPFS gateway) and a commit store (GitHub contents API).
use std::fmt;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};

use band_common::http::HttpClient;

use crate::error::BackendError;
use crate::model::{ArtifactMetadata, RepoRef};

/// An opaque secret. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Blank input means "no credential".
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommitResponse {
    #[serde(default)]
    pub content: Option<CommittedContent>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommittedContent {
    #[serde(default)]
    pub html_url: Option<String>,
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Upload the metadata JSON and return its content identifier.
    async fn upload(
        &self,
        credential: &Credential,
        metadata: &ArtifactMetadata,
    ) -> Result<String, BackendError>;

    /// Public URL for a content identifier.
    fn gateway_url(&self, cid: &str) -> String;
}

#[async_trait]
pub trait CommitStore: Send + Sync {
    /// Create or replace `path` on `repo`'s branch with `content`.
    async fn commit(
        &self,
        credential: &Credential,
        repo: &RepoRef,
        path: &str,
        content: &str,
    ) -> Result<CommitResponse, BackendError>;
}

pub struct Web3Storage {
    http: HttpClient,
    api_url: String,
    gateway: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    cid: Option<String>,
}

impl Web3Storage {
    pub fn new(http: HttpClient, api_url: &str, gateway: &str) -> Self {
        Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            gateway: gateway.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ContentStore for Web3Storage {
    async fn upload(
        &self,
        credential: &Credential,
        metadata: &ArtifactMetadata,
    ) -> Result<String, BackendError> {
        let url = format!("{}/upload", self.api_url);
        let request = self
            .http
            .post(&url)
            .bearer_auth(credential.expose())
            .json(metadata);
        let response: UploadResponse = self.http.send_json(request).await?;
        response
            .cid
            .filter(|cid| !cid.is_empty())
            .ok_or_else(|| BackendError::Malformed("upload response has no cid".to_string()))
    }

    fn gateway_url(&self, cid: &str) -> String {
        if self.gateway.contains("://") {
            format!("{}/ipfs/{cid}", self.gateway)
        } else {
            format!("https://{}/ipfs/{cid}", self.gateway)
        }
    }
}

pub struct GitHubCommitStore {
    http: HttpClient,
    api_url: String,
}

#[derive(Debug, Serialize)]
struct PutContentRequest<'a> {
    message: String,
    content: String,
    branch: &'a str,
}

impl GitHubCommitStore {
    pub fn new(http: HttpClient, api_url: &str) -> Self {
        Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl CommitStore for GitHubCommitStore {
    async fn commit(
        &self,
        credential: &Credential,
        repo: &RepoRef,
        path: &str,
        content: &str,
    ) -> Result<CommitResponse, BackendError> {
        let url = format!(
            "{}/repos/{}/{}/contents/{path}",
            self.api_url, repo.owner, repo.repo
        );
        let body = PutContentRequest {
            message: format!("Add token metadata {path}"),
            content: general_purpose::STANDARD.encode(content.as_bytes()),
            branch: &repo.branch,
        };
        let request = self
            .http
            .put(&url)
            .header("Accept", "application/vnd.github.v3+json")
            .header("Authorization", format!("token {}", credential.expose()))
            .json(&body);
        Ok(self.http.send_json(request).await?)
    }
}
