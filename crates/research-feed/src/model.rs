use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// A text document loaded from the feed directory. Never mutated after load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Repository-relative path, e.g. "o/alpha.md"
    pub path: String,
    /// File name, e.g. "alpha.md". Also the cross-reference key.
    pub name: String,
    pub content: String,
}

/// Repository the document set was loaded from; commits go back to the same place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
    pub branch: String,
}

impl RepoRef {
    /// Parse "owner/repo". An empty branch falls back to "main".
    pub fn parse(repository: &str, branch: Option<&str>) -> Result<Self, AppError> {
        let repository = repository.trim();
        let (owner, repo) = repository
            .split_once('/')
            .filter(|(o, r)| !o.is_empty() && !r.is_empty() && !r.contains('/'))
            .ok_or_else(|| AppError::InvalidRepository(repository.to_string()))?;

        let branch = branch
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .unwrap_or("main");

        Ok(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            branch: branch.to_string(),
        })
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.owner, self.repo, self.branch)
    }
}

/// Metadata derived from a document for publication.
///
/// Field order is the wire order of the published JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub name: String,
    pub description: String,
    /// Source document path
    pub article_file: String,
    pub created_by: String,
    /// ISO-8601, millisecond precision, UTC
    pub created_at: String,
    pub research_snippet: String,
}

/// Where a published artifact ended up. Exactly one per record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordLocation {
    ContentStore {
        #[serde(rename = "metadataCid")]
        metadata_cid: String,
    },
    CommitStore {
        #[serde(rename = "commitUrl")]
        commit_url: String,
        path: String,
    },
    Draft {
        metadata: ArtifactMetadata,
    },
}

/// Locally persisted outcome of one backend attempt (or one draft).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub name: String,
    #[serde(rename = "sourceArticle")]
    pub source_article: String,
    /// Unix milliseconds
    pub created_at: i64,
    #[serde(flatten)]
    pub location: RecordLocation,
}
