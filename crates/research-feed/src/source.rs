/// Document source backed by the GitHub contents API.
///
/// A load lists one directory, keeps the `.txt` / `.md` / `.markdown` files, and
/// fetches each file in turn. Any failure aborts the whole load; the caller only
/// installs a snapshot when every file came back.
use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;
use tracing::{debug, info};

use band_common::http::HttpClient;

use crate::error::AppError;
use crate::model::{Document, RepoRef};

const TEXT_SUFFIXES: [&str; 3] = [".txt", ".md", ".markdown"];

#[derive(Debug, Deserialize)]
struct ContentEntry {
    name: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct FileContent {
    #[serde(default)]
    content: Option<String>,
}

pub struct GitHubSource {
    http: HttpClient,
    api_url: String,
    directory: String,
}

impl GitHubSource {
    pub fn new(http: HttpClient, api_url: &str, directory: &str) -> Self {
        Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            directory: directory.trim_matches('/').to_string(),
        }
    }

    /// Fetch every text document in the feed directory of `repo`.
    pub async fn load(
        &self,
        repo: &RepoRef,
        token: Option<&str>,
    ) -> Result<Vec<Document>, AppError> {
        let listing = self.fetch(repo, token, &self.directory).await?;
        let entries: Vec<ContentEntry> = match listing {
            serde_json::Value::Array(_) => {
                serde_json::from_value(listing).map_err(|e| self.retrieval(&self.directory, e))?
            }
            _ => {
                return Err(AppError::Retrieval {
                    path: self.directory.clone(),
                    message: "not a directory".to_string(),
                })
            }
        };

        let mut documents = Vec::new();
        for entry in entries
            .into_iter()
            .filter(|e| e.kind == "file" && is_text_document(&e.name))
        {
            let path = format!("{}/{}", self.directory, entry.name);
            debug!(path = %path, "fetching document");
            let file: FileContent = serde_json::from_value(self.fetch(repo, token, &path).await?)
                .map_err(|e| self.retrieval(&path, e))?;
            let content = decode_content(file.content.as_deref().unwrap_or_default())
                .map_err(|message| AppError::Retrieval {
                    path: path.clone(),
                    message,
                })?;
            documents.push(Document {
                path,
                name: entry.name,
                content,
            });
        }

        info!(repo = %repo, documents = documents.len(), "loaded documents");
        Ok(documents)
    }

    async fn fetch(
        &self,
        repo: &RepoRef,
        token: Option<&str>,
        path: &str,
    ) -> Result<serde_json::Value, AppError> {
        let url = format!(
            "{}/repos/{}/{}/contents/{path}",
            self.api_url, repo.owner, repo.repo
        );
        let mut request = self
            .http
            .get(&url)
            .query(&[("ref", repo.branch.as_str())])
            .header("Accept", "application/vnd.github.v3+json");
        if let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) {
            request = request.header("Authorization", format!("token {token}"));
        }
        self.http
            .send_json(request)
            .await
            .map_err(|e| self.retrieval(path, e))
    }

    fn retrieval(&self, path: &str, err: impl std::fmt::Display) -> AppError {
        AppError::Retrieval {
            path: path.to_string(),
            message: err.to_string(),
        }
    }
}

fn is_text_document(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    TEXT_SUFFIXES.iter().any(|suffix| lower.ends_with(suffix))
}

/// GitHub wraps base64 at 60 columns.
fn decode_content(encoded: &str) -> Result<String, String> {
    let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| format!("invalid base64 content: {e}"))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
