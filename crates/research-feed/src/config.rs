use std::time::Duration;

use band_common::http::HttpClientConfig;

use crate::annotate::AnnotateMode;
use crate::backends::Credential;
use crate::error::AppError;

/// Application configuration loaded explicitly from environment variables.
///
/// Every endpoint has a public default so the server starts with no configuration at
/// all; credentials have none. Without `REDIS_URL` token records only live as long
/// as the process.
#[derive(Debug, Clone)]
pub struct Config {
    /// Redis connection URL (e.g. "redis://127.0.0.1:6379"). `None` keeps records in process.
    pub redis_url: Option<String>,
    /// Base URL of the GitHub REST API, used for loading and for commits.
    pub github_api_url: String,
    /// Repository directory holding the feed documents.
    pub feed_directory: String,
    /// Base URL of the web3.storage API.
    pub w3s_api_url: String,
    /// Host (or base URL) of the IPFS gateway used in CID links.
    pub ipfs_gateway: String,
    pub w3s_token: Option<Credential>,
    pub github_commit_token: Option<Credential>,
    pub author_identity: Option<String>,
    pub annotate_mode: AnnotateMode,
    pub http: HttpClientConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Optional:
    /// - `REDIS_URL`
    /// - `GITHUB_API_URL` (default `https://api.github.com`)
    /// - `FEED_DIRECTORY` (default `o`)
    /// - `W3S_API_URL` (default `https://api.web3.storage`)
    /// - `IPFS_GATEWAY` (default `ipfs.io`)
    /// - `W3S_TOKEN`, `GITHUB_COMMIT_TOKEN`: default publish credentials
    /// - `AUTHOR_IDENTITY`: `created_by` for artifacts
    /// - `ANNOTATE_MODE`: `legacy` (default) or `segmented`
    /// - `BACKEND_TIMEOUT_SECS` (default 30), `HTTP_MAX_ERROR_BODY_BYTES` (default 8192)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let or_default =
            |key: &str, default: &str| non_empty(key).unwrap_or_else(|| default.to_string());

        let annotate_mode = match non_empty("ANNOTATE_MODE") {
            Some(raw) => raw.parse()?,
            None => AnnotateMode::default(),
        };

        let mut http = HttpClientConfig::default();
        if let Some(raw) = non_empty("BACKEND_TIMEOUT_SECS") {
            let secs = raw
                .parse::<u64>()
                .ok()
                .filter(|&n| n > 0)
                .ok_or_else(|| {
                    AppError::Config(format!(
                        "BACKEND_TIMEOUT_SECS must be a positive integer, got '{raw}'"
                    ))
                })?;
            http.timeout = Duration::from_secs(secs);
        }
        if let Some(raw) = non_empty("HTTP_MAX_ERROR_BODY_BYTES") {
            http.max_error_body_bytes = raw.parse::<usize>().map_err(|_| {
                AppError::Config(format!(
                    "HTTP_MAX_ERROR_BODY_BYTES must be an integer, got '{raw}'"
                ))
            })?;
        }

        let feed_directory = or_default("FEED_DIRECTORY", "o").trim_matches('/').to_string();
        if feed_directory.is_empty() {
            return Err(AppError::Config("FEED_DIRECTORY must name a directory".to_string()));
        }

        Ok(Self {
            redis_url: non_empty("REDIS_URL"),
            github_api_url: or_default("GITHUB_API_URL", "https://api.github.com"),
            feed_directory,
            w3s_api_url: or_default("W3S_API_URL", "https://api.web3.storage"),
            ipfs_gateway: or_default("IPFS_GATEWAY", "ipfs.io"),
            w3s_token: non_empty("W3S_TOKEN").and_then(Credential::new),
            github_commit_token: non_empty("GITHUB_COMMIT_TOKEN").and_then(Credential::new),
            author_identity: non_empty("AUTHOR_IDENTITY"),
            annotate_mode,
            http,
        })
    }

    /// Deadline applied to each publish backend call.
    pub fn backend_deadline(&self) -> Duration {
        self.http.timeout
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config, AppError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_need_no_environment() {
        let config = load(&[]).unwrap();
        assert_eq!(config.github_api_url, "https://api.github.com");
        assert_eq!(config.feed_directory, "o");
        assert_eq!(config.ipfs_gateway, "ipfs.io");
        assert_eq!(config.annotate_mode, AnnotateMode::Legacy);
        assert_eq!(config.backend_deadline(), Duration::from_secs(30));
        assert!(config.redis_url.is_none());
        assert!(config.w3s_token.is_none());
        assert!(config.github_commit_token.is_none());
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = load(&[
            ("W3S_TOKEN", "  "),
            ("REDIS_URL", ""),
            ("FEED_DIRECTORY", " "),
        ])
        .unwrap();
        assert!(config.w3s_token.is_none());
        assert!(config.redis_url.is_none());
        assert_eq!(config.feed_directory, "o");
    }

    #[test]
    fn explicit_values_are_used() {
        let config = load(&[
            ("ANNOTATE_MODE", "segmented"),
            ("BACKEND_TIMEOUT_SECS", "5"),
            ("GITHUB_COMMIT_TOKEN", "gh"),
            ("FEED_DIRECTORY", "/articles/"),
        ])
        .unwrap();
        assert_eq!(config.annotate_mode, AnnotateMode::Segmented);
        assert_eq!(config.backend_deadline(), Duration::from_secs(5));
        assert_eq!(config.github_commit_token.unwrap().expose(), "gh");
        assert_eq!(config.feed_directory, "articles");
    }

    #[test]
    fn invalid_values_are_config_errors() {
        assert!(matches!(load(&[("ANNOTATE_MODE", "fancy")]), Err(AppError::Config(_))));
        assert!(matches!(load(&[("BACKEND_TIMEOUT_SECS", "0")]), Err(AppError::Config(_))));
        assert!(matches!(load(&[("BACKEND_TIMEOUT_SECS", "soon")]), Err(AppError::Config(_))));
        assert!(matches!(load(&[("FEED_DIRECTORY", "///")]), Err(AppError::Config(_))));
    }
}
