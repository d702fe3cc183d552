/// Thin wrapper over `reqwest` shared by every outbound collaborator.
///
/// Every request carries an explicit timeout. There is no retry loop: a failed call is
/// final for that invocation and the caller decides what to report.
use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::CommonError;

#[derive(Clone, Debug)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub max_error_body_bytes: usize,
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_error_body_bytes: 8 * 1024,
            user_agent: "researchband/research-feed".to_string(),
        }
    }
}

#[derive(Clone)]
pub struct HttpClient {
    config: HttpClientConfig,
    http: reqwest::Client,
}

impl HttpClient {
    pub fn new(config: HttpClientConfig) -> Result<Self, CommonError> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    pub fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.http.get(url).timeout(self.config.timeout)
    }

    pub fn post(&self, url: &str) -> reqwest::RequestBuilder {
        self.http.post(url).timeout(self.config.timeout)
    }

    pub fn put(&self, url: &str) -> reqwest::RequestBuilder {
        self.http.put(url).timeout(self.config.timeout)
    }

    /// Send a request and decode a JSON body, turning non-2xx statuses into
    /// `CommonError::Upstream` with a size-capped body.
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, CommonError> {
        let resp = request.send().await?;
        if !resp.status().is_success() {
            return Err(self.to_upstream_error(resp).await);
        }
        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn to_upstream_error(&self, resp: reqwest::Response) -> CommonError {
        let status = resp.status();
        let body = read_limited_text(resp, self.config.max_error_body_bytes).await;
        CommonError::Upstream { status, body }
    }
}

async fn read_limited_text(resp: reqwest::Response, max_bytes: usize) -> String {
    match resp.bytes().await {
        Ok(b) => {
            let end = b.len().min(max_bytes);
            String::from_utf8_lossy(&b[..end]).to_string()
        }
        Err(e) => {
            warn!(error = %e, "failed to read upstream error body");
            "<failed to read error body>".to_string()
        }
    }
}
