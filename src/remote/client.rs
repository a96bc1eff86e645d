//! HTTP client for forwarding calls and downloading artifacts

use std::path::Path;
use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, HOST, HeaderValue};
use reqwest::{Client, RequestBuilder, Url, multipart::Form};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::precision::{normalize_request, normalize_response};
use super::{RemoteError, Result};

/// Remote client configuration
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub base_url: String,
    /// Overrides the `Host` header derived from `base_url`.
    pub host_header: Option<String>,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.runninghub.cn".to_string(),
            host_header: None,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
            user_agent: concat!("hubdeck/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Forwarder to the remote backend.
///
/// Every JSON body passing through [`RemoteClient::post_json`] and
/// [`RemoteClient::get_json`] has its task identifiers rewritten as strings.
pub struct RemoteClient {
    client: Client,
    base_url: Url,
    host_header: Option<HeaderValue>,
}

impl RemoteClient {
    pub fn new(config: RemoteConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| RemoteError::InvalidUrl(format!("{}: {}", config.base_url, e)))?;

        let host_header = config
            .host_header
            .as_deref()
            .map(HeaderValue::from_str)
            .transpose()
            .map_err(|e| RemoteError::InvalidUrl(format!("invalid host header: {}", e)))?;

        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            host_header,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// POST a JSON payload to `endpoint` and return the normalized response body.
    pub async fn post_json(&self, endpoint: &str, payload: Option<Value>) -> Result<Value> {
        let url = self.endpoint_url(endpoint)?;
        let mut payload = payload.unwrap_or(Value::Null);
        normalize_request(&mut payload);

        info!(%url, "Forwarding request");

        let body = serde_json::to_vec(&payload).map_err(|e| RemoteError::Decode(e.to_string()))?;
        let request = self
            .with_host(self.client.post(url))
            .header(CONTENT_TYPE, "application/json")
            .body(body);

        self.send_json(request).await
    }

    /// GET `endpoint` with query parameters and return the normalized body.
    pub async fn get_json(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<Value> {
        let url = self.endpoint_url(endpoint)?;
        info!(%url, "Forwarding request");

        let request = self.with_host(self.client.get(url)).query(query);
        self.send_json(request).await
    }

    /// POST a multipart form to `endpoint`.
    pub async fn post_multipart(&self, endpoint: &str, form: Form) -> Result<Value> {
        let url = self.endpoint_url(endpoint)?;
        info!(%url, "Forwarding multipart upload");

        let request = self.with_host(self.client.post(url)).multipart(form);
        self.send_json(request).await
    }

    /// Stream `url` into `dest`, chunk by chunk. Returns the number of bytes written.
    ///
    /// The URL is absolute; artifacts are usually served from a CDN rather
    /// than the API host.
    pub async fn download_to(&self, url: &str, dest: &Path) -> Result<u64> {
        let url = Url::parse(url).map_err(|e| RemoteError::InvalidUrl(format!("{}: {}", url, e)))?;

        debug!(%url, dest = %dest.display(), "Starting download");

        let mut response = self.client.get(url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        debug!(%url, size = written, "Download completed");

        Ok(written)
    }

    fn endpoint_url(&self, endpoint: &str) -> Result<Url> {
        self.base_url
            .join(endpoint)
            .map_err(|e| RemoteError::InvalidUrl(format!("{}: {}", endpoint, e)))
    }

    fn with_host(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.host_header {
            Some(host) => request.header(HOST, host.clone()),
            None => request,
        }
    }

    async fn send_json(&self, request: RequestBuilder) -> Result<Value> {
        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        let mut body: Value = match serde_json::from_slice(&bytes) {
            Ok(body) => body,
            Err(e) if status.is_success() => {
                warn!(%status, error = %e, "Remote returned a non-JSON body");
                return Err(RemoteError::Decode(e.to_string()));
            }
            Err(_) => {
                return Err(RemoteError::Status {
                    status: status.as_u16(),
                    reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
                });
            }
        };

        normalize_response(&mut body);
        Ok(body)
    }
}
