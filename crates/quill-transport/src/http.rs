//! reqwest-backed implementation of the [`ApiClient`] capability.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use tracing::{debug, trace};

use quill_core::{
    ApiClient, ApiRequest, ApiResponse, ClientError, ClientResult, Method, TransientKind,
    classify_status,
};

/// Default overall request timeout.
///
/// Long-poll feed reads block server-side for up to 30s, so the transport
/// timeout has to sit comfortably above that.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// HTTP client for the platform API.
///
/// One instance is shared by every component talking to the same host;
/// reqwest pools connections internally, so cloning is cheap.
#[derive(Clone)]
pub struct HttpApiClient {
    base_url: String,
    client: Client,
}

impl HttpApiClient {
    /// Creates a client for the given platform host (e.g.
    /// `https://acme.example.com`).
    pub fn new(base_url: impl Into<String>) -> ClientResult<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Creates a client with a custom overall request timeout.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> ClientResult<Self> {
        let client = ClientBuilder::new()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Initialization(format!("http client: {e}")))?;

        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }

        Ok(Self { base_url, client })
    }

    /// Maps a reqwest failure (no HTTP response) into the taxonomy.
    fn classify_transport(err: reqwest::Error) -> ClientError {
        if err.is_timeout() {
            ClientError::transient(TransientKind::Timeout, err.to_string())
        } else if err.is_connect() {
            ClientError::transient(TransientKind::Connect, err.to_string())
        } else {
            ClientError::permanent(0, err.to_string())
        }
    }
}

#[async_trait]
impl ApiClient for HttpApiClient {
    async fn call(&self, request: ApiRequest) -> ClientResult<ApiResponse> {
        let url = format!("{}{}", self.base_url, request.path);
        trace!(method = request.method.as_str(), url = %url, "API call");

        let mut builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Delete => self.client.delete(&url),
        };
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(Self::classify_transport)?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(Self::classify_transport)?;

        if !(200..300).contains(&status) {
            debug!(status, url = %url, "API call failed");
            return Err(classify_status(status, &body));
        }

        Ok(ApiResponse { status, body })
    }
}

impl std::fmt::Debug for HttpApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpApiClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}
