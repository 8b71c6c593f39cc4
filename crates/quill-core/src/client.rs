//! Remote call capability.
//!
//! [`ApiClient`] is the single seam between Quill and the platform's HTTP
//! surface: `call(request) -> response | error`. Implementations classify
//! failures into the [`ClientError`](crate::error::ClientError) taxonomy;
//! everything above this trait is transport-agnostic, which is what lets
//! tests substitute scripted clients for the real one.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::ClientResult;

/// HTTP method of an [`ApiRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl Method {
    /// Returns the method as an uppercase token.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Delete => "DELETE",
        }
    }
}

/// A request against the platform API.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// HTTP method.
    pub method: Method,
    /// Path relative to the platform host (e.g. `/feeds/{id}/read`).
    pub path: String,
    /// Query parameters.
    pub query: Vec<(String, String)>,
    /// Additional headers (auth tokens land here).
    pub headers: Vec<(String, String)>,
    /// JSON body, if any.
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    /// Creates a GET request for `path`.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    /// Creates a POST request for `path`.
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    /// Creates a DELETE request for `path`.
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Appends a query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Appends a header.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Attaches the platform session-token header.
    pub fn session_token(self, token: impl Into<String>) -> Self {
        self.header("sessionToken", token)
    }

    /// Serializes `body` as the JSON request body.
    pub fn json<T: Serialize>(mut self, body: &T) -> ClientResult<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }
}

/// A response from the platform API.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// HTTP status code. Implementations only return success statuses;
    /// failures are classified into errors instead.
    pub status: u16,
    /// Raw response body.
    pub body: String,
}

impl ApiResponse {
    /// Deserializes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> ClientResult<T> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// The remote call capability consumed by every Quill component.
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// Performs one remote call.
    ///
    /// Implementations classify non-success statuses and transport
    /// failures into [`ClientError`](crate::error::ClientError) variants;
    /// an `Ok` response always carries a success status.
    async fn call(&self, request: ApiRequest) -> ClientResult<ApiResponse>;
}

/// A shared, type-erased API client.
pub type BoxedApiClient = Arc<dyn ApiClient>;
