//! # Quill Transport
//!
//! HTTP transport layer for the Quill bot toolkit.
//!
//! Provides [`HttpApiClient`], the reqwest-backed implementation of the
//! [`ApiClient`](quill_core::ApiClient) capability. Failure classification
//! happens here, once: HTTP statuses go through
//! [`classify_status`](quill_core::classify_status) and transport-level
//! failures (timeout, connect) map to the transient error class.

pub mod http;

pub use http::HttpApiClient;
