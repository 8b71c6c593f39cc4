//! # Quill Core
//!
//! The core engine of the Quill bot toolkit.
//!
//! This crate provides the pieces every other Quill crate builds on:
//!
//! - **Error taxonomy**: a closed classification of remote failures
//!   ([`ClientError`], [`ErrorClass`]) produced once per transport.
//! - **Retry executor**: bounded/unbounded retries with capped exponential
//!   backoff and pluggable recovery actions ([`RetryExecutor`],
//!   [`RetryPolicy`], [`RecoveryStrategy`]).
//! - **Event model**: the normalized tagged union both feed protocols map
//!   into ([`Event`], [`EventPayload`]).
//! - **Call capability**: the transport seam ([`ApiClient`]).
//!
//! ```text
//! ┌────────────┐    ┌───────────────┐    ┌───────────┐
//! │ FeedClient │───▶│ RetryExecutor │───▶│ ApiClient │
//! │ (datafeed) │    │    (core)     │    │(transport)│
//! └────────────┘    └───────────────┘    └───────────┘
//! ```

pub mod client;
pub mod error;
pub mod event;
pub mod retry;

pub use client::{ApiClient, ApiRequest, ApiResponse, BoxedApiClient, Method};
pub use error::{ClientError, ClientResult, ErrorClass, TransientKind, classify_status};
pub use event::{Event, EventKind, EventPayload, InboundMessage, MessageEntity, UserRef};
pub use retry::{
    RecoveryAction, RecoveryPredicate, RecoveryStrategy, RetryAttempts, RetryExecutor, RetryPolicy,
};
