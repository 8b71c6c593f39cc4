//! Feed clients.
//!
//! Two incompatible wire protocols deliver the same real-time event
//! stream; [`FeedClient`] abstracts both behind one acquire/pull/release
//! contract, selected at construction time:
//!
//! - [`ExplicitFeedClient`]: a feed is created server-side (`POST
//!   /agent/feeds`), read by id, and deleted on clean shutdown. The feed
//!   id can be persisted by the caller and reused across restarts.
//! - [`CursorFeedClient`]: the server keeps per-identity feed state; each
//!   read carries the previous acknowledgment token and returns the next
//!   one.
//!
//! Both variants recover feed invalidation transparently: when the
//! platform reports the feed or cursor gone (HTTP 410), the client
//! reacquires a fresh position and resumes. **Events between the last
//! acknowledged position and the fresh position are lost** — delivery is
//! best-effort with possible gaps, and callers must not assume otherwise.
//!
//! Every remote call runs through the retry executor bound at
//! construction, whose recovery strategy refreshes the bound session on
//! unauthorized.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use quill_auth::BoxedSession;
use quill_core::{
    ApiRequest, BoxedApiClient, ClientError, ClientResult, Event, RetryExecutor,
};

use crate::wire::{ReadResponse, normalize};

/// Status the platform uses to signal a stale feed or cursor.
const FEED_GONE: u16 = 410;

/// Returns true when `err` is the platform's feed-invalidated signal.
fn is_feed_invalidated(err: &ClientError) -> bool {
    matches!(err, ClientError::Permanent { status, .. } if *status == FEED_GONE)
}

// =============================================================================
// Feed Handle
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Handle {
    Feed { id: String },
    Cursor { ack_id: String },
}

/// Opaque feed position, owned by exactly one event loop.
///
/// Handles are produced by [`FeedClient::start`] and threaded through
/// every [`FeedClient::pull`]; they are not meant to be shared or reused
/// across loops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedHandle(Handle);

impl FeedHandle {
    /// Returns the feed id for the explicit-feed variant, for callers
    /// that persist it across restarts.
    pub fn feed_id(&self) -> Option<&str> {
        match &self.0 {
            Handle::Feed { id } => Some(id),
            Handle::Cursor { .. } => None,
        }
    }

    pub(crate) fn feed(id: String) -> Self {
        Self(Handle::Feed { id })
    }

    pub(crate) fn cursor(ack_id: String) -> Self {
        Self(Handle::Cursor { ack_id })
    }
}

// =============================================================================
// Feed Client Trait
// =============================================================================

/// The feed contract both protocol variants implement.
#[async_trait]
pub trait FeedClient: Send + Sync {
    /// Acquires the initial feed position.
    async fn start(&self) -> ClientResult<FeedHandle>;

    /// Pulls the next batch of events.
    ///
    /// Blocks for up to the server-side long-poll window; an empty batch
    /// is a normal outcome. Feed invalidation is recovered internally
    /// (with a fresh position and a possible gap) and only surfaces if
    /// reacquisition itself fails.
    async fn pull(&self, handle: FeedHandle) -> ClientResult<(Vec<Event>, FeedHandle)>;

    /// Releases the feed on clean shutdown.
    async fn stop(&self, handle: FeedHandle) -> ClientResult<()>;
}

/// A shared, type-erased feed client.
pub type BoxedFeedClient = Arc<dyn FeedClient>;

// =============================================================================
// Explicit-Feed Variant
// =============================================================================

#[derive(Deserialize)]
struct CreateFeedResponse {
    id: String,
}

/// Feed client for the explicit create/read/delete protocol.
pub struct ExplicitFeedClient {
    client: BoxedApiClient,
    executor: RetryExecutor,
    session: BoxedSession,
    /// Feed id persisted by the caller from a previous run, if any.
    persisted_id: Option<String>,
}

impl ExplicitFeedClient {
    /// Creates a client over the given transport, retry executor and
    /// session.
    pub fn new(client: BoxedApiClient, executor: RetryExecutor, session: BoxedSession) -> Self {
        Self {
            client,
            executor,
            session,
            persisted_id: None,
        }
    }

    /// Reuses a feed id persisted from a previous run.
    ///
    /// A stale persisted id is not an error: the first read recreates the
    /// feed transparently.
    pub fn with_persisted_id(mut self, id: impl Into<String>) -> Self {
        self.persisted_id = Some(id.into());
        self
    }

    fn authed(&self, request: ApiRequest) -> ClientResult<ApiRequest> {
        let token = self
            .session
            .token()
            .ok_or_else(|| ClientError::unauthorized("no session token"))?;
        let mut request = request.session_token(token);
        if let Some(km) = self.session.key_manager_token() {
            request = request.header("keyManagerToken", km);
        }
        Ok(request)
    }

    async fn create(&self) -> ClientResult<String> {
        let path = "/agent/feeds";
        let response = self
            .executor
            .execute("feed-create", path, || async {
                self.client.call(self.authed(ApiRequest::post(path))?).await
            })
            .await?;
        let body: CreateFeedResponse = response.json()?;
        info!(feed_id = %body.id, "Feed created");
        Ok(body.id)
    }

    async fn read(&self, feed_id: &str) -> ClientResult<Vec<Event>> {
        let path = format!("/agent/feeds/{feed_id}/read");
        let response = self
            .executor
            .execute("feed-read", &path, || async {
                self.client.call(self.authed(ApiRequest::get(&path))?).await
            })
            .await?;
        if response.status == 204 || response.body.is_empty() {
            return Ok(Vec::new());
        }
        let body: ReadResponse = response.json()?;
        Ok(body.events.into_iter().filter_map(normalize).collect())
    }
}

#[async_trait]
impl FeedClient for ExplicitFeedClient {
    async fn start(&self) -> ClientResult<FeedHandle> {
        let id = match &self.persisted_id {
            Some(id) => {
                debug!(feed_id = %id, "Reusing persisted feed id");
                id.clone()
            }
            None => self.create().await?,
        };
        Ok(FeedHandle::feed(id))
    }

    async fn pull(&self, handle: FeedHandle) -> ClientResult<(Vec<Event>, FeedHandle)> {
        let Handle::Feed { id } = handle.0 else {
            return Err(ClientError::permanent(0, "foreign feed handle"));
        };

        match self.read(&id).await {
            Ok(events) => Ok((events, FeedHandle::feed(id))),
            Err(err) if is_feed_invalidated(&err) => {
                warn!(feed_id = %id, "Feed gone, recreating and resuming (events may be skipped)");
                let fresh = self.create().await?;
                let events = self.read(&fresh).await?;
                Ok((events, FeedHandle::feed(fresh)))
            }
            Err(err) => Err(err),
        }
    }

    async fn stop(&self, handle: FeedHandle) -> ClientResult<()> {
        let Handle::Feed { id } = handle.0 else {
            return Err(ClientError::permanent(0, "foreign feed handle"));
        };
        let path = format!("/agent/feeds/{id}");
        self.executor
            .execute("feed-delete", &path, || async {
                self.client
                    .call(self.authed(ApiRequest::delete(&path))?)
                    .await
            })
            .await?;
        info!(feed_id = %id, "Feed deleted");
        Ok(())
    }
}

// =============================================================================
// Ack-Cursor Variant
// =============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CursorReadRequest<'a> {
    ack_id: &'a str,
}

/// Feed client for the implicit per-identity cursor protocol.
pub struct CursorFeedClient {
    client: BoxedApiClient,
    executor: RetryExecutor,
    session: BoxedSession,
}

impl CursorFeedClient {
    /// Creates a client over the given transport, retry executor and
    /// session.
    pub fn new(client: BoxedApiClient, executor: RetryExecutor, session: BoxedSession) -> Self {
        Self {
            client,
            executor,
            session,
        }
    }

    fn authed(&self, request: ApiRequest) -> ClientResult<ApiRequest> {
        let token = self
            .session
            .token()
            .ok_or_else(|| ClientError::unauthorized("no session token"))?;
        Ok(request.session_token(token))
    }

    async fn read(&self, ack_id: &str) -> ClientResult<(Vec<Event>, String)> {
        let path = "/agent/v2/events/read";
        let response = self
            .executor
            .execute("cursor-read", path, || async {
                let request =
                    ApiRequest::post(path).json(&CursorReadRequest { ack_id })?;
                self.client.call(self.authed(request)?).await
            })
            .await?;
        if response.status == 204 || response.body.is_empty() {
            return Ok((Vec::new(), ack_id.to_string()));
        }
        let body: ReadResponse = response.json()?;
        let next = body.ack_id.unwrap_or_else(|| ack_id.to_string());
        Ok((body.events.into_iter().filter_map(normalize).collect(), next))
    }
}

#[async_trait]
impl FeedClient for CursorFeedClient {
    async fn start(&self) -> ClientResult<FeedHandle> {
        // The server keeps the feed state; an empty ack token asks for a
        // fresh starting position.
        Ok(FeedHandle::cursor(String::new()))
    }

    async fn pull(&self, handle: FeedHandle) -> ClientResult<(Vec<Event>, FeedHandle)> {
        let Handle::Cursor { ack_id } = handle.0 else {
            return Err(ClientError::permanent(0, "foreign feed handle"));
        };

        match self.read(&ack_id).await {
            Ok((events, next)) => Ok((events, FeedHandle::cursor(next))),
            Err(err) if is_feed_invalidated(&err) => {
                warn!("Cursor stale, reacquiring fresh position (events may be skipped)");
                let (events, next) = self.read("").await?;
                Ok((events, FeedHandle::cursor(next)))
            }
            Err(err) => Err(err),
        }
    }

    async fn stop(&self, _handle: FeedHandle) -> ClientResult<()> {
        // Server-side state is per-identity; there is nothing to release.
        Ok(())
    }
}
