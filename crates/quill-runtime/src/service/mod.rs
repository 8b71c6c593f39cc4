//! Typed resource services.
//!
//! Thin wrappers over the platform's REST surface. Each call attaches the
//! bound session's tokens and runs through the shared retry executor, so
//! expired tokens refresh transparently mid-call. Services are cheap to
//! construct; an on-behalf-of variant is just the same service bound to a
//! delegated session.

mod connections;
mod streams;
mod users;

pub use connections::{Connection, ConnectionService, ConnectionStatus};
pub use streams::{RoomInfo, SentMessage, StreamService};
pub use users::UserService;

use quill_auth::BoxedSession;
use quill_core::{ApiRequest, ClientError, ClientResult};

/// Attaches the session's tokens to a request.
///
/// A missing token surfaces as unauthorized so the executor's recovery
/// path refreshes the session and retries.
pub(crate) fn authed(session: &BoxedSession, request: ApiRequest) -> ClientResult<ApiRequest> {
    let token = session
        .token()
        .ok_or_else(|| ClientError::unauthorized("no session token"))?;
    let mut request = request.session_token(token);
    if let Some(km) = session.key_manager_token() {
        request = request.header("keyManagerToken", km);
    }
    Ok(request)
}
