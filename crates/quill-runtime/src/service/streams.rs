//! Stream (room and IM) operations.

use serde::{Deserialize, Serialize};
use tracing::debug;

use quill_auth::BoxedSession;
use quill_core::{ApiRequest, BoxedApiClient, ClientResult, RetryExecutor, UserRef};

/// Acknowledgment returned when a message is posted.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentMessage {
    /// Id assigned to the posted message.
    pub message_id: String,
}

/// A room as returned by the platform.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomInfo {
    /// The room's stream id.
    pub stream_id: String,
    /// Room name.
    pub name: String,
}

#[derive(Serialize)]
struct PostMessage<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct CreateRoom<'a> {
    name: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MemberRecord {
    user_id: i64,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
}

/// Stream operations bound to one session.
#[derive(Clone)]
pub struct StreamService {
    client: BoxedApiClient,
    executor: RetryExecutor,
    session: BoxedSession,
}

impl StreamService {
    pub fn new(client: BoxedApiClient, executor: RetryExecutor, session: BoxedSession) -> Self {
        Self {
            client,
            executor,
            session,
        }
    }

    /// Posts a plain-text message to a stream.
    pub async fn send_message(&self, stream_id: &str, text: &str) -> ClientResult<SentMessage> {
        let path = format!("/agent/v4/stream/{stream_id}/message/create");
        let response = self
            .executor
            .execute("send-message", &path, || async {
                let request = ApiRequest::post(&path).json(&PostMessage { text })?;
                self.client.call(super::authed(&self.session, request)?).await
            })
            .await?;
        let sent: SentMessage = response.json()?;
        debug!(stream_id, message_id = %sent.message_id, "Message sent");
        Ok(sent)
    }

    /// Creates a room and returns its stream id.
    pub async fn create_room(&self, name: &str) -> ClientResult<RoomInfo> {
        let path = "/pod/v3/room";
        let response = self
            .executor
            .execute("create-room", path, || async {
                let request = ApiRequest::post(path).json(&CreateRoom { name })?;
                self.client.call(super::authed(&self.session, request)?).await
            })
            .await?;
        response.json()
    }

    /// Lists the members of a room.
    pub async fn members(&self, stream_id: &str) -> ClientResult<Vec<UserRef>> {
        let path = format!("/pod/v2/room/{stream_id}/membership/list");
        let response = self
            .executor
            .execute("room-members", &path, || async {
                let request = ApiRequest::get(&path);
                self.client.call(super::authed(&self.session, request)?).await
            })
            .await?;
        let members: Vec<MemberRecord> = response.json()?;
        Ok(members
            .into_iter()
            .map(|m| UserRef {
                user_id: m.user_id,
                username: m.username,
                display_name: m.display_name,
            })
            .collect())
    }
}
