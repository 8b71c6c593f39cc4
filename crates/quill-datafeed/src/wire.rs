//! Wire payloads for the feed protocols.
//!
//! Both protocol variants deliver events in the same JSON envelope; only
//! the surrounding read/ack plumbing differs. This module deserializes the
//! envelope and normalizes it into the common
//! [`Event`](quill_core::Event) model. Envelope fields with no counterpart
//! in the common model are dropped here.

use serde::Deserialize;
use tracing::debug;

use quill_core::{Event, EventPayload, InboundMessage, MessageEntity, UserRef};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireUser {
    pub user_id: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl From<WireUser> for UserRef {
    fn from(user: WireUser) -> Self {
        Self {
            user_id: user.user_id,
            username: user.username,
            display_name: user.display_name,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum WireEntity {
    #[serde(rename_all = "camelCase")]
    Mention { user_id: i64, text: String },
    Hashtag { value: String },
    Cashtag { value: String },
}

impl From<WireEntity> for MessageEntity {
    fn from(entity: WireEntity) -> Self {
        match entity {
            WireEntity::Mention { user_id, text } => Self::Mention { user_id, text },
            WireEntity::Hashtag { value } => Self::Hashtag { value },
            WireEntity::Cashtag { value } => Self::Cashtag { value },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub(crate) enum WirePayload {
    #[serde(rename_all = "camelCase")]
    MessageReceived {
        message_id: String,
        stream_id: String,
        text: String,
        #[serde(default)]
        entities: Vec<WireEntity>,
    },
    #[serde(rename_all = "camelCase")]
    ActionSubmitted {
        stream_id: String,
        form_id: String,
        #[serde(default)]
        values: serde_json::Value,
    },
    #[serde(rename_all = "camelCase")]
    RoomCreated { stream_id: String, name: String },
    #[serde(rename_all = "camelCase")]
    UserJoined { stream_id: String, member: WireUser },
    #[serde(rename_all = "camelCase")]
    UserLeft { stream_id: String, member: WireUser },
    ConnectionRequested { from: WireUser },
    ConnectionAccepted { from: WireUser },
    /// Event categories this toolkit does not model.
    #[serde(other)]
    Unknown,
}

/// One event envelope as delivered by either feed protocol.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct WireEvent {
    pub initiator: WireUser,
    #[serde(flatten)]
    pub payload: WirePayload,
}

/// Maps a wire envelope into the normalized model.
///
/// Returns `None` for event categories outside the common model; those
/// are dropped with a debug log rather than surfaced to listeners.
pub(crate) fn normalize(wire: WireEvent) -> Option<Event> {
    let initiator: UserRef = wire.initiator.into();
    let payload = match wire.payload {
        WirePayload::MessageReceived {
            message_id,
            stream_id,
            text,
            entities,
        } => EventPayload::MessageReceived(InboundMessage {
            message_id,
            stream_id,
            text,
            entities: entities.into_iter().map(Into::into).collect(),
        }),
        WirePayload::ActionSubmitted {
            stream_id,
            form_id,
            values,
        } => EventPayload::ActionSubmitted {
            stream_id,
            form_id,
            values,
        },
        WirePayload::RoomCreated { stream_id, name } => {
            EventPayload::RoomCreated { stream_id, name }
        }
        WirePayload::UserJoined { stream_id, member } => EventPayload::UserJoined {
            stream_id,
            member: member.into(),
        },
        WirePayload::UserLeft { stream_id, member } => EventPayload::UserLeft {
            stream_id,
            member: member.into(),
        },
        WirePayload::ConnectionRequested { from } => EventPayload::ConnectionRequested {
            from: from.into(),
        },
        WirePayload::ConnectionAccepted { from } => EventPayload::ConnectionAccepted {
            from: from.into(),
        },
        WirePayload::Unknown => {
            debug!(user_id = initiator.user_id, "Dropping unmodeled event category");
            return None;
        }
    };
    Some(Event { initiator, payload })
}

/// Response body of a feed read, shared by both protocol variants.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReadResponse {
    #[serde(default)]
    pub events: Vec<WireEvent>,
    /// Next acknowledgment token; only the cursor variant sets it.
    #[serde(default)]
    pub ack_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_core::EventKind;

    #[test]
    fn message_envelope_normalizes_with_entities() {
        let json = r#"{
            "initiator": {"userId": 7, "username": "alice"},
            "type": "MESSAGE_RECEIVED",
            "messageId": "m1",
            "streamId": "s1",
            "text": "/assign @bob #infra",
            "entities": [
                {"type": "mention", "userId": 9, "text": "@bob"},
                {"type": "hashtag", "value": "infra"}
            ]
        }"#;
        let wire: WireEvent = serde_json::from_str(json).unwrap();
        let event = normalize(wire).unwrap();

        assert_eq!(event.kind(), EventKind::Message);
        assert_eq!(event.initiator.user_id, 7);
        let message = event.message().unwrap();
        assert_eq!(message.entities.len(), 2);
        assert_eq!(
            message.entities[0],
            MessageEntity::Mention {
                user_id: 9,
                text: "@bob".into()
            }
        );
    }

    #[test]
    fn unmodeled_categories_are_dropped() {
        let json = r#"{
            "initiator": {"userId": 1},
            "type": "ROOM_DEACTIVATED",
            "streamId": "s1"
        }"#;
        let wire: WireEvent = serde_json::from_str(json).unwrap();
        assert!(normalize(wire).is_none());
    }

    #[test]
    fn read_response_tolerates_missing_fields() {
        let body: ReadResponse = serde_json::from_str(r#"{"ackId": "a2"}"#).unwrap();
        assert!(body.events.is_empty());
        assert_eq!(body.ack_id.as_deref(), Some("a2"));
    }
}
