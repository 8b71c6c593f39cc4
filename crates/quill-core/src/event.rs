//! Normalized event model.
//!
//! Both feed wire protocols produce the same [`Event`] tagged union; fields
//! that only exist on one protocol are dropped during normalization. Events
//! are immutable once produced and are shared by reference with every
//! listener.

use serde::{Deserialize, Serialize};

// ============================================================================
// Identities
// ============================================================================

/// A platform user reference, used for initiators and members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct UserRef {
    /// Numeric platform user id.
    pub user_id: i64,
    /// Login name, when the platform supplied one.
    #[serde(default)]
    pub username: Option<String>,
    /// Display name, when the platform supplied one.
    #[serde(default)]
    pub display_name: Option<String>,
}

impl UserRef {
    /// Creates a reference carrying only the numeric id.
    pub fn from_id(user_id: i64) -> Self {
        Self {
            user_id,
            username: None,
            display_name: None,
        }
    }
}

// ============================================================================
// Message Content
// ============================================================================

/// A structured entity attached to a message's rich-content annotations.
///
/// Command patterns consume these instead of raw text when matching typed
/// placeholders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageEntity {
    /// An `@user` mention resolving to a platform user.
    Mention {
        /// The mentioned user's id.
        user_id: i64,
        /// The literal text of the mention (e.g. `@alice`).
        text: String,
    },
    /// A `#topic` hashtag.
    Hashtag {
        /// Tag value without the leading `#`.
        value: String,
    },
    /// A `$TICKER` cashtag.
    Cashtag {
        /// Tag value without the leading `$`.
        value: String,
    },
}

/// A message received from a stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Platform message id.
    pub message_id: String,
    /// The stream (room or IM) the message was posted to.
    pub stream_id: String,
    /// Plain-text content.
    pub text: String,
    /// Structured entities, in the order they appear in the text.
    #[serde(default)]
    pub entities: Vec<MessageEntity>,
}

// ============================================================================
// Events
// ============================================================================

/// High-level category of an event, for cheap filtering by listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A message was posted to a stream the bot can read.
    Message,
    /// An interactive form element was submitted.
    Action,
    /// Room lifecycle (created, member joined/left).
    Room,
    /// A connection (contact) request or acceptance.
    Connection,
}

/// The payload of a normalized event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// A message arrived in a stream.
    MessageReceived(InboundMessage),
    /// An interactive form was submitted.
    ActionSubmitted {
        /// Stream the form lives in.
        stream_id: String,
        /// Identifier of the submitted form.
        form_id: String,
        /// Submitted field values, kept as raw JSON.
        values: serde_json::Value,
    },
    /// A room was created.
    RoomCreated {
        /// The new room's stream id.
        stream_id: String,
        /// Room name.
        name: String,
    },
    /// A user joined a room.
    UserJoined {
        /// The room's stream id.
        stream_id: String,
        /// Who joined.
        member: UserRef,
    },
    /// A user left a room.
    UserLeft {
        /// The room's stream id.
        stream_id: String,
        /// Who left.
        member: UserRef,
    },
    /// Someone requested a connection with the bot.
    ConnectionRequested {
        /// The requesting user.
        from: UserRef,
    },
    /// A connection request was accepted.
    ConnectionAccepted {
        /// The accepting user.
        from: UserRef,
    },
}

/// A normalized real-time event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// The identity that caused the event.
    pub initiator: UserRef,
    /// What happened.
    pub payload: EventPayload,
}

impl Event {
    /// Returns the high-level category of this event.
    pub fn kind(&self) -> EventKind {
        match &self.payload {
            EventPayload::MessageReceived(_) => EventKind::Message,
            EventPayload::ActionSubmitted { .. } => EventKind::Action,
            EventPayload::RoomCreated { .. }
            | EventPayload::UserJoined { .. }
            | EventPayload::UserLeft { .. } => EventKind::Room,
            EventPayload::ConnectionRequested { .. } | EventPayload::ConnectionAccepted { .. } => {
                EventKind::Connection
            }
        }
    }

    /// Returns the stream id the event occurred in, when it has one.
    pub fn stream_id(&self) -> Option<&str> {
        match &self.payload {
            EventPayload::MessageReceived(msg) => Some(&msg.stream_id),
            EventPayload::ActionSubmitted { stream_id, .. }
            | EventPayload::RoomCreated { stream_id, .. }
            | EventPayload::UserJoined { stream_id, .. }
            | EventPayload::UserLeft { stream_id, .. } => Some(stream_id),
            EventPayload::ConnectionRequested { .. } | EventPayload::ConnectionAccepted { .. } => {
                None
            }
        }
    }

    /// Returns the inbound message, when this is a message event.
    pub fn message(&self) -> Option<&InboundMessage> {
        match &self.payload {
            EventPayload::MessageReceived(msg) => Some(msg),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message_event() -> Event {
        Event {
            initiator: UserRef::from_id(7),
            payload: EventPayload::MessageReceived(InboundMessage {
                message_id: "m1".into(),
                stream_id: "s1".into(),
                text: "/hello".into(),
                entities: Vec::new(),
            }),
        }
    }

    #[test]
    fn kind_and_stream_follow_the_payload() {
        let event = message_event();
        assert_eq!(event.kind(), EventKind::Message);
        assert_eq!(event.stream_id(), Some("s1"));

        let event = Event {
            initiator: UserRef::from_id(7),
            payload: EventPayload::ConnectionRequested {
                from: UserRef::from_id(9),
            },
        };
        assert_eq!(event.kind(), EventKind::Connection);
        assert_eq!(event.stream_id(), None);
    }

}
