//! Inbound platform events — the contract the gateway produces and the
//! message handler consumes.
//!
//! The platform's full wire format stays in the gateway crate; this is the
//! already-decoded shape the core pipeline works with.

use serde::{Deserialize, Serialize};

/// One webhook delivery from the messaging platform, uniquely identified.
///
/// The platform redelivers events it considers unacknowledged, so the same
/// `event_id` can arrive more than once; the event guard deduplicates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEvent {
    /// Unique delivery id assigned by the platform.
    pub event_id: String,

    /// Platform event type, e.g. `im.message.receive_v1`.
    pub event_type: String,

    /// Present for message-receive events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<MessageEvent>,
}

/// The message-receive payload of an inbound event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEvent {
    /// Platform message id — the reply target.
    pub message_id: String,

    /// Chat/group/DM identifier.
    pub chat_id: String,

    /// Sender's user id.
    pub sender_id: String,

    /// Direct message or group chat.
    pub chat_type: ChatKind,

    /// Platform message type ("text", "image", ...). Only text is handled.
    pub message_type: String,

    /// Raw content payload as delivered by the platform — for text messages
    /// a JSON document of the form `{"text": "..."}`.
    pub content: String,

    /// Mention targets, populated for group chats.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mentions: Vec<Mention>,
}

/// A mention target inside a group message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mention {
    /// Display name of the mentioned account.
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatKind {
    Direct,
    Group,
}

impl std::fmt::Display for ChatKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatKind::Direct => write!(f, "direct"),
            ChatKind::Group => write!(f, "group"),
        }
    }
}
