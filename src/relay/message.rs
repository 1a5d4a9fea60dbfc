//! Message types shared by transports and relay loops.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Max chars of a message body shown in logs.
const PREVIEW_CHARS: usize = 50;

/// Inbox identifier of an SMS. Unique per inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub i64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An SMS fetched from the inbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmsMessage {
    pub id: MessageId,
    /// Sender phone number; replies go here.
    pub address: String,
    pub body: String,
    pub received_at: Option<DateTime<Utc>>,
}

/// What sort of message an IM event carries.
///
/// Only `Chat` and `Normal` are conversation; the rest are broadcast or
/// service traffic and never answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// One-to-one conversation.
    Chat,
    /// A standalone message addressed to us outside a one-to-one chat.
    Normal,
    GroupChat,
    Headline,
    System,
}

impl MessageKind {
    pub fn is_conversational(self) -> bool {
        matches!(self, MessageKind::Chat | MessageKind::Normal)
    }
}

/// The party a message came from, and where a reply should go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Correspondent {
    pub id: i64,
    pub name: String,
}

impl fmt::Display for Correspondent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// An inbound instant message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub kind: MessageKind,
    pub from: Correspondent,
    /// Transport message id, used to thread the reply when present.
    pub message_id: Option<i64>,
    pub body: String,
}

/// First few chars of a message body, for logs.
pub fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_CHARS).collect()
}
