use std::fmt::{self, Display};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The author of a message.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The journal owner.
    #[default]
    User,
    /// The AI companion.
    Assistant,
    /// System instructions.
    System,
}

impl Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::System => write!(f, "system"),
        }
    }
}

/// A client-side identifier, unique within one session.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct LocalId(pub u64);

/// Identifies a message in a conversation sequence.
///
/// Only [`MessageId::Canonical`] ids come from the server. The other
/// variants are created by the client and never sent back.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum MessageId {
    /// A server-assigned identifier.
    Canonical(String),
    /// An optimistic entry waiting for the server to confirm it.
    Temporary(LocalId),
    /// A settled entry built by the client to fill a gap in a server
    /// response.
    Synthesized(LocalId),
    /// The "typing" indicator. At most one exists at a time.
    Placeholder,
}

impl MessageId {
    /// Creates a canonical id.
    #[inline]
    pub fn canonical<S: Into<String>>(id: S) -> Self {
        MessageId::Canonical(id.into())
    }

    /// Returns the server id, if this is a canonical id.
    #[inline]
    pub fn as_canonical(&self) -> Option<&str> {
        match self {
            MessageId::Canonical(id) => Some(id),
            _ => None,
        }
    }

    /// Returns `true` if this entry still awaits reconciliation.
    #[inline]
    pub fn is_provisional(&self) -> bool {
        matches!(self, MessageId::Temporary(_) | MessageId::Placeholder)
    }
}

impl Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageId::Canonical(id) => write!(f, "{id}"),
            MessageId::Temporary(LocalId(id)) => write!(f, "tmp:{id}"),
            MessageId::Synthesized(LocalId(id)) => write!(f, "local:{id}"),
            MessageId::Placeholder => write!(f, "typing"),
        }
    }
}

/// A message in a conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// The message identifier.
    pub id: MessageId,
    /// Who wrote the message.
    pub role: Role,
    /// The text content.
    pub content: String,
    /// When the message was created.
    pub created_at: DateTime<Utc>,
    /// The conversation this message belongs to.
    pub conversation_id: String,
    /// Free-form data attached by the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl Message {
    /// Returns `true` if this is the synthetic typing indicator.
    #[inline]
    pub fn is_placeholder(&self) -> bool {
        self.id == MessageId::Placeholder
    }
}

/// An opaque cursor for the next page of messages.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageToken(pub String);

/// One page of a conversation's messages.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MessagePage {
    /// Messages in this page, in whatever order the server returned.
    pub messages: Vec<Message>,
    /// The cursor for the next page, `None` when this is the last one.
    pub next_page: Option<PageToken>,
}
