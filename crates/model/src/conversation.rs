use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message::{Message, Role};

const PREVIEW_MAX_CHARS: usize = 100;

/// A conversation between the user and the AI companion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    /// The server-assigned identifier.
    pub id: String,
    /// The display title.
    pub title: String,
    /// When the conversation was created.
    pub created_at: DateTime<Utc>,
    /// When the conversation was last touched.
    pub updated_at: DateTime<Utc>,
    /// Whether the conversation is archived.
    pub archived: bool,
    /// Number of persisted messages.
    pub message_count: u64,
    /// A short preview of the latest message.
    pub last_message: Option<MessagePreview>,
}

/// A shortened view of the latest message in a conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePreview {
    /// The (possibly truncated) content.
    pub content: String,
    /// Who wrote the message.
    pub role: Role,
    /// When the message was created.
    pub created_at: DateTime<Utc>,
}

impl MessagePreview {
    /// Builds a preview from a full message, truncating long content
    /// to 100 characters followed by `...`.
    pub fn from_message(msg: &Message) -> Self {
        let mut chars = msg.content.chars();
        let mut content: String =
            chars.by_ref().take(PREVIEW_MAX_CHARS).collect();
        if chars.next().is_some() {
            content.push_str("...");
        }
        Self {
            content,
            role: msg.role,
            created_at: msg.created_at,
        }
    }
}

/// A conversation together with its messages.
#[derive(Clone, Debug, PartialEq)]
pub struct ConversationDetail {
    /// The conversation metadata.
    pub conversation: Conversation,
    /// Embedded messages. `None` means they have to be fetched page by
    /// page with [`crate::ConversationApi::list_messages_page`].
    pub messages: Option<Vec<Message>>,
}

/// Options for creating a conversation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateConversation {
    /// An explicit title. The server picks one when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// A message to send as part of the creation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_message: Option<String>,
}

/// A partial update of conversation metadata.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationPatch {
    /// The new title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// The new archived flag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived: Option<bool>,
}

impl ConversationPatch {
    /// Creates a patch that renames the conversation.
    #[inline]
    pub fn title<S: Into<String>>(title: S) -> Self {
        Self {
            title: Some(title.into()),
            archived: None,
        }
    }

    /// Creates a patch that changes the archived flag.
    #[inline]
    pub fn archived(archived: bool) -> Self {
        Self {
            title: None,
            archived: Some(archived),
        }
    }

    /// Returns `true` if the patch changes nothing.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.archived.is_none()
    }
}

/// A user message to deliver to a conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessageRequest {
    /// The target conversation.
    pub conversation_id: String,
    /// The message text.
    pub content: String,
}

/// The server's answer to a sent message.
///
/// Servers are not required to echo every part. A missing part is
/// filled in by the caller.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SendMessageResponse {
    /// The persisted user message.
    pub user_message: Option<Message>,
    /// The persisted assistant reply.
    pub assistant_message: Option<Message>,
    /// The assistant reply as plain text, for servers that do not
    /// return a full message.
    pub reply_text: Option<String>,
    /// The updated conversation metadata.
    pub conversation: Option<Conversation>,
}
