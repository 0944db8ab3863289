use chrono::{DateTime, Utc};
use journal_sync_model::{
    Conversation, ConversationDetail, ConversationPatch, CreateConversation,
    Message, MessageId, MessagePreview, Role, SendMessageResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ------------------------------
// Types received from the server
// ------------------------------

/// Primary keys are integers on some deployments and strings on others.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(untagged)]
pub enum Id {
    Int(i64),
    Str(String),
}

impl From<Id> for String {
    #[inline]
    fn from(id: Id) -> Self {
        match id {
            Id::Int(id) => id.to_string(),
            Id::Str(id) => id,
        }
    }
}

/// A list endpoint answers either a bare array or a page.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Listing<T> {
    Page(Page<T>),
    Bare(Vec<T>),
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Page<T> {
    #[serde(default)]
    pub next: Option<String>,
    pub results: Vec<T>,
}

impl<T> Listing<T> {
    /// Returns the items and the URL of the next page.
    #[inline]
    pub fn into_parts(self) -> (Vec<T>, Option<String>) {
        match self {
            Listing::Page(page) => (page.results, page.next),
            Listing::Bare(items) => (items, None),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct PreviewPayload {
    pub content: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ConversationPayload {
    pub id: Id,
    #[serde(default)]
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default)]
    pub message_count: Option<u64>,
    #[serde(default)]
    pub last_message: Option<PreviewPayload>,
    /// Only present on the detail endpoint.
    #[serde(default)]
    pub messages: Option<Vec<MessagePayload>>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct MessagePayload {
    pub id: Id,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Option<Value>,
    #[serde(default)]
    pub conversation: Option<Id>,
}

/// The reply to a sent message. Older servers answer with `response`
/// only.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct SendReplyPayload {
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub user_message: Option<MessagePayload>,
    #[serde(default)]
    pub assistant_message: Option<MessagePayload>,
    #[serde(default)]
    pub conversation: Option<ConversationPayload>,
}

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CreateBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    initial_message: Option<&'a str>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PatchBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    is_archived: Option<bool>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SendBody<'a> {
    message: &'a str,
    conversation_id: &'a str,
    role: Role,
}

// -----------
// Conversions
// -----------

#[inline]
pub fn create_body(opts: &CreateConversation) -> CreateBody<'_> {
    CreateBody {
        title: opts.title.as_deref(),
        initial_message: opts.initial_message.as_deref(),
    }
}

#[inline]
pub fn patch_body(patch: &ConversationPatch) -> PatchBody<'_> {
    PatchBody {
        title: patch.title.as_deref(),
        is_archived: patch.archived,
    }
}

#[inline]
pub fn send_body<'a>(conversation_id: &'a str, content: &'a str) -> SendBody<'a> {
    SendBody {
        message: content,
        conversation_id,
        role: Role::User,
    }
}

impl MessagePayload {
    /// Converts the payload, attributing it to `conversation_id` unless
    /// the server says otherwise.
    pub fn into_message(self, conversation_id: &str) -> Message {
        Message {
            id: MessageId::Canonical(self.id.into()),
            role: self.role,
            content: self.content,
            created_at: self.created_at,
            conversation_id: self
                .conversation
                .map(String::from)
                .unwrap_or_else(|| conversation_id.to_owned()),
            metadata: self.metadata,
        }
    }
}

impl ConversationPayload {
    pub fn into_detail(self) -> ConversationDetail {
        let id = String::from(self.id);
        let messages: Option<Vec<Message>> = self.messages.map(|messages| {
            messages
                .into_iter()
                .map(|msg| msg.into_message(&id))
                .collect()
        });

        // The detail endpoint carries neither the count nor the preview.
        let message_count = self
            .message_count
            .or_else(|| messages.as_ref().map(|m| m.len() as u64))
            .unwrap_or_default();
        let last_message = match self.last_message {
            Some(preview) => Some(preview.into()),
            None => messages
                .as_ref()
                .and_then(|m| m.last())
                .map(MessagePreview::from_message),
        };

        ConversationDetail {
            conversation: Conversation {
                id,
                title: self.title.unwrap_or_default(),
                created_at: self.created_at,
                updated_at: self.updated_at,
                archived: self.is_archived,
                message_count,
                last_message,
            },
            messages,
        }
    }

    #[inline]
    pub fn into_conversation(self) -> Conversation {
        self.into_detail().conversation
    }
}

impl From<PreviewPayload> for MessagePreview {
    #[inline]
    fn from(preview: PreviewPayload) -> Self {
        MessagePreview {
            content: preview.content,
            role: preview.role,
            created_at: preview.created_at,
        }
    }
}

impl SendReplyPayload {
    pub fn into_response(self, conversation_id: &str) -> SendMessageResponse {
        SendMessageResponse {
            user_message: self
                .user_message
                .map(|msg| msg.into_message(conversation_id)),
            assistant_message: self
                .assistant_message
                .map(|msg| msg.into_message(conversation_id)),
            reply_text: self.response,
            conversation: self
                .conversation
                .map(ConversationPayload::into_conversation),
        }
    }
}
