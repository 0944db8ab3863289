use journal_sync_model::Role;
use serde::{Deserialize, Serialize};

/// How the fake server answers a sent message.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ReplyStyle {
    /// Both canonical messages and the updated conversation.
    #[default]
    Full,
    /// Only the reply text and the updated conversation.
    Legacy,
    /// The canonical user message without an assistant reply.
    UserOnly,
    /// The updated conversation and nothing else.
    Empty,
}

/// The order in which message pages are served.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PageOrder {
    /// Oldest page first, oldest message first within a page.
    #[default]
    Chronological,
    /// Newest page first, newest message first within a page.
    Reversed,
}

/// A message of a [`PresetConversation`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresetMessage {
    /// Who wrote the message.
    pub role: Role,
    /// The message text.
    pub content: String,
}

/// A conversation to seed the fake backend with.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresetConversation {
    /// The conversation title.
    pub title: String,
    /// Whether the conversation starts archived.
    #[serde(default)]
    pub archived: bool,
    /// The history, oldest first.
    #[serde(default)]
    pub messages: Vec<PresetMessage>,
}

impl PresetConversation {
    /// Creates an empty, active conversation preset.
    #[inline]
    pub fn new<S: Into<String>>(title: S) -> Self {
        Self {
            title: title.into(),
            archived: false,
            messages: vec![],
        }
    }

    /// Appends a message to the history.
    #[inline]
    pub fn with_message<S: Into<String>>(mut self, role: Role, content: S) -> Self {
        self.messages.push(PresetMessage {
            role,
            content: content.into(),
        });
        self
    }

    /// Marks the conversation as archived.
    #[inline]
    pub fn archived(mut self) -> Self {
        self.archived = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_deserialize_defaults() {
        let preset: PresetConversation = serde_json::from_value(json!({
            "title": "Gratitude",
            "messages": [
                { "role": "user", "content": "Three good things" },
                { "role": "assistant", "content": "Tell me the first." }
            ]
        }))
        .unwrap();

        assert_eq!(
            preset,
            PresetConversation::new("Gratitude")
                .with_message(Role::User, "Three good things")
                .with_message(Role::Assistant, "Tell me the first.")
        );
    }

    #[test]
    fn test_styles_are_snake_case() {
        assert_eq!(
            serde_json::to_value(ReplyStyle::UserOnly).unwrap(),
            json!("user_only")
        );
        assert_eq!(
            serde_json::from_value::<PageOrder>(json!("reversed")).unwrap(),
            PageOrder::Reversed
        );
    }
}
