//! Optimistic message entries and their reconciliation with the server.

use chrono::Utc;
use journal_sync_model::{
    LocalId, Message, MessageId, Role, SendMessageResponse,
};

/// Content of the typing indicator.
pub(crate) const TYPING_CONTENT: &str = "…";

/// The assistant reply shown when the server did not produce one.
pub(crate) const FALLBACK_REPLY: &str = "I apologize, but I encountered an issue generating a response. Please try again.";

/// A message send whose optimistic entries are on screen.
#[derive(Clone, Debug)]
pub(crate) struct PendingSend {
    pub conversation_id: String,
    user_entry: Message,
}

impl PendingSend {
    #[cfg(test)]
    #[inline]
    pub fn content(&self) -> &str {
        &self.user_entry.content
    }
}

/// Mints client-side ids and applies optimistic updates to a message
/// sequence.
#[derive(Debug, Default)]
pub(crate) struct Reconciler {
    next_local_id: u64,
}

impl Reconciler {
    #[inline]
    fn mint(&mut self) -> LocalId {
        self.next_local_id += 1;
        LocalId(self.next_local_id)
    }

    /// Appends a temporary user entry and the typing indicator.
    pub fn begin(
        &mut self,
        messages: &mut Vec<Message>,
        conversation_id: &str,
        content: &str,
    ) -> PendingSend {
        let user_entry = Message {
            id: MessageId::Temporary(self.mint()),
            role: Role::User,
            content: content.to_owned(),
            created_at: Utc::now(),
            conversation_id: conversation_id.to_owned(),
            metadata: None,
        };
        let pending = PendingSend {
            conversation_id: conversation_id.to_owned(),
            user_entry,
        };
        Self::attach(messages, &pending);
        pending
    }

    /// Puts the optimistic entries of `pending` back at the end of a
    /// freshly loaded sequence.
    pub fn attach(messages: &mut Vec<Message>, pending: &PendingSend) {
        Self::strip(messages);
        messages.push(pending.user_entry.clone());
        messages.push(Message {
            id: MessageId::Placeholder,
            role: Role::Assistant,
            content: TYPING_CONTENT.to_owned(),
            created_at: pending.user_entry.created_at,
            conversation_id: pending.conversation_id.clone(),
            metadata: None,
        });
    }

    /// Replaces the optimistic entries with the server's answer.
    ///
    /// Parts missing from the answer are synthesized so that the sequence
    /// always gains exactly one user and one assistant message.
    pub fn commit(
        &mut self,
        messages: &mut Vec<Message>,
        pending: &PendingSend,
        resp: SendMessageResponse,
    ) {
        Self::strip(messages);

        let user_message = match resp.user_message {
            Some(msg) => msg,
            None => {
                debug!("server did not echo the user message");
                Message {
                    id: MessageId::Synthesized(self.mint()),
                    ..pending.user_entry.clone()
                }
            }
        };
        let assistant_message = match (resp.assistant_message, resp.reply_text)
        {
            (Some(msg), _) => msg,
            (None, reply) => {
                let content = reply.unwrap_or_else(|| {
                    warn!("server returned no assistant reply");
                    FALLBACK_REPLY.to_owned()
                });
                Message {
                    id: MessageId::Synthesized(self.mint()),
                    role: Role::Assistant,
                    content,
                    created_at: Utc::now().max(user_message.created_at),
                    conversation_id: pending.conversation_id.clone(),
                    metadata: None,
                }
            }
        };

        for msg in [user_message, assistant_message] {
            let duplicate = msg.id.as_canonical().is_some()
                && messages.iter().any(|m| m.id == msg.id);
            if duplicate {
                trace!("{} is already in the sequence", msg.id);
                continue;
            }
            messages.push(msg);
        }
    }

    /// Removes the optimistic entries of a failed send.
    #[inline]
    pub fn rollback(messages: &mut Vec<Message>) {
        Self::strip(messages);
    }

    #[inline]
    fn strip(messages: &mut Vec<Message>) {
        messages.retain(|msg| !msg.id.is_provisional());
    }
}
