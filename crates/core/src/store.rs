mod builder;
mod state;
#[cfg(test)]
mod tests;

use journal_sync_actor::{Actor, Response};
use journal_sync_model::{Conversation, ConversationPatch, Message};
use tokio::sync::watch;

use crate::error::Error;
pub use builder::StoreBuilder;
use state::{
    ArchiveConversation, DeleteConversation, Initialize, NewConversation,
    SendMessage, StoreState, SwitchConversation, Teardown, ToggleShowArchived,
    UpdateConversation,
};

/// The lifecycle stage of a [`ConversationStore`].
///
/// Switching conversations and sending messages happen while the store
/// is [`Stage::Ready`]. They are reported by [`StoreSnapshot::is_loading`]
/// and [`StoreSnapshot::is_sending`], since both can be in flight at once.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Stage {
    /// [`ConversationStore::initialize`] has not been called yet.
    #[default]
    Uninitialized,
    /// The conversation list is being (re)loaded and a conversation is
    /// being activated.
    Loading,
    /// Idle or serving user operations.
    Ready,
    /// The store has been torn down. Every operation fails.
    TornDown,
}

/// Everything the UI renders, as of one point in time.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StoreSnapshot {
    /// Conversations matching the archive filter, most recently updated
    /// first.
    pub conversations: Vec<Conversation>,
    /// The active conversation.
    pub current_conversation: Option<Conversation>,
    /// Messages of the active conversation, oldest first.
    pub messages: Vec<Message>,
    /// Whether a conversation or the list is being loaded.
    pub is_loading: bool,
    /// Whether a message is being sent.
    pub is_sending: bool,
    /// The last error worth showing to the user.
    pub error: Option<Error>,
    /// Whether archived conversations are listed instead of active ones.
    pub show_archived: bool,
    /// The lifecycle stage.
    pub stage: Stage,
}

impl StoreSnapshot {
    /// Returns the id of the active conversation.
    #[inline]
    pub fn current_id(&self) -> Option<&str> {
        self.current_conversation.as_ref().map(|c| c.id.as_str())
    }
}

/// The conversation synchronization engine of one user session.
///
/// Every operation is enqueued when the method is called and the returned
/// future resolves once the operation has settled, so it is fine to fire
/// several operations without awaiting them in between. Operations that
/// get superseded by a newer one, or that time out, resolve to `Ok(())`
/// without touching the store.
///
/// Dropping the store tears it down.
pub struct ConversationStore {
    actor: Actor<StoreState>,
    snapshot_rx: watch::Receiver<StoreSnapshot>,
}

impl ConversationStore {
    /// Loads the conversation list and activates the most recent
    /// conversation, creating one if there is none.
    pub fn initialize(&self) -> impl Future<Output = Result<(), Error>> + use<> {
        settled(self.actor.ask(Initialize))
    }

    /// Loads the conversation with the given id and makes it active.
    pub fn switch_conversation<S: Into<String>>(
        &self,
        id: S,
    ) -> impl Future<Output = Result<(), Error>> + use<S> {
        let id = id.into();
        settled(self.actor.ask(|reply| SwitchConversation { id, reply }))
    }

    /// Sends a message to the active conversation.
    ///
    /// The message and a typing indicator show up immediately. Fails
    /// with [`crate::ErrorKind::Busy`] if another message is still being
    /// sent.
    pub fn send_message<S: Into<String>>(
        &self,
        content: S,
    ) -> impl Future<Output = Result<(), Error>> + use<S> {
        let content = content.into();
        settled(self.actor.ask(|reply| SendMessage { content, reply }))
    }

    /// Creates a conversation and makes it active, optionally sending a
    /// first message to it.
    pub fn create_new_conversation(
        &self,
        initial_message: Option<String>,
    ) -> impl Future<Output = Result<(), Error>> + use<> {
        settled(self.actor.ask(|reply| NewConversation {
            initial_message,
            reply,
        }))
    }

    /// Updates the metadata of the active conversation.
    pub fn update_current_conversation(
        &self,
        patch: ConversationPatch,
    ) -> impl Future<Output = Result<(), Error>> + use<> {
        settled(self.actor.ask(|reply| UpdateConversation { patch, reply }))
    }

    /// Deletes a conversation. If it was active, another one is
    /// activated.
    pub fn delete_conversation<S: Into<String>>(
        &self,
        id: S,
    ) -> impl Future<Output = Result<(), Error>> + use<S> {
        let id = id.into();
        settled(self.actor.ask(|reply| DeleteConversation { id, reply }))
    }

    /// Archives or restores a conversation. If the active conversation
    /// leaves the current filter, another one is activated.
    pub fn archive_conversation<S: Into<String>>(
        &self,
        id: S,
        archived: bool,
    ) -> impl Future<Output = Result<(), Error>> + use<S> {
        let id = id.into();
        settled(self.actor.ask(|reply| ArchiveConversation {
            id,
            archived,
            reply,
        }))
    }

    /// Switches between listing active and archived conversations, and
    /// initializes the store again.
    pub fn toggle_show_archived(
        &self,
    ) -> impl Future<Output = Result<(), Error>> + use<> {
        settled(self.actor.ask(ToggleShowArchived))
    }

    /// Cancels everything in flight and stops the store.
    pub fn teardown(&self) -> impl Future<Output = ()> + use<> {
        let resp = self.actor.ask(Teardown);
        async move {
            resp.await.ok();
        }
    }

    /// Returns a receiver that is notified whenever the store changes.
    #[inline]
    pub fn subscribe(&self) -> watch::Receiver<StoreSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Returns the current state of the store.
    #[inline]
    pub fn snapshot(&self) -> StoreSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Returns `true` once the store has been torn down.
    #[inline]
    pub fn is_torn_down(&self) -> bool {
        self.actor.is_dead()
    }
}

impl Drop for ConversationStore {
    fn drop(&mut self) {
        self.actor.try_kill();
    }
}

async fn settled(resp: Response<Result<(), Error>>) -> Result<(), Error> {
    resp.await.unwrap_or_else(|_| Err(Error::torn_down()))
}
