use journal_sync_core::model::{ConversationApi, ConversationPatch};
use journal_sync_core::{
    ConversationStore, Error, StoreBuilder, StoreConfig, StoreSnapshot,
};
use tokio::sync::watch;

use crate::command::Command;

/// A session builder.
///
/// See [`Session`].
pub struct SessionBuilder {
    store_builder: StoreBuilder,
}

impl SessionBuilder {
    /// Creates a session builder with a specified backend.
    pub fn with_api<A: ConversationApi + 'static>(api: A) -> Self {
        let store_builder = StoreBuilder::with_api(api);
        Self { store_builder }
    }

    /// Replaces the default store configuration.
    #[inline]
    pub fn with_config(mut self, config: StoreConfig) -> Self {
        self.store_builder = self.store_builder.with_config(config);
        self
    }

    /// Builds a new session. Must be called within a Tokio runtime.
    pub fn build(self) -> Session {
        Session {
            store: self.store_builder.build(),
        }
    }
}

/// A chat session, like a window that lists the journal conversations
/// and has an input box.
///
/// The session owns a [`ConversationStore`] and is basically a wrapper
/// that turns [`Command`]s into store operations.
pub struct Session {
    store: ConversationStore,
}

impl Session {
    /// Loads the conversations and opens the most recent one.
    #[inline]
    pub async fn start(&self) -> Result<(), Error> {
        self.store.initialize().await
    }

    /// Runs a command against the store.
    ///
    /// Commands that only concern the terminal (`/list`, `/help` and
    /// `/quit`) complete immediately.
    pub async fn execute(&self, command: Command) -> Result<(), Error> {
        match command {
            Command::Send(content) => self.store.send_message(content).await,
            Command::New(initial_message) => {
                self.store.create_new_conversation(initial_message).await
            }
            Command::Switch(id) => self.store.switch_conversation(id).await,
            Command::Title(title) => {
                self.store
                    .update_current_conversation(ConversationPatch::title(title))
                    .await
            }
            Command::Archive(id) => {
                self.store.archive_conversation(id, true).await
            }
            Command::Unarchive(id) => {
                self.store.archive_conversation(id, false).await
            }
            Command::Delete(id) => self.store.delete_conversation(id).await,
            Command::ToggleArchived => self.store.toggle_show_archived().await,
            Command::List | Command::Help | Command::Quit => Ok(()),
        }
    }

    /// Returns the latest state of the store.
    #[inline]
    pub fn snapshot(&self) -> StoreSnapshot {
        self.store.snapshot()
    }

    /// Subscribes to state changes.
    #[inline]
    pub fn subscribe(&self) -> watch::Receiver<StoreSnapshot> {
        self.store.subscribe()
    }

    /// Cancels everything in flight and stops the store.
    #[inline]
    pub async fn close(&self) {
        self.store.teardown().await
    }
}
