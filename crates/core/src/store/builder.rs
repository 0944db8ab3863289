use journal_sync_actor::Actor;
use journal_sync_model::ConversationApi;

use super::ConversationStore;
use super::state::StoreState;
use crate::api_client::ApiClient;
use crate::config::StoreConfig;

/// [`ConversationStore`] builder.
pub struct StoreBuilder {
    api: ApiClient,
    config: StoreConfig,
}

impl StoreBuilder {
    /// Creates a new builder with the specified backend.
    #[inline]
    pub fn with_api<A: ConversationApi + 'static>(api: A) -> Self {
        Self {
            api: ApiClient::new(api),
            config: StoreConfig::default(),
        }
    }

    /// Replaces the default configuration.
    #[inline]
    pub fn with_config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds the store. Must be called within a Tokio runtime.
    ///
    /// The store starts uninitialized; call
    /// [`ConversationStore::initialize`] to load the conversations.
    pub fn build(self) -> ConversationStore {
        let (state, snapshot_rx) = StoreState::new(self.api, self.config);
        ConversationStore {
            actor: Actor::spawn(state, Some("store")),
            snapshot_rx,
        }
    }
}
