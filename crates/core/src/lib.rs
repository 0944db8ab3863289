//! Conversation synchronization engine: keeps the conversation list and
//! the active conversation of one user session in sync with a remote
//! backend, with optimistic sends and latest-request-wins loading.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

mod api_client;
mod config;
mod coordinator;
mod error;
mod pagination;
mod reconciler;
mod store;

pub use config::{StoreConfig, StoreConfigBuilder};
pub use error::{Error, ErrorKind};
pub use journal_sync_model as model;
pub use store::{ConversationStore, Stage, StoreBuilder, StoreSnapshot};
