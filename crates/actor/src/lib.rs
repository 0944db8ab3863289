//! A lightweight actor framework.
//!
//! An actor owns a piece of state and mutates it only while handling
//! messages, one at a time. Asynchronous work runs in tasks owned by the
//! actor and reports back with messages, so state is never touched
//! concurrently and never needs a lock.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod context;
mod error;
mod handle;
mod mailbox;
mod reply;
mod scheduler;

pub use context::Context;
pub use error::ActorDeadError;
pub use handle::Actor;
pub use mailbox::Message;
pub use reply::{Reply, Response};
