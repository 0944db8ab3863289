//! A terminal front-end for the journal conversation engine.
//!
//! The crate includes a CLI tool for chatting with the journal companion in
//! the terminal. It can also be used as a library that turns slash commands
//! into store operations.

#![deny(missing_docs)]

mod command;
mod session;

pub use command::{Command, HELP, ParseError};
pub use session::{Session, SessionBuilder};

/// Re-exports of [`journal_sync_core`] crate.
pub mod core {
    pub use journal_sync_core::*;
}
