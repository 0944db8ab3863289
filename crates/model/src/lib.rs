//! Domain types shared by the conversation synchronization engine and
//! the remote backends it talks to.
//!
//! This crate establishes the contract between the engine and a remote
//! conversation service, so that the engine can work against a real
//! HTTP backend or an in-memory fake without modifying its own code.
//!
//! Types in this crate don't define any behavior beyond small helpers,
//! instead they are the constraints that backend implementors should
//! adhere to.

#![deny(missing_docs)]

mod api;
mod conversation;
mod error;
mod message;

pub use api::*;
pub use conversation::*;
pub use error::*;
pub use message::*;
