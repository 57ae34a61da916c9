//! Shared helpers for unit tests.
//!
//! The fakes under [`fake`] stand in for the remote backends. They keep all
//! state in memory, expose knobs to inject failures and record how the
//! adapters drove them, so tests can assert on both sides of the conversation.
mod common;
mod fake;

pub use common::*;
pub use fake::*;
