//! Live configuration aggregation over remote sources.
//!
//! An [`Aggregator`] owns a registry of source adapters (document stores,
//! long-polled key/value stores, session-oriented coordination services),
//! merges their settings into one snapshot and keeps it fresh as the sources
//! change. Reads are lock-free; changes are pushed through a [`Coordinator`]
//! and optionally surfaced to a user hook.

mod aggregator;
mod client;
mod codec;
mod config;
mod coordinator;
mod errors;
mod provider;
mod settings;
pub mod utils;

pub use aggregator::*;
pub use client::*;
pub use codec::*;
pub use config::*;
pub use coordinator::*;
pub use errors::*;
pub use provider::*;
pub use settings::*;
pub use utils::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
