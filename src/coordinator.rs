//! Change relay between adapters and the aggregator.
//!
//! Adapters never hold the aggregator type. They push `(key, delta)` through a
//! [`Coordinator`], which forwards the call verbatim to whatever implements
//! [`Updatable`]. There is no buffering and no ordering across adapters.

use std::fmt;
use std::sync::Weak;

#[cfg(test)]
use mockall::automock;
use tracing::trace;

use crate::Settings;

#[cfg_attr(test, automock)]
pub trait Updatable: Send + Sync + 'static {
    fn update(
        &self,
        key: &str,
        delta: &Settings,
    );
}

#[derive(Clone, Default)]
pub struct Coordinator {
    // Weak: the aggregator owns the adapters that own this coordinator.
    updatable: Option<Weak<dyn Updatable>>,
}

impl fmt::Debug for Coordinator {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("attached", &self.updatable.is_some())
            .finish()
    }
}

impl Coordinator {
    pub fn new(updatable: Weak<dyn Updatable>) -> Self {
        Self {
            updatable: Some(updatable),
        }
    }

    /// A coordinator that drops every notification.
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn notify(
        &self,
        key: &str,
        delta: &Settings,
    ) {
        match self.updatable.as_ref().and_then(Weak::upgrade) {
            Some(updatable) => updatable.update(key, delta),
            None => trace!("no update target for {key}, notification dropped"),
        }
    }
}
