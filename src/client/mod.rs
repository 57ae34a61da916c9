//! Remote source client capabilities.
//!
//! The wire clients for each backend live outside this crate. Adapters only
//! depend on the traits below, and the aggregator receives one factory per
//! backend family through [`Backends`].

mod events;
pub use events::*;


use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tokio::sync::mpsc;
use tokio::sync::oneshot;

use crate::DocumentSource;
use crate::DocumentStoreConfig;
use crate::Error;
use crate::ProviderKind;
use crate::RemoteKvConfig;
use crate::Result;

/// Document store client (group/data-id addressed documents with push updates)
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DocumentClient: Send + Sync + 'static {
    /// Current content of one document.
    async fn fetch(
        &self,
        source: &DocumentSource,
    ) -> Result<Vec<u8>>;

    /// Subscribes to pushes of the full document content.
    ///
    /// The stream ends when the client drops the subscription.
    async fn listen(
        &self,
        source: &DocumentSource,
    ) -> Result<mpsc::Receiver<Vec<u8>>>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait DocumentClientFactory: Send + Sync + 'static {
    async fn create(
        &self,
        config: &DocumentStoreConfig,
    ) -> Result<Arc<dyn DocumentClient>>;
}

/// Remote key/value client bound to one endpoint and path
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KvClient: Send + Sync + 'static {
    /// Initial synchronous read.
    async fn read(&self) -> Result<Vec<u8>>;

    /// Long-poll: resolves with the new content once the value changes.
    async fn watch(&self) -> Result<Vec<u8>>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait KvClientFactory: Send + Sync + 'static {
    async fn connect(
        &self,
        config: &RemoteKvConfig,
    ) -> Result<Arc<dyn KvClient>>;
}

/// One live session with a coordination service
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Session: Send + Sync + 'static {
    /// Reads a node. `Ok(None)` means the node does not exist.
    async fn get(
        &self,
        path: &str,
    ) -> Result<Option<Vec<u8>>>;

    /// Reads a node and arms a one-shot watch on it.
    ///
    /// The receiver fires at most once; a dropped sender means the watch was
    /// lost and must be registered again.
    async fn get_watch(
        &self,
        path: &str,
    ) -> Result<(Option<Vec<u8>>, oneshot::Receiver<NodeEvent>)>;

    /// Ends the session. Closing twice is a no-op.
    async fn close(&self);
}

/// A freshly established session and its connection-state stream
pub struct SessionHandle {
    pub session: Arc<dyn Session>,
    pub events: mpsc::Receiver<SessionEvent>,
}

impl fmt::Debug for SessionHandle {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("SessionHandle").finish_non_exhaustive()
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait SessionConnector: Send + Sync + 'static {
    async fn connect(
        &self,
        servers: &[String],
        timeout: Duration,
    ) -> Result<SessionHandle>;
}

/// Client factories, one per backend family
#[derive(Clone, Default)]
pub struct Backends {
    document_store: Option<Arc<dyn DocumentClientFactory>>,
    remote_kv: Option<Arc<dyn KvClientFactory>>,
    session: Option<Arc<dyn SessionConnector>>,
}

impl fmt::Debug for Backends {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Backends")
            .field("document_store", &self.document_store.is_some())
            .field("remote_kv", &self.remote_kv.is_some())
            .field("session", &self.session.is_some())
            .finish()
    }
}

impl Backends {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document_store(
        mut self,
        factory: Arc<dyn DocumentClientFactory>,
    ) -> Self {
        self.document_store = Some(factory);
        self
    }

    pub fn with_remote_kv(
        mut self,
        factory: Arc<dyn KvClientFactory>,
    ) -> Self {
        self.remote_kv = Some(factory);
        self
    }

    pub fn with_session(
        mut self,
        connector: Arc<dyn SessionConnector>,
    ) -> Self {
        self.session = Some(connector);
        self
    }

    pub(crate) fn document_store(&self) -> Result<Arc<dyn DocumentClientFactory>> {
        self.document_store.clone().ok_or_else(|| missing(ProviderKind::DocumentStore))
    }

    pub(crate) fn remote_kv(
        &self,
        kind: ProviderKind,
    ) -> Result<Arc<dyn KvClientFactory>> {
        self.remote_kv.clone().ok_or_else(|| missing(kind))
    }

    pub(crate) fn session(&self) -> Result<Arc<dyn SessionConnector>> {
        self.session.clone().ok_or_else(|| missing(ProviderKind::SessionWatch))
    }
}

fn missing(kind: ProviderKind) -> Error {
    Error::config(format!("no client registered for provider {kind}"))
}
