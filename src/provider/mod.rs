//! Source adapters.
//!
//! Each adapter translates one backend family into a [`Settings`] fragment,
//! keeps it fresh from a background task and pushes every change through the
//! [`Coordinator`]. The aggregator only ever talks to the [`SourceAdapter`]
//! trait; [`new_adapter`] picks the implementation from the typed config.

mod document;
mod polling;
mod session;
pub use document::*;
pub use polling::*;
pub use session::*;


use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::AggregatorConfig;
use crate::Backends;
use crate::Coordinator;
use crate::ProviderConfig;
use crate::Result;
use crate::Settings;
use crate::SourceConfig;

pub trait SourceAdapter: Send + Sync + 'static {
    /// Fully merged local view across every document this adapter watches.
    ///
    /// Never fails after construction; during outages it returns the last
    /// good cached state.
    fn load(&self) -> Result<Settings>;

    /// Backend identifier, diagnostic only.
    fn name(&self) -> &str;

    /// Stops every background task owned by the adapter.
    fn shutdown(&self);
}

/// Everything an adapter needs from the aggregator that builds it
#[derive(Debug, Clone)]
pub struct AdapterContext {
    /// Custom key the adapter is registered under; passed back on notify
    pub key: String,
    pub coordinator: Coordinator,
    /// Lifetime of the adapter's background tasks
    pub token: CancellationToken,
    pub config: AggregatorConfig,
}

impl AdapterContext {
    pub fn new(
        key: impl Into<String>,
        coordinator: Coordinator,
        token: CancellationToken,
        config: AggregatorConfig,
    ) -> Self {
        Self {
            key: key.into(),
            coordinator,
            token,
            config,
        }
    }
}

/// Builds, validates and initially fetches the adapter for `config`.
///
/// Returns only once the initial fetch of every configured document succeeded
/// and the background tasks are running.
pub async fn new_adapter(
    config: &SourceConfig,
    backends: &Backends,
    ctx: AdapterContext,
) -> Result<Arc<dyn SourceAdapter>> {
    config.validate()?;
    debug!("building {} adapter for {}", config.kind(), ctx.key);

    let adapter: Arc<dyn SourceAdapter> = match &config.provider {
        ProviderConfig::DocumentStore(c) => {
            let client = backends.document_store()?.create(c).await?;
            Arc::new(DocumentStoreAdapter::connect(c, config.format, client, ctx).await?)
        }
        ProviderConfig::RemoteKv(c) => {
            let client = backends.remote_kv(config.kind())?.connect(c).await?;
            Arc::new(PollingAdapter::connect(c, config.format, client, ctx).await?)
        }
        ProviderConfig::SessionWatch(c) => {
            let connector = backends.session()?;
            Arc::new(SessionWatchAdapter::connect(c, config.format, connector, ctx).await?)
        }
    };
    Ok(adapter)
}
