use std::sync::Arc;

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing::warn;

use super::AdapterContext;
use super::SourceAdapter;
use crate::utils::async_task::sleep_or_cancelled;
use crate::utils::async_task::spawn_task;
use crate::BackoffPolicy;
use crate::Codec;
use crate::ConfigFormat;
use crate::Coordinator;
use crate::ExponentialBackoff;
use crate::KvBackend;
use crate::KvClient;
use crate::RemoteKvConfig;
use crate::Result;
use crate::Settings;

/// Adapter over a remote key/value store exposing a long-poll primitive.
///
/// A single value at `endpoint` + `path` is decoded into the whole fragment.
/// Failed long-polls are retried with exponential backoff.
pub struct PollingAdapter {
    inner: Arc<PollingInner>,
}

struct PollingInner {
    key: String,
    backend: KvBackend,
    client: Arc<dyn KvClient>,
    codec: Arc<dyn Codec>,
    coordinator: Coordinator,
    token: CancellationToken,
    policy: BackoffPolicy,
    cache: RwLock<Settings>,
}

impl PollingAdapter {
    pub async fn connect(
        config: &RemoteKvConfig,
        format: ConfigFormat,
        client: Arc<dyn KvClient>,
        ctx: AdapterContext,
    ) -> Result<Self> {
        config.validate()?;
        let codec = format.codec();

        let raw = client.read().await?;
        let settings = codec.decode(&raw)?;

        let inner = Arc::new(PollingInner {
            key: ctx.key,
            backend: config.backend,
            client,
            codec,
            coordinator: ctx.coordinator,
            token: ctx.token,
            policy: ctx.config.polling,
            cache: RwLock::new(settings),
        });

        spawn_task(
            format!("{}/{}", inner.key, inner.backend.as_str()),
            inner.token.clone(),
            inner.clone().poll(),
        );

        info!(
            "{} source {} watching {}{}",
            config.backend.as_str(),
            inner.key,
            config.endpoint,
            config.path
        );
        Ok(Self { inner })
    }
}

impl PollingInner {
    async fn poll(self: Arc<Self>) {
        let mut backoff = ExponentialBackoff::new(self.policy);
        loop {
            match self.watch_once().await {
                Ok(settings) => {
                    if backoff.failures() > 0 {
                        info!(
                            "{} watch for {} recovered after {} failures",
                            self.backend.as_str(),
                            self.key,
                            backoff.failures()
                        );
                        backoff.reset();
                    }
                    *self.cache.write() = settings.clone();
                    self.coordinator.notify(&self.key, &settings);
                }
                Err(e) => {
                    let delay = backoff.next_delay();
                    warn!(
                        "{} watch for {} failed ({} in a row), retrying in {:?}: {}",
                        self.backend.as_str(),
                        self.key,
                        backoff.failures(),
                        delay,
                        e
                    );
                    if !sleep_or_cancelled(&self.token, delay).await {
                        return;
                    }
                }
            }
        }
    }

    async fn watch_once(&self) -> Result<Settings> {
        let raw = self.client.watch().await?;
        self.codec.decode(&raw)
    }
}

impl SourceAdapter for PollingAdapter {
    fn load(&self) -> Result<Settings> {
        Ok(self.inner.cache.read().clone())
    }

    fn name(&self) -> &str {
        self.inner.backend.as_str()
    }

    fn shutdown(&self) {
        self.inner.token.cancel();
    }
}
