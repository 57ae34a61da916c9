//! The aggregator: registry of source adapters plus the published snapshot.
//!
//! Reads ([`Aggregator::get`], [`Aggregator::all`], [`Aggregator::snapshot`])
//! load the current snapshot through an [`ArcSwap`] and never block. Every
//! recomputation (registration or change notification) runs under one publish
//! mutex and replaces the snapshot wholesale.
//!
//! Precedence is last-registered-wins: the registry keeps registration order
//! and the snapshot is the in-order merge of every adapter's `load()`.

use std::fmt;
use std::sync::Arc;
use std::sync::Weak;

use arc_swap::ArcSwap;
use arc_swap::ArcSwapOption;
use futures::future::join_all;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use parking_lot::RwLock;
use serde_json::Map;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::new_adapter;
use crate::AdapterContext;
use crate::AggregatorConfig;
use crate::Backends;
use crate::ConfigFormat;
use crate::Coordinator;
use crate::Result;
use crate::Settings;
use crate::SourceAdapter;
use crate::SourceConfig;
use crate::SourceSpec;
use crate::Updatable;

/// Change callback: `(custom key, delta pushed by that source)`
pub type Hook = dyn Fn(&str, &Settings) + Send + Sync;

static GLOBAL: OnceCell<Arc<Aggregator>> = OnceCell::new();

struct Registration {
    key: String,
    adapter: Arc<dyn SourceAdapter>,
}

pub struct Aggregator {
    token: CancellationToken,
    config: AggregatorConfig,
    backends: Backends,
    coordinator: Coordinator,

    snapshot: ArcSwap<Settings>,
    /// Registration order is merge order
    registry: RwLock<Vec<Registration>>,
    /// Serialises every recomputation; taken before `registry`
    publish: Mutex<()>,
    hook: ArcSwapOption<Box<Hook>>,
}

impl fmt::Debug for Aggregator {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Aggregator")
            .field("keys", &self.keys())
            .field("config", &self.config)
            .field("backends", &self.backends)
            .finish()
    }
}

impl Aggregator {
    /// Every adapter's background tasks are parented to `token`.
    pub fn new(
        token: CancellationToken,
        config: AggregatorConfig,
        backends: Backends,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me: &Weak<Aggregator>| {
            let updatable: Weak<dyn Updatable> = me.clone();
            Self {
                token,
                config,
                backends,
                coordinator: Coordinator::new(updatable),
                snapshot: ArcSwap::from_pointee(Settings::new()),
                registry: RwLock::new(Vec::new()),
                publish: Mutex::new(()),
                hook: ArcSwapOption::empty(),
            }
        })
    }

    /// Process-wide instance. The first call initialises it; later arguments
    /// are ignored.
    pub fn global(
        token: CancellationToken,
        config: AggregatorConfig,
        backends: Backends,
    ) -> Arc<Self> {
        GLOBAL.get_or_init(|| Self::new(token, config, backends)).clone()
    }

    /// Relay for adapters built outside this crate.
    pub fn coordinator(&self) -> Coordinator {
        self.coordinator.clone()
    }

    /// Builds the adapter for `config`, loads it and publishes a snapshot in
    /// which its settings take precedence over every earlier source.
    ///
    /// Re-registering `key` replaces and shuts down the previous adapter. On
    /// error nothing is registered and the snapshot is untouched.
    pub async fn register_source(
        &self,
        key: impl Into<String>,
        config: SourceConfig,
    ) -> Result<()> {
        let key = key.into();
        let adapter = new_adapter(&config, &self.backends, self.adapter_context(&key)).await?;
        self.install(vec![(key, adapter)])
    }

    /// Validates a raw registration and registers it.
    pub async fn register_spec(
        &self,
        key: impl Into<String>,
        spec: &SourceSpec,
    ) -> Result<()> {
        let config = spec.validate()?;
        self.register_source(key, config).await
    }

    /// Registers an adapter built by the caller.
    pub fn register_adapter(
        &self,
        key: impl Into<String>,
        adapter: Arc<dyn SourceAdapter>,
    ) -> Result<()> {
        self.install(vec![(key.into(), adapter)])
    }

    /// Registers several sources at once, in iteration order, publishing a
    /// single snapshot.
    ///
    /// All or nothing: if any adapter fails to build or load, the adapters
    /// already built for this batch are shut down and nothing is registered.
    pub async fn register_source_batch<I, K>(
        &self,
        sources: I,
    ) -> Result<()>
    where
        I: IntoIterator<Item = (K, SourceConfig)>,
        K: Into<String>,
    {
        let sources: Vec<(String, SourceConfig)> =
            sources.into_iter().map(|(k, c)| (k.into(), c)).collect();
        for (_, config) in &sources {
            config.validate()?;
        }

        let built = join_all(
            sources
                .iter()
                .map(|(key, config)| new_adapter(config, &self.backends, self.adapter_context(key))),
        )
        .await;

        let mut adapters = Vec::with_capacity(built.len());
        let mut failure = None;
        for ((key, _), result) in sources.into_iter().zip(built) {
            match result {
                Ok(adapter) => adapters.push((key, adapter)),
                Err(e) => {
                    warn!("batch registration of {key} failed: {e}");
                    failure.get_or_insert(e);
                }
            }
        }
        if let Some(e) = failure {
            for (_, adapter) in &adapters {
                adapter.shutdown();
            }
            return Err(e);
        }

        self.install(adapters)
    }

    /// Value for `key` in the current snapshot; dotted keys reach nested maps.
    pub fn get(
        &self,
        key: &str,
    ) -> Option<Value> {
        self.snapshot.load().get(key).cloned()
    }

    pub fn all(&self) -> Map<String, Value> {
        self.snapshot.load().all().clone()
    }

    /// The current snapshot. It is never mutated once published.
    pub fn snapshot(&self) -> Arc<Settings> {
        self.snapshot.load_full()
    }

    /// Registered custom keys, lowest precedence first.
    pub fn keys(&self) -> Vec<String> {
        self.registry.read().iter().map(|r| r.key.clone()).collect()
    }

    /// Encodes the current snapshot.
    pub fn export(
        &self,
        format: ConfigFormat,
    ) -> Result<Vec<u8>> {
        format.codec().encode(&self.snapshot.load())
    }

    /// Installs the change callback, replacing any previous one.
    ///
    /// It runs on the notifying adapter's task after each successful
    /// re-aggregation, never during registration.
    pub fn set_hook<F>(
        &self,
        hook: F,
    ) where
        F: Fn(&str, &Settings) + Send + Sync + 'static,
    {
        let hook: Box<Hook> = Box::new(hook);
        self.hook.store(Some(Arc::new(hook)));
    }

    pub fn clear_hook(&self) {
        self.hook.store(None);
    }

    fn adapter_context(
        &self,
        key: &str,
    ) -> AdapterContext {
        AdapterContext::new(key, self.coordinator.clone(), self.token.child_token(), self.config)
    }

    fn install(
        &self,
        batch: Vec<(String, Arc<dyn SourceAdapter>)>,
    ) -> Result<()> {
        let failure = batch.iter().find_map(|(_, adapter)| adapter.load().err());
        if let Some(e) = failure {
            for (_, adapter) in &batch {
                adapter.shutdown();
            }
            return Err(e);
        }

        let _publish = self.publish.lock();
        let mut registry = self.registry.write();
        for (key, adapter) in batch {
            if let Some(pos) = registry.iter().position(|r| r.key == key) {
                let replaced = registry.remove(pos);
                info!("source {} replaced ({} -> {})", key, replaced.adapter.name(), adapter.name());
                replaced.adapter.shutdown();
            }
            info!("source {} registered ({})", key, adapter.name());
            registry.push(Registration { key, adapter });
        }

        let mut merged = Settings::new();
        for registration in registry.iter() {
            match registration.adapter.load() {
                Ok(settings) => merged.merge(&settings),
                Err(e) => {
                    warn!(
                        "source {} failed to load during registration, leaving it out: {}",
                        registration.key, e
                    );
                }
            }
        }
        debug!("published snapshot with {} top-level keys", merged.len());
        self.snapshot.store(Arc::new(merged));
        Ok(())
    }
}

impl Updatable for Aggregator {
    fn update(
        &self,
        key: &str,
        delta: &Settings,
    ) {
        {
            let _publish = self.publish.lock();
            let registry = self.registry.read();
            let mut merged = Settings::new();
            for registration in registry.iter() {
                match registration.adapter.load() {
                    Ok(settings) => merged.merge(&settings),
                    Err(e) => {
                        error!(
                            "abandoning re-aggregation for {}: source {} failed to load: {}",
                            key, registration.key, e
                        );
                        return;
                    }
                }
            }
            self.snapshot.store(Arc::new(merged));
            debug!("snapshot republished after change in {key}");
        }

        if let Some(hook) = self.hook.load_full() {
            hook(key, delta);
        }
    }
}
