use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::AdapterContext;
use super::SourceAdapter;
use crate::utils::async_task::spawn_task;
use crate::Codec;
use crate::ConfigFormat;
use crate::Coordinator;
use crate::DocumentClient;
use crate::DocumentSource;
use crate::DocumentStoreConfig;
use crate::ProviderKind;
use crate::Result;
use crate::Settings;

/// Adapter over a document store: one fragment per `(group, data_id)`.
pub struct DocumentStoreAdapter {
    inner: Arc<DocumentInner>,
}

struct DocumentInner {
    key: String,
    codec: Arc<dyn Codec>,
    coordinator: Coordinator,
    token: CancellationToken,
    /// `(group:data_id, fragment)` in configured order
    fragments: RwLock<Vec<(String, Settings)>>,
}

impl DocumentStoreAdapter {
    pub async fn connect(
        config: &DocumentStoreConfig,
        format: ConfigFormat,
        client: Arc<dyn DocumentClient>,
        ctx: AdapterContext,
    ) -> Result<Self> {
        config.validate()?;
        let codec = format.codec();

        let mut fragments = Vec::with_capacity(config.sources.len());
        for source in &config.sources {
            let raw = client.fetch(source).await?;
            fragments.push((source.key(), codec.decode(&raw)?));
        }

        // Subscribe to everything before spawning anything, so a failed
        // subscription leaves no task behind.
        let mut streams = Vec::with_capacity(config.sources.len());
        for source in &config.sources {
            streams.push((source.clone(), client.listen(source).await?));
        }

        let inner = Arc::new(DocumentInner {
            key: ctx.key,
            codec,
            coordinator: ctx.coordinator,
            token: ctx.token,
            fragments: RwLock::new(fragments),
        });

        for (source, stream) in streams {
            spawn_task(
                format!("{}/{}", inner.key, source.key()),
                inner.token.clone(),
                inner.clone().listen(source, stream),
            );
        }

        info!(
            "document store source {} ready with {} documents",
            inner.key,
            config.sources.len()
        );
        Ok(Self { inner })
    }

    /// Current fragment of one document.
    pub fn fragment(
        &self,
        group: &str,
        data_id: &str,
    ) -> Option<Settings> {
        let fragment_key = DocumentSource::new(data_id, group).key();
        self.inner
            .fragments
            .read()
            .iter()
            .find(|(k, _)| *k == fragment_key)
            .map(|(_, settings)| settings.clone())
    }
}

impl DocumentInner {
    async fn listen(
        self: Arc<Self>,
        source: DocumentSource,
        mut stream: mpsc::Receiver<Vec<u8>>,
    ) {
        let fragment_key = source.key();
        while let Some(raw) = stream.recv().await {
            self.on_change(&fragment_key, &raw);
        }
        warn!("push stream for {} of {} closed", fragment_key, self.key);
    }

    fn on_change(
        &self,
        fragment_key: &str,
        raw: &[u8],
    ) {
        let settings = match self.codec.decode(raw) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("ignoring undecodable push for {fragment_key}: {e}");
                return;
            }
        };
        if settings.is_empty() {
            debug!("ignoring empty push for {fragment_key}");
            return;
        }

        {
            let mut fragments = self.fragments.write();
            for (k, fragment) in fragments.iter_mut().filter(|(k, _)| k == fragment_key) {
                debug!("fragment {k} of {} replaced", self.key);
                *fragment = settings.clone();
            }
        }
        self.coordinator.notify(&self.key, &settings);
    }
}

impl SourceAdapter for DocumentStoreAdapter {
    fn load(&self) -> Result<Settings> {
        let fragments = self.inner.fragments.read();
        let mut merged = Settings::new();
        for (_, fragment) in fragments.iter() {
            merged.merge(fragment);
        }
        Ok(merged)
    }

    fn name(&self) -> &str {
        ProviderKind::DocumentStore.as_str()
    }

    fn shutdown(&self) {
        self.inner.token.cancel();
    }
}
