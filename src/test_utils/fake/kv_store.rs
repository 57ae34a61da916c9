use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::ConnectionError;
use crate::Error;
use crate::KvClient;
use crate::KvClientFactory;
use crate::RemoteKvConfig;
use crate::Result;
use crate::SourceError;

/// In-memory key/value store with a scripted long-poll.
///
/// `watch()` blocks until a change or a failure is scripted, so a polling
/// loop never spins on an idle store.
#[derive(Clone)]
pub struct FakeKvStore {
    inner: Arc<KvState>,
}

struct KvState {
    value: Mutex<Option<Vec<u8>>>,
    script_tx: mpsc::UnboundedSender<Result<Vec<u8>>>,
    script_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Result<Vec<u8>>>>,
    watch_calls: Mutex<Vec<Instant>>,
    connected: Mutex<Vec<RemoteKvConfig>>,
}

impl FakeKvStore {
    pub fn new(initial: Option<&str>) -> Self {
        let (script_tx, script_rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(KvState {
                value: Mutex::new(initial.map(|v| v.as_bytes().to_vec())),
                script_tx,
                script_rx: tokio::sync::Mutex::new(script_rx),
                watch_calls: Mutex::new(Vec::new()),
                connected: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Changes the stored value and completes one pending long-poll with it.
    pub fn change(
        &self,
        content: &str,
    ) {
        *self.inner.value.lock() = Some(content.as_bytes().to_vec());
        let _ = self.inner.script_tx.send(Ok(content.as_bytes().to_vec()));
    }

    /// Makes the next `n` long-polls fail.
    pub fn fail_watches(
        &self,
        n: usize,
    ) {
        for _ in 0..n {
            let _ = self
                .inner
                .script_tx
                .send(Err(ConnectionError::Backend("long-poll interrupted".to_string()).into()));
        }
    }

    /// Completes one long-poll with an arbitrary payload without storing it.
    pub fn respond_raw(
        &self,
        payload: &str,
    ) {
        let _ = self.inner.script_tx.send(Ok(payload.as_bytes().to_vec()));
    }

    /// Instants at which `watch()` was entered.
    pub fn watch_calls(&self) -> Vec<Instant> {
        self.inner.watch_calls.lock().clone()
    }

    pub fn connected(&self) -> Vec<RemoteKvConfig> {
        self.inner.connected.lock().clone()
    }
}

#[async_trait]
impl KvClient for FakeKvStore {
    async fn read(&self) -> Result<Vec<u8>> {
        self.inner.value.lock().clone().ok_or_else(|| {
            Error::from(SourceError::NotFound {
                path: "fake".to_string(),
            })
        })
    }

    async fn watch(&self) -> Result<Vec<u8>> {
        self.inner.watch_calls.lock().push(Instant::now());
        let mut script = self.inner.script_rx.lock().await;
        match script.recv().await {
            Some(result) => result,
            None => Err(ConnectionError::Closed.into()),
        }
    }
}

#[async_trait]
impl KvClientFactory for FakeKvStore {
    async fn connect(
        &self,
        config: &RemoteKvConfig,
    ) -> Result<Arc<dyn KvClient>> {
        self.inner.connected.lock().push(config.clone());
        Ok(Arc::new(self.clone()))
    }
}
