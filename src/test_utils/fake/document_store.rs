use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::ConnectionError;
use crate::DocumentClient;
use crate::DocumentClientFactory;
use crate::DocumentSource;
use crate::DocumentStoreConfig;
use crate::Result;
use crate::SourceError;

/// In-memory document store with push subscriptions
#[derive(Clone, Default)]
pub struct FakeDocumentStore {
    inner: Arc<DocumentStoreState>,
}

#[derive(Default)]
struct DocumentStoreState {
    documents: DashMap<String, Vec<u8>>,
    listeners: Mutex<HashMap<String, Vec<mpsc::Sender<Vec<u8>>>>>,
    failing_listens: Mutex<HashSet<String>>,
    clients: Mutex<usize>,
}

impl FakeDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a document without pushing it to listeners.
    pub fn put(
        &self,
        group: &str,
        data_id: &str,
        content: &str,
    ) {
        let key = DocumentSource::new(data_id, group).key();
        self.inner.documents.insert(key, content.as_bytes().to_vec());
    }

    /// Stores a document and pushes it to every listener.
    pub async fn publish(
        &self,
        group: &str,
        data_id: &str,
        content: &str,
    ) {
        self.put(group, data_id, content);
        let key = DocumentSource::new(data_id, group).key();
        let listeners = self.inner.listeners.lock().get(&key).cloned().unwrap_or_default();
        for listener in listeners {
            let _ = listener.send(content.as_bytes().to_vec()).await;
        }
    }

    pub fn fail_listen(
        &self,
        group: &str,
        data_id: &str,
    ) {
        self.inner
            .failing_listens
            .lock()
            .insert(DocumentSource::new(data_id, group).key());
    }

    /// Subscriptions whose receiving side is still alive.
    pub fn live_listeners(&self) -> usize {
        self.inner
            .listeners
            .lock()
            .values()
            .flatten()
            .filter(|tx| !tx.is_closed())
            .count()
    }

    pub fn clients_created(&self) -> usize {
        *self.inner.clients.lock()
    }
}

#[async_trait]
impl DocumentClient for FakeDocumentStore {
    async fn fetch(
        &self,
        source: &DocumentSource,
    ) -> Result<Vec<u8>> {
        let key = source.key();
        let document = self.inner.documents.get(&key).map(|d| d.value().clone());
        document.ok_or_else(|| SourceError::NotFound { path: key }.into())
    }

    async fn listen(
        &self,
        source: &DocumentSource,
    ) -> Result<mpsc::Receiver<Vec<u8>>> {
        let key = source.key();
        if self.inner.failing_listens.lock().contains(&key) {
            return Err(ConnectionError::Backend(format!("listen on {key} refused")).into());
        }
        let (tx, rx) = mpsc::channel(16);
        self.inner.listeners.lock().entry(key).or_default().push(tx);
        Ok(rx)
    }
}

#[async_trait]
impl DocumentClientFactory for FakeDocumentStore {
    async fn create(
        &self,
        _config: &DocumentStoreConfig,
    ) -> Result<Arc<dyn DocumentClient>> {
        *self.inner.clients.lock() += 1;
        Ok(Arc::new(self.clone()))
    }
}
