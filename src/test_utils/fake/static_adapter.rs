use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::Error;
use crate::Result;
use crate::Settings;
use crate::SourceAdapter;

/// Adapter serving settings set by the test, with no background task
pub struct StaticAdapter {
    name: String,
    settings: Mutex<Settings>,
    failing: AtomicBool,
    shutdowns: AtomicUsize,
}

impl StaticAdapter {
    pub fn new(
        name: &str,
        settings: Settings,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            settings: Mutex::new(settings),
            failing: AtomicBool::new(false),
            shutdowns: AtomicUsize::new(0),
        })
    }

    pub fn set(
        &self,
        settings: Settings,
    ) {
        *self.settings.lock() = settings;
    }

    pub fn fail_loads(
        &self,
        failing: bool,
    ) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

impl SourceAdapter for StaticAdapter {
    fn load(&self) -> Result<Settings> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Fatal(format!("{} cannot load", self.name)));
        }
        Ok(self.settings.lock().clone())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}
