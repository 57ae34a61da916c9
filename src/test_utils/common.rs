use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::AdapterContext;
use crate::AggregatorConfig;
use crate::Coordinator;
use crate::Settings;
use crate::Updatable;

/// Builds settings from a JSON object literal.
pub fn settings(value: Value) -> Settings {
    match value {
        Value::Object(map) => Settings::from(map),
        other => panic!("settings must be built from an object, got {other}"),
    }
}

/// Polls `check` every 10ms until it holds, panicking after two minutes.
///
/// Under a paused clock the sleeps advance virtual time only, so background
/// tasks get to run between checks and backoff delays elapse instantly.
pub async fn eventually<F>(
    what: &str,
    check: F,
) where
    F: Fn() -> bool,
{
    let deadline = Instant::now() + Duration::from_secs(120);
    while Instant::now() < deadline {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}

/// Records every notification it receives.
#[derive(Default)]
pub struct RecordingUpdatable {
    calls: Mutex<Vec<(String, Settings)>>,
}

impl RecordingUpdatable {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Coordinator forwarding to this recorder; valid while `self` is alive.
    pub fn coordinator(self: &Arc<Self>) -> Coordinator {
        let target: Arc<dyn Updatable> = self.clone();
        Coordinator::new(Arc::downgrade(&target))
    }

    pub fn calls(&self) -> Vec<(String, Settings)> {
        self.calls.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn last(&self) -> Option<(String, Settings)> {
        self.calls.lock().last().cloned()
    }
}

impl Updatable for RecordingUpdatable {
    fn update(
        &self,
        key: &str,
        delta: &Settings,
    ) {
        self.calls.lock().push((key.to_string(), delta.clone()));
    }
}

/// Adapter context wired to `recorder` with default timing policies.
pub fn adapter_context(
    key: &str,
    recorder: &Arc<RecordingUpdatable>,
    token: &CancellationToken,
) -> AdapterContext {
    AdapterContext::new(
        key,
        recorder.coordinator(),
        token.child_token(),
        AggregatorConfig::default(),
    )
}
