//! Session-oriented watch adapter.
//!
//! The coordination service hands out one-shot watches tied to an expirable
//! session. Two background tasks run per live session:
//!
//! - the watch loop arms a watch on the configured path, waits for it to fire,
//!   re-fetches and re-arms;
//! - the session driver consumes connection-state events and reconnects once
//!   the session is reported lost.
//!
//! Both tasks hang off a per-session token. A successful reconnect starts a
//! fresh pair and cancels the old one, so stale tasks never touch the new
//! session. `load()` keeps serving the last good settings throughout.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU8;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::AdapterContext;
use super::SourceAdapter;
use crate::utils::async_task::sleep_or_cancelled;
use crate::utils::async_task::spawn_task;
use crate::Codec;
use crate::ConfigFormat;
use crate::Coordinator;
use crate::ProviderKind;
use crate::Result;
use crate::Session;
use crate::SessionConnector;
use crate::SessionEvent;
use crate::SessionHandle;
use crate::SessionPolicy;
use crate::SessionState;
use crate::SessionWatchConfig;
use crate::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WatchState {
    ConnectedWatching = 0,
    WatchReArming = 1,
    SessionLost = 2,
    Reconnecting = 3,
}

impl From<u8> for WatchState {
    fn from(value: u8) -> Self {
        match value {
            0 => WatchState::ConnectedWatching,
            1 => WatchState::WatchReArming,
            2 => WatchState::SessionLost,
            _ => WatchState::Reconnecting,
        }
    }
}

pub struct SessionWatchAdapter {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    key: String,
    servers: Vec<String>,
    path: String,
    timeout: Duration,
    policy: SessionPolicy,
    connector: Arc<dyn SessionConnector>,
    codec: Arc<dyn Codec>,
    coordinator: Coordinator,
    /// Adapter lifetime
    token: CancellationToken,
    /// Lifetime of the current session's watch loop and driver
    session_token: Mutex<CancellationToken>,
    session: RwLock<Arc<dyn Session>>,
    cache: RwLock<Settings>,
    state: AtomicU8,
    reconnecting: AtomicBool,
}

/// Clears the reconnect flag even if the attempt is dropped mid-way.
struct ReconnectGuard<'a>(&'a AtomicBool);

impl Drop for ReconnectGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl SessionWatchAdapter {
    pub async fn connect(
        config: &SessionWatchConfig,
        format: ConfigFormat,
        connector: Arc<dyn SessionConnector>,
        ctx: AdapterContext,
    ) -> Result<Self> {
        config.validate()?;
        let codec = format.codec();
        let timeout = config.timeout.unwrap_or_else(|| ctx.config.session.default_timeout());

        let SessionHandle { session, events } = connector.connect(&config.servers, timeout).await?;
        let settings = match fetch_node(session.as_ref(), &config.path, codec.as_ref()).await {
            Ok(settings) => settings,
            Err(e) => {
                session.close().await;
                return Err(e);
            }
        };

        let session_token = ctx.token.child_token();
        let inner = Arc::new(SessionInner {
            key: ctx.key,
            servers: config.servers.clone(),
            path: config.path.clone(),
            timeout,
            policy: ctx.config.session,
            connector,
            codec,
            coordinator: ctx.coordinator,
            token: ctx.token,
            session_token: Mutex::new(session_token.clone()),
            session: RwLock::new(session),
            cache: RwLock::new(settings),
            state: AtomicU8::new(WatchState::ConnectedWatching as u8),
            reconnecting: AtomicBool::new(false),
        });
        inner.start(session_token, events);

        info!(
            "session source {} watching {} on {}",
            inner.key,
            inner.path,
            inner.servers.join(",")
        );
        Ok(Self { inner })
    }

    pub fn state(&self) -> WatchState {
        self.inner.state()
    }

    /// Replaces the session with a fresh one.
    ///
    /// Returns `false` when another attempt is already in flight or when the
    /// connection could not be established; the cached settings stay served
    /// either way.
    pub async fn reconnect(&self) -> bool {
        self.inner.reconnect().await
    }
}

impl SessionInner {
    fn state(&self) -> WatchState {
        WatchState::from(self.state.load(Ordering::Acquire))
    }

    fn set_state(
        &self,
        state: WatchState,
    ) {
        let previous = WatchState::from(self.state.swap(state as u8, Ordering::AcqRel));
        if previous != state {
            debug!("session source {}: {:?} -> {:?}", self.key, previous, state);
        }
    }

    /// Only moves between the two watching states, never out of a lost session.
    fn transition(
        &self,
        from: WatchState,
        to: WatchState,
    ) {
        let _ = self
            .state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire);
    }

    fn current_session(&self) -> Arc<dyn Session> {
        self.session.read().clone()
    }

    fn start(
        self: &Arc<Self>,
        session_token: CancellationToken,
        events: mpsc::Receiver<SessionEvent>,
    ) {
        spawn_task(
            format!("{}/watch", self.key),
            session_token.clone(),
            self.clone().watch_node(session_token.clone()),
        );
        spawn_task(
            format!("{}/session", self.key),
            session_token.clone(),
            self.clone().drive_session(session_token, events),
        );
    }

    async fn watch_node(
        self: Arc<Self>,
        token: CancellationToken,
    ) {
        loop {
            if token.is_cancelled() {
                return;
            }
            self.transition(WatchState::ConnectedWatching, WatchState::WatchReArming);

            let session = self.current_session();
            let fired = match session.get_watch(&self.path).await {
                Ok((raw, fired)) => {
                    if token.is_cancelled() {
                        return;
                    }
                    // Writes between the last fetch and arming fire nothing.
                    match decode_node(raw, &self.path, self.codec.as_ref()) {
                        Ok(settings) => self.apply_if_changed(settings),
                        Err(e) => {
                            warn!("keeping cached settings for {} after arming watch: {}", self.key, e);
                        }
                    }
                    fired
                }
                Err(e) => {
                    warn!(
                        "arming watch on {} for {} failed, retrying in {:?}: {}",
                        self.path,
                        self.key,
                        self.policy.rewatch_delay(),
                        e
                    );
                    if !sleep_or_cancelled(&token, self.policy.rewatch_delay()).await {
                        return;
                    }
                    continue;
                }
            };
            self.transition(WatchState::WatchReArming, WatchState::ConnectedWatching);

            let fired = fired.await;
            if token.is_cancelled() {
                return;
            }
            match fired {
                Ok(event) if event.kind.is_data_event() => {
                    debug!("{:?} on {} for {}", event.kind, event.path, self.key);
                    self.refresh(session.as_ref()).await;
                }
                Ok(event) => {
                    debug!("ignoring {:?} on {} for {}", event.kind, event.path, self.key);
                }
                Err(_) => {
                    debug!("watch on {} for {} dropped by the session", self.path, self.key);
                    if !sleep_or_cancelled(&token, self.policy.rewatch_delay()).await {
                        return;
                    }
                }
            }
        }
    }

    async fn refresh(
        &self,
        session: &dyn Session,
    ) {
        match fetch_node(session, &self.path, self.codec.as_ref()).await {
            Ok(settings) => {
                *self.cache.write() = settings.clone();
                self.coordinator.notify(&self.key, &settings);
            }
            Err(e) => {
                warn!("keeping cached settings for {} after failed re-fetch: {}", self.key, e);
            }
        }
    }

    fn apply_if_changed(
        &self,
        settings: Settings,
    ) {
        {
            let mut cache = self.cache.write();
            if *cache == settings {
                return;
            }
            *cache = settings.clone();
        }
        self.coordinator.notify(&self.key, &settings);
    }

    async fn drive_session(
        self: Arc<Self>,
        token: CancellationToken,
        mut events: mpsc::Receiver<SessionEvent>,
    ) {
        loop {
            if token.is_cancelled() {
                return;
            }
            let event = events.recv().await;
            if token.is_cancelled() {
                return;
            }
            match event {
                Some(event) if !event.state.is_lost() => {
                    debug!("session for {} reported {:?}", self.key, event.state);
                    if event.state == SessionState::Connected {
                        self.transition(WatchState::SessionLost, WatchState::ConnectedWatching);
                    }
                    continue;
                }
                Some(event) => {
                    warn!("session for {} reported {:?}", self.key, event.state);
                }
                None => {
                    warn!("session event stream for {} closed", self.key);
                }
            }

            self.set_state(WatchState::SessionLost);
            if !sleep_or_cancelled(&token, self.policy.reconnect_delay()).await {
                return;
            }
            self.reconnect().await;
        }
    }

    // Boxed: the tasks spawned here await this future again.
    fn reconnect(self: &Arc<Self>) -> BoxFuture<'_, bool> {
        Box::pin(async move {
            if self
                .reconnecting
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                debug!("reconnect for {} already in flight", self.key);
                return false;
            }
            let _guard = ReconnectGuard(&self.reconnecting);
            self.set_state(WatchState::Reconnecting);

            let SessionHandle { session, events } =
                match self.connector.connect(&self.servers, self.timeout).await {
                    Ok(handle) => handle,
                    Err(e) => {
                        error!("reconnect for {} failed: {}", self.key, e);
                        self.set_state(WatchState::SessionLost);
                        return false;
                    }
                };

            if self.token.is_cancelled() {
                debug!("source {} shut down while reconnecting, dropping new session", self.key);
                tokio::spawn(async move { session.close().await });
                return false;
            }
            let old = std::mem::replace(&mut *self.session.write(), session.clone());

            let fetched = fetch_node(session.as_ref(), &self.path, self.codec.as_ref()).await;
            if self.token.is_cancelled() {
                // Shutdown closed whichever session it saw; close both.
                tokio::spawn(async move {
                    old.close().await;
                    session.close().await;
                });
                return false;
            }
            match fetched {
                Ok(settings) => self.apply_if_changed(settings),
                Err(e) => {
                    warn!("keeping cached settings for {} after reconnect: {}", self.key, e);
                }
            }

            // The caller may be the old driver, so nothing below awaits. The old
            // session is closed only after its tasks are cancelled.
            let fresh = self.token.child_token();
            let stale = std::mem::replace(&mut *self.session_token.lock(), fresh.clone());
            self.set_state(WatchState::ConnectedWatching);
            self.start(fresh, events);
            stale.cancel();
            tokio::spawn(async move { old.close().await });

            info!("session source {} reconnected", self.key);
            true
        })
    }
}

async fn fetch_node(
    session: &dyn Session,
    path: &str,
    codec: &dyn Codec,
) -> Result<Settings> {
    let raw = session.get(path).await?;
    decode_node(raw, path, codec)
}

fn decode_node(
    raw: Option<Vec<u8>>,
    path: &str,
    codec: &dyn Codec,
) -> Result<Settings> {
    match raw {
        Some(raw) => codec.decode(&raw),
        None => {
            debug!("node {path} does not exist yet, serving empty settings");
            Ok(Settings::new())
        }
    }
}

impl SourceAdapter for SessionWatchAdapter {
    fn load(&self) -> Result<Settings> {
        Ok(self.inner.cache.read().clone())
    }

    fn name(&self) -> &str {
        ProviderKind::SessionWatch.as_str()
    }

    fn shutdown(&self) {
        self.inner.token.cancel();
        let session = self.inner.current_session();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move { session.close().await });
        }
    }
}
