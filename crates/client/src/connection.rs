// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Connection lifecycle for the realtime socket.
//!
//! [`ConnectionManager`] owns at most one socket at a time. Every socket
//! attempt starts a new generation (`ws_id`); callbacks from a socket whose
//! generation is no longer current are ignored, so a late frame or close
//! from a replaced socket can never disturb the live one.
//!
//! A connection is healthy once the server's handshake frame (carrying the
//! `connection_id`) has arrived. While healthy, a heartbeat task sends a
//! `health.check` frame on a fixed interval and a monitor task reconnects
//! when nothing has been received for longer than interval plus slack.
//!
//! Failures are split in two:
//! - transport failures (socket error, abnormal close, handshake timeout)
//!   are retried in the background with the configured [`RetryPolicy`]
//! - everything else (server error frame, rejection close, bad token
//!   provider) fails the attempt permanently
//!
//! An expired token is the one exception: non-static providers are
//! refreshed and the attempt is retried right away.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use rp_core::{Event, EventDispatcher};
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::auth::{AuthProvider, StaticToken};
use crate::backoff::{JitteredBackoff, RetryPolicy};
use crate::config::ClientConfig;
use crate::error::ConnectError;
use crate::frame::{self, ConnectRequest, Handshake, CLOSE_ABNORMAL, CLOSE_NORMAL};
use crate::reachability::{Reachability, ReachabilitySource, ReachabilitySubscription};
use crate::recovery::{NoRecovery, RecoveryHandler};
use crate::transport::{Connection, FrameSink, FrameStream, Inbound, Transport, WebSocketTransport};

/// Snapshot of the connection state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionState {
    /// Generation of the current socket. Bumped by every socket attempt and
    /// by `disconnect`.
    pub ws_id: u64,
    pub is_connecting: bool,
    pub is_healthy: bool,
    /// Set by `disconnect`, cleared by `connect`. Blocks automatic reconnects.
    pub is_disconnected: bool,
    /// Failures since the last successful handshake.
    pub consecutive_failures: u32,
    pub total_failures: u32,
    /// When the last frame (or the socket open) was seen.
    pub last_event_at: Option<Instant>,
    /// Server-assigned id of the live connection.
    pub connection_id: Option<String>,
}

/// How a reconnect should be attempted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconnectOptions {
    /// Fixed wait before the attempt. `None` asks the retry policy.
    pub interval: Option<Duration>,
    /// Refresh the token before opening the socket.
    pub refresh_token: bool,
}

impl ReconnectOptions {
    /// Reconnect after a fixed wait.
    pub fn after(interval: Duration) -> Self {
        ReconnectOptions {
            interval: Some(interval),
            refresh_token: false,
        }
    }
}

type HandshakeResult = Result<Handshake, ConnectError>;
type SharedSink = Arc<tokio::sync::Mutex<Box<dyn FrameSink>>>;

struct Socket {
    sink: SharedSink,
    /// Cancelled once the reader has seen the end of the stream.
    closed: CancellationToken,
    reader: JoinHandle<()>,
}

struct Shared {
    state: ConnectionState,
    socket: Option<Socket>,
    /// Waiter for the handshake of the given generation.
    pending: Option<(u64, oneshot::Sender<HandshakeResult>)>,
    handshake: Option<Handshake>,
    timers: Vec<JoinHandle<()>>,
    /// Cancelled by `disconnect` to stop background reconnect loops.
    shutdown: CancellationToken,
    reachability: Option<ReachabilitySubscription>,
}

impl Shared {
    fn reconnect_blocker(&self) -> Option<&'static str> {
        if self.state.is_disconnected {
            Some("client is disconnected")
        } else if self.state.is_connecting {
            Some("an attempt is already in progress")
        } else if self.state.is_healthy {
            Some("connection is healthy")
        } else {
            None
        }
    }

    fn take_pending(&mut self, generation: u64) -> Option<oneshot::Sender<HandshakeResult>> {
        match self.pending.take() {
            Some((g, tx)) if g == generation => Some(tx),
            other => {
                self.pending = other;
                None
            }
        }
    }
}

struct Inner {
    config: ClientConfig,
    client_id: String,
    transport: Arc<dyn Transport>,
    auth: Arc<dyn AuthProvider>,
    recovery: Arc<dyn RecoveryHandler>,
    retry: Arc<dyn RetryPolicy>,
    reachability: Option<Arc<dyn ReachabilitySource>>,
    dispatcher: EventDispatcher,
    health: watch::Sender<bool>,
    /// Error that stopped automatic reconnects, for `wait_for_healthy`.
    failure: watch::Sender<Option<ConnectError>>,
    shared: Mutex<Shared>,
    /// Runtime captured by `connect`, for callbacks arriving off-runtime.
    runtime: Mutex<Option<Handle>>,
}

/// Builder for [`ConnectionManager`].
pub struct ConnectionBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    auth: Option<Arc<dyn AuthProvider>>,
    recovery: Option<Arc<dyn RecoveryHandler>>,
    retry: Option<Arc<dyn RetryPolicy>>,
    reachability: Option<Arc<dyn ReachabilitySource>>,
    dispatcher: Option<EventDispatcher>,
}

impl ConnectionBuilder {
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    pub fn auth(mut self, auth: impl AuthProvider + 'static) -> Self {
        self.auth = Some(Arc::new(auth));
        self
    }

    pub fn recovery(mut self, recovery: impl RecoveryHandler + 'static) -> Self {
        self.recovery = Some(Arc::new(recovery));
        self
    }

    pub fn retry_policy(mut self, policy: impl RetryPolicy + 'static) -> Self {
        self.retry = Some(Arc::new(policy));
        self
    }

    pub fn reachability(mut self, source: impl ReachabilitySource + 'static) -> Self {
        self.reachability = Some(Arc::new(source));
        self
    }

    /// Publish into an existing dispatcher instead of a fresh one.
    pub fn dispatcher(mut self, dispatcher: EventDispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn build(self) -> ConnectionManager {
        let config = self.config;
        let auth: Arc<dyn AuthProvider> = match (self.auth, &config.token) {
            (Some(auth), _) => auth,
            (None, Some(token)) => Arc::new(StaticToken::new(token.clone())),
            (None, None) => Arc::new(StaticToken::anonymous()),
        };
        let retry: Arc<dyn RetryPolicy> = match self.retry {
            Some(retry) => retry,
            None => Arc::new(JitteredBackoff::new(config.max_retry_interval())),
        };
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(WebSocketTransport::new()),
        };
        let recovery: Arc<dyn RecoveryHandler> = match self.recovery {
            Some(recovery) => recovery,
            None => Arc::new(NoRecovery),
        };
        let client_id = format!("{}--{}", config.user_id, Uuid::new_v4());
        let (health, _) = watch::channel(false);
        let (failure, _) = watch::channel(None);

        ConnectionManager {
            inner: Arc::new(Inner {
                client_id,
                transport,
                auth,
                recovery,
                retry,
                reachability: self.reachability,
                dispatcher: self.dispatcher.unwrap_or_default(),
                health,
                failure,
                shared: Mutex::new(Shared {
                    state: ConnectionState::default(),
                    socket: None,
                    pending: None,
                    handshake: None,
                    timers: Vec::new(),
                    shutdown: CancellationToken::new(),
                    reachability: None,
                }),
                runtime: Mutex::new(None),
                config,
            }),
        }
    }
}

/// Handle to one client's realtime connection. Cheap to clone; clones share
/// the same connection.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    pub fn builder(config: ClientConfig) -> ConnectionBuilder {
        ConnectionBuilder {
            config,
            transport: None,
            auth: None,
            recovery: None,
            retry: None,
            reachability: None,
            dispatcher: None,
        }
    }

    /// Manager with the WebSocket transport and the config's static token.
    pub fn new(config: ClientConfig) -> Self {
        Self::builder(config).build()
    }

    /// Open the connection and wait until it is healthy.
    ///
    /// Fails immediately with [`ConnectError::AlreadyConnecting`] while
    /// another attempt is running. When the first attempt hits a transport
    /// failure (or an expired, refreshable token) retries continue in the
    /// background and this waits up to `connect_timeout` for them.
    pub async fn connect(&self) -> Result<Handshake, ConnectError> {
        let inner = &self.inner;
        let claimed = {
            let mut shared = inner.lock();
            if shared.state.is_connecting {
                return Err(ConnectError::AlreadyConnecting);
            }
            if shared.state.is_healthy {
                if let Some(handshake) = &shared.handshake {
                    return Ok(handshake.clone());
                }
            }
            shared.state.is_connecting = true;
            shared.state.is_disconnected = false;
            if shared.shutdown.is_cancelled() {
                shared.shutdown = CancellationToken::new();
            }
            shared.state.ws_id
        };
        inner.failure.send_replace(None);
        if let Ok(handle) = Handle::try_current() {
            *inner.runtime.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        }
        inner.attach_reachability();

        match inner.open(claimed).await {
            Ok(handshake) => Ok(handshake),
            Err(err) if err.is_token_expired() && !inner.auth.is_static() => {
                warn!("token expired while connecting, refreshing: {}", err);
                inner.spawn_reconnect(ReconnectOptions {
                    interval: Some(Duration::ZERO),
                    refresh_token: true,
                });
                self.wait_for_healthy(inner.config.connect_timeout()).await
            }
            Err(err) if err.is_transport_failure() => {
                warn!("connect failed, retrying in the background: {}", err);
                inner.spawn_reconnect(ReconnectOptions::default());
                self.wait_for_healthy(inner.config.connect_timeout()).await
            }
            Err(err) => {
                error!("connect failed: {}", err);
                Err(err)
            }
        }
    }

    /// Retry until healthy, waiting between attempts.
    ///
    /// Returns at once if the connection is healthy, an attempt is already
    /// running, or the client was disconnected. Gives up on permanent
    /// failures and when the retry policy errors.
    pub async fn reconnect(&self, options: ReconnectOptions) {
        Inner::reconnect_loop(Arc::downgrade(&self.inner), options).await;
    }

    /// Close the connection, waiting up to `disconnect_timeout` for the
    /// server to acknowledge.
    pub async fn disconnect(&self) {
        self.disconnect_with_timeout(self.inner.config.disconnect_timeout())
            .await;
    }

    /// Close the connection. Always resolves, acknowledged or not.
    pub async fn disconnect_with_timeout(&self, timeout: Duration) {
        let (socket, reachability) = {
            let mut shared = self.inner.lock();
            shared.state.ws_id += 1;
            shared.state.is_connecting = false;
            shared.state.is_disconnected = true;
            shared.state.is_healthy = false;
            shared.state.connection_id = None;
            shared.handshake = None;
            shared.pending = None;
            shared.shutdown.cancel();
            for timer in shared.timers.drain(..) {
                timer.abort();
            }
            self.inner.health.send_replace(false);
            info!("disconnecting (ws_id {})", shared.state.ws_id);
            (shared.socket.take(), shared.reachability.take())
        };
        drop(reachability);

        let Some(socket) = socket else {
            return;
        };
        let closed = socket.closed.clone();
        let sink = Arc::clone(&socket.sink);
        let acknowledged = tokio::time::timeout(timeout, async move {
            if sink
                .lock()
                .await
                .close(CLOSE_NORMAL, "client disconnect".into())
                .await
                .is_ok()
            {
                closed.cancelled().await;
            }
        })
        .await;
        if acknowledged.is_err() {
            debug!("close not acknowledged within {:?}", timeout);
        }
        socket.reader.abort();
    }

    /// Wait until the connection is healthy.
    ///
    /// Returns early with the error that stopped automatic reconnects, if
    /// one did since the last attempt started.
    pub async fn wait_for_healthy(&self, timeout: Duration) -> Result<Handshake, ConnectError> {
        let mut health = self.inner.health.subscribe();
        let mut failure = self.inner.failure.subscribe();
        let waited = tokio::time::timeout(timeout, async {
            tokio::select! {
                biased;
                healthy = health.wait_for(|healthy| *healthy) => healthy.map(|_| None),
                failed = failure.wait_for(Option::is_some) => failed.map(|f| Option::clone(&f)),
            }
        })
        .await;
        match waited {
            Ok(Ok(None)) => self
                .inner
                .lock()
                .handshake
                .clone()
                .ok_or(ConnectError::Superseded),
            Ok(Ok(Some(err))) => Err(err),
            Ok(Err(_)) | Err(_) => Err(ConnectError::Timeout(timeout)),
        }
    }

    /// Feed a reachability change in directly.
    pub fn on_reachability_change(&self, reachability: Reachability) {
        self.inner.on_reachability(reachability);
    }

    /// Send a JSON frame over the live socket.
    pub async fn send_event(&self, event: &Value) -> Result<(), ConnectError> {
        let sink = self
            .inner
            .sink_for(None)
            .ok_or(ConnectError::NotConnected)?;
        sink.lock().await.send(event.to_string()).await?;
        Ok(())
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.lock().state.clone()
    }

    pub fn ws_id(&self) -> u64 {
        self.inner.lock().state.ws_id
    }

    pub fn connection_id(&self) -> Option<String> {
        self.inner.lock().state.connection_id.clone()
    }

    pub fn is_healthy(&self) -> bool {
        self.inner.lock().state.is_healthy
    }

    pub fn is_connecting(&self) -> bool {
        self.inner.lock().state.is_connecting
    }

    /// Locally generated id sent in heartbeats.
    pub fn client_id(&self) -> &str {
        &self.inner.client_id
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Where server events and connection events are published.
    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.inner.dispatcher
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("client_id", &self.inner.client_id)
            .field("state", &self.state())
            .finish()
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn spawn<F>(&self, task: F) -> Option<JoinHandle<()>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                let stored = self
                    .runtime
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone();
                match stored {
                    Some(handle) => handle,
                    None => {
                        warn!("no tokio runtime available, background task dropped");
                        return None;
                    }
                }
            }
        };
        Some(handle.spawn(task))
    }

    /// One socket attempt for the caller that claimed `is_connecting` at
    /// generation `claimed`. Clears `is_connecting` unless a newer
    /// generation has taken over.
    async fn open(self: &Arc<Self>, claimed: u64) -> HandshakeResult {
        let (generation, result) = self.attempt(claimed).await;
        {
            let mut shared = self.lock();
            if shared.state.ws_id == generation.unwrap_or(claimed) {
                shared.state.is_connecting = false;
            }
        }
        result
    }

    async fn attempt(self: &Arc<Self>, claimed: u64) -> (Option<u64>, HandshakeResult) {
        if let Err(e) = self.auth.token_ready().await {
            return (None, Err(e.into()));
        }
        let request_id = Uuid::new_v4().to_string();
        let url = {
            let token = self.auth.token();
            let request = ConnectRequest {
                token: token.as_deref(),
                auth_type: self.auth.auth_type(),
                request_id: &request_id,
            };
            match frame::connect_url(&self.config, &request) {
                Ok(url) => url,
                Err(e) => return (None, Err(e)),
            }
        };

        let Some((generation, handshake)) = self.begin_generation(claimed) else {
            debug!("attempt claimed at ws_id {} was superseded", claimed);
            return (None, Err(ConnectError::Superseded));
        };
        debug!("opening socket (ws_id {}, request {})", generation, request_id);

        let connection = match self.transport.open(url.as_str()).await {
            Ok(connection) => connection,
            Err(e) => {
                let err = self.fail_attempt(generation, ConnectError::Transport(e));
                return (Some(generation), Err(err));
            }
        };
        if !self.install(generation, connection) {
            return (Some(generation), Err(ConnectError::Superseded));
        }

        let timeout = self.config.handshake_timeout();
        let result = match tokio::time::timeout(timeout, handshake).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ConnectError::Superseded),
            Err(_) => Err(self.fail_attempt(generation, ConnectError::HandshakeTimeout(timeout))),
        };
        (Some(generation), result)
    }

    /// Starts a new generation, unless a disconnect or another attempt
    /// moved `ws_id` since the attempt was claimed.
    fn begin_generation(&self, claimed: u64) -> Option<(u64, oneshot::Receiver<HandshakeResult>)> {
        let (tx, rx) = oneshot::channel();
        let mut shared = self.lock();
        if shared.state.ws_id != claimed || shared.state.is_disconnected {
            return None;
        }
        shared.state.ws_id += 1;
        let generation = shared.state.ws_id;
        self.teardown(&mut shared);
        shared.pending = Some((generation, tx));
        Some((generation, rx))
    }

    /// Adopt a freshly opened socket and start reading from it.
    fn install(self: &Arc<Self>, generation: u64, connection: Connection) -> bool {
        let Connection { sink, stream } = connection;
        let sink: SharedSink = Arc::new(tokio::sync::Mutex::new(sink));

        let mut shared = self.lock();
        if shared.state.ws_id != generation {
            debug!("socket {} opened after being superseded", generation);
            self.close_in_background(sink, "superseded");
            return false;
        }
        let closed = CancellationToken::new();
        let reader = self.spawn(read_loop(
            Arc::downgrade(self),
            generation,
            stream,
            closed.clone(),
        ));
        let Some(reader) = reader else {
            return false;
        };
        shared.socket = Some(Socket {
            sink,
            closed,
            reader,
        });
        shared.state.last_event_at = Some(Instant::now());
        true
    }

    /// Drop the current socket and its timers.
    fn teardown(&self, shared: &mut Shared) {
        for timer in shared.timers.drain(..) {
            timer.abort();
        }
        if let Some(socket) = shared.socket.take() {
            socket.reader.abort();
            self.close_in_background(socket.sink, "replaced");
        }
        shared.handshake = None;
        shared.state.connection_id = None;
    }

    fn close_in_background(&self, sink: SharedSink, reason: &'static str) {
        self.spawn(async move {
            let _ = sink.lock().await.close(CLOSE_NORMAL, reason.into()).await;
        });
    }

    /// Count a failure of the current attempt. Returns `Superseded` instead
    /// when the attempt is no longer current.
    fn fail_attempt(self: &Arc<Self>, generation: u64, err: ConnectError) -> ConnectError {
        let mut shared = self.lock();
        if shared.state.ws_id != generation {
            return ConnectError::Superseded;
        }
        warn!("connection attempt {} failed: {}", generation, err);
        self.teardown(&mut shared);
        shared.pending = None;
        shared.state.consecutive_failures += 1;
        shared.state.total_failures += 1;
        self.set_health(&mut shared, false);
        err
    }

    /// Returns the event to publish once the lock is released.
    fn set_health(self: &Arc<Self>, shared: &mut Shared, healthy: bool) -> Option<Event> {
        if shared.state.is_healthy == healthy {
            return None;
        }
        shared.state.is_healthy = healthy;
        self.health.send_replace(healthy);
        if healthy {
            return Some(Event::connection_changed(true));
        }

        // Short blips are not announced
        let weak = Arc::downgrade(self);
        let delay = self.config.offline_notice_delay();
        self.spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let still_unhealthy = !inner.lock().state.is_healthy;
            if still_unhealthy {
                inner.dispatcher.dispatch(&Event::connection_changed(false));
            }
        });
        None
    }

    /// Handle one inbound text frame. Returns false to stop reading.
    fn on_frame(self: &Arc<Self>, generation: u64, text: &str) -> bool {
        let value: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => {
                warn!("ignoring unparseable frame: {}", e);
                return true;
            }
        };

        let mut notice = None;
        {
            let mut shared = self.lock();
            if shared.state.ws_id != generation {
                return false;
            }
            shared.state.last_event_at = Some(Instant::now());

            if let Some(tx) = shared.take_pending(generation) {
                match frame::parse_handshake(&value) {
                    Ok(handshake) => {
                        info!(
                            "connected (ws_id {}, connection_id {})",
                            generation, handshake.connection_id
                        );
                        shared.state.connection_id = Some(handshake.connection_id.clone());
                        shared.state.consecutive_failures = 0;
                        shared.state.is_connecting = false;
                        shared.handshake = Some(handshake.clone());
                        self.start_timers(&mut shared, generation);
                        notice = self.set_health(&mut shared, true);
                        let _ = tx.send(Ok(handshake));
                    }
                    Err(err) => {
                        warn!("handshake failed: {}", err);
                        self.teardown(&mut shared);
                        shared.state.consecutive_failures += 1;
                        shared.state.total_failures += 1;
                        let _ = tx.send(Err(err));
                        return false;
                    }
                }
            }
        }

        if let Some(event) = notice {
            self.dispatcher.dispatch(&event);
        }
        match Event::from_value(value) {
            Ok(event) => {
                if let Event::HealthCheck(_) = event {
                    trace!("health check received");
                }
                self.dispatcher.dispatch(&event);
            }
            Err(e) => warn!("dropping event: {}", e),
        }
        true
    }

    fn on_closed(self: &Arc<Self>, generation: u64, code: u16, reason: String) {
        if code != CLOSE_NORMAL {
            self.on_lost(generation, ConnectError::Closed { code, reason });
            return;
        }

        let mut shared = self.lock();
        if shared.state.ws_id != generation {
            return;
        }
        error!("server rejected the connection: {}", reason);
        self.teardown(&mut shared);
        self.set_health(&mut shared, false);
        if let Some(tx) = shared.take_pending(generation) {
            let _ = tx.send(Err(ConnectError::Rejected { reason }));
        }
    }

    /// The socket failed. Fails the pending attempt if there is one,
    /// otherwise starts reconnecting.
    fn on_lost(self: &Arc<Self>, generation: u64, err: ConnectError) {
        let pending = {
            let mut shared = self.lock();
            if shared.state.ws_id != generation {
                debug!("ignoring '{}' from stale socket {}", err, generation);
                return;
            }
            warn!("connection lost: {}", err);
            self.teardown(&mut shared);
            shared.state.consecutive_failures += 1;
            shared.state.total_failures += 1;
            self.set_health(&mut shared, false);
            shared.take_pending(generation)
        };
        match pending {
            Some(tx) => {
                let _ = tx.send(Err(err));
            }
            None => self.spawn_reconnect(ReconnectOptions::default()),
        }
    }

    fn start_timers(self: &Arc<Self>, shared: &mut Shared, generation: u64) {
        for timer in shared.timers.drain(..) {
            timer.abort();
        }
        let heartbeat = self.spawn(heartbeat_loop(
            Arc::downgrade(self),
            generation,
            self.config.heartbeat_interval(),
        ));
        let monitor = self.spawn(monitor_loop(
            Arc::downgrade(self),
            generation,
            self.config.monitor_interval(),
            self.config.stale_after(),
        ));
        shared.timers.extend(heartbeat);
        shared.timers.extend(monitor);
    }

    /// Returns false once this generation's monitor should stop.
    fn check_liveness(self: &Arc<Self>, generation: u64, stale_after: Duration) -> bool {
        {
            let mut shared = self.lock();
            if shared.state.ws_id != generation || shared.state.is_disconnected {
                return false;
            }
            let Some(last) = shared.state.last_event_at else {
                return true;
            };
            let silent = last.elapsed();
            if silent <= stale_after {
                return true;
            }
            warn!("no frames for {:?}, reconnecting", silent);
            self.set_health(&mut shared, false);
        }
        self.spawn_reconnect(ReconnectOptions::default());
        false
    }

    fn sink_for(&self, generation: Option<u64>) -> Option<SharedSink> {
        let shared = self.lock();
        if generation.is_some_and(|g| g != shared.state.ws_id) {
            return None;
        }
        shared.socket.as_ref().map(|s| Arc::clone(&s.sink))
    }

    fn attach_reachability(self: &Arc<Self>) {
        let Some(source) = &self.reachability else {
            return;
        };
        if self.lock().reachability.is_some() {
            return;
        }
        let weak = Arc::downgrade(self);
        let subscription = source.on_reachability_change(Arc::new(move |r: Reachability| {
            if let Some(inner) = weak.upgrade() {
                inner.on_reachability(r);
            }
        }));
        let previous = self.lock().reachability.replace(subscription);
        drop(previous);
    }

    fn on_reachability(self: &Arc<Self>, reachability: Reachability) {
        match reachability {
            Reachability::Offline => {
                let mut shared = self.lock();
                if shared.state.is_disconnected {
                    return;
                }
                info!("network offline");
                self.set_health(&mut shared, false);
            }
            Reachability::Online => {
                if self.lock().state.is_healthy {
                    return;
                }
                info!("network online, reconnecting");
                self.spawn_reconnect(ReconnectOptions::after(self.config.online_retry_interval()));
            }
        }
    }

    fn spawn_reconnect(self: &Arc<Self>, options: ReconnectOptions) {
        let weak = Arc::downgrade(self);
        self.spawn(Inner::reconnect_loop(weak, options));
    }

    async fn reconnect_loop(weak: Weak<Inner>, mut options: ReconnectOptions) {
        loop {
            let (interval, shutdown) = {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let (failures, shutdown) = {
                    let shared = inner.lock();
                    if let Some(reason) = shared.reconnect_blocker() {
                        debug!("reconnect skipped: {}", reason);
                        return;
                    }
                    (shared.state.consecutive_failures, shared.shutdown.clone())
                };
                let interval = match options.interval {
                    Some(interval) => interval,
                    None => match inner.retry.interval(failures) {
                        Ok(interval) => interval,
                        Err(e) => {
                            error!("{}, automatic reconnects halted", e);
                            return;
                        }
                    },
                };
                (interval, shutdown)
            };

            debug!("reconnecting in {:?}", interval);
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = tokio::time::sleep(interval) => {}
            }

            let Some(inner) = weak.upgrade() else {
                return;
            };
            let claimed = {
                let mut shared = inner.lock();
                if let Some(reason) = shared.reconnect_blocker() {
                    debug!("reconnect skipped: {}", reason);
                    return;
                }
                shared.state.is_connecting = true;
                shared.state.ws_id
            };
            inner.failure.send_replace(None);
            if options.refresh_token {
                if let Err(e) = inner.auth.refresh().await {
                    warn!("token refresh failed: {}", e);
                }
                if inner.lock().state.ws_id != claimed {
                    debug!("reconnect superseded during token refresh");
                    return;
                }
            }

            match inner.open(claimed).await {
                Ok(handshake) => {
                    inner.recover(&handshake).await;
                    return;
                }
                Err(err) if err.is_token_expired() && !inner.auth.is_static() => {
                    warn!("token expired, refreshing before the next attempt");
                    // A second expiry in a row backs off like any other failure
                    let interval = if options.refresh_token {
                        None
                    } else {
                        Some(Duration::ZERO)
                    };
                    options = ReconnectOptions {
                        interval,
                        refresh_token: true,
                    };
                }
                Err(err) if err.is_transport_failure() => {
                    debug!("reconnect attempt failed: {}", err);
                    options = ReconnectOptions::default();
                }
                Err(ConnectError::Superseded) => return,
                Err(err) => {
                    error!("reconnect failed permanently: {}", err);
                    inner.failure.send_replace(Some(err));
                    return;
                }
            }
        }
    }

    async fn recover(&self, handshake: &Handshake) {
        match self.recovery.recover(handshake).await {
            Ok(()) => {
                info!("connection recovered ({})", handshake.connection_id);
                self.dispatcher.dispatch(&Event::ConnectionRecovered);
            }
            Err(e) => warn!("{}", e),
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let shared = self
            .shared
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        shared.shutdown.cancel();
        for timer in shared.timers.drain(..) {
            timer.abort();
        }
        if let Some(socket) = shared.socket.take() {
            socket.reader.abort();
        }
    }
}

async fn read_loop(
    weak: Weak<Inner>,
    generation: u64,
    mut stream: Box<dyn FrameStream>,
    closed: CancellationToken,
) {
    loop {
        let received = stream.recv().await;
        let Some(inner) = weak.upgrade() else {
            break;
        };
        let keep_reading = match received {
            Ok(Some(Inbound::Text(text))) => inner.on_frame(generation, &text),
            Ok(Some(Inbound::Closed { code, reason })) => {
                inner.on_closed(generation, code, reason);
                false
            }
            Ok(None) => {
                inner.on_closed(generation, CLOSE_ABNORMAL, "stream ended".into());
                false
            }
            Err(e) => {
                inner.on_lost(generation, ConnectError::Transport(e));
                false
            }
        };
        if !keep_reading {
            break;
        }
    }
    closed.cancel();
}

async fn heartbeat_loop(weak: Weak<Inner>, generation: u64, every: Duration) {
    let mut ticker = tokio::time::interval_at(Instant::now() + every, every);
    loop {
        ticker.tick().await;
        let (sink, frame) = {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let Some(sink) = inner.sink_for(Some(generation)) else {
                return;
            };
            (sink, frame::heartbeat(&inner.client_id, &inner.config.user_id))
        };
        trace!("sending heartbeat");
        let sent = sink.lock().await.send(frame).await;
        if let Err(e) = sent {
            debug!("heartbeat failed: {}", e);
        }
    }
}

async fn monitor_loop(weak: Weak<Inner>, generation: u64, every: Duration, stale_after: Duration) {
    let mut ticker = tokio::time::interval_at(Instant::now() + every, every);
    loop {
        ticker.tick().await;
        let Some(inner) = weak.upgrade() else {
            return;
        };
        if !inner.check_liveness(generation, stale_after) {
            return;
        }
    }
}

#[cfg(test)]
#[path = "connection_tests.rs"]
mod tests;
