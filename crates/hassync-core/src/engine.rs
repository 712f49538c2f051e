// ── Sync engine ──
//
// Owns the full lifecycle of one mirrored connection: connect,
// authenticate, bootstrap snapshot, steady-state event application,
// periodic refresh, and reconnection. One background session task per
// engine is the sole writer to the connection state, the correlator,
// and the store; everything else observes through channels.

use std::sync::Arc;

use secrecy::ExposeSecret;
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use hassync_api::frame::{self, ClientFrame, ServerFrame, ServiceTarget};
use hassync_api::transport::{Connector, Transport, TransportEvent, WsConnector};

use crate::config::EngineConfig;
use crate::connection::{ConnectionManager, ConnectionState, SyncStatus};
use crate::correlate::{RequestCorrelator, RequestKind};
use crate::error::SyncError;
use crate::model::EntityId;
use crate::store::{DomainView, EntityStore};

const COMMAND_CHANNEL_SIZE: usize = 64;
const ALERT_CHANNEL_SIZE: usize = 256;

// ── Alert ────────────────────────────────────────────────────────────

/// Side-effect notification describing one entity state change.
///
/// Delivery is someone else's job: the engine emits `(title, body)`
/// pairs when `notifications_enabled` is set and never interprets the
/// flag further.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub title: String,
    pub body: String,
}

// ── Caller commands ──────────────────────────────────────────────────

#[derive(Debug)]
enum EngineCommand {
    CallService { entity_id: EntityId, service: String },
    Refresh,
}

// ── SyncEngine ───────────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc`. Each instance is fully self-contained
/// (own state, own store, own correlator) -- construct as many as you
/// need; nothing is process-wide.
pub struct SyncEngine<C: Connector = WsConnector> {
    inner: Arc<EngineInner<C>>,
}

impl<C: Connector> Clone for SyncEngine<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct EngineInner<C: Connector> {
    config: EngineConfig,
    connector: C,
    store: Arc<EntityStore>,
    manager: ConnectionManager,
    alert_tx: broadcast::Sender<Alert>,
    command_tx: mpsc::Sender<EngineCommand>,
    command_rx: Mutex<Option<mpsc::Receiver<EngineCommand>>>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SyncEngine {
    /// Create an engine that connects over a real WebSocket.
    /// Does NOT connect -- call [`connect()`](Self::connect).
    pub fn new(config: EngineConfig) -> Self {
        let connector = WsConnector::new(config.url.clone());
        Self::with_connector(config, connector)
    }
}

impl<C: Connector> SyncEngine<C> {
    /// Create an engine over an arbitrary [`Connector`].
    ///
    /// This is the seam tests use: a scripted connector feeds synthetic
    /// transport events and captures outgoing frames.
    pub fn with_connector(config: EngineConfig, connector: C) -> Self {
        let manager = ConnectionManager::new(config.auto_reconnect, config.reconnect.clone());
        let (alert_tx, _) = broadcast::channel(ALERT_CHANNEL_SIZE);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);

        Self {
            inner: Arc::new(EngineInner {
                config,
                connector,
                store: Arc::new(EntityStore::new()),
                manager,
                alert_tx,
                command_tx,
                command_rx: Mutex::new(Some(command_rx)),
                cancel: CancellationToken::new(),
                task: Mutex::new(None),
            }),
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Start the background session task. Connection progress is
    /// observable through [`status()`](Self::status) and
    /// [`connection_state()`](Self::connection_state); this returns as
    /// soon as the task is spawned.
    pub async fn connect(&self) {
        let Some(command_rx) = self.inner.command_rx.lock().await.take() else {
            debug!("engine already started");
            return;
        };

        let engine = self.clone();
        let handle = tokio::spawn(run_loop(engine, command_rx));
        *self.inner.task.lock().await = Some(handle);
    }

    /// Tear down: cancels any pending backoff or refresh timer,
    /// discards pending requests, and lands in `Disconnected`.
    /// In-flight commands may or may not have been applied remotely.
    /// Terminal for this instance -- build a new engine to reconnect.
    pub async fn disconnect(&self) {
        self.inner.cancel.cancel();
        if let Some(handle) = self.inner.task.lock().await.take() {
            let _ = handle.await;
        }
        self.inner.manager.disconnected();
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Invoke `service` against one entity, fire-and-forget.
    ///
    /// The target domain is derived from the entity id. Queuing
    /// succeeds while the engine runs; whether the remote applied the
    /// command is not reported back (its `result` only clears the
    /// pending correlation entry).
    pub async fn call_service(
        &self,
        entity_id: EntityId,
        service: impl Into<String>,
    ) -> Result<(), SyncError> {
        self.inner
            .command_tx
            .send(EngineCommand::CallService {
                entity_id,
                service: service.into(),
            })
            .await
            .map_err(|_| SyncError::Disconnected)
    }

    /// Request a full snapshot refresh now, outside the timer cadence.
    pub async fn refresh_now(&self) -> Result<(), SyncError> {
        self.inner
            .command_tx
            .send(EngineCommand::Refresh)
            .await
            .map_err(|_| SyncError::Disconnected)
    }

    // ── Observation ──────────────────────────────────────────────────

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.manager.subscribe_state()
    }

    pub fn current_state(&self) -> ConnectionState {
        self.inner.manager.state()
    }

    pub fn status(&self) -> watch::Receiver<SyncStatus> {
        self.inner.manager.subscribe_status()
    }

    /// Entity-change signal: a fresh grouped view per store mutation.
    pub fn entities(&self) -> watch::Receiver<Arc<DomainView>> {
        self.inner.store.subscribe()
    }

    /// The same signal as a `Stream`, for `StreamExt` consumers.
    /// Yields the current view first, then one item per change.
    pub fn entity_stream(&self) -> WatchStream<Arc<DomainView>> {
        WatchStream::new(self.inner.store.subscribe())
    }

    pub fn alerts(&self) -> broadcast::Receiver<Alert> {
        self.inner.alert_tx.subscribe()
    }

    pub fn store(&self) -> &Arc<EntityStore> {
        &self.inner.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }
}

// ── Connection loop ──────────────────────────────────────────────────

/// Outer loop: connect, run one session, then apply the reconnect
/// policy to whatever ended it.
async fn run_loop<C: Connector>(engine: SyncEngine<C>, mut command_rx: mpsc::Receiver<EngineCommand>) {
    let inner = &engine.inner;
    let manager = &inner.manager;
    let cancel = inner.cancel.clone();
    let mut attempt: u32 = 0;

    loop {
        manager.connecting();

        let connected = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                manager.disconnected();
                break;
            }
            connected = inner.connector.connect() => connected,
        };

        let end = match connected {
            Ok(transport) => {
                manager.authenticating();
                let mut session = Session::new(inner);
                session.run(transport, &mut command_rx, &cancel).await
            }
            Err(e) => SessionEnd::ConnectionLost {
                reason: e.to_string(),
                was_live: false,
            },
        };

        match end {
            SessionEnd::Cancelled => {
                manager.disconnected();
                break;
            }
            SessionEnd::AuthRejected { message } => {
                // A bad credential will not become valid by retrying.
                manager.auth_rejected(message.as_deref());
                break;
            }
            SessionEnd::ConnectionLost { reason, was_live } => {
                if was_live {
                    attempt = 0;
                }

                if !manager.auto_reconnect() {
                    manager.closed(&reason);
                    break;
                }
                if manager.retries_exhausted(attempt) {
                    manager.gave_up(attempt);
                    break;
                }

                let delay = manager.backoff(attempt);
                manager.reconnecting(attempt, delay, &reason);

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        manager.disconnected();
                        break;
                    }
                    _ = tokio::time::sleep(delay) => {}
                }

                attempt += 1;
            }
        }
    }

    debug!("sync engine loop exiting");
}

// ── Session ──────────────────────────────────────────────────────────

/// Why one session ended.
enum SessionEnd {
    /// Caller teardown.
    Cancelled,
    /// `auth_invalid` received; terminal for the whole loop.
    AuthRejected { message: Option<String> },
    /// Transport loss or handshake timeout; the reconnect policy decides
    /// what happens next. `was_live` resets the backoff ladder.
    ConnectionLost { reason: String, was_live: bool },
}

/// State for one authenticated connection: the correlator is fresh per
/// session (ids restart at 1) and pending requests die with it.
struct Session<'a, C: Connector> {
    inner: &'a EngineInner<C>,
    correlator: RequestCorrelator,
    live: bool,
}

impl<'a, C: Connector> Session<'a, C> {
    fn new(inner: &'a EngineInner<C>) -> Self {
        Self {
            inner,
            correlator: RequestCorrelator::new(),
            live: false,
        }
    }

    async fn run(
        &mut self,
        mut transport: Transport,
        command_rx: &mut mpsc::Receiver<EngineCommand>,
        cancel: &CancellationToken,
    ) -> SessionEnd {
        // The server greets with `auth_required`; we do not wait for it.
        let auth = ClientFrame::Auth {
            access_token: self.inner.config.access_token.expose_secret().to_owned(),
        };
        if let Err(e) = self.send(&transport, &auth).await {
            return self.lost(e.to_string());
        }

        // Covers Authenticating and Syncing; disarmed once live.
        let handshake = tokio::time::sleep(self.inner.config.handshake_timeout);
        tokio::pin!(handshake);

        let mut refresh = self.inner.config.refresh_interval().map(|period| {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.correlator.clear();
                    return SessionEnd::Cancelled;
                }
                () = &mut handshake, if !self.live => {
                    return self.lost("Handshake timed out".to_owned());
                }
                _ = refresh_tick(&mut refresh), if self.live => {
                    if let Err(e) = self.request_snapshot(&transport).await {
                        return self.lost(e.to_string());
                    }
                }
                command = command_rx.recv() => {
                    match command {
                        Some(command) => {
                            if let Err(e) = self.handle_command(&transport, command).await {
                                return self.lost(e.to_string());
                            }
                        }
                        // All engine handles dropped mid-session.
                        None => {
                            self.correlator.clear();
                            return SessionEnd::Cancelled;
                        }
                    }
                }
                event = transport.recv() => {
                    match event {
                        Some(TransportEvent::Message(text)) => {
                            match self.handle_frame(&transport, &text).await {
                                Ok(None) => {}
                                Ok(Some(end)) => {
                                    self.correlator.clear();
                                    return end;
                                }
                                Err(e) => return self.lost(e.to_string()),
                            }
                        }
                        Some(TransportEvent::Closed { code, reason }) => {
                            debug!(?code, ?reason, "connection closed by peer");
                            return self.lost("Connection closed".to_owned());
                        }
                        Some(TransportEvent::Failed(reason)) => {
                            return self.lost(format!("Connection error: {reason}"));
                        }
                        None => {
                            return self.lost("Transport task ended".to_owned());
                        }
                    }
                }
            }
        }
    }

    /// Dispatch one decoded frame. Malformed input is dropped and
    /// logged; it never ends the session. `Ok(Some(_))` ends it.
    async fn handle_frame(
        &mut self,
        transport: &Transport,
        text: &str,
    ) -> Result<Option<SessionEnd>, hassync_api::Error> {
        let frame = match frame::decode(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "dropping malformed frame");
                return Ok(None);
            }
        };

        match frame {
            ServerFrame::AuthRequired => trace!("server requested auth"),

            ServerFrame::AuthOk => {
                self.inner.manager.syncing();
                self.request_snapshot(transport).await?;
            }

            ServerFrame::AuthInvalid { message } => {
                return Ok(Some(SessionEnd::AuthRejected { message }));
            }

            ServerFrame::Result { id, success, result } => {
                match self.correlator.resolve(id) {
                    Some(RequestKind::BootstrapSnapshot) => match frame::decode_states(&result) {
                        Ok(states) => {
                            let count = states.len();
                            self.inner.store.load_snapshot(states);
                            self.live = true;
                            self.inner.manager.live(count);
                        }
                        Err(e) => {
                            warn!(error = %e, id, "snapshot result was not an entity list");
                        }
                    },
                    Some(RequestKind::UserCommand) => {
                        if success {
                            debug!(id, "service call acknowledged");
                        } else {
                            warn!(id, "service call rejected by remote");
                        }
                    }
                    // The remote may emit unsolicited results.
                    None => trace!(id, "result for unknown request id, ignoring"),
                }
            }

            ServerFrame::Event { event } => {
                let Some(change) = event.data else {
                    return Ok(None);
                };
                let Some(new_state) = change.new_state else {
                    trace!(entity_id = change.entity_id, "event without new_state, ignoring");
                    return Ok(None);
                };

                let entity_id = EntityId::new(change.entity_id);
                let state = new_state.state;
                self.inner
                    .store
                    .apply_patch(entity_id.clone(), state.clone(), new_state.attributes);

                if self.inner.config.notifications_enabled {
                    let _ = self.inner.alert_tx.send(Alert {
                        title: "Entity state changed".to_owned(),
                        body: format!("{entity_id} is now {state}"),
                    });
                }
            }

            ServerFrame::Unknown => trace!("unhandled frame type"),
        }

        Ok(None)
    }

    async fn handle_command(
        &mut self,
        transport: &Transport,
        command: EngineCommand,
    ) -> Result<(), hassync_api::Error> {
        match command {
            EngineCommand::CallService { entity_id, service } => {
                if !self.live {
                    warn!(%entity_id, service, "dropping command, connection not live");
                    return Ok(());
                }
                let id = self.correlator.register(RequestKind::UserCommand);
                let frame = ClientFrame::CallService {
                    id,
                    domain: entity_id.domain().to_owned(),
                    service,
                    target: ServiceTarget {
                        entity_id: entity_id.to_string(),
                    },
                };
                self.send(transport, &frame).await
            }
            EngineCommand::Refresh => {
                if self.live {
                    self.request_snapshot(transport).await
                } else {
                    Ok(())
                }
            }
        }
    }

    async fn request_snapshot(&mut self, transport: &Transport) -> Result<(), hassync_api::Error> {
        let id = self.correlator.register(RequestKind::BootstrapSnapshot);
        self.send(transport, &ClientFrame::GetStates { id }).await
    }

    async fn send(
        &self,
        transport: &Transport,
        frame: &ClientFrame,
    ) -> Result<(), hassync_api::Error> {
        transport.send(frame::encode(frame)?).await
    }

    fn lost(&mut self, reason: String) -> SessionEnd {
        self.correlator.clear();
        SessionEnd::ConnectionLost {
            reason,
            was_live: self.live,
        }
    }
}

/// Await the next refresh tick, or park forever when refresh is off.
async fn refresh_tick(refresh: &mut Option<Interval>) {
    match refresh {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
