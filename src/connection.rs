//! Transport Session: one logical connection to the game server.
//!
//! [`Connection`] is a thin handle over a background pump task that owns the
//! live [`Transport`]. Outgoing [`ClientMessage`]s are queued over an
//! unbounded MPSC channel; inbound wire events are decoded once into
//! [`ServerMessage`] and delivered — in arrival order — as
//! [`TransportEvent`]s on a bounded channel created by [`Connection::new`].
//!
//! # Reconnection
//!
//! The initial [`connect`](Connection::connect) rejects on the first
//! connection error. After a successful connect, a transport drop is *not*
//! surfaced as an error: the pump emits [`TransportEvent::Down`], then
//! silently redials through the configured [`Dialer`] with a fixed delay
//! between a bounded number of attempts. On success it emits
//! [`TransportEvent::Up`] with the fresh connection id. Once the attempts
//! are exhausted the session stays disconnected until an explicit new
//! `connect()`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

use crate::error::{ArenaError, Result};
use crate::protocol::{ClientMessage, ConnectionId, Handshake, ServerMessage};
use crate::transport::{Dialer, Transport};

/// Default capacity of the bounded event channel.
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Default delay between automatic reconnection attempts.
const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Default number of automatic reconnection attempts.
const DEFAULT_RECONNECT_ATTEMPTS: u32 = 5;

/// Default time allowed for the server handshake frame on a fresh channel.
const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default timeout for the graceful shutdown.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

// ── Configuration ───────────────────────────────────────────────────

/// Tunables for a [`Connection`]. All fields have sensible defaults.
///
/// # Example
///
/// ```
/// use snake_arena_client::connection::ConnectConfig;
/// use std::time::Duration;
///
/// let config = ConnectConfig::new()
///     .with_reconnect_delay(Duration::from_millis(500))
///     .with_reconnect_attempts(3);
/// assert_eq!(config.reconnect_attempts, 3);
/// ```
#[derive(Debug, Clone)]
pub struct ConnectConfig {
    /// Fixed delay between automatic reconnection attempts.
    pub reconnect_delay: Duration,
    /// Number of automatic reconnection attempts after a transport drop.
    /// Zero disables silent reconnection entirely.
    pub reconnect_attempts: u32,
    /// Time allowed for the server's handshake frame on a fresh channel.
    pub handshake_timeout: Duration,
    /// Capacity of the bounded event channel.
    ///
    /// When the consumer cannot keep up with incoming server messages,
    /// events are dropped (with a warning logged) to avoid blocking the
    /// pump. [`TransportEvent::Down`] is always delivered regardless.
    /// Values below 1 are clamped to 1.
    pub event_channel_capacity: usize,
    /// Timeout for the graceful shutdown before the pump task is aborted.
    pub shutdown_timeout: Duration,
}

impl ConnectConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self {
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            reconnect_attempts: DEFAULT_RECONNECT_ATTEMPTS,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    /// Set the fixed delay between reconnection attempts.
    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Set the number of automatic reconnection attempts.
    #[must_use]
    pub fn with_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.reconnect_attempts = attempts;
        self
    }

    /// Set the handshake timeout.
    #[must_use]
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Set the capacity of the bounded event channel (clamped to ≥ 1).
    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }

    /// Set the timeout for the graceful shutdown.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self::new()
    }
}

// ── Events ──────────────────────────────────────────────────────────

/// Events delivered by the Transport Session to its single consumer
/// (normally the Room Session). Payloads are not transformed at this layer.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The channel is live; carries the server-assigned connection id.
    /// Emitted after the initial connect and after every successful
    /// automatic reconnection.
    Up { connection_id: ConnectionId },
    /// The channel dropped. Silent reconnection may follow, or none.
    Down { reason: Option<String> },
    /// A decoded inbound protocol message.
    Message(ServerMessage),
}

// ── Shared state ────────────────────────────────────────────────────

/// State shared between the handle and the pump task. The mutex is a
/// `std` mutex and is never held across an await point.
struct ConnState {
    connected: AtomicBool,
    connection_id: StdMutex<Option<ConnectionId>>,
}

impl ConnState {
    fn new() -> Self {
        Self {
            connected: AtomicBool::new(false),
            connection_id: StdMutex::new(None),
        }
    }

    fn set_up(&self, sid: ConnectionId) {
        if let Ok(mut guard) = self.connection_id.lock() {
            *guard = Some(sid);
        }
        self.connected.store(true, Ordering::Release);
    }

    fn set_down(&self) {
        self.connected.store(false, Ordering::Release);
    }
}

// ── Connection handle ───────────────────────────────────────────────

/// Handle to the Transport Session.
///
/// Created via [`Connection::new`] together with the event receiver. No I/O
/// happens until [`connect`](Connection::connect) is called; the handle is
/// reusable across explicit disconnects and exhausted reconnection runs.
pub struct Connection {
    dialer: Arc<dyn Dialer>,
    config: ConnectConfig,
    state: Arc<ConnState>,
    event_tx: mpsc::Sender<TransportEvent>,
    cmd_tx: Option<mpsc::UnboundedSender<ClientMessage>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl Connection {
    /// Create a connection handle and its event receiver.
    ///
    /// The receiver yields [`TransportEvent`]s for the lifetime of the
    /// handle, across reconnects and repeated `connect()` calls.
    #[must_use = "the event receiver must be consumed to observe the session"]
    pub fn new(
        dialer: impl Dialer,
        config: ConnectConfig,
    ) -> (Self, mpsc::Receiver<TransportEvent>) {
        let capacity = config.event_channel_capacity.max(1);
        let (event_tx, event_rx) = mpsc::channel(capacity);
        let conn = Self {
            dialer: Arc::new(dialer),
            config,
            state: Arc::new(ConnState::new()),
            event_tx,
            cmd_tx: None,
            shutdown_tx: None,
            task: None,
        };
        (conn, event_rx)
    }

    /// Establish the connection.
    ///
    /// Idempotent: returns `Ok(())` immediately when already connected,
    /// without re-dialing. Otherwise dials through the configured
    /// [`Dialer`], waits for the server handshake, and spawns the pump.
    ///
    /// # Errors
    ///
    /// Rejects with the first connection error ([`ArenaError::ConnectFailed`]
    /// or [`ArenaError::HandshakeFailed`]). Reconnection attempts after a
    /// later transport drop are internal and never reported here.
    pub async fn connect(&mut self) -> Result<()> {
        if self.is_connected() {
            debug!("connect: already connected");
            return Ok(());
        }

        // Drop any finished pump from a previous life.
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.shutdown_tx = None;
        self.cmd_tx = None;

        let mut transport = self.dialer.dial().await?;
        let sid = await_handshake(transport.as_mut(), self.config.handshake_timeout).await?;

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        self.state.set_up(sid.clone());

        let task = tokio::spawn(pump(
            transport,
            sid,
            Arc::clone(&self.dialer),
            self.config.clone(),
            cmd_rx,
            self.event_tx.clone(),
            Arc::clone(&self.state),
            shutdown_rx,
        ));

        self.cmd_tx = Some(cmd_tx);
        self.shutdown_tx = Some(shutdown_tx);
        self.task = Some(task);
        Ok(())
    }

    /// Queue a [`ClientMessage`] for transmission.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::NotConnected`] when the channel is down
    /// (never connected, mid-reconnect, or reconnection exhausted).
    pub fn send(&self, msg: ClientMessage) -> Result<()> {
        if !self.is_connected() {
            return Err(ArenaError::NotConnected);
        }
        match &self.cmd_tx {
            Some(tx) => tx.send(msg).map_err(|_| ArenaError::NotConnected),
            None => Err(ArenaError::NotConnected),
        }
    }

    /// Tear the connection down gracefully.
    ///
    /// Signals the pump, which closes the transport and emits a final
    /// [`TransportEvent::Down`]. Bounded by the configured shutdown
    /// timeout, after which the pump task is aborted. The handle remains
    /// reusable: a later `connect()` starts a fresh session.
    pub async fn disconnect(&mut self) {
        debug!("disconnect requested");

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(self.config.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    warn!("pump terminated with join error: {join_err}");
                }
                Err(_) => {
                    warn!("pump did not exit within timeout; aborting task");
                    task.abort();
                    if let Err(join_err) = task.await {
                        debug!("pump aborted: {join_err}");
                    }
                }
            }
        }

        self.cmd_tx = None;
        self.state.set_down();
    }

    /// Returns `true` while the channel is believed to be live.
    pub fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::Acquire)
    }

    /// The server-assigned connection id from the most recent handshake.
    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.state
            .connection_id
            .lock()
            .ok()
            .and_then(|guard| guard.clone())
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("connected", &self.is_connected())
            .field("connection_id", &self.connection_id())
            .field("has_task", &self.task.is_some())
            .finish()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        // `Drop` is synchronous, so the only safe action is to abort the
        // pump; there is no executor context to drive a graceful close.
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ── Handshake ───────────────────────────────────────────────────────

/// Consume the handshake frame from a fresh transport and return the
/// server-assigned connection id.
async fn await_handshake(
    transport: &mut (dyn Transport + '_),
    timeout: Duration,
) -> Result<ConnectionId> {
    let frame = tokio::time::timeout(timeout, transport.recv())
        .await
        .map_err(|_| ArenaError::HandshakeFailed("timed out waiting for handshake".into()))?;

    match frame {
        Some(Ok(text)) => serde_json::from_str::<Handshake>(&text)
            .map(|hs| hs.sid)
            .map_err(|e| ArenaError::HandshakeFailed(format!("bad handshake frame: {e}"))),
        Some(Err(e)) => Err(ArenaError::HandshakeFailed(e.to_string())),
        None => Err(ArenaError::HandshakeFailed(
            "transport closed before handshake".into(),
        )),
    }
}

// ── Pump ────────────────────────────────────────────────────────────

/// Background task multiplexing send/receive via `tokio::select!`.
///
/// Exits when:
/// - the command channel closes (handle dropped)
/// - the shutdown signal fires (explicit `disconnect`)
/// - the transport drops and reconnection attempts are exhausted
#[allow(clippy::too_many_arguments)]
async fn pump(
    mut transport: Box<dyn Transport>,
    sid: ConnectionId,
    dialer: Arc<dyn Dialer>,
    config: ConnectConfig,
    mut cmd_rx: mpsc::UnboundedReceiver<ClientMessage>,
    event_tx: mpsc::Sender<TransportEvent>,
    state: Arc<ConnState>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    debug!("pump started");

    emit_event(&event_tx, TransportEvent::Up { connection_id: sid }).await;

    loop {
        tokio::select! {
            // Branch 1: outgoing command from the handle
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(msg) => {
                        match serde_json::to_string(&msg) {
                            Ok(json) => {
                                if let Err(e) = transport.send(json).await {
                                    error!("transport send error: {e}");
                                    let reason = format!("transport send error: {e}");
                                    match reconnect(
                                        &dialer, &config, &event_tx, &state,
                                        &mut shutdown_rx, Some(reason),
                                    ).await {
                                        Some(fresh) => transport = fresh,
                                        None => break,
                                    }
                                }
                            }
                            Err(e) => {
                                // Serialization of our own types failing is a
                                // programming bug; don't kill the pump over it.
                                error!("failed to serialize ClientMessage: {e}");
                            }
                        }
                    }
                    None => {
                        debug!("command channel closed, shutting down pump");
                        let _ = transport.close().await;
                        emit_down(&event_tx, &state, Some("client shut down".into())).await;
                        break;
                    }
                }
            }

            // Branch 2: explicit disconnect
            _ = &mut shutdown_rx => {
                debug!("shutdown signal received");
                let _ = transport.close().await;
                emit_down(&event_tx, &state, Some("client disconnected".into())).await;
                break;
            }

            // Branch 3: incoming message from the server
            incoming = transport.recv() => {
                match incoming {
                    Some(Ok(text)) => {
                        match serde_json::from_str::<ServerMessage>(&text) {
                            Ok(msg) => {
                                emit_event(&event_tx, TransportEvent::Message(msg)).await;
                            }
                            Err(e) => {
                                warn!("undecodable server message: {e} — raw: {text}");
                            }
                        }
                    }
                    Some(Err(e)) => {
                        error!("transport receive error: {e}");
                        let reason = format!("transport receive error: {e}");
                        match reconnect(
                            &dialer, &config, &event_tx, &state,
                            &mut shutdown_rx, Some(reason),
                        ).await {
                            Some(fresh) => transport = fresh,
                            None => break,
                        }
                    }
                    None => {
                        debug!("transport closed by server");
                        match reconnect(
                            &dialer, &config, &event_tx, &state,
                            &mut shutdown_rx, None,
                        ).await {
                            Some(fresh) => transport = fresh,
                            None => break,
                        }
                    }
                }
            }
        }
    }

    debug!("pump exited");
}

/// Handle a post-connect transport drop: emit `Down`, then redial with the
/// fixed delay up to the configured attempt count. Returns the fresh
/// transport on success, or `None` when attempts are exhausted or shutdown
/// was requested — the pump then exits, leaving the session permanently
/// disconnected until an explicit `connect()`.
async fn reconnect(
    dialer: &Arc<dyn Dialer>,
    config: &ConnectConfig,
    event_tx: &mpsc::Sender<TransportEvent>,
    state: &Arc<ConnState>,
    shutdown_rx: &mut oneshot::Receiver<()>,
    reason: Option<String>,
) -> Option<Box<dyn Transport>> {
    emit_down(event_tx, state, reason).await;

    for attempt in 1..=config.reconnect_attempts {
        tokio::select! {
            _ = tokio::time::sleep(config.reconnect_delay) => {}
            _ = &mut *shutdown_rx => {
                debug!("shutdown during reconnection");
                return None;
            }
        }

        debug!(attempt, "reconnection attempt");
        let mut fresh = match dialer.dial().await {
            Ok(t) => t,
            Err(e) => {
                warn!(attempt, "reconnection dial failed: {e}");
                continue;
            }
        };
        let sid = match await_handshake(fresh.as_mut(), config.handshake_timeout).await {
            Ok(sid) => sid,
            Err(e) => {
                warn!(attempt, "reconnection handshake failed: {e}");
                continue;
            }
        };

        state.set_up(sid.clone());
        emit_event(event_tx, TransportEvent::Up { connection_id: sid }).await;
        return Some(fresh);
    }

    warn!(
        attempts = config.reconnect_attempts,
        "reconnection attempts exhausted; session stays disconnected"
    );
    None
}

/// Emit an event without blocking the pump. If the channel is full the
/// event is dropped with a warning.
async fn emit_event(event_tx: &mpsc::Sender<TransportEvent>, event: TransportEvent) {
    match event_tx.try_send(event) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(dropped)) => {
            warn!(
                "event channel full, dropping event: {:?}",
                std::mem::discriminant(&dropped)
            );
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!("event channel closed, receiver dropped");
        }
    }
}

/// Emit a [`TransportEvent::Down`] and flip the connected flag.
///
/// Uses a blocking `send().await` instead of `try_send` because `Down`
/// marks a session boundary and must never be silently dropped.
async fn emit_down(
    event_tx: &mpsc::Sender<TransportEvent>,
    state: &Arc<ConnState>,
    reason: Option<String>,
) {
    state.set_down();
    if event_tx
        .send(TransportEvent::Down { reason })
        .await
        .is_err()
    {
        debug!("event channel closed, receiver dropped");
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    fn handshake_json(sid: &str) -> String {
        format!(r#"{{"sid":"{sid}"}}"#)
    }

    // ── Mock transport / dialer ─────────────────────────────────────

    struct MockTransport {
        incoming: VecDeque<Option<std::result::Result<String, ArenaError>>>,
        sent: Arc<StdMutex<Vec<String>>>,
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&mut self, message: String) -> std::result::Result<(), ArenaError> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }

        async fn recv(&mut self) -> Option<std::result::Result<String, ArenaError>> {
            if let Some(item) = self.incoming.pop_front() {
                item
            } else {
                // Script exhausted — hang so the pump stays alive.
                std::future::pending().await
            }
        }

        async fn close(&mut self) -> std::result::Result<(), ArenaError> {
            Ok(())
        }
    }

    /// Scripted dialer: each `dial()` consumes the next script entry.
    /// `Some(messages)` produces a transport that replays them; `None`
    /// makes the dial fail.
    struct MockDialer {
        scripts: StdMutex<VecDeque<Option<Vec<Option<std::result::Result<String, ArenaError>>>>>>,
        sent: Arc<StdMutex<Vec<String>>>,
        dials: Arc<StdMutex<usize>>,
    }

    impl MockDialer {
        #[allow(clippy::type_complexity)]
        fn new(
            scripts: Vec<Option<Vec<Option<std::result::Result<String, ArenaError>>>>>,
        ) -> (Self, Arc<StdMutex<Vec<String>>>, Arc<StdMutex<usize>>) {
            let sent = Arc::new(StdMutex::new(Vec::new()));
            let dials = Arc::new(StdMutex::new(0));
            (
                Self {
                    scripts: StdMutex::new(VecDeque::from(scripts)),
                    sent: Arc::clone(&sent),
                    dials: Arc::clone(&dials),
                },
                sent,
                dials,
            )
        }
    }

    #[async_trait]
    impl Dialer for MockDialer {
        async fn dial(&self) -> std::result::Result<Box<dyn Transport>, ArenaError> {
            *self.dials.lock().unwrap() += 1;
            let script = self.scripts.lock().unwrap().pop_front();
            match script {
                Some(Some(messages)) => Ok(Box::new(MockTransport {
                    incoming: VecDeque::from(messages),
                    sent: Arc::clone(&self.sent),
                })),
                Some(None) => Err(ArenaError::ConnectFailed("scripted dial failure".into())),
                None => Err(ArenaError::ConnectFailed("script exhausted".into())),
            }
        }
    }

    fn fast_config() -> ConnectConfig {
        ConnectConfig::new()
            .with_reconnect_delay(Duration::from_millis(10))
            .with_handshake_timeout(Duration::from_millis(200))
            .with_shutdown_timeout(Duration::from_millis(200))
    }

    // ── Tests ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn connect_emits_up_with_connection_id() {
        let (dialer, _sent, _dials) =
            MockDialer::new(vec![Some(vec![Some(Ok(handshake_json("s1")))])]);
        let (mut conn, mut events) = Connection::new(dialer, fast_config());

        conn.connect().await.unwrap();
        assert!(conn.is_connected());
        assert_eq!(conn.connection_id().as_deref(), Some("s1"));

        let ev = events.recv().await.unwrap();
        assert!(matches!(ev, TransportEvent::Up { connection_id } if connection_id == "s1"));

        conn.disconnect().await;
    }

    #[tokio::test]
    async fn connect_rejects_on_dial_failure() {
        let (dialer, _sent, _dials) = MockDialer::new(vec![None]);
        let (mut conn, _events) = Connection::new(dialer, fast_config());

        let err = conn.connect().await.unwrap_err();
        assert!(matches!(err, ArenaError::ConnectFailed(_)));
        assert!(!conn.is_connected());
    }

    #[tokio::test]
    async fn connect_rejects_on_missing_handshake() {
        // Transport opens but closes before the handshake frame.
        let (dialer, _sent, _dials) = MockDialer::new(vec![Some(vec![None])]);
        let (mut conn, _events) = Connection::new(dialer, fast_config());

        let err = conn.connect().await.unwrap_err();
        assert!(matches!(err, ArenaError::HandshakeFailed(_)));
    }

    #[tokio::test]
    async fn connect_is_idempotent() {
        let (dialer, _sent, dials) =
            MockDialer::new(vec![Some(vec![Some(Ok(handshake_json("s1")))])]);
        let (mut conn, mut events) = Connection::new(dialer, fast_config());

        conn.connect().await.unwrap();
        conn.connect().await.unwrap();
        conn.connect().await.unwrap();

        assert_eq!(*dials.lock().unwrap(), 1);

        // Only one Up event.
        let ev = events.recv().await.unwrap();
        assert!(matches!(ev, TransportEvent::Up { .. }));
        assert!(events.try_recv().is_err());

        conn.disconnect().await;
    }

    #[tokio::test]
    async fn send_before_connect_is_not_connected() {
        let (dialer, sent, _dials) = MockDialer::new(vec![]);
        let (conn, _events) = Connection::new(dialer, fast_config());

        let err = conn
            .send(ClientMessage::StartRound { room: "AB".into() })
            .unwrap_err();
        assert!(matches!(err, ArenaError::NotConnected));
        assert!(sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn messages_are_delivered_in_order() {
        let joined = r#"{"event":"joined","data":{"room":"AB","players":[],"is_host":true}}"#;
        let starting = r#"{"event":"round_starting","data":{}}"#;
        let (dialer, _sent, _dials) = MockDialer::new(vec![Some(vec![
            Some(Ok(handshake_json("s1"))),
            Some(Ok(joined.into())),
            Some(Ok(starting.into())),
        ])]);
        let (mut conn, mut events) = Connection::new(dialer, fast_config());
        conn.connect().await.unwrap();

        let _up = events.recv().await.unwrap();
        let first = events.recv().await.unwrap();
        assert!(matches!(
            first,
            TransportEvent::Message(ServerMessage::Joined { .. })
        ));
        let second = events.recv().await.unwrap();
        assert!(matches!(
            second,
            TransportEvent::Message(ServerMessage::RoundStarting {})
        ));

        conn.disconnect().await;
    }

    #[tokio::test]
    async fn undecodable_message_is_skipped() {
        let starting = r#"{"event":"round_starting","data":{}}"#;
        let (dialer, _sent, _dials) = MockDialer::new(vec![Some(vec![
            Some(Ok(handshake_json("s1"))),
            Some(Ok("{not json".into())),
            Some(Ok(r#"{"event":"mystery","data":{}}"#.into())),
            Some(Ok(starting.into())),
        ])]);
        let (mut conn, mut events) = Connection::new(dialer, fast_config());
        conn.connect().await.unwrap();

        let _up = events.recv().await.unwrap();
        let ev = events.recv().await.unwrap();
        assert!(matches!(
            ev,
            TransportEvent::Message(ServerMessage::RoundStarting {})
        ));

        conn.disconnect().await;
    }

    #[tokio::test]
    async fn drop_then_silent_reconnect_emits_down_and_up() {
        let (dialer, _sent, dials) = MockDialer::new(vec![
            // First life: handshake, then clean close.
            Some(vec![Some(Ok(handshake_json("s1"))), None]),
            // Reconnect life with a fresh sid.
            Some(vec![Some(Ok(handshake_json("s2")))]),
        ]);
        let (mut conn, mut events) = Connection::new(dialer, fast_config());
        conn.connect().await.unwrap();

        let ev = events.recv().await.unwrap();
        assert!(matches!(ev, TransportEvent::Up { connection_id } if connection_id == "s1"));

        let ev = events.recv().await.unwrap();
        assert!(matches!(ev, TransportEvent::Down { .. }));

        let ev = events.recv().await.unwrap();
        assert!(matches!(ev, TransportEvent::Up { connection_id } if connection_id == "s2"));

        assert!(conn.is_connected());
        assert_eq!(conn.connection_id().as_deref(), Some("s2"));
        assert_eq!(*dials.lock().unwrap(), 2);

        conn.disconnect().await;
    }

    #[tokio::test]
    async fn exhausted_reconnection_leaves_session_disconnected() {
        // First life drops immediately after handshake; every redial fails.
        let (dialer, _sent, dials) = MockDialer::new(vec![
            Some(vec![Some(Ok(handshake_json("s1"))), None]),
            None,
            None,
        ]);
        let config = fast_config().with_reconnect_attempts(2);
        let (mut conn, mut events) = Connection::new(dialer, config);
        conn.connect().await.unwrap();

        let _up = events.recv().await.unwrap();
        let ev = events.recv().await.unwrap();
        assert!(matches!(ev, TransportEvent::Down { .. }));

        // Wait for the pump to run both attempts and exit.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!conn.is_connected());
        assert_eq!(*dials.lock().unwrap(), 3);

        let err = conn
            .send(ClientMessage::StartRound { room: "AB".into() })
            .unwrap_err();
        assert!(matches!(err, ArenaError::NotConnected));
    }

    #[tokio::test]
    async fn explicit_connect_works_after_exhaustion() {
        let (dialer, _sent, _dials) = MockDialer::new(vec![
            Some(vec![Some(Ok(handshake_json("s1"))), None]),
            // Single reconnect attempt fails.
            None,
            // Explicit reconnect succeeds.
            Some(vec![Some(Ok(handshake_json("s3")))]),
        ]);
        let config = fast_config().with_reconnect_attempts(1);
        let (mut conn, mut events) = Connection::new(dialer, config);
        conn.connect().await.unwrap();

        let _up = events.recv().await.unwrap();
        let _down = events.recv().await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!conn.is_connected());

        conn.connect().await.unwrap();
        assert!(conn.is_connected());
        assert_eq!(conn.connection_id().as_deref(), Some("s3"));

        conn.disconnect().await;
    }

    #[tokio::test]
    async fn disconnect_emits_final_down() {
        let (dialer, _sent, _dials) =
            MockDialer::new(vec![Some(vec![Some(Ok(handshake_json("s1")))])]);
        let (mut conn, mut events) = Connection::new(dialer, fast_config());
        conn.connect().await.unwrap();

        let _up = events.recv().await.unwrap();
        conn.disconnect().await;

        let ev = events.recv().await.unwrap();
        if let TransportEvent::Down { reason } = ev {
            assert_eq!(reason.as_deref(), Some("client disconnected"));
        } else {
            panic!("expected Down, got {ev:?}");
        }
        assert!(!conn.is_connected());
    }

    #[tokio::test]
    async fn sent_messages_reach_the_wire() {
        let (dialer, sent, _dials) =
            MockDialer::new(vec![Some(vec![Some(Ok(handshake_json("s1")))])]);
        let (mut conn, mut events) = Connection::new(dialer, fast_config());
        conn.connect().await.unwrap();
        let _up = events.recv().await.unwrap();

        conn.send(ClientMessage::StartRound { room: "AB12".into() })
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let messages = sent.lock().unwrap();
        assert_eq!(messages.len(), 1);
        let msg: ClientMessage = serde_json::from_str(&messages[0]).unwrap();
        assert!(matches!(msg, ClientMessage::StartRound { room } if room == "AB12"));
    }

    #[tokio::test]
    async fn double_disconnect_does_not_panic() {
        let (dialer, _sent, _dials) =
            MockDialer::new(vec![Some(vec![Some(Ok(handshake_json("s1")))])]);
        let (mut conn, _events) = Connection::new(dialer, fast_config());
        conn.connect().await.unwrap();

        conn.disconnect().await;
        conn.disconnect().await;
    }
}
