//! Room Session: translates wire events into local room state and exposes
//! the room lifecycle operations.
//!
//! [`RoomSession`] wraps a [`Connection`] and runs a background task that
//! consumes [`TransportEvent`]s, applies the state transitions below, and
//! re-emits the result as [`ArenaEvent`]s — strictly in arrival order.
//!
//! | Wire event | Precondition | Effect |
//! |---|---|---|
//! | `joined` | any | set room code, own players, host flag |
//! | `join_failed` | any | surface reason, no state change |
//! | `players_update` | in a room | replace roster; re-derive host flag |
//! | `round_starting` / `round_started` | any | forwarded |
//! | `state` / `ate` / `round_end` / `stroke_*` / `error` | — | forwarded |
//!
//! Host status is derived, never asserted: every `players_update` recomputes
//! it by comparing the server-declared `host_sid` against the local
//! connection id, so a stale flag cannot survive a membership change.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use rand::seq::SliceRandom;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use crate::connection::{Connection, TransportEvent};
use crate::error::{ArenaError, Result};
use crate::event::ArenaEvent;
use crate::protocol::{
    ClientMessage, ConnectionId, DeviceClass, Dir, OwnPlayer, PlayerId, RosterEntry, ServerMessage,
};

/// Default window in which a `joined` event must arrive after `create_room`.
const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Default capacity of the bounded domain event channel.
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Characters used for generated room codes (base-36, uppercase).
const ROOM_CODE_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Length of generated room codes.
const ROOM_CODE_LEN: usize = 6;

// ── Configuration ───────────────────────────────────────────────────

/// Tunables for a [`RoomSession`].
#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// Device class reported to the server in `create_room`. Mobile
    /// clients are capped at one local player server-side.
    pub device_type: DeviceClass,
    /// Correlation window for `create_room`.
    pub join_timeout: Duration,
    /// Capacity of the bounded domain event channel. Values below 1 are
    /// clamped to 1.
    pub event_channel_capacity: usize,
}

impl RoomConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self {
            device_type: DeviceClass::Desktop,
            join_timeout: DEFAULT_JOIN_TIMEOUT,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }

    /// Set the reported device class.
    #[must_use]
    pub fn with_device_type(mut self, device_type: DeviceClass) -> Self {
        self.device_type = device_type;
        self
    }

    /// Set the `create_room` correlation window.
    #[must_use]
    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = timeout;
        self
    }

    /// Set the capacity of the bounded event channel (clamped to ≥ 1).
    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self::new()
    }
}

// ── Shared state ────────────────────────────────────────────────────

/// Room state shared between the handle and the session task. Mutexes are
/// `std` mutexes and are never held across an await point.
struct RoomShared {
    connection_id: StdMutex<Option<ConnectionId>>,
    room_code: StdMutex<Option<String>>,
    is_host: AtomicBool,
    members: StdMutex<Vec<RosterEntry>>,
    my_players: StdMutex<Vec<OwnPlayer>>,
}

impl RoomShared {
    fn new() -> Self {
        Self {
            connection_id: StdMutex::new(None),
            room_code: StdMutex::new(None),
            is_host: AtomicBool::new(false),
            members: StdMutex::new(Vec::new()),
            my_players: StdMutex::new(Vec::new()),
        }
    }

    fn clear_room(&self) {
        if let Ok(mut guard) = self.room_code.lock() {
            *guard = None;
        }
        if let Ok(mut guard) = self.members.lock() {
            guard.clear();
        }
        if let Ok(mut guard) = self.my_players.lock() {
            guard.clear();
        }
        self.is_host.store(false, Ordering::Release);
    }
}

// ── Join correlation ────────────────────────────────────────────────

/// Correlation-by-timeout for `create_room`.
///
/// The protocol has no request ids: `create_room` is considered successful
/// once *any* `joined` event has populated the room state within the
/// window. This is a best-effort match kept for wire compatibility — a
/// stray `joined` for an unrelated cause (including one left over from an
/// earlier join) can spuriously resolve the wait. The seam exists so the
/// scheme can be swapped for real request/response correlation without
/// touching callers.
struct JoinWaiter {
    rx: watch::Receiver<Option<String>>,
}

impl JoinWaiter {
    async fn wait(&mut self, window: Duration) -> Result<String> {
        let outcome = tokio::time::timeout(window, self.rx.wait_for(|code| code.is_some())).await;
        match outcome {
            Ok(Ok(code)) => Ok(code.clone().unwrap_or_default()),
            _ => Err(ArenaError::JoinTimeout),
        }
    }
}

// ── Room session ────────────────────────────────────────────────────

/// State machine for create/join/host-transfer/leave of a game room.
///
/// Created via [`RoomSession::start`], which takes ownership of the
/// [`Connection`] and its event receiver and returns the session handle
/// plus the domain event receiver consumed by the facade/UI.
pub struct RoomSession {
    conn: Connection,
    config: RoomConfig,
    shared: Arc<RoomShared>,
    join_waiter: JoinWaiter,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl RoomSession {
    /// Start the session task and return the handle plus event receiver.
    #[must_use = "the event receiver must be consumed to observe the session"]
    pub fn start(
        conn: Connection,
        transport_rx: mpsc::Receiver<TransportEvent>,
        config: RoomConfig,
    ) -> (Self, mpsc::Receiver<ArenaEvent>) {
        let capacity = config.event_channel_capacity.max(1);
        let (event_tx, event_rx) = mpsc::channel(capacity);
        let (join_tx, join_rx) = watch::channel(None);

        let shared = Arc::new(RoomShared::new());
        let task = tokio::spawn(session_task(
            transport_rx,
            event_tx,
            Arc::clone(&shared),
            join_tx,
        ));

        let session = Self {
            conn,
            config,
            shared,
            join_waiter: JoinWaiter { rx: join_rx },
            task: Some(task),
        };
        (session, event_rx)
    }

    // ── Lifecycle operations ────────────────────────────────────────

    /// Establish the underlying connection. Idempotent; see
    /// [`Connection::connect`].
    ///
    /// # Errors
    ///
    /// Rejects with the first connection error.
    pub async fn connect(&mut self) -> Result<()> {
        self.conn.connect().await
    }

    /// Create (or join) a room and wait for membership confirmation.
    ///
    /// Sends `create_room` with the explicit `room_code` when given
    /// (canonicalized to uppercase) or a freshly generated 6-character
    /// base-36 code, plus nickname, device class and the requested
    /// local-player count.
    ///
    /// # Errors
    ///
    /// - [`ArenaError::NotConnected`] when no channel is live.
    /// - [`ArenaError::JoinTimeout`] when no `joined` event populates the
    ///   room within the configured window (1 s by default). A `join_failed`
    ///   in that window is surfaced as an [`ArenaEvent::JoinFailed`] on the
    ///   event stream, not here.
    pub async fn create_room(
        &mut self,
        nickname: &str,
        room_code: Option<String>,
        local_count: u32,
    ) -> Result<String> {
        if !self.conn.is_connected() {
            return Err(ArenaError::NotConnected);
        }

        let room = room_code
            .map(|code| canonical_room_code(&code))
            .filter(|code| !code.is_empty())
            .unwrap_or_else(generate_room_code);

        self.conn.send(ClientMessage::CreateRoom {
            room,
            nickname: nickname.to_string(),
            device_type: self.config.device_type,
            local_count,
        })?;

        self.join_waiter.wait(self.config.join_timeout).await
    }

    /// Ask the server to start a round.
    ///
    /// # Errors
    ///
    /// - [`ArenaError::NotHost`] when this client is not the room host;
    ///   nothing is sent and no state changes.
    /// - [`ArenaError::NotInRoom`] when no room is joined.
    /// - [`ArenaError::NotConnected`] when the channel is down.
    ///
    /// On success nothing changes locally either — the authoritative
    /// `round_starting` event drives the transition.
    pub fn start_round(&self) -> Result<()> {
        if !self.is_host() {
            return Err(ArenaError::NotHost);
        }
        let room = self.room_code().ok_or(ArenaError::NotInRoom)?;
        self.conn.send(ClientMessage::StartRound { room })
    }

    /// Forward a direction intent for one of this client's players.
    ///
    /// Silently dropped when not connected or not in a room: directional
    /// input loss is expected around disconnects and must never crash the
    /// input path.
    pub fn send_direction(&self, player_id: &str, dir: Dir) {
        if !self.conn.is_connected() {
            return;
        }
        let Some(room) = self.room_code() else {
            return;
        };
        // A send error here means the connection raced down; same policy.
        if let Err(e) = self.conn.send(ClientMessage::InputDir {
            room,
            player_id: player_id.to_string(),
            dir,
        }) {
            debug!("direction input dropped: {e}");
        }
    }

    /// Disconnect and clear room state. The session remains reusable.
    pub async fn disconnect(&mut self) {
        self.conn.disconnect().await;
        self.shared.clear_room();
    }

    // ── State accessors ─────────────────────────────────────────────

    /// Returns `true` while the transport channel is live.
    pub fn is_connected(&self) -> bool {
        self.conn.is_connected()
    }

    /// The server-assigned connection id, when connected.
    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.conn.connection_id()
    }

    /// The current room code, when in a room.
    pub fn room_code(&self) -> Option<String> {
        self.shared.room_code.lock().ok().and_then(|g| g.clone())
    }

    /// Whether this client currently holds host privilege. Derived from the
    /// latest membership update, never asserted locally.
    pub fn is_host(&self) -> bool {
        self.shared.is_host.load(Ordering::Acquire)
    }

    /// Room members in server-declared join order.
    pub fn members(&self) -> Vec<RosterEntry> {
        self.shared
            .members
            .lock()
            .map(|g| g.clone())
            .unwrap_or_default()
    }

    /// The players controlled by this client.
    pub fn my_players(&self) -> Vec<OwnPlayer> {
        self.shared
            .my_players
            .lock()
            .map(|g| g.clone())
            .unwrap_or_default()
    }

    /// Player id for a local player slot, when one exists.
    pub fn my_player_id(&self, local_index: usize) -> Option<PlayerId> {
        self.shared
            .my_players
            .lock()
            .ok()
            .and_then(|g| g.get(local_index).map(|p| p.id.clone()))
    }
}

impl std::fmt::Debug for RoomSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomSession")
            .field("connected", &self.is_connected())
            .field("room_code", &self.room_code())
            .field("is_host", &self.is_host())
            .finish()
    }
}

impl Drop for RoomSession {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ── Session task ────────────────────────────────────────────────────

/// Applies wire events to the shared room state and re-emits them as
/// domain events, preserving arrival order.
async fn session_task(
    mut transport_rx: mpsc::Receiver<TransportEvent>,
    event_tx: mpsc::Sender<ArenaEvent>,
    shared: Arc<RoomShared>,
    join_tx: watch::Sender<Option<String>>,
) {
    while let Some(transport_event) = transport_rx.recv().await {
        match transport_event {
            TransportEvent::Up { connection_id } => {
                if let Ok(mut guard) = shared.connection_id.lock() {
                    *guard = Some(connection_id.clone());
                }
                emit(&event_tx, ArenaEvent::Connected { connection_id }).await;
            }
            TransportEvent::Down { reason } => {
                shared.clear_room();
                let _ = join_tx.send(None);
                // Session boundary: always delivered, blocking if needed.
                if event_tx
                    .send(ArenaEvent::Disconnected { reason })
                    .await
                    .is_err()
                {
                    debug!("domain event channel closed, receiver dropped");
                }
            }
            TransportEvent::Message(msg) => {
                if let Some(event) = apply(&shared, &join_tx, msg) {
                    emit(&event_tx, event).await;
                }
            }
        }
    }
    debug!("session task exited");
}

/// Apply one server message to the room state and produce the domain event
/// to emit, if any.
fn apply(
    shared: &RoomShared,
    join_tx: &watch::Sender<Option<String>>,
    msg: ServerMessage,
) -> Option<ArenaEvent> {
    match msg {
        ServerMessage::Joined {
            room,
            players,
            is_host,
        } => {
            if let Ok(mut guard) = shared.room_code.lock() {
                *guard = Some(room.clone());
            }
            if let Ok(mut guard) = shared.my_players.lock() {
                *guard = players.clone();
            }
            shared.is_host.store(is_host, Ordering::Release);
            let _ = join_tx.send(Some(room.clone()));
            debug!(room = %room, is_host, "joined room");
            Some(ArenaEvent::Joined {
                room_code: room,
                own_players: players,
                is_host,
            })
        }
        ServerMessage::JoinFailed { reason } => Some(ArenaEvent::JoinFailed { reason }),
        ServerMessage::PlayersUpdate { players, host_sid } => {
            let in_room = shared
                .room_code
                .lock()
                .map(|g| g.is_some())
                .unwrap_or(false);
            if !in_room {
                debug!("players_update outside a room, ignoring");
                return None;
            }
            if let Ok(mut guard) = shared.members.lock() {
                *guard = players.clone();
            }
            // Host status is re-derived on every roster change.
            let local_id = shared
                .connection_id
                .lock()
                .ok()
                .and_then(|g| g.clone())
                .unwrap_or_default();
            let is_host = !local_id.is_empty() && local_id == host_sid;
            shared.is_host.store(is_host, Ordering::Release);
            Some(ArenaEvent::PlayersUpdate { players, is_host })
        }
        ServerMessage::RoundStarting {} => Some(ArenaEvent::RoundStarting),
        ServerMessage::RoundStarted {} => Some(ArenaEvent::RoundStarted),
        ServerMessage::State(snapshot) => Some(ArenaEvent::State(snapshot)),
        ServerMessage::RoundEnd {
            scores,
            winners,
            wins,
        } => Some(ArenaEvent::RoundEnd {
            scores,
            winners,
            wins,
        }),
        ServerMessage::Ate { pos, color, .. } => Some(ArenaEvent::Ate { pos, color }),
        ServerMessage::StrokeStart {
            player_id,
            duration,
        } => Some(ArenaEvent::StrokeStart {
            player_id,
            duration,
        }),
        ServerMessage::StrokeEnd { player_id } => Some(ArenaEvent::StrokeEnd { player_id }),
        ServerMessage::Error { message } => Some(ArenaEvent::ServerError { message }),
    }
}

/// Emit a domain event without blocking the session task.
async fn emit(event_tx: &mpsc::Sender<ArenaEvent>, event: ArenaEvent) {
    match event_tx.try_send(event) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(dropped)) => {
            warn!(
                "domain event channel full, dropping event: {:?}",
                std::mem::discriminant(&dropped)
            );
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!("domain event channel closed, receiver dropped");
        }
    }
}

// ── Room codes ──────────────────────────────────────────────────────

/// Canonical form of a user-supplied room code: trimmed, uppercase.
pub fn canonical_room_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// Generate a fresh 6-character base-36 room code.
fn generate_room_code() -> String {
    let mut rng = rand::thread_rng();
    (0..ROOM_CODE_LEN)
        .map(|_| {
            ROOM_CODE_ALPHABET
                .choose(&mut rng)
                .copied()
                .unwrap_or(b'0') as char
        })
        .collect()
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

    #[test]
    fn generated_codes_are_six_base36_chars() {
        for _ in 0..100 {
            let code = generate_room_code();
            assert_eq!(code.len(), ROOM_CODE_LEN);
            assert!(code
                .bytes()
                .all(|b| b.is_ascii_digit() || b.is_ascii_uppercase()));
        }
    }

    #[test]
    fn canonical_room_code_uppercases_and_trims() {
        assert_eq!(canonical_room_code("  ab12cd "), "AB12CD");
        assert_eq!(canonical_room_code("XYZ"), "XYZ");
        assert_eq!(canonical_room_code(""), "");
    }

    #[test]
    fn apply_players_update_outside_room_is_ignored() {
        let shared = RoomShared::new();
        let (join_tx, _join_rx) = watch::channel(None);
        let event = apply(
            &shared,
            &join_tx,
            ServerMessage::PlayersUpdate {
                players: vec![],
                host_sid: "s1".into(),
            },
        );
        assert!(event.is_none());
        assert!(!shared.is_host.load(Ordering::Acquire));
    }

    #[test]
    fn apply_recomputes_host_flag_from_host_sid() {
        let shared = RoomShared::new();
        *shared.connection_id.lock().unwrap() = Some("me".into());
        let (join_tx, _join_rx) = watch::channel(None);

        // Enter a room first.
        let _ = apply(
            &shared,
            &join_tx,
            ServerMessage::Joined {
                room: "AB12CD".into(),
                players: vec![],
                is_host: false,
            },
        );

        let roster = vec![RosterEntry {
            id: "me-0".into(),
            nickname: "Me".into(),
            sid: "me".into(),
        }];

        let ev = apply(
            &shared,
            &join_tx,
            ServerMessage::PlayersUpdate {
                players: roster.clone(),
                host_sid: "me".into(),
            },
        );
        assert!(matches!(ev, Some(ArenaEvent::PlayersUpdate { is_host: true, .. })));
        assert!(shared.is_host.load(Ordering::Acquire));

        // Host migrates away: the flag flips in the same update.
        let ev = apply(
            &shared,
            &join_tx,
            ServerMessage::PlayersUpdate {
                players: roster,
                host_sid: "other".into(),
            },
        );
        assert!(matches!(ev, Some(ArenaEvent::PlayersUpdate { is_host: false, .. })));
        assert!(!shared.is_host.load(Ordering::Acquire));
    }

    #[test]
    fn apply_joined_populates_room_state() {
        let shared = RoomShared::new();
        let (join_tx, join_rx) = watch::channel(None);

        let ev = apply(
            &shared,
            &join_tx,
            ServerMessage::Joined {
                room: "QQ77ZZ".into(),
                players: vec![OwnPlayer {
                    id: "s-0".into(),
                    nickname: "Ada".into(),
                    local_index: 0,
                }],
                is_host: true,
            },
        );

        assert!(matches!(ev, Some(ArenaEvent::Joined { .. })));
        assert_eq!(
            shared.room_code.lock().unwrap().as_deref(),
            Some("QQ77ZZ")
        );
        assert!(shared.is_host.load(Ordering::Acquire));
        assert_eq!(join_rx.borrow().as_deref(), Some("QQ77ZZ"));
    }
}
