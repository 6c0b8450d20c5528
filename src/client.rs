//! Game client facade.
//!
//! [`ArenaClient`] composes the Room Session, the Snapshot Renderer and the
//! preference store, and is the only component external collaborators
//! (UI, input handling) talk to. It is an explicit context object: the
//! composition root constructs it with a dialer, a drawing surface and a
//! storage location, and passes it wherever it is needed — nothing in this
//! crate reaches for ambient singletons.
//!
//! # Driving the client
//!
//! The host display loop calls [`poll`](ArenaClient::poll) and then
//! [`frame`](ArenaClient::frame) once per refresh. `poll` drains pending
//! session events in arrival order, applies their render/storage side
//! effects, and hands the events back for the UI layer to present:
//!
//! ```rust,ignore
//! loop {
//!     for event in client.poll() {
//!         ui.present(&event);
//!     }
//!     client.frame();
//!     next_frame().await;
//! }
//! ```

use tokio::sync::mpsc;

use crate::config::GameConfig;
use crate::connection::{ConnectConfig, Connection};
use crate::error::Result;
use crate::event::ArenaEvent;
use crate::protocol::Dir;
use crate::render::{Renderer, Surface};
use crate::room::{canonical_room_code, RoomConfig, RoomSession};
use crate::storage::{ControlType, Storage};
use crate::transport::Dialer;

/// Bundled configuration for [`ArenaClient::new`].
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub game: GameConfig,
    pub connect: ConnectConfig,
    pub room: RoomConfig,
}

/// Facade over the networked game client.
pub struct ArenaClient<S: Surface> {
    session: RoomSession,
    events: mpsc::Receiver<ArenaEvent>,
    renderer: Renderer<S>,
    storage: Storage,
    paused: bool,
}

impl<S: Surface> ArenaClient<S> {
    /// Wire up the client from its collaborators. No I/O happens until
    /// [`connect`](Self::connect) or [`join_room`](Self::join_room).
    pub fn new(dialer: impl Dialer, surface: S, storage: Storage, config: ClientConfig) -> Self {
        let (conn, transport_rx) = Connection::new(dialer, config.connect);
        let (session, events) = RoomSession::start(conn, transport_rx, config.room);
        let renderer = Renderer::new(surface, &config.game);
        Self {
            session,
            events,
            renderer,
            storage,
            paused: false,
        }
    }

    // ── Session lifecycle ───────────────────────────────────────────

    /// Connect to the game server. Idempotent.
    ///
    /// # Errors
    ///
    /// Rejects with the first connection error; see
    /// [`Connection::connect`](crate::connection::Connection::connect).
    pub async fn connect(&mut self) -> Result<()> {
        self.session.connect().await
    }

    /// Connect (if needed) and create or join a room.
    ///
    /// Persists the entered nickname and room code first, exactly like the
    /// join screen always has, then waits for membership confirmation.
    ///
    /// # Errors
    ///
    /// Connection errors from the dial, or
    /// [`ArenaError::JoinTimeout`](crate::error::ArenaError::JoinTimeout)
    /// when no `joined` event arrives in the window.
    pub async fn join_room(
        &mut self,
        nickname: &str,
        room_code: Option<String>,
        local_count: u32,
    ) -> Result<String> {
        let code = room_code
            .map(|c| canonical_room_code(&c))
            .filter(|c| !c.is_empty());
        let control = self.storage.control_type();
        self.storage
            .save_player_settings(nickname, code.as_deref().unwrap_or(""), control);

        self.session.connect().await?;
        self.session.create_room(nickname, code, local_count).await
    }

    /// Ask the server to start a round.
    ///
    /// # Errors
    ///
    /// [`ArenaError::NotHost`](crate::error::ArenaError::NotHost) when this
    /// client is not the host — user-visible, nothing sent.
    pub fn start_round(&self) -> Result<()> {
        self.session.start_round()
    }

    /// Leave the room by disconnecting. The client stays reusable.
    pub async fn disconnect(&mut self) {
        self.session.disconnect().await;
        self.renderer.stop();
    }

    // ── Input surface (Controls contract) ───────────────────────────

    /// Forward a direction intent for the local player at `local_index`.
    /// Silently ignored when that slot is unassigned or the session is
    /// down — input loss around disconnects must never crash input
    /// handling.
    pub fn change_direction(&self, local_index: usize, dir: Dir) {
        if let Some(player_id) = self.session.my_player_id(local_index) {
            self.session.send_direction(&player_id, dir);
        }
    }

    /// Whether gameplay input should currently be interpreted.
    pub fn is_running(&self) -> bool {
        self.renderer.is_running() && !self.paused
    }

    /// Number of players controlled by this client.
    pub fn human_count(&self) -> usize {
        self.session.my_players().len()
    }

    /// Control scheme for a local player slot.
    pub fn player_control(&self, _local_index: usize) -> ControlType {
        self.storage.control_type()
    }

    /// Toggle the pause state, stopping or restarting the frame pass.
    /// Returns the new paused state.
    pub fn toggle_pause(&mut self) -> bool {
        self.paused = !self.paused;
        if self.paused {
            self.renderer.stop();
        } else {
            self.renderer.start();
        }
        self.paused
    }

    // ── Event pump ──────────────────────────────────────────────────

    /// Drain pending session events, apply their side effects, and return
    /// them (in arrival order) for the UI layer. Never blocks; call from
    /// the display loop before [`frame`](Self::frame).
    pub fn poll(&mut self) -> Vec<ArenaEvent> {
        let mut drained = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            self.apply(&event);
            drained.push(event);
        }
        drained
    }

    /// Draw one frame. No-op while stopped or paused.
    pub fn frame(&mut self) {
        self.renderer.frame();
    }

    fn apply(&mut self, event: &ArenaEvent) {
        match event {
            ArenaEvent::Joined { room_code, .. } => {
                self.storage.set_last_room(room_code);
            }
            ArenaEvent::PlayersUpdate { players, .. } => {
                self.renderer.update_field_size(players.len());
            }
            ArenaEvent::RoundStarting => {
                self.paused = false;
                self.renderer.start();
            }
            ArenaEvent::State(snapshot) => {
                self.renderer.update_state((**snapshot).clone());
            }
            ArenaEvent::RoundEnd { winners, wins, .. } => {
                self.renderer.stop();
                for winner in winners {
                    self.storage.add_win(&winner.nickname);
                }
                if let Some(server_wins) = wins {
                    self.storage.merge_wins(server_wins);
                }
            }
            ArenaEvent::Ate { pos, color } => {
                self.renderer.create_particles(pos.x, pos.y, color);
            }
            // Connection lifecycle, informational round/stroke events and
            // error surfaces carry no client-side effects; the UI layer
            // presents them.
            ArenaEvent::Connected { .. }
            | ArenaEvent::Disconnected { .. }
            | ArenaEvent::JoinFailed { .. }
            | ArenaEvent::RoundStarted
            | ArenaEvent::StrokeStart { .. }
            | ArenaEvent::StrokeEnd { .. }
            | ArenaEvent::ServerError { .. } => {}
        }
    }

    // ── Accessors ───────────────────────────────────────────────────

    /// The underlying room session.
    pub fn session(&self) -> &RoomSession {
        &self.session
    }

    /// The renderer (e.g. for the host loop to inspect grid geometry).
    pub fn renderer(&self) -> &Renderer<S> {
        &self.renderer
    }

    /// The preference store.
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Whether the transport channel is live.
    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    /// Whether this client holds host privilege.
    pub fn is_host(&self) -> bool {
        self.session.is_host()
    }

    /// The current room code, when in a room.
    pub fn room_code(&self) -> Option<String> {
        self.session.room_code()
    }
}

impl<S: Surface> std::fmt::Debug for ArenaClient<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArenaClient")
            .field("connected", &self.is_connected())
            .field("room_code", &self.room_code())
            .field("running", &self.renderer.is_running())
            .field("paused", &self.paused)
            .finish()
    }
}
