//! Domain events raised by the Room Session.
//!
//! [`ArenaEvent`] is what the facade and UI layers consume: wire messages
//! after the Room Session has applied its state transitions, plus the
//! synthetic connection-lifecycle events. Events are delivered strictly in
//! the order they arrived from the transport.

use std::collections::HashMap;

use crate::protocol::{
    Cell, ConnectionId, OwnPlayer, PlayerId, RosterEntry, ScoreEntry, Snapshot, Winner,
};

/// Events emitted by [`RoomSession`](crate::room::RoomSession).
#[derive(Debug, Clone)]
pub enum ArenaEvent {
    /// The transport channel came up (initial connect or silent reconnect).
    Connected { connection_id: ConnectionId },
    /// The transport channel dropped; room state has been cleared.
    Disconnected { reason: Option<String> },
    /// Room membership granted. The lobby should be shown.
    Joined {
        room_code: String,
        own_players: Vec<OwnPlayer>,
        is_host: bool,
    },
    /// Room membership refused; no state changed.
    JoinFailed { reason: String },
    /// Membership roster replaced; `is_host` is freshly derived.
    PlayersUpdate {
        players: Vec<RosterEntry>,
        is_host: bool,
    },
    /// Round about to begin: hide the lobby, show the game surface,
    /// start the renderer.
    RoundStarting,
    /// The server simulation loop is running. Informational.
    RoundStarted,
    /// Fresh authoritative snapshot for the renderer; player entries also
    /// carry the score lines the UI displays.
    State(Box<Snapshot>),
    /// Round over: stop the renderer, update the win tally, show results.
    RoundEnd {
        scores: HashMap<PlayerId, ScoreEntry>,
        winners: Vec<Winner>,
        wins: Option<HashMap<String, u32>>,
    },
    /// Particle-burst request at a cell, in the eater's particle color.
    Ate { pos: Cell, color: String },
    /// Timed status-effect warning for a player, in seconds.
    StrokeStart { player_id: PlayerId, duration: f64 },
    /// The status effect ended for a player.
    StrokeEnd { player_id: PlayerId },
    /// Server-side rejection text for the user.
    ServerError { message: String },
}
