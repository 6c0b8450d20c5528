//! Wire-compatible protocol types for the Snake Arena protocol.
//!
//! Every type in this module produces identical JSON to the game server's
//! event payloads. Framing is one JSON object per transport text message,
//! `{"event": "<name>", "data": {…}}`; event names serialize as `snake_case`
//! and must match the server exactly.
//!
//! Inbound messages are decoded once, at the transport boundary, into the
//! closed [`ServerMessage`] union and dispatched by exhaustive matching.
//! Unknown event names fail to decode and are skipped by the session layer,
//! never treated as fatal.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// ── Type aliases ────────────────────────────────────────────────────

/// Unique identifier for players. The server derives these from the owning
/// connection id plus a local slot index (`"<sid>-<n>"`), so they are opaque
/// strings rather than UUIDs.
pub type PlayerId = String;

/// Server-assigned connection identifier, delivered in the handshake frame.
pub type ConnectionId = String;

// ── Geometry ────────────────────────────────────────────────────────

/// A single grid cell position.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub struct Cell {
    pub x: i32,
    pub y: i32,
}

/// A cardinal unit direction. No client-side validation beyond the type —
/// the 180°-reversal rule, if any, is enforced server-side.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Dir {
    pub x: i32,
    pub y: i32,
}

impl Dir {
    pub const UP: Dir = Dir { x: 0, y: -1 };
    pub const DOWN: Dir = Dir { x: 0, y: 1 };
    pub const LEFT: Dir = Dir { x: -1, y: 0 };
    pub const RIGHT: Dir = Dir { x: 1, y: 0 };
}

// ── Enums ───────────────────────────────────────────────────────────

/// Device class reported in `create_room`. The server caps mobile clients at
/// a single local player.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    #[default]
    Desktop,
    Mobile,
}

// ── Structs ─────────────────────────────────────────────────────────

/// Head/body fill colors plus the particle color used for eat bursts.
/// All three are CSS color strings exactly as the server sends them
/// (`#RRGGBB` for head/body, `hsla(…)` for particle).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PlayerColor {
    pub head: String,
    pub body: String,
    #[serde(default)]
    pub particle: String,
}

/// One of the players controlled by this client, as echoed back in `joined`.
/// Index-addressable for split-keyboard local multiplayer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OwnPlayer {
    pub id: PlayerId,
    pub nickname: String,
    /// Zero-based local slot. The server serializes this key in camelCase.
    #[serde(rename = "localIndex", default)]
    pub local_index: u32,
}

/// A room member as reported by `players_update`. Order is join order as
/// declared by the server and is never reordered locally.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RosterEntry {
    pub id: PlayerId,
    pub nickname: String,
    /// Connection id owning this player; several entries share one `sid`
    /// when a client runs local multiplayer.
    pub sid: ConnectionId,
}

/// Per-player render state inside a [`Snapshot`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SnapshotPlayer {
    #[serde(default)]
    pub id: PlayerId,
    pub nickname: String,
    /// Body cells, head first. Empty for players that have not spawned.
    pub snake: Vec<Cell>,
    pub score: i64,
    pub alive: bool,
    pub color: PlayerColor,
}

/// An immutable, server-pushed point-in-time view of the world. Always
/// replaces the renderer's previous snapshot wholesale, never merged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Snapshot {
    pub players: Vec<SnapshotPlayer>,
    pub foods: Vec<Cell>,
    /// Server wall-clock seconds at emission. Informational only.
    #[serde(default)]
    pub tick: f64,
    pub grid_w: u32,
    pub grid_h: u32,
}

/// Final score line for one player in `round_end`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScoreEntry {
    pub score: i64,
    pub nickname: String,
}

/// A round winner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Winner {
    pub id: PlayerId,
    pub nickname: String,
}

/// First frame on a fresh channel: the server-assigned connection id.
/// Consumed by the Transport Session before event dispatch begins.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Handshake {
    pub sid: ConnectionId,
}

// ── Messages ────────────────────────────────────────────────────────

/// Message types sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Create a room or join an existing one; the server treats both the
    /// same way and answers with `joined` or `join_failed`.
    CreateRoom {
        room: String,
        nickname: String,
        device_type: DeviceClass,
        local_count: u32,
    },
    /// Ask the server to start a round. Host only; non-hosts receive a
    /// server `error` back.
    StartRound { room: String },
    /// Forward a direction intent for one of this client's players.
    InputDir {
        room: String,
        player_id: PlayerId,
        dir: Dir,
    },
}

/// Message types sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Room membership granted; carries the players this client controls.
    Joined {
        room: String,
        players: Vec<OwnPlayer>,
        is_host: bool,
    },
    /// Room membership refused.
    JoinFailed { reason: String },
    /// Full membership roster. Host status must be re-derived from
    /// `host_sid` on every one of these.
    PlayersUpdate {
        players: Vec<RosterEntry>,
        host_sid: ConnectionId,
    },
    /// The round is about to begin; clients switch to the game surface.
    RoundStarting {},
    /// The simulation loop is running.
    RoundStarted {},
    /// Authoritative world snapshot (boxed to reduce enum size).
    State(Box<Snapshot>),
    /// Round over. `wins` is the server's authoritative win tally and may
    /// be absent on older servers.
    RoundEnd {
        scores: HashMap<PlayerId, ScoreEntry>,
        winners: Vec<Winner>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        wins: Option<HashMap<String, u32>>,
    },
    /// One of this client's players ate food; drives the particle burst.
    Ate {
        #[serde(default)]
        player_id: PlayerId,
        pos: Cell,
        /// Particle color string of the eating player.
        color: String,
    },
    /// A timed control-scrambling status effect started for a player.
    StrokeStart {
        player_id: PlayerId,
        /// Effect duration in seconds.
        duration: f64,
    },
    /// The status effect ended.
    StrokeEnd { player_id: PlayerId },
    /// Generic server-side rejection (unknown room, non-host start, …).
    Error { message: String },
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
    fn create_room_wire_shape_is_exact() {
        let msg = ClientMessage::CreateRoom {
            room: "K4P9ZQ".into(),
            nickname: "Alice".into(),
            device_type: DeviceClass::Desktop,
            local_count: 2,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "event": "create_room",
                "data": {
                    "room": "K4P9ZQ",
                    "nickname": "Alice",
                    "device_type": "desktop",
                    "local_count": 2
                }
            })
        );
    }

    #[test]
    fn input_dir_wire_shape_is_exact() {
        let msg = ClientMessage::InputDir {
            room: "K4P9ZQ".into(),
            player_id: "sid42-0".into(),
            dir: Dir::LEFT,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "event": "input_dir",
                "data": {
                    "room": "K4P9ZQ",
                    "player_id": "sid42-0",
                    "dir": { "x": -1, "y": 0 }
                }
            })
        );
    }

    #[test]
    fn joined_parses_camel_case_local_index() {
        let raw = r#"{
            "event": "joined",
            "data": {
                "room": "AB12CD",
                "players": [
                    {"id": "s1-0", "nickname": "Bob", "localIndex": 0},
                    {"id": "s1-1", "nickname": "Bob (2)", "localIndex": 1}
                ],
                "is_host": true
            }
        }"#;
        let msg: ServerMessage = serde_json::from_str(raw).unwrap();
        if let ServerMessage::Joined {
            room,
            players,
            is_host,
        } = msg
        {
            assert_eq!(room, "AB12CD");
            assert!(is_host);
            assert_eq!(players.len(), 2);
            assert_eq!(players[1].local_index, 1);
            assert_eq!(players[1].nickname, "Bob (2)");
        } else {
            panic!("expected Joined");
        }
    }

    #[test]
    fn round_starting_accepts_empty_object_payload() {
        // The server sends an explicit empty payload for these events.
        let msg: ServerMessage =
            serde_json::from_str(r#"{"event":"round_starting","data":{}}"#).unwrap();
        assert!(matches!(msg, ServerMessage::RoundStarting {}));

        let msg: ServerMessage =
            serde_json::from_str(r#"{"event":"round_started","data":{}}"#).unwrap();
        assert!(matches!(msg, ServerMessage::RoundStarted {}));
    }

    #[test]
    fn state_parses_full_snapshot() {
        let raw = r##"{
            "event": "state",
            "data": {
                "players": [{
                    "id": "s1-0",
                    "nickname": "Bob",
                    "snake": [{"x": 5, "y": 5}, {"x": 4, "y": 5}],
                    "score": 20,
                    "alive": true,
                    "color": {
                        "head": "#7C4DFF",
                        "body": "#5A31C9",
                        "particle": "hsla(270,100%,60%,1)"
                    }
                }],
                "foods": [{"x": 10, "y": 3}],
                "tick": 1723480000.5,
                "grid_w": 60,
                "grid_h": 30
            }
        }"##;
        let msg: ServerMessage = serde_json::from_str(raw).unwrap();
        if let ServerMessage::State(snapshot) = msg {
            assert_eq!(snapshot.grid_w, 60);
            assert_eq!(snapshot.grid_h, 30);
            assert_eq!(snapshot.players[0].snake[0], Cell { x: 5, y: 5 });
            assert_eq!(snapshot.players[0].color.head, "#7C4DFF");
            assert_eq!(snapshot.foods, vec![Cell { x: 10, y: 3 }]);
        } else {
            panic!("expected State");
        }
    }

    #[test]
    fn state_tolerates_missing_optional_fields() {
        // Older servers omit `tick` and per-player `id`.
        let raw = r##"{
            "event": "state",
            "data": {
                "players": [{
                    "nickname": "Bob",
                    "snake": [],
                    "score": 0,
                    "alive": false,
                    "color": {"head": "#fff", "body": "#ccc"}
                }],
                "foods": [],
                "grid_w": 120,
                "grid_h": 60
            }
        }"##;
        let msg: ServerMessage = serde_json::from_str(raw).unwrap();
        if let ServerMessage::State(snapshot) = msg {
            assert_eq!(snapshot.tick, 0.0);
            assert_eq!(snapshot.players[0].id, "");
            assert_eq!(snapshot.players[0].color.particle, "");
        } else {
            panic!("expected State");
        }
    }

    #[test]
    fn round_end_parses_scores_winners_and_wins() {
        let raw = r#"{
            "event": "round_end",
            "data": {
                "scores": {
                    "s1-0": {"score": 40, "nickname": "Bob"},
                    "s2-0": {"score": 10, "nickname": "Eve"}
                },
                "winners": [{"id": "s1-0", "nickname": "Bob"}],
                "wins": {"Bob": 3, "Eve": 1}
            }
        }"#;
        let msg: ServerMessage = serde_json::from_str(raw).unwrap();
        if let ServerMessage::RoundEnd {
            scores,
            winners,
            wins,
        } = msg
        {
            assert_eq!(scores["s1-0"].score, 40);
            assert_eq!(winners[0].nickname, "Bob");
            assert_eq!(wins.unwrap()["Bob"], 3);
        } else {
            panic!("expected RoundEnd");
        }
    }

    #[test]
    fn round_end_wins_is_optional() {
        let raw = r#"{
            "event": "round_end",
            "data": {"scores": {}, "winners": []}
        }"#;
        let msg: ServerMessage = serde_json::from_str(raw).unwrap();
        if let ServerMessage::RoundEnd { wins, .. } = msg {
            assert!(wins.is_none());
        } else {
            panic!("expected RoundEnd");
        }
    }

    #[test]
    fn ate_parses_particle_color_string() {
        let raw = r#"{
            "event": "ate",
            "data": {
                "player_id": "s1-0",
                "pos": {"x": 7, "y": 2},
                "color": "hsla(140,100%,40%,1)"
            }
        }"#;
        let msg: ServerMessage = serde_json::from_str(raw).unwrap();
        if let ServerMessage::Ate { pos, color, .. } = msg {
            assert_eq!(pos, Cell { x: 7, y: 2 });
            assert_eq!(color, "hsla(140,100%,40%,1)");
        } else {
            panic!("expected Ate");
        }
    }

    #[test]
    fn unknown_event_fails_to_decode() {
        let raw = r#"{"event":"telemetry","data":{"x":1}}"#;
        assert!(serde_json::from_str::<ServerMessage>(raw).is_err());
    }

    #[test]
    fn handshake_frame_parses() {
        let hs: Handshake = serde_json::from_str(r#"{"sid":"conn-77"}"#).unwrap();
        assert_eq!(hs.sid, "conn-77");
    }

    #[test]
    fn players_update_round_trip() {
        let msg = ServerMessage::PlayersUpdate {
            players: vec![RosterEntry {
                id: "s1-0".into(),
                nickname: "Bob".into(),
                sid: "s1".into(),
            }],
            host_sid: "s1".into(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        let back: ServerMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn dir_constants_are_unit_cardinals() {
        for d in [Dir::UP, Dir::DOWN, Dir::LEFT, Dir::RIGHT] {
            assert_eq!(d.x.abs() + d.y.abs(), 1);
        }
    }
}
