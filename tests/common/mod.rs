#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Shared test utilities for Snake Arena client integration tests.
//!
//! Provides a scripted [`MockDialer`]/[`MockTransport`] pair, JSON fixture
//! helpers for server events, and a recording drawing surface.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use snake_arena_client::protocol::{
    Cell, OwnPlayer, PlayerColor, RosterEntry, ScoreEntry, ServerMessage, Snapshot,
    SnapshotPlayer, Winner,
};
use snake_arena_client::render::{Rgba, Surface};
use snake_arena_client::transport::Dialer;
use snake_arena_client::{ArenaError, Transport};

/// One scripted transport lifetime: the messages `recv()` yields in order.
/// An explicit `None` entry closes the transport cleanly; after the script
/// runs out, `recv()` hangs until the pump is shut down.
pub type TransportScript = Vec<Option<Result<String, ArenaError>>>;

// ── MockTransport ───────────────────────────────────────────────────

/// A channel-less mock transport replaying a script.
pub struct MockTransport {
    incoming: VecDeque<Option<Result<String, ArenaError>>>,
    sent: Arc<StdMutex<Vec<String>>>,
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, message: String) -> Result<(), ArenaError> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, ArenaError>> {
        if let Some(item) = self.incoming.pop_front() {
            item
        } else {
            // Script exhausted — hang so the pump stays alive until shutdown.
            std::future::pending().await
        }
    }

    async fn close(&mut self) -> Result<(), ArenaError> {
        Ok(())
    }
}

// ── MockDialer ──────────────────────────────────────────────────────

/// A scripted dialer. Each `dial()` consumes the next entry:
/// `Some(script)` produces a [`MockTransport`] replaying it, `None` makes
/// the dial fail. All transports share one `sent` log.
pub struct MockDialer {
    scripts: StdMutex<VecDeque<Option<TransportScript>>>,
    sent: Arc<StdMutex<Vec<String>>>,
}

impl MockDialer {
    pub fn new(scripts: Vec<Option<TransportScript>>) -> (Self, Arc<StdMutex<Vec<String>>>) {
        let sent = Arc::new(StdMutex::new(Vec::new()));
        (
            Self {
                scripts: StdMutex::new(VecDeque::from(scripts)),
                sent: Arc::clone(&sent),
            },
            sent,
        )
    }
}

#[async_trait]
impl Dialer for MockDialer {
    async fn dial(&self) -> Result<Box<dyn Transport>, ArenaError> {
        let script = self.scripts.lock().unwrap().pop_front();
        match script {
            Some(Some(messages)) => Ok(Box::new(MockTransport {
                incoming: VecDeque::from(messages),
                sent: Arc::clone(&self.sent),
            })),
            Some(None) => Err(ArenaError::ConnectFailed("scripted dial failure".into())),
            None => Err(ArenaError::ConnectFailed("dial script exhausted".into())),
        }
    }
}

// ── JSON fixture helpers ────────────────────────────────────────────

/// The handshake frame carrying the server-assigned connection id.
pub fn handshake_json(sid: &str) -> String {
    format!(r#"{{"sid":"{sid}"}}"#)
}

/// A `joined` event for `room` with own players `ids` in slot order.
pub fn joined_json(room: &str, ids: &[&str], is_host: bool) -> String {
    let players = ids
        .iter()
        .enumerate()
        .map(|(i, id)| OwnPlayer {
            id: (*id).to_string(),
            nickname: format!("Player {}", i + 1),
            local_index: i as u32,
        })
        .collect();
    serde_json::to_string(&ServerMessage::Joined {
        room: room.to_string(),
        players,
        is_host,
    })
    .expect("joined_json serialization")
}

/// A `join_failed` event.
pub fn join_failed_json(reason: &str) -> String {
    serde_json::to_string(&ServerMessage::JoinFailed {
        reason: reason.to_string(),
    })
    .expect("join_failed_json serialization")
}

/// A `players_update` event. Each entry is `(player_id, nickname, sid)`.
pub fn players_update_json(players: &[(&str, &str, &str)], host_sid: &str) -> String {
    let players = players
        .iter()
        .map(|(id, nickname, sid)| RosterEntry {
            id: (*id).to_string(),
            nickname: (*nickname).to_string(),
            sid: (*sid).to_string(),
        })
        .collect();
    serde_json::to_string(&ServerMessage::PlayersUpdate {
        players,
        host_sid: host_sid.to_string(),
    })
    .expect("players_update_json serialization")
}

pub fn round_starting_json() -> String {
    r#"{"event":"round_starting","data":{}}"#.to_string()
}

pub fn round_started_json() -> String {
    r#"{"event":"round_started","data":{}}"#.to_string()
}

/// A minimal live player for snapshot fixtures.
pub fn snapshot_player(id: &str, cells: &[(i32, i32)]) -> SnapshotPlayer {
    SnapshotPlayer {
        id: id.to_string(),
        nickname: id.to_string(),
        snake: cells.iter().map(|&(x, y)| Cell { x, y }).collect(),
        score: 0,
        alive: true,
        color: PlayerColor {
            head: "#00C853".into(),
            body: "#007E33".into(),
            particle: "hsla(140,100%,40%,1)".into(),
        },
    }
}

/// A `state` event with the given snapshot contents.
pub fn state_json(grid_w: u32, grid_h: u32, players: Vec<SnapshotPlayer>, foods: &[(i32, i32)]) -> String {
    let snapshot = Snapshot {
        players,
        foods: foods.iter().map(|&(x, y)| Cell { x, y }).collect(),
        tick: 0.0,
        grid_w,
        grid_h,
    };
    serde_json::to_string(&ServerMessage::State(Box::new(snapshot)))
        .expect("state_json serialization")
}

/// A `round_end` event. Scores are `(player_id, nickname, score)`; winners
/// are nicknames; `wins` is the optional authoritative tally.
pub fn round_end_json(
    scores: &[(&str, &str, i64)],
    winners: &[&str],
    wins: Option<&[(&str, u32)]>,
) -> String {
    let scores = scores
        .iter()
        .map(|(id, nickname, score)| {
            (
                (*id).to_string(),
                ScoreEntry {
                    score: *score,
                    nickname: (*nickname).to_string(),
                },
            )
        })
        .collect();
    let winners = winners
        .iter()
        .map(|nickname| Winner {
            id: format!("{nickname}-id"),
            nickname: (*nickname).to_string(),
        })
        .collect();
    let wins = wins.map(|entries| {
        entries
            .iter()
            .map(|(name, count)| ((*name).to_string(), *count))
            .collect()
    });
    serde_json::to_string(&ServerMessage::RoundEnd {
        scores,
        winners,
        wins,
    })
    .expect("round_end_json serialization")
}

/// An `ate` event at a cell with a particle color.
pub fn ate_json(player_id: &str, x: i32, y: i32, color: &str) -> String {
    serde_json::to_string(&ServerMessage::Ate {
        player_id: player_id.to_string(),
        pos: Cell { x, y },
        color: color.to_string(),
    })
    .expect("ate_json serialization")
}

pub fn stroke_start_json(player_id: &str, duration: f64) -> String {
    serde_json::to_string(&ServerMessage::StrokeStart {
        player_id: player_id.to_string(),
        duration,
    })
    .expect("stroke_start_json serialization")
}

pub fn stroke_end_json(player_id: &str) -> String {
    serde_json::to_string(&ServerMessage::StrokeEnd {
        player_id: player_id.to_string(),
    })
    .expect("stroke_end_json serialization")
}

pub fn server_error_json(message: &str) -> String {
    serde_json::to_string(&ServerMessage::Error {
        message: message.to_string(),
    })
    .expect("server_error_json serialization")
}

// ── Recording surface ───────────────────────────────────────────────

/// One recorded draw call.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Resize { w: f32, h: f32 },
    Clear,
    Line,
    RoundRect { x: f32, y: f32, color: Rgba },
    Circle { x: f32, y: f32, r: f32, color: Rgba },
}

/// A [`Surface`] that records draw calls into a shared log.
pub struct RecordingSurface {
    ops: Arc<StdMutex<Vec<DrawOp>>>,
}

impl RecordingSurface {
    pub fn new() -> (Self, Arc<StdMutex<Vec<DrawOp>>>) {
        let ops = Arc::new(StdMutex::new(Vec::new()));
        (
            Self {
                ops: Arc::clone(&ops),
            },
            ops,
        )
    }
}

impl Surface for RecordingSurface {
    fn resize(&mut self, width: f32, height: f32) {
        self.ops.lock().unwrap().push(DrawOp::Resize {
            w: width,
            h: height,
        });
    }

    fn clear(&mut self) {
        self.ops.lock().unwrap().push(DrawOp::Clear);
    }

    fn line(&mut self, _x1: f32, _y1: f32, _x2: f32, _y2: f32, _thickness: f32, _color: Rgba) {
        self.ops.lock().unwrap().push(DrawOp::Line);
    }

    fn fill_round_rect(&mut self, x: f32, y: f32, _w: f32, _h: f32, _radius: f32, color: Rgba) {
        self.ops.lock().unwrap().push(DrawOp::RoundRect { x, y, color });
    }

    fn fill_circle(&mut self, x: f32, y: f32, radius: f32, color: Rgba) {
        self.ops.lock().unwrap().push(DrawOp::Circle {
            x,
            y,
            r: radius,
            color,
        });
    }
}

/// A unique temp path for a preference store.
pub fn temp_storage_path(tag: &str) -> std::path::PathBuf {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);
    let n = COUNTER.fetch_add(1, Ordering::SeqCst);
    std::env::temp_dir().join(format!(
        "snake-arena-test-{tag}-{}-{n}.json",
        std::process::id()
    ))
}
