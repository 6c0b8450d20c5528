//! # Snake Arena Client
//!
//! Transport-agnostic Rust client for the Snake Arena multiplayer protocol.
//!
//! The crate covers the client side of a server-authoritative grid arena:
//! a **network session** (connect, room membership, host tracking, typed
//! inbound events, automatic reconnection) and a **snapshot renderer**
//! (fixed-cadence redraw of the latest authoritative world state plus a
//! decorative particle overlay). The client never simulates gameplay — it
//! renders snapshots and forwards input intents.
//!
//! ## Features
//!
//! - **Transport-agnostic** — implement the [`Transport`] and
//!   [`Dialer`](transport::Dialer) traits for any backend
//! - **Wire-compatible** — all protocol types match the server's event
//!   payloads exactly
//! - **WebSocket built-in** — default `transport-websocket` feature provides
//!   `WebSocketTransport`/`WebSocketDialer`
//! - **Backend-agnostic rendering** — draw through the
//!   [`Surface`](render::Surface) trait; `render-macroquad` supplies a real
//!   backend
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! let dialer = WebSocketDialer::new("wss://arena.example.net/ws");
//! let storage = Storage::open("arena-prefs.json");
//! let mut client = ArenaClient::new(
//!     dialer,
//!     MacroquadSurface::new(),
//!     storage,
//!     ClientConfig::default(),
//! );
//!
//! client.join_room("Ada", None, 1).await?;
//! loop {
//!     for event in client.poll() { /* update UI */ }
//!     client.frame();
//!     next_frame().await;
//! }
//! ```

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod event;
pub mod protocol;
pub mod render;
pub mod room;
pub mod storage;
pub mod transport;
pub mod transports;

// Re-export primary types for ergonomic imports.
pub use client::{ArenaClient, ClientConfig};
pub use config::GameConfig;
pub use connection::{ConnectConfig, Connection, TransportEvent};
pub use error::ArenaError;
pub use event::ArenaEvent;
pub use protocol::{ClientMessage, Dir, ServerMessage, Snapshot};
pub use render::{Renderer, Surface};
pub use room::{RoomConfig, RoomSession};
pub use storage::Storage;
pub use transport::Transport;

#[cfg(feature = "transport-websocket")]
pub use transports::{WebSocketDialer, WebSocketTransport};
