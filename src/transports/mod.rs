//! Transport implementations for the Snake Arena protocol.
//!
//! This module provides concrete [`Transport`](crate::Transport)
//! implementations behind feature gates. Enable the corresponding Cargo
//! feature to pull in a transport:
//!
//! | Feature                | Transport              |
//! |------------------------|------------------------|
//! | `transport-websocket`  | [`WebSocketTransport`] |
//!
//! The matching [`WebSocketDialer`] plugs into
//! [`FallbackDialer`](crate::transport::FallbackDialer) and the session's
//! reconnection machinery.

#[cfg(feature = "transport-websocket")]
pub mod websocket;

#[cfg(feature = "transport-websocket")]
pub use websocket::{WebSocketDialer, WebSocketTransport};
