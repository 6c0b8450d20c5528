//! Error types for the Snake Arena client.

use thiserror::Error;

/// Errors that can occur when using the Snake Arena client.
///
/// None of these are fatal to the process: the session remains reusable
/// after any of them, and the facade surfaces them to the UI layer as
/// transient, dismissible messages.
#[derive(Debug, Error)]
pub enum ArenaError {
    /// The initial dial failed. Surfaced to the caller of `connect` via the
    /// rejected future; post-connect transport drops never take this path.
    #[error("connection failed: {0}")]
    ConnectFailed(String),

    /// The server did not complete the session handshake on a fresh channel.
    #[error("session handshake failed: {0}")]
    HandshakeFailed(String),

    /// Failed to send a message through the transport.
    #[error("transport send error: {0}")]
    TransportSend(String),

    /// Failed to receive a message from the transport.
    #[error("transport receive error: {0}")]
    TransportReceive(String),

    /// The transport connection was closed unexpectedly.
    #[error("transport connection closed")]
    TransportClosed,

    /// Failed to serialize or deserialize a protocol message.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Attempted an operation that requires an active connection, but the
    /// client is not connected.
    #[error("not connected to server")]
    NotConnected,

    /// Attempted a room operation but the client is not in a room.
    #[error("not in a room")]
    NotInRoom,

    /// A host-only action was attempted by a non-host member.
    #[error("only the room host can start a round")]
    NotHost,

    /// No `joined` event arrived within the room-create correlation window.
    #[error("room was not created within the join timeout")]
    JoinTimeout,

    /// The server refused room membership.
    #[error("join rejected: {reason}")]
    JoinRejected {
        /// Server-supplied reason text, shown to the user verbatim.
        reason: String,
    },

    /// An operation timed out.
    #[error("operation timed out")]
    Timeout,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized [`Result`] type for Snake Arena client operations.
pub type Result<T> = std::result::Result<T, ArenaError>;
