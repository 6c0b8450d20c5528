//! Transport abstraction for the Snake Arena protocol.
//!
//! The [`Transport`] trait defines a bidirectional text message channel
//! between the client and server. The protocol uses JSON text messages, so
//! every transport implementation must handle message framing internally
//! (e.g., WebSocket frames, length-prefixed TCP, long-polling batches).
//!
//! The [`Dialer`] trait is the connection factory: the Transport Session
//! dials through it both on the initial `connect` and on every internal
//! reconnection attempt. [`FallbackDialer`] chains dialers in preference
//! order, which is how transport fallback negotiation (try WebSocket first,
//! then whatever else is configured) is expressed.

use async_trait::async_trait;

use crate::error::ArenaError;

/// A bidirectional text message transport for the Snake Arena protocol.
///
/// Implementors shuttle serialized JSON strings between the client and
/// server. Each call to [`send`](Transport::send) transmits one complete
/// JSON message; each call to [`recv`](Transport::recv) returns one.
///
/// # Object Safety
///
/// This trait is object-safe; the session layer works with
/// `Box<dyn Transport>` so dialers can pick the concrete backend at runtime.
///
/// # Cancel Safety
///
/// [`recv`](Transport::recv) **MUST** be cancel-safe because it is used
/// inside `tokio::select!`. If `recv` is cancelled before completion,
/// calling it again must not lose data.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Send a JSON text message to the server.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::TransportSend`] if the message could not be
    /// sent (e.g., connection broken, write buffer full).
    async fn send(&mut self, message: String) -> Result<(), ArenaError>;

    /// Receive the next JSON text message from the server.
    ///
    /// Returns:
    /// - `Some(Ok(text))` — a complete message was received
    /// - `Some(Err(e))` — a transport error occurred
    /// - `None` — the connection was closed cleanly by the server
    ///
    /// # Cancel Safety
    ///
    /// This method **MUST** be cancel-safe (see [trait documentation](Transport)).
    async fn recv(&mut self) -> Option<Result<String, ArenaError>>;

    /// Close the transport connection gracefully.
    ///
    /// After calling this method, subsequent calls to [`send`](Transport::send)
    /// and [`recv`](Transport::recv) may return errors or `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the graceful shutdown fails. Implementations
    /// should still release resources even if the close handshake fails.
    async fn close(&mut self) -> Result<(), ArenaError>;
}

/// A factory that establishes fresh [`Transport`] channels on demand.
///
/// Connection parameters (URLs, endpoints, TLS config) belong to the dialer,
/// not the trait — construct a configured dialer and hand it to the session,
/// which calls [`dial`](Dialer::dial) for the initial connection and again
/// for every automatic reconnection attempt.
#[async_trait]
pub trait Dialer: Send + Sync + 'static {
    /// Open a new channel to the server.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::ConnectFailed`] (or [`ArenaError::Io`]) when no
    /// channel could be established.
    async fn dial(&self) -> Result<Box<dyn Transport>, ArenaError>;
}

/// Tries an ordered list of dialers until one succeeds.
///
/// This is the fallback-negotiation point: put the preferred transport
/// first and alternates after it. The error of the last dialer is returned
/// when every attempt fails.
pub struct FallbackDialer {
    dialers: Vec<Box<dyn Dialer>>,
}

impl FallbackDialer {
    /// Create a fallback chain from an ordered list of dialers.
    pub fn new(dialers: Vec<Box<dyn Dialer>>) -> Self {
        Self { dialers }
    }
}

#[async_trait]
impl Dialer for FallbackDialer {
    async fn dial(&self) -> Result<Box<dyn Transport>, ArenaError> {
        let mut last_err = ArenaError::ConnectFailed("no transports configured".into());
        for dialer in &self.dialers {
            match dialer.dial().await {
                Ok(transport) => return Ok(transport),
                Err(e) => {
                    tracing::debug!("transport candidate failed to dial: {e}");
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }
}

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
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct NeverTransport;

    #[async_trait]
    impl Transport for NeverTransport {
        async fn send(&mut self, _message: String) -> Result<(), ArenaError> {
            Ok(())
        }

        async fn recv(&mut self) -> Option<Result<String, ArenaError>> {
            None
        }

        async fn close(&mut self) -> Result<(), ArenaError> {
            Ok(())
        }
    }

    struct ScriptedDialer {
        ok: bool,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Dialer for ScriptedDialer {
        async fn dial(&self) -> Result<Box<dyn Transport>, ArenaError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.ok {
                Ok(Box::new(NeverTransport))
            } else {
                Err(ArenaError::ConnectFailed("scripted failure".into()))
            }
        }
    }

    #[tokio::test]
    async fn fallback_uses_first_working_dialer() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let dialer = FallbackDialer::new(vec![
            Box::new(ScriptedDialer {
                ok: false,
                calls: Arc::clone(&first),
            }),
            Box::new(ScriptedDialer {
                ok: true,
                calls: Arc::clone(&second),
            }),
        ]);

        assert!(dialer.dial().await.is_ok());
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fallback_returns_last_error_when_all_fail() {
        let calls = Arc::new(AtomicUsize::new(0));
        let dialer = FallbackDialer::new(vec![
            Box::new(ScriptedDialer {
                ok: false,
                calls: Arc::clone(&calls),
            }),
            Box::new(ScriptedDialer {
                ok: false,
                calls: Arc::clone(&calls),
            }),
        ]);

        let err = match dialer.dial().await {
            Ok(_) => panic!("expected all dials to fail"),
            Err(e) => e,
        };
        assert!(matches!(err, ArenaError::ConnectFailed(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn empty_fallback_chain_fails() {
        let dialer = FallbackDialer::new(vec![]);
        let err = match dialer.dial().await {
            Ok(_) => panic!("expected empty chain to fail"),
            Err(e) => e,
        };
        assert!(matches!(err, ArenaError::ConnectFailed(_)));
    }
}
