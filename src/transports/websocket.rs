//! WebSocket transport backed by `tokio-tungstenite`.
//!
//! [`WebSocketTransport`] carries the protocol's JSON text messages over
//! WebSocket frames; `ws://` and `wss://` both work, with TLS handled by
//! [`MaybeTlsStream`](tokio_tungstenite::MaybeTlsStream). [`WebSocketDialer`]
//! remembers the endpoint so the session can redial it during automatic
//! reconnection.
//!
//! Only compiled with the `transport-websocket` feature (on by default).

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::protocol::Message;

use crate::error::ArenaError;
use crate::transport::{Dialer, Transport};

/// The underlying stream type, exposed for callers that build their own
/// connection (custom TLS, proxies) and wrap it via
/// [`WebSocketTransport::from_stream`].
pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// [`Transport`] over a WebSocket connection.
///
/// `recv` is cancel-safe: dropping its future mid-poll loses no frames, so
/// it can sit inside the session's `tokio::select!`.
#[derive(Debug)]
pub struct WebSocketTransport {
    stream: WsStream,
    closed: bool,
}

impl WebSocketTransport {
    /// Dial `url` and complete the WebSocket upgrade.
    ///
    /// # Errors
    ///
    /// [`ArenaError::ConnectFailed`] on a bad URL or failed connection.
    pub async fn connect(url: &str) -> Result<Self, ArenaError> {
        tracing::debug!(url = %url, "dialing game server");
        let (stream, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| ArenaError::ConnectFailed(e.to_string()))?;
        tracing::info!(url = %url, "WebSocket channel open");
        Ok(Self::from_stream(stream))
    }

    /// Wrap an already-upgraded WebSocket stream.
    pub fn from_stream(stream: WsStream) -> Self {
        Self {
            stream,
            closed: false,
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&mut self, message: String) -> Result<(), ArenaError> {
        if self.closed {
            return Err(ArenaError::TransportClosed);
        }
        self.stream
            .send(Message::Text(message.into()))
            .await
            .map_err(|e| ArenaError::TransportSend(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, ArenaError>> {
        // Non-text frames are handled here so the session layer only ever
        // sees whole JSON messages.
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.to_string())),
                Ok(Message::Close(frame)) => {
                    tracing::debug!(?frame, "server sent close frame");
                    return None;
                }
                // tungstenite answers pings itself; pongs carry nothing.
                Ok(Message::Ping(_) | Message::Pong(_)) => {}
                Ok(Message::Binary(_)) => {
                    tracing::warn!("ignoring unexpected binary frame");
                }
                // Raw frames never come out of the read half.
                Ok(Message::Frame(_)) => {}
                Err(e) => return Some(Err(ArenaError::TransportReceive(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) -> Result<(), ArenaError> {
        if std::mem::replace(&mut self.closed, true) {
            return Ok(());
        }
        self.stream
            .close(None)
            .await
            .map_err(|e| ArenaError::TransportSend(e.to_string()))
    }
}

/// [`Dialer`] opening [`WebSocketTransport`] channels to one URL.
#[derive(Debug, Clone)]
pub struct WebSocketDialer {
    url: String,
}

impl WebSocketDialer {
    /// Create a dialer for a `ws://` or `wss://` URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl Dialer for WebSocketDialer {
    async fn dial(&self) -> Result<Box<dyn Transport>, ArenaError> {
        Ok(Box::new(WebSocketTransport::connect(&self.url).await?))
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
    use tokio::net::TcpListener;

    /// Bind an ephemeral port, serve one WebSocket connection with
    /// `handler`, and return the URL to dial.
    async fn one_shot_server<F, Fut>(handler: F) -> String
    where
        F: FnOnce(tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>) -> Fut
            + Send
            + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            let (tcp, _peer) = listener.accept().await.unwrap();
            handler(tokio_tungstenite::accept_async(tcp).await.unwrap()).await;
        });
        url
    }

    /// Server that sends the given frames in order, then closes.
    async fn scripted_server(frames: Vec<Message>) -> String {
        one_shot_server(move |mut ws| async move {
            for frame in frames {
                ws.send(frame).await.unwrap();
            }
            ws.close(None).await.unwrap();
        })
        .await
    }

    #[tokio::test]
    async fn bad_url_is_connect_failed() {
        for url in ["not a url", "ws://127.0.0.1:1"] {
            let err = WebSocketTransport::connect(url).await.unwrap_err();
            assert!(matches!(err, ArenaError::ConnectFailed(_)), "url: {url}");
        }
    }

    #[tokio::test]
    async fn text_frames_come_out_in_order_then_none() {
        let url = scripted_server(vec![
            Message::Text("alpha".into()),
            Message::Text("beta".into()),
        ])
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        assert_eq!(transport.recv().await.unwrap().unwrap(), "alpha");
        assert_eq!(transport.recv().await.unwrap().unwrap(), "beta");
        assert!(transport.recv().await.is_none());
    }

    #[tokio::test]
    async fn non_text_frames_are_transparent() {
        let url = scripted_server(vec![
            Message::Binary(vec![1, 2, 3].into()),
            Message::Ping(vec![].into()),
            Message::Text("payload".into()),
        ])
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        assert_eq!(transport.recv().await.unwrap().unwrap(), "payload");
    }

    #[tokio::test]
    async fn echo_round_trip_through_dialer() {
        let url = one_shot_server(|mut ws| async move {
            while let Some(Ok(frame)) = ws.next().await {
                if frame.is_text() {
                    ws.send(frame).await.unwrap();
                    break;
                }
            }
        })
        .await;

        let mut transport = WebSocketDialer::new(url).dial().await.unwrap();
        transport
            .send(r#"{"event":"start_round","data":{"room":"AB"}}"#.into())
            .await
            .unwrap();
        let echoed = transport.recv().await.unwrap().unwrap();
        assert!(echoed.contains("start_round"));
    }

    #[tokio::test]
    async fn close_is_idempotent_and_fails_later_sends() {
        let url = one_shot_server(|mut ws| async move {
            while let Some(Ok(_)) = ws.next().await {}
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        transport.close().await.unwrap();
        transport.close().await.unwrap();

        let err = transport.send("late".into()).await.unwrap_err();
        assert!(matches!(err, ArenaError::TransportClosed));
    }

    #[tokio::test]
    async fn dialer_surfaces_connect_failures() {
        let err = match WebSocketDialer::new("ws://127.0.0.1:1").dial().await {
            Ok(_) => panic!("expected dial to fail"),
            Err(e) => e,
        };
        assert!(matches!(err, ArenaError::ConnectFailed(_)));
    }
}
