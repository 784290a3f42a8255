//! WebSocket backend built on `tokio-tungstenite`.
//!
//! [`WebSocketConnector`] dials a server URL with the auth token appended as
//! a `token` query parameter; [`WebSocketTransport`] maps the protocol's text
//! frames onto WebSocket text messages. `ws://` and `wss://` both work, with
//! TLS handled by [`MaybeTlsStream`](tokio_tungstenite::MaybeTlsStream).
//!
//! Only available with the `transport-websocket` feature (on by default).

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, info, warn};

use crate::error::WordSpyError;
use crate::transport::{BoxTransport, Connector, Transport};

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Dials a fixed server URL, appending the client's auth token as a `token`
/// query parameter on every connection attempt.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    url: String,
}

impl WebSocketConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    fn url_with_token(&self, token: &str) -> String {
        let separator = if self.url.contains('?') { '&' } else { '?' };
        let mut encoded = String::with_capacity(token.len());
        for c in token.chars() {
            match c {
                'A'..='Z' | 'a'..='z' | '0'..='9' | '-' | '_' | '.' | '~' => encoded.push(c),
                _ => {
                    let mut buf = [0u8; 4];
                    for byte in c.encode_utf8(&mut buf).as_bytes() {
                        encoded.push_str(&format!("%{byte:02X}"));
                    }
                }
            }
        }
        format!("{}{}token={}", self.url, separator, encoded)
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, token: &str) -> Result<BoxTransport, WordSpyError> {
        let transport = WebSocketTransport::connect(&self.url_with_token(token)).await?;
        Ok(Box::new(transport))
    }
}

/// [`Transport`] over a live WebSocket stream.
///
/// `recv` is cancel-safe: dropping its future mid-poll loses no frames, so
/// it can sit inside a `tokio::select!` arm.
#[derive(Debug)]
pub struct WebSocketTransport {
    stream: WsStream,
    closed: bool,
}

impl WebSocketTransport {
    /// Open a WebSocket connection to `url`.
    ///
    /// # Errors
    ///
    /// [`WordSpyError::Io`] when the URL is invalid or the connection cannot
    /// be established; an underlying I/O error keeps its
    /// [`ErrorKind`](std::io::ErrorKind).
    pub async fn connect(url: &str) -> Result<Self, WordSpyError> {
        debug!(url = %url, "dialing WebSocket server");
        let (stream, _response) = tokio_tungstenite::connect_async(url).await.map_err(|e| {
            let kind = match &e {
                tokio_tungstenite::tungstenite::Error::Io(io) => io.kind(),
                _ => std::io::ErrorKind::Other,
            };
            WordSpyError::Io(std::io::Error::new(kind, e))
        })?;
        info!(url = %url, "WebSocket connection established");
        Ok(Self {
            stream,
            closed: false,
        })
    }

    /// Wrap an already-established stream. Use this when the handshake needs
    /// custom TLS configuration or extra headers.
    pub fn from_stream(stream: WsStream) -> Self {
        Self {
            stream,
            closed: false,
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&mut self, message: String) -> Result<(), WordSpyError> {
        if self.closed {
            return Err(WordSpyError::TransportClosed);
        }
        self.stream
            .send(Message::Text(message.into()))
            .await
            .map_err(|e| WordSpyError::TransportSend(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, WordSpyError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.to_string())),
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "WebSocket close frame received");
                    return None;
                }
                // tungstenite queues the pong itself.
                Ok(Message::Ping(_) | Message::Pong(_)) => {}
                Ok(Message::Binary(_)) => {
                    warn!("unexpected binary WebSocket frame, skipping");
                }
                Ok(Message::Frame(_)) => {
                    // Never produced by the read half; arm kept for
                    // exhaustiveness.
                    debug!("raw WebSocket frame, skipping");
                }
                Err(e) => return Some(Err(WordSpyError::TransportReceive(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) -> Result<(), WordSpyError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.stream
            .close(None)
            .await
            .map_err(|e| WordSpyError::TransportSend(e.to_string()))
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// Local WebSocket server that runs `handler` on the first accepted
    /// connection; returns the `ws://` URL to dial.
    async fn mock_server<F, Fut>(handler: F) -> String
    where
        F: FnOnce(tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>) -> Fut
            + Send
            + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            handler(ws).await;
        });
        format!("ws://{addr}/")
    }

    #[test]
    fn connector_appends_token_query() {
        let connector = WebSocketConnector::new("ws://host/socket");
        assert_eq!(
            connector.url_with_token("abc123"),
            "ws://host/socket?token=abc123"
        );

        let with_query = WebSocketConnector::new("ws://host/socket?v=2");
        assert_eq!(
            with_query.url_with_token("abc"),
            "ws://host/socket?v=2&token=abc"
        );
    }

    #[test]
    fn connector_percent_encodes_token() {
        let connector = WebSocketConnector::new("ws://host/socket");
        assert_eq!(
            connector.url_with_token("a b&c=d"),
            "ws://host/socket?token=a%20b%26c%3Dd"
        );
    }

    #[tokio::test]
    async fn connect_fails_with_invalid_url() {
        let err = WebSocketTransport::connect("not-a-url").await.unwrap_err();
        assert!(matches!(err, WordSpyError::Io(_)));
    }

    #[tokio::test]
    async fn text_frames_round_trip() {
        let url = mock_server(|mut ws| async move {
            if let Some(Ok(Message::Text(text))) = ws.next().await {
                ws.send(Message::Text(text)).await.unwrap();
            }
            ws.send(Message::Text("second".into())).await.unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        transport.send("echo".to_string()).await.unwrap();
        assert_eq!(transport.recv().await.unwrap().unwrap(), "echo");
        assert_eq!(transport.recv().await.unwrap().unwrap(), "second");
        assert!(transport.recv().await.is_none());
    }

    #[tokio::test]
    async fn non_text_frames_are_skipped() {
        let url = mock_server(|mut ws| async move {
            ws.send(Message::Binary(vec![1, 2, 3].into())).await.unwrap();
            ws.send(Message::Ping(vec![].into())).await.unwrap();
            ws.send(Message::Text("payload".into())).await.unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        assert_eq!(transport.recv().await.unwrap().unwrap(), "payload");
    }

    #[tokio::test]
    async fn send_after_close_is_transport_closed() {
        let url = mock_server(|mut ws| async move {
            while let Some(Ok(_)) = ws.next().await {}
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        transport.close().await.unwrap();
        transport.close().await.unwrap();
        let err = transport.send("late".to_string()).await.unwrap_err();
        assert!(matches!(err, WordSpyError::TransportClosed));
    }

    #[tokio::test]
    async fn connector_dials_with_token() {
        let url = mock_server(|mut ws| async move {
            ws.send(Message::Text("hello".into())).await.unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let connector = WebSocketConnector::new(url);
        let mut transport = connector.connect("secret").await.unwrap();
        assert_eq!(transport.recv().await.unwrap().unwrap(), "hello");
    }
}
