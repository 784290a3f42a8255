//! Transport abstraction for the WordSpy event channel.
//!
//! The protocol is JSON text messages over any persistent bidirectional
//! channel. Two seams are defined here:
//!
//! - [`Transport`] — a connected channel that shuttles complete JSON frames.
//! - [`Connector`] — the dial capability: given the opaque credential token,
//!   produce a connected transport. The crate never inspects the token.
//!
//! The built-in WebSocket implementations live behind the
//! `transport-websocket` feature; anything else (TCP, QUIC, an in-process
//! pair for tests) implements these traits externally.

use async_trait::async_trait;

use crate::error::WordSpyError;

/// A connected transport as the sync loop consumes it.
pub type BoxTransport = Box<dyn Transport>;

/// A bidirectional text-frame channel to the game server.
///
/// Each `send` transmits one complete JSON frame; each `recv` yields one.
/// Implementations handle framing internally (WebSocket frames,
/// length-prefixed TCP, …).
///
/// # Cancel Safety
///
/// [`recv`](Transport::recv) **must** be cancel-safe: it is polled inside
/// `tokio::select!`, and a cancelled call must not lose a frame.
/// Channel-backed implementations are naturally cancel-safe.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Send one JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns [`WordSpyError::TransportSend`] if the frame could not be
    /// written, or [`WordSpyError::TransportClosed`] after `close`.
    async fn send(&mut self, message: String) -> Result<(), WordSpyError>;

    /// Receive the next JSON text frame.
    ///
    /// Returns `Some(Ok(text))` for a frame, `Some(Err(_))` for a transport
    /// error, and `None` when the server closed the connection cleanly.
    async fn recv(&mut self) -> Option<Result<String, WordSpyError>>;

    /// Close the connection gracefully. Implementations release resources
    /// even if the close handshake fails.
    async fn close(&mut self) -> Result<(), WordSpyError>;
}

/// Dial capability: open a new transport authenticated with the given
/// credential token.
///
/// How the token travels (query parameter, header, first frame) is the
/// implementation's business; the client treats it as opaque.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Open a fresh connection.
    ///
    /// # Errors
    ///
    /// Returns whatever transport-level error prevented the dial; the
    /// supervisor surfaces it to the caller without retrying.
    async fn connect(&self, token: &str) -> Result<BoxTransport, WordSpyError>;
}
