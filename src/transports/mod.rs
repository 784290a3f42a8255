//! Concrete transport backends, behind feature gates.
//!
//! | Feature               | Backend                                          |
//! |-----------------------|--------------------------------------------------|
//! | `transport-websocket` | [`WebSocketTransport`] / [`WebSocketConnector`]  |
//!
//! Any backend that can carry ordered text frames works; implement
//! [`Transport`](crate::Transport) and [`Connector`](crate::Connector) for
//! it and hand the connector to [`WordSpyClient::start`](crate::WordSpyClient::start).

#[cfg(feature = "transport-websocket")]
pub mod websocket;

#[cfg(feature = "transport-websocket")]
pub use websocket::{WebSocketConnector, WebSocketTransport};
