//! Error types for the WordSpy client.

use thiserror::Error;

/// Errors that can occur when using the WordSpy client.
#[derive(Debug, Error)]
pub enum WordSpyError {
    /// Failed to send a message through the transport.
    #[error("transport send error: {0}")]
    TransportSend(String),

    /// Failed to receive a message from the transport.
    #[error("transport receive error: {0}")]
    TransportReceive(String),

    /// The transport connection was closed unexpectedly.
    #[error("transport connection closed")]
    TransportClosed,

    /// Failed to serialize or deserialize a wire frame.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Attempted an operation that requires a live connection, but no sync
    /// loop is running.
    #[error("not connected to server")]
    NotConnected,

    /// The bounded wait for transport readiness elapsed. Terminal for the
    /// action that waited; callers surface it instead of retrying.
    #[error("timed out waiting for connection")]
    ConnectionTimeout,

    /// A mutator was invoked without its required `Room`/`Game`/connection.
    /// The request is not emitted and no state changes.
    #[error("precondition not met: {0}")]
    Precondition(&'static str),

    /// A durable-storage read or write failed. Swallowed at the cache
    /// boundary and treated as a cache miss.
    #[error("storage error: {0}")]
    Storage(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized [`Result`] type for WordSpy client operations.
pub type Result<T> = std::result::Result<T, WordSpyError>;
