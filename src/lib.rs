//! # WordSpy Client
//!
//! Async client-side state synchronization engine for WordSpy multiplayer
//! rooms.
//!
//! The server owns all game state; this crate turns its pushed JSON events
//! into consistent local snapshots of the room, the running game, the chat
//! history, and the typing roster, over any bidirectional text transport.
//!
//! ## Features
//!
//! - **Transport-agnostic** — implement [`Transport`]/[`Connector`] for any
//!   backend; the default `transport-websocket` feature ships a WebSocket one
//! - **Authoritative snapshots** — server room/game objects replace local
//!   state wholesale, so the local view never drifts
//! - **Optimistic chat** — sends appear immediately as pending entries and
//!   are reconciled against the server's confirmation without duplicates
//! - **Resumable** — the room snapshot is mirrored to a pluggable
//!   [`SnapshotStore`], so a restarted client renders the room instantly and
//!   re-joins with one call
//! - **Event-driven** — lifecycle notifications arrive as typed
//!   [`WordSpyEvent`]s on a bounded channel
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use wordspy_client::{
//!     MemoryStore, NullSound, WebSocketConnector, WordSpyClient, WordSpyConfig,
//! };
//!
//! # async fn run() -> Result<(), wordspy_client::WordSpyError> {
//! let connector = Arc::new(WebSocketConnector::new("wss://play.example.com/socket"));
//! let (client, mut events) = WordSpyClient::start(
//!     connector,
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(NullSound),
//!     WordSpyConfig::new("auth-token", "u-123", "Alice"),
//! );
//!
//! client.join_room("ABCD").await?;
//! while let Some(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod event;
pub mod presence;
pub mod protocol;
pub mod reconciler;
pub mod router;
pub mod sound;
pub mod storage;
pub mod supervisor;
pub mod transport;

#[cfg(feature = "transport-websocket")]
pub mod transports;

// Re-export primary types for ergonomic imports.
pub use client::{WordSpyClient, WordSpyConfig, DEFAULT_EVENT_CAPACITY};
pub use error::WordSpyError;
pub use event::WordSpyEvent;
pub use protocol::{
    Category, ChatMessage, ClientRequest, GamePhase, GameState, Player, Room, RoomStatus,
    ServerEvent, UserRef,
};
pub use sound::{NullSound, SoundCue, SoundPlayer};
pub use storage::{MemoryStore, RoomCache, SnapshotStore, ROOM_SNAPSHOT_KEY};
pub use transport::{BoxTransport, Connector, Transport};

#[cfg(feature = "transport-websocket")]
pub use transports::websocket::{WebSocketConnector, WebSocketTransport};
