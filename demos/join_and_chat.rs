//! # Join and Chat Example
//!
//! Demonstrates a complete client lifecycle:
//!
//! 1. Connect to a WordSpy server via WebSocket
//! 2. Join a room and greet it over chat
//! 3. React to room, chat, and typing events
//! 4. Shut down gracefully on Ctrl+C or disconnect
//!
//! ## Running
//!
//! ```sh
//! # Start a WordSpy server on localhost:4000, then:
//! cargo run --example join_and_chat
//!
//! # Override server URL, room, and identity:
//! WORDSPY_URL=wss://play.example.com/socket WORDSPY_ROOM=ABCD \
//!     cargo run --example join_and_chat
//! ```

use std::sync::Arc;

use wordspy_client::{
    MemoryStore, NullSound, WebSocketConnector, WordSpyClient, WordSpyConfig, WordSpyEvent,
};

/// Default server URL when `WORDSPY_URL` is not set.
const DEFAULT_URL: &str = "ws://localhost:4000/socket";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    // Set `RUST_LOG=debug` for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // ── Configuration ───────────────────────────────────────────────
    let url = std::env::var("WORDSPY_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
    let room_code = std::env::var("WORDSPY_ROOM").unwrap_or_else(|_| "ABCD".to_string());
    let token = std::env::var("WORDSPY_TOKEN").unwrap_or_else(|_| "demo-token".to_string());
    tracing::info!("Server: {url}, room: {room_code}");

    // ── Start ───────────────────────────────────────────────────────
    // An in-memory store means no session resumption across runs; swap in a
    // file-backed `SnapshotStore` implementation to survive restarts.
    let (client, mut events) = WordSpyClient::start(
        Arc::new(WebSocketConnector::new(url)),
        Arc::new(MemoryStore::new()),
        Arc::new(NullSound),
        WordSpyConfig::new(token, "demo-user", "Demo"),
    );

    // Connects first if needed, then asks the server for membership.
    client.join_room(&room_code).await?;

    // ── Event loop ──────────────────────────────────────────────────
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    tracing::info!("Event channel closed, exiting");
                    break;
                };

                match event {
                    WordSpyEvent::Connected => {
                        tracing::info!("Connected, joining room {room_code}");
                    }
                    WordSpyEvent::RoomJoined { room_code } => {
                        tracing::info!("Joined room {room_code}");
                        let players: Vec<String> = client
                            .room()
                            .map(|r| r.players.into_iter().map(|p| p.username).collect())
                            .unwrap_or_default();
                        tracing::info!("Players: {players:?}");
                        client.send_message("hello from the Rust client").await?;
                    }
                    WordSpyEvent::RoomUpdated => {
                        if let Some(room) = client.room() {
                            tracing::info!("Roster now has {} players", room.players.len());
                        }
                    }
                    WordSpyEvent::MessageReceived { from } => {
                        if let Some(last) = client.messages().last() {
                            let marker = if last.pending { " (sending)" } else { "" };
                            tracing::info!("<{from}> {}{marker}", last.message);
                        }
                    }
                    WordSpyEvent::TypingChanged => {
                        let typing = client.typing_users();
                        if !typing.is_empty() {
                            tracing::info!("{} typing…", typing.join(", "));
                        }
                    }
                    WordSpyEvent::GameUpdated => {
                        if let Some(game) = client.game() {
                            tracing::info!("Game {} is in phase {:?}", game.game_id, game.phase);
                        }
                    }
                    WordSpyEvent::RoomLeft => {
                        tracing::info!("Left the room, exiting");
                        break;
                    }
                    WordSpyEvent::Rejected { message } => {
                        tracing::warn!("Server rejected a request: {message}");
                    }
                    WordSpyEvent::Disconnected { reason } => {
                        tracing::info!("Disconnected: {reason:?}");
                        break;
                    }
                }
            }

            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C, shutting down");
                client.shutdown().await;
                break;
            }
        }
    }

    Ok(())
}
