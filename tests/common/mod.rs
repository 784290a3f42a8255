#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
//! Shared utilities for integration tests.
//!
//! Provides a channel-driven [`ScriptedTransport`] whose server side is a
//! test-held [`ServerHandle`], a [`ScriptedConnector`] that hands out fresh
//! transports per dial, and builders for raw server-event JSON frames.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::mpsc;
use wordspy_client::{BoxTransport, Connector, Transport, WordSpyError};

// ── ScriptedTransport ───────────────────────────────────────────────

/// Transport whose inbound side is fed by the test through a channel.
///
/// Everything the client sends is recorded in `sent`. Dropping the
/// [`ServerHandle`] (or calling [`ServerHandle::hang_up`]) ends the inbound
/// stream, which the client observes as a server-side disconnect.
pub struct ScriptedTransport {
    incoming: mpsc::UnboundedReceiver<Result<String, WordSpyError>>,
    sent: Arc<StdMutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

/// Test-side handle to a [`ScriptedTransport`].
pub struct ServerHandle {
    tx: Option<mpsc::UnboundedSender<Result<String, WordSpyError>>>,
    /// Frames the client sent over this transport.
    pub sent: Arc<StdMutex<Vec<String>>>,
    /// Whether the client closed the transport.
    pub closed: Arc<AtomicBool>,
}

impl ServerHandle {
    /// Push one server frame to the client.
    pub fn push(&self, frame: String) {
        if let Some(tx) = &self.tx {
            tx.send(Ok(frame)).expect("transport receiver dropped");
        }
    }

    /// Push a transport-level receive error.
    pub fn push_error(&self, message: &str) {
        if let Some(tx) = &self.tx {
            tx.send(Err(WordSpyError::TransportReceive(message.to_string())))
                .expect("transport receiver dropped");
        }
    }

    /// End the inbound stream, simulating a server-side disconnect.
    pub fn hang_up(&mut self) {
        self.tx = None;
    }

    /// Wait until a sent frame satisfies `pred`, returning it.
    ///
    /// Panics after two seconds; outbound frames flow through the background
    /// sync loop, so assertions must poll rather than read immediately.
    pub async fn sent_frame(&self, pred: impl Fn(&str) -> bool) -> String {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            if let Some(frame) = self.sent.lock().unwrap().iter().find(|f| pred(f)) {
                return frame.clone();
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "no sent frame matched within 2s; sent so far: {:?}",
                self.sent.lock().unwrap()
            );
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

pub fn scripted_transport() -> (ScriptedTransport, ServerHandle) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sent = Arc::new(StdMutex::new(Vec::new()));
    let closed = Arc::new(AtomicBool::new(false));
    let transport = ScriptedTransport {
        incoming: rx,
        sent: Arc::clone(&sent),
        closed: Arc::clone(&closed),
    };
    let handle = ServerHandle {
        tx: Some(tx),
        sent,
        closed,
    };
    (transport, handle)
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&mut self, message: String) -> Result<(), WordSpyError> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, WordSpyError>> {
        self.incoming.recv().await
    }

    async fn close(&mut self) -> Result<(), WordSpyError> {
        self.closed.store(true, Ordering::Relaxed);
        Ok(())
    }
}

// ── ScriptedConnector ───────────────────────────────────────────────

/// Hands out pre-built transports, one per dial, and counts dials.
pub struct ScriptedConnector {
    transports: StdMutex<Vec<BoxTransport>>,
    pub dials: AtomicUsize,
    pub last_token: StdMutex<Option<String>>,
}

impl ScriptedConnector {
    pub fn single(transport: ScriptedTransport) -> Arc<Self> {
        Self::new(vec![Box::new(transport)])
    }

    pub fn new(mut transports: Vec<BoxTransport>) -> Arc<Self> {
        // Dials pop from the back; keep caller order.
        transports.reverse();
        Arc::new(Self {
            transports: StdMutex::new(transports),
            dials: AtomicUsize::new(0),
            last_token: StdMutex::new(None),
        })
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self, token: &str) -> Result<BoxTransport, WordSpyError> {
        self.dials.fetch_add(1, Ordering::Relaxed);
        *self.last_token.lock().unwrap() = Some(token.to_string());
        self.transports
            .lock()
            .unwrap()
            .pop()
            .ok_or_else(|| WordSpyError::TransportSend("no scripted transport left".into()))
    }
}

// ── Frame builders ──────────────────────────────────────────────────

pub fn frame(event: &str, data: serde_json::Value) -> String {
    json!({ "event": event, "data": data }).to_string()
}

pub fn room_json(code: &str, players: &[(&str, &str)]) -> serde_json::Value {
    json!({
        "roomCode": code,
        "roomId": format!("id-{code}"),
        "status": "lobby",
        "players": players
            .iter()
            .map(|(id, name)| json!({ "userId": id, "username": name }))
            .collect::<Vec<_>>(),
    })
}

pub fn room_joined(code: &str, players: &[(&str, &str)]) -> String {
    frame("room_joined", json!({ "room": room_json(code, players) }))
}

pub fn room_updated(code: &str, players: &[(&str, &str)]) -> String {
    frame("room_updated", json!({ "room": room_json(code, players) }))
}

pub fn game_start(game_id: &str, room_id: &str) -> String {
    frame(
        "game_start",
        json!({ "game": { "gameId": game_id, "roomId": room_id, "phase": "clue" } }),
    )
}

pub fn message_received(id: &str, sender_id: &str, sender_name: &str, text: &str) -> String {
    frame(
        "message_received",
        json!({
            "message": {
                "_id": id,
                "sender": { "userId": sender_id, "username": sender_name },
                "message": text,
                "messageType": "chat",
            }
        }),
    )
}
