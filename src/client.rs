//! The public client handle.
//!
//! [`WordSpyClient`] is a thin, cheaply-clonable facade over the connection
//! supervisor and the state reconciler. Every method either reads a cloned
//! snapshot or queues a request for the background sync loop; none of them
//! blocks on server processing. Confirmation always arrives as a later
//! [`WordSpyEvent`] on the receiver returned by [`WordSpyClient::start`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{Result, WordSpyError};
use crate::event::WordSpyEvent;
use crate::protocol::{Category, ChatMessage, ClientRequest, GameState, Room};
use crate::reconciler::{LocalUser, Reconciler};
use crate::sound::SoundPlayer;
use crate::storage::{RoomCache, SnapshotStore};
use crate::supervisor::{ConnectionSupervisor, Outbound, DEFAULT_CONNECT_TIMEOUT};
use crate::transport::Connector;

/// Default capacity of the event channel handed back by
/// [`WordSpyClient::start`].
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Client configuration. Construct with [`WordSpyConfig::new`] and chain the
/// builder methods for the optional knobs.
#[derive(Debug, Clone)]
pub struct WordSpyConfig {
    pub token: String,
    pub user_id: String,
    pub username: String,
    event_channel_capacity: usize,
    connect_timeout: Duration,
}

impl WordSpyConfig {
    pub fn new(
        token: impl Into<String>,
        user_id: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        Self {
            token: token.into(),
            user_id: user_id.into(),
            username: username.into(),
            event_channel_capacity: DEFAULT_EVENT_CAPACITY,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Capacity of the event channel. Clamped to at least 1.
    #[must_use]
    pub fn event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }

    /// How long [`WordSpyClient::connect`] waits for the connection to come
    /// up before reporting [`WordSpyError::ConnectionTimeout`].
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

/// Handle to a running client. Clones share the same connection and state.
#[derive(Clone, Debug)]
pub struct WordSpyClient {
    supervisor: Arc<ConnectionSupervisor>,
    reconciler: Reconciler,
    events: mpsc::Sender<WordSpyEvent>,
    connect_timeout: Duration,
}

impl WordSpyClient {
    /// Assemble a client from its pluggable parts and return it together
    /// with the lifecycle event receiver.
    ///
    /// No connection is made yet; call [`connect`](Self::connect) or any
    /// method that needs one. If `store` holds a room snapshot from a
    /// previous run, [`room`](Self::room) serves it immediately.
    pub fn start(
        connector: Arc<dyn Connector>,
        store: Arc<dyn SnapshotStore>,
        sound: Arc<dyn SoundPlayer>,
        config: WordSpyConfig,
    ) -> (Self, mpsc::Receiver<WordSpyEvent>) {
        let (event_tx, event_rx) = mpsc::channel(config.event_channel_capacity);
        let outbound = Outbound::default();
        let reconciler = Reconciler::new(
            LocalUser {
                user_id: config.user_id,
                username: config.username,
            },
            outbound.clone(),
            RoomCache::new(store),
            sound,
            event_tx.clone(),
        );
        let supervisor = Arc::new(ConnectionSupervisor::new(
            connector,
            config.token,
            outbound,
        ));
        let client = Self {
            supervisor,
            reconciler,
            events: event_tx,
            connect_timeout: config.connect_timeout,
        };
        (client, event_rx)
    }

    // ── Connection lifecycle ────────────────────────────────────────

    /// Whether a live connection is currently up.
    pub fn is_connected(&self) -> bool {
        self.supervisor.is_connected()
    }

    /// Dial the server and wait until the connection is live.
    ///
    /// Idempotent while connected. Every connection gets a freshly wired
    /// event router, so reconnecting after a drop never stacks handlers.
    ///
    /// # Errors
    ///
    /// The connector's error if the dial fails, or
    /// [`WordSpyError::ConnectionTimeout`] if the connection does not come
    /// up within the configured timeout.
    pub async fn connect(&self) -> Result<()> {
        self.supervisor
            .connect(self.reconciler.router(), self.events.clone())
            .await?;
        self.supervisor.await_connected(self.connect_timeout).await
    }

    /// Tear the connection down gracefully. The receiver sees a final
    /// [`WordSpyEvent::Disconnected`]. Local state and the persisted room
    /// snapshot survive, so a later [`connect`](Self::connect) plus
    /// [`join_room`](Self::join_room) resumes the session.
    pub async fn shutdown(&self) {
        self.supervisor.shutdown().await;
    }

    // ── Room membership ─────────────────────────────────────────────

    /// Join (or re-join) a room, connecting first if necessary.
    ///
    /// Resolution arrives as [`WordSpyEvent::RoomJoined`] or
    /// [`WordSpyEvent::Rejected`].
    pub async fn join_room(&self, room_code: impl Into<String>) -> Result<()> {
        let room_code = room_code.into();
        if room_code.is_empty() {
            warn!("join_room called with an empty room code");
            return Err(WordSpyError::Precondition("room code must not be empty"));
        }
        self.connect().await?;
        self.supervisor.emit(ClientRequest::JoinRoom { room_code })
    }

    /// Ask the server to remove us from the current room. State is cleared
    /// when the `room_left` confirmation arrives.
    pub fn leave_room(&self) -> Result<()> {
        let room_code = self.current_room_code()?;
        self.supervisor.emit(ClientRequest::LeaveRoom { room_code })
    }

    /// Drop all local room state without telling the server. For when the
    /// connection is already gone and the UI needs to reset now.
    pub fn leave_room_local(&self) {
        debug!("local-only room leave");
        self.reconciler.clear_all();
    }

    /// Request a fresh authoritative room snapshot.
    pub fn refresh_room(&self) -> Result<()> {
        let room_code = self.current_room_code()?;
        self.supervisor
            .emit(ClientRequest::GetRoomState { room_code })
    }

    /// Flip the local player's ready flag. A player missing from the roster
    /// (stale cache seed, refresh in flight) counts as not ready, so the
    /// first toggle still requests ready.
    pub fn toggle_ready(&self) -> Result<()> {
        let room_code = self.current_room_code()?;
        let is_ready = self.reconciler.local_player_ready().unwrap_or(false);
        self.supervisor.emit(ClientRequest::PlayerReady {
            room_code,
            is_ready: !is_ready,
        })
    }

    // ── Game actions ────────────────────────────────────────────────

    /// Start a game in the current room. With `None` a category is picked
    /// at random.
    pub fn start_game(&self, category: Option<Category>) -> Result<()> {
        let room_code = self.current_room_code()?;
        let category = category.unwrap_or_else(Category::random);
        self.supervisor
            .emit(ClientRequest::GameStart { room_code, category })
    }

    pub fn submit_clue(&self, clue: impl Into<String>) -> Result<()> {
        let game_id = self.current_game_id()?;
        self.supervisor.emit(ClientRequest::SubmitClue {
            game_id,
            clue: clue.into(),
        })
    }

    pub fn cast_vote(&self, voted_for_id: impl Into<String>) -> Result<()> {
        let game_id = self.current_game_id()?;
        self.supervisor.emit(ClientRequest::CastVote {
            game_id,
            voted_for_id: voted_for_id.into(),
        })
    }

    pub fn submit_spy_guess(&self, word: impl Into<String>) -> Result<()> {
        let game_id = self.current_game_id()?;
        self.supervisor.emit(ClientRequest::SubmitSpyGuess {
            game_id,
            word: word.into(),
        })
    }

    // ── Chat and presence ───────────────────────────────────────────

    /// Send a chat message, inserting an optimistic pending entry into the
    /// local history first. Returns the pending entry.
    ///
    /// If no connection is live, one bounded connect attempt is made and the
    /// send retried once. When the server's confirmation arrives, the
    /// pending entry is replaced in place by the reconciler's dedup rule. If
    /// the send ultimately fails, the pending entry stays visible with its
    /// `pending` flag set.
    pub async fn send_message(&self, text: impl Into<String>) -> Result<ChatMessage> {
        let room_code = self.current_room_code()?;
        let text = text.into();
        let echo = self.reconciler.push_pending(&text);
        let request = ClientRequest::SendMessage {
            room_code,
            message: text,
            message_type: "chat".to_string(),
        };
        match self.supervisor.emit(request.clone()) {
            Ok(()) => Ok(echo),
            Err(WordSpyError::NotConnected) => {
                debug!("send_message while disconnected, reconnecting once");
                self.connect().await?;
                self.supervisor.emit(request)?;
                Ok(echo)
            }
            Err(e) => Err(e),
        }
    }

    pub fn send_typing(&self) -> Result<()> {
        let room_code = self.current_room_code()?;
        self.supervisor
            .emit(ClientRequest::TypingStart { room_code })
    }

    pub fn stop_typing(&self) -> Result<()> {
        let room_code = self.current_room_code()?;
        self.supervisor.emit(ClientRequest::TypingStop { room_code })
    }

    // ── Profile ─────────────────────────────────────────────────────

    pub fn update_avatar(&self, avatar: impl Into<String>) -> Result<()> {
        let room_code = self.current_room_code()?;
        self.supervisor.emit(ClientRequest::UpdateAvatar {
            room_code,
            avatar: avatar.into(),
        })
    }

    pub fn update_name(&self, username: impl Into<String>) -> Result<()> {
        let room_code = self.current_room_code()?;
        self.supervisor.emit(ClientRequest::UpdateName {
            room_code,
            username: username.into(),
        })
    }

    // ── Snapshots ───────────────────────────────────────────────────

    pub fn room(&self) -> Option<Room> {
        self.reconciler.room()
    }

    pub fn game(&self) -> Option<GameState> {
        self.reconciler.game()
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.reconciler.messages()
    }

    /// Display names of remote users currently typing, sorted.
    pub fn typing_users(&self) -> Vec<String> {
        self.reconciler.typing_users()
    }

    pub fn user_id(&self) -> &str {
        &self.reconciler.local_user().user_id
    }

    pub fn username(&self) -> &str {
        &self.reconciler.local_user().username
    }

    fn current_room_code(&self) -> Result<String> {
        self.reconciler.route_code().ok_or_else(|| {
            warn!("request needs a room but none is held");
            WordSpyError::Precondition("no room is currently held")
        })
    }

    fn current_game_id(&self) -> Result<String> {
        self.reconciler.game().map(|game| game.game_id).ok_or_else(|| {
            warn!("request needs a game but none is in progress");
            WordSpyError::Precondition("no game is in progress")
        })
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::sound::NullSound;
    use crate::storage::MemoryStore;
    use crate::transport::{BoxTransport, Transport};
    use async_trait::async_trait;

    /// Transport that delivers nothing and accepts everything.
    struct SilentTransport;

    #[async_trait]
    impl Transport for SilentTransport {
        async fn send(&mut self, _message: String) -> Result<()> {
            Ok(())
        }

        async fn recv(&mut self) -> Option<Result<String>> {
            std::future::pending().await
        }

        async fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    struct SilentConnector;

    #[async_trait]
    impl Connector for SilentConnector {
        async fn connect(&self, _token: &str) -> Result<BoxTransport> {
            Ok(Box::new(SilentTransport))
        }
    }

    fn client() -> (WordSpyClient, mpsc::Receiver<WordSpyEvent>) {
        WordSpyClient::start(
            Arc::new(SilentConnector),
            Arc::new(MemoryStore::new()),
            Arc::new(NullSound),
            WordSpyConfig::new("token", "u-local", "Me"),
        )
    }

    #[test]
    fn config_clamps_capacity_to_one() {
        let config = WordSpyConfig::new("t", "u", "n").event_channel_capacity(0);
        assert_eq!(config.event_channel_capacity, 1);
    }

    #[tokio::test]
    async fn mutators_without_a_room_report_precondition() {
        let (client, _events) = client();
        assert!(matches!(
            client.leave_room(),
            Err(WordSpyError::Precondition(_))
        ));
        assert!(matches!(
            client.send_message("hi").await,
            Err(WordSpyError::Precondition(_))
        ));
        assert!(matches!(
            client.start_game(None),
            Err(WordSpyError::Precondition(_))
        ));
        assert!(matches!(
            client.submit_clue("round"),
            Err(WordSpyError::Precondition(_))
        ));
        assert!(matches!(
            client.join_room("").await,
            Err(WordSpyError::Precondition(_))
        ));
    }

    #[tokio::test]
    async fn connect_is_idempotent() {
        let (client, mut events) = client();
        client.connect().await.unwrap();
        client.connect().await.unwrap();
        assert!(client.is_connected());

        assert_eq!(events.recv().await, Some(WordSpyEvent::Connected));
        client.shutdown().await;
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn join_room_connects_first() {
        let (client, mut events) = client();
        assert!(!client.is_connected());
        client.join_room("ABCD").await.unwrap();
        assert!(client.is_connected());
        assert_eq!(events.recv().await, Some(WordSpyEvent::Connected));
        client.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_emits_final_disconnected() {
        let (client, mut events) = client();
        client.connect().await.unwrap();
        client.shutdown().await;

        let mut saw_disconnected = false;
        while let Some(event) = events.recv().await {
            if matches!(event, WordSpyEvent::Disconnected { .. }) {
                saw_disconnected = true;
                break;
            }
        }
        assert!(saw_disconnected);
    }

    #[tokio::test]
    async fn emit_after_shutdown_is_not_connected() {
        let (client, _events) = client();
        client.connect().await.unwrap();
        client.shutdown().await;
        assert!(matches!(
            client.join_room_emit_only(),
            Err(WordSpyError::NotConnected)
        ));
    }

    impl WordSpyClient {
        /// Raw emit path without the auto-connect, for shutdown assertions.
        fn join_room_emit_only(&self) -> Result<()> {
            self.supervisor.emit(ClientRequest::JoinRoom {
                room_code: "ABCD".into(),
            })
        }
    }
}
