//! The state reconciler: the single owner of the local `Room`/`Game`/chat/
//! typing snapshot.
//!
//! Server snapshots always replace local state wholesale — the player
//! sequence is never patched element-by-element, which is what keeps the
//! local view from drifting under concurrent joins and leaves. The one
//! genuinely incremental structure, the chat history, is reconciled with a
//! three-step rule on every confirmed message:
//!
//! 1. remove a *pending* local echo with the same canonical sender id and
//!    identical text (it is superseded by the confirmation),
//! 2. discard the incoming message if its server id already exists
//!    (duplicate delivery),
//! 3. otherwise append.
//!
//! This guarantees at most one entry per server id and exactly one pending
//! echo per outstanding send, with the confirmation taking the echo's visual
//! slot. Pending entries that are never confirmed are kept indefinitely;
//! `ChatMessage::pending` lets the UI render them distinctly.
//!
//! All state fields are short-critical-section mutexes, never held across an
//! `.await`: events are applied by the single sync-loop task, and the client
//! handle only takes cloned snapshots.

use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::event::{notify, WordSpyEvent};
use crate::presence::TypingRoster;
use crate::protocol::{
    ChatMessage, ChatSender, ClientRequest, GameState, Room, ServerEvent, UserRef,
};
use crate::router::EventRouter;
use crate::sound::{SoundCue, SoundPlayer};
use crate::storage::RoomCache;
use crate::supervisor::Outbound;

/// Identity of the local user, fixed for the client's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalUser {
    pub user_id: String,
    pub username: String,
}

/// The shared snapshot. Exclusively written by the reconciler.
#[derive(Default)]
struct SyncState {
    room: StdMutex<Option<Room>>,
    game: StdMutex<Option<GameState>>,
    messages: StdMutex<Vec<ChatMessage>>,
    typing: StdMutex<TypingRoster>,
}

/// Locks are never held across an await and the lock scope never panics, so
/// a poisoned mutex only means a test assertion fired mid-update; recover
/// the inner value rather than propagating.
fn lock<T>(mutex: &StdMutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Applies inbound events to the snapshot and exposes read-only views.
///
/// Cheap to clone (all fields are shared handles); the sync loop and the
/// client handle each hold one.
#[derive(Clone)]
pub struct Reconciler {
    state: Arc<SyncState>,
    local: Arc<LocalUser>,
    outbound: Outbound,
    cache: RoomCache,
    sound: Arc<dyn SoundPlayer>,
    events: mpsc::Sender<WordSpyEvent>,
}

impl Reconciler {
    /// Build a reconciler, seeding the room snapshot from the persisted
    /// cache. The seed is provisional: the first authoritative room event
    /// replaces it without special-casing.
    pub(crate) fn new(
        local: LocalUser,
        outbound: Outbound,
        cache: RoomCache,
        sound: Arc<dyn SoundPlayer>,
        events: mpsc::Sender<WordSpyEvent>,
    ) -> Self {
        let state = SyncState::default();
        if let Some(room) = cache.load() {
            debug!("seeded room {} from persisted snapshot", room.room_code);
            *lock(&state.room) = Some(room);
        }
        Self {
            state: Arc::new(state),
            local: Arc::new(local),
            outbound,
            cache,
            sound,
            events,
        }
    }

    // ── Snapshot accessors ──────────────────────────────────────────

    pub fn room(&self) -> Option<Room> {
        lock(&self.state.room).clone()
    }

    pub fn game(&self) -> Option<GameState> {
        lock(&self.state.game).clone()
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        lock(&self.state.messages).clone()
    }

    pub fn typing_users(&self) -> Vec<String> {
        lock(&self.state.typing).names()
    }

    pub fn local_user(&self) -> &LocalUser {
        &self.local
    }

    /// The identifier outgoing frames are routed to: the room's code, or the
    /// game's room back-reference when no room is held.
    pub fn route_code(&self) -> Option<String> {
        if let Some(room) = lock(&self.state.room).as_ref() {
            return Some(room.room_code.clone());
        }
        lock(&self.state.game)
            .as_ref()
            .map(|game| game.room_id.clone())
    }

    /// Ready flag of the local user's roster entry, if present.
    pub fn local_player_ready(&self) -> Option<bool> {
        lock(&self.state.room).as_ref().and_then(|room| {
            room.players
                .iter()
                .find(|p| p.user_id.canonical() == self.local.user_id)
                .map(|p| p.is_ready)
        })
    }

    // ── Router wiring ───────────────────────────────────────────────

    /// Build a router delivering every event kind to this reconciler. A
    /// fresh router is wired per connection and dropped with its sync loop,
    /// so repeated connect cycles cannot accumulate handlers.
    pub(crate) fn router(&self) -> EventRouter {
        let mut router = EventRouter::new();
        for kind in crate::protocol::EventKind::ALL {
            let reconciler = self.clone();
            router.subscribe(kind, Box::new(move |event| reconciler.apply(event)));
        }
        router
    }

    // ── Event application ───────────────────────────────────────────

    /// Apply one inbound event to the snapshot.
    pub fn apply(&self, event: ServerEvent) {
        match event {
            ServerEvent::RoomJoined { room } => {
                self.replace_room(room, true);
                self.sound.play(SoundCue::Click);
            }
            ServerEvent::RoomUpdated { room } | ServerEvent::RoomState { room } => {
                self.replace_room(room, false);
            }
            ServerEvent::RoomLeft {} => self.clear_all(),
            ServerEvent::RoomError { message } | ServerEvent::Error { message } => {
                self.reject(message);
            }
            ServerEvent::PlayerJoined { username, room }
            | ServerEvent::PlayerLeft { username, room } => {
                self.roster_notice(username.as_deref(), room);
            }
            ServerEvent::GameStart { game } => {
                self.replace_game(game);
                self.sound.play(SoundCue::SpyReveal);
                self.sound.play_music();
            }
            ServerEvent::GameStateUpdate { game } => self.replace_game(game),
            ServerEvent::GameEnd { game } => {
                self.replace_game(game);
                self.sound.stop_music();
                self.sound.play(SoundCue::SpyReveal);
            }
            ServerEvent::CluePhaseStart { game } | ServerEvent::SpyGuessStart { game } => {
                self.maybe_replace_game(game);
                self.sound.play(SoundCue::Timer);
            }
            ServerEvent::ClueSubmitted { game } => {
                self.maybe_replace_game(game);
                self.sound.play(SoundCue::Click);
            }
            ServerEvent::VotingPhaseStart { game } | ServerEvent::VoteCasted { game } => {
                self.maybe_replace_game(game);
                self.sound.play(SoundCue::Vote);
            }
            ServerEvent::VotingResults { game } | ServerEvent::SpyGuessResult { game } => {
                self.maybe_replace_game(game);
                self.sound.play(SoundCue::SpyReveal);
            }
            ServerEvent::CluePhaseEnd { game }
            | ServerEvent::VotingPhaseEnd { game }
            | ServerEvent::RoundStart { game }
            | ServerEvent::RoundEnd { game }
            | ServerEvent::PlayerTurn { game } => self.maybe_replace_game(game),
            ServerEvent::MessageReceived { message } => self.append_confirmed(message),
            ServerEvent::TypingStart { user_id, username } => {
                self.typing_started(&user_id, &username);
            }
            ServerEvent::TypingStop { username, .. } => self.typing_stopped(&username),
        }
    }

    /// Replace the room snapshot wholesale and mirror it to storage.
    ///
    /// Chat and typing are cleared only on a *fresh membership* (room
    /// joined), not on updates — an update is the same membership with a new
    /// roster. Deserialization already produced fresh container instances,
    /// so identity-based change detection in the observer always fires.
    fn replace_room(&self, room: Room, fresh_membership: bool) {
        if fresh_membership {
            lock(&self.state.messages).clear();
            lock(&self.state.typing).clear();
        }
        debug!(
            room_code = %room.room_code,
            players = room.players.len(),
            fresh_membership,
            "room snapshot replaced"
        );
        self.cache.save(&room);
        let room_code = room.room_code.clone();
        *lock(&self.state.room) = Some(room);
        if fresh_membership {
            notify(&self.events, WordSpyEvent::RoomJoined { room_code });
        } else {
            notify(&self.events, WordSpyEvent::RoomUpdated);
        }
    }

    /// Clear the entire snapshot and the persisted mirror. Used for both the
    /// server's `room_left` confirmation and a local-only forced leave.
    pub(crate) fn clear_all(&self) {
        *lock(&self.state.room) = None;
        *lock(&self.state.game) = None;
        lock(&self.state.messages).clear();
        lock(&self.state.typing).clear();
        self.cache.clear();
        debug!("room state cleared");
        notify(&self.events, WordSpyEvent::RoomLeft);
    }

    fn reject(&self, message: String) {
        warn!("server rejection: {message}");
        notify(&self.events, WordSpyEvent::Rejected { message });
    }

    /// Handle a `player_joined`/`player_left` notice.
    ///
    /// With an embedded snapshot this is just a room update. Without one the
    /// roster is *not* patched incrementally — a bare delta has no confirmed
    /// ordering relative to other snapshot deliveries, so instead a
    /// `get_room_state` refresh is requested from the server.
    fn roster_notice(&self, username: Option<&str>, room: Option<Room>) {
        if let Some(name) = username {
            debug!("roster notice for {name}");
        }
        if let Some(room) = room {
            self.replace_room(room, false);
            return;
        }
        let room_code = lock(&self.state.room)
            .as_ref()
            .map(|room| room.room_code.clone());
        match room_code {
            Some(room_code) => {
                debug!("roster notice without snapshot, requesting room state");
                if let Err(e) = self.outbound.emit(ClientRequest::GetRoomState { room_code }) {
                    warn!("could not request room state: {e}");
                }
            }
            None => {
                debug!("roster notice without snapshot and no local room, waiting for room_updated");
            }
        }
    }

    fn replace_game(&self, game: GameState) {
        debug!(game_id = %game.game_id, phase = ?game.phase, "game snapshot replaced");
        *lock(&self.state.game) = Some(game);
        notify(&self.events, WordSpyEvent::GameUpdated);
    }

    /// Phase events without an embedded game object are side-channel
    /// notifications (sound cue only); the snapshot stays put.
    fn maybe_replace_game(&self, game: Option<GameState>) {
        if let Some(game) = game {
            self.replace_game(game);
        }
    }

    /// Append a confirmed message with the three-step dedup rule.
    fn append_confirmed(&self, message: ChatMessage) {
        let mut messages = lock(&self.state.messages);

        // Step 1: the confirmation supersedes a matching pending echo.
        messages.retain(|existing| {
            !(existing.pending
                && existing.sender.user_id.same_user(&message.sender.user_id)
                && existing.message == message.message)
        });

        // Step 2: duplicate delivery of an already-known server id.
        if let Some(id) = message.id.as_deref() {
            if messages.iter().any(|m| m.id.as_deref() == Some(id)) {
                debug!("duplicate message {id}, skipping");
                return;
            }
        }

        // Step 3: append, confirmed.
        let from = message.sender.username.clone();
        messages.push(ChatMessage {
            pending: false,
            ..message
        });
        drop(messages);
        notify(&self.events, WordSpyEvent::MessageReceived { from });
    }

    /// Append an optimistic local echo for an outgoing message and return it.
    pub(crate) fn push_pending(&self, text: &str) -> ChatMessage {
        let message = ChatMessage {
            id: Some(format!("temp-{}", Uuid::new_v4())),
            sender: ChatSender {
                user_id: UserRef::Id(self.local.user_id.clone()),
                username: self.local.username.clone(),
            },
            message: text.to_string(),
            message_type: "chat".to_string(),
            created_at: Some(Utc::now()),
            pending: true,
        };
        lock(&self.state.messages).push(message.clone());
        notify(
            &self.events,
            WordSpyEvent::MessageReceived {
                from: self.local.username.clone(),
            },
        );
        message
    }

    fn typing_started(&self, user_id: &UserRef, username: &str) {
        // The local user's own typing never shows in the roster.
        if user_id.canonical() == self.local.user_id {
            return;
        }
        if lock(&self.state.typing).start(username) {
            notify(&self.events, WordSpyEvent::TypingChanged);
        }
    }

    fn typing_stopped(&self, username: &str) {
        if lock(&self.state.typing).stop(username) {
            notify(&self.events, WordSpyEvent::TypingChanged);
        }
    }
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("room", &self.room().map(|r| r.room_code))
            .field("game", &self.game().map(|g| g.game_id))
            .field("messages", &lock(&self.state.messages).len())
            .finish_non_exhaustive()
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
    use crate::protocol::{Player, RoomStatus};
    use crate::storage::{MemoryStore, SnapshotStore, ROOM_SNAPSHOT_KEY};
    use std::sync::Mutex;

    /// Sound player that records every cue.
    #[derive(Default)]
    struct RecordingSound {
        cues: Mutex<Vec<SoundCue>>,
        music: Mutex<Vec<&'static str>>,
    }

    impl SoundPlayer for RecordingSound {
        fn play(&self, cue: SoundCue) {
            self.cues.lock().unwrap().push(cue);
        }
        fn play_music(&self) {
            self.music.lock().unwrap().push("play");
        }
        fn stop_music(&self) {
            self.music.lock().unwrap().push("stop");
        }
    }

    struct Fixture {
        reconciler: Reconciler,
        store: Arc<MemoryStore>,
        sound: Arc<RecordingSound>,
        events: mpsc::Receiver<WordSpyEvent>,
        outbound_rx: mpsc::UnboundedReceiver<ClientRequest>,
    }

    fn fixture() -> Fixture {
        fixture_with_store(Arc::new(MemoryStore::new()))
    }

    fn fixture_with_store(store: Arc<MemoryStore>) -> Fixture {
        let (event_tx, events) = mpsc::channel(64);
        let outbound = Outbound::default();
        let outbound_rx = attach_channel(&outbound);
        let sound = Arc::new(RecordingSound::default());
        let reconciler = Reconciler::new(
            LocalUser {
                user_id: "u-local".into(),
                username: "Me".into(),
            },
            outbound,
            RoomCache::new(Arc::clone(&store) as Arc<dyn SnapshotStore>),
            Arc::clone(&sound) as Arc<dyn SoundPlayer>,
            event_tx,
        );
        Fixture {
            reconciler,
            store,
            sound,
            events,
            outbound_rx,
        }
    }

    /// Attach a command channel to an [`Outbound`] the way the supervisor
    /// does, returning the receiving half for assertions.
    fn attach_channel(outbound: &Outbound) -> mpsc::UnboundedReceiver<ClientRequest> {
        let (tx, rx) = mpsc::unbounded_channel();
        outbound.attach(tx);
        rx
    }

    fn room(code: &str, players: &[(&str, &str)]) -> Room {
        Room {
            room_code: code.into(),
            room_id: format!("id-{code}"),
            status: RoomStatus::Lobby,
            players: players
                .iter()
                .map(|(id, name)| Player {
                    user_id: UserRef::Id((*id).into()),
                    username: (*name).into(),
                    avatar: None,
                    is_ready: false,
                    role: None,
                })
                .collect(),
        }
    }

    fn game(id: &str) -> GameState {
        GameState {
            game_id: id.into(),
            room_id: "ABCD".into(),
            phase: Default::default(),
            round: None,
            extra: serde_json::Map::new(),
        }
    }

    fn confirmed(id: &str, sender_id: &str, text: &str) -> ChatMessage {
        ChatMessage {
            id: Some(id.into()),
            sender: ChatSender {
                user_id: UserRef::Id(sender_id.into()),
                username: "Someone".into(),
            },
            message: text.into(),
            message_type: "chat".into(),
            created_at: None,
            pending: false,
        }
    }

    // ── Wholesale replacement ───────────────────────────────────────

    #[test]
    fn room_updated_replaces_players_wholesale() {
        let f = fixture();
        f.reconciler.apply(ServerEvent::RoomUpdated {
            room: room("ABCD", &[("u-1", "Alice"), ("u-2", "Bob")]),
        });
        f.reconciler.apply(ServerEvent::RoomUpdated {
            room: room("ABCD", &[("u-3", "Carol")]),
        });

        let players = f.reconciler.room().unwrap().players;
        assert_eq!(players.len(), 1);
        assert_eq!(players[0].username, "Carol");
    }

    #[test]
    fn room_joined_clears_chat_and_typing_but_updated_does_not() {
        let f = fixture();
        f.reconciler
            .apply(ServerEvent::RoomJoined { room: room("ABCD", &[]) });
        f.reconciler
            .apply(ServerEvent::MessageReceived { message: confirmed("m-1", "u-1", "hi") });
        f.reconciler.apply(ServerEvent::TypingStart {
            user_id: UserRef::from("u-1"),
            username: "Alice".into(),
        });

        f.reconciler
            .apply(ServerEvent::RoomUpdated { room: room("ABCD", &[("u-1", "Alice")]) });
        assert_eq!(f.reconciler.messages().len(), 1);
        assert_eq!(f.reconciler.typing_users(), vec!["Alice"]);

        f.reconciler
            .apply(ServerEvent::RoomJoined { room: room("EFGH", &[]) });
        assert!(f.reconciler.messages().is_empty());
        assert!(f.reconciler.typing_users().is_empty());
    }

    #[test]
    fn room_replacement_mirrors_to_storage() {
        let f = fixture();
        f.reconciler
            .apply(ServerEvent::RoomUpdated { room: room("ABCD", &[]) });
        let stored = f.store.get(ROOM_SNAPSHOT_KEY).unwrap().unwrap();
        assert!(stored.contains("ABCD"));
    }

    #[test]
    fn cold_start_seeds_room_from_cache() {
        let store = Arc::new(MemoryStore::new());
        RoomCache::new(Arc::clone(&store) as Arc<dyn SnapshotStore>).save(&room("SEED", &[]));

        let f = fixture_with_store(store);
        assert_eq!(f.reconciler.room().unwrap().room_code, "SEED");

        // The first authoritative event supersedes the seed.
        f.reconciler
            .apply(ServerEvent::RoomUpdated { room: room("REAL", &[]) });
        assert_eq!(f.reconciler.room().unwrap().room_code, "REAL");
    }

    #[test]
    fn malformed_cache_is_ignored_on_cold_start() {
        let store = Arc::new(MemoryStore::new());
        store.set(ROOM_SNAPSHOT_KEY, "{broken").unwrap();
        let f = fixture_with_store(store);
        assert!(f.reconciler.room().is_none());
    }

    // ── room_left ───────────────────────────────────────────────────

    #[test]
    fn room_left_clears_everything_including_cache() {
        let mut f = fixture();
        f.reconciler
            .apply(ServerEvent::RoomJoined { room: room("ABCD", &[("u-1", "Alice")]) });
        f.reconciler
            .apply(ServerEvent::GameStart { game: game("g-1") });
        f.reconciler
            .apply(ServerEvent::MessageReceived { message: confirmed("m-1", "u-1", "hi") });
        f.reconciler.apply(ServerEvent::TypingStart {
            user_id: UserRef::from("u-1"),
            username: "Alice".into(),
        });

        f.reconciler.apply(ServerEvent::RoomLeft {});

        assert!(f.reconciler.room().is_none());
        assert!(f.reconciler.game().is_none());
        assert!(f.reconciler.messages().is_empty());
        assert!(f.reconciler.typing_users().is_empty());
        assert!(f.store.get(ROOM_SNAPSHOT_KEY).unwrap().is_none());

        // Drain events; the last should be RoomLeft.
        let mut last = None;
        while let Ok(event) = f.events.try_recv() {
            last = Some(event);
        }
        assert_eq!(last, Some(WordSpyEvent::RoomLeft));
    }

    // ── Roster notices ──────────────────────────────────────────────

    #[test]
    fn player_joined_with_snapshot_is_a_room_update() {
        let f = fixture();
        f.reconciler.apply(ServerEvent::PlayerJoined {
            username: Some("Bob".into()),
            room: Some(room("ABCD", &[("u-1", "Alice"), ("u-2", "Bob")])),
        });
        assert_eq!(f.reconciler.room().unwrap().players.len(), 2);
    }

    #[test]
    fn player_joined_without_snapshot_requests_room_state() {
        let mut f = fixture();
        f.reconciler
            .apply(ServerEvent::RoomJoined { room: room("ABCD", &[("u-local", "Me")]) });
        f.reconciler.apply(ServerEvent::PlayerJoined {
            username: Some("Bob".into()),
            room: None,
        });

        // No direct roster mutation.
        assert_eq!(f.reconciler.room().unwrap().players.len(), 1);

        let request = f.outbound_rx.try_recv().unwrap();
        assert!(matches!(
            request,
            ClientRequest::GetRoomState { ref room_code } if room_code == "ABCD"
        ));
    }

    #[test]
    fn player_left_without_snapshot_and_no_room_is_a_noop() {
        let mut f = fixture();
        f.reconciler.apply(ServerEvent::PlayerLeft {
            username: Some("Bob".into()),
            room: None,
        });
        assert!(f.outbound_rx.try_recv().is_err());
    }

    // ── Game events ─────────────────────────────────────────────────

    #[test]
    fn game_events_replace_wholesale() {
        let f = fixture();
        f.reconciler
            .apply(ServerEvent::GameStart { game: game("g-1") });
        f.reconciler
            .apply(ServerEvent::GameStateUpdate { game: game("g-2") });
        assert_eq!(f.reconciler.game().unwrap().game_id, "g-2");
    }

    #[test]
    fn phase_event_without_game_keeps_snapshot_but_plays_cue() {
        let f = fixture();
        f.reconciler
            .apply(ServerEvent::GameStart { game: game("g-1") });
        f.reconciler
            .apply(ServerEvent::CluePhaseStart { game: None });

        assert_eq!(f.reconciler.game().unwrap().game_id, "g-1");
        let cues = f.sound.cues.lock().unwrap();
        assert_eq!(*cues, vec![SoundCue::SpyReveal, SoundCue::Timer]);
    }

    #[test]
    fn game_start_and_end_drive_music() {
        let f = fixture();
        f.reconciler
            .apply(ServerEvent::GameStart { game: game("g-1") });
        f.reconciler.apply(ServerEvent::GameEnd { game: game("g-1") });
        assert_eq!(*f.sound.music.lock().unwrap(), vec!["play", "stop"]);
    }

    // ── Chat reconciliation ─────────────────────────────────────────

    #[test]
    fn confirmation_supersedes_pending_echo_exactly_once() {
        let f = fixture();
        f.reconciler.push_pending("hello");
        assert!(f.reconciler.messages()[0].pending);

        f.reconciler.apply(ServerEvent::MessageReceived {
            message: confirmed("m-1", "u-local", "hello"),
        });

        let messages = f.reconciler.messages();
        assert_eq!(messages.len(), 1);
        assert!(!messages[0].pending);
        assert_eq!(messages[0].id.as_deref(), Some("m-1"));
    }

    #[test]
    fn duplicate_confirmed_id_is_idempotent() {
        let f = fixture();
        f.reconciler.apply(ServerEvent::MessageReceived {
            message: confirmed("m-1", "u-1", "hi"),
        });
        f.reconciler.apply(ServerEvent::MessageReceived {
            message: confirmed("m-1", "u-1", "hi"),
        });
        assert_eq!(f.reconciler.messages().len(), 1);
    }

    #[test]
    fn pending_echo_with_different_text_survives_confirmation() {
        let f = fixture();
        f.reconciler.push_pending("first");
        f.reconciler.push_pending("second");

        f.reconciler.apply(ServerEvent::MessageReceived {
            message: confirmed("m-1", "u-local", "first"),
        });

        let messages = f.reconciler.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].message, "second");
        assert!(messages[0].pending);
        assert_eq!(messages[1].message, "first");
        assert!(!messages[1].pending);
    }

    #[test]
    fn dual_shape_sender_still_supersedes_echo() {
        let f = fixture();
        f.reconciler.push_pending("hello");

        // Confirmation arrives with the sender as an embedded object.
        let message: ChatMessage = serde_json::from_str(
            r#"{"_id": "m-9", "sender": {"userId": {"_id": "u-local"}, "username": "Me"},
                "message": "hello"}"#,
        )
        .unwrap();
        f.reconciler.apply(ServerEvent::MessageReceived { message });

        let messages = f.reconciler.messages();
        assert_eq!(messages.len(), 1);
        assert!(!messages[0].pending);
    }

    #[test]
    fn other_senders_messages_append_in_order() {
        let f = fixture();
        f.reconciler.apply(ServerEvent::MessageReceived {
            message: confirmed("m-1", "u-1", "one"),
        });
        f.reconciler.apply(ServerEvent::MessageReceived {
            message: confirmed("m-2", "u-2", "two"),
        });
        let texts: Vec<_> = f
            .reconciler
            .messages()
            .into_iter()
            .map(|m| m.message)
            .collect();
        assert_eq!(texts, vec!["one", "two"]);
    }

    // ── Typing presence ─────────────────────────────────────────────

    #[test]
    fn local_user_typing_start_is_excluded() {
        let f = fixture();
        f.reconciler.apply(ServerEvent::TypingStart {
            user_id: UserRef::from("u-local"),
            username: "Me".into(),
        });
        assert!(f.reconciler.typing_users().is_empty());
    }

    #[test]
    fn typing_start_then_stop_returns_to_empty() {
        let f = fixture();
        f.reconciler.apply(ServerEvent::TypingStart {
            user_id: UserRef::from("u-1"),
            username: "Alice".into(),
        });
        assert_eq!(f.reconciler.typing_users(), vec!["Alice"]);

        f.reconciler.apply(ServerEvent::TypingStop {
            user_id: Some(UserRef::from("u-1")),
            username: "Alice".into(),
        });
        assert!(f.reconciler.typing_users().is_empty());
    }

    // ── Errors ──────────────────────────────────────────────────────

    #[test]
    fn room_error_surfaces_notice_and_leaves_state_untouched() {
        let mut f = fixture();
        f.reconciler
            .apply(ServerEvent::RoomJoined { room: room("ABCD", &[]) });
        while f.events.try_recv().is_ok() {}

        f.reconciler.apply(ServerEvent::RoomError {
            message: "room is full".into(),
        });

        assert_eq!(f.reconciler.room().unwrap().room_code, "ABCD");
        assert_eq!(
            f.events.try_recv().unwrap(),
            WordSpyEvent::Rejected {
                message: "room is full".into()
            }
        );
    }
}
