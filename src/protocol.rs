//! Wire types for the WordSpy game protocol.
//!
//! Every frame on the channel is a JSON text message, adjacently tagged as
//! `{"event": "...", "data": {...}}` with camelCase payload fields. Inbound
//! frames deserialize to [`ServerEvent`], outbound requests serialize from
//! [`ClientRequest`].
//!
//! Identifiers are server-issued strings. Player and sender identity may
//! arrive either as a bare id string or as an embedded user object;
//! [`UserRef::canonical`] is the single place that difference is resolved —
//! every identity comparison in the crate goes through it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Identity ────────────────────────────────────────────────────────

/// A user identity as it appears on the wire: either a bare id string or an
/// embedded object carrying the id under `_id` or `userId`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserRef {
    /// Bare identifier, e.g. `"66a1f0…"`.
    Id(String),
    /// Embedded user object, e.g. `{"_id": "66a1f0…", "username": "Alice"}`.
    Embedded(EmbeddedUser),
}

/// The embedded-object form of a user identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddedUser {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl UserRef {
    /// The canonical identifier for this user, regardless of wire shape.
    ///
    /// An embedded object without any id field canonicalizes to `""`, which
    /// never equals a real server-issued id.
    pub fn canonical(&self) -> &str {
        match self {
            UserRef::Id(id) => id,
            UserRef::Embedded(user) => user
                .id
                .as_deref()
                .or(user.user_id.as_deref())
                .unwrap_or(""),
        }
    }

    /// Whether two references denote the same user.
    pub fn same_user(&self, other: &UserRef) -> bool {
        self.canonical() == other.canonical()
    }
}

impl From<&str> for UserRef {
    fn from(id: &str) -> Self {
        UserRef::Id(id.to_string())
    }
}

// ── Room ────────────────────────────────────────────────────────────

/// Lifecycle status of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    #[default]
    Lobby,
    Playing,
    Ended,
}

/// A player inside a room. Position in [`Room::players`] is turn order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub user_id: UserRef,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default)]
    pub is_ready: bool,
    /// Role assigned once a game starts (e.g. `"spy"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// One joinable game lobby. Always replaced wholesale from a server
/// snapshot — the player sequence is never patched element-by-element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    /// Stable human-facing code, immutable for the room's life.
    pub room_code: String,
    pub room_id: String,
    #[serde(default)]
    pub status: RoomStatus,
    #[serde(default)]
    pub players: Vec<Player>,
}

// ── Game ────────────────────────────────────────────────────────────

/// Phase of an in-progress game. Unknown phases are preserved verbatim so a
/// newer server cannot break deserialization of the whole snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(from = "String", into = "String")]
pub enum GamePhase {
    #[default]
    Clue,
    Voting,
    SpyGuess,
    Ended,
    Other(String),
}

impl From<String> for GamePhase {
    fn from(s: String) -> Self {
        match s.as_str() {
            "clue" => GamePhase::Clue,
            "voting" => GamePhase::Voting,
            "spy_guess" => GamePhase::SpyGuess,
            "ended" => GamePhase::Ended,
            _ => GamePhase::Other(s),
        }
    }
}

impl From<GamePhase> for String {
    fn from(phase: GamePhase) -> Self {
        match phase {
            GamePhase::Clue => "clue".to_string(),
            GamePhase::Voting => "voting".to_string(),
            GamePhase::SpyGuess => "spy_guess".to_string(),
            GamePhase::Ended => "ended".to_string(),
            GamePhase::Other(s) => s,
        }
    }
}

/// The authoritative in-progress game. Fully replaced on every game event;
/// the client never computes phase transitions itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub game_id: String,
    /// Non-owning back-reference, used only to route outgoing messages when
    /// no `Room` is held.
    pub room_id: String,
    #[serde(default)]
    pub phase: GamePhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round: Option<u32>,
    /// Per-round data the client carries opaquely (word lists, clue tables,
    /// vote tallies, timers — whatever the server attaches).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// ── Chat ────────────────────────────────────────────────────────────

/// Sender identity attached to a chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSender {
    pub user_id: UserRef,
    #[serde(default)]
    pub username: String,
}

fn default_message_type() -> String {
    "chat".to_string()
}

/// A single chat entry. `id` is server-assigned once confirmed; optimistic
/// local entries carry a `temp-` prefixed placeholder until reconciled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(
        rename = "_id",
        alias = "id",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    pub sender: ChatSender,
    #[serde(alias = "text")]
    pub message: String,
    #[serde(default = "default_message_type")]
    pub message_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// True only for a locally-originated entry not yet confirmed by the
    /// server. Never crosses the wire.
    #[serde(skip)]
    pub pending: bool,
}

// ── Categories ──────────────────────────────────────────────────────

/// Word category a game round draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Food,
    Animals,
    Places,
    Movies,
    Jobs,
    Sports,
    Countries,
    Objects,
}

impl Category {
    /// Every selectable category, in wire order.
    pub const ALL: [Category; 8] = [
        Category::Food,
        Category::Animals,
        Category::Places,
        Category::Movies,
        Category::Jobs,
        Category::Sports,
        Category::Countries,
        Category::Objects,
    ];

    /// Pick a category uniformly at random.
    pub fn random() -> Self {
        use rand::seq::IndexedRandom;
        Self::ALL
            .choose(&mut rand::rng())
            .copied()
            .unwrap_or(Category::Food)
    }
}

// ── Inbound events ──────────────────────────────────────────────────

/// Events pushed by the server. The `data` object is always present, even
/// when empty (`room_left {}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    RoomJoined {
        room: Room,
    },
    RoomUpdated {
        room: Room,
    },
    RoomState {
        room: Room,
    },
    RoomLeft {},
    RoomError {
        message: String,
    },
    #[serde(rename_all = "camelCase")]
    PlayerJoined {
        #[serde(default)]
        username: Option<String>,
        #[serde(default)]
        room: Option<Room>,
    },
    #[serde(rename_all = "camelCase")]
    PlayerLeft {
        #[serde(default)]
        username: Option<String>,
        #[serde(default)]
        room: Option<Room>,
    },
    GameStart {
        game: GameState,
    },
    GameStateUpdate {
        game: GameState,
    },
    GameEnd {
        game: GameState,
    },
    CluePhaseStart {
        #[serde(default)]
        game: Option<GameState>,
    },
    CluePhaseEnd {
        #[serde(default)]
        game: Option<GameState>,
    },
    ClueSubmitted {
        #[serde(default)]
        game: Option<GameState>,
    },
    VotingPhaseStart {
        #[serde(default)]
        game: Option<GameState>,
    },
    VotingPhaseEnd {
        #[serde(default)]
        game: Option<GameState>,
    },
    VoteCasted {
        #[serde(default)]
        game: Option<GameState>,
    },
    VotingResults {
        #[serde(default)]
        game: Option<GameState>,
    },
    SpyGuessStart {
        #[serde(default)]
        game: Option<GameState>,
    },
    SpyGuessResult {
        #[serde(default)]
        game: Option<GameState>,
    },
    RoundStart {
        #[serde(default)]
        game: Option<GameState>,
    },
    RoundEnd {
        #[serde(default)]
        game: Option<GameState>,
    },
    PlayerTurn {
        #[serde(default)]
        game: Option<GameState>,
    },
    MessageReceived {
        message: ChatMessage,
    },
    #[serde(rename_all = "camelCase")]
    TypingStart {
        user_id: UserRef,
        username: String,
    },
    #[serde(rename_all = "camelCase")]
    TypingStop {
        #[serde(default)]
        user_id: Option<UserRef>,
        username: String,
    },
    Error {
        message: String,
    },
}

/// Fieldless mirror of [`ServerEvent`], used as the router key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    RoomJoined,
    RoomUpdated,
    RoomState,
    RoomLeft,
    RoomError,
    PlayerJoined,
    PlayerLeft,
    GameStart,
    GameStateUpdate,
    GameEnd,
    CluePhaseStart,
    CluePhaseEnd,
    ClueSubmitted,
    VotingPhaseStart,
    VotingPhaseEnd,
    VoteCasted,
    VotingResults,
    SpyGuessStart,
    SpyGuessResult,
    RoundStart,
    RoundEnd,
    PlayerTurn,
    MessageReceived,
    TypingStart,
    TypingStop,
    Error,
}

impl EventKind {
    /// Every inbound event kind, in declaration order.
    pub const ALL: [EventKind; 26] = [
        EventKind::RoomJoined,
        EventKind::RoomUpdated,
        EventKind::RoomState,
        EventKind::RoomLeft,
        EventKind::RoomError,
        EventKind::PlayerJoined,
        EventKind::PlayerLeft,
        EventKind::GameStart,
        EventKind::GameStateUpdate,
        EventKind::GameEnd,
        EventKind::CluePhaseStart,
        EventKind::CluePhaseEnd,
        EventKind::ClueSubmitted,
        EventKind::VotingPhaseStart,
        EventKind::VotingPhaseEnd,
        EventKind::VoteCasted,
        EventKind::VotingResults,
        EventKind::SpyGuessStart,
        EventKind::SpyGuessResult,
        EventKind::RoundStart,
        EventKind::RoundEnd,
        EventKind::PlayerTurn,
        EventKind::MessageReceived,
        EventKind::TypingStart,
        EventKind::TypingStop,
        EventKind::Error,
    ];

    /// The wire name of this event kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::RoomJoined => "room_joined",
            EventKind::RoomUpdated => "room_updated",
            EventKind::RoomState => "room_state",
            EventKind::RoomLeft => "room_left",
            EventKind::RoomError => "room_error",
            EventKind::PlayerJoined => "player_joined",
            EventKind::PlayerLeft => "player_left",
            EventKind::GameStart => "game_start",
            EventKind::GameStateUpdate => "game_state_update",
            EventKind::GameEnd => "game_end",
            EventKind::CluePhaseStart => "clue_phase_start",
            EventKind::CluePhaseEnd => "clue_phase_end",
            EventKind::ClueSubmitted => "clue_submitted",
            EventKind::VotingPhaseStart => "voting_phase_start",
            EventKind::VotingPhaseEnd => "voting_phase_end",
            EventKind::VoteCasted => "vote_casted",
            EventKind::VotingResults => "voting_results",
            EventKind::SpyGuessStart => "spy_guess_start",
            EventKind::SpyGuessResult => "spy_guess_result",
            EventKind::RoundStart => "round_start",
            EventKind::RoundEnd => "round_end",
            EventKind::PlayerTurn => "player_turn",
            EventKind::MessageReceived => "message_received",
            EventKind::TypingStart => "typing_start",
            EventKind::TypingStop => "typing_stop",
            EventKind::Error => "error",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ServerEvent {
    /// The kind tag of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            ServerEvent::RoomJoined { .. } => EventKind::RoomJoined,
            ServerEvent::RoomUpdated { .. } => EventKind::RoomUpdated,
            ServerEvent::RoomState { .. } => EventKind::RoomState,
            ServerEvent::RoomLeft {} => EventKind::RoomLeft,
            ServerEvent::RoomError { .. } => EventKind::RoomError,
            ServerEvent::PlayerJoined { .. } => EventKind::PlayerJoined,
            ServerEvent::PlayerLeft { .. } => EventKind::PlayerLeft,
            ServerEvent::GameStart { .. } => EventKind::GameStart,
            ServerEvent::GameStateUpdate { .. } => EventKind::GameStateUpdate,
            ServerEvent::GameEnd { .. } => EventKind::GameEnd,
            ServerEvent::CluePhaseStart { .. } => EventKind::CluePhaseStart,
            ServerEvent::CluePhaseEnd { .. } => EventKind::CluePhaseEnd,
            ServerEvent::ClueSubmitted { .. } => EventKind::ClueSubmitted,
            ServerEvent::VotingPhaseStart { .. } => EventKind::VotingPhaseStart,
            ServerEvent::VotingPhaseEnd { .. } => EventKind::VotingPhaseEnd,
            ServerEvent::VoteCasted { .. } => EventKind::VoteCasted,
            ServerEvent::VotingResults { .. } => EventKind::VotingResults,
            ServerEvent::SpyGuessStart { .. } => EventKind::SpyGuessStart,
            ServerEvent::SpyGuessResult { .. } => EventKind::SpyGuessResult,
            ServerEvent::RoundStart { .. } => EventKind::RoundStart,
            ServerEvent::RoundEnd { .. } => EventKind::RoundEnd,
            ServerEvent::PlayerTurn { .. } => EventKind::PlayerTurn,
            ServerEvent::MessageReceived { .. } => EventKind::MessageReceived,
            ServerEvent::TypingStart { .. } => EventKind::TypingStart,
            ServerEvent::TypingStop { .. } => EventKind::TypingStop,
            ServerEvent::Error { .. } => EventKind::Error,
        }
    }
}

// ── Outbound requests ───────────────────────────────────────────────

/// Requests the client sends to the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientRequest {
    #[serde(rename_all = "camelCase")]
    JoinRoom { room_code: String },
    #[serde(rename_all = "camelCase")]
    LeaveRoom { room_code: String },
    #[serde(rename_all = "camelCase")]
    GetRoomState { room_code: String },
    #[serde(rename_all = "camelCase")]
    PlayerReady { room_code: String, is_ready: bool },
    #[serde(rename_all = "camelCase")]
    GameStart {
        room_code: String,
        category: Category,
    },
    #[serde(rename_all = "camelCase")]
    SubmitClue { game_id: String, clue: String },
    #[serde(rename_all = "camelCase")]
    CastVote {
        game_id: String,
        voted_for_id: String,
    },
    #[serde(rename_all = "camelCase")]
    SubmitSpyGuess { game_id: String, word: String },
    #[serde(rename_all = "camelCase")]
    SendMessage {
        room_code: String,
        message: String,
        message_type: String,
    },
    #[serde(rename_all = "camelCase")]
    TypingStart { room_code: String },
    #[serde(rename_all = "camelCase")]
    TypingStop { room_code: String },
    #[serde(rename_all = "camelCase")]
    UpdateAvatar { room_code: String, avatar: String },
    #[serde(rename_all = "camelCase")]
    UpdateName { room_code: String, username: String },
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

    #[test]
    fn user_ref_bare_id_canonical() {
        let user: UserRef = serde_json::from_str(r#""u-42""#).unwrap();
        assert_eq!(user.canonical(), "u-42");
    }

    #[test]
    fn user_ref_embedded_underscore_id() {
        let user: UserRef =
            serde_json::from_str(r#"{"_id": "u-42", "username": "Alice"}"#).unwrap();
        assert_eq!(user.canonical(), "u-42");
    }

    #[test]
    fn user_ref_embedded_user_id_field() {
        let user: UserRef = serde_json::from_str(r#"{"userId": "u-42"}"#).unwrap();
        assert_eq!(user.canonical(), "u-42");
    }

    #[test]
    fn user_ref_same_user_across_shapes() {
        let bare = UserRef::from("u-42");
        let embedded: UserRef = serde_json::from_str(r#"{"_id": "u-42"}"#).unwrap();
        assert!(bare.same_user(&embedded));
    }

    #[test]
    fn room_deserializes_camel_case() {
        let json = r#"{
            "roomCode": "ABCD",
            "roomId": "r-1",
            "status": "playing",
            "players": [
                {"userId": "u-1", "username": "Alice", "isReady": true},
                {"userId": {"_id": "u-2"}, "username": "Bob"}
            ]
        }"#;
        let room: Room = serde_json::from_str(json).unwrap();
        assert_eq!(room.room_code, "ABCD");
        assert_eq!(room.status, RoomStatus::Playing);
        assert_eq!(room.players.len(), 2);
        assert!(room.players[0].is_ready);
        assert_eq!(room.players[1].user_id.canonical(), "u-2");
    }

    #[test]
    fn game_phase_round_trips_and_tolerates_unknown() {
        let game: GameState = serde_json::from_str(
            r#"{"gameId": "g-1", "roomId": "r-1", "phase": "spy_guess"}"#,
        )
        .unwrap();
        assert_eq!(game.phase, GamePhase::SpyGuess);

        let game: GameState =
            serde_json::from_str(r#"{"gameId": "g-1", "roomId": "r-1", "phase": "bonus"}"#)
                .unwrap();
        assert_eq!(game.phase, GamePhase::Other("bonus".into()));
        let json = serde_json::to_value(&game).unwrap();
        assert_eq!(json["phase"], "bonus");
    }

    #[test]
    fn game_state_keeps_unknown_fields() {
        let game: GameState = serde_json::from_str(
            r#"{"gameId": "g-1", "roomId": "r-1", "word": "penguin", "clues": []}"#,
        )
        .unwrap();
        assert_eq!(game.extra["word"], "penguin");
    }

    #[test]
    fn chat_message_accepts_both_id_and_text_aliases() {
        let msg: ChatMessage = serde_json::from_str(
            r#"{"_id": "m-1", "sender": {"userId": "u-1", "username": "Alice"}, "message": "hi"}"#,
        )
        .unwrap();
        assert_eq!(msg.id.as_deref(), Some("m-1"));
        assert!(!msg.pending);

        let msg: ChatMessage = serde_json::from_str(
            r#"{"id": "m-2", "sender": {"userId": "u-1"}, "text": "yo"}"#,
        )
        .unwrap();
        assert_eq!(msg.id.as_deref(), Some("m-2"));
        assert_eq!(msg.message, "yo");
        assert_eq!(msg.message_type, "chat");
    }

    #[test]
    fn server_event_room_joined_parses() {
        let json = r#"{
            "event": "room_joined",
            "data": {"room": {"roomCode": "ABCD", "roomId": "r-1", "players": []}}
        }"#;
        let event: ServerEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.kind(), EventKind::RoomJoined);
    }

    #[test]
    fn server_event_room_left_parses_empty_data() {
        let event: ServerEvent =
            serde_json::from_str(r#"{"event": "room_left", "data": {}}"#).unwrap();
        assert_eq!(event.kind(), EventKind::RoomLeft);
    }

    #[test]
    fn server_event_phase_event_without_game() {
        let event: ServerEvent =
            serde_json::from_str(r#"{"event": "clue_phase_start", "data": {}}"#).unwrap();
        assert!(matches!(
            event,
            ServerEvent::CluePhaseStart { game: None }
        ));
    }

    #[test]
    fn server_event_typing_start_bare_user_id() {
        let event: ServerEvent = serde_json::from_str(
            r#"{"event": "typing_start", "data": {"userId": "u-1", "username": "Alice"}}"#,
        )
        .unwrap();
        if let ServerEvent::TypingStart { user_id, username } = event {
            assert_eq!(user_id.canonical(), "u-1");
            assert_eq!(username, "Alice");
        } else {
            panic!("expected TypingStart");
        }
    }

    #[test]
    fn client_request_join_room_wire_shape() {
        let json = serde_json::to_value(ClientRequest::JoinRoom {
            room_code: "ABCD".into(),
        })
        .unwrap();
        assert_eq!(json["event"], "join_room");
        assert_eq!(json["data"]["roomCode"], "ABCD");
    }

    #[test]
    fn client_request_player_ready_wire_shape() {
        let json = serde_json::to_value(ClientRequest::PlayerReady {
            room_code: "ABCD".into(),
            is_ready: true,
        })
        .unwrap();
        assert_eq!(json["event"], "player_ready");
        assert_eq!(json["data"]["isReady"], true);
    }

    #[test]
    fn client_request_cast_vote_wire_shape() {
        let json = serde_json::to_value(ClientRequest::CastVote {
            game_id: "g-1".into(),
            voted_for_id: "u-2".into(),
        })
        .unwrap();
        assert_eq!(json["event"], "cast_vote");
        assert_eq!(json["data"]["gameId"], "g-1");
        assert_eq!(json["data"]["votedForId"], "u-2");
    }

    #[test]
    fn client_request_send_message_wire_shape() {
        let json = serde_json::to_value(ClientRequest::SendMessage {
            room_code: "ABCD".into(),
            message: "hello".into(),
            message_type: "chat".into(),
        })
        .unwrap();
        assert_eq!(json["event"], "send_message");
        assert_eq!(json["data"]["messageType"], "chat");
    }

    #[test]
    fn category_serializes_lowercase() {
        assert_eq!(serde_json::to_value(Category::Food).unwrap(), "food");
        assert_eq!(serde_json::to_value(Category::Countries).unwrap(), "countries");
    }

    #[test]
    fn category_random_is_in_fixed_set() {
        for _ in 0..32 {
            assert!(Category::ALL.contains(&Category::random()));
        }
    }

    #[test]
    fn event_kind_all_matches_wire_names() {
        assert_eq!(EventKind::ALL.len(), 26);
        assert_eq!(EventKind::GameStateUpdate.as_str(), "game_state_update");
        assert_eq!(EventKind::VoteCasted.to_string(), "vote_casted");
    }
}
