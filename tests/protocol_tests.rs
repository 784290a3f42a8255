#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
//! Wire-format tests against raw JSON frames as the server actually emits
//! them, including the irregular shapes (dual-form ids, missing optional
//! fields, unknown phases) a live server produces.

use serde_json::json;
use wordspy_client::{
    Category, ChatMessage, ClientRequest, GamePhase, RoomStatus, ServerEvent, UserRef,
};

fn parse(frame: serde_json::Value) -> ServerEvent {
    serde_json::from_value(frame).unwrap()
}

#[test]
fn room_joined_frame_parses_with_mixed_player_id_shapes() {
    let event = parse(json!({
        "event": "room_joined",
        "data": {
            "room": {
                "roomCode": "ABCD",
                "roomId": "64fe0a",
                "status": "lobby",
                "players": [
                    { "userId": "u-1", "username": "Alice", "isReady": true },
                    { "userId": { "_id": "u-2", "username": "Bob" }, "username": "Bob" },
                ],
            }
        }
    }));

    let ServerEvent::RoomJoined { room } = event else {
        panic!("wrong variant");
    };
    assert_eq!(room.status, RoomStatus::Lobby);
    assert_eq!(room.players[0].user_id.canonical(), "u-1");
    assert!(room.players[0].is_ready);
    assert_eq!(room.players[1].user_id.canonical(), "u-2");
    assert!(!room.players[1].is_ready);
    assert!(room.players[0].user_id.same_user(&UserRef::from("u-1")));
}

#[test]
fn game_frame_preserves_unknown_phase_and_extra_fields() {
    let event = parse(json!({
        "event": "game_state_update",
        "data": {
            "game": {
                "gameId": "g-1",
                "roomId": "64fe0a",
                "phase": "tiebreak",
                "round": 2,
                "secretWord": "penguin",
                "spyId": "u-2",
            }
        }
    }));

    let ServerEvent::GameStateUpdate { game } = event else {
        panic!("wrong variant");
    };
    assert_eq!(game.phase, GamePhase::Other("tiebreak".to_string()));
    assert_eq!(game.round, Some(2));
    assert_eq!(game.extra["secretWord"], "penguin");

    // Unknown fields survive a serialize round through the client.
    let back = serde_json::to_value(&game).unwrap();
    assert_eq!(back["spyId"], "u-2");
    assert_eq!(back["phase"], "tiebreak");
}

#[test]
fn phase_event_data_may_omit_the_game_object() {
    let event = parse(json!({ "event": "clue_phase_start", "data": {} }));
    assert!(matches!(event, ServerEvent::CluePhaseStart { game: None }));

    let event = parse(json!({
        "event": "voting_phase_start",
        "data": { "game": { "gameId": "g-1", "roomId": "r-1", "phase": "voting" } }
    }));
    let ServerEvent::VotingPhaseStart { game: Some(game) } = event else {
        panic!("wrong variant");
    };
    assert_eq!(game.phase, GamePhase::Voting);
}

#[test]
fn minimal_chat_message_fills_defaults() {
    let message: ChatMessage = serde_json::from_value(json!({
        "sender": { "userId": "u-1" },
        "message": "hello",
    }))
    .unwrap();

    assert!(message.id.is_none());
    assert_eq!(message.sender.username, "");
    assert_eq!(message.message_type, "chat");
    assert!(message.created_at.is_none());
    assert!(!message.pending);
}

#[test]
fn message_received_frame_parses_timestamps() {
    let event = parse(json!({
        "event": "message_received",
        "data": {
            "message": {
                "_id": "m-1",
                "sender": { "userId": "u-1", "username": "Alice" },
                "message": "hi",
                "messageType": "chat",
                "createdAt": "2026-03-01T12:30:00Z",
            }
        }
    }));

    let ServerEvent::MessageReceived { message } = event else {
        panic!("wrong variant");
    };
    let created = message.created_at.unwrap();
    assert_eq!(created.to_rfc3339(), "2026-03-01T12:30:00+00:00");
}

#[test]
fn typing_frames_parse_with_and_without_user_id() {
    let event = parse(json!({
        "event": "typing_start",
        "data": { "userId": { "_id": "u-1" }, "username": "Alice" }
    }));
    let ServerEvent::TypingStart { user_id, username } = event else {
        panic!("wrong variant");
    };
    assert_eq!(user_id.canonical(), "u-1");
    assert_eq!(username, "Alice");

    let event = parse(json!({
        "event": "typing_stop",
        "data": { "username": "Alice" }
    }));
    assert!(matches!(
        event,
        ServerEvent::TypingStop { user_id: None, .. }
    ));
}

#[test]
fn client_requests_serialize_to_the_server_envelope() {
    let frame = serde_json::to_value(ClientRequest::JoinRoom {
        room_code: "ABCD".into(),
    })
    .unwrap();
    assert_eq!(frame, json!({ "event": "join_room", "data": { "roomCode": "ABCD" } }));

    let frame = serde_json::to_value(ClientRequest::GameStart {
        room_code: "ABCD".into(),
        category: Category::Animals,
    })
    .unwrap();
    assert_eq!(
        frame,
        json!({ "event": "game_start", "data": { "roomCode": "ABCD", "category": "animals" } })
    );

    let frame = serde_json::to_value(ClientRequest::CastVote {
        game_id: "g-1".into(),
        voted_for_id: "u-2".into(),
    })
    .unwrap();
    assert_eq!(
        frame,
        json!({ "event": "cast_vote", "data": { "gameId": "g-1", "votedForId": "u-2" } })
    );
}

#[test]
fn room_left_frame_parses_with_empty_data() {
    let event = parse(json!({ "event": "room_left", "data": {} }));
    assert!(matches!(event, ServerEvent::RoomLeft {}));
}

#[test]
fn unknown_event_kind_is_a_deserialize_error() {
    let result = serde_json::from_value::<ServerEvent>(json!({
        "event": "brand_new_thing",
        "data": {}
    }));
    assert!(result.is_err());
}

