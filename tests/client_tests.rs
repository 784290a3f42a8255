#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
//! End-to-end tests over a scripted transport: the client runs for real, the
//! server side is played by the test through [`common::ServerHandle`].

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::*;
use serde_json::json;
use tokio::sync::mpsc;
use wordspy_client::{
    MemoryStore, NullSound, SnapshotStore, WordSpyClient, WordSpyConfig, WordSpyEvent,
    ROOM_SNAPSHOT_KEY,
};

fn start_client(
    connector: Arc<ScriptedConnector>,
    store: Arc<MemoryStore>,
) -> (WordSpyClient, mpsc::Receiver<WordSpyEvent>) {
    WordSpyClient::start(
        connector,
        store,
        Arc::new(NullSound),
        WordSpyConfig::new("auth-token", "u-local", "Me"),
    )
}

/// Wait for the next event matching `pred`, discarding others.
async fn expect_event(
    events: &mut mpsc::Receiver<WordSpyEvent>,
    pred: impl Fn(&WordSpyEvent) -> bool,
) -> WordSpyEvent {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let event = events.recv().await.expect("event channel closed");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

#[tokio::test]
async fn join_room_full_flow() {
    let (transport, server) = scripted_transport();
    let store = Arc::new(MemoryStore::new());
    let (client, mut events) = start_client(ScriptedConnector::single(transport), store.clone());

    client.join_room("ABCD").await.unwrap();
    expect_event(&mut events, |e| *e == WordSpyEvent::Connected).await;

    let sent = server.sent_frame(|f| f.contains("join_room")).await;
    let parsed: serde_json::Value = serde_json::from_str(&sent).unwrap();
    assert_eq!(parsed["event"], "join_room");
    assert_eq!(parsed["data"]["roomCode"], "ABCD");

    server.push(room_joined("ABCD", &[("u-local", "Me"), ("u-2", "Bob")]));
    expect_event(&mut events, |e| {
        matches!(e, WordSpyEvent::RoomJoined { room_code } if room_code == "ABCD")
    })
    .await;

    let room = client.room().unwrap();
    assert_eq!(room.room_code, "ABCD");
    assert_eq!(room.players.len(), 2);

    // The snapshot is mirrored to storage as it arrives.
    let stored = store.get(ROOM_SNAPSHOT_KEY).unwrap().unwrap();
    assert!(stored.contains("ABCD"));

    // One join_room call, exactly one join frame on the wire.
    assert_eq!(
        server
            .sent
            .lock()
            .unwrap()
            .iter()
            .filter(|f| f.contains("join_room"))
            .count(),
        1
    );

    client.shutdown().await;
    assert!(server.closed.load(Ordering::Relaxed));
}

#[tokio::test]
async fn connector_receives_the_auth_token() {
    let (transport, _server) = scripted_transport();
    let connector = ScriptedConnector::single(transport);
    let (client, _events) = start_client(connector.clone(), Arc::new(MemoryStore::new()));

    client.connect().await.unwrap();
    assert_eq!(
        connector.last_token.lock().unwrap().as_deref(),
        Some("auth-token")
    );
    client.shutdown().await;
}

#[tokio::test]
async fn optimistic_send_reconciles_with_confirmation() {
    let (transport, server) = scripted_transport();
    let (client, mut events) =
        start_client(ScriptedConnector::single(transport), Arc::new(MemoryStore::new()));

    client.join_room("ABCD").await.unwrap();
    server.push(room_joined("ABCD", &[("u-local", "Me")]));
    expect_event(&mut events, |e| matches!(e, WordSpyEvent::RoomJoined { .. })).await;

    let echo = client.send_message("hello there").await.unwrap();
    assert!(echo.pending);
    assert!(echo.id.unwrap().starts_with("temp-"));
    assert_eq!(client.messages().len(), 1);

    let sent = server.sent_frame(|f| f.contains("send_message")).await;
    let parsed: serde_json::Value = serde_json::from_str(&sent).unwrap();
    assert_eq!(parsed["data"]["message"], "hello there");

    server.push(message_received("m-1", "u-local", "Me", "hello there"));
    expect_event(&mut events, |e| {
        matches!(e, WordSpyEvent::MessageReceived { from } if from == "Me")
    })
    .await;

    // The confirmation replaced the echo instead of duplicating it.
    let messages = client.messages();
    assert_eq!(messages.len(), 1);
    assert!(!messages[0].pending);
    assert_eq!(messages[0].id.as_deref(), Some("m-1"));

    client.shutdown().await;
}

#[tokio::test]
async fn duplicate_message_delivery_is_idempotent() {
    let (transport, server) = scripted_transport();
    let (client, mut events) =
        start_client(ScriptedConnector::single(transport), Arc::new(MemoryStore::new()));

    client.connect().await.unwrap();
    server.push(message_received("m-7", "u-2", "Bob", "hi"));
    server.push(message_received("m-7", "u-2", "Bob", "hi"));
    server.push(message_received("m-8", "u-2", "Bob", "again"));
    expect_event(&mut events, |e| {
        matches!(e, WordSpyEvent::MessageReceived { from } if from == "Bob")
    })
    .await;

    // Frames apply in order, so the second event proves both m-7 copies landed.
    expect_event(&mut events, |e| matches!(e, WordSpyEvent::MessageReceived { .. })).await;
    assert_eq!(client.messages().len(), 2);

    client.shutdown().await;
}

#[tokio::test]
async fn bare_roster_notice_triggers_a_state_refresh() {
    let (transport, server) = scripted_transport();
    let (client, mut events) =
        start_client(ScriptedConnector::single(transport), Arc::new(MemoryStore::new()));

    client.join_room("ABCD").await.unwrap();
    server.push(room_joined("ABCD", &[("u-local", "Me")]));
    expect_event(&mut events, |e| matches!(e, WordSpyEvent::RoomJoined { .. })).await;

    // A join notice without an embedded roster must not patch locally.
    server.push(frame("player_joined", json!({ "username": "Bob" })));
    let refresh = server.sent_frame(|f| f.contains("get_room_state")).await;
    let parsed: serde_json::Value = serde_json::from_str(&refresh).unwrap();
    assert_eq!(parsed["data"]["roomCode"], "ABCD");
    assert_eq!(client.room().unwrap().players.len(), 1);

    // The authoritative refresh carries the new roster.
    server.push(room_updated("ABCD", &[("u-local", "Me"), ("u-2", "Bob")]));
    expect_event(&mut events, |e| *e == WordSpyEvent::RoomUpdated).await;
    assert_eq!(client.room().unwrap().players.len(), 2);

    client.shutdown().await;
}

#[tokio::test]
async fn server_disconnect_keeps_state_and_allows_reconnect() {
    let (t1, mut s1) = scripted_transport();
    let (t2, _s2) = scripted_transport();
    let connector = ScriptedConnector::new(vec![Box::new(t1), Box::new(t2)]);
    let (client, mut events) = start_client(connector.clone(), Arc::new(MemoryStore::new()));

    client.join_room("ABCD").await.unwrap();
    s1.push(room_joined("ABCD", &[("u-local", "Me")]));
    expect_event(&mut events, |e| matches!(e, WordSpyEvent::RoomJoined { .. })).await;

    s1.hang_up();
    expect_event(&mut events, |e| matches!(e, WordSpyEvent::Disconnected { .. })).await;
    assert!(!client.is_connected());

    // Local snapshot survives the drop; the server did not confirm a leave.
    assert_eq!(client.room().unwrap().room_code, "ABCD");

    client.connect().await.unwrap();
    expect_event(&mut events, |e| *e == WordSpyEvent::Connected).await;
    assert!(client.is_connected());
    assert_eq!(connector.dials.load(Ordering::Relaxed), 2);

    client.shutdown().await;
}

#[tokio::test]
async fn send_message_while_disconnected_reconnects_once() {
    let (t1, mut s1) = scripted_transport();
    let (t2, s2) = scripted_transport();
    let connector = ScriptedConnector::new(vec![Box::new(t1), Box::new(t2)]);
    let (client, mut events) = start_client(connector.clone(), Arc::new(MemoryStore::new()));

    client.join_room("ABCD").await.unwrap();
    s1.push(room_joined("ABCD", &[("u-local", "Me")]));
    expect_event(&mut events, |e| matches!(e, WordSpyEvent::RoomJoined { .. })).await;

    s1.hang_up();
    expect_event(&mut events, |e| matches!(e, WordSpyEvent::Disconnected { .. })).await;

    let echo = client.send_message("still here").await.unwrap();
    assert!(echo.pending);
    assert!(client.is_connected());
    assert_eq!(connector.dials.load(Ordering::Relaxed), 2);

    // The frame went out on the fresh transport.
    let sent = s2.sent_frame(|f| f.contains("send_message")).await;
    let parsed: serde_json::Value = serde_json::from_str(&sent).unwrap();
    assert_eq!(parsed["data"]["message"], "still here");

    client.shutdown().await;
}

#[tokio::test]
async fn restart_restores_room_from_persisted_snapshot() {
    let store = Arc::new(MemoryStore::new());

    {
        let (transport, server) = scripted_transport();
        let (client, mut events) =
            start_client(ScriptedConnector::single(transport), store.clone());
        client.join_room("ABCD").await.unwrap();
        server.push(room_joined("ABCD", &[("u-local", "Me")]));
        expect_event(&mut events, |e| matches!(e, WordSpyEvent::RoomJoined { .. })).await;
        client.shutdown().await;
    }

    // Fresh client over the same store, before any connection is made.
    let (transport, _server) = scripted_transport();
    let (client, _events) = start_client(ScriptedConnector::single(transport), store);
    assert!(!client.is_connected());
    assert_eq!(client.room().unwrap().room_code, "ABCD");
}

#[tokio::test]
async fn leave_room_clears_state_and_snapshot_on_confirmation() {
    let (transport, server) = scripted_transport();
    let store = Arc::new(MemoryStore::new());
    let (client, mut events) = start_client(ScriptedConnector::single(transport), store.clone());

    client.join_room("ABCD").await.unwrap();
    server.push(room_joined("ABCD", &[("u-local", "Me")]));
    expect_event(&mut events, |e| matches!(e, WordSpyEvent::RoomJoined { .. })).await;

    client.leave_room().unwrap();
    server.sent_frame(|f| f.contains("leave_room")).await;

    // State holds until the server confirms.
    assert!(client.room().is_some());

    server.push(frame("room_left", json!({})));
    expect_event(&mut events, |e| *e == WordSpyEvent::RoomLeft).await;
    assert!(client.room().is_none());
    assert!(store.get(ROOM_SNAPSHOT_KEY).unwrap().is_none());

    client.shutdown().await;
}

#[tokio::test]
async fn toggle_ready_requests_ready_when_absent_from_roster() {
    let (transport, server) = scripted_transport();
    let (client, mut events) =
        start_client(ScriptedConnector::single(transport), Arc::new(MemoryStore::new()));

    // Roster does not (yet) contain the local player.
    client.join_room("ABCD").await.unwrap();
    server.push(room_joined("ABCD", &[("u-2", "Bob")]));
    expect_event(&mut events, |e| matches!(e, WordSpyEvent::RoomJoined { .. })).await;

    client.toggle_ready().unwrap();
    let sent = server.sent_frame(|f| f.contains("player_ready")).await;
    let parsed: serde_json::Value = serde_json::from_str(&sent).unwrap();
    assert_eq!(parsed["data"]["roomCode"], "ABCD");
    assert_eq!(parsed["data"]["isReady"], true);

    client.shutdown().await;
}

#[tokio::test]
async fn typing_events_maintain_the_roster() {
    let (transport, server) = scripted_transport();
    let (client, mut events) =
        start_client(ScriptedConnector::single(transport), Arc::new(MemoryStore::new()));

    client.connect().await.unwrap();

    server.push(frame(
        "typing_start",
        json!({ "userId": "u-2", "username": "Bob" }),
    ));
    expect_event(&mut events, |e| *e == WordSpyEvent::TypingChanged).await;
    assert_eq!(client.typing_users(), vec!["Bob"]);

    // The client's own typing echo never appears.
    server.push(frame(
        "typing_start",
        json!({ "userId": "u-local", "username": "Me" }),
    ));

    server.push(frame(
        "typing_stop",
        json!({ "userId": "u-2", "username": "Bob" }),
    ));
    expect_event(&mut events, |e| *e == WordSpyEvent::TypingChanged).await;
    assert!(client.typing_users().is_empty());

    client.shutdown().await;
}

#[tokio::test]
async fn server_rejection_surfaces_without_clearing_state() {
    let (transport, server) = scripted_transport();
    let (client, mut events) =
        start_client(ScriptedConnector::single(transport), Arc::new(MemoryStore::new()));

    client.join_room("ABCD").await.unwrap();
    server.push(room_joined("ABCD", &[("u-local", "Me")]));
    expect_event(&mut events, |e| matches!(e, WordSpyEvent::RoomJoined { .. })).await;

    server.push(frame("room_error", json!({ "message": "room is full" })));
    let event = expect_event(&mut events, |e| matches!(e, WordSpyEvent::Rejected { .. })).await;
    assert_eq!(
        event,
        WordSpyEvent::Rejected {
            message: "room is full".into()
        }
    );
    assert!(client.room().is_some());

    client.shutdown().await;
}

#[tokio::test]
async fn malformed_frames_are_skipped_not_fatal() {
    let (transport, server) = scripted_transport();
    let (client, mut events) =
        start_client(ScriptedConnector::single(transport), Arc::new(MemoryStore::new()));

    client.connect().await.unwrap();
    server.push("{not json at all".to_string());
    server.push(frame("unknown_event_kind", json!({})));
    server.push(room_joined("ABCD", &[("u-local", "Me")]));

    expect_event(&mut events, |e| matches!(e, WordSpyEvent::RoomJoined { .. })).await;
    assert!(client.is_connected());

    client.shutdown().await;
}

#[tokio::test]
async fn game_flow_updates_snapshot_wholesale() {
    let (transport, server) = scripted_transport();
    let (client, mut events) =
        start_client(ScriptedConnector::single(transport), Arc::new(MemoryStore::new()));

    client.join_room("ABCD").await.unwrap();
    server.push(room_joined("ABCD", &[("u-local", "Me")]));
    expect_event(&mut events, |e| matches!(e, WordSpyEvent::RoomJoined { .. })).await;

    client.start_game(None).unwrap();
    let sent = server.sent_frame(|f| f.contains("game_start")).await;
    let parsed: serde_json::Value = serde_json::from_str(&sent).unwrap();
    assert_eq!(parsed["data"]["roomCode"], "ABCD");
    assert!(parsed["data"]["category"].is_string());

    server.push(game_start("g-1", "id-ABCD"));
    expect_event(&mut events, |e| *e == WordSpyEvent::GameUpdated).await;
    assert_eq!(client.game().unwrap().game_id, "g-1");

    client.submit_clue("it flies").unwrap();
    let clue = server.sent_frame(|f| f.contains("submit_clue")).await;
    let parsed: serde_json::Value = serde_json::from_str(&clue).unwrap();
    assert_eq!(parsed["data"]["gameId"], "g-1");
    assert_eq!(parsed["data"]["clue"], "it flies");

    client.shutdown().await;
}

#[tokio::test]
async fn transport_error_ends_the_connection() {
    let (transport, server) = scripted_transport();
    let (client, mut events) =
        start_client(ScriptedConnector::single(transport), Arc::new(MemoryStore::new()));

    client.connect().await.unwrap();
    server.push_error("connection reset");

    let event =
        expect_event(&mut events, |e| matches!(e, WordSpyEvent::Disconnected { .. })).await;
    match event {
        WordSpyEvent::Disconnected { reason } => {
            assert!(reason.unwrap().contains("connection reset"));
        }
        _ => unreachable!(),
    }
    assert!(!client.is_connected());
}
