#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Wire contract tests for the Shadow Signal client.
//!
//! Checks request payloads, ack decoding and room snapshots against JSON
//! fixtures shaped like real game server output.

use serde_json::json;
use shadow_signal_client::codec::{Frame, Packet};
use shadow_signal_client::protocol::{
    Ack, ClientEvent, GameMode, Room, RoomStatus, ServerEvent, SERVER_EVENT_NAMES,
};
use shadow_signal_client::ShadowSignalError;

// ════════════════════════════════════════════════════════════════════
// Fixtures
// ════════════════════════════════════════════════════════════════════

fn speaking_room() -> serde_json::Value {
    json!({
        "code": "QX7P",
        "mode": "spy",
        "status": "speaking",
        "players": [
            { "id": "a1", "name": "Ada", "role": "civilian", "word": "piano",
              "isAlive": true, "hasSpoken": true },
            { "id": "b2", "name": "Bo", "role": "spy", "word": "guitar",
              "isAlive": true, "hasSpoken": false },
            { "id": "c3", "name": "Cy", "role": "civilian", "word": "piano",
              "isAlive": false, "hasSpoken": false }
        ],
        "currentSpeaker": 1,
        "speakerTimeLeft": 27
    })
}

// ════════════════════════════════════════════════════════════════════
// Client requests
// ════════════════════════════════════════════════════════════════════

#[test]
fn client_event_payloads_match_server_contract() {
    assert_eq!(ClientEvent::CreateRoom.name(), "create-room");
    assert!(ClientEvent::CreateRoom.args().unwrap().is_empty());

    let join = ClientEvent::JoinRoom {
        code: "QX7P".into(),
        name: "Ada".into(),
    };
    assert_eq!(join.args().unwrap(), vec![json!({"code": "QX7P", "name": "Ada"})]);

    let start = ClientEvent::StartGame {
        code: "QX7P".into(),
        mode: GameMode::Infiltrator,
    };
    assert_eq!(start.name(), "start-game");
    assert_eq!(
        start.args().unwrap(),
        vec![json!({"code": "QX7P", "mode": "infiltrator"})]
    );

    let vote = ClientEvent::SubmitVote {
        code: "QX7P".into(),
        voted_for_id: "b2".into(),
    };
    assert_eq!(
        vote.args().unwrap(),
        vec![json!({"code": "QX7P", "votedForId": "b2"})]
    );
}

#[test]
fn join_request_frame_is_socketio_event_with_ack_id() {
    let join = ClientEvent::JoinRoom {
        code: "QX7P".into(),
        name: "Ada".into(),
    };
    let frame = Frame::Message(Packet::Event {
        id: Some(3),
        name: join.name().into(),
        args: join.args().unwrap(),
    });
    assert_eq!(
        frame.encode().unwrap(),
        r#"423["join-room",{"code":"QX7P","name":"Ada"}]"#
    );
}

// ════════════════════════════════════════════════════════════════════
// Acknowledgments
// ════════════════════════════════════════════════════════════════════

#[test]
fn successful_ack_exposes_room() {
    let ack = Ack::from_args(vec![json!({ "success": true, "room": speaking_room() })]);
    assert!(ack.rejection().is_none());
    let room = ack.room().unwrap().unwrap();
    assert_eq!(room.code, "QX7P");
    assert_eq!(room.players.len(), 3);
    assert!(ack.into_result().is_ok());
}

#[test]
fn create_room_ack_carries_code_inside_room() {
    let ack = Ack::from_args(vec![json!({
        "success": true,
        "room": { "code": "AB12", "players": [] }
    })]);
    assert_eq!(ack.room_code(), Some("AB12"));
    assert!(ack.field::<String>("code").is_none());
    assert_eq!(ack.room().unwrap().unwrap().code, "AB12");

    let rejected = Ack::from_args(vec![json!({ "success": false, "error": "Server full" })]);
    assert_eq!(rejected.room_code(), None);
}

#[test]
fn rejected_ack_is_passed_through() {
    let ack = Ack::from_args(vec![json!({ "success": false, "error": "Room not found" })]);
    assert_eq!(ack.rejection(), Some("Room not found"));
    assert!(ack.room().is_none());

    let err = ack.into_result().unwrap_err();
    assert!(matches!(err, ShadowSignalError::Rejected { ref message } if message == "Room not found"));
    assert_eq!(err.to_string(), "Room not found");
}

#[test]
fn malformed_ack_becomes_failure_with_raw_args() {
    let ack = Ack::from_args(vec![json!("ok"), json!(1)]);
    assert!(!ack.success);
    assert_eq!(ack.data["args"], json!(["ok", 1]));

    let empty = Ack::from_args(vec![]);
    assert_eq!(empty.rejection(), Some("unexpected acknowledgment shape"));
}

#[test]
fn ack_without_error_message_still_rejects() {
    let ack = Ack::from_args(vec![json!({ "success": false })]);
    assert_eq!(ack.rejection(), Some("request rejected"));
}

// ════════════════════════════════════════════════════════════════════
// Server pushes
// ════════════════════════════════════════════════════════════════════

#[test]
fn room_snapshot_decodes_game_state() {
    let room: Room = serde_json::from_value(speaking_room()).unwrap();
    assert_eq!(room.mode, Some(GameMode::Spy));
    assert_eq!(room.status, RoomStatus::Speaking);
    assert_eq!(room.speaker().unwrap().name, "Bo");
    assert_eq!(room.speaker_time_left, 27);
    assert_eq!(room.alive_players().count(), 2);
    assert_eq!(room.winner, None);
}

#[test]
fn lobby_snapshot_uses_defaults() {
    let room: Room = serde_json::from_value(json!({
        "code": "QX7P",
        "players": [{ "id": "a1", "name": "Ada" }]
    }))
    .unwrap();
    assert_eq!(room.status, RoomStatus::Waiting);
    assert!(room.players[0].is_alive);
    assert!(room.players[0].role.is_empty());
    assert!(room.speaker().is_some());
}

#[test]
fn unknown_room_status_is_preserved() {
    let room: Room = serde_json::from_value(json!({ "code": "QX7P", "status": "paused" })).unwrap();
    assert_eq!(room.status, RoomStatus::Other("paused".into()));
}

#[test]
fn ended_room_carries_winner() {
    let room: Room = serde_json::from_value(json!({
        "code": "QX7P", "status": "ended", "winner": "civilians"
    }))
    .unwrap();
    assert_eq!(room.status, RoomStatus::Ended);
    assert_eq!(room.winner.as_deref(), Some("civilians"));
}

#[test]
fn server_events_decode_by_name() {
    for name in SERVER_EVENT_NAMES {
        let args = if name == "timer-tick" {
            vec![json!(9)]
        } else {
            vec![speaking_room()]
        };
        let event = ServerEvent::decode(name, &args).unwrap().unwrap();
        assert_eq!(event.name(), name);
    }

    assert!(ServerEvent::decode("chat-message", &[json!("hi")]).is_none());
    assert!(matches!(
        ServerEvent::decode("timer-tick", &[]),
        Some(Err(ShadowSignalError::Serialization(_)))
    ));
}

#[test]
fn pushed_frame_decodes_to_server_event() {
    let text = format!(r#"42["vote-submitted",{}]"#, speaking_room());
    let Frame::Message(Packet::Event { name, args, .. }) = Frame::decode(&text).unwrap() else {
        panic!("expected event frame");
    };
    let event = ServerEvent::decode(&name, &args).unwrap().unwrap();
    assert!(matches!(event, ServerEvent::VoteSubmitted(room) if room.code == "QX7P"));
}
