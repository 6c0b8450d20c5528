#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Integration tests for the Room Session state machine.
//!
//! Scripts server behavior through the shared `MockDialer` and verifies
//! state transitions, wire messages, and the domain event stream.

mod common;

use std::time::Duration;

use snake_arena_client::connection::Connection;
use snake_arena_client::protocol::{ClientMessage, Dir};
use snake_arena_client::room::RoomSession;
use snake_arena_client::{ArenaError, ArenaEvent, ConnectConfig, RoomConfig};

use common::{
    ate_json, handshake_json, join_failed_json, joined_json, players_update_json,
    round_end_json, round_starting_json, server_error_json, state_json, stroke_end_json,
    stroke_start_json, MockDialer, TransportScript,
};

// ════════════════════════════════════════════════════════════════════
// Helpers
// ════════════════════════════════════════════════════════════════════

fn fast_connect_config() -> ConnectConfig {
    ConnectConfig::new()
        .with_reconnect_delay(Duration::from_millis(10))
        .with_reconnect_attempts(1)
        .with_handshake_timeout(Duration::from_millis(200))
        .with_shutdown_timeout(Duration::from_millis(200))
}

fn fast_room_config() -> RoomConfig {
    RoomConfig::new().with_join_timeout(Duration::from_millis(200))
}

/// Start a session over a single scripted transport lifetime.
#[allow(clippy::type_complexity)]
fn start_session(
    script: TransportScript,
) -> (
    RoomSession,
    tokio::sync::mpsc::Receiver<ArenaEvent>,
    std::sync::Arc<std::sync::Mutex<Vec<String>>>,
) {
    let (dialer, sent) = MockDialer::new(vec![Some(script)]);
    let (conn, transport_rx) = Connection::new(dialer, fast_connect_config());
    let (session, events) = RoomSession::start(conn, transport_rx, fast_room_config());
    (session, events, sent)
}

/// Receive events until one matches, with a deadline. Panics on timeout.
async fn recv_until(
    events: &mut tokio::sync::mpsc::Receiver<ArenaEvent>,
    mut pred: impl FnMut(&ArenaEvent) -> bool,
) -> ArenaEvent {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let ev = events.recv().await.expect("event stream ended");
            if pred(&ev) {
                return ev;
            }
        }
    })
    .await
    .expect("expected event did not arrive")
}

fn sent_wire_messages(sent: &std::sync::Arc<std::sync::Mutex<Vec<String>>>) -> Vec<ClientMessage> {
    sent.lock()
        .unwrap()
        .iter()
        .map(|raw| serde_json::from_str(raw).expect("parse sent message"))
        .collect()
}

// ════════════════════════════════════════════════════════════════════
// create_room
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn create_room_resolves_once_joined_arrives() {
    let (mut session, mut events, sent) = start_session(vec![
        Some(Ok(handshake_json("me"))),
        Some(Ok(joined_json("AB12CD", &["me-0"], true))),
    ]);

    session.connect().await.unwrap();
    let code = session.create_room("Ada", None, 1).await.unwrap();
    assert_eq!(code, "AB12CD");
    assert_eq!(session.room_code().as_deref(), Some("AB12CD"));
    assert!(session.is_host());
    assert_eq!(session.my_player_id(0).as_deref(), Some("me-0"));

    let ev = recv_until(&mut events, |ev| matches!(ev, ArenaEvent::Joined { .. })).await;
    if let ArenaEvent::Joined {
        room_code,
        own_players,
        is_host,
    } = ev
    {
        assert_eq!(room_code, "AB12CD");
        assert_eq!(own_players.len(), 1);
        assert!(is_host);
    }

    // The wire carried a create_room with our nickname and count.
    let msgs = sent_wire_messages(&sent);
    assert!(matches!(
        &msgs[0],
        ClientMessage::CreateRoom { nickname, local_count, .. }
            if nickname == "Ada" && *local_count == 1
    ));

    session.disconnect().await;
}

#[tokio::test]
async fn create_room_uses_explicit_code_uppercased() {
    let (mut session, _events, sent) = start_session(vec![Some(Ok(handshake_json("me")))]);
    session.connect().await.unwrap();

    // No joined scripted: the call times out, but the request went out
    // with the canonicalized explicit code.
    let err = session
        .create_room("Ada", Some("ab12cd".into()), 2)
        .await
        .unwrap_err();
    assert!(matches!(err, ArenaError::JoinTimeout));

    let msgs = sent_wire_messages(&sent);
    assert!(matches!(
        &msgs[0],
        ClientMessage::CreateRoom { room, local_count, .. }
            if room == "AB12CD" && *local_count == 2
    ));

    session.disconnect().await;
}

#[tokio::test]
async fn create_room_generates_base36_code_when_none_given() {
    let (mut session, _events, sent) = start_session(vec![Some(Ok(handshake_json("me")))]);
    session.connect().await.unwrap();

    let _ = session.create_room("Ada", None, 1).await;

    let msgs = sent_wire_messages(&sent);
    if let ClientMessage::CreateRoom { room, .. } = &msgs[0] {
        assert_eq!(room.len(), 6);
        assert!(room
            .bytes()
            .all(|b| b.is_ascii_digit() || b.is_ascii_uppercase()));
    } else {
        panic!("expected CreateRoom, got {:?}", msgs[0]);
    }

    session.disconnect().await;
}

#[tokio::test]
async fn create_room_without_connection_is_rejected() {
    let (dialer, sent) = MockDialer::new(vec![]);
    let (conn, transport_rx) = Connection::new(dialer, fast_connect_config());
    let (mut session, _events) = RoomSession::start(conn, transport_rx, fast_room_config());

    let err = session.create_room("Ada", None, 1).await.unwrap_err();
    assert!(matches!(err, ArenaError::NotConnected));
    assert!(sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn create_room_times_out_within_the_window() {
    let (mut session, _events, _sent) = start_session(vec![Some(Ok(handshake_json("me")))]);
    session.connect().await.unwrap();

    let started = std::time::Instant::now();
    let err = session.create_room("Ada", None, 1).await.unwrap_err();
    assert!(matches!(err, ArenaError::JoinTimeout));
    assert!(started.elapsed() < Duration::from_secs(1));

    session.disconnect().await;
}

#[tokio::test]
async fn join_failed_surfaces_reason_without_state_change() {
    let (mut session, mut events, _sent) = start_session(vec![
        Some(Ok(handshake_json("me"))),
        Some(Ok(join_failed_json("room is full"))),
    ]);
    session.connect().await.unwrap();

    let ev = recv_until(&mut events, |ev| matches!(ev, ArenaEvent::JoinFailed { .. })).await;
    if let ArenaEvent::JoinFailed { reason } = ev {
        assert_eq!(reason, "room is full");
    }
    assert!(session.room_code().is_none());
    assert!(!session.is_host());

    session.disconnect().await;
}

// ════════════════════════════════════════════════════════════════════
// Host determination
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn host_flag_is_rederived_on_every_players_update() {
    let (mut session, mut events, _sent) = start_session(vec![
        Some(Ok(handshake_json("me"))),
        Some(Ok(joined_json("AB12CD", &["me-0"], false))),
        Some(Ok(players_update_json(
            &[("me-0", "Ada", "me"), ("peer-0", "Eve", "peer")],
            "me",
        ))),
        Some(Ok(players_update_json(
            &[("peer-0", "Eve", "peer")],
            "peer",
        ))),
    ]);
    session.connect().await.unwrap();

    let ev = recv_until(&mut events, |ev| {
        matches!(ev, ArenaEvent::PlayersUpdate { is_host: true, .. })
    })
    .await;
    if let ArenaEvent::PlayersUpdate { players, .. } = ev {
        assert_eq!(players.len(), 2);
        assert_eq!(players[0].nickname, "Ada");
    }

    // Host migrated away: the very next update flips the flag.
    let _ = recv_until(&mut events, |ev| {
        matches!(ev, ArenaEvent::PlayersUpdate { is_host: false, .. })
    })
    .await;
    assert!(!session.is_host());
    assert_eq!(session.members().len(), 1);

    session.disconnect().await;
}

// ════════════════════════════════════════════════════════════════════
// start_round
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn start_round_as_non_host_sends_nothing() {
    let (mut session, mut events, sent) = start_session(vec![
        Some(Ok(handshake_json("me"))),
        Some(Ok(joined_json("AB12CD", &["me-0"], false))),
    ]);
    session.connect().await.unwrap();
    let _ = recv_until(&mut events, |ev| matches!(ev, ArenaEvent::Joined { .. })).await;

    let err = session.start_round().unwrap_err();
    assert!(matches!(err, ArenaError::NotHost));
    assert!(sent.lock().unwrap().is_empty());

    session.disconnect().await;
}

#[tokio::test]
async fn start_round_as_host_emits_scoped_request() {
    let (mut session, mut events, sent) = start_session(vec![
        Some(Ok(handshake_json("me"))),
        Some(Ok(joined_json("AB12CD", &["me-0"], true))),
    ]);
    session.connect().await.unwrap();
    let _ = recv_until(&mut events, |ev| matches!(ev, ArenaEvent::Joined { .. })).await;

    session.start_round().unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let msgs = sent_wire_messages(&sent);
    assert!(msgs
        .iter()
        .any(|m| matches!(m, ClientMessage::StartRound { room } if room == "AB12CD")));

    session.disconnect().await;
}

// ════════════════════════════════════════════════════════════════════
// send_direction
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn send_direction_before_connection_is_silently_dropped() {
    let (dialer, sent) = MockDialer::new(vec![]);
    let (conn, transport_rx) = Connection::new(dialer, fast_connect_config());
    let (session, _events) = RoomSession::start(conn, transport_rx, fast_room_config());

    // Must not panic and must not emit a wire message.
    session.send_direction("anyone", Dir::UP);
    assert!(sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn send_direction_outside_a_room_is_silently_dropped() {
    let (mut session, _events, sent) = start_session(vec![Some(Ok(handshake_json("me")))]);
    session.connect().await.unwrap();

    session.send_direction("me-0", Dir::LEFT);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(sent.lock().unwrap().is_empty());

    session.disconnect().await;
}

#[tokio::test]
async fn send_direction_in_room_emits_input_dir() {
    let (mut session, mut events, sent) = start_session(vec![
        Some(Ok(handshake_json("me"))),
        Some(Ok(joined_json("AB12CD", &["me-0", "me-1"], true))),
    ]);
    session.connect().await.unwrap();
    let _ = recv_until(&mut events, |ev| matches!(ev, ArenaEvent::Joined { .. })).await;

    let second_player = session.my_player_id(1).unwrap();
    session.send_direction(&second_player, Dir::DOWN);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let msgs = sent_wire_messages(&sent);
    assert!(msgs.iter().any(|m| matches!(
        m,
        ClientMessage::InputDir { room, player_id, dir }
            if room == "AB12CD" && player_id == "me-1" && *dir == Dir::DOWN
    )));

    session.disconnect().await;
}

// ════════════════════════════════════════════════════════════════════
// Round flow and forwarded events
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn round_events_arrive_in_wire_order() {
    let (mut session, mut events, _sent) = start_session(vec![
        Some(Ok(handshake_json("me"))),
        Some(Ok(joined_json("AB12CD", &["me-0"], true))),
        Some(Ok(round_starting_json())),
        Some(Ok(common::round_started_json())),
        Some(Ok(state_json(
            60,
            30,
            vec![common::snapshot_player("me-0", &[(5, 5)])],
            &[(10, 10)],
        ))),
        Some(Ok(ate_json("me-0", 10, 10, "hsla(140,100%,40%,1)"))),
        Some(Ok(round_end_json(
            &[("me-0", "Ada", 40)],
            &["Ada"],
            Some(&[("Ada", 3)]),
        ))),
    ]);
    session.connect().await.unwrap();

    let mut kinds = Vec::new();
    for _ in 0..7 {
        let ev = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("event timed out")
            .expect("event stream ended");
        kinds.push(std::mem::discriminant(&ev));
        match &ev {
            ArenaEvent::State(snapshot) => {
                assert_eq!(snapshot.grid_w, 60);
                assert_eq!(snapshot.players[0].score, 0);
            }
            ArenaEvent::Ate { pos, color } => {
                assert_eq!((pos.x, pos.y), (10, 10));
                assert_eq!(color, "hsla(140,100%,40%,1)");
            }
            ArenaEvent::RoundEnd { scores, winners, wins } => {
                assert_eq!(scores["me-0"].score, 40);
                assert_eq!(winners[0].nickname, "Ada");
                assert_eq!(wins.as_ref().unwrap()["Ada"], 3);
            }
            _ => {}
        }
    }
    // All seven event kinds are distinct and ordered as sent.
    assert_eq!(kinds.len(), 7);
    assert!(kinds.windows(2).all(|w| w[0] != w[1]));

    session.disconnect().await;
}

#[tokio::test]
async fn stroke_events_are_forwarded_keyed_by_player() {
    let (mut session, mut events, _sent) = start_session(vec![
        Some(Ok(handshake_json("me"))),
        Some(Ok(stroke_start_json("me-0", 4.5))),
        Some(Ok(stroke_end_json("me-0"))),
    ]);
    session.connect().await.unwrap();

    let ev = recv_until(&mut events, |ev| matches!(ev, ArenaEvent::StrokeStart { .. })).await;
    if let ArenaEvent::StrokeStart {
        player_id,
        duration,
    } = ev
    {
        assert_eq!(player_id, "me-0");
        assert!((duration - 4.5).abs() < f64::EPSILON);
    }

    let ev = recv_until(&mut events, |ev| matches!(ev, ArenaEvent::StrokeEnd { .. })).await;
    assert!(matches!(ev, ArenaEvent::StrokeEnd { player_id } if player_id == "me-0"));

    session.disconnect().await;
}

#[tokio::test]
async fn server_error_is_surfaced_as_event() {
    let (mut session, mut events, _sent) = start_session(vec![
        Some(Ok(handshake_json("me"))),
        Some(Ok(server_error_json("room not found"))),
    ]);
    session.connect().await.unwrap();

    let ev = recv_until(&mut events, |ev| matches!(ev, ArenaEvent::ServerError { .. })).await;
    assert!(matches!(ev, ArenaEvent::ServerError { message } if message == "room not found"));

    session.disconnect().await;
}

// ════════════════════════════════════════════════════════════════════
// Disconnect semantics
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn disconnect_destroys_the_room() {
    let (mut session, mut events, _sent) = start_session(vec![
        Some(Ok(handshake_json("me"))),
        Some(Ok(joined_json("AB12CD", &["me-0"], true))),
    ]);
    session.connect().await.unwrap();
    let _ = recv_until(&mut events, |ev| matches!(ev, ArenaEvent::Joined { .. })).await;

    session.disconnect().await;

    assert!(!session.is_connected());
    assert!(session.room_code().is_none());
    assert!(!session.is_host());
    assert!(session.my_players().is_empty());
    assert!(session.members().is_empty());

    let _ = recv_until(&mut events, |ev| matches!(ev, ArenaEvent::Disconnected { .. })).await;
}

#[tokio::test]
async fn transport_drop_clears_room_and_emits_disconnected() {
    // Single reconnect attempt is scripted to fail, so the drop is final.
    let (dialer, _sent) = MockDialer::new(vec![
        Some(vec![
            Some(Ok(handshake_json("me"))),
            Some(Ok(joined_json("AB12CD", &["me-0"], true))),
            None,
        ]),
        None,
    ]);
    let (conn, transport_rx) = Connection::new(dialer, fast_connect_config());
    let (mut session, mut events) = RoomSession::start(conn, transport_rx, fast_room_config());
    session.connect().await.unwrap();

    let _ = recv_until(&mut events, |ev| matches!(ev, ArenaEvent::Joined { .. })).await;
    let _ = recv_until(&mut events, |ev| matches!(ev, ArenaEvent::Disconnected { .. })).await;

    assert!(session.room_code().is_none());
    assert!(!session.is_host());
}

#[tokio::test]
async fn silent_reconnect_reports_fresh_connection_id() {
    let (dialer, _sent) = MockDialer::new(vec![
        Some(vec![Some(Ok(handshake_json("first"))), None]),
        Some(vec![Some(Ok(handshake_json("second")))]),
    ]);
    let (conn, transport_rx) = Connection::new(
        dialer,
        fast_connect_config().with_reconnect_attempts(2),
    );
    let (mut session, mut events) = RoomSession::start(conn, transport_rx, fast_room_config());
    session.connect().await.unwrap();

    let _ = recv_until(&mut events, |ev| {
        matches!(ev, ArenaEvent::Connected { connection_id } if connection_id == "first")
    })
    .await;
    let _ = recv_until(&mut events, |ev| matches!(ev, ArenaEvent::Disconnected { .. })).await;
    let _ = recv_until(&mut events, |ev| {
        matches!(ev, ArenaEvent::Connected { connection_id } if connection_id == "second")
    })
    .await;

    assert!(session.is_connected());
    assert_eq!(session.connection_id().as_deref(), Some("second"));

    session.disconnect().await;
}
