#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Integration tests for the `ArenaClient` facade: event-driven renderer
//! side effects, the input contract, and win-tally persistence.

mod common;

use std::time::Duration;

use snake_arena_client::protocol::Dir;
use snake_arena_client::storage::Storage;
use snake_arena_client::{ArenaClient, ArenaEvent, ClientConfig, ConnectConfig, RoomConfig};

use common::{
    ate_json, handshake_json, joined_json, players_update_json, round_end_json,
    round_starting_json, state_json, DrawOp, MockDialer, RecordingSurface, TransportScript,
};

// ════════════════════════════════════════════════════════════════════
// Helpers
// ════════════════════════════════════════════════════════════════════

fn fast_config() -> ClientConfig {
    ClientConfig {
        connect: ConnectConfig::new()
            .with_reconnect_delay(Duration::from_millis(10))
            .with_reconnect_attempts(1)
            .with_handshake_timeout(Duration::from_millis(200))
            .with_shutdown_timeout(Duration::from_millis(200)),
        room: RoomConfig::new().with_join_timeout(Duration::from_millis(200)),
        ..ClientConfig::default()
    }
}

#[allow(clippy::type_complexity)]
fn start_client(
    script: TransportScript,
    tag: &str,
) -> (
    ArenaClient<RecordingSurface>,
    std::sync::Arc<std::sync::Mutex<Vec<DrawOp>>>,
    std::sync::Arc<std::sync::Mutex<Vec<String>>>,
    std::path::PathBuf,
) {
    let (dialer, sent) = MockDialer::new(vec![Some(script)]);
    let (surface, ops) = RecordingSurface::new();
    let path = common::temp_storage_path(tag);
    let storage = Storage::open(&path);
    let client = ArenaClient::new(dialer, surface, storage, fast_config());
    (client, ops, sent, path)
}

/// Poll until an event matching the predicate shows up, with a deadline.
async fn poll_until(
    client: &mut ArenaClient<RecordingSurface>,
    mut pred: impl FnMut(&ArenaEvent) -> bool,
) -> Vec<ArenaEvent> {
    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    let mut seen = Vec::new();
    loop {
        for event in client.poll() {
            seen.push(event);
        }
        if seen.iter().any(&mut pred) {
            return seen;
        }
        assert!(
            std::time::Instant::now() < deadline,
            "expected event did not arrive; saw {seen:?}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// ════════════════════════════════════════════════════════════════════
// Round lifecycle drives the renderer
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn round_starting_starts_the_renderer() {
    let (mut client, ops, _sent, path) = start_client(
        vec![
            Some(Ok(handshake_json("me"))),
            Some(Ok(joined_json("AB12CD", &["me-0"], true))),
            Some(Ok(round_starting_json())),
        ],
        "round-start",
    );
    client.connect().await.unwrap();

    assert!(!client.is_running());
    poll_until(&mut client, |ev| matches!(ev, ArenaEvent::RoundStarting)).await;
    assert!(client.is_running());

    // A frame now actually draws.
    ops.lock().unwrap().clear();
    client.frame();
    assert!(ops.lock().unwrap().first() == Some(&DrawOp::Clear));

    client.disconnect().await;
    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn state_snapshot_reaches_the_renderer_and_resizes() {
    let (mut client, ops, _sent, path) = start_client(
        vec![
            Some(Ok(handshake_json("me"))),
            Some(Ok(round_starting_json())),
            Some(Ok(state_json(
                120,
                60,
                vec![common::snapshot_player("me-0", &[(3, 4), (2, 4)])],
                &[(7, 7)],
            ))),
        ],
        "state",
    );
    client.connect().await.unwrap();
    poll_until(&mut client, |ev| matches!(ev, ArenaEvent::State(_))).await;

    // The doubled snapshot dims resized the surface.
    assert_eq!(client.renderer().grid_size(), (120, 60));

    ops.lock().unwrap().clear();
    client.frame();
    {
        let ops = ops.lock().unwrap();
        // Snake head cell at (3,4): rect at (3*20+1.5, 4*20+1.5).
        assert!(ops
            .iter()
            .any(|op| matches!(op, DrawOp::RoundRect { x, y, .. } if *x == 61.5 && *y == 81.5)));
    }

    client.disconnect().await;
    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn ate_event_spawns_a_particle_burst() {
    let (mut client, _ops, _sent, path) = start_client(
        vec![
            Some(Ok(handshake_json("me"))),
            Some(Ok(ate_json("me-0", 5, 6, "hsla(140,100%,40%,1)"))),
        ],
        "ate",
    );
    client.connect().await.unwrap();
    poll_until(&mut client, |ev| matches!(ev, ArenaEvent::Ate { .. })).await;

    assert_eq!(client.renderer().particles().len(), 12);
    // Spawned at the center of cell (5,6).
    let p = client.renderer().particles()[0];
    assert_eq!((p.x, p.y), (5.5 * 20.0, 6.5 * 20.0));

    client.disconnect().await;
    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn round_end_stops_renderer_and_merges_win_tally() {
    let (mut client, _ops, _sent, path) = start_client(
        vec![
            Some(Ok(handshake_json("me"))),
            Some(Ok(round_starting_json())),
            Some(Ok(round_end_json(
                &[("me-0", "Ada", 40), ("peer-0", "Eve", 10)],
                &["Ada"],
                Some(&[("Ada", 5), ("Eve", 2)]),
            ))),
        ],
        "round-end",
    );
    client.connect().await.unwrap();
    poll_until(&mut client, |ev| matches!(ev, ArenaEvent::RoundEnd { .. })).await;

    assert!(!client.is_running());
    // Local +1 for the winner, then per-key max against the server tally:
    // Ada max(1, 5) = 5, Eve max(0, 2) = 2.
    assert_eq!(client.storage().wins()["Ada"], 5);
    assert_eq!(client.storage().wins()["Eve"], 2);

    client.disconnect().await;
    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn replayed_round_end_does_not_double_count() {
    let round_end = round_end_json(&[("me-0", "Ada", 40)], &["Ada"], Some(&[("Ada", 5)]));
    let (mut client, _ops, _sent, path) = start_client(
        vec![
            Some(Ok(handshake_json("me"))),
            Some(Ok(round_end.clone())),
            Some(Ok(round_end)),
        ],
        "replay",
    );
    client.connect().await.unwrap();

    let mut seen = 0;
    while seen < 2 {
        seen += poll_until(&mut client, |ev| matches!(ev, ArenaEvent::RoundEnd { .. }))
            .await
            .iter()
            .filter(|ev| matches!(ev, ArenaEvent::RoundEnd { .. }))
            .count();
    }

    // add_win bumps to 6 on the replay, but the authoritative merge is
    // idempotent: max(6, 5) keeps the count stable rather than doubling.
    assert_eq!(client.storage().wins()["Ada"], 6);

    client.disconnect().await;
    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn players_update_rescales_the_field() {
    let roster: Vec<(String, String, String)> = (0..8)
        .map(|i| (format!("p{i}-0"), format!("P{i}"), format!("p{i}")))
        .collect();
    let roster_refs: Vec<(&str, &str, &str)> = roster
        .iter()
        .map(|(id, nick, sid)| (id.as_str(), nick.as_str(), sid.as_str()))
        .collect();

    let (mut client, _ops, _sent, path) = start_client(
        vec![
            Some(Ok(handshake_json("p0"))),
            Some(Ok(joined_json("AB12CD", &["p0-0"], true))),
            Some(Ok(players_update_json(&roster_refs, "p0"))),
        ],
        "rescale",
    );
    client.connect().await.unwrap();
    poll_until(&mut client, |ev| matches!(ev, ArenaEvent::PlayersUpdate { .. })).await;

    // Eight players crosses the first threshold: 60×30 → 120×60.
    assert_eq!(client.renderer().grid_size(), (120, 60));

    client.disconnect().await;
    let _ = std::fs::remove_file(path);
}

// ════════════════════════════════════════════════════════════════════
// Controls contract
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn change_direction_maps_local_index_to_player_id() {
    let (mut client, _ops, sent, path) = start_client(
        vec![
            Some(Ok(handshake_json("me"))),
            Some(Ok(joined_json("AB12CD", &["me-0", "me-1"], true))),
        ],
        "controls",
    );
    client.connect().await.unwrap();
    poll_until(&mut client, |ev| matches!(ev, ArenaEvent::Joined { .. })).await;
    assert_eq!(client.human_count(), 2);

    client.change_direction(1, Dir::RIGHT);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let raw = sent.lock().unwrap().clone();
    let last = raw.last().expect("a wire message");
    assert!(last.contains(r#""player_id":"me-1""#));
    assert!(last.contains(r#""event":"input_dir""#));

    // An unassigned slot is ignored without error.
    client.change_direction(7, Dir::UP);

    client.disconnect().await;
    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn change_direction_with_no_connection_is_harmless() {
    let (client, _ops, sent, path) = start_client(vec![], "no-conn");
    client.change_direction(0, Dir::UP);
    assert!(sent.lock().unwrap().is_empty());
    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn pause_gates_is_running_and_frames() {
    let (mut client, ops, _sent, path) = start_client(
        vec![
            Some(Ok(handshake_json("me"))),
            Some(Ok(round_starting_json())),
        ],
        "pause",
    );
    client.connect().await.unwrap();
    poll_until(&mut client, |ev| matches!(ev, ArenaEvent::RoundStarting)).await;
    assert!(client.is_running());

    assert!(client.toggle_pause());
    assert!(!client.is_running());
    ops.lock().unwrap().clear();
    client.frame();
    assert!(ops.lock().unwrap().is_empty());

    assert!(!client.toggle_pause());
    assert!(client.is_running());

    client.disconnect().await;
    let _ = std::fs::remove_file(path);
}

// ════════════════════════════════════════════════════════════════════
// Persistence
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn joined_persists_the_room_code() {
    let (mut client, _ops, _sent, path) = start_client(
        vec![
            Some(Ok(handshake_json("me"))),
            Some(Ok(joined_json("ZZ99XX", &["me-0"], true))),
        ],
        "persist",
    );
    client.connect().await.unwrap();
    poll_until(&mut client, |ev| matches!(ev, ArenaEvent::Joined { .. })).await;

    assert_eq!(client.storage().last_room(), "ZZ99XX");
    // And it survives a reload from disk.
    let reloaded = Storage::open(&path);
    assert_eq!(reloaded.last_room(), "ZZ99XX");

    client.disconnect().await;
    let _ = std::fs::remove_file(path);
}
