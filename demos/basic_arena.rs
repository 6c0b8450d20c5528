//! # Basic Arena Example
//!
//! Demonstrates a complete client lifecycle without a graphics backend:
//!
//! 1. Connect to a game server via WebSocket
//! 2. Create or join a room
//! 3. Start a round when hosting
//! 4. React to lobby and round events
//! 5. Shut down gracefully on Ctrl+C or disconnect
//!
//! ## Running
//!
//! ```sh
//! # Start a Snake Arena server, then:
//! cargo run --example basic_arena
//!
//! # Override the server URL or room code:
//! ARENA_URL=ws://my-server:8000/ws ARENA_ROOM=AB12CD cargo run --example basic_arena
//! ```

use snake_arena_client::render::{Rgba, Surface};
use snake_arena_client::{
    ArenaClient, ArenaEvent, ClientConfig, Storage, WebSocketDialer,
};

/// Default server URL when `ARENA_URL` is not set.
const DEFAULT_URL: &str = "ws://localhost:8000/ws";

/// A surface that draws nothing — this demo only exercises the session.
struct HeadlessSurface;

impl Surface for HeadlessSurface {
    fn resize(&mut self, width: f32, height: f32) {
        tracing::debug!("surface resized to {width}×{height}");
    }
    fn clear(&mut self) {}
    fn line(&mut self, _: f32, _: f32, _: f32, _: f32, _: f32, _: Rgba) {}
    fn fill_round_rect(&mut self, _: f32, _: f32, _: f32, _: f32, _: f32, _: Rgba) {}
    fn fill_circle(&mut self, _: f32, _: f32, _: f32, _: Rgba) {}
}

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
    let url = std::env::var("ARENA_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
    let room = std::env::var("ARENA_ROOM").ok();
    tracing::info!("Connecting to {url}");

    // ── Composition root ────────────────────────────────────────────
    let storage = Storage::open("arena-prefs.json");
    let nickname = storage.nickname();
    let mut client = ArenaClient::new(
        WebSocketDialer::new(url),
        HeadlessSurface,
        storage,
        ClientConfig::default(),
    );

    // ── Join ────────────────────────────────────────────────────────
    let code = client.join_room(&nickname, room, 1).await?;
    tracing::info!("In room {code} as {nickname}");

    // ── Event loop ──────────────────────────────────────────────────
    let mut ticker = tokio::time::interval(std::time::Duration::from_millis(16));
    'main: loop {
        tokio::select! {
            _ = ticker.tick() => {
                for event in client.poll() {
                    match event {
                        ArenaEvent::Connected { connection_id } => {
                            tracing::info!("Transport up (connection {connection_id})");
                        }
                        ArenaEvent::Joined { room_code, own_players, is_host } => {
                            tracing::info!(
                                "Joined {room_code} with {} local player(s), host={is_host}",
                                own_players.len()
                            );
                            if is_host {
                                // Kick the round off as soon as we host a lobby.
                                client.start_round()?;
                                tracing::info!("Round start requested");
                            }
                        }
                        ArenaEvent::JoinFailed { reason } => {
                            tracing::error!("Join failed: {reason}");
                            break 'main;
                        }
                        ArenaEvent::PlayersUpdate { players, is_host } => {
                            tracing::info!(
                                "{} player(s) in room, host={is_host}",
                                players.len()
                            );
                        }
                        ArenaEvent::RoundStarting => {
                            tracing::info!("Round starting — renderer running");
                        }
                        ArenaEvent::State(snapshot) => {
                            tracing::debug!(
                                "snapshot: {} player(s), {} food, {}×{}",
                                snapshot.players.len(),
                                snapshot.foods.len(),
                                snapshot.grid_w,
                                snapshot.grid_h,
                            );
                        }
                        ArenaEvent::RoundEnd { winners, .. } => {
                            for winner in &winners {
                                tracing::info!("Winner: {}", winner.nickname);
                            }
                            break 'main;
                        }
                        ArenaEvent::Disconnected { reason } => {
                            tracing::warn!(
                                "Disconnected: {}",
                                reason.as_deref().unwrap_or("unknown")
                            );
                            break 'main;
                        }
                        other => {
                            tracing::debug!("Event: {other:?}");
                        }
                    }
                }
                client.frame();
            }

            // Ctrl+C — shut down gracefully.
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received, shutting down…");
                break 'main;
            }
        }
    }

    // ── Cleanup ─────────────────────────────────────────────────────
    client.disconnect().await;
    tracing::info!("Client shut down. Goodbye!");
    Ok(())
}
