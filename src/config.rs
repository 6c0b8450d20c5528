//! Static game configuration.
//!
//! Mirrors the constants the game server runs with; the client only uses
//! these for initial render geometry and UI limits — authoritative values
//! always arrive with snapshots.

/// Default server URL.
const DEFAULT_SERVER_URL: &str = "wss://arena.example.net/ws";

/// Game constants shared by the renderer and the facade.
#[derive(Debug, Clone)]
pub struct GameConfig {
    /// Base grid width in cells, before field scaling.
    pub base_grid_w: u32,
    /// Base grid height in cells, before field scaling.
    pub base_grid_h: u32,
    /// Cell edge length in pixels.
    pub cell_size: f32,
    /// Server simulation tick, milliseconds. Informational client-side.
    pub tick_ms: u64,
    /// Maximum participants selectable in local setup screens.
    pub max_players: u32,
    /// Maximum players per room advertised to the user.
    pub max_players_per_room: u32,
    /// Every this many players, both grid axes double.
    pub field_scale_threshold: u32,
    /// Game server endpoint.
    pub server_url: String,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            base_grid_w: 60,
            base_grid_h: 30,
            cell_size: 20.0,
            tick_ms: 120,
            max_players: 8,
            max_players_per_room: 12,
            field_scale_threshold: 8,
            server_url: DEFAULT_SERVER_URL.to_string(),
        }
    }
}
