//! Persistent key-value preferences and the win tally.
//!
//! A single JSON file at a caller-supplied path (no ambient location —
//! the composition root decides where state lives). The key names match
//! the historical browser-storage keys so profiles survive migration.
//!
//! Every read fails soft: a missing or corrupt file yields defaults, and
//! write errors are logged and swallowed — losing a preference is never
//! fatal to a game in progress.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Input scheme for local players.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ControlType {
    Swipe,
    Buttons,
    #[default]
    Keyboard,
}

/// On-disk shape. Field names mirror the historical storage keys.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct StoreData {
    #[serde(rename = "playerNickname", default)]
    nickname: Option<String>,
    #[serde(rename = "lastRoom", default)]
    last_room: Option<String>,
    #[serde(rename = "controlType", default)]
    control_type: Option<ControlType>,
    #[serde(rename = "playerWins", default)]
    wins: HashMap<String, u32>,
    #[serde(rename = "selectedMode", default)]
    selected_mode: Option<String>,
}

/// File-backed preference store.
pub struct Storage {
    path: PathBuf,
    data: StoreData,
}

impl Storage {
    /// Open (or initialize) the store at `path`. Never fails: unreadable or
    /// corrupt contents are replaced by defaults.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let data = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(data) => data,
                Err(e) => {
                    warn!(path = %path.display(), "corrupt preference file, using defaults: {e}");
                    StoreData::default()
                }
            },
            Err(_) => StoreData::default(),
        };
        Self { path, data }
    }

    // ── Preferences ─────────────────────────────────────────────────

    /// Stored nickname, defaulting to `"Player"`.
    pub fn nickname(&self) -> String {
        self.data
            .nickname
            .clone()
            .unwrap_or_else(|| "Player".to_string())
    }

    /// Last joined room code, defaulting to empty.
    pub fn last_room(&self) -> String {
        self.data.last_room.clone().unwrap_or_default()
    }

    pub fn set_last_room(&mut self, room: &str) {
        self.data.last_room = Some(room.to_string());
        self.persist();
    }

    /// Stored control scheme, defaulting to keyboard.
    pub fn control_type(&self) -> ControlType {
        self.data.control_type.unwrap_or_default()
    }

    /// Stored mode-selection screen state.
    pub fn selected_mode(&self) -> Option<String> {
        self.data.selected_mode.clone()
    }

    pub fn set_selected_mode(&mut self, mode: &str) {
        self.data.selected_mode = Some(mode.to_string());
        self.persist();
    }

    /// Persist nickname, room and control scheme together (the join-screen
    /// "remember me" write).
    pub fn save_player_settings(&mut self, nickname: &str, room: &str, control: ControlType) {
        self.data.nickname = Some(nickname.to_string());
        self.data.last_room = Some(room.to_string());
        self.data.control_type = Some(control);
        self.persist();
    }

    // ── Win tally ───────────────────────────────────────────────────

    /// The local win tally (nickname → wins).
    pub fn wins(&self) -> &HashMap<String, u32> {
        &self.data.wins
    }

    /// Record one local win for a player.
    pub fn add_win(&mut self, nickname: &str) {
        *self.data.wins.entry(nickname.to_string()).or_insert(0) += 1;
        self.persist();
    }

    /// Merge a server-supplied authoritative tally into the local one,
    /// taking the per-key maximum:
    /// `merged[name] = max(local[name] or 0, server[name])`.
    ///
    /// Deliberately lossy, order-independent and idempotent: replaying the
    /// same round-end twice never double-counts, and a client that missed
    /// rounds converges to the server's count on the next merge.
    pub fn merge_wins(&mut self, server: &HashMap<String, u32>) {
        for (name, &count) in server {
            let entry = self.data.wins.entry(name.clone()).or_insert(0);
            *entry = (*entry).max(count);
        }
        self.persist();
    }

    fn persist(&self) {
        let raw = match serde_json::to_string_pretty(&self.data) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("failed to serialize preferences: {e}");
                return;
            }
        };
        if let Err(e) = fs::write(&self.path, raw) {
            warn!(path = %self.path.display(), "failed to write preferences: {e}");
        }
    }
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("path", &self.path)
            .finish()
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    static COUNTER: AtomicU32 = AtomicU32::new(0);

    fn temp_store() -> (Storage, PathBuf) {
        let n = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "snake-arena-storage-{}-{n}.json",
            std::process::id()
        ));
        let _ = fs::remove_file(&path);
        (Storage::open(&path), path)
    }

    #[test]
    fn missing_file_yields_defaults() {
        let (store, path) = temp_store();
        assert_eq!(store.nickname(), "Player");
        assert_eq!(store.last_room(), "");
        assert_eq!(store.control_type(), ControlType::Keyboard);
        assert!(store.wins().is_empty());
        let _ = fs::remove_file(path);
    }

    #[test]
    fn corrupt_file_yields_defaults() {
        let (_, path) = temp_store();
        fs::write(&path, "{this is not json").unwrap();
        let store = Storage::open(&path);
        assert_eq!(store.nickname(), "Player");
        assert!(store.wins().is_empty());
        let _ = fs::remove_file(path);
    }

    #[test]
    fn settings_round_trip_through_disk() {
        let (mut store, path) = temp_store();
        store.save_player_settings("Ada", "AB12CD", ControlType::Swipe);

        let reloaded = Storage::open(&path);
        assert_eq!(reloaded.nickname(), "Ada");
        assert_eq!(reloaded.last_room(), "AB12CD");
        assert_eq!(reloaded.control_type(), ControlType::Swipe);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn add_win_increments() {
        let (mut store, path) = temp_store();
        store.add_win("Ada");
        store.add_win("Ada");
        store.add_win("Bob");
        assert_eq!(store.wins()["Ada"], 2);
        assert_eq!(store.wins()["Bob"], 1);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn merge_takes_per_key_maximum() {
        let (mut store, path) = temp_store();
        store.add_win("Ada");
        store.add_win("Ada"); // local 2

        let server = HashMap::from([("Ada".to_string(), 5), ("Eve".to_string(), 1)]);
        store.merge_wins(&server);
        assert_eq!(store.wins()["Ada"], 5);
        assert_eq!(store.wins()["Eve"], 1);

        // Local higher than server: local wins.
        let server = HashMap::from([("Ada".to_string(), 2)]);
        store.merge_wins(&server);
        assert_eq!(store.wins()["Ada"], 5);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn merge_is_idempotent_and_order_independent() {
        let server_a = HashMap::from([("A".to_string(), 3)]);
        let server_b = HashMap::from([("A".to_string(), 1), ("B".to_string(), 4)]);

        let (mut one, path_one) = temp_store();
        one.merge_wins(&server_a);
        one.merge_wins(&server_a); // replay
        one.merge_wins(&server_b);

        let (mut two, path_two) = temp_store();
        two.merge_wins(&server_b);
        two.merge_wins(&server_a);

        assert_eq!(one.wins(), two.wins());
        assert_eq!(one.wins()["A"], 3);
        assert_eq!(one.wins()["B"], 4);
        let _ = fs::remove_file(path_one);
        let _ = fs::remove_file(path_two);
    }

    #[test]
    fn wins_survive_reload() {
        let (mut store, path) = temp_store();
        store.add_win("Ada");
        store.merge_wins(&HashMap::from([("Bob".to_string(), 7)]));

        let reloaded = Storage::open(&path);
        assert_eq!(reloaded.wins()["Ada"], 1);
        assert_eq!(reloaded.wins()["Bob"], 7);
        let _ = fs::remove_file(path);
    }
}
