use serde::{Deserialize, Serialize};

/// Persistent per-player statistics.
///
/// Implementations must not block: arenas call these from inside a tick.
pub trait StatsService: Send + Sync {
    fn add_game(&self, player: &str);
    fn add_win(&self, player: &str);
    fn add_coins(&self, player: &str, amount: u64);
    /// Whether the player holds a guaranteed-infection credit.
    fn has_guarantee(&self, player: &str) -> bool;
    fn reduce_guarantee(&self, player: &str, n: u32);
}

/// Snapshot and restore of arena levels between rounds.
pub trait MapService: Send + Sync {
    /// Whether a level with this name has been generated on the host.
    fn level_exists(&self, level: &str) -> bool;
    /// Record the pristine state of a level.
    fn save_map(&self, level: &str) -> Result<MapHandle, MapError>;
    /// Restore a level to its saved state.
    fn load_map(&self, level: &str) -> Result<MapHandle, MapError>;
}

/// Reference to a saved or restored level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapHandle {
    pub level: String,
    /// Incremented on every restore of the same level.
    pub generation: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapError {
    /// `load_map` was called for a level without a saved snapshot.
    NotSaved(String),
    UnknownLevel(String),
    Io(String),
}

impl std::fmt::Display for MapError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotSaved(level) => write!(f, "no saved snapshot for level '{level}'"),
            Self::UnknownLevel(level) => write!(f, "unknown level '{level}'"),
            Self::Io(e) => write!(f, "map i/o error: {e}"),
        }
    }
}

impl std::error::Error for MapError {}

/// Counters a statistics service keeps for one player.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerStats {
    pub games: u64,
    pub wins: u64,
    pub coins: u64,
    pub guarantees: u32,
}
