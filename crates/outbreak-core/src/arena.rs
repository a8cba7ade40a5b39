use serde::{Deserialize, Serialize};

use crate::position::{BlockRef, Vec3};
use crate::services::MapService;

/// Block ids that stay protected even when an arena allows breaking
/// (mossy cobblestone and glass).
pub const DEFAULT_PROTECTED_BLOCKS: &[u32] = &[48, 20];

/// Arena definition as stored in an arena file.
///
/// Loaded as-is; [`ArenaConfig::validate`] decides whether the arena can be
/// enabled or has to stay in setup mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    pub name: String,
    pub level: Option<String>,
    pub slots: u32,
    /// Spawn coordinates in slot order, `"x,y,z"`.
    pub spawns: Vec<String>,
    /// `[position, level]` of the join sign.
    pub joinsign: Vec<String>,
    pub game_time: u32,
    pub restart_time: u32,
    pub wait_time: u32,
    pub breaking: bool,
    pub enabled: bool,
    pub protected_blocks: Vec<u32>,
    /// Storage containers refilled with loot at the start of each round.
    pub chests: Vec<String>,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            level: None,
            slots: 12,
            spawns: Vec::new(),
            joinsign: Vec::new(),
            game_time: 180,
            restart_time: 10,
            wait_time: 30,
            breaking: false,
            enabled: false,
            protected_blocks: DEFAULT_PROTECTED_BLOCKS.to_vec(),
            chests: Vec::new(),
        }
    }
}

/// Parsed, validated geometry of an enabled arena.
#[derive(Debug, Clone, PartialEq)]
pub struct ArenaLayout {
    pub level: String,
    pub spawns: Vec<Vec3>,
    pub sign: BlockRef,
    pub chests: Vec<Vec3>,
}

/// Why an arena file cannot be enabled.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    Parse(String),
    MissingName,
    MissingLevel,
    LevelNotGenerated(String),
    NoSlots,
    SpawnCountMismatch { slots: u32, spawns: usize },
    InvalidSpawn { index: usize, value: String },
    InvalidJoinSign,
    InvalidChest { index: usize, value: String },
    ZeroDuration(&'static str),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(e) => write!(f, "arena file could not be parsed: {e}"),
            Self::MissingName => write!(f, "arena has no name"),
            Self::MissingLevel => write!(f, "arena has no level"),
            Self::LevelNotGenerated(level) => write!(f, "level '{level}' is not generated"),
            Self::NoSlots => write!(f, "slots must be > 0"),
            Self::SpawnCountMismatch { slots, spawns } => {
                write!(f, "{spawns} spawns configured for {slots} slots")
            },
            Self::InvalidSpawn { index, value } => {
                write!(f, "spawn {} is not a position: '{value}'", index + 1)
            },
            Self::InvalidJoinSign => write!(f, "joinsign must be [position, level]"),
            Self::InvalidChest { index, value } => {
                write!(f, "chest {} is not a position: '{value}'", index + 1)
            },
            Self::ZeroDuration(field) => write!(f, "{field} must be > 0"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl ArenaConfig {
    /// Parse an arena file.
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// The join sign reference, if it is well-formed.
    pub fn sign_ref(&self) -> Option<BlockRef> {
        let [position, level] = self.joinsign.as_slice() else {
            return None;
        };
        if level.is_empty() {
            return None;
        }
        Some(BlockRef {
            level: level.clone(),
            position: Vec3::parse(position)?,
        })
    }

    /// Check everything an enabled arena relies on.
    pub fn validate(&self, maps: &dyn MapService) -> Result<ArenaLayout, ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::MissingName);
        }
        let level = match self.level.as_deref() {
            Some(level) if !level.is_empty() => level.to_string(),
            _ => return Err(ConfigError::MissingLevel),
        };
        if !maps.level_exists(&level) {
            return Err(ConfigError::LevelNotGenerated(level));
        }
        if self.slots == 0 {
            return Err(ConfigError::NoSlots);
        }
        if self.spawns.len() != self.slots as usize {
            return Err(ConfigError::SpawnCountMismatch {
                slots: self.slots,
                spawns: self.spawns.len(),
            });
        }
        let spawns = self
            .spawns
            .iter()
            .enumerate()
            .map(|(index, s)| {
                Vec3::parse(s).ok_or_else(|| ConfigError::InvalidSpawn {
                    index,
                    value: s.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let sign = self.sign_ref().ok_or(ConfigError::InvalidJoinSign)?;
        let chests = self
            .chests
            .iter()
            .enumerate()
            .map(|(index, s)| {
                Vec3::parse(s).ok_or_else(|| ConfigError::InvalidChest {
                    index,
                    value: s.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        for (field, value) in [
            ("game_time", self.game_time),
            ("restart_time", self.restart_time),
            ("wait_time", self.wait_time),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroDuration(field));
            }
        }
        Ok(ArenaLayout {
            level,
            spawns,
            sign,
            chests,
        })
    }
}

/// Coarse lifecycle state of an arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArenaPhase {
    Lobby,
    Game,
    Restart,
}
