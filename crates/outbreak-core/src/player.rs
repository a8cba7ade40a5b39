use serde::{Deserialize, Serialize};

/// Unique identifier for a connected player. Assigned by the host per session.
pub type PlayerId = u64;

/// Health and food value a player is restored to on join, leave, and reset.
pub const FULL_VITALS: u8 = 20;

/// A player known to an arena.
///
/// Statistics are keyed by `name` since it is stable across sessions; all
/// in-arena bookkeeping uses `id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
}

impl Player {
    pub fn new(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Game mode the host should put a player in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameMode {
    Survival,
    Adventure,
    /// Whatever the host uses outside of arenas.
    Default,
}

/// The two mutually exclusive roles during a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Team {
    Infected,
    Healthy,
}

impl Team {
    /// Name tag shown above a player of this team.
    pub fn name_tag(self) -> &'static str {
        match self {
            Self::Infected => "[INFECTED]",
            Self::Healthy => "[HEALTHY]",
        }
    }
}

impl std::fmt::Display for Team {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Infected => write!(f, "infected"),
            Self::Healthy => write!(f, "healthy"),
        }
    }
}
