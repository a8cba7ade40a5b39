use serde::{Deserialize, Serialize};

use crate::player::{Player, PlayerId};
use crate::position::{Destination, Vec3};

/// Block id of a storage chest.
pub const CHEST_BLOCK: u32 = 54;

/// Inbound player-triggered events, as reported by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlayerEvent {
    JoinRequest { player: Player },
    /// One player hit another in melee.
    Damage { attacker: PlayerId, target: PlayerId },
    Death { player: PlayerId, message: String },
    Disconnect { player: PlayerId },
    Respawn { player: PlayerId },
    Chat { player: PlayerId, message: String },
    Sneak { player: PlayerId, sneaking: bool },
    BlockBreak { player: PlayerId, block: u32 },
    BlockPlace { player: PlayerId, block: u32 },
    Interact {
        player: Player,
        level: String,
        position: Vec3,
        block: u32,
    },
    Move { player: PlayerId, position: Vec3 },
    /// The player moved to another level.
    LevelChange { player: PlayerId },
    /// Hunger drain.
    Exhaust { player: PlayerId },
}

impl PlayerEvent {
    /// The player that triggered the event.
    pub fn player_id(&self) -> PlayerId {
        match self {
            Self::JoinRequest { player } | Self::Interact { player, .. } => player.id,
            Self::Damage { attacker, .. } => *attacker,
            Self::Death { player, .. }
            | Self::Disconnect { player }
            | Self::Respawn { player }
            | Self::Chat { player, .. }
            | Self::Sneak { player, .. }
            | Self::BlockBreak { player, .. }
            | Self::BlockPlace { player, .. }
            | Self::Move { player, .. }
            | Self::LevelChange { player }
            | Self::Exhaust { player } => *player,
        }
    }
}

/// What the host should do with the engine event that was reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Verdict {
    Allow,
    Cancel,
    RespawnAt(Destination),
}

impl Verdict {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancel)
    }
}
