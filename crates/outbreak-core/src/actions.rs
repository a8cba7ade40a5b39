use serde::{Deserialize, Serialize};

use crate::player::{GameMode, PlayerId};
use crate::position::{BlockRef, Destination, Vec3};

/// Presentation channel for a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Channel {
    Chat,
    Tip,
    Popup,
    Title,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusEffect {
    Speed,
    NightVision,
    Blindness,
    JumpBoost,
    Poison,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sound {
    Click,
    AnvilUse,
}

/// One filled container slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub slot: u8,
    pub item: u32,
    pub count: u8,
}

/// A side effect an arena asks its host to carry out.
///
/// Arenas never touch players or levels directly; they emit these and the
/// host applies them in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HostAction {
    Notify {
        recipients: Vec<PlayerId>,
        text: String,
        channel: Channel,
    },
    /// Server-wide announcement, not limited to arena occupants.
    ServerBroadcast { text: String },
    Teleport {
        player: PlayerId,
        to: Destination,
    },
    /// Clear inventories, restore vitals, drop status effects, set game mode.
    ResetPlayer { player: PlayerId, mode: GameMode },
    ClearInventory { player: PlayerId },
    SetGameMode { player: PlayerId, mode: GameMode },
    /// `None` restores the player's plain name.
    SetNameTag {
        player: PlayerId,
        tag: Option<String>,
    },
    ApplyEffect {
        player: PlayerId,
        effect: StatusEffect,
        seconds: u32,
        amplifier: u8,
    },
    PlaySound { player: PlayerId, sound: Sound },
    SetLevelTime { level: String, time: u32 },
    UpdateSign { sign: BlockRef, lines: [String; 4] },
    FillContainer {
        level: String,
        position: Vec3,
        items: Vec<ItemStack>,
    },
}

impl HostAction {
    /// Whether this action is addressed to `player` specifically.
    pub fn targets(&self, player: PlayerId) -> bool {
        match self {
            Self::Notify { recipients, .. } => recipients.contains(&player),
            Self::Teleport { player: p, .. }
            | Self::ResetPlayer { player: p, .. }
            | Self::ClearInventory { player: p }
            | Self::SetGameMode { player: p, .. }
            | Self::SetNameTag { player: p, .. }
            | Self::ApplyEffect { player: p, .. }
            | Self::PlaySound { player: p, .. } => *p == player,
            Self::ServerBroadcast { .. }
            | Self::SetLevelTime { .. }
            | Self::UpdateSign { .. }
            | Self::FillContainer { .. } => false,
        }
    }
}
