use outbreak_core::actions::{Channel, HostAction};
use outbreak_core::arena::ArenaPhase;
use outbreak_core::player::{GameMode, Player, PlayerId};
use outbreak_core::position::Destination;

use crate::InfectionArena;

/// Admission and membership failures. All of them are recoverable and are
/// shown to the player as a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArenaError {
    ArenaDisabled,
    ArenaFull,
    AlreadyJoined,
    NotInArena,
    WrongPhase(ArenaPhase),
}

impl std::fmt::Display for ArenaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ArenaDisabled => write!(f, "This arena is being set up!"),
            Self::ArenaFull => write!(f, "This arena is full!"),
            Self::AlreadyJoined => write!(f, "You are already in the game!"),
            Self::NotInArena => write!(f, "You are not in this arena."),
            Self::WrongPhase(ArenaPhase::Game) => write!(f, "A game is already running!"),
            Self::WrongPhase(ArenaPhase::Restart) => write!(f, "The arena is restarting!"),
            Self::WrongPhase(ArenaPhase::Lobby) => write!(f, "The round has not started yet."),
        }
    }
}

impl std::error::Error for ArenaError {}

/// Why a player is leaving an arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveCause {
    /// The player asked to leave.
    Voluntary,
    Disconnect,
    /// The player walked or teleported to another level.
    LevelChange,
    /// The caller announces the death itself.
    Death,
}

impl InfectionArena {
    /// Admit a player to the lowest free spawn slot. Returns the slot index.
    pub fn join(&mut self, player: Player) -> Result<usize, ArenaError> {
        let Some(layout) = self.layout.as_ref().filter(|_| self.config.enabled) else {
            return Err(ArenaError::ArenaDisabled);
        };
        let slots = layout.spawns.len();
        if self.session.occupant_count() >= slots {
            return Err(ArenaError::ArenaFull);
        }
        if self.session.contains(player.id) {
            return Err(ArenaError::AlreadyJoined);
        }
        if self.session.phase() != ArenaPhase::Lobby {
            return Err(ArenaError::WrongPhase(self.session.phase()));
        }
        let Some(slot) = self.session.first_free_slot(slots) else {
            return Err(ArenaError::ArenaFull);
        };
        let destination = Destination::ArenaSpawn {
            level: layout.level.clone(),
            position: layout.spawns[slot],
        };
        let (id, name) = (player.id, player.name.clone());
        if !self.session.seat(slot, player) {
            return Err(ArenaError::AlreadyJoined);
        }

        self.push(HostAction::Teleport {
            player: id,
            to: destination,
        });
        self.push(HostAction::ResetPlayer {
            player: id,
            mode: GameMode::Adventure,
        });
        let text = format!("> {name} joined the game! {}", self.occupancy_tag());
        self.broadcast(text, Channel::Chat);
        tracing::debug!(arena = %self.name(), player_id = id, slot, "Player joined");
        Ok(slot)
    }

    /// Remove a player from the arena and send them back to the server lobby.
    pub fn leave(&mut self, id: PlayerId, cause: LeaveCause) -> Result<(), ArenaError> {
        let in_round = self.session.phase() != ArenaPhase::Lobby;
        let Some(player) = self.session.remove(id) else {
            return Err(ArenaError::NotInArena);
        };
        if self.session.round_started() {
            self.stats.add_game(&player.name);
        }
        if in_round {
            self.push(HostAction::SetNameTag {
                player: id,
                tag: None,
            });
        }
        self.push(HostAction::ResetPlayer {
            player: id,
            mode: GameMode::Default,
        });
        self.push(HostAction::Teleport {
            player: id,
            to: Destination::ServerLobby,
        });

        match cause {
            LeaveCause::Death => self.session.mark_pending_respawn(id),
            _ => {
                let text = format!("> {} left the game. {}", player.name, self.occupancy_tag());
                self.broadcast(text, Channel::Chat);
            },
        }
        if matches!(cause, LeaveCause::Voluntary | LeaveCause::LevelChange) {
            self.tell(id, "> You left the game.", Channel::Chat);
        }
        tracing::debug!(arena = %self.name(), player_id = id, ?cause, "Player left");
        Ok(())
    }

    /// `[occupants/slots]` suffix used in join/leave/death messages.
    pub(crate) fn occupancy_tag(&self) -> String {
        format!("[{}/{}]", self.session.occupant_count(), self.config.slots)
    }
}
