use rand::Rng;

use outbreak_core::actions::{Channel, HostAction, StatusEffect};
use outbreak_core::arena::ArenaPhase;
use outbreak_core::events::{CHEST_BLOCK, Verdict};
use outbreak_core::player::{Player, PlayerId, Team};
use outbreak_core::position::{Destination, Vec3};

use crate::InfectionArena;
use crate::admission::LeaveCause;

/// Chat message that makes an occupant leave the arena.
pub const LEAVE_COMMAND: &str = "leave";

/// Result of an infected player biting a healthy one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BiteOutcome {
    Converted,
    Missed,
}

/// Roll a bite: converts with probability `1 / denominator`.
pub fn roll_bite<R: Rng + ?Sized>(rng: &mut R, denominator: u32) -> BiteOutcome {
    if rng.random_range(0..denominator.max(1)) == 0 {
        BiteOutcome::Converted
    } else {
        BiteOutcome::Missed
    }
}

impl InfectionArena {
    /// Contact damage between two players.
    pub(crate) fn on_damage(&mut self, attacker: PlayerId, target: PlayerId) -> Verdict {
        if self.session.phase() != ArenaPhase::Game
            || !self.session.contains(attacker)
            || !self.session.contains(target)
        {
            return Verdict::Allow;
        }
        match (self.session.team_of(attacker), self.session.team_of(target)) {
            (Some(Team::Infected), Some(Team::Healthy)) => {
                self.bite(attacker, target);
                Verdict::Allow
            },
            (Some(a), Some(b)) if a == b => Verdict::Cancel,
            _ => Verdict::Allow,
        }
    }

    fn bite(&mut self, attacker: PlayerId, target: PlayerId) {
        let target_name = self.player_name(target);
        match roll_bite(&mut self.rng, self.tuning.infection_chance_denominator) {
            BiteOutcome::Converted => {
                self.session.set_team(target, Team::Infected);
                self.push(HostAction::ClearInventory { player: target });
                self.push(HostAction::SetNameTag {
                    player: target,
                    tag: Some(Team::Infected.name_tag().to_string()),
                });
                self.tell(
                    target,
                    "> You are now infected! Infect the remaining survivors!",
                    Channel::Chat,
                );
                self.tell(attacker, format!("> You infected {target_name}!"), Channel::Chat);
                tracing::debug!(
                    arena = %self.name(),
                    attacker,
                    target,
                    infected = self.session.infected_count(),
                    healthy = self.session.healthy_count(),
                    "Player infected"
                );
            },
            BiteOutcome::Missed => {
                self.tell(attacker, "> The infection failed!", Channel::Chat);
                self.tell(
                    target,
                    "> You were bitten but resisted the infection!",
                    Channel::Chat,
                );
                self.push(HostAction::ApplyEffect {
                    player: attacker,
                    effect: StatusEffect::Poison,
                    seconds: self.tuning.miss_penalty_secs,
                    amplifier: self.tuning.miss_penalty_amplifier,
                });
            },
        }
    }

    pub(crate) fn on_chat(&mut self, player: PlayerId, message: &str) -> Verdict {
        if !self.session.contains(player) {
            return Verdict::Allow;
        }
        if message.trim().eq_ignore_ascii_case(LEAVE_COMMAND) {
            // Membership was just checked, so this cannot be NotInArena.
            let _ = self.leave(player, LeaveCause::Voluntary);
            return Verdict::Cancel;
        }
        if self.session.phase() == ArenaPhase::Game {
            self.tell(player, "> Chat is disabled during the game!", Channel::Chat);
            return Verdict::Cancel;
        }
        Verdict::Allow
    }

    pub(crate) fn on_sneak(&mut self, player: PlayerId, sneaking: bool) -> Verdict {
        if sneaking && self.in_game(player) {
            Verdict::Cancel
        } else {
            Verdict::Allow
        }
    }

    /// Block break or place.
    pub(crate) fn on_block_change(&mut self, player: PlayerId, block: u32) -> Verdict {
        if !self.in_game(player) {
            return Verdict::Allow;
        }
        if self.config.breaking && !self.config.protected_blocks.contains(&block) {
            Verdict::Allow
        } else {
            Verdict::Cancel
        }
    }

    /// Lobby occupants are pinned to their spawn: the move goes through but
    /// anything further than the clamp distance is teleported back.
    pub(crate) fn on_move(&mut self, player: PlayerId, position: Vec3) -> Verdict {
        if self.session.phase() != ArenaPhase::Lobby {
            return Verdict::Allow;
        }
        let (Some(slot), Some(layout)) = (self.session.slot_of(player), self.layout.as_ref())
        else {
            return Verdict::Allow;
        };
        let spawn = layout.spawns[slot];
        if position.distance(&spawn) > self.tuning.lobby_clamp_distance {
            let level = layout.level.clone();
            self.push(HostAction::Teleport {
                player,
                to: Destination::ArenaSpawn {
                    level,
                    position: spawn,
                },
            });
        }
        Verdict::Allow
    }

    pub(crate) fn on_interact(
        &mut self,
        player: Player,
        level: &str,
        position: Vec3,
        block: u32,
    ) -> Verdict {
        if block == CHEST_BLOCK
            && self.session.phase() == ArenaPhase::Lobby
            && self.session.contains(player.id)
        {
            return Verdict::Cancel;
        }
        let Some(sign) = self.config.sign_ref() else {
            return Verdict::Allow;
        };
        if !sign.same_block(level, &position) || self.is_setup() {
            return Verdict::Allow;
        }
        let id = player.id;
        if let Err(e) = self.join(player) {
            tracing::debug!(arena = %self.name(), player_id = id, error = %e, "Sign join refused");
            self.tell(id, format!("> {e}"), Channel::Chat);
        }
        Verdict::Allow
    }

    pub(crate) fn on_exhaust(&mut self, player: PlayerId) -> Verdict {
        if self.session.phase() == ArenaPhase::Lobby && self.session.contains(player) {
            Verdict::Cancel
        } else {
            Verdict::Allow
        }
    }

    pub(crate) fn on_death(&mut self, player: PlayerId, message: &str) -> Verdict {
        if self.leave(player, LeaveCause::Death).is_err() {
            return Verdict::Allow;
        }
        let text = format!("> {message} {}", self.occupancy_tag());
        self.broadcast(text, Channel::Chat);
        Verdict::Cancel
    }

    pub(crate) fn on_respawn(&mut self, player: PlayerId) -> Verdict {
        if self.session.take_pending_respawn(player) {
            Verdict::RespawnAt(Destination::ServerLobby)
        } else {
            Verdict::Allow
        }
    }

    fn in_game(&self, player: PlayerId) -> bool {
        self.session.phase() == ArenaPhase::Game && self.session.contains(player)
    }
}
