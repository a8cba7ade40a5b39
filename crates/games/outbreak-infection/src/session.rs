use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use outbreak_core::arena::{ArenaConfig, ArenaPhase};
use outbreak_core::player::{Player, PlayerId, Team};

/// Remaining seconds of each phase's countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Countdowns {
    pub lobby: u32,
    pub game: u32,
    pub restart: u32,
}

impl Countdowns {
    pub fn from_config(config: &ArenaConfig) -> Self {
        Self {
            lobby: config.wait_time,
            game: config.game_time,
            restart: config.restart_time,
        }
    }
}

/// Who is in the arena.
///
/// In the lobby players hold a spawn slot; once a round starts the slot no
/// longer matters and players are keyed by identity.
#[derive(Debug, Clone, PartialEq)]
pub enum Occupants {
    Slotted(BTreeMap<usize, Player>),
    Active(BTreeMap<PlayerId, Player>),
}

impl Default for Occupants {
    fn default() -> Self {
        Self::Slotted(BTreeMap::new())
    }
}

/// Mutable per-arena round state. Reset in place, never recreated.
#[derive(Debug, Clone)]
pub struct ArenaSession {
    pub(crate) phase: ArenaPhase,
    occupants: Occupants,
    infected: HashSet<PlayerId>,
    healthy: HashSet<PlayerId>,
    pending_respawn: HashSet<PlayerId>,
    /// Set once roles are handed out; a lobby forced into restart never played.
    round_started: bool,
    pub(crate) countdowns: Countdowns,
}

impl ArenaSession {
    pub fn new(countdowns: Countdowns) -> Self {
        Self {
            phase: ArenaPhase::Lobby,
            occupants: Occupants::default(),
            infected: HashSet::new(),
            healthy: HashSet::new(),
            pending_respawn: HashSet::new(),
            round_started: false,
            countdowns,
        }
    }

    pub fn phase(&self) -> ArenaPhase {
        self.phase
    }

    /// Whether the current occupants have played a round since the last lobby.
    pub fn round_started(&self) -> bool {
        self.round_started
    }

    pub(crate) fn mark_round_started(&mut self) {
        self.round_started = true;
    }

    pub fn countdowns(&self) -> Countdowns {
        self.countdowns
    }

    pub fn occupant_count(&self) -> usize {
        match &self.occupants {
            Occupants::Slotted(m) => m.len(),
            Occupants::Active(m) => m.len(),
        }
    }

    /// Occupants in slot order (lobby) or id order (in game).
    pub fn players(&self) -> Vec<&Player> {
        match &self.occupants {
            Occupants::Slotted(m) => m.values().collect(),
            Occupants::Active(m) => m.values().collect(),
        }
    }

    pub fn occupant_ids(&self) -> Vec<PlayerId> {
        self.players().into_iter().map(|p| p.id).collect()
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        match &self.occupants {
            Occupants::Slotted(m) => m.values().find(|p| p.id == id),
            Occupants::Active(m) => m.get(&id),
        }
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.player(id).is_some()
    }

    /// Spawn slot held by a lobby occupant.
    pub fn slot_of(&self, id: PlayerId) -> Option<usize> {
        match &self.occupants {
            Occupants::Slotted(m) => m.iter().find(|(_, p)| p.id == id).map(|(&slot, _)| slot),
            Occupants::Active(_) => None,
        }
    }

    /// Lowest unoccupied slot below `slots`. Only meaningful in the lobby.
    pub fn first_free_slot(&self, slots: usize) -> Option<usize> {
        match &self.occupants {
            Occupants::Slotted(m) => (0..slots).find(|s| !m.contains_key(s)),
            Occupants::Active(_) => None,
        }
    }

    /// Seat a player in a lobby slot. Returns false if the slot is taken, the
    /// player is already present, or the round has started.
    pub(crate) fn seat(&mut self, slot: usize, player: Player) -> bool {
        if self.contains(player.id) {
            return false;
        }
        match &mut self.occupants {
            Occupants::Slotted(m) if !m.contains_key(&slot) => {
                m.insert(slot, player);
                true
            },
            _ => false,
        }
    }

    /// Remove a player from every membership structure.
    pub(crate) fn remove(&mut self, id: PlayerId) -> Option<Player> {
        let removed = match &mut self.occupants {
            Occupants::Slotted(m) => {
                let slot = m.iter().find(|(_, p)| p.id == id).map(|(&s, _)| s)?;
                m.remove(&slot)
            },
            Occupants::Active(m) => m.remove(&id),
        };
        self.infected.remove(&id);
        self.healthy.remove(&id);
        removed
    }

    /// Switch occupant keying from slot index to identity.
    pub(crate) fn key_by_identity(&mut self) {
        if let Occupants::Slotted(m) = &mut self.occupants {
            let by_id = std::mem::take(m)
                .into_values()
                .map(|p| (p.id, p))
                .collect();
            self.occupants = Occupants::Active(by_id);
        }
    }

    pub fn team_of(&self, id: PlayerId) -> Option<Team> {
        if self.infected.contains(&id) {
            Some(Team::Infected)
        } else if self.healthy.contains(&id) {
            Some(Team::Healthy)
        } else {
            None
        }
    }

    /// Give an occupant a role, dropping any previous one.
    pub(crate) fn set_team(&mut self, id: PlayerId, team: Team) -> bool {
        if !self.contains(id) {
            return false;
        }
        match team {
            Team::Infected => {
                self.healthy.remove(&id);
                self.infected.insert(id);
            },
            Team::Healthy => {
                self.infected.remove(&id);
                self.healthy.insert(id);
            },
        }
        true
    }

    pub fn infected_count(&self) -> usize {
        self.infected.len()
    }

    pub fn healthy_count(&self) -> usize {
        self.healthy.len()
    }

    /// Members of a team in ascending id order.
    pub fn team_members(&self, team: Team) -> Vec<PlayerId> {
        let set = match team {
            Team::Infected => &self.infected,
            Team::Healthy => &self.healthy,
        };
        let mut ids: Vec<PlayerId> = set.iter().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub(crate) fn clear_teams(&mut self) {
        self.infected.clear();
        self.healthy.clear();
    }

    pub(crate) fn mark_pending_respawn(&mut self, id: PlayerId) {
        self.pending_respawn.insert(id);
    }

    pub(crate) fn take_pending_respawn(&mut self, id: PlayerId) -> bool {
        self.pending_respawn.remove(&id)
    }

    pub fn is_pending_respawn(&self, id: PlayerId) -> bool {
        self.pending_respawn.contains(&id)
    }

    /// Back to an empty lobby with fresh countdowns.
    pub(crate) fn reset_to_lobby(&mut self, countdowns: Countdowns) {
        self.phase = ArenaPhase::Lobby;
        self.occupants = Occupants::default();
        self.clear_teams();
        self.round_started = false;
        self.countdowns = countdowns;
    }

    /// Check the membership invariants. Returns a description of the first
    /// violation found.
    pub fn check_invariants(&self) -> Result<(), String> {
        if let Some(id) = self.infected.intersection(&self.healthy).next() {
            return Err(format!("player {id} is both infected and healthy"));
        }
        if let Some(id) = self
            .infected
            .iter()
            .chain(self.healthy.iter())
            .find(|id| !self.contains(**id))
        {
            return Err(format!("player {id} has a role but is not an occupant"));
        }
        let ids = self.occupant_ids();
        let unique: HashSet<_> = ids.iter().collect();
        if unique.len() != ids.len() {
            return Err("a player holds more than one occupant key".to_string());
        }
        match (&self.phase, &self.occupants) {
            (ArenaPhase::Lobby, Occupants::Active(_)) => {
                return Err("lobby occupants must be keyed by slot".to_string());
            },
            (ArenaPhase::Game | ArenaPhase::Restart, Occupants::Slotted(m)) if !m.is_empty() => {
                return Err("in-game occupants must be keyed by identity".to_string());
            },
            _ => {},
        }
        if self.phase == ArenaPhase::Game
            && let Some(id) = ids.iter().find(|id| self.team_of(**id).is_none())
        {
            return Err(format!("player {id} has no role during the game"));
        }
        Ok(())
    }
}
