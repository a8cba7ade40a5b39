pub mod admission;
pub mod config;
pub mod infection;
pub mod loot;
pub mod roles;
pub mod scoring;
pub mod session;
pub mod signage;

use std::sync::Arc;

use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use outbreak_core::actions::{Channel, HostAction, Sound, StatusEffect};
use outbreak_core::arena::{ArenaConfig, ArenaLayout, ArenaPhase};
use outbreak_core::events::{PlayerEvent, Verdict};
use outbreak_core::player::{GameMode, Player, PlayerId, Team};
use outbreak_core::position::Destination;
use outbreak_core::services::{MapService, StatsService};
use outbreak_core::time::format_countdown;

use admission::{ArenaError, LeaveCause};
use config::InfectionConfig;
use scoring::RoundOutcome;
use session::{ArenaSession, Countdowns};
use signage::SignView;

/// Collaborators an arena is constructed with.
#[derive(Clone)]
pub struct ArenaServices {
    pub stats: Arc<dyn StatsService>,
    pub maps: Arc<dyn MapService>,
}

/// Serializable view of an arena for status output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArenaSnapshot {
    pub name: String,
    pub setup: bool,
    pub phase: ArenaPhase,
    pub slots: u32,
    pub players: Vec<Player>,
    pub infected: Vec<PlayerId>,
    pub healthy: Vec<PlayerId>,
    pub countdowns: Countdowns,
}

/// One infection arena: its configuration, round state and the side effects
/// it has queued for the host.
///
/// All mutation goes through `&mut self`, so a single owner serializes ticks,
/// joins and damage resolution.
pub struct InfectionArena {
    config: ArenaConfig,
    /// `None` while the arena is in setup mode.
    layout: Option<ArenaLayout>,
    session: ArenaSession,
    tuning: InfectionConfig,
    stats: Arc<dyn StatsService>,
    maps: Arc<dyn MapService>,
    rng: StdRng,
    actions: Vec<HostAction>,
}

impl InfectionArena {
    /// Load an arena. An arena whose file fails validation stays in setup
    /// mode: it renders a placeholder sign and admits nobody.
    pub fn new(
        mut config: ArenaConfig,
        services: ArenaServices,
        rng: StdRng,
        tuning: InfectionConfig,
    ) -> Self {
        let layout = match config.validate(services.maps.as_ref()) {
            Ok(layout) => {
                config.enabled = true;
                if let Err(e) = services.maps.save_map(&layout.level) {
                    tracing::warn!(arena = %config.name, level = %layout.level, error = %e, "Could not snapshot arena level");
                }
                tracing::info!(arena = %config.name, level = %layout.level, slots = config.slots, "Arena enabled");
                Some(layout)
            },
            Err(e) => {
                config.enabled = false;
                tracing::warn!(arena = %config.name, error = %e, "Arena entering setup mode");
                None
            },
        };
        let session = ArenaSession::new(Countdowns::from_config(&config));
        Self {
            config,
            layout,
            session,
            tuning: tuning.sanitized(),
            stats: services.stats,
            maps: services.maps,
            rng,
            actions: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn is_setup(&self) -> bool {
        self.layout.is_none()
    }

    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    pub fn session(&self) -> &ArenaSession {
        &self.session
    }

    /// Take every host action queued since the last drain, in order.
    pub fn drain_actions(&mut self) -> Vec<HostAction> {
        std::mem::take(&mut self.actions)
    }

    pub fn snapshot(&self) -> ArenaSnapshot {
        ArenaSnapshot {
            name: self.config.name.clone(),
            setup: self.is_setup(),
            phase: self.session.phase(),
            slots: self.config.slots,
            players: self.session.players().into_iter().cloned().collect(),
            infected: self.session.team_members(Team::Infected),
            healthy: self.session.team_members(Team::Healthy),
            countdowns: self.session.countdowns(),
        }
    }

    /// Dispatch one player event and tell the host what to do with it.
    pub fn handle(&mut self, event: PlayerEvent) -> Verdict {
        match event {
            PlayerEvent::JoinRequest { player } => {
                let id = player.id;
                if let Err(e) = self.join(player) {
                    tracing::debug!(arena = %self.name(), player_id = id, error = %e, "Join refused");
                    self.tell(id, format!("> {e}"), Channel::Chat);
                }
                Verdict::Allow
            },
            PlayerEvent::Damage { attacker, target } => self.on_damage(attacker, target),
            PlayerEvent::Death { player, message } => self.on_death(player, &message),
            PlayerEvent::Disconnect { player } => {
                self.session.take_pending_respawn(player);
                let _ = self.leave(player, LeaveCause::Disconnect);
                Verdict::Allow
            },
            PlayerEvent::LevelChange { player } => {
                let _ = self.leave(player, LeaveCause::LevelChange);
                Verdict::Allow
            },
            PlayerEvent::Respawn { player } => self.on_respawn(player),
            PlayerEvent::Chat { player, message } => self.on_chat(player, &message),
            PlayerEvent::Sneak { player, sneaking } => self.on_sneak(player, sneaking),
            PlayerEvent::BlockBreak { player, block }
            | PlayerEvent::BlockPlace { player, block } => self.on_block_change(player, block),
            PlayerEvent::Interact {
                player,
                level,
                position,
                block,
            } => self.on_interact(player, &level, position, block),
            PlayerEvent::Move { player, position } => self.on_move(player, position),
            PlayerEvent::Exhaust { player } => self.on_exhaust(player),
        }
    }

    /// Advance the arena by one second. At most one phase transition fires
    /// per tick.
    pub fn tick(&mut self) {
        self.refresh_sign();
        if self.is_setup() {
            return;
        }
        match self.session.phase() {
            ArenaPhase::Lobby => self.tick_lobby(),
            ArenaPhase::Game => self.tick_game(),
            ArenaPhase::Restart => self.tick_restart(),
        }
    }

    /// Administrative reset: skip straight to RESTART without rewards.
    pub fn force_restart(&mut self) -> Result<(), ArenaError> {
        if self.is_setup() {
            return Err(ArenaError::ArenaDisabled);
        }
        if self.session.phase() == ArenaPhase::Restart {
            return Err(ArenaError::WrongPhase(ArenaPhase::Restart));
        }
        tracing::info!(arena = %self.name(), phase = ?self.session.phase(), "Forced restart");
        self.session.key_by_identity();
        self.broadcast("> The round was stopped by an administrator.", Channel::Chat);
        self.enter_restart();
        Ok(())
    }

    fn tick_lobby(&mut self) {
        if self.session.occupant_count() < self.tuning.min_players {
            self.session.countdowns.lobby = self.config.wait_time;
            if self.session.occupant_count() > 0 {
                self.broadcast("Waiting for more players...", Channel::Tip);
            }
            return;
        }
        self.session.countdowns.lobby = self.session.countdowns.lobby.saturating_sub(1);
        let remaining = self.session.countdowns.lobby;
        if remaining == 0 {
            self.play_sound_all(Sound::AnvilUse);
            self.start_game();
        } else {
            self.play_sound_all(Sound::Click);
            self.broadcast(
                format!("Game starts in {}", format_countdown(remaining)),
                Channel::Tip,
            );
        }
    }

    fn tick_game(&mut self) {
        let level = self.level().to_string();
        self.push(HostAction::SetLevelTime {
            level,
            time: self.tuning.night_time,
        });
        let (infected, healthy) = (self.session.infected_count(), self.session.healthy_count());
        self.broadcast(
            format!(
                "Players: [{infected}/{healthy}]. Time left: {}",
                format_countdown(self.session.countdowns.game)
            ),
            Channel::Tip,
        );
        self.apply_team_effects();

        self.session.countdowns.game = self.session.countdowns.game.saturating_sub(1);
        let over = scoring::is_round_over(infected, healthy, self.session.occupant_count());
        if over || self.session.countdowns.game == 0 {
            self.start_restart();
        }
    }

    fn tick_restart(&mut self) {
        self.session.countdowns.restart = self.session.countdowns.restart.saturating_sub(1);
        let remaining = self.session.countdowns.restart;
        if remaining == 0 {
            self.finish_restart();
        } else {
            self.broadcast(
                format!("Restarting in {}", format_countdown(remaining)),
                Channel::Tip,
            );
        }
    }

    fn apply_team_effects(&mut self) {
        let secs = self.tuning.team_effect_secs;
        for id in self.session.team_members(Team::Infected) {
            self.push(HostAction::ApplyEffect {
                player: id,
                effect: StatusEffect::Speed,
                seconds: secs,
                amplifier: self.tuning.infected_speed_amplifier,
            });
            self.push(HostAction::ApplyEffect {
                player: id,
                effect: StatusEffect::NightVision,
                seconds: secs,
                amplifier: 0,
            });
        }
        for id in self.session.team_members(Team::Healthy) {
            self.push(HostAction::ApplyEffect {
                player: id,
                effect: StatusEffect::Blindness,
                seconds: secs,
                amplifier: 0,
            });
            self.push(HostAction::ApplyEffect {
                player: id,
                effect: StatusEffect::JumpBoost,
                seconds: secs,
                amplifier: 0,
            });
        }
    }

    fn start_game(&mut self) {
        let players: Vec<Player> = self.session.players().into_iter().cloned().collect();
        let roles = roles::assign_roles(&players, self.stats.as_ref(), &mut self.rng);

        self.session.key_by_identity();
        for &id in &roles.infected {
            self.session.set_team(id, Team::Infected);
        }
        for &id in &roles.healthy {
            self.session.set_team(id, Team::Healthy);
        }
        self.session.phase = ArenaPhase::Game;
        self.session.mark_round_started();
        self.session.countdowns.game = self.config.game_time;

        for &id in &roles.infected {
            self.announce_role(id, Team::Infected);
        }
        for &id in &roles.healthy {
            self.announce_role(id, Team::Healthy);
        }
        for &id in &roles.guaranteed {
            self.tell(id, "> You used a guaranteed infection.", Channel::Chat);
        }
        self.fill_containers();

        tracing::info!(
            arena = %self.name(),
            phase = ?ArenaPhase::Game,
            infected = roles.infected.len(),
            healthy = roles.healthy.len(),
            "Round started"
        );
    }

    fn announce_role(&mut self, id: PlayerId, team: Team) {
        self.push(HostAction::SetGameMode {
            player: id,
            mode: GameMode::Survival,
        });
        self.push(HostAction::SetNameTag {
            player: id,
            tag: Some(team.name_tag().to_string()),
        });
        let (title, hint) = match team {
            Team::Infected => ("You are INFECTED", "> Hit the survivors to infect them!"),
            Team::Healthy => ("You are HEALTHY", "> Survive until the time runs out!"),
        };
        self.tell(id, title, Channel::Title);
        self.tell(id, hint, Channel::Chat);
    }

    fn fill_containers(&mut self) {
        let Some(layout) = self.layout.as_ref() else {
            return;
        };
        let level = layout.level.clone();
        let chests = layout.chests.clone();
        for position in chests {
            let items = loot::roll_container(&mut self.rng);
            self.push(HostAction::FillContainer {
                level: level.clone(),
                position,
                items,
            });
        }
    }

    /// End the round: pay the winners, then count down to the map reset.
    fn start_restart(&mut self) {
        let outcome =
            scoring::decide_outcome(self.session.infected_count(), self.session.healthy_count());
        match outcome {
            RoundOutcome::Won(team) => self.reward(team),
            RoundOutcome::Abandoned => {
                tracing::info!(arena = %self.name(), "Round ended with nobody left to reward");
            },
        }
        self.enter_restart();
    }

    fn reward(&mut self, team: Team) {
        let (losing, multiplier) = match team {
            Team::Infected => (Team::Healthy, self.tuning.infected_reward_multiplier),
            Team::Healthy => (Team::Infected, self.tuning.healthy_reward_multiplier),
        };
        let winners = self.session.team_members(team);
        let prize = scoring::prize_per_winner(winners.len(), multiplier);
        for &id in &winners {
            let Some(name) = self.session.player(id).map(|p| p.name.clone()) else {
                continue;
            };
            self.stats.add_win(&name);
            self.stats.add_coins(&name, prize);
            self.tell(id, "You won!", Channel::Title);
            self.tell(id, format!("> You earned {prize} coins!"), Channel::Chat);
        }
        for id in self.session.team_members(losing) {
            self.tell(id, "You lost!", Channel::Title);
        }
        let level = self.level().to_string();
        self.push(HostAction::ServerBroadcast {
            text: format!("> The {team} team won the game on {level}!"),
        });
        tracing::info!(
            arena = %self.name(),
            winner = %team,
            winners = winners.len(),
            prize,
            "Round won"
        );
    }

    fn enter_restart(&mut self) {
        self.session.clear_teams();
        self.session.phase = ArenaPhase::Restart;
        self.session.countdowns.restart = self.config.restart_time;
        tracing::info!(arena = %self.name(), phase = ?ArenaPhase::Restart, "Arena restarting");
    }

    fn finish_restart(&mut self) {
        let players: Vec<Player> = self.session.players().into_iter().cloned().collect();
        let played = self.session.round_started();
        for player in &players {
            if played {
                self.stats.add_game(&player.name);
            }
            self.push(HostAction::SetNameTag {
                player: player.id,
                tag: None,
            });
            self.push(HostAction::ResetPlayer {
                player: player.id,
                mode: GameMode::Default,
            });
            self.push(HostAction::Teleport {
                player: player.id,
                to: Destination::ServerLobby,
            });
        }
        self.reload_map();
        self.session
            .reset_to_lobby(Countdowns::from_config(&self.config));
        tracing::info!(arena = %self.name(), phase = ?ArenaPhase::Lobby, "Arena back in lobby");
    }

    /// Restore the level from its snapshot, retrying once before giving up.
    fn reload_map(&mut self) {
        let level = self.level().to_string();
        let result = self.maps.load_map(&level).or_else(|e| {
            tracing::warn!(arena = %self.name(), level = %level, error = %e, "Map reload failed, retrying");
            self.maps.load_map(&level)
        });
        match result {
            Ok(handle) => {
                tracing::debug!(arena = %self.name(), level = %handle.level, generation = handle.generation, "Map reloaded");
            },
            Err(e) => {
                tracing::error!(arena = %self.name(), level = %level, error = %e, "Map reload failed");
            },
        }
    }

    fn refresh_sign(&mut self) {
        let Some(sign) = self.config.sign_ref() else {
            return;
        };
        let lines = signage::sign_lines(&SignView {
            setup: self.is_setup(),
            phase: self.session.phase(),
            occupants: self.session.occupant_count(),
            slots: self.config.slots,
            game_countdown: self.session.countdowns.game,
            level: self.level(),
        });
        self.push(HostAction::UpdateSign { sign, lines });
    }

    fn level(&self) -> &str {
        match &self.layout {
            Some(layout) => &layout.level,
            None => self.config.level.as_deref().unwrap_or_default(),
        }
    }

    fn play_sound_all(&mut self, sound: Sound) {
        for id in self.session.occupant_ids() {
            self.push(HostAction::PlaySound { player: id, sound });
        }
    }

    pub(crate) fn push(&mut self, action: HostAction) {
        self.actions.push(action);
    }

    /// Message every occupant.
    pub(crate) fn broadcast(&mut self, text: impl Into<String>, channel: Channel) {
        let recipients = self.session.occupant_ids();
        if recipients.is_empty() {
            return;
        }
        self.push(HostAction::Notify {
            recipients,
            text: text.into(),
            channel,
        });
    }

    pub(crate) fn tell(&mut self, player: PlayerId, text: impl Into<String>, channel: Channel) {
        self.push(HostAction::Notify {
            recipients: vec![player],
            text: text.into(),
            channel,
        });
    }

    pub(crate) fn player_name(&self, id: PlayerId) -> String {
        self.session
            .player(id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| id.to_string())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{arena_with, lobby_arena, running_arena};
    use outbreak_core::position::Vec3;
    use outbreak_core::test_helpers::{
        RecordingStats, StatsCall, make_players, valid_arena_config,
    };

    fn tick_until(arena: &mut InfectionArena, phase: ArenaPhase, limit: usize) {
        for _ in 0..limit {
            if arena.session().phase() == phase {
                return;
            }
            arena.tick();
        }
        assert_eq!(arena.session().phase(), phase);
    }

    #[test]
    fn valid_arena_enables_and_snapshots_level() {
        let mut cfg = valid_arena_config("alpha", 4);
        cfg.enabled = false;
        let (arena, _, maps) = arena_with(cfg, 1);
        assert!(!arena.is_setup());
        assert!(arena.config().enabled);
        assert_eq!(maps.save_count(), 1);
    }

    #[test]
    fn setup_mode_only_renders_placeholder_sign() {
        let mut cfg = valid_arena_config("broken", 4);
        cfg.level = Some("missing".to_string());
        let (mut arena, _, _) = arena_with(cfg, 1);
        arena.tick();
        let actions = arena.drain_actions();
        assert_eq!(actions.len(), 1);
        let HostAction::UpdateSign { lines, .. } = &actions[0] else {
            panic!("expected sign update, got {actions:?}");
        };
        assert_eq!(lines[2], "Setup");
        assert_eq!(arena.force_restart(), Err(ArenaError::ArenaDisabled));
    }

    #[test]
    fn lobby_waits_for_two_players() {
        let (mut arena, _, _) = lobby_arena(4);
        arena.join(make_players(1).remove(0)).unwrap();
        for _ in 0..100 {
            arena.tick();
        }
        assert_eq!(arena.session().phase(), ArenaPhase::Lobby);
        assert_eq!(arena.session().countdowns().lobby, 30);
    }

    #[test]
    fn lobby_countdown_resets_when_players_drop_below_two() {
        let (mut arena, _, _) = lobby_arena(4);
        for p in make_players(2) {
            arena.join(p).unwrap();
        }
        for _ in 0..5 {
            arena.tick();
        }
        assert_eq!(arena.session().countdowns().lobby, 25);

        arena.leave(2, LeaveCause::Voluntary).unwrap();
        arena.tick();
        assert_eq!(arena.session().countdowns().lobby, 30);
    }

    #[test]
    fn lobby_countdown_plays_click_then_anvil() {
        let (mut arena, _, _) = lobby_arena(4);
        for p in make_players(2) {
            arena.join(p).unwrap();
        }
        arena.drain_actions();
        arena.tick();
        assert!(arena.drain_actions().contains(&HostAction::PlaySound {
            player: 1,
            sound: Sound::Click
        }));
        for _ in 0..28 {
            arena.tick();
        }
        arena.drain_actions();
        arena.tick();
        assert_eq!(arena.session().phase(), ArenaPhase::Game);
        assert!(arena.drain_actions().contains(&HostAction::PlaySound {
            player: 2,
            sound: Sound::AnvilUse
        }));
    }

    #[test]
    fn game_entry_assigns_every_player_a_role() {
        let (arena, _, _) = running_arena(5, 42);
        let s = arena.session();
        assert_eq!(s.phase(), ArenaPhase::Game);
        assert_eq!(s.infected_count(), 1);
        assert_eq!(s.healthy_count(), 4);
        assert!(s.check_invariants().is_ok());
        assert_eq!(s.countdowns().game, 180);
    }

    #[test]
    fn game_entry_fills_configured_chests() {
        let mut cfg = valid_arena_config("loot", 4);
        cfg.chests = vec!["1,64,1".to_string(), "2,64,2".to_string()];
        let (mut arena, _, _) = arena_with(cfg, 3);
        for p in make_players(2) {
            arena.join(p).unwrap();
        }
        let mut fills = 0;
        for _ in 0..30 {
            arena.tick();
            fills += arena
                .drain_actions()
                .iter()
                .filter(|a| matches!(a, HostAction::FillContainer { .. }))
                .count();
        }
        assert_eq!(arena.session().phase(), ArenaPhase::Game);
        assert_eq!(fills, 2);
    }

    #[test]
    fn game_tick_applies_team_effects_at_night() {
        let (mut arena, _, _) = running_arena(3, 7);
        let infected = arena.session().team_members(Team::Infected)[0];
        let healthy = arena.session().team_members(Team::Healthy)[0];
        arena.tick();
        let actions = arena.drain_actions();
        assert!(actions.contains(&HostAction::SetLevelTime {
            level: "zombies".to_string(),
            time: 14000
        }));
        assert!(actions.contains(&HostAction::ApplyEffect {
            player: infected,
            effect: StatusEffect::Speed,
            seconds: 5,
            amplifier: 4
        }));
        assert!(actions.contains(&HostAction::ApplyEffect {
            player: healthy,
            effect: StatusEffect::Blindness,
            seconds: 5,
            amplifier: 0
        }));
        assert!(actions.iter().any(|a| matches!(
            a,
            HostAction::Notify { text, channel: Channel::Tip, .. }
                if text == "Players: [1/2]. Time left: 3:00"
        )));
        assert_eq!(arena.session().countdowns().game, 179);
    }

    #[test]
    fn three_infected_winners_get_thirty_coins() {
        let (mut arena, stats, _) = running_arena(3, 11);
        for id in 1..=3 {
            arena.session.set_team(id, Team::Infected);
        }
        arena.tick();
        assert_eq!(arena.session().phase(), ArenaPhase::Restart);
        for id in 1..=3 {
            let name = format!("Player{id}");
            assert!(stats.calls().contains(&StatsCall::AddCoins(name.clone(), 30)));
            assert_eq!(stats.get(&name).wins, 1);
        }
        assert!(arena.drain_actions().iter().any(|a| matches!(
            a,
            HostAction::ServerBroadcast { text } if text.contains("infected team won")
        )));
    }

    #[test]
    fn five_healthy_winners_get_five_hundred_coins() {
        let (mut arena, stats, _) = running_arena(6, 12);
        let infected = arena.session().team_members(Team::Infected)[0];
        arena.leave(infected, LeaveCause::Disconnect).unwrap();
        arena.tick();
        assert_eq!(arena.session().phase(), ArenaPhase::Restart);
        let coin_calls: Vec<_> = stats
            .calls()
            .into_iter()
            .filter(|c| matches!(c, StatsCall::AddCoins(..)))
            .collect();
        assert_eq!(coin_calls.len(), 5);
        assert!(coin_calls.iter().all(|c| matches!(c, StatsCall::AddCoins(_, 500))));
    }

    #[test]
    fn timeout_with_survivors_is_a_healthy_win() {
        let (mut arena, stats, _) = running_arena(3, 5);
        for _ in 0..179 {
            arena.tick();
        }
        assert_eq!(arena.session().phase(), ArenaPhase::Game);
        arena.tick();
        assert_eq!(arena.session().phase(), ArenaPhase::Restart);
        let calls = stats.calls();
        let wins = calls
            .iter()
            .filter(|c| matches!(c, StatsCall::AddWin(_)))
            .count();
        assert_eq!(wins, 2, "both survivors win");
        assert!(
            calls
                .iter()
                .filter(|c| matches!(c, StatsCall::AddCoins(..)))
                .all(|c| matches!(c, StatsCall::AddCoins(_, 200)))
        );
    }

    #[test]
    fn full_round_trip_returns_to_empty_lobby() {
        let (mut arena, stats, maps) = running_arena(4, 99);
        tick_until(&mut arena, ArenaPhase::Restart, 200);
        tick_until(&mut arena, ArenaPhase::Lobby, 20);

        let s = arena.session();
        assert_eq!(s.occupant_count(), 0);
        assert_eq!(s.infected_count(), 0);
        assert_eq!(s.healthy_count(), 0);
        assert_eq!(
            s.countdowns(),
            Countdowns {
                lobby: 30,
                game: 180,
                restart: 10
            }
        );
        assert_eq!(maps.load_count(), 1);
        for id in 1..=4 {
            assert_eq!(stats.get(&format!("Player{id}")).games, 1);
        }
        assert!(arena.drain_actions().contains(&HostAction::Teleport {
            player: 1,
            to: Destination::ServerLobby
        }));
    }

    #[test]
    fn failed_map_reload_is_retried() {
        let (mut arena, _, maps) = running_arena(2, 4);
        maps.fail_next_loads(1);
        assert!(arena.force_restart().is_ok());
        tick_until(&mut arena, ArenaPhase::Lobby, 20);
        assert_eq!(maps.load_count(), 2);
    }

    #[test]
    fn unrecoverable_map_reload_still_reopens_lobby() {
        let (mut arena, _, maps) = running_arena(2, 4);
        maps.fail_next_loads(5);
        arena.force_restart().unwrap();
        tick_until(&mut arena, ArenaPhase::Lobby, 20);
        assert_eq!(maps.load_count(), 2);
        assert!(arena.join(make_players(1).remove(0)).is_ok());
    }

    #[test]
    fn force_restart_skips_rewards() {
        let (mut arena, stats, _) = running_arena(3, 8);
        arena.force_restart().unwrap();
        assert_eq!(arena.session().phase(), ArenaPhase::Restart);
        assert!(
            !stats
                .calls()
                .iter()
                .any(|c| matches!(c, StatsCall::AddCoins(..) | StatsCall::AddWin(_)))
        );
        assert_eq!(
            arena.force_restart(),
            Err(ArenaError::WrongPhase(ArenaPhase::Restart))
        );
    }

    #[test]
    fn force_restart_from_lobby_rekeys_occupants() {
        let (mut arena, _, _) = lobby_arena(4);
        for p in make_players(2) {
            arena.join(p).unwrap();
        }
        arena.force_restart().unwrap();
        assert!(arena.session().check_invariants().is_ok());
        tick_until(&mut arena, ArenaPhase::Lobby, 20);
        assert_eq!(arena.session().occupant_count(), 0);
    }

    #[test]
    fn lobby_reset_counts_no_games() {
        let (mut arena, stats, _) = lobby_arena(4);
        for p in make_players(3) {
            arena.join(p).unwrap();
        }
        arena.force_restart().unwrap();
        assert!(!arena.session().round_started());
        arena.leave(3, LeaveCause::Voluntary).unwrap();
        tick_until(&mut arena, ArenaPhase::Lobby, 20);
        assert!(
            !stats
                .calls()
                .iter()
                .any(|c| matches!(c, StatsCall::AddGame(_))),
            "nobody played a round"
        );
    }

    #[test]
    fn round_flag_clears_when_lobby_reopens() {
        let (mut arena, stats, _) = running_arena(2, 5);
        assert!(arena.session().round_started());
        arena.force_restart().unwrap();
        tick_until(&mut arena, ArenaPhase::Lobby, 20);
        assert!(!arena.session().round_started());
        let games = |stats: &RecordingStats| {
            stats
                .calls()
                .iter()
                .filter(|c| matches!(c, StatsCall::AddGame(_)))
                .count()
        };
        assert_eq!(games(stats.as_ref()), 2);

        for p in make_players(2) {
            arena.join(p).unwrap();
        }
        arena.force_restart().unwrap();
        tick_until(&mut arena, ArenaPhase::Lobby, 20);
        assert_eq!(games(stats.as_ref()), 2);
    }

    #[test]
    fn join_during_game_is_refused_with_message() {
        let (mut arena, _, _) = running_arena(2, 1);
        let v = arena.handle(PlayerEvent::JoinRequest {
            player: crate::test_support::player(30),
        });
        assert_eq!(v, Verdict::Allow);
        assert!(!arena.session().contains(30));
        assert!(arena.drain_actions().iter().any(|a| a.targets(30)));
    }

    #[test]
    fn sign_reflects_phase_and_occupancy() {
        let (mut arena, _, _) = lobby_arena(4);
        arena.join(make_players(1).remove(0)).unwrap();
        arena.drain_actions();
        arena.tick();
        let sign = arena.drain_actions().into_iter().find_map(|a| match a {
            HostAction::UpdateSign { sign, lines } => Some((sign, lines)),
            _ => None,
        });
        let (sign, lines) = sign.expect("sign update");
        assert!(sign.same_block("hub", &Vec3::new(5.0, 64.0, 5.0)));
        assert_eq!(lines[1], "[ 1 / 4 ]");
        assert_eq!(lines[2], "Join");
        assert_eq!(lines[3], "Map: zombies");
    }

    #[test]
    fn snapshot_lists_players_and_teams() {
        let (arena, _, _) = running_arena(3, 2);
        let snap = arena.snapshot();
        assert_eq!(snap.phase, ArenaPhase::Game);
        assert_eq!(snap.players.len(), 3);
        assert_eq!(snap.infected.len() + snap.healthy.len(), 3);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Join(u64),
            Leave(u64),
            Hit(u64, u64),
            Die(u64),
            Chat(u64),
            Tick(u8),
            Reset,
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                (1u64..8).prop_map(Op::Join),
                (1u64..8).prop_map(Op::Leave),
                (1u64..8, 1u64..8).prop_map(|(a, b)| Op::Hit(a, b)),
                (1u64..8).prop_map(Op::Die),
                (1u64..8).prop_map(Op::Chat),
                (1u8..40).prop_map(Op::Tick),
                Just(Op::Reset),
            ]
        }

        proptest! {
            #[test]
            fn teams_stay_disjoint(seed in any::<u64>(), ops in prop::collection::vec(op(), 1..80)) {
                let mut cfg = valid_arena_config("prop", 4);
                cfg.wait_time = 3;
                cfg.game_time = 20;
                cfg.restart_time = 2;
                let (mut arena, _, _) = arena_with(cfg, seed);
                let mut game_roster: Option<Vec<PlayerId>> = None;
                for op in ops {
                    match op {
                        Op::Join(id) => {
                            let _ = arena.join(crate::test_support::player(id));
                        },
                        Op::Leave(id) => {
                            let _ = arena.leave(id, LeaveCause::Voluntary);
                        },
                        Op::Hit(a, b) => {
                            arena.handle(PlayerEvent::Damage { attacker: a, target: b });
                        },
                        Op::Die(id) => {
                            arena.handle(PlayerEvent::Death { player: id, message: "died".to_string() });
                        },
                        Op::Chat(id) => {
                            arena.handle(PlayerEvent::Chat { player: id, message: "leave".to_string() });
                        },
                        Op::Tick(n) => {
                            for _ in 0..n {
                                arena.tick();
                            }
                        },
                        Op::Reset => {
                            let _ = arena.force_restart();
                        },
                    }
                    let s = arena.session();
                    prop_assert!(s.check_invariants().is_ok(), "{:?}", s.check_invariants());
                    prop_assert!(s.occupant_count() <= 4);
                    if s.phase() == ArenaPhase::Game {
                        let roster = game_roster.get_or_insert_with(|| s.occupant_ids());
                        let mut teams = s.team_members(Team::Infected);
                        teams.extend(s.team_members(Team::Healthy));
                        teams.sort_unstable();
                        prop_assert!(teams.iter().all(|id| roster.contains(id)));
                        prop_assert_eq!(teams, s.occupant_ids());
                    } else {
                        game_roster = None;
                    }
                    arena.drain_actions();
                }
            }
        }
    }
}
