use serde::{Deserialize, Serialize};

/// Data-driven tuning for the infection mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InfectionConfig {
    /// A bite converts its target with probability `1 / infection_chance_denominator`.
    pub infection_chance_denominator: u32,
    /// Poison applied to an attacker whose bite failed (seconds).
    pub miss_penalty_secs: u32,
    pub miss_penalty_amplifier: u8,
    /// Coins per winning infected player, multiplied by the team size.
    pub infected_reward_multiplier: u64,
    /// Coins per winning healthy player, multiplied by the team size.
    pub healthy_reward_multiplier: u64,
    /// Duration of the per-tick team effects (seconds).
    pub team_effect_secs: u32,
    pub infected_speed_amplifier: u8,
    /// Lobby occupants further than this from their spawn are snapped back.
    pub lobby_clamp_distance: f64,
    /// Level time forced while a round is running.
    pub night_time: u32,
    /// Occupants needed before the lobby countdown runs.
    pub min_players: usize,
}

impl Default for InfectionConfig {
    fn default() -> Self {
        Self {
            infection_chance_denominator: 3,
            miss_penalty_secs: 2,
            miss_penalty_amplifier: 1,
            infected_reward_multiplier: 10,
            healthy_reward_multiplier: 100,
            team_effect_secs: 5,
            infected_speed_amplifier: 4,
            lobby_clamp_distance: 1.0,
            night_time: 14000,
            min_players: 2,
        }
    }
}

impl InfectionConfig {
    /// Load config from environment or TOML file, falling back to defaults.
    pub fn load() -> Self {
        if let Ok(path) = std::env::var("OUTBREAK_INFECTION_CONFIG")
            && let Ok(contents) = std::fs::read_to_string(&path)
        {
            match toml::from_str::<Self>(&contents) {
                Ok(config) => return config.sanitized(),
                Err(e) => tracing::warn!(path = %path, error = %e, "Invalid infection config"),
            }
        }
        if let Ok(contents) = std::fs::read_to_string("config/infection.toml")
            && let Ok(config) = toml::from_str::<Self>(&contents)
        {
            return config.sanitized();
        }
        Self::default()
    }

    /// Replace values that would break the round logic with their defaults.
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if self.infection_chance_denominator == 0 {
            self.infection_chance_denominator = defaults.infection_chance_denominator;
        }
        if self.min_players < 2 {
            self.min_players = defaults.min_players;
        }
        if !self.lobby_clamp_distance.is_finite() || self.lobby_clamp_distance < 0.0 {
            self.lobby_clamp_distance = defaults.lobby_clamp_distance;
        }
        self
    }
}
