use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ServerError;

/// Top-level server configuration, loaded from `outbreak.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Directory of `*.json` arena files.
    pub arenas_dir: PathBuf,
    /// Live level directories, one per level name.
    pub worlds_dir: PathBuf,
    /// Snapshots taken when an arena is enabled.
    pub backups_dir: PathBuf,
    pub stats_path: PathBuf,
    /// Arena tick period in milliseconds. One tick is one countdown second.
    pub tick_ms: u64,
    /// Seed for every arena's random source. Unset means OS entropy.
    pub rng_seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            arenas_dir: PathBuf::from("arenas"),
            worlds_dir: PathBuf::from("worlds"),
            backups_dir: PathBuf::from("backups"),
            stats_path: PathBuf::from("stats.json"),
            tick_ms: 1000,
            rng_seed: None,
        }
    }
}

impl ServerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    /// Reject configurations the runtime cannot work with.
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.tick_ms == 0 {
            return Err(ServerError::Config("tick_ms must be > 0".to_string()));
        }
        for (field, path) in [
            ("arenas_dir", &self.arenas_dir),
            ("worlds_dir", &self.worlds_dir),
            ("backups_dir", &self.backups_dir),
            ("stats_path", &self.stats_path),
        ] {
            if path.as_os_str().is_empty() {
                return Err(ServerError::Config(format!("{field} must not be empty")));
            }
        }
        if self.worlds_dir == self.backups_dir {
            return Err(ServerError::Config(
                "worlds_dir and backups_dir must differ".to_string(),
            ));
        }
        Ok(())
    }

    /// Load config from `outbreak.toml` if it exists, then apply env var overrides.
    pub fn load() -> Self {
        let mut config = match std::fs::read_to_string("outbreak.toml") {
            Ok(content) => match toml::from_str::<ServerConfig>(&content) {
                Ok(cfg) => {
                    tracing::info!("Loaded configuration from outbreak.toml");
                    cfg
                },
                Err(e) => {
                    tracing::warn!("Failed to parse outbreak.toml: {e}, using defaults");
                    ServerConfig::default()
                },
            },
            Err(_) => {
                tracing::info!("No outbreak.toml found, using defaults");
                ServerConfig::default()
            },
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config
    }

    /// Apply `OUTBREAK_*` overrides from `lookup`. Empty or unparsable values
    /// are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(dir) = var("OUTBREAK_ARENAS_DIR") {
            self.arenas_dir = PathBuf::from(dir);
        }
        if let Some(dir) = var("OUTBREAK_WORLDS_DIR") {
            self.worlds_dir = PathBuf::from(dir);
        }
        if let Some(dir) = var("OUTBREAK_BACKUPS_DIR") {
            self.backups_dir = PathBuf::from(dir);
        }
        if let Some(path) = var("OUTBREAK_STATS_PATH") {
            self.stats_path = PathBuf::from(path);
        }
        if let Some(val) = var("OUTBREAK_TICK_MS")
            && let Ok(ms) = val.parse::<u64>()
        {
            self.tick_ms = ms;
        }
        if let Some(val) = var("OUTBREAK_RNG_SEED")
            && let Ok(seed) = val.parse::<u64>()
        {
            self.rng_seed = Some(seed);
        }
    }
}
