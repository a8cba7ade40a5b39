use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};

use outbreak_core::services::{MapService, StatsService};
use outbreak_infection::ArenaServices;
use outbreak_infection::config::InfectionConfig;

use crate::arena_loop::ArenaBroadcast;
use crate::arena_manager::ArenaManager;
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::maps::FsMapService;
use crate::stats::JsonStatsStore;

pub type SharedArenaManager = Arc<RwLock<ArenaManager>>;

#[derive(Clone)]
pub struct AppState {
    pub arenas: SharedArenaManager,
    pub stats: Arc<JsonStatsStore>,
    pub maps: Arc<FsMapService>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Open the collaborators and start every arena in `config.arenas_dir`.
    /// Returns the state and the channel carrying all arena output.
    pub fn build(
        config: ServerConfig,
        tuning: InfectionConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<ArenaBroadcast>), ServerError> {
        config.validate()?;
        let stats = Arc::new(JsonStatsStore::open(&config.stats_path)?);
        let maps = Arc::new(FsMapService::new(&config.worlds_dir, &config.backups_dir));
        let services = ArenaServices {
            stats: Arc::clone(&stats) as Arc<dyn StatsService>,
            maps: Arc::clone(&maps) as Arc<dyn MapService>,
        };

        let (host_tx, host_rx) = mpsc::unbounded_channel();
        let mut manager = ArenaManager::new(config.tick_interval(), host_tx);
        manager.load_arenas_from_dir(&config.arenas_dir, &services, &tuning, config.rng_seed)?;

        let state = Self {
            arenas: Arc::new(RwLock::new(manager)),
            stats,
            maps,
            config: Arc::new(config),
        };
        Ok((state, host_rx))
    }

    /// Stop the arenas, let pending level copies finish and write the stats.
    pub async fn shutdown(&self) {
        self.arenas.write().await.stop_all().await;
        self.maps.wait_idle().await;
        if let Err(e) = self.stats.flush() {
            tracing::error!(error = %e, "Failed to write player stats on shutdown");
        }
        tracing::info!("Shutdown complete");
    }
}
