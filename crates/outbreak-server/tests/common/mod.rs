use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::mpsc;

use outbreak_core::arena::{ArenaConfig, ArenaPhase};
use outbreak_core::test_helpers::valid_arena_config;
use outbreak_infection::ArenaSnapshot;
use outbreak_infection::config::InfectionConfig;
use outbreak_server::arena_loop::ArenaBroadcast;
use outbreak_server::config::ServerConfig;
use outbreak_server::state::AppState;

/// A throwaway server directory: arena files, one generated level and a
/// stats file, all under a temp dir.
pub struct TestWorld {
    pub dir: TempDir,
}

impl TestWorld {
    /// A world with the `zombies` level generated.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        for sub in ["arenas", "worlds", "backups"] {
            std::fs::create_dir_all(dir.path().join(sub)).unwrap();
        }
        let region = dir.path().join("worlds/zombies/region");
        std::fs::create_dir_all(&region).unwrap();
        std::fs::write(region.join("r.0.0.mca"), b"pristine").unwrap();
        Self { dir }
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    /// An arena on `zombies` with a one-tick lobby, 20-tick round and one-tick restart.
    pub fn fast_arena(name: &str, slots: u32) -> ArenaConfig {
        let mut cfg = valid_arena_config(name, slots);
        cfg.wait_time = 1;
        cfg.game_time = 20;
        cfg.restart_time = 1;
        cfg
    }

    /// Write `cfg` to `<name>.json`.
    pub fn write_config(&self, cfg: &ArenaConfig) {
        self.write_arena_file(
            &format!("{}.json", cfg.name),
            &serde_json::to_string_pretty(cfg).unwrap(),
        );
    }

    pub fn write_arena_file(&self, file: &str, content: &str) {
        std::fs::write(self.path("arenas").join(file), content).unwrap();
    }

    pub fn config(&self) -> ServerConfig {
        ServerConfig {
            arenas_dir: self.path("arenas"),
            worlds_dir: self.path("worlds"),
            backups_dir: self.path("backups"),
            stats_path: self.path("stats.json"),
            tick_ms: 10,
            rng_seed: Some(7),
        }
    }

    pub fn start(&self) -> (AppState, mpsc::UnboundedReceiver<ArenaBroadcast>) {
        AppState::build(self.config(), InfectionConfig::default()).unwrap()
    }
}

pub fn stats_file(path: &Path) -> serde_json::Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

/// Poll an arena until `check` holds (5 s timeout).
pub async fn wait_for(
    state: &AppState,
    arena: &str,
    check: impl Fn(&ArenaSnapshot) -> bool,
) -> ArenaSnapshot {
    let deadline = Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        loop {
            let snapshot = state.arenas.read().await.snapshot(arena).await.unwrap();
            if check(&snapshot) {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("arena {arena} never reached the expected state"))
}

pub async fn wait_for_phase(state: &AppState, arena: &str, phase: ArenaPhase) -> ArenaSnapshot {
    wait_for(state, arena, |s| s.phase == phase).await
}
