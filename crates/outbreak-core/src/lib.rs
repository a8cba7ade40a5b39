pub mod actions;
pub mod arena;
pub mod events;
pub mod player;
pub mod position;
pub mod services;
pub mod time;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

    use crate::arena::ArenaConfig;
    use crate::player::{Player, PlayerId};
    use crate::services::{MapError, MapHandle, MapService, PlayerStats, StatsService};

    /// Create `n` test players with sequential IDs starting at 1.
    pub fn make_players(n: usize) -> Vec<Player> {
        (0..n)
            .map(|i| Player::new(i as PlayerId + 1, format!("Player{}", i + 1)))
            .collect()
    }

    /// A valid arena on level `zombies` with `slots` spawns in a row and the
    /// join sign at `5,64,5` in `hub`.
    pub fn valid_arena_config(name: &str, slots: u32) -> ArenaConfig {
        ArenaConfig {
            name: name.to_string(),
            level: Some("zombies".to_string()),
            slots,
            spawns: (0..slots).map(|i| format!("{},64,0", i * 4)).collect(),
            joinsign: vec!["5,64,5".to_string(), "hub".to_string()],
            game_time: 180,
            restart_time: 10,
            wait_time: 30,
            enabled: true,
            ..ArenaConfig::default()
        }
    }

    /// One recorded statistics call.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum StatsCall {
        AddGame(String),
        AddWin(String),
        AddCoins(String, u64),
        ReduceGuarantee(String, u32),
    }

    /// In-memory statistics service that records every mutation.
    #[derive(Default)]
    pub struct RecordingStats {
        stats: Mutex<HashMap<String, PlayerStats>>,
        calls: Mutex<Vec<StatsCall>>,
    }

    impl RecordingStats {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn grant_guarantee(&self, player: &str, n: u32) {
            let mut stats = self.stats.lock().unwrap();
            stats.entry(player.to_string()).or_default().guarantees += n;
        }

        pub fn get(&self, player: &str) -> PlayerStats {
            self.stats
                .lock()
                .unwrap()
                .get(player)
                .cloned()
                .unwrap_or_default()
        }

        pub fn calls(&self) -> Vec<StatsCall> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: StatsCall) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl StatsService for RecordingStats {
        fn add_game(&self, player: &str) {
            self.stats
                .lock()
                .unwrap()
                .entry(player.to_string())
                .or_default()
                .games += 1;
            self.record(StatsCall::AddGame(player.to_string()));
        }

        fn add_win(&self, player: &str) {
            self.stats
                .lock()
                .unwrap()
                .entry(player.to_string())
                .or_default()
                .wins += 1;
            self.record(StatsCall::AddWin(player.to_string()));
        }

        fn add_coins(&self, player: &str, amount: u64) {
            self.stats
                .lock()
                .unwrap()
                .entry(player.to_string())
                .or_default()
                .coins += amount;
            self.record(StatsCall::AddCoins(player.to_string(), amount));
        }

        fn has_guarantee(&self, player: &str) -> bool {
            self.get(player).guarantees > 0
        }

        fn reduce_guarantee(&self, player: &str, n: u32) {
            if let Some(s) = self.stats.lock().unwrap().get_mut(player) {
                s.guarantees = s.guarantees.saturating_sub(n);
            }
            self.record(StatsCall::ReduceGuarantee(player.to_string(), n));
        }
    }

    /// Map service double: knows a fixed set of levels and counts calls.
    pub struct RecordingMaps {
        levels: HashSet<String>,
        saved: Mutex<HashSet<String>>,
        saves: AtomicU64,
        loads: AtomicU64,
        failing_loads: AtomicU32,
    }

    impl RecordingMaps {
        pub fn with_levels(levels: &[&str]) -> Self {
            Self {
                levels: levels.iter().map(|l| l.to_string()).collect(),
                saved: Mutex::new(HashSet::new()),
                saves: AtomicU64::new(0),
                loads: AtomicU64::new(0),
                failing_loads: AtomicU32::new(0),
            }
        }

        /// Make the next `n` calls to `load_map` fail.
        pub fn fail_next_loads(&self, n: u32) {
            self.failing_loads.store(n, Ordering::SeqCst);
        }

        pub fn save_count(&self) -> u64 {
            self.saves.load(Ordering::SeqCst)
        }

        pub fn load_count(&self) -> u64 {
            self.loads.load(Ordering::SeqCst)
        }
    }

    impl MapService for RecordingMaps {
        fn level_exists(&self, level: &str) -> bool {
            self.levels.contains(level)
        }

        fn save_map(&self, level: &str) -> Result<MapHandle, MapError> {
            if !self.levels.contains(level) {
                return Err(MapError::UnknownLevel(level.to_string()));
            }
            self.saves.fetch_add(1, Ordering::SeqCst);
            self.saved.lock().unwrap().insert(level.to_string());
            Ok(MapHandle {
                level: level.to_string(),
                generation: 0,
            })
        }

        fn load_map(&self, level: &str) -> Result<MapHandle, MapError> {
            let generation = self.loads.fetch_add(1, Ordering::SeqCst) + 1;
            let failing = self.failing_loads.load(Ordering::SeqCst);
            if failing > 0 {
                self.failing_loads.store(failing - 1, Ordering::SeqCst);
                return Err(MapError::Io("simulated failure".to_string()));
            }
            if !self.saved.lock().unwrap().contains(level) {
                return Err(MapError::NotSaved(level.to_string()));
            }
            Ok(MapHandle {
                level: level.to_string(),
                generation,
            })
        }
    }
}
