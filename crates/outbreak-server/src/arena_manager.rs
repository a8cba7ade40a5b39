use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use outbreak_core::arena::ArenaConfig;
use outbreak_core::events::{PlayerEvent, Verdict};
use outbreak_core::player::{Player, PlayerId};
use outbreak_infection::admission::ArenaError;
use outbreak_infection::config::InfectionConfig;
use outbreak_infection::{ArenaServices, ArenaSnapshot, InfectionArena};

use crate::arena_loop::{
    ArenaBroadcast, ArenaCommand, PlayerIndex, lock_index, spawn_arena_session,
};
use crate::error::ServerError;

struct ArenaEntry {
    cmd_tx: mpsc::UnboundedSender<ArenaCommand>,
    /// Handle for the arena tick loop task.
    task: JoinHandle<()>,
    /// Handle for the task forwarding arena output to the host channel.
    forwarder: JoinHandle<()>,
}

/// Registry of running arenas. Routes player events to the arena that holds
/// the player; a player is in at most one arena at a time.
pub struct ArenaManager {
    arenas: HashMap<String, ArenaEntry>,
    index: PlayerIndex,
    tick_interval: Duration,
    /// Taken on shutdown so the host channel closes once the arenas stop.
    host_tx: Option<mpsc::UnboundedSender<ArenaBroadcast>>,
}

impl ArenaManager {
    pub fn new(tick_interval: Duration, host_tx: mpsc::UnboundedSender<ArenaBroadcast>) -> Self {
        Self {
            arenas: HashMap::new(),
            index: PlayerIndex::default(),
            tick_interval,
            host_tx: Some(host_tx),
        }
    }

    /// Start an arena's task. Arena names must be unique.
    pub fn add_arena(&mut self, arena: InfectionArena) -> Result<(), ServerError> {
        let name = arena.name().to_string();
        if self.arenas.contains_key(&name) {
            return Err(ServerError::Config(format!("duplicate arena name '{name}'")));
        }
        let Some(host_tx) = self.host_tx.clone() else {
            return Err(ServerError::ArenaGone(name));
        };
        let (cmd_tx, mut broadcast_rx, task) =
            spawn_arena_session(arena, self.tick_interval, std::sync::Arc::clone(&self.index));
        let forwarder = tokio::spawn(async move {
            while let Some(msg) = broadcast_rx.recv().await {
                if host_tx.send(msg).is_err() {
                    tracing::debug!("Host channel closed, dropping arena output");
                    break;
                }
            }
        });
        self.arenas.insert(
            name,
            ArenaEntry {
                cmd_tx,
                task,
                forwarder,
            },
        );
        Ok(())
    }

    /// Load every `*.json` arena file in `dir`, in file name order. Files that
    /// fail to parse are skipped; arenas that fail validation start in setup
    /// mode. Returns the number of arenas started.
    pub fn load_arenas_from_dir(
        &mut self,
        dir: &Path,
        services: &ArenaServices,
        tuning: &InfectionConfig,
        seed: Option<u64>,
    ) -> Result<usize, ServerError> {
        let mut paths: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        let mut started = 0;
        for (i, path) in paths.iter().enumerate() {
            let content = std::fs::read_to_string(path)?;
            let mut config = match ArenaConfig::from_json(&content) {
                Ok(config) => config,
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "Skipping arena file");
                    continue;
                },
            };
            if config.name.is_empty()
                && let Some(stem) = path.file_stem()
            {
                config.name = stem.to_string_lossy().into_owned();
            }
            let rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(i as u64)),
                None => StdRng::from_os_rng(),
            };
            let arena = InfectionArena::new(config, services.clone(), rng, tuning.clone());
            self.add_arena(arena)?;
            started += 1;
        }
        tracing::info!(dir = %dir.display(), arenas = started, "Arenas loaded");
        Ok(started)
    }

    /// Arena names in sorted order.
    pub fn arena_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.arenas.keys().cloned().collect();
        names.sort();
        names
    }

    /// The arena currently holding `player`.
    pub fn arena_of(&self, player: PlayerId) -> Option<String> {
        lock_index(&self.index).get(&player).cloned()
    }

    async fn request<T>(
        &self,
        arena: &str,
        make: impl FnOnce(oneshot::Sender<T>) -> ArenaCommand,
    ) -> Result<T, ServerError> {
        let entry = self
            .arenas
            .get(arena)
            .ok_or_else(|| ServerError::ArenaNotFound(arena.to_string()))?;
        let (tx, rx) = oneshot::channel();
        entry
            .cmd_tx
            .send(make(tx))
            .map_err(|_| ServerError::ArenaGone(arena.to_string()))?;
        rx.await
            .map_err(|_| ServerError::ArenaGone(arena.to_string()))
    }

    /// Admit a player to an arena. Returns the spawn slot.
    ///
    /// The player's index entry is reserved before the arena is asked, so two
    /// concurrent joins for one player cannot land in different arenas.
    pub async fn join(&self, arena: &str, player: Player) -> Result<usize, ServerError> {
        let id = player.id;
        let reserved = {
            let mut index = lock_index(&self.index);
            match index.get(&id) {
                Some(current) if current != arena => {
                    tracing::debug!(player_id = id, arena = %current, "Player already in another arena");
                    return Err(ArenaError::AlreadyJoined.into());
                },
                Some(_) => false,
                None => {
                    index.insert(id, arena.to_string());
                    true
                },
            }
        };
        let result = match self
            .request(arena, |reply| ArenaCommand::Join { player, reply })
            .await
        {
            Ok(joined) => joined.map_err(ServerError::from),
            Err(e) => Err(e),
        };
        if result.is_err() && reserved {
            let mut index = lock_index(&self.index);
            if index.get(&id).is_some_and(|a| a == arena) {
                index.remove(&id);
            }
        }
        result
    }

    /// Remove a player from whichever arena holds them. Returns that arena.
    pub async fn leave(&self, player_id: PlayerId) -> Result<String, ServerError> {
        let arena = self
            .arena_of(player_id)
            .ok_or(ServerError::Arena(ArenaError::NotInArena))?;
        self.request(&arena, |reply| ArenaCommand::Leave { player_id, reply })
            .await??;
        Ok(arena)
    }

    /// Route a host event. Events from players in no arena are offered to
    /// every arena only when they can concern one (sign taps, and respawns or
    /// disconnects after an arena death); anything else is allowed untouched.
    pub async fn dispatch(&self, event: PlayerEvent) -> Result<Verdict, ServerError> {
        let player = event.player_id();
        if let Some(arena) = self.arena_of(player) {
            return self.send_event(&arena, event).await;
        }
        if !matches!(
            event,
            PlayerEvent::Interact { .. }
                | PlayerEvent::Respawn { .. }
                | PlayerEvent::Disconnect { .. }
        ) {
            return Ok(Verdict::Allow);
        }
        for arena in self.arena_names() {
            let verdict = self.send_event(&arena, event.clone()).await?;
            if verdict != Verdict::Allow || self.arena_of(player).is_some() {
                return Ok(verdict);
            }
        }
        Ok(Verdict::Allow)
    }

    async fn send_event(&self, arena: &str, event: PlayerEvent) -> Result<Verdict, ServerError> {
        self.request(arena, |reply| ArenaCommand::Event {
            event,
            reply: Some(reply),
        })
        .await
    }

    pub async fn force_restart(&self, arena: &str) -> Result<(), ServerError> {
        self.request(arena, |reply| ArenaCommand::ForceRestart { reply })
            .await??;
        Ok(())
    }

    pub async fn snapshot(&self, arena: &str) -> Result<ArenaSnapshot, ServerError> {
        self.request(arena, |reply| ArenaCommand::Snapshot { reply })
            .await
    }

    /// Snapshots of every arena that still answers, in name order.
    pub async fn snapshots(&self) -> Vec<ArenaSnapshot> {
        let names = self.arena_names();
        let results = futures::future::join_all(names.iter().map(|n| self.snapshot(n))).await;
        names
            .iter()
            .zip(results)
            .filter_map(|(name, result)| match result {
                Ok(snapshot) => Some(snapshot),
                Err(e) => {
                    tracing::warn!(arena = %name, error = %e, "Arena did not answer");
                    None
                },
            })
            .collect()
    }

    /// Stop every arena task and wait for them to exit.
    pub async fn stop_all(&mut self) {
        self.host_tx = None;
        for (name, entry) in self.arenas.drain() {
            if entry.cmd_tx.send(ArenaCommand::Stop).is_err() {
                tracing::debug!(arena = %name, "Arena already stopped");
            }
            if let Err(e) = entry.task.await {
                tracing::error!(arena = %name, error = %e, "Arena task panicked");
            }
            if let Err(e) = entry.forwarder.await {
                tracing::error!(arena = %name, error = %e, "Arena forwarder failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use outbreak_core::services::{MapService, StatsService};
    use outbreak_core::test_helpers::{
        RecordingMaps, RecordingStats, make_players, valid_arena_config,
    };

    fn arena(name: &str, seed: u64) -> InfectionArena {
        let services = ArenaServices {
            stats: Arc::new(RecordingStats::new()) as Arc<dyn StatsService>,
            maps: Arc::new(RecordingMaps::with_levels(&["zombies"])) as Arc<dyn MapService>,
        };
        InfectionArena::new(
            valid_arena_config(name, 4),
            services,
            StdRng::seed_from_u64(seed),
            InfectionConfig::default(),
        )
    }

    fn manager() -> (ArenaManager, mpsc::UnboundedReceiver<ArenaBroadcast>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut mgr = ArenaManager::new(Duration::from_secs(60), tx);
        mgr.add_arena(arena("alpha", 1)).unwrap();
        mgr.add_arena(arena("beta", 2)).unwrap();
        (mgr, rx)
    }

    #[tokio::test]
    async fn unknown_arena_is_not_found() {
        let (mut mgr, _rx) = manager();
        let err = mgr
            .join("gamma", make_players(1).remove(0))
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::ArenaNotFound(name) if name == "gamma"));
        mgr.stop_all().await;
    }

    #[tokio::test]
    async fn duplicate_arena_names_rejected() {
        let (mut mgr, _rx) = manager();
        assert!(matches!(
            mgr.add_arena(arena("alpha", 9)),
            Err(ServerError::Config(_))
        ));
        mgr.stop_all().await;
    }

    #[tokio::test]
    async fn player_is_in_at_most_one_arena() {
        let (mut mgr, _rx) = manager();
        let p = make_players(1).remove(0);
        assert_eq!(mgr.join("alpha", p.clone()).await.unwrap(), 0);
        assert_eq!(mgr.arena_of(1).as_deref(), Some("alpha"));

        let err = mgr.join("beta", p.clone()).await.unwrap_err();
        assert!(matches!(err, ServerError::Arena(ArenaError::AlreadyJoined)));
        let err = mgr.join("alpha", p).await.unwrap_err();
        assert!(matches!(err, ServerError::Arena(ArenaError::AlreadyJoined)));

        assert_eq!(mgr.leave(1).await.unwrap(), "alpha");
        assert!(mgr.arena_of(1).is_none());
        assert!(matches!(
            mgr.leave(1).await,
            Err(ServerError::Arena(ArenaError::NotInArena))
        ));
        mgr.stop_all().await;
    }

    #[tokio::test]
    async fn events_are_routed_to_the_players_arena() {
        let (mut mgr, _rx) = manager();
        mgr.join("beta", make_players(1).remove(0)).await.unwrap();
        let verdict = mgr
            .dispatch(PlayerEvent::Exhaust { player: 1 })
            .await
            .unwrap();
        assert_eq!(verdict, Verdict::Cancel);

        let verdict = mgr
            .dispatch(PlayerEvent::Exhaust { player: 2 })
            .await
            .unwrap();
        assert_eq!(verdict, Verdict::Allow, "outsiders are untouched");

        mgr.dispatch(PlayerEvent::Chat {
            player: 1,
            message: "leave".to_string(),
        })
        .await
        .unwrap();
        assert!(mgr.arena_of(1).is_none(), "chat leave updates the index");
        mgr.stop_all().await;
    }

    #[tokio::test]
    async fn respawn_after_death_finds_the_arena() {
        let (mut mgr, _rx) = manager();
        mgr.join("beta", make_players(1).remove(0)).await.unwrap();
        let verdict = mgr
            .dispatch(PlayerEvent::Death {
                player: 1,
                message: "Player1 fell".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(verdict, Verdict::Cancel);
        assert!(mgr.arena_of(1).is_none());

        let verdict = mgr
            .dispatch(PlayerEvent::Respawn { player: 1 })
            .await
            .unwrap();
        assert!(matches!(verdict, Verdict::RespawnAt(_)));
        mgr.stop_all().await;
    }

    #[tokio::test]
    async fn disconnect_after_death_clears_pending_respawn() {
        let (mut mgr, _rx) = manager();
        mgr.join("beta", make_players(1).remove(0)).await.unwrap();
        mgr.dispatch(PlayerEvent::Death {
            player: 1,
            message: "Player1 fell".to_string(),
        })
        .await
        .unwrap();
        mgr.dispatch(PlayerEvent::Disconnect { player: 1 })
            .await
            .unwrap();

        let verdict = mgr
            .dispatch(PlayerEvent::Respawn { player: 1 })
            .await
            .unwrap();
        assert_eq!(verdict, Verdict::Allow, "nothing left to relocate");
        mgr.stop_all().await;
    }

    #[tokio::test]
    async fn concurrent_joins_admit_player_once() {
        let (mut mgr, _rx) = manager();
        let p = make_players(1).remove(0);
        let (a, b) = tokio::join!(mgr.join("alpha", p.clone()), mgr.join("beta", p));
        assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
        let winner = if a.is_ok() { "alpha" } else { "beta" };
        assert_eq!(mgr.arena_of(1).as_deref(), Some(winner));

        let snapshots = mgr.snapshots().await;
        let seated: usize = snapshots.iter().map(|s| s.players.len()).sum();
        assert_eq!(seated, 1);
        mgr.stop_all().await;
    }

    #[tokio::test]
    async fn refused_join_releases_reservation() {
        let (mut mgr, _rx) = manager();
        for p in make_players(4) {
            mgr.join("alpha", p).await.unwrap();
        }
        let late = make_players(5).remove(4);
        let err = mgr.join("alpha", late.clone()).await.unwrap_err();
        assert!(matches!(err, ServerError::Arena(ArenaError::ArenaFull)));
        assert!(mgr.arena_of(5).is_none());
        assert_eq!(mgr.join("beta", late).await.unwrap(), 0);
        mgr.stop_all().await;
    }

    #[tokio::test]
    async fn stop_all_closes_host_channel() {
        let (mut mgr, mut rx) = manager();
        mgr.stop_all().await;
        let mut stopped = Vec::new();
        while let Some(msg) = rx.recv().await {
            if let ArenaBroadcast::Stopped(name) = msg {
                stopped.push(name);
            }
        }
        stopped.sort();
        assert_eq!(stopped, vec!["alpha".to_string(), "beta".to_string()]);
        assert!(mgr.arena_names().is_empty());
    }
}
