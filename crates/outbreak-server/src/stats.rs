use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use outbreak_core::services::{PlayerStats, StatsService};

use crate::error::ServerError;

type Records = Arc<Mutex<BTreeMap<String, PlayerStats>>>;

fn lock(records: &Records) -> MutexGuard<'_, BTreeMap<String, PlayerStats>> {
    records.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Player statistics kept in memory and persisted to a JSON file.
///
/// Mutations never wait for disk: each one nudges a background task that
/// rewrites the file.
pub struct JsonStatsStore {
    path: PathBuf,
    records: Records,
    flush_tx: mpsc::UnboundedSender<()>,
}

impl JsonStatsStore {
    /// Load `path` (a missing file starts empty) and spawn the flusher.
    /// Must be called from within a tokio runtime.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ServerError> {
        let path = path.into();
        let loaded = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content)
                .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        tracing::info!(path = %path.display(), players = loaded.len(), "Loaded player stats");

        let records = Arc::new(Mutex::new(loaded));
        let (flush_tx, flush_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_flusher(path.clone(), Arc::clone(&records), flush_rx));

        Ok(Self {
            path,
            records,
            flush_tx,
        })
    }

    pub fn get(&self, player: &str) -> PlayerStats {
        lock(&self.records).get(player).cloned().unwrap_or_default()
    }

    /// Give a player guaranteed-infection credits.
    pub fn grant_guarantee(&self, player: &str, n: u32) {
        self.update(player, |s| s.guarantees += n);
    }

    /// Write the file now, bypassing the background task.
    pub fn flush(&self) -> Result<(), ServerError> {
        let json = encode(&self.records)?;
        write_atomically(&self.path, &json)?;
        Ok(())
    }

    fn update(&self, player: &str, f: impl FnOnce(&mut PlayerStats)) {
        f(lock(&self.records).entry(player.to_string()).or_default());
        if self.flush_tx.send(()).is_err() {
            tracing::debug!("Stats flusher has stopped");
        }
    }
}

impl StatsService for JsonStatsStore {
    fn add_game(&self, player: &str) {
        self.update(player, |s| s.games += 1);
    }

    fn add_win(&self, player: &str) {
        self.update(player, |s| s.wins += 1);
    }

    fn add_coins(&self, player: &str, amount: u64) {
        self.update(player, |s| s.coins += amount);
    }

    fn has_guarantee(&self, player: &str) -> bool {
        self.get(player).guarantees > 0
    }

    fn reduce_guarantee(&self, player: &str, n: u32) {
        let mut records = lock(&self.records);
        if let Some(stats) = records.get_mut(player) {
            stats.guarantees = stats.guarantees.saturating_sub(n);
            drop(records);
            let _ = self.flush_tx.send(());
        }
    }
}

fn encode(records: &Records) -> Result<String, ServerError> {
    serde_json::to_string_pretty(&*lock(records))
        .map_err(|e| ServerError::Config(format!("stats encoding failed: {e}")))
}

fn write_atomically(path: &Path, contents: &str) -> std::io::Result<()> {
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, contents)?;
    std::fs::rename(&tmp, path)
}

/// Coalesces nudges: one write per burst of mutations.
async fn run_flusher(path: PathBuf, records: Records, mut rx: mpsc::UnboundedReceiver<()>) {
    while rx.recv().await.is_some() {
        while rx.try_recv().is_ok() {}
        let json = match encode(&records) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode player stats");
                continue;
            },
        };
        let target = path.clone();
        match tokio::task::spawn_blocking(move || write_atomically(&target, &json)).await {
            Ok(Ok(())) => tracing::trace!(path = %path.display(), "Player stats flushed"),
            Ok(Err(e)) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to write player stats");
            },
            Err(e) => tracing::error!(error = %e, "Stats writer task failed"),
        }
    }
}
