use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use tokio::task::JoinHandle;

use outbreak_core::services::{MapError, MapHandle, MapService};

/// Level snapshots on the local filesystem.
///
/// `save_map` copies `worlds/<level>` to `backups/<level>`; `load_map` copies
/// it back. Copies run on the blocking pool and the call returns at once.
/// A level counts as saved only once a complete backup directory exists.
pub struct FsMapService {
    worlds_dir: PathBuf,
    backups_dir: PathBuf,
    generation: AtomicU64,
    /// Most recent copy job. Each job waits for the one before it, so copies
    /// run one at a time in the order they were requested.
    tail: Mutex<Option<JoinHandle<()>>>,
}

impl FsMapService {
    pub fn new(worlds_dir: impl Into<PathBuf>, backups_dir: impl Into<PathBuf>) -> Self {
        Self {
            worlds_dir: worlds_dir.into(),
            backups_dir: backups_dir.into(),
            generation: AtomicU64::new(0),
            tail: Mutex::new(None),
        }
    }

    /// Wait for every copy started so far.
    pub async fn wait_idle(&self) {
        let tail = self
            .tail
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(job) = tail
            && let Err(e) = job.await
        {
            tracing::error!(error = %e, "Map copy task failed");
        }
    }

    fn has_backup(&self, level: &str) -> bool {
        self.backups_dir.join(level).is_dir()
    }

    /// Queue a copy behind any pending one, or run it inline when there is
    /// no runtime.
    fn spawn_copy(&self, what: &'static str, level: &str, from: PathBuf, to: PathBuf) {
        let level = level.to_string();
        let job = move || match replace_dir(&from, &to) {
            Ok(()) => tracing::debug!(level = %level, what, "Level copy finished"),
            Err(e) => tracing::error!(level = %level, what, error = %e, "Level copy failed"),
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let mut tail = self.tail.lock().unwrap_or_else(PoisonError::into_inner);
                let previous = tail.take();
                *tail = Some(handle.spawn(async move {
                    if let Some(previous) = previous
                        && let Err(e) = previous.await
                    {
                        tracing::error!(error = %e, "Map copy task failed");
                    }
                    if let Err(e) = tokio::task::spawn_blocking(job).await {
                        tracing::error!(error = %e, "Map copy task failed");
                    }
                }));
            },
            Err(_) => job(),
        }
    }
}

impl MapService for FsMapService {
    fn level_exists(&self, level: &str) -> bool {
        is_plain_name(level) && self.worlds_dir.join(level).is_dir()
    }

    fn save_map(&self, level: &str) -> Result<MapHandle, MapError> {
        if !self.level_exists(level) {
            return Err(MapError::UnknownLevel(level.to_string()));
        }
        self.spawn_copy(
            "snapshot",
            level,
            self.worlds_dir.join(level),
            self.backups_dir.join(level),
        );
        Ok(MapHandle {
            level: level.to_string(),
            generation: self.generation.load(Ordering::SeqCst),
        })
    }

    fn load_map(&self, level: &str) -> Result<MapHandle, MapError> {
        if !is_plain_name(level) {
            return Err(MapError::UnknownLevel(level.to_string()));
        }
        if !self.has_backup(level) {
            return Err(MapError::NotSaved(level.to_string()));
        }
        self.spawn_copy(
            "restore",
            level,
            self.backups_dir.join(level),
            self.worlds_dir.join(level),
        );
        Ok(MapHandle {
            level: level.to_string(),
            generation: self.generation.fetch_add(1, Ordering::SeqCst) + 1,
        })
    }
}

/// Level names map to directories and must not escape them.
fn is_plain_name(level: &str) -> bool {
    !level.is_empty()
        && level != "."
        && level != ".."
        && !level.contains(['/', '\\'])
}

/// `<parent>/.<name>.<suffix>`, next to `dir` so renames stay on one filesystem.
fn sibling(dir: &Path, suffix: &str) -> std::io::Result<PathBuf> {
    let name = dir.file_name().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "directory has no name")
    })?;
    Ok(dir.with_file_name(format!(".{}.{suffix}", name.to_string_lossy())))
}

/// Replace `to` with a copy of `from`. The copy is staged next to `to` and
/// swapped in by rename; `to` is untouched unless the copy completed.
fn replace_dir(from: &Path, to: &Path) -> std::io::Result<()> {
    let staged = sibling(to, "partial")?;
    let retired = sibling(to, "old")?;
    for leftover in [&staged, &retired] {
        if leftover.exists() {
            std::fs::remove_dir_all(leftover)?;
        }
    }
    if let Err(e) = copy_dir(from, &staged) {
        let _ = std::fs::remove_dir_all(&staged);
        return Err(e);
    }
    if to.exists() {
        std::fs::rename(to, &retired)?;
    }
    std::fs::rename(&staged, to)?;
    if retired.exists() {
        std::fs::remove_dir_all(&retired)?;
    }
    Ok(())
}

fn copy_dir(from: &Path, to: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(to)?;
    for entry in std::fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
