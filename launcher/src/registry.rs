//! Per-game activity table.
//!
//! A game is at most one of downloading, running or uninstalling. Downloads,
//! launches and uninstalls hold their slot through an RAII guard, so an
//! install future that is dropped mid-download still frees its slot and
//! terminates its progress cell.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use tokio::sync::{oneshot, watch};
use tokio::time::Instant;

use crate::progress::Progress;

/// What a game is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    Downloading { is_update: bool },
    Running,
    Uninstalling,
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Downloading { is_update: false } => f.write_str("downloading"),
            Self::Downloading { is_update: true } => f.write_str("updating"),
            Self::Running => f.write_str("running"),
            Self::Uninstalling => f.write_str("uninstalling"),
        }
    }
}

/// Snapshot of an in-flight download.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadStatus {
    pub game_id: String,
    pub is_update: bool,
    pub progress: f64,
}

#[derive(Debug)]
pub(crate) struct DownloadEntry {
    pub(crate) is_update: bool,
    pub(crate) progress: Arc<Progress>,
}

#[derive(Debug)]
pub(crate) struct RunningGame {
    pub(crate) started_at: Instant,
    /// Taken by the first kill request.
    pub(crate) kill_tx: Option<oneshot::Sender<()>>,
    /// Flips to `true` once the exit continuation has run.
    pub(crate) exited: watch::Receiver<bool>,
}

#[derive(Debug)]
pub(crate) enum Slot {
    Download(DownloadEntry),
    /// Reserved while the process is being spawned.
    Launching,
    Running(RunningGame),
    Uninstalling,
}

impl Slot {
    pub(crate) const fn activity(&self) -> Activity {
        match self {
            Self::Download(entry) => Activity::Downloading {
                is_update: entry.is_update,
            },
            Self::Launching | Self::Running(_) => Activity::Running,
            Self::Uninstalling => Activity::Uninstalling,
        }
    }
}

/// Table of per-game activity.
#[derive(Debug, Default)]
pub struct ActivityTable {
    slots: Mutex<HashMap<String, Slot>>,
}

impl ActivityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the table. Never hold the guard across an `.await`.
    pub(crate) fn lock(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock()
    }

    pub fn activity(&self, game_id: &str) -> Option<Activity> {
        self.slots.lock().get(game_id).map(Slot::activity)
    }

    pub fn is_downloading(&self, game_id: &str) -> bool {
        matches!(self.activity(game_id), Some(Activity::Downloading { .. }))
    }

    pub fn is_running(&self, game_id: &str) -> bool {
        matches!(self.activity(game_id), Some(Activity::Running))
    }

    /// How long a running game has been up.
    pub fn uptime(&self, game_id: &str) -> Option<Duration> {
        match self.slots.lock().get(game_id) {
            Some(Slot::Running(running)) => Some(running.started_at.elapsed()),
            _ => None,
        }
    }

    /// Progress receiver for an in-flight download.
    pub fn download_progress(&self, game_id: &str) -> Option<watch::Receiver<f64>> {
        match self.slots.lock().get(game_id) {
            Some(Slot::Download(entry)) => Some(entry.progress.subscribe()),
            _ => None,
        }
    }

    /// Snapshot of every in-flight download, ordered by game id.
    pub fn active_downloads(&self) -> Vec<DownloadStatus> {
        let mut downloads: Vec<_> = self
            .slots
            .lock()
            .iter()
            .filter_map(|(game_id, slot)| match slot {
                Slot::Download(entry) => Some(DownloadStatus {
                    game_id: game_id.clone(),
                    is_update: entry.is_update,
                    progress: entry.progress.get(),
                }),
                _ => None,
            })
            .collect();
        downloads.sort_by(|a, b| a.game_id.cmp(&b.game_id));
        downloads
    }

    /// Claims the download slot for `game_id`, or reports what holds it.
    pub(crate) fn claim_download(
        self: &Arc<Self>,
        game_id: &str,
        is_update: bool,
    ) -> Result<DownloadGuard, Activity> {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get(game_id) {
            return Err(slot.activity());
        }
        let progress = Arc::new(Progress::new());
        slots.insert(
            game_id.to_owned(),
            Slot::Download(DownloadEntry {
                is_update,
                progress: Arc::clone(&progress),
            }),
        );
        Ok(DownloadGuard {
            table: Arc::clone(self),
            game_id: game_id.to_owned(),
            progress,
        })
    }

    /// Reserves `game_id` for a launch, or reports what holds it.
    pub(crate) fn claim_launch(
        self: &Arc<Self>,
        game_id: &str,
    ) -> Result<LaunchGuard, Activity> {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get(game_id) {
            return Err(slot.activity());
        }
        slots.insert(game_id.to_owned(), Slot::Launching);
        Ok(LaunchGuard {
            table: Arc::clone(self),
            game_id: game_id.to_owned(),
        })
    }

    /// Claims the uninstall slot for `game_id`, or reports what holds it.
    pub(crate) fn claim_uninstall(
        self: &Arc<Self>,
        game_id: &str,
    ) -> Result<UninstallGuard, Activity> {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get(game_id) {
            return Err(slot.activity());
        }
        slots.insert(game_id.to_owned(), Slot::Uninstalling);
        Ok(UninstallGuard {
            table: Arc::clone(self),
            game_id: game_id.to_owned(),
        })
    }
}

/// Holds a game's download slot. Dropping it terminates the progress cell
/// and frees the slot.
#[derive(Debug)]
pub(crate) struct DownloadGuard {
    table: Arc<ActivityTable>,
    game_id: String,
    progress: Arc<Progress>,
}

impl DownloadGuard {
    pub(crate) fn progress(&self) -> &Progress {
        &self.progress
    }
}

impl Drop for DownloadGuard {
    fn drop(&mut self) {
        self.progress.terminate();
        let mut slots = self.table.slots.lock();
        if matches!(slots.get(&self.game_id), Some(Slot::Download(_))) {
            slots.remove(&self.game_id);
        }
    }
}

/// Holds a game's launch reservation. Dropping it without
/// [`LaunchGuard::started`] frees the slot.
#[derive(Debug)]
pub(crate) struct LaunchGuard {
    table: Arc<ActivityTable>,
    game_id: String,
}

impl LaunchGuard {
    /// Turns the reservation into a running slot.
    pub(crate) fn started(self, running: RunningGame) {
        self.table
            .slots
            .lock()
            .insert(self.game_id.clone(), Slot::Running(running));
    }
}

impl Drop for LaunchGuard {
    fn drop(&mut self) {
        let mut slots = self.table.slots.lock();
        if matches!(slots.get(&self.game_id), Some(Slot::Launching)) {
            slots.remove(&self.game_id);
        }
    }
}

/// Holds a game's uninstall slot until dropped.
#[derive(Debug)]
pub(crate) struct UninstallGuard {
    table: Arc<ActivityTable>,
    game_id: String,
}

impl Drop for UninstallGuard {
    fn drop(&mut self) {
        let mut slots = self.table.slots.lock();
        if matches!(slots.get(&self.game_id), Some(Slot::Uninstalling)) {
            slots.remove(&self.game_id);
        }
    }
}
