//! Install lifecycle: install, update, launch, kill and uninstall.
//!
//! Per game: `NotInstalled -> Downloading -> Installed -> Running ->
//! Installed`. Mutating operations on one game are serialized through the
//! [`ActivityTable`]; different games proceed independently.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{broadcast, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::LauncherConfig;
use crate::platform::{
    default_shortcuts, ArchiveExtractor, CommandExtractor, GameProcess, Platform, ProcessSpawner,
    ShortcutFactory, TokioSpawner,
};
use crate::progress::Progress;
use crate::registry::{
    Activity, ActivityTable, DownloadGuard, DownloadStatus, RunningGame, Slot,
};
use crate::remote::{Download, Game, RemoteCatalog, RemoteError};
use crate::session::Session;
use crate::store::{InstallRecord, InstallStore, StoreError};

/// Bytes copied per read while downloading.
const DOWNLOAD_CHUNK: usize = 8192;

/// File name of the icon stored in the install directory.
const ICON_FILE: &str = "icon.png";

/// Lifecycle errors.
#[derive(Error, Debug)]
pub enum InstallError {
    #[error("game {game_id} has no {platform} release")]
    Unsupported { game_id: String, platform: Platform },

    #[error("game {0} is already installed")]
    AlreadyInstalled(String),

    #[error("game {0} is already being installed")]
    AlreadyInstalling(String),

    #[error("game {0} is not installed")]
    NotInstalled(String),

    #[error("game {0} is not running")]
    NotRunning(String),

    #[error("game {game_id} is busy ({activity})")]
    Busy { game_id: String, activity: Activity },

    #[error("executable for game {game_id} not found at {}", path.display())]
    ExecutableMissing { game_id: String, path: PathBuf },

    #[error("download of game {game_id} failed: {source}")]
    DownloadFailed {
        game_id: String,
        #[source]
        source: RemoteError,
    },

    #[error("extraction of game {game_id} failed: {source}")]
    ExtractionFailed {
        game_id: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to delete files of game {game_id}: {source}")]
    RemoveFiles {
        game_id: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to start game {game_id}: {source}")]
    Spawn {
        game_id: String,
        #[source]
        source: io::Error,
    },

    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("install store error: {0}")]
    Store(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for lifecycle operations.
pub type InstallResult<T> = Result<T, InstallError>;

/// Notifications raised by the lifecycle manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LauncherEvent {
    DownloadStarted { game_id: String, is_update: bool },
    Installed { game_id: String, version: String },
    Uninstalled { game_id: String },
    GameClosed { game_id: String, minutes: u32 },
}

/// Capacity of the event channel; slow subscribers observe `Lagged`.
const EVENT_CAPACITY: usize = 64;

struct Inner {
    install_dir: PathBuf,
    platform: Platform,
    store: InstallStore,
    registry: Arc<ActivityTable>,
    remote: Arc<dyn RemoteCatalog>,
    session: Arc<Session>,
    extractor: Arc<dyn ArchiveExtractor>,
    shortcuts: Arc<dyn ShortcutFactory>,
    spawner: Arc<dyn ProcessSpawner>,
    events: broadcast::Sender<LauncherEvent>,
}

/// Manages installed games. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct InstallManager {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for InstallManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstallManager")
            .field("install_dir", &self.inner.install_dir)
            .field("platform", &self.inner.platform)
            .field("store", &self.inner.store.path())
            .finish_non_exhaustive()
    }
}

/// Builder for [`InstallManager`].
pub struct InstallManagerBuilder {
    config: LauncherConfig,
    remote: Arc<dyn RemoteCatalog>,
    session: Arc<Session>,
    platform: Platform,
    extractor: Arc<dyn ArchiveExtractor>,
    shortcuts: Arc<dyn ShortcutFactory>,
    spawner: Arc<dyn ProcessSpawner>,
}

impl InstallManagerBuilder {
    /// Overrides the platform releases are picked for.
    #[must_use]
    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Shares the launcher's login session with the manager.
    #[must_use]
    pub fn session(mut self, session: Arc<Session>) -> Self {
        self.session = session;
        self
    }

    #[must_use]
    pub fn extractor(mut self, extractor: Arc<dyn ArchiveExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    #[must_use]
    pub fn shortcuts(mut self, shortcuts: Arc<dyn ShortcutFactory>) -> Self {
        self.shortcuts = shortcuts;
        self
    }

    #[must_use]
    pub fn spawner(mut self, spawner: Arc<dyn ProcessSpawner>) -> Self {
        self.spawner = spawner;
        self
    }

    /// Opens the install store and builds the manager.
    pub fn build(self) -> Result<InstallManager, StoreError> {
        let store = InstallStore::open(self.config.store_file())?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(InstallManager {
            inner: Arc::new(Inner {
                install_dir: self.config.install_dir(),
                platform: self.platform,
                store,
                registry: Arc::new(ActivityTable::new()),
                remote: self.remote,
                session: self.session,
                extractor: self.extractor,
                shortcuts: self.shortcuts,
                spawner: self.spawner,
                events,
            }),
        })
    }
}

impl InstallManager {
    /// Creates a builder using the system extractor, shortcuts and spawner.
    pub fn builder(
        config: LauncherConfig,
        remote: Arc<dyn RemoteCatalog>,
    ) -> InstallManagerBuilder {
        let shortcuts = default_shortcuts(config.shortcuts_dir.clone());
        InstallManagerBuilder {
            config,
            remote,
            session: Arc::new(Session::new()),
            platform: Platform::current(),
            extractor: Arc::new(CommandExtractor),
            shortcuts,
            spawner: Arc::new(TokioSpawner),
        }
    }

    /// Subscribes to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<LauncherEvent> {
        self.inner.events.subscribe()
    }

    pub fn platform(&self) -> Platform {
        self.inner.platform
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.inner.session
    }

    pub fn is_installed(&self, game_id: &str) -> bool {
        self.inner.store.is_installed(game_id)
    }

    pub fn is_running(&self, game_id: &str) -> bool {
        self.inner.registry.is_running(game_id)
    }

    /// Time since a running game was launched.
    pub fn uptime(&self, game_id: &str) -> Option<std::time::Duration> {
        self.inner.registry.uptime(game_id)
    }

    pub fn is_downloading(&self, game_id: &str) -> bool {
        self.inner.registry.is_downloading(game_id)
    }

    pub fn activity(&self, game_id: &str) -> Option<Activity> {
        self.inner.registry.activity(game_id)
    }

    /// Progress of an in-flight download, as a `watch` receiver.
    pub fn download_progress(&self, game_id: &str) -> Option<watch::Receiver<f64>> {
        self.inner.registry.download_progress(game_id)
    }

    pub fn active_downloads(&self) -> Vec<DownloadStatus> {
        self.inner.registry.active_downloads()
    }

    /// Committed installs, ordered by game id.
    pub fn installed_games(&self) -> Vec<InstallRecord> {
        self.inner
            .store
            .records()
            .into_iter()
            .filter(|record| record.installed)
            .collect()
    }

    pub fn install_record(&self, game_id: &str) -> Option<InstallRecord> {
        self.inner.store.get(game_id).filter(|record| record.installed)
    }

    /// Downloads, extracts and records the current platform release of
    /// `game`.
    pub async fn install(&self, game: &Game) -> InstallResult<InstallRecord> {
        let release = self.release_of(game)?;
        if self.is_installed(&game.id) {
            return Err(InstallError::AlreadyInstalled(game.id.clone()));
        }
        let guard = self
            .inner
            .registry
            .claim_download(&game.id, false)
            .map_err(|activity| install_conflict(&game.id, activity))?;
        // An install may have committed between the check and the claim.
        if self.is_installed(&game.id) {
            return Err(InstallError::AlreadyInstalled(game.id.clone()));
        }
        self.install_claimed(game, &release, &guard, false).await
    }

    /// Whether the catalog release differs from the installed one.
    ///
    /// Both ids must parse as UUIDs; anything else is logged and treated as
    /// up to date.
    pub fn is_update_available(&self, game: &Game) -> bool {
        let Some(record) = self.install_record(&game.id) else {
            return false;
        };
        let Some(latest) = self.inner.platform.release_for(game) else {
            warn!(game_id = %game.id, "latest release missing");
            return false;
        };
        if record.version.trim().is_empty() {
            warn!(game_id = %game.id, "installed version missing");
            return false;
        }
        match (
            Uuid::parse_str(record.version.trim()),
            Uuid::parse_str(latest.trim()),
        ) {
            (Ok(installed_id), Ok(latest_id)) => installed_id != latest_id,
            _ => {
                warn!(
                    game_id = %game.id,
                    installed = %record.version,
                    latest,
                    "release id is not a UUID"
                );
                false
            }
        }
    }

    /// Removes the installed files and installs the current release.
    ///
    /// The old installation is gone before the download starts, so a failed
    /// reinstall leaves the game not installed.
    pub async fn update(&self, game: &Game) -> InstallResult<InstallRecord> {
        let release = self.release_of(game)?;
        let guard = self
            .inner
            .registry
            .claim_download(&game.id, true)
            .map_err(|activity| install_conflict(&game.id, activity))?;
        // Read under the claim so a finished uninstall is not undone.
        let record = self
            .install_record(&game.id)
            .ok_or_else(|| InstallError::NotInstalled(game.id.clone()))?;

        self.remove_installation(&record).await?;
        self.forget_record(&game.id).await?;
        self.emit(LauncherEvent::Uninstalled {
            game_id: game.id.clone(),
        });
        info!(game_id = %game.id, from = %record.version, to = %release, "updating");

        self.install_claimed(game, &release, &guard, true).await
    }

    /// Starts an installed game and supervises it until it exits.
    pub async fn launch(&self, game_id: &str) -> InstallResult<()> {
        let record = self
            .install_record(game_id)
            .ok_or_else(|| InstallError::NotInstalled(game_id.to_owned()))?;
        let exe = record.exe_path();
        let exists = !record.exe.trim().is_empty()
            && tokio::fs::try_exists(&exe).await.unwrap_or(false);
        if !exists {
            return Err(InstallError::ExecutableMissing {
                game_id: game_id.to_owned(),
                path: exe,
            });
        }
        let args = record.arg_list();

        let launch = self
            .inner
            .registry
            .claim_launch(game_id)
            .map_err(|activity| busy(game_id, activity))?;
        if !self.is_installed(game_id) {
            return Err(InstallError::NotInstalled(game_id.to_owned()));
        }
        let process = self
            .inner
            .spawner
            .spawn(&exe, &args, &record.path)
            .map_err(|source| InstallError::Spawn {
                game_id: game_id.to_owned(),
                source,
            })?;
        let (kill_tx, kill_rx) = oneshot::channel();
        let (exited_tx, exited_rx) = watch::channel(false);
        let started_at = Instant::now();
        launch.started(RunningGame {
            started_at,
            kill_tx: Some(kill_tx),
            exited: exited_rx,
        });

        info!(game_id, pid = ?process.id(), exe = %exe.display(), "game launched");
        tokio::spawn(self.clone().supervise(
            game_id.to_owned(),
            process,
            started_at,
            kill_rx,
            exited_tx,
        ));
        Ok(())
    }

    /// Terminates a running game and waits until its exit has been handled.
    pub async fn kill(&self, game_id: &str) -> InstallResult<()> {
        let (kill_tx, mut exited) = {
            let mut slots = self.inner.registry.lock();
            match slots.get_mut(game_id) {
                Some(Slot::Running(running)) => (running.kill_tx.take(), running.exited.clone()),
                _ => return Err(InstallError::NotRunning(game_id.to_owned())),
            }
        };
        if let Some(kill_tx) = kill_tx {
            debug!(game_id, "kill requested");
            let _ = kill_tx.send(());
        }
        // Errs only if the supervisor is gone, which also means it finished.
        let _ = exited.wait_for(|exited| *exited).await;
        Ok(())
    }

    /// Deletes an installed game's files, shortcut and record.
    pub async fn uninstall(&self, game_id: &str) -> InstallResult<()> {
        let record = self
            .install_record(game_id)
            .ok_or_else(|| InstallError::NotInstalled(game_id.to_owned()))?;
        let _guard = self
            .inner
            .registry
            .claim_uninstall(game_id)
            .map_err(|activity| busy(game_id, activity))?;

        self.remove_installation(&record).await?;
        self.forget_record(game_id).await?;
        info!(game_id, "uninstalled");
        self.emit(LauncherEvent::Uninstalled {
            game_id: game_id.to_owned(),
        });
        Ok(())
    }

    fn release_of(&self, game: &Game) -> InstallResult<String> {
        self.inner
            .platform
            .release_for(game)
            .map(str::to_owned)
            .ok_or_else(|| InstallError::Unsupported {
                game_id: game.id.clone(),
                platform: self.inner.platform,
            })
    }

    async fn install_claimed(
        &self,
        game: &Game,
        release: &str,
        guard: &DownloadGuard,
        is_update: bool,
    ) -> InstallResult<InstallRecord> {
        let inner = &self.inner;
        self.emit(LauncherEvent::DownloadStarted {
            game_id: game.id.clone(),
            is_update,
        });

        let package = inner.remote.get_package(&game.id, release).await?;
        let url = inner
            .remote
            .get_download_url(&game.id, inner.platform)
            .await?;

        tokio::fs::create_dir_all(&inner.install_dir).await?;
        let archive = inner.install_dir.join(format!("{}.download", game.id));
        let dest = inner.install_dir.join(&game.id);

        match self.download(&url, &archive, guard.progress()).await {
            Ok(bytes) => debug!(game_id = %game.id, bytes, "download complete"),
            Err(source) => {
                remove_file_quietly(&archive).await;
                warn!(game_id = %game.id, error = %source, "download failed");
                return Err(InstallError::DownloadFailed {
                    game_id: game.id.clone(),
                    source,
                });
            }
        }

        let extracted = inner.extractor.extract(&archive, &dest).await;
        remove_file_quietly(&archive).await;
        if let Err(source) = extracted {
            remove_dir_quietly(&dest).await;
            warn!(game_id = %game.id, error = %source, "extraction failed");
            return Err(InstallError::ExtractionFailed {
                game_id: game.id.clone(),
                source,
            });
        }

        let icon = self.fetch_icon(&game.id, &dest).await;
        let shortcut = self
            .create_shortcut(&game.name, dest.join(&package.main_binary), icon)
            .await;

        let record = InstallRecord {
            game_id: game.id.clone(),
            name: game.name.clone(),
            installed: true,
            version: package.id,
            path: dest,
            exe: package.main_binary,
            args: package.launch_arguments,
            shortcut,
        };
        if let Err(err) = self.commit_record(record.clone()).await {
            remove_dir_quietly(&record.path).await;
            if let Some(shortcut) = &record.shortcut {
                remove_file_quietly(shortcut).await;
            }
            return Err(err.into());
        }

        info!(game_id = %game.id, version = %record.version, "installed");
        self.emit(LauncherEvent::Installed {
            game_id: record.game_id.clone(),
            version: record.version.clone(),
        });
        Ok(record)
    }

    /// Persists `record` off the async worker threads.
    async fn commit_record(&self, record: InstallRecord) -> InstallResult<()> {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || inner.store.commit(record))
            .await
            .map_err(join_error)??;
        Ok(())
    }

    async fn forget_record(&self, game_id: &str) -> InstallResult<()> {
        let inner = Arc::clone(&self.inner);
        let game_id = game_id.to_owned();
        tokio::task::spawn_blocking(move || inner.store.remove(&game_id))
            .await
            .map_err(join_error)??;
        Ok(())
    }

    async fn download(
        &self,
        url: &str,
        archive: &Path,
        progress: &Progress,
    ) -> Result<u64, RemoteError> {
        let Download {
            content_length,
            mut body,
        } = self.inner.remote.open_download(url).await?;
        let mut file = tokio::fs::File::create(archive).await?;
        let mut buf = vec![0u8; DOWNLOAD_CHUNK];
        let mut received = 0u64;
        loop {
            let n = body.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            file.write_all(&buf[..n]).await?;
            received += n as u64;
            progress.update(received, content_length);
        }
        file.flush().await?;
        Ok(received)
    }

    async fn fetch_icon(&self, game_id: &str, dest: &Path) -> Option<PathBuf> {
        let bytes = match self.inner.remote.get_icon(game_id).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(err) => {
                warn!(game_id, error = %err, "icon fetch failed");
                return None;
            }
        };
        let path = dest.join(ICON_FILE);
        match tokio::fs::write(&path, bytes).await {
            Ok(()) => Some(path),
            Err(err) => {
                warn!(game_id, error = %err, "icon write failed");
                None
            }
        }
    }

    async fn create_shortcut(
        &self,
        name: &str,
        exe: PathBuf,
        icon: Option<PathBuf>,
    ) -> Option<PathBuf> {
        let shortcuts = Arc::clone(&self.inner.shortcuts);
        let owned_name = name.to_owned();
        let created = tokio::task::spawn_blocking(move || {
            shortcuts.create_shortcut(&owned_name, &exe, icon.as_deref())
        })
        .await;
        match created {
            Ok(Ok(Some(path))) => {
                info!(name, path = %path.display(), "shortcut created");
                Some(path)
            }
            Ok(Ok(None)) => {
                debug!(name, "shortcuts unsupported on this platform");
                None
            }
            Ok(Err(err)) => {
                warn!(name, error = %err, "shortcut creation failed");
                None
            }
            Err(err) => {
                warn!(name, error = %err, "shortcut task failed");
                None
            }
        }
    }

    /// Deletes the shortcut (best-effort) and the install directory.
    async fn remove_installation(&self, record: &InstallRecord) -> InstallResult<()> {
        if let Some(shortcut) = &record.shortcut {
            if let Err(err) = tokio::fs::remove_file(shortcut).await {
                if err.kind() != io::ErrorKind::NotFound {
                    warn!(game_id = %record.game_id, error = %err, "shortcut removal failed");
                }
            }
        }
        match tokio::fs::remove_dir_all(&record.path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                warn!(
                    game_id = %record.game_id,
                    path = %record.path.display(),
                    "install directory already gone"
                );
                Ok(())
            }
            Err(source) => Err(InstallError::RemoveFiles {
                game_id: record.game_id.clone(),
                source,
            }),
        }
    }

    /// Owns a game process until it exits, then runs the exit continuation
    /// exactly once.
    async fn supervise(
        self,
        game_id: String,
        mut process: Box<dyn GameProcess>,
        started_at: Instant,
        mut kill_rx: oneshot::Receiver<()>,
        exited_tx: watch::Sender<bool>,
    ) {
        let killed = tokio::select! {
            result = process.wait() => {
                if let Err(err) = result {
                    warn!(game_id = %game_id, error = %err, "waiting for game failed");
                }
                false
            }
            Ok(()) = &mut kill_rx => true,
        };
        if killed {
            if let Err(err) = process.kill().await {
                warn!(game_id = %game_id, error = %err, "kill failed");
            }
        }

        {
            let mut slots = self.inner.registry.lock();
            if matches!(slots.get(&game_id), Some(Slot::Running(_))) {
                slots.remove(&game_id);
            }
        }

        let minutes = u32::try_from(started_at.elapsed().as_secs() / 60).unwrap_or(u32::MAX);
        info!(game_id = %game_id, minutes, killed, "game closed");
        if let Err(err) = self.inner.remote.report_playtime(&game_id, minutes).await {
            warn!(game_id = %game_id, minutes, error = %err, "playtime report failed");
        }
        self.emit(LauncherEvent::GameClosed { game_id, minutes });
        exited_tx.send_replace(true);
    }

    fn emit(&self, event: LauncherEvent) {
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }
}

fn install_conflict(game_id: &str, activity: Activity) -> InstallError {
    match activity {
        Activity::Downloading { .. } => InstallError::AlreadyInstalling(game_id.to_owned()),
        activity => busy(game_id, activity),
    }
}

fn busy(game_id: &str, activity: Activity) -> InstallError {
    InstallError::Busy {
        game_id: game_id.to_owned(),
        activity,
    }
}

fn join_error(err: tokio::task::JoinError) -> io::Error {
    io::Error::new(io::ErrorKind::Other, err)
}

async fn remove_file_quietly(path: &Path) {
    if let Err(err) = tokio::fs::remove_file(path).await {
        if err.kind() != io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %err, "cleanup failed");
        }
    }
}

async fn remove_dir_quietly(path: &Path) {
    if let Err(err) = tokio::fs::remove_dir_all(path).await {
        if err.kind() != io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %err, "cleanup failed");
        }
    }
}
