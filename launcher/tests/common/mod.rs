#![allow(dead_code)]

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use launcher::platform::{ArchiveExtractor, DesktopEntries, GameProcess, ProcessSpawner};
use launcher::remote::{Download, RemoteResult};
use launcher::{
    Account, Game, InstallManager, LauncherConfig, Package, Platform, RemoteCatalog, RemoteError,
    Session,
};
use parking_lot::Mutex;
use tempfile::TempDir;
use tokio::sync::{oneshot, Semaphore};

pub const MAIN_BINARY: &str = "run.sh";
pub const RELEASE_V1: &str = "6f9619ff-8b86-d011-b42d-00c04fc964ff";
pub const RELEASE_V2: &str = "0b1c6e2a-3f4d-4e5f-8a9b-0c1d2e3f4a5b";

pub fn game(id: &str, linux_release: Option<&str>) -> Game {
    Game {
        id: id.to_owned(),
        name: format!("Game {id}"),
        windows_release: Some(RELEASE_V1.to_owned()),
        linux_release: linux_release.map(str::to_owned),
        mac_release: None,
    }
}

pub fn alice() -> Account {
    Account {
        id: "user-1".into(),
        username: "alice".into(),
    }
}

/// In-memory catalog recording every side-effecting call.
#[derive(Default)]
pub struct FakeRemote {
    pub archive: Vec<u8>,
    pub icon: Option<Vec<u8>>,
    pub user: Mutex<Option<Account>>,
    pub fail_download: AtomicBool,
    pub fail_grants: AtomicBool,
    /// When set, `open_download` waits for a permit.
    pub download_gate: Option<Arc<Semaphore>>,
    pub downloads: AtomicUsize,
    pub playtime: Mutex<Vec<(String, u32)>>,
    pub grants: Mutex<Vec<(String, String)>>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self {
            archive: b"#!/bin/sh\necho hello\n".to_vec(),
            icon: Some(vec![0x89, b'P', b'N', b'G']),
            ..Self::default()
        }
    }

    pub fn gated() -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let remote = Self {
            download_gate: Some(Arc::clone(&gate)),
            ..Self::new()
        };
        (remote, gate)
    }

    pub fn playtime(&self) -> Vec<(String, u32)> {
        self.playtime.lock().clone()
    }

    pub fn grants(&self) -> Vec<(String, String)> {
        self.grants.lock().clone()
    }
}

#[async_trait]
impl RemoteCatalog for FakeRemote {
    async fn get_package(&self, game_id: &str, release_id: &str) -> RemoteResult<Package> {
        if game_id.is_empty() {
            return Err(RemoteError::NotFound(game_id.to_owned()));
        }
        Ok(Package {
            id: release_id.to_owned(),
            main_binary: MAIN_BINARY.to_owned(),
            launch_arguments: "--windowed  --lang en".to_owned(),
        })
    }

    async fn get_download_url(&self, game_id: &str, platform: Platform) -> RemoteResult<String> {
        Ok(format!("https://storage.test/{game_id}/{platform}"))
    }

    async fn open_download(&self, _url: &str) -> RemoteResult<Download> {
        if let Some(gate) = &self.download_gate {
            gate.acquire().await.map_err(|_| RemoteError::Unavailable)?.forget();
        }
        self.downloads.fetch_add(1, Ordering::SeqCst);
        if self.fail_download.load(Ordering::SeqCst) {
            return Err(RemoteError::Rejected {
                status: 503,
                message: "storage offline".into(),
            });
        }
        Ok(Download {
            content_length: Some(self.archive.len() as u64),
            body: Box::new(io::Cursor::new(self.archive.clone())),
        })
    }

    async fn report_playtime(&self, game_id: &str, minutes: u32) -> RemoteResult<()> {
        self.playtime.lock().push((game_id.to_owned(), minutes));
        Ok(())
    }

    async fn grant_achievement(&self, achievement_id: &str, user_id: &str) -> RemoteResult<()> {
        if self.fail_grants.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable);
        }
        self.grants
            .lock()
            .push((achievement_id.to_owned(), user_id.to_owned()));
        Ok(())
    }

    async fn get_icon(&self, _game_id: &str) -> RemoteResult<Option<Vec<u8>>> {
        Ok(self.icon.clone())
    }

    async fn current_user(&self) -> RemoteResult<Option<Account>> {
        Ok(self.user.lock().clone())
    }
}

/// Treats the archive as the main binary itself.
#[derive(Default)]
pub struct FakeExtractor {
    pub fail: AtomicBool,
}

#[async_trait]
impl ArchiveExtractor for FakeExtractor {
    async fn extract(&self, archive: &Path, dest: &Path) -> io::Result<()> {
        tokio::fs::create_dir_all(dest).await?;
        if self.fail.load(Ordering::SeqCst) {
            tokio::fs::write(dest.join("partial"), b"x").await?;
            return Err(io::Error::new(io::ErrorKind::InvalidData, "not a zip"));
        }
        tokio::fs::copy(archive, dest.join(MAIN_BINARY)).await?;
        Ok(())
    }
}

/// A launched fake process.
#[derive(Debug, Clone)]
pub struct Spawned {
    pub exe: PathBuf,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub killed: Arc<AtomicBool>,
}

/// Spawns processes that exit when the test says so.
#[derive(Default)]
pub struct FakeSpawner {
    pub spawned: Mutex<Vec<Spawned>>,
    pub fail: AtomicBool,
    exits: Mutex<HashMap<PathBuf, oneshot::Sender<()>>>,
}

impl FakeSpawner {
    /// Makes the process started from `exe` exit on its own.
    pub fn exit(&self, exe: &Path) {
        if let Some(tx) = self.exits.lock().remove(exe) {
            let _ = tx.send(());
        }
    }

    pub fn spawned(&self) -> Vec<Spawned> {
        self.spawned.lock().clone()
    }
}

impl ProcessSpawner for FakeSpawner {
    fn spawn(&self, exe: &Path, args: &[String], cwd: &Path) -> io::Result<Box<dyn GameProcess>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "not executable"));
        }
        let (tx, rx) = oneshot::channel();
        let killed = Arc::new(AtomicBool::new(false));
        self.exits.lock().insert(exe.to_owned(), tx);
        self.spawned.lock().push(Spawned {
            exe: exe.to_owned(),
            args: args.to_vec(),
            cwd: cwd.to_owned(),
            killed: Arc::clone(&killed),
        });
        Ok(Box::new(FakeProcess { exit: rx, killed }))
    }
}

struct FakeProcess {
    exit: oneshot::Receiver<()>,
    killed: Arc<AtomicBool>,
}

#[async_trait]
impl GameProcess for FakeProcess {
    async fn wait(&mut self) -> io::Result<()> {
        let _ = (&mut self.exit).await;
        Ok(())
    }

    async fn kill(&mut self) -> io::Result<()> {
        self.killed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn id(&self) -> Option<u32> {
        Some(4242)
    }
}

/// A manager wired to fakes inside a temporary data directory.
pub struct Harness {
    pub dir: TempDir,
    pub config: LauncherConfig,
    pub remote: Arc<FakeRemote>,
    pub session: Arc<Session>,
    pub extractor: Arc<FakeExtractor>,
    pub spawner: Arc<FakeSpawner>,
    pub manager: InstallManager,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_remote(FakeRemote::new())
    }

    pub fn with_remote(remote: FakeRemote) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = LauncherConfig::in_dir(dir.path().join("data"));
        config.shortcuts_dir = Some(dir.path().join("applications"));
        let remote = Arc::new(remote);
        let session = Arc::new(Session::logged_in(alice()));
        let extractor = Arc::new(FakeExtractor::default());
        let spawner = Arc::new(FakeSpawner::default());
        let manager = Self::build(&config, &remote, &session, &extractor, &spawner);
        Self {
            dir,
            config,
            remote,
            session,
            extractor,
            spawner,
            manager,
        }
    }

    /// Builds another manager over the same data directory.
    pub fn reopen(&self) -> InstallManager {
        Self::build(
            &self.config,
            &self.remote,
            &self.session,
            &self.extractor,
            &self.spawner,
        )
    }

    fn build(
        config: &LauncherConfig,
        remote: &Arc<FakeRemote>,
        session: &Arc<Session>,
        extractor: &Arc<FakeExtractor>,
        spawner: &Arc<FakeSpawner>,
    ) -> InstallManager {
        let shortcuts_dir = config.shortcuts_dir.clone().unwrap();
        InstallManager::builder(config.clone(), Arc::clone(remote) as Arc<dyn RemoteCatalog>)
            .platform(Platform::Linux)
            .session(Arc::clone(session))
            .extractor(Arc::clone(extractor) as Arc<dyn ArchiveExtractor>)
            .shortcuts(Arc::new(DesktopEntries::new(shortcuts_dir)))
            .spawner(Arc::clone(spawner) as Arc<dyn ProcessSpawner>)
            .build()
            .unwrap()
    }

    pub fn install_dir(&self) -> PathBuf {
        self.config.install_dir()
    }
}
