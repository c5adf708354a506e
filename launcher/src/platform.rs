//! Operating-system collaborators: platform detection, shortcuts, archive
//! extraction and process spawning.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::{Child, Command};
use tracing::debug;

use crate::remote::Game;

/// Target platform of a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Windows,
    Linux,
    Mac,
}

impl Platform {
    /// The platform this binary was compiled for.
    pub const fn current() -> Self {
        if cfg!(target_os = "windows") {
            Self::Windows
        } else if cfg!(target_os = "macos") {
            Self::Mac
        } else {
            Self::Linux
        }
    }

    /// Name used by the catalog API.
    pub const fn os_name(self) -> &'static str {
        match self {
            Self::Windows => "windows",
            Self::Linux => "linux",
            Self::Mac => "mac",
        }
    }

    /// Release id of `game` for this platform. Blank ids count as absent.
    pub fn release_for(self, game: &Game) -> Option<&str> {
        let release = match self {
            Self::Windows => game.windows_release.as_deref(),
            Self::Linux => game.linux_release.as_deref(),
            Self::Mac => game.mac_release.as_deref(),
        };
        release.filter(|id| !id.trim().is_empty())
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.os_name())
    }
}

/// Creates launcher shortcuts for installed games.
pub trait ShortcutFactory: Send + Sync {
    /// Creates a shortcut and returns its path, or `None` when the platform
    /// has no shortcut support.
    fn create_shortcut(
        &self,
        name: &str,
        exe: &Path,
        icon: Option<&Path>,
    ) -> io::Result<Option<PathBuf>>;
}

/// Writes freedesktop `.desktop` entries into a directory.
#[derive(Debug, Clone)]
pub struct DesktopEntries {
    dir: PathBuf,
}

impl DesktopEntries {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ShortcutFactory for DesktopEntries {
    fn create_shortcut(
        &self,
        name: &str,
        exe: &Path,
        icon: Option<&Path>,
    ) -> io::Result<Option<PathBuf>> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self
            .dir
            .join(format!("{}.desktop", safe_file_name(name).to_lowercase()));
        let mut entry = format!(
            "[Desktop Entry]\n\
             Type=Application\n\
             Name={name}\n\
             Exec=\"{}\"\n",
            exe.display(),
        );
        if let Some(icon) = icon {
            entry.push_str(&format!("Icon={}\n", icon.display()));
        }
        entry.push_str("Terminal=false\nCategories=Game;\n");
        std::fs::write(&path, entry)?;
        mark_executable(&path)?;
        debug!(path = %path.display(), "desktop entry written");
        Ok(Some(path))
    }
}

#[cfg(unix)]
fn mark_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn mark_executable(_path: &Path) -> io::Result<()> {
    Ok(())
}

/// Strips characters that are not valid in file names on any platform.
fn safe_file_name(name: &str) -> String {
    name.chars()
        .filter(|c| {
            !c.is_control() && !matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|')
        })
        .collect()
}

/// Shortcut factory for platforms without shortcut support.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoShortcuts;

impl ShortcutFactory for NoShortcuts {
    fn create_shortcut(
        &self,
        _name: &str,
        _exe: &Path,
        _icon: Option<&Path>,
    ) -> io::Result<Option<PathBuf>> {
        Ok(None)
    }
}

/// Picks the shortcut factory for the compile target.
///
/// Only Linux has an implementation; elsewhere, or without a directory,
/// shortcuts are skipped.
pub fn default_shortcuts(dir: Option<PathBuf>) -> Arc<dyn ShortcutFactory> {
    match dir {
        Some(dir) if cfg!(target_os = "linux") => Arc::new(DesktopEntries::new(dir)),
        _ => Arc::new(NoShortcuts),
    }
}

/// Unpacks a downloaded archive.
#[async_trait]
pub trait ArchiveExtractor: Send + Sync {
    async fn extract(&self, archive: &Path, dest: &Path) -> io::Result<()>;
}

/// Extracts zip archives with the system `unzip` (or `tar` on Windows).
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandExtractor;

#[async_trait]
impl ArchiveExtractor for CommandExtractor {
    async fn extract(&self, archive: &Path, dest: &Path) -> io::Result<()> {
        tokio::fs::create_dir_all(dest).await?;
        let mut command = if cfg!(windows) {
            let mut command = Command::new("tar");
            command.arg("-xf").arg(archive).arg("-C").arg(dest);
            command
        } else {
            let mut command = Command::new("unzip");
            command.arg("-qo").arg(archive).arg("-d").arg(dest);
            command
        };
        let status = command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .status()
            .await?;
        if status.success() {
            Ok(())
        } else {
            Err(io::Error::new(
                io::ErrorKind::Other,
                format!("extractor exited with {status}"),
            ))
        }
    }
}

/// A supervised game process.
#[async_trait]
pub trait GameProcess: Send {
    /// Waits for the process to exit.
    async fn wait(&mut self) -> io::Result<()>;

    /// Terminates the process and reaps it.
    async fn kill(&mut self) -> io::Result<()>;

    fn id(&self) -> Option<u32>;
}

/// Starts game processes.
pub trait ProcessSpawner: Send + Sync {
    fn spawn(&self, exe: &Path, args: &[String], cwd: &Path) -> io::Result<Box<dyn GameProcess>>;
}

/// Spawns real child processes through `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSpawner;

impl ProcessSpawner for TokioSpawner {
    fn spawn(&self, exe: &Path, args: &[String], cwd: &Path) -> io::Result<Box<dyn GameProcess>> {
        let child = Command::new(exe)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .spawn()?;
        Ok(Box::new(TokioProcess { child }))
    }
}

#[derive(Debug)]
struct TokioProcess {
    child: Child,
}

#[async_trait]
impl GameProcess for TokioProcess {
    async fn wait(&mut self) -> io::Result<()> {
        let status = self.child.wait().await?;
        debug!(%status, "game process exited");
        Ok(())
    }

    async fn kill(&mut self) -> io::Result<()> {
        self.child.kill().await
    }

    fn id(&self) -> Option<u32> {
        self.child.id()
    }
}
