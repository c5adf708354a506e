//! Remote catalog, account and storage collaborator.
//!
//! The HTTP API itself lives outside this crate; the launcher only depends on
//! the [`RemoteCatalog`] trait.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::AsyncRead;

use crate::platform::Platform;

/// Result type for remote calls.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Errors returned by a [`RemoteCatalog`].
#[derive(Error, Debug)]
pub enum RemoteError {
    /// The backend could not be reached.
    #[error("remote service unavailable")]
    Unavailable,

    /// The requested game, release or achievement does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The backend answered with a failure status.
    #[error("request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Transfer failed mid-stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub windows_release: Option<String>,
    #[serde(default)]
    pub linux_release: Option<String>,
    #[serde(default)]
    pub mac_release: Option<String>,
}

/// Metadata for one release of a game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    /// Release id, stored as the installed version.
    pub id: String,
    /// Executable path relative to the install directory.
    pub main_binary: String,
    /// Whitespace-separated launch arguments.
    #[serde(default)]
    pub launch_arguments: String,
}

/// The logged-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub username: String,
}

/// An opened archive download.
pub struct Download {
    /// Total size when the server announces it.
    pub content_length: Option<u64>,
    pub body: Box<dyn AsyncRead + Send + Unpin>,
}

impl fmt::Debug for Download {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Download")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Catalog, storage and account operations the launcher needs.
#[async_trait]
pub trait RemoteCatalog: Send + Sync {
    /// Looks up a release of `game_id`.
    async fn get_package(&self, game_id: &str, release_id: &str) -> RemoteResult<Package>;

    /// Returns a download URL for the game's current release on `platform`.
    async fn get_download_url(&self, game_id: &str, platform: Platform) -> RemoteResult<String>;

    /// Starts streaming the object at `url`.
    async fn open_download(&self, url: &str) -> RemoteResult<Download>;

    async fn report_playtime(&self, game_id: &str, minutes: u32) -> RemoteResult<()>;

    async fn grant_achievement(&self, achievement_id: &str, user_id: &str) -> RemoteResult<()>;

    /// Fetches the game's icon, if it has one.
    async fn get_icon(&self, game_id: &str) -> RemoteResult<Option<Vec<u8>>>;

    /// Returns the account the backend currently considers logged in.
    async fn current_user(&self) -> RemoteResult<Option<Account>>;
}

/// A catalog with no backend: every call fails with
/// [`RemoteError::Unavailable`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Offline;

#[async_trait]
impl RemoteCatalog for Offline {
    async fn get_package(&self, _game_id: &str, _release_id: &str) -> RemoteResult<Package> {
        Err(RemoteError::Unavailable)
    }

    async fn get_download_url(&self, _game_id: &str, _platform: Platform) -> RemoteResult<String> {
        Err(RemoteError::Unavailable)
    }

    async fn open_download(&self, _url: &str) -> RemoteResult<Download> {
        Err(RemoteError::Unavailable)
    }

    async fn report_playtime(&self, _game_id: &str, _minutes: u32) -> RemoteResult<()> {
        Err(RemoteError::Unavailable)
    }

    async fn grant_achievement(&self, _achievement_id: &str, _user_id: &str) -> RemoteResult<()> {
        Err(RemoteError::Unavailable)
    }

    async fn get_icon(&self, _game_id: &str) -> RemoteResult<Option<Vec<u8>>> {
        Err(RemoteError::Unavailable)
    }

    async fn current_user(&self) -> RemoteResult<Option<Account>> {
        Err(RemoteError::Unavailable)
    }
}
