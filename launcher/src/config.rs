//! Launcher configuration.

use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use wire::Limits;

/// Loopback port games connect to.
pub const DEFAULT_MANAGEMENT_PORT: u16 = 46599;

/// Configuration loading errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Launcher settings, read from a TOML file.
///
/// Every field is optional in the file. `install_dir` and `store_file`
/// default to locations under `data_dir`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LauncherConfig {
    pub data_dir: PathBuf,
    pub install_dir: Option<PathBuf>,
    pub store_file: Option<PathBuf>,
    pub management_addr: SocketAddr,
    /// Where desktop shortcuts go; `None` disables them.
    pub shortcuts_dir: Option<PathBuf>,
    pub max_frame_bytes: usize,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        let home = std::env::var_os("HOME").map(PathBuf::from);
        let data_dir = home.as_ref().map_or_else(
            || PathBuf::from("serble-launcher"),
            |home| home.join(".local/share/serble-launcher"),
        );
        Self {
            data_dir,
            install_dir: None,
            store_file: None,
            management_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_MANAGEMENT_PORT)),
            shortcuts_dir: home.map(|home| home.join(".local/share/applications")),
            max_frame_bytes: Limits::default().max_frame_bytes,
        }
    }
}

impl LauncherConfig {
    /// Loads `path`, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(text) => toml::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.to_owned(),
                source,
            }),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Io {
                path: path.to_owned(),
                source,
            }),
        }
    }

    /// Configuration rooted at `data_dir`, with shortcuts disabled.
    pub fn in_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            shortcuts_dir: None,
            ..Self::default()
        }
    }

    pub fn install_dir(&self) -> PathBuf {
        self.install_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("games"))
    }

    pub fn store_file(&self) -> PathBuf {
        self.store_file
            .clone()
            .unwrap_or_else(|| self.data_dir.join("installs.json"))
    }

    pub fn limits(&self) -> Limits {
        Limits {
            max_frame_bytes: self.max_frame_bytes,
        }
    }
}
