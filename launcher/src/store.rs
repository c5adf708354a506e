//! Persisted install records.
//!
//! Records live in one JSON object keyed by game id. Every mutation rewrites
//! the file through a temporary sibling and a rename, and an in-memory change
//! is undone when the write fails, so memory and disk agree after every call.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Install store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("corrupt install store {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// A committed installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallRecord {
    pub game_id: String,
    pub name: String,
    pub installed: bool,
    /// Release id the files came from.
    pub version: String,
    /// Install directory.
    pub path: PathBuf,
    /// Main binary, relative to `path`.
    pub exe: String,
    /// Whitespace-separated launch arguments.
    #[serde(default)]
    pub args: String,
    #[serde(default)]
    pub shortcut: Option<PathBuf>,
}

impl InstallRecord {
    /// Absolute path of the main binary.
    pub fn exe_path(&self) -> PathBuf {
        self.path.join(&self.exe)
    }

    /// Launch arguments split on whitespace.
    pub fn arg_list(&self) -> Vec<String> {
        self.args.split_whitespace().map(str::to_owned).collect()
    }
}

/// JSON-file backed map of install records.
#[derive(Debug)]
pub struct InstallStore {
    path: PathBuf,
    records: RwLock<BTreeMap<String, InstallRecord>>,
}

impl InstallStore {
    /// Loads the store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let records = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
                path: path.clone(),
                source,
            })?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        debug!(path = %path.display(), count = records.len(), "install store loaded");
        Ok(Self {
            path,
            records: RwLock::new(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, game_id: &str) -> Option<InstallRecord> {
        self.records.read().get(game_id).cloned()
    }

    pub fn is_installed(&self, game_id: &str) -> bool {
        self.records
            .read()
            .get(game_id)
            .is_some_and(|record| record.installed)
    }

    /// All records, ordered by game id.
    pub fn records(&self) -> Vec<InstallRecord> {
        self.records.read().values().cloned().collect()
    }

    /// Inserts or replaces a record and persists the store.
    pub fn commit(&self, record: InstallRecord) -> StoreResult<()> {
        let mut records = self.records.write();
        let game_id = record.game_id.clone();
        let previous = records.insert(game_id.clone(), record);
        if let Err(err) = self.persist(&records) {
            match previous {
                Some(previous) => records.insert(game_id, previous),
                None => records.remove(&game_id),
            };
            return Err(err);
        }
        Ok(())
    }

    /// Removes a record and persists the store.
    pub fn remove(&self, game_id: &str) -> StoreResult<Option<InstallRecord>> {
        let mut records = self.records.write();
        let Some(previous) = records.remove(game_id) else {
            return Ok(None);
        };
        if let Err(err) = self.persist(&records) {
            records.insert(game_id.to_owned(), previous);
            return Err(err);
        }
        Ok(Some(previous))
    }

    fn persist(&self, records: &BTreeMap<String, InstallRecord>) -> StoreResult<()> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        let bytes = serde_json::to_vec_pretty(records).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, bytes).map_err(io_err)?;
        std::fs::rename(&tmp, &self.path).map_err(io_err)?;
        Ok(())
    }
}
