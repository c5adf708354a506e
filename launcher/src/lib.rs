//! Launcher core for Serble games.
//!
//! Two services share a [`Session`]:
//!
//! - [`ManagementServer`] answers games over the loopback management channel
//!   (handshake queries and achievement grants).
//! - [`InstallManager`] downloads, extracts, launches, supervises and removes
//!   games, persisting what is installed in an [`InstallStore`].
//!
//! Everything outside the machine is reached through [`RemoteCatalog`], and
//! everything OS-specific through the traits in [`platform`].
//!
//! # Design Principles
//!
//! - **One activity per game** - Downloading, running and uninstalling are
//!   mutually exclusive and checked under a single lock.
//! - **Exactly-once exit handling** - Natural exit and kill both flow through
//!   the process supervisor.
//! - **Best-effort extras** - Icons, shortcuts, playtime and achievements are
//!   logged on failure and never fail the surrounding operation.

mod config;
mod install;
mod progress;
mod registry;
mod server;
mod session;
mod store;
mod transport;

pub mod client;
pub mod platform;
pub mod remote;

pub use client::{ClientError, ManagementClient};
pub use config::{ConfigError, LauncherConfig, DEFAULT_MANAGEMENT_PORT};
pub use install::{
    InstallError, InstallManager, InstallManagerBuilder, InstallResult, LauncherEvent,
};
pub use platform::Platform;
pub use progress::{Progress, TERMINATED};
pub use registry::{Activity, ActivityTable, DownloadStatus};
pub use remote::{Account, Game, Offline, Package, RemoteCatalog, RemoteError};
pub use server::{ConnectionError, ManagementServer};
pub use session::Session;
pub use store::{InstallRecord, InstallStore, StoreError};
pub use transport::{read_frame, write_packet, OwnedFrame, TransportError};
