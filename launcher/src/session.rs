//! Login session shared by the management server and the install manager.

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::remote::{Account, RemoteCatalog, RemoteResult};

/// The launcher's login state.
///
/// Single writer (login and logout), many readers.
#[derive(Debug, Default)]
pub struct Session {
    account: RwLock<Option<Account>>,
}

impl Session {
    /// Creates a logged-out session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a session with `account` already logged in.
    pub fn logged_in(account: Account) -> Self {
        Self {
            account: RwLock::new(Some(account)),
        }
    }

    pub fn login(&self, account: Account) {
        info!(user_id = %account.id, username = %account.username, "logged in");
        *self.account.write() = Some(account);
    }

    pub fn logout(&self) {
        if let Some(account) = self.account.write().take() {
            info!(user_id = %account.id, "logged out");
        }
    }

    /// Snapshot of the logged-in account.
    pub fn current_user(&self) -> Option<Account> {
        self.account.read().clone()
    }

    pub fn is_logged_in(&self) -> bool {
        self.account.read().is_some()
    }

    /// Replaces the local state with whatever the backend reports.
    pub async fn refresh(&self, remote: &dyn RemoteCatalog) -> RemoteResult<()> {
        let account = remote.current_user().await?;
        debug!(logged_in = account.is_some(), "session refreshed");
        *self.account.write() = account;
        Ok(())
    }
}
