//! Wallet session lifecycle.
//!
//! Exactly one [`Session`] exists per running client. Only the
//! [`SessionManager`] mutates it; everything else reads it. A persisted
//! "was connected" flag survives restarts so the client reconnects the way
//! the user left it.

use crate::{
    agent::WalletAgent,
    error::{
        Error,
        Result,
    },
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fs,
    path::{
        Path,
        PathBuf,
    },
    sync::Arc,
};
use tracing::warn;

const SESSION_FILE: &str = "session.json";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Session {
    pub address: Option<String>,
    pub network: String,
    pub persisted: bool,
}

impl Session {
    pub fn connected(&self) -> bool {
        self.address.is_some()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
}

/// What an accounts-changed notification amounted to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AccountChange {
    /// Same first account as before; nothing to do.
    Unchanged,
    /// The agent switched to a different account; a re-sync is required.
    Switched(String),
    /// The agent reported zero accounts; the session was torn down.
    Disconnected,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredConnection {
    was_connected: bool,
}

/// Durable home of the single "was previously connected" flag.
#[derive(Debug)]
pub struct ConnectionStore {
    path: PathBuf,
}

impl ConnectionStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Result<Self> {
        let dir = data_dir.as_ref();
        if !dir.exists() {
            fs::create_dir_all(dir).map_err(|e| {
                Error::Store(format!("failed to create {}: {e}", dir.display()))
            })?;
        }
        Ok(Self {
            path: dir.join(SESSION_FILE),
        })
    }

    pub fn was_connected(&self) -> bool {
        let Ok(data) = fs::read(&self.path) else {
            return false;
        };
        match serde_json::from_slice::<StoredConnection>(&data) {
            Ok(stored) => stored.was_connected,
            Err(err) => {
                warn!(?err, path = %self.path.display(), "unreadable session file; treating as never connected");
                false
            }
        }
    }

    pub fn set_connected(&self, connected: bool) -> Result<()> {
        let stored = StoredConnection {
            was_connected: connected,
        };
        let json = serde_json::to_vec_pretty(&stored)
            .map_err(|e| Error::Store(format!("failed to serialize session file: {e}")))?;
        fs::write(&self.path, json).map_err(|e| {
            Error::Store(format!("failed to write {}: {e}", self.path.display()))
        })
    }
}

pub struct SessionManager<A> {
    agent: Arc<A>,
    store: ConnectionStore,
    session: Session,
    state: SessionState,
}

impl<A> SessionManager<A> {
    pub fn new(agent: Arc<A>, store: ConnectionStore) -> Self {
        Self {
            agent,
            store,
            session: Session::default(),
            state: SessionState::Disconnected,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// True when a prior run left the persisted flag set, in which case
    /// startup should call [`SessionManager::connect`] unprompted.
    pub fn should_auto_connect(&self) -> bool {
        self.store.was_connected()
    }
}

impl<A: WalletAgent> SessionManager<A> {
    /// Request account access from the signing agent and record
    /// address + network. Any agent failure other than the agent being
    /// absent surfaces as [`Error::ConnectionRejected`].
    pub async fn connect(&mut self) -> Result<&Session> {
        self.state = SessionState::Connecting;
        match self.establish().await {
            Ok(session) => match self.store.set_connected(true) {
                Ok(()) => {
                    self.session = session;
                    self.state = SessionState::Connected;
                    Ok(&self.session)
                }
                Err(err) => {
                    // An unpersistable session must not look established.
                    self.session = Session::default();
                    self.state = SessionState::Disconnected;
                    Err(err)
                }
            },
            Err(err) => {
                self.state = SessionState::Disconnected;
                match err {
                    Error::AgentUnavailable => Err(Error::AgentUnavailable),
                    Error::ConnectionRejected(msg) => Err(Error::ConnectionRejected(msg)),
                    other => Err(Error::ConnectionRejected(other.to_string())),
                }
            }
        }
    }

    async fn establish(&self) -> Result<Session> {
        let network = self.agent.network_name().await?;
        let accounts = self.agent.request_accounts().await?;
        let address = accounts
            .into_iter()
            .next()
            .ok_or_else(|| Error::ConnectionRejected("wallet returned no accounts".into()))?;
        Ok(Session {
            address: Some(address),
            network,
            persisted: true,
        })
    }

    /// Clear the session and the persisted flag. Consumers must drop any
    /// snapshot they hold; ownership and deposit data for a disconnected
    /// session is stale by definition.
    pub fn disconnect(&mut self) -> Result<()> {
        self.session = Session::default();
        self.state = SessionState::Disconnected;
        self.store.set_connected(false)
    }

    /// React to an accounts-changed notification. An empty list is a
    /// disconnect; a new first account is switched in place without a full
    /// reconnect.
    pub fn on_accounts_changed(&mut self, accounts: Vec<String>) -> Result<AccountChange> {
        let Some(first) = accounts.into_iter().next() else {
            self.disconnect()?;
            return Ok(AccountChange::Disconnected);
        };
        if self.session.address.as_deref() == Some(first.as_str()) {
            return Ok(AccountChange::Unchanged);
        }
        self.session.address = Some(first.clone());
        Ok(AccountChange::Switched(first))
    }

    /// A chain change invalidates every read and every in-flight assumption
    /// about contract identity. The in-memory session is dropped, but the
    /// persisted flag survives so the restarted client reconnects on the
    /// new chain, mirroring a page reload.
    pub fn on_chain_changed(&mut self) {
        self.session = Session::default();
        self.state = SessionState::Disconnected;
    }
}
