//! Session context shared by every part of the client that needs credentials
//!
//! Components never read the token from a global; they receive a
//! [`SessionStore`] and go through it.

use crate::model::user::{AuthResponse, User};
use crate::utils::get_data_dir;
use color_eyre::{eyre, Report};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

const SESSION_FILE: &str = "session.json";

/// Token and user persisted after a successful login or registration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user: User,
}

impl From<&AuthResponse> for Session {
    fn from(auth: &AuthResponse) -> Self {
        Session {
            token: auth.token.clone(),
            user: auth.user.clone(),
        }
    }
}

/// Read/write access to the current session
pub trait SessionStore: Send + Sync {
    fn session(&self) -> Option<Session>;

    fn save(&self, auth: &AuthResponse) -> eyre::Result<()>;

    fn clear(&self) -> eyre::Result<()>;

    fn token(&self) -> Option<String> {
        self.session()
            .map(|s| s.token)
            .filter(|token| !token.is_empty())
    }

    fn user(&self) -> Option<User> {
        self.session().map(|s| s.user)
    }
}

/// Session kept in `session.json` inside the data directory
pub struct FileSessionStore {
    path: PathBuf,
    current: RwLock<Option<Session>>,
}

impl FileSessionStore {
    /// Open the store in the default data directory
    pub fn open_default() -> eyre::Result<Self> {
        Self::open(get_data_dir())
    }

    /// Open the store in `data_dir`, loading any previous session
    pub fn open(data_dir: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = data_dir.as_ref().join(SESSION_FILE);
        let current = if path.exists() {
            match Self::load_from_file(&path) {
                Ok(session) => Some(session),
                Err(e) => {
                    tracing::warn!("Ignoring unreadable session file {:?}: {}", path, e);
                    None
                }
            }
        } else {
            None
        };
        Ok(FileSessionStore {
            path,
            current: RwLock::new(current),
        })
    }

    fn load_from_file(path: &Path) -> eyre::Result<Session> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn session(&self) -> Option<Session> {
        self.current.read().ok().and_then(|s| s.clone())
    }

    fn save(&self, auth: &AuthResponse) -> eyre::Result<()> {
        let session = Session::from(auth);
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&session)?)?;
        let mut current = self
            .current
            .write()
            .map_err(|_| Report::msg("session lock poisoned"))?;
        *current = Some(session);
        tracing::info!("Session saved for user {}", auth.user.username);
        Ok(())
    }

    fn clear(&self) -> eyre::Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        let mut current = self
            .current
            .write()
            .map_err(|_| Report::msg("session lock poisoned"))?;
        *current = None;
        Ok(())
    }
}

/// In-memory session, used by tests and headless tooling
#[derive(Default)]
pub struct MemorySessionStore {
    current: RwLock<Option<Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        MemorySessionStore::default()
    }

    pub fn with_token(token: impl Into<String>, user: User) -> Self {
        MemorySessionStore {
            current: RwLock::new(Some(Session {
                token: token.into(),
                user,
            })),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn session(&self) -> Option<Session> {
        self.current.read().ok().and_then(|s| s.clone())
    }

    fn save(&self, auth: &AuthResponse) -> eyre::Result<()> {
        let mut current = self
            .current
            .write()
            .map_err(|_| Report::msg("session lock poisoned"))?;
        *current = Some(Session::from(auth));
        Ok(())
    }

    fn clear(&self) -> eyre::Result<()> {
        let mut current = self
            .current
            .write()
            .map_err(|_| Report::msg("session lock poisoned"))?;
        *current = None;
        Ok(())
    }
}
