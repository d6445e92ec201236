use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::entities::{login_attempts, sessions, users};

pub mod collection;
pub mod repositories;

pub use collection::{Collection, JsonFileBackend, MemoryBackend, Record, RecordBackend, StoreError};
pub use repositories::session::SessionRepository;
pub use repositories::user::{User, UserRepository};

pub const USERS_FILE: &str = "users.json";
pub const SESSIONS_FILE: &str = "sessions.json";
pub const LOGIN_ATTEMPTS_FILE: &str = "login-attempts.json";

/// The three independent record collections backing authentication.
#[derive(Clone)]
pub struct Store {
    users: Collection<users::Model>,
    sessions: Collection<sessions::Model>,
    login_attempts: Collection<login_attempts::Model>,
}

impl Store {
    /// Open (or lazily create) the JSON collections under `data_dir`.
    pub async fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref();

        tokio::fs::create_dir_all(data_dir)
            .await
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        info!("Record store opened at {}", data_dir.display());

        Ok(Self {
            users: Collection::json_file(data_dir.join(USERS_FILE)),
            sessions: Collection::json_file(data_dir.join(SESSIONS_FILE)),
            login_attempts: Collection::json_file(data_dir.join(LOGIN_ATTEMPTS_FILE)),
        })
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            users: Collection::in_memory(),
            sessions: Collection::in_memory(),
            login_attempts: Collection::in_memory(),
        }
    }

    #[must_use]
    pub fn user_repo(&self) -> UserRepository {
        UserRepository::new(self.users.clone())
    }

    #[must_use]
    pub fn session_repo(&self) -> SessionRepository {
        SessionRepository::new(self.sessions.clone())
    }

    #[must_use]
    pub fn login_attempts(&self) -> &Collection<login_attempts::Model> {
        &self.login_attempts
    }
}
