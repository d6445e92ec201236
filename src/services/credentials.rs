//! Credential and session store: users, sessions and the tokens tying them
//! together.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::config::BootstrapConfig;
use crate::db::repositories::session::Session;
use crate::db::{Store, User};
use crate::entities::Role;
use crate::services::auth_service::AuthError;
use crate::services::password::PasswordHashing;
use crate::services::token::{Claims, IssuedToken, TokenSigner};

#[derive(Clone)]
pub struct CredentialStore {
    store: Store,
    hashing: PasswordHashing,
    tokens: TokenSigner,
    /// Hash of a random secret, verified against when the username is unknown.
    decoy_hash: Arc<OnceCell<String>>,
}

impl CredentialStore {
    #[must_use]
    pub fn new(store: Store, hashing: PasswordHashing, tokens: TokenSigner) -> Self {
        Self {
            store,
            hashing,
            tokens,
            decoy_hash: Arc::new(OnceCell::new()),
        }
    }

    pub async fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        self.hashing.hash(password).await
    }

    /// Returns `false` if `username` is already taken.
    pub async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<bool, AuthError> {
        let created = self
            .store
            .user_repo()
            .create(username, password_hash, role)
            .await?;

        if created {
            info!("Created {} user: {}", role, username);
        }

        Ok(created)
    }

    /// Seed the administrator from `bootstrap` when no users exist yet.
    /// Returns the generated password when one had to be made up.
    pub async fn ensure_admin(&self, bootstrap: &BootstrapConfig) -> Result<Option<String>, AuthError> {
        if !self.store.user_repo().is_empty().await? {
            return Ok(None);
        }

        let (password, generated) = match &bootstrap.password {
            Some(password) => (password.clone(), false),
            None => (crate::services::token::generate_secret()[..20].to_string(), true),
        };

        let hash = self.hash_password(&password).await?;
        self.create_user(&bootstrap.username, &hash, Role::Admin)
            .await?;

        if generated {
            warn!(
                "Seeded administrator '{}' with generated password: {}",
                bootstrap.username, password
            );
            Ok(Some(password))
        } else {
            info!("Seeded administrator '{}'", bootstrap.username);
            Ok(None)
        }
    }

    /// Exact, case-sensitive username lookup followed by an Argon2 comparison.
    /// Unknown usernames still pay for one verification.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let Some((user, password_hash)) = self
            .store
            .user_repo()
            .get_by_username_with_password(username)
            .await?
        else {
            self.verify_decoy(password).await;
            return Err(AuthError::NotFound);
        };

        if self.hashing.verify(password, &password_hash).await? {
            Ok(user)
        } else {
            Err(AuthError::InvalidCredentials {
                attempts_left: None,
            })
        }
    }

    async fn verify_decoy(&self, password: &str) {
        let hashing = &self.hashing;
        let decoy = self
            .decoy_hash
            .get_or_try_init(|| {
                let secret = crate::services::token::generate_secret();
                async move { hashing.hash(&secret).await }
            })
            .await;

        match decoy {
            Ok(hash) => {
                let _ = hashing.verify(password, hash).await;
            }
            Err(e) => warn!("Failed to prepare decoy hash: {}", e),
        }
    }

    pub async fn issue_session(&self, user_id: &str) -> Result<IssuedToken, AuthError> {
        self.issue_session_at(user_id, Utc::now()).await
    }

    pub async fn issue_session_at(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, AuthError> {
        let user = self
            .store
            .user_repo()
            .get_by_id(user_id)
            .await?
            .ok_or(AuthError::NotFound)?;

        let issued = self.tokens.issue_at(&user, now)?;

        self.store
            .session_repo()
            .create(&user.id, &issued.token, issued.expires_at)
            .await?;

        Ok(issued)
    }

    /// Signature and expiry only; no store access.
    pub fn verify_token(&self, token: &str) -> Result<Claims, AuthError> {
        self.tokens.verify(token)
    }

    /// The persisted side of the check. Expired sessions are deleted on sight.
    pub async fn get_session_by_token(&self, token: &str) -> Result<Option<Session>, AuthError> {
        self.get_session_by_token_at(token, Utc::now()).await
    }

    pub async fn get_session_by_token_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Session>, AuthError> {
        Ok(self.store.session_repo().get_by_token(token, now).await?)
    }

    pub async fn remove_session(&self, token: &str) -> Result<bool, AuthError> {
        Ok(self.store.session_repo().remove(token).await?)
    }

    pub async fn remove_other_sessions(
        &self,
        user_id: &str,
        keep_token: Option<&str>,
    ) -> Result<usize, AuthError> {
        Ok(self
            .store
            .session_repo()
            .remove_for_user_except(user_id, keep_token)
            .await?)
    }

    pub async fn active_session_count(&self, user_id: &str) -> Result<usize, AuthError> {
        Ok(self
            .store
            .session_repo()
            .list_active_for_user(user_id, Utc::now())
            .await?
            .len())
    }

    pub async fn update_user_password(&self, user_id: &str, new_hash: &str) -> Result<(), AuthError> {
        if self
            .store
            .user_repo()
            .update_password(user_id, new_hash)
            .await?
        {
            Ok(())
        } else {
            Err(AuthError::NotFound)
        }
    }

    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>, AuthError> {
        Ok(self.store.user_repo().get_by_id(user_id).await?)
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, AuthError> {
        Ok(self.store.user_repo().get_by_username(username).await?)
    }

    pub async fn list_users(&self) -> Result<Vec<User>, AuthError> {
        Ok(self.store.user_repo().list().await?)
    }
}

#[cfg(test)]
pub(crate) fn test_credentials(store: Store) -> CredentialStore {
    let config = crate::services::password::fast_test_config();
    CredentialStore::new(
        store,
        PasswordHashing::new(&config).unwrap(),
        TokenSigner::new("unit-test-secret", chrono::Duration::hours(24)),
    )
}
