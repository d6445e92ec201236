use chrono::{DateTime, Utc};

use crate::db::{Collection, StoreError};
use crate::entities::sessions;

pub type Session = sessions::Model;

pub struct SessionRepository {
    sessions: Collection<sessions::Model>,
}

impl SessionRepository {
    #[must_use]
    pub const fn new(sessions: Collection<sessions::Model>) -> Self {
        Self { sessions }
    }

    pub async fn create(
        &self,
        user_id: &str,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Session, StoreError> {
        let session = Session {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            token: token.to_string(),
            expires_at,
            created_at: Utc::now(),
        };

        self.sessions.put(session.clone()).await?;
        Ok(session)
    }

    /// Plain lookup, expired or not. No side effects.
    pub async fn find_by_token(&self, token: &str) -> Result<Option<Session>, StoreError> {
        self.sessions.get(token).await
    }

    /// Lookup that enforces expiry: a session observed past `expires_at` is
    /// deleted and reported as absent.
    pub async fn get_by_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Session>, StoreError> {
        self.sessions
            .update(token, |session| session.filter(|s| !s.is_expired_at(now)))
            .await
    }

    pub async fn remove(&self, token: &str) -> Result<bool, StoreError> {
        self.sessions.delete(token).await
    }

    /// Drop every session of `user_id` except the one carrying `keep_token`.
    pub async fn remove_for_user_except(
        &self,
        user_id: &str,
        keep_token: Option<&str>,
    ) -> Result<usize, StoreError> {
        self.sessions
            .retain(|s| s.user_id != user_id || Some(s.token.as_str()) == keep_token)
            .await
    }

    /// Unexpired sessions of `user_id`. Read-only; nothing is pruned here.
    pub async fn list_active_for_user(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Session>, StoreError> {
        self.sessions
            .list_by(|s| s.user_id == user_id && !s.is_expired_at(now))
            .await
    }
}
