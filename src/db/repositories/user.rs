use chrono::{DateTime, Utc};

use crate::db::{Collection, StoreError};
use crate::entities::{Role, users};

/// User data returned from repository (without sensitive password hash)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub username: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<users::Model> for User {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            role: model.role,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

pub struct UserRepository {
    users: Collection<users::Model>,
}

impl UserRepository {
    #[must_use]
    pub const fn new(users: Collection<users::Model>) -> Self {
        Self { users }
    }

    /// Append a new user. Returns `false` if the username is already taken.
    pub async fn create(
        &self,
        username: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<bool, StoreError> {
        let now = Utc::now();
        let record = users::Model {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            role,
            created_at: now,
            updated_at: Some(now),
        };

        self.users
            .insert_unless(record, |existing| existing.username == username)
            .await
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let user = self.users.find_by(|u| u.username == username).await?;
        Ok(user.map(User::from))
    }

    /// Get user by username with password hash (for credential checks)
    pub async fn get_by_username_with_password(
        &self,
        username: &str,
    ) -> Result<Option<(User, String)>, StoreError> {
        let user = self.users.find_by(|u| u.username == username).await?;

        Ok(user.map(|u| {
            let password_hash = u.password_hash.clone();
            (User::from(u), password_hash)
        }))
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        let user = self.users.get(id).await?;
        Ok(user.map(User::from))
    }

    pub async fn list(&self) -> Result<Vec<User>, StoreError> {
        let users = self.users.all().await?;
        Ok(users.into_iter().map(User::from).collect())
    }

    pub async fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.users.all().await?.is_empty())
    }

    /// Overwrite the stored hash. Returns `false` if no such user exists.
    pub async fn update_password(&self, id: &str, new_hash: &str) -> Result<bool, StoreError> {
        let new_hash = new_hash.to_string();
        let updated = self
            .users
            .update(id, |user| {
                user.map(|mut u| {
                    u.password_hash = new_hash;
                    u.updated_at = Some(Utc::now());
                    u
                })
            })
            .await?;

        Ok(updated.is_some())
    }
}
