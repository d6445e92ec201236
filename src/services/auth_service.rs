//! Domain service for authentication and user management.
//!
//! Handles login throttling, session lifecycle, request authorization and
//! password changes.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::db::StoreError;
use crate::entities::Role;

/// Errors specific to authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("User not found")]
    NotFound,

    #[error("Invalid credentials")]
    InvalidCredentials { attempts_left: Option<u32> },

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    Expired,

    #[error("Too many login attempts, try again in {retry_after_minutes} minutes")]
    Blocked { retry_after_minutes: i64 },

    #[error("Not authenticated")]
    Unauthenticated,

    /// Authenticated, but the role does not allow the operation.
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Storage failure: {0}")]
    Storage(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// User info DTO for responses.
#[derive(Debug, Clone, Serialize)]
pub struct UserInfo {
    pub id: String,
    pub username: String,
    pub role: Role,
    pub created_at: String,
    pub updated_at: Option<String>,
}

/// Successful login: the session token and when it lapses.
#[derive(Debug, Clone, Serialize)]
pub struct LoginResult {
    pub username: String,
    pub role: Role,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Identity attached to a request that passed the guard.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub username: String,
    pub role: Role,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl AuthenticatedUser {
    pub fn require_role(&self, role: Role) -> Result<(), AuthError> {
        if self.role == role {
            Ok(())
        } else {
            Err(AuthError::Unauthorized)
        }
    }
}

/// Domain service trait for authentication.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Throttled credential check followed by session issuance.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Blocked`] while `source_address` is locked out and
    /// [`AuthError::InvalidCredentials`] on a bad username or password.
    async fn login(
        &self,
        username: &str,
        password: &str,
        source_address: &str,
    ) -> Result<LoginResult, AuthError>;

    /// Revokes the session behind `token`. Unknown tokens are ignored.
    async fn logout(&self, token: &str);

    /// Verifies a bearer token against its signature and its stored session.
    async fn authorize(&self, token: &str) -> Result<AuthenticatedUser, AuthError>;

    /// Gets information for a specific user.
    async fn get_user_info(&self, user_id: &str) -> Result<UserInfo, AuthError>;

    /// Changes a user's password and revokes their other sessions. A wrong
    /// current password counts as a failed login for `source_address`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Validation`] if current password is incorrect or new password invalid,
    /// and [`AuthError::Blocked`] while `source_address` is locked out.
    async fn change_password(
        &self,
        user: &AuthenticatedUser,
        current_password: &str,
        new_password: &str,
        source_address: &str,
    ) -> Result<(), AuthError>;
}
