//! File-backed implementation of the `AuthService` trait.
//!
//! Storage failures are handled here rather than propagated: they are logged and
//! the request falls back to the safe answer (not authenticated, not blocked,
//! nothing revoked).

use async_trait::async_trait;
use tracing::{info, warn};

use crate::constants::limits::MIN_PASSWORD_LEN;
use crate::services::auth_service::{
    AuthError, AuthService, AuthenticatedUser, LoginResult, UserInfo,
};
use crate::services::credentials::CredentialStore;
use crate::services::login_limiter::{BlockStatus, FailureOutcome, LoginLimiter, remaining_minutes};

pub struct DefaultAuthService {
    credentials: CredentialStore,
    limiter: LoginLimiter,
}

impl DefaultAuthService {
    #[must_use]
    pub const fn new(credentials: CredentialStore, limiter: LoginLimiter) -> Self {
        Self {
            credentials,
            limiter,
        }
    }

    async fn ensure_not_blocked(&self, source_address: &str) -> Result<(), AuthError> {
        match self.limiter.check_blocked(source_address).await {
            Ok(BlockStatus::Blocked {
                remaining_minutes, ..
            }) => {
                metrics::counter!("login_attempts_total", "outcome" => "blocked").increment(1);
                warn!("Rejected credential check from blocked address {}", source_address);
                Err(AuthError::Blocked {
                    retry_after_minutes: remaining_minutes,
                })
            }
            Ok(BlockStatus::Clear) => Ok(()),
            Err(e) => {
                warn!("Login throttle check failed for {}: {}", source_address, e);
                Ok(())
            }
        }
    }

    async fn reset_failures(&self, source_address: &str) {
        if let Err(e) = self.limiter.record_success(source_address).await {
            warn!("Failed to reset login throttle for {}: {}", source_address, e);
        }
    }

    async fn register_failure(&self, source_address: &str) -> AuthError {
        metrics::counter!("login_attempts_total", "outcome" => "failure").increment(1);

        match self.limiter.record_failure(source_address).await {
            Ok(FailureOutcome::Blocked { blocked_until }) => AuthError::Blocked {
                retry_after_minutes: remaining_minutes(blocked_until, chrono::Utc::now()),
            },
            Ok(FailureOutcome::Allowed { attempts_left }) => {
                info!(
                    "Failed login from {} ({} attempts left)",
                    source_address, attempts_left
                );
                AuthError::InvalidCredentials {
                    attempts_left: Some(attempts_left),
                }
            }
            Err(e) => {
                warn!("Failed to record login failure for {}: {}", source_address, e);
                AuthError::InvalidCredentials {
                    attempts_left: None,
                }
            }
        }
    }
}

#[async_trait]
impl AuthService for DefaultAuthService {
    async fn login(
        &self,
        username: &str,
        password: &str,
        source_address: &str,
    ) -> Result<LoginResult, AuthError> {
        self.ensure_not_blocked(source_address).await?;

        let user = match self.credentials.authenticate(username, password).await {
            Ok(user) => user,
            // Unknown users and wrong passwords are indistinguishable to the caller.
            Err(AuthError::NotFound | AuthError::InvalidCredentials { .. }) => {
                return Err(self.register_failure(source_address).await);
            }
            Err(e) => return Err(e),
        };

        self.reset_failures(source_address).await;

        let issued = self.credentials.issue_session(&user.id).await?;

        metrics::counter!("login_attempts_total", "outcome" => "success").increment(1);
        info!("User {} logged in from {}", user.username, source_address);

        Ok(LoginResult {
            username: user.username,
            role: user.role,
            token: issued.token,
            expires_at: issued.expires_at,
        })
    }

    async fn logout(&self, token: &str) {
        match self.credentials.remove_session(token).await {
            Ok(true) => info!("Session revoked"),
            Ok(false) => {}
            Err(e) => warn!("Failed to revoke session: {}", e),
        }
    }

    async fn authorize(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let claims = self.credentials.verify_token(token)?;

        let session = match self.credentials.get_session_by_token(token).await {
            Ok(Some(session)) => session,
            Ok(None) => return Err(AuthError::InvalidToken),
            Err(e) => {
                warn!("Session lookup failed, treating request as unauthenticated: {}", e);
                return Err(AuthError::Unauthenticated);
            }
        };

        if session.user_id != claims.sub {
            return Err(AuthError::InvalidToken);
        }

        // Sessions may outlive their user; that resolves to "not authenticated".
        let user = match self.credentials.get_user(&session.user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => return Err(AuthError::Unauthenticated),
            Err(e) => {
                warn!("User lookup failed, treating request as unauthenticated: {}", e);
                return Err(AuthError::Unauthenticated);
            }
        };

        Ok(AuthenticatedUser {
            user_id: user.id,
            username: user.username,
            role: user.role,
            token: token.to_string(),
            expires_at: session.expires_at,
        })
    }

    async fn get_user_info(&self, user_id: &str) -> Result<UserInfo, AuthError> {
        let user = self
            .credentials
            .get_user(user_id)
            .await?
            .ok_or(AuthError::NotFound)?;

        Ok(UserInfo {
            id: user.id,
            username: user.username,
            role: user.role,
            created_at: user.created_at.to_rfc3339(),
            updated_at: user.updated_at.map(|t| t.to_rfc3339()),
        })
    }

    async fn change_password(
        &self,
        user: &AuthenticatedUser,
        current_password: &str,
        new_password: &str,
        source_address: &str,
    ) -> Result<(), AuthError> {
        // Validate new password
        if new_password.len() < MIN_PASSWORD_LEN {
            return Err(AuthError::Validation(format!(
                "New password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        if current_password == new_password {
            return Err(AuthError::Validation(
                "New password must be different from current password".to_string(),
            ));
        }

        self.ensure_not_blocked(source_address).await?;

        match self
            .credentials
            .authenticate(&user.username, current_password)
            .await
        {
            Ok(_) => self.reset_failures(source_address).await,
            Err(AuthError::InvalidCredentials { .. }) => {
                return match self.register_failure(source_address).await {
                    blocked @ AuthError::Blocked { .. } => Err(blocked),
                    _ => Err(AuthError::Validation(
                        "Current password is incorrect".to_string(),
                    )),
                };
            }
            Err(e) => return Err(e),
        }

        let new_hash = self.credentials.hash_password(new_password).await?;
        self.credentials
            .update_user_password(&user.user_id, &new_hash)
            .await?;

        match self
            .credentials
            .remove_other_sessions(&user.user_id, Some(&user.token))
            .await
        {
            Ok(revoked) if revoked > 0 => info!("Revoked {} other sessions", revoked),
            Ok(_) => {}
            Err(e) => warn!("Failed to revoke other sessions: {}", e),
        }

        info!("Password changed for user: {}", user.username);
        Ok(())
    }
}
