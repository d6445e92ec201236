//! Self-contained session tokens.
//!
//! A token is an HS256 JWT carrying the user id, username, role, issue time and
//! expiry, so it can be checked without touching the store. The store keeps a
//! parallel session record so a structurally valid token can still be revoked.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::db::User;
use crate::entities::Role;
use crate::services::auth_service::AuthError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub username: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
    /// Unique per token, so two logins in the same second never collide
    pub jti: String,
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenSigner {
    #[must_use]
    pub fn new(secret: &str, ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        }
    }

    pub fn issue_at(&self, user: &User, issued_at: DateTime<Utc>) -> Result<IssuedToken, AuthError> {
        let expires_at = issued_at + self.ttl;

        let claims = Claims {
            sub: user.id.clone(),
            username: user.username.clone(),
            role: user.role,
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            jti: uuid::Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Internal(format!("Failed to sign token: {e}")))?;

        debug!("Issued token for {} expiring {}", user.username, expires_at);

        Ok(IssuedToken { token, expires_at })
    }

    /// Check signature, structure and expiry.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::InvalidToken,
            })
    }
}

/// Generate a random 64 character hex secret
#[must_use]
pub fn generate_secret() -> String {
    use rand::Rng;

    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();

    bytes.iter().fold(String::with_capacity(64), |mut acc, b| {
        use std::fmt::Write;
        let _ = write!(acc, "{b:02x}");
        acc
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_user() -> User {
        User {
            id: "user-1".to_string(),
            username: "admin".to_string(),
            role: Role::Admin,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    fn signer(secret: &str) -> TokenSigner {
        TokenSigner::new(secret, Duration::hours(24))
    }

    #[test]
    fn test_issue_and_verify() {
        let signer = signer("test-secret-key-12345");
        let now = Utc::now();
        let issued = signer.issue_at(&test_user(), now).unwrap();

        let claims = signer.verify(&issued.token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.username, "admin");
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.exp - claims.iat, 24 * 3600);
        assert_eq!(claims.exp, issued.expires_at.timestamp());
    }

    #[test]
    fn test_expired_token() {
        let signer = signer("test-secret-key-12345");
        let issued = signer
            .issue_at(&test_user(), Utc::now() - Duration::hours(25))
            .unwrap();

        assert!(matches!(signer.verify(&issued.token), Err(AuthError::Expired)));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let issued = signer("secret1").issue_at(&test_user(), Utc::now()).unwrap();
        assert!(matches!(
            signer("secret2").verify(&issued.token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_garbage_rejected() {
        let signer = signer("test-secret-key-12345");
        assert!(matches!(
            signer.verify("invalid.token.here"),
            Err(AuthError::InvalidToken)
        ));
        assert!(matches!(signer.verify(""), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_tokens_are_unique() {
        let signer = signer("test-secret-key-12345");
        let user = test_user();
        let now = Utc::now();
        let a = signer.issue_at(&user, now).unwrap();
        let b = signer.issue_at(&user, now).unwrap();
        assert_ne!(a.token, b.token);
    }

    #[test]
    fn test_generate_secret() {
        let secret = generate_secret();
        assert_eq!(secret.len(), 64);
        assert!(secret.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
