//! Argon2id password hashing.
//!
//! Hashing and verification are CPU-bound by design and always run on the
//! blocking pool so they never stall the async runtime.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use tokio::task;

use crate::config::SecurityConfig;
use crate::services::auth_service::AuthError;

#[derive(Clone)]
pub struct PasswordHashing {
    params: Params,
}

impl PasswordHashing {
    pub fn new(config: &SecurityConfig) -> Result<Self, AuthError> {
        let params = Params::new(
            config.argon2_memory_cost_kib,
            config.argon2_time_cost,
            config.argon2_parallelism,
            None,
        )
        .map_err(|e| AuthError::Internal(format!("Invalid Argon2 params: {e}")))?;

        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash with a fresh random salt, returning a PHC string.
    pub async fn hash(&self, password: &str) -> Result<String, AuthError> {
        let argon2 = self.argon2();
        let password = password.to_string();

        task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            argon2
                .hash_password(password.as_bytes(), &salt)
                .map(|hash| hash.to_string())
                .map_err(|e| AuthError::Internal(format!("Failed to hash password: {e}")))
        })
        .await
        .map_err(|e| AuthError::Internal(format!("Password hashing task panicked: {e}")))?
    }

    /// Compare `password` against a stored PHC string. The parameters embedded in
    /// the hash are used, so hashes made under older settings keep verifying.
    pub async fn verify(&self, password: &str, password_hash: &str) -> Result<bool, AuthError> {
        let argon2 = self.argon2();
        let password = password.to_string();
        let password_hash = password_hash.to_string();

        task::spawn_blocking(move || {
            let parsed_hash = PasswordHash::new(&password_hash)
                .map_err(|e| AuthError::Internal(format!("Invalid password hash format: {e}")))?;

            Ok(argon2
                .verify_password(password.as_bytes(), &parsed_hash)
                .is_ok())
        })
        .await
        .map_err(|e| AuthError::Internal(format!("Password verification task panicked: {e}")))?
    }
}

#[cfg(test)]
pub(crate) fn fast_test_config() -> SecurityConfig {
    SecurityConfig {
        argon2_memory_cost_kib: 8,
        argon2_time_cost: 1,
        argon2_parallelism: 1,
        ..SecurityConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_and_verify() {
        let hashing = PasswordHashing::new(&fast_test_config()).unwrap();
        let hash = hashing.hash("hunter22").await.unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(hashing.verify("hunter22", &hash).await.unwrap());
        assert!(!hashing.verify("hunter23", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_same_password_gets_distinct_salts() {
        let hashing = PasswordHashing::new(&fast_test_config()).unwrap();
        let a = hashing.hash("same").await.unwrap();
        let b = hashing.hash("same").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_garbage_hash_is_an_error() {
        let hashing = PasswordHashing::new(&fast_test_config()).unwrap();
        assert!(hashing.verify("x", "plaintext").await.is_err());
    }
}
