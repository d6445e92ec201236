use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

use crate::config::Config;
use crate::db::Store;
use crate::library::ContentLibrary;
use crate::services::token::generate_secret;
use crate::services::{
    AuthService, CredentialStore, DefaultAuthService, LimiterPolicy, LoginLimiter,
    PasswordHashing, TokenSigner,
};

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<RwLock<Config>>,

    pub store: Store,

    pub credentials: CredentialStore,

    pub limiter: LoginLimiter,

    pub auth_service: Arc<dyn AuthService>,

    pub content: ContentLibrary,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = Store::open(&config.general.data_dir).await?;
        Self::with_store(config, store).await
    }

    /// Wire the services over an already opened store and seed the
    /// administrator if the store has no users.
    pub async fn with_store(config: Config, store: Store) -> anyhow::Result<Self> {
        if config.security.token_secret.is_empty() {
            warn!("No token secret configured; sessions will not survive a restart");
        }

        let credentials = build_credentials(&config, store.clone())?;

        credentials
            .ensure_admin(&config.bootstrap)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to seed administrator: {e}"))?;

        let limiter = LoginLimiter::new(
            store.login_attempts().clone(),
            LimiterPolicy::from(&config.security.login_throttle),
        );

        let auth_service = Arc::new(DefaultAuthService::new(credentials.clone(), limiter.clone()))
            as Arc<dyn AuthService + Send + Sync + 'static>;

        let content = ContentLibrary::new(&config.site.content_dir, &config.site.content_extension);

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            store,
            credentials,
            limiter,
            auth_service,
            content,
        })
    }
}

/// Credential store for `config` without seeding anything. An empty token
/// secret is replaced by a random one.
pub fn build_credentials(config: &Config, store: Store) -> anyhow::Result<CredentialStore> {
    let hashing = PasswordHashing::new(&config.security)
        .map_err(|e| anyhow::anyhow!("Invalid password hashing parameters: {e}"))?;

    let secret = if config.security.token_secret.is_empty() {
        generate_secret()
    } else {
        config.security.token_secret.clone()
    };

    let ttl = chrono::Duration::hours(i64::from(config.security.session_ttl_hours));

    Ok(CredentialStore::new(
        store,
        hashing,
        TokenSigner::new(&secret, ttl),
    ))
}
