use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::constants::env;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub site: SiteConfig,

    pub security: SecurityConfig,

    pub bootstrap: BootstrapConfig,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory holding users.json, sessions.json and login-attempts.json
    pub data_dir: String,

    pub log_level: String,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
            log_level: "info".to_string(),
            worker_threads: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,

    pub port: u16,

    pub cors_allowed_origins: Vec<String>,

    /// Whether to set the Secure flag on the auth cookie.
    /// Default: true for production safety. Set to false for local development without HTTPS.
    pub secure_cookies: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 4321,
            cors_allowed_origins: vec![
                "http://localhost:4321".to_string(),
                "http://127.0.0.1:4321".to_string(),
            ],
            secure_cookies: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Static site served at `/`
    pub public_dir: String,

    /// Static admin pages served at `/admin`, behind login
    pub admin_dir: String,

    /// Directory of deletable content files (blog posts)
    pub content_dir: String,

    /// Required extension for content files, without the dot
    pub content_extension: String,

    /// Where the browser guard sends unauthenticated visitors
    pub login_path: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            public_dir: "public".to_string(),
            admin_dir: "admin".to_string(),
            content_dir: "content/blog".to_string(),
            content_extension: "mdx".to_string(),
            login_path: "/login.html".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Argon2 memory cost in KiB (default: 19456 = 19MB, the OWASP baseline)
    pub argon2_memory_cost_kib: u32,

    /// Argon2 time cost (iterations)
    pub argon2_time_cost: u32,

    /// Argon2 parallelism (default: 1)
    pub argon2_parallelism: u32,

    /// HMAC secret for session tokens. When empty a random secret is generated
    /// at startup and every session is lost on restart.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub token_secret: String,

    pub session_ttl_hours: u32,

    /// Login throttling and lockout policy.
    pub login_throttle: LoginThrottleConfig,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            argon2_memory_cost_kib: 19456,
            argon2_time_cost: 2,
            argon2_parallelism: 1,
            token_secret: String::new(),
            session_ttl_hours: 24,
            login_throttle: LoginThrottleConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginThrottleConfig {
    /// Failed attempts inside the window that trigger a block.
    pub max_attempts: u32,

    /// Window for counting failures, measured from the first failure.
    pub window_seconds: u64,

    /// How long an address stays blocked once `max_attempts` is reached.
    pub block_seconds: u64,

    /// How often stale entries are pruned.
    pub cleanup_interval_minutes: u32,

    /// Optional cron expression overriding `cleanup_interval_minutes`.
    pub cleanup_cron: Option<String>,

    /// Proxy addresses allowed to supply forwarded client address headers.
    ///
    /// When empty, forwarded headers are ignored and the socket peer address is
    /// used. Any client can set these headers, so only list proxies that
    /// overwrite them.
    pub trusted_proxy_ips: Vec<String>,
}

impl Default for LoginThrottleConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window_seconds: 15 * 60,
            block_seconds: 30 * 60,
            cleanup_interval_minutes: 15,
            cleanup_cron: None,
            trusted_proxy_ips: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Administrator seeded when the user store is empty
    pub username: String,

    /// Initial administrator password. Generated and logged once when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            password: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,

    pub loki_enabled: bool,

    pub loki_url: String,

    pub loki_labels: std::collections::HashMap<String, String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        let mut labels = std::collections::HashMap::new();
        labels.insert("app".to_string(), "folio".to_string());

        Self {
            metrics_enabled: true,
            loki_enabled: false,
            loki_url: "http://localhost:3100".to_string(),
            loki_labels: labels,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                let mut config = Self::load_from_path(path)?;
                config.apply_env_overrides();
                return Ok(config);
            }
        }

        info!("No config file found, using defaults");
        let mut config = Self::default();
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Secrets may come from the environment (or a `.env` file) instead of
    /// config.toml.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(secret) = std::env::var(env::TOKEN_SECRET)
            && !secret.is_empty()
        {
            self.security.token_secret = secret;
        }

        if let Ok(password) = std::env::var(env::ADMIN_PASSWORD)
            && !password.is_empty()
        {
            self.bootstrap.password = Some(password);
        }
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![];

        paths.push(PathBuf::from("config.toml"));

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("folio").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".folio").join("config.toml"));
        }

        paths
    }

    pub fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    /// Write a default config with a freshly generated token secret.
    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let mut config = Self::default();
            config.security.token_secret = crate::services::token::generate_secret();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        let throttle = &self.security.login_throttle;

        if throttle.max_attempts == 0 {
            anyhow::bail!("login_throttle.max_attempts must be > 0");
        }

        if throttle.window_seconds == 0 || throttle.window_seconds > MAX_POLICY_SECONDS {
            anyhow::bail!("login_throttle.window_seconds must be between 1 and {MAX_POLICY_SECONDS}");
        }

        if throttle.block_seconds == 0 || throttle.block_seconds > MAX_POLICY_SECONDS {
            anyhow::bail!("login_throttle.block_seconds must be between 1 and {MAX_POLICY_SECONDS}");
        }

        if throttle.cleanup_interval_minutes == 0 && throttle.cleanup_cron.is_none() {
            anyhow::bail!("Cleanup interval must be > 0 or cleanup_cron must be set");
        }

        if self.security.session_ttl_hours == 0 {
            anyhow::bail!("security.session_ttl_hours must be > 0");
        }

        let secret = &self.security.token_secret;
        if !secret.is_empty() && secret.len() < MIN_SECRET_LEN {
            anyhow::bail!("security.token_secret must be at least {MIN_SECRET_LEN} characters");
        }

        for ip in &throttle.trusted_proxy_ips {
            ip.parse::<std::net::IpAddr>()
                .with_context(|| format!("Invalid trusted proxy address: {ip}"))?;
        }

        let ext = &self.site.content_extension;
        if ext.is_empty() || ext.contains(['.', '/', '\\']) {
            anyhow::bail!("site.content_extension must be a bare extension such as \"mdx\"");
        }

        Ok(())
    }
}

/// Upper bound (30 days) for throttle windows and blocks.
const MAX_POLICY_SECONDS: u64 = 30 * 24 * 60 * 60;

const MIN_SECRET_LEN: usize = 32;
