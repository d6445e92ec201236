use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{delete, get, post, put},
};
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::config::Config;
use crate::library::ContentLibrary;
use crate::services::AuthService;
use crate::state::SharedState;

pub mod auth;
pub mod client_addr;
mod content;
mod error;
mod observability;
mod pages;
mod types;
pub(crate) mod validation;

pub use client_addr::ClientAddress;
pub use error::ApiError;
pub use types::*;

use tokio::sync::RwLock;

use metrics_exporter_prometheus::PrometheusHandle;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    /// Peers allowed to supply forwarded client address headers.
    pub trusted_proxies: Vec<IpAddr>,

    pub secure_cookies: bool,

    pub login_path: String,

    pub admin_dir: PathBuf,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Arc<RwLock<Config>> {
        &self.shared.config
    }

    #[must_use]
    pub fn auth_service(&self) -> &Arc<dyn AuthService> {
        &self.shared.auth_service
    }

    #[must_use]
    pub fn content(&self) -> &ContentLibrary {
        &self.shared.content
    }
}

pub async fn create_app_state(
    shared: Arc<SharedState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let config = shared.config.read().await.clone();

    let trusted_proxies: Vec<IpAddr> = config
        .security
        .login_throttle
        .trusted_proxy_ips
        .iter()
        .filter_map(|ip| match ip.parse() {
            Ok(ip) => Some(ip),
            Err(_) => {
                warn!("Ignoring invalid trusted proxy address: {}", ip);
                None
            }
        })
        .collect();

    Ok(Arc::new(AppState {
        shared,
        trusted_proxies,
        secure_cookies: config.server.secure_cookies,
        login_path: config.site.login_path,
        admin_dir: PathBuf::from(config.site.admin_dir),
        prometheus_handle,
    }))
}

pub async fn create_app_state_from_config(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let shared = Arc::new(SharedState::new(config).await?);
    create_app_state(shared, prometheus_handle).await
}

pub async fn router(state: Arc<AppState>) -> Router {
    let (public_dir, cors_origins) = {
        let config = state.config().read().await;
        (
            config.site.public_dir.clone(),
            config.server.cors_allowed_origins.clone(),
        )
    };

    let api_router = Router::new()
        .merge(create_protected_router(state.clone()))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .with_state(state.clone());

    // Registered at the top level: a nest at /admin would not match /admin/.
    let admin_pages = Router::new()
        .route("/admin", get(pages::serve_admin_page))
        .route("/admin/", get(pages::serve_admin_page))
        .route("/admin/{*path}", get(pages::serve_admin_page))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::browser_auth_middleware,
        ))
        .with_state(state.clone());

    let cors_layer = if cors_origins.contains(&"*".to_string()) {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .nest("/api", api_router)
        .merge(admin_pages)
        .fallback_service(ServeDir::new(public_dir))
        .layer(middleware::from_fn(observability::security_headers_middleware))
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            observability::logging_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}

fn create_protected_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let admin_routes = Router::new()
        .route("/admin/content", get(content::list_content))
        .route("/admin/content/{filename}", delete(content::delete_content))
        .route("/metrics", get(observability::get_metrics))
        .route_layer(middleware::from_fn(auth::require_admin));

    Router::new()
        .route("/auth/me", get(auth::get_current_user))
        .route("/auth/password", put(auth::change_password))
        .merge(admin_routes)
        .route_layer(middleware::from_fn_with_state(state, auth::auth_middleware))
}
