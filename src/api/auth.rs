use axum::{
    Extension, Json,
    extract::{OriginalUri, Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_sessions::cookie::{Cookie, SameSite};

use super::client_addr::ClientAddress;
use super::validation::validate_new_password;
use super::{ApiError, ApiResponse, AppState, MessageResponse, UserDto};
use crate::constants::AUTH_COOKIE;
use crate::entities::Role;
use crate::services::AuthenticatedUser;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub username: String,
    pub role: Role,
    pub token: String,
    pub expires_at: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

// ============================================================================
// Token transport
// ============================================================================

/// Bearer header first, then the `auth-token` cookie.
fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION)
        && let Ok(auth_str) = auth_header.to_str()
        && let Some(token) = auth_str.strip_prefix("Bearer ")
    {
        let token = token.trim();
        if !token.is_empty() {
            return Some(token.to_string());
        }
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| Cookie::parse(pair.trim()).ok())
        .find(|cookie| cookie.name() == AUTH_COOKIE && !cookie.value().is_empty())
        .map(|cookie| cookie.value().to_string())
}

fn session_cookie(token: String, max_age_secs: i64, secure: bool) -> String {
    Cookie::build((AUTH_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(secure)
        .max_age(time::Duration::seconds(max_age_secs))
        .build()
        .to_string()
}

fn clear_session_cookie(secure: bool) -> String {
    session_cookie(String::new(), 0, secure)
}

// ============================================================================
// Middleware
// ============================================================================

async fn authenticate_request(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<AuthenticatedUser, ApiError> {
    let token = extract_token(headers)
        .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))?;

    let user = state.auth_service().authorize(&token).await?;
    tracing::Span::current().record("user_id", user.user_id.as_str());

    Ok(user)
}

/// API guard: attaches [`AuthenticatedUser`] to the request or answers 401 JSON.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = authenticate_request(&state, request.headers()).await?;
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Browser guard for the admin pages: unauthenticated visitors are sent to the
/// login page, which gets the original location in `redirect`.
pub async fn browser_auth_middleware(
    State(state): State<Arc<AppState>>,
    OriginalUri(original): OriginalUri,
    mut request: Request,
    next: Next,
) -> Response {
    match authenticate_request(&state, request.headers()).await {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(_) => {
            let target = original
                .path_and_query()
                .map_or_else(|| original.path(), |pq| pq.as_str());
            let encoded: String = url::form_urlencoded::byte_serialize(target.as_bytes()).collect();
            Redirect::to(&format!("{}?redirect={encoded}", state.login_path)).into_response()
        }
    }
}

/// Runs after an auth guard; rejects non-administrators with 403.
pub async fn require_admin(
    Extension(user): Extension<AuthenticatedUser>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    user.require_role(Role::Admin)?;
    Ok(next.run(request).await)
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /auth/login
/// Throttled by source address; sets the session cookie and returns the token.
pub async fn login(
    State(state): State<Arc<AppState>>,
    client: ClientAddress,
    Json(payload): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    if payload.username.is_empty() {
        return Err(ApiError::validation("Username is required"));
    }
    if payload.password.is_empty() {
        return Err(ApiError::validation("Password is required"));
    }

    let result = state
        .auth_service()
        .login(&payload.username, &payload.password, client.as_str())
        .await?;

    let max_age = (result.expires_at - chrono::Utc::now()).num_seconds().max(0);
    let cookie = session_cookie(result.token.clone(), max_age, state.secure_cookies);

    let body = ApiResponse::success(LoginResponse {
        username: result.username,
        role: result.role,
        token: result.token,
        expires_at: result.expires_at.to_rfc3339(),
    });

    Ok(([(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

/// POST /auth/logout
/// Revoke the presented session. Always succeeds.
pub async fn logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Some(token) = extract_token(&headers) {
        state.auth_service().logout(&token).await;
    }

    (
        [(header::SET_COOKIE, clear_session_cookie(state.secure_cookies))],
        Json(ApiResponse::success(MessageResponse::new("Logged out"))),
    )
        .into_response()
}

/// GET /auth/me
pub async fn get_current_user(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    let info = state.auth_service().get_user_info(&user.user_id).await?;
    Ok(Json(ApiResponse::success(info.into())))
}

/// PUT /auth/password
/// Change password. Wrong current passwords count against the client address.
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    client: ClientAddress,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    validate_new_password(&payload.current_password, &payload.new_password)?;

    state
        .auth_service()
        .change_password(
            &user,
            &payload.current_password,
            &payload.new_password,
            client.as_str(),
        )
        .await?;

    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Password changed successfully",
    ))))
}
