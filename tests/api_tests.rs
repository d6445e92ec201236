use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
};
use folio::config::Config;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

const ADMIN_PASSWORD: &str = "initial-admin-pw";

fn test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.general.data_dir = dir.path().join("data").display().to_string();
    config.site.content_dir = dir.path().join("content").display().to_string();
    config.site.public_dir = dir.path().join("public").display().to_string();
    config.site.admin_dir = dir.path().join("admin").display().to_string();
    config.server.secure_cookies = false;
    config.security.token_secret = "integration-test-secret-0123456789abcdef".to_string();
    config.security.argon2_memory_cost_kib = 8;
    config.security.argon2_time_cost = 1;
    config.bootstrap.password = Some(ADMIN_PASSWORD.to_string());
    config
}

async fn spawn_app() -> (TempDir, Router) {
    let dir = tempfile::tempdir().unwrap();
    let state = folio::api::create_app_state_from_config(test_config(&dir), None)
        .await
        .expect("Failed to create app state");
    (dir, folio::api::router(state).await)
}

async fn login(app: &Router, username: &str, password: &str) -> Response {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/login")
                .header("Content-Type", "application/json")
                .body(Body::from(
                    serde_json::json!({ "username": username, "password": password }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn json_body(response: Response) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

async fn login_token(app: &Router, username: &str, password: &str) -> String {
    let response = login(app, username, password).await;
    assert_eq!(response.status(), StatusCode::OK);
    json_body(response).await["data"]["token"]
        .as_str()
        .unwrap()
        .to_string()
}

async fn get_me(app: &Router, auth: Option<(&'static str, String)>) -> Response {
    let mut request = Request::builder().uri("/api/auth/me");
    if let Some((name, value)) = auth {
        request = request.header(name, value);
    }
    app.clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_login_sets_cookie_and_returns_token() {
    let (_dir, app) = spawn_app().await;

    let response = login(&app, "admin", ADMIN_PASSWORD).await;
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("auth-token="));
    assert!(cookie.contains("HttpOnly"));

    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["username"], "admin");
    assert_eq!(body["data"]["role"], "admin");
    assert!(body["data"]["expiresAt"].is_string());

    let token = body["data"]["token"].as_str().unwrap();
    assert_eq!(cookie.split(';').next().unwrap(), format!("auth-token={token}"));
}

#[tokio::test]
async fn test_me_requires_authentication() {
    let (_dir, app) = spawn_app().await;

    let response = get_me(&app, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert!(body["error"].is_string());

    let response = get_me(&app, Some(("Authorization", "Bearer not-a-token".to_string()))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let token = login_token(&app, "admin", ADMIN_PASSWORD).await;

    let response = get_me(&app, Some(("Authorization", format!("Bearer {token}")))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"]["username"], "admin");
    assert_eq!(body["data"]["role"], "admin");
    assert!(body["data"].get("password").is_none());

    let response = get_me(&app, Some(("Cookie", format!("auth-token={token}")))).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_logout_revokes_session() {
    let (_dir, app) = spawn_app().await;
    let token = login_token(&app, "admin", ADMIN_PASSWORD).await;

    let logout = || {
        app.clone().oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/logout")
                .header("Authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
    };

    let response = logout().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    assert!(cookie.contains("Max-Age=0"));

    // Idempotent
    assert_eq!(logout().await.unwrap().status(), StatusCode::OK);

    // The token still has a valid signature, but its session is gone.
    let response = get_me(&app, Some(("Authorization", format!("Bearer {token}")))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_lockout_after_repeated_failures() {
    let (_dir, app) = spawn_app().await;

    for expected_left in [4, 3, 2, 1] {
        let response = login(&app, "admin", "wrong-password").await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = json_body(response).await;
        let error = body["error"].as_str().unwrap();
        assert!(
            error.contains(&format!("{expected_left} attempts remaining")),
            "unexpected error: {error}"
        );
    }

    let response = login(&app, "admin", "wrong-password").await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    // Even the right password is refused while blocked.
    let response = login(&app, "admin", ADMIN_PASSWORD).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = response.headers()[header::RETRY_AFTER]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(retry_after > 0 && retry_after <= 30 * 60);
}

#[tokio::test]
async fn test_unknown_user_counts_as_failure() {
    let (_dir, app) = spawn_app().await;

    let response = login(&app, "nobody", "whatever-pw").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert!(body["error"].as_str().unwrap().contains("4 attempts remaining"));
}

#[tokio::test]
async fn test_successful_login_resets_failures() {
    let (_dir, app) = spawn_app().await;

    for _ in 0..4 {
        login(&app, "admin", "wrong-password").await;
    }
    login_token(&app, "admin", ADMIN_PASSWORD).await;

    let response = login(&app, "admin", "wrong-password").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert!(body["error"].as_str().unwrap().contains("4 attempts remaining"));
}

#[tokio::test]
async fn test_login_requires_fields() {
    let (_dir, app) = spawn_app().await;

    let response = login(&app, "", "something").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = login(&app, "admin", "").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_change_password() {
    let (_dir, app) = spawn_app().await;
    let token = login_token(&app, "admin", ADMIN_PASSWORD).await;
    let other = login_token(&app, "admin", ADMIN_PASSWORD).await;

    let change = |current: &str, new: &str| {
        app.clone().oneshot(
            Request::builder()
                .method("PUT")
                .uri("/api/auth/password")
                .header("Authorization", format!("Bearer {token}"))
                .header("Content-Type", "application/json")
                .body(Body::from(
                    serde_json::json!({ "currentPassword": current, "newPassword": new })
                        .to_string(),
                ))
                .unwrap(),
        )
    };

    let response = change("wrong-current", "brand-new-pw").await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = change(ADMIN_PASSWORD, "short").await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = change(ADMIN_PASSWORD, ADMIN_PASSWORD).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = change(ADMIN_PASSWORD, "brand-new-pw").await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // The session that made the change survives; the others are revoked.
    let response = get_me(&app, Some(("Authorization", format!("Bearer {token}")))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = get_me(&app, Some(("Authorization", format!("Bearer {other}")))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    assert_eq!(
        login(&app, "admin", ADMIN_PASSWORD).await.status(),
        StatusCode::UNAUTHORIZED
    );
    login_token(&app, "admin", "brand-new-pw").await;
}

#[tokio::test]
async fn test_wrong_current_password_counts_toward_lockout() {
    let (_dir, app) = spawn_app().await;
    let token = login_token(&app, "admin", ADMIN_PASSWORD).await;

    let change = |current: &'static str| {
        app.clone().oneshot(
            Request::builder()
                .method("PUT")
                .uri("/api/auth/password")
                .header("Authorization", format!("Bearer {token}"))
                .header("Content-Type", "application/json")
                .body(Body::from(
                    serde_json::json!({ "currentPassword": current, "newPassword": "brand-new-pw" })
                        .to_string(),
                ))
                .unwrap(),
        )
    };

    for _ in 0..4 {
        assert_eq!(
            change("guess-1234").await.unwrap().status(),
            StatusCode::BAD_REQUEST
        );
    }

    let response = change("guess-1234").await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key(header::RETRY_AFTER));

    let response = change(ADMIN_PASSWORD).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    assert_eq!(
        login(&app, "admin", ADMIN_PASSWORD).await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );
}
