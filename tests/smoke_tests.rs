//! Smoke tests for the browser-facing flows: static site, admin pages and
//! content management.

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
};
use folio::config::Config;
use folio::entities::Role;
use http_body_util::BodyExt;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const ADMIN_PASSWORD: &str = "initial-admin-pw";

struct TestSite {
    dir: TempDir,
    state: Arc<folio::api::AppState>,
    router: Router,
}

impl TestSite {
    fn content_dir(&self) -> std::path::PathBuf {
        self.dir.path().join("content")
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    async fn token_for(&self, username: &str, password: &str) -> String {
        let response = self
            .send(
                Request::builder()
                    .method("POST")
                    .uri("/api/auth/login")
                    .header("Content-Type", "application/json")
                    .body(Body::from(
                        serde_json::json!({ "username": username, "password": password })
                            .to_string(),
                    ))
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        json["data"]["token"].as_str().unwrap().to_string()
    }

    async fn page(&self, path: &str, token: &str) -> Response {
        self.send(
            Request::builder()
                .uri(path)
                .header("Cookie", format!("auth-token={token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    async fn delete_content(&self, token: &str, filename: &str) -> Response {
        self.send(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/admin/content/{filename}"))
                .header("Authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }
}

fn write(path: &Path, contents: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

async fn spawn_site() -> TestSite {
    spawn_site_with_metrics(None).await
}

async fn spawn_site_with_metrics(prometheus_handle: Option<PrometheusHandle>) -> TestSite {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    write(&root.join("public/index.html"), "<h1>Portfolio</h1>");
    write(&root.join("public/login.html"), "<form></form>");
    write(&root.join("admin/index.html"), "<h1>Admin</h1>");
    write(&root.join("admin/posts/edit.html"), "<h1>Edit post</h1>");
    write(&root.join("public/admin/stray.html"), "published by mistake");
    write(&root.join("content/post-1.mdx"), "# One");
    write(&root.join("content/post-2.mdx"), "# Two");
    write(&root.join("secret.mdx"), "outside the content dir");

    let mut config = Config::default();
    config.general.data_dir = root.join("data").display().to_string();
    config.site.public_dir = root.join("public").display().to_string();
    config.site.admin_dir = root.join("admin").display().to_string();
    config.site.content_dir = root.join("content").display().to_string();
    config.server.secure_cookies = false;
    config.security.token_secret = "smoke-test-secret-0123456789abcdefghij".to_string();
    config.security.argon2_memory_cost_kib = 8;
    config.security.argon2_time_cost = 1;
    config.bootstrap.password = Some(ADMIN_PASSWORD.to_string());

    let state = folio::api::create_app_state_from_config(config, prometheus_handle)
        .await
        .expect("failed to create app state");
    let router = folio::api::router(state.clone()).await;

    TestSite { dir, state, router }
}

#[tokio::test]
async fn test_public_site_is_served_with_security_headers() {
    let site = spawn_site().await;

    let response = site
        .send(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert_eq!(response.headers()["x-frame-options"], "DENY");
    assert!(response.headers().contains_key("content-security-policy"));

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert!(String::from_utf8_lossy(&body).contains("Portfolio"));
}

#[tokio::test]
async fn test_admin_pages_redirect_to_login() {
    let site = spawn_site().await;

    let response = site
        .send(Request::builder().uri("/admin/").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers()[header::LOCATION],
        "/login.html?redirect=%2Fadmin%2F"
    );

    let token = site.token_for("admin", ADMIN_PASSWORD).await;
    let response = site
        .send(
            Request::builder()
                .uri("/admin/")
                .header("Cookie", format!("auth-token={token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert!(String::from_utf8_lossy(&body).contains("Admin"));
}

#[tokio::test]
async fn test_every_admin_page_path_is_guarded() {
    let site = spawn_site().await;

    let cases = [
        ("/admin", "/login.html?redirect=%2Fadmin"),
        ("/admin/", "/login.html?redirect=%2Fadmin%2F"),
        ("/admin/index.html", "/login.html?redirect=%2Fadmin%2Findex.html"),
        (
            "/admin/posts/edit.html?id=3",
            "/login.html?redirect=%2Fadmin%2Fposts%2Fedit.html%3Fid%3D3",
        ),
        ("/admin/stray.html", "/login.html?redirect=%2Fadmin%2Fstray.html"),
    ];

    for (path, location) in cases {
        let response = site
            .send(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{path}");
        assert_eq!(response.headers()[header::LOCATION], location, "{path}");
    }
}

#[tokio::test]
async fn test_admin_pages_come_from_admin_dir() {
    let site = spawn_site().await;
    let token = site.token_for("admin", ADMIN_PASSWORD).await;

    for path in ["/admin", "/admin/index.html"] {
        let response = site.page(path, &token).await;
        assert_eq!(response.status(), StatusCode::OK, "{path}");
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(String::from_utf8_lossy(&body).contains("Admin"), "{path}");
    }

    let response = site.page("/admin/posts/edit.html", &token).await;
    assert_eq!(response.status(), StatusCode::OK);

    // Directory redirects stay under the admin prefix.
    let response = site.page("/admin/posts", &token).await;
    assert!(response.status().is_redirection());
    assert_eq!(response.headers()[header::LOCATION], "/admin/posts/");

    // Files under the public site's admin/ folder are never served.
    let response = site.page("/admin/stray.html", &token).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_and_delete_content() {
    let site = spawn_site().await;
    let token = site.token_for("admin", ADMIN_PASSWORD).await;

    let response = site
        .send(
            Request::builder()
                .uri("/api/admin/content")
                .header("Authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let names: Vec<_> = json["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["filename"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["post-1.mdx", "post-2.mdx"]);

    let response = site.delete_content(&token, "post-1.mdx").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!site.content_dir().join("post-1.mdx").exists());

    let response = site.delete_content(&token, "post-1.mdx").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_rejects_unsafe_filenames() {
    let site = spawn_site().await;
    let token = site.token_for("admin", ADMIN_PASSWORD).await;

    for name in ["..%2Fsecret.mdx", "..%5Csecret.mdx", "post-2", "post-2.txt", ".."] {
        let response = site.delete_content(&token, name).await;
        assert_eq!(
            response.status(),
            StatusCode::BAD_REQUEST,
            "{name} should be rejected"
        );
    }

    assert!(site.dir.path().join("secret.mdx").exists());
    assert!(site.content_dir().join("post-2.mdx").exists());
}

#[tokio::test]
async fn test_content_requires_admin_role() {
    let site = spawn_site().await;

    let credentials = &site.state.shared.credentials;
    let hash = credentials.hash_password("editor-password").await.unwrap();
    assert!(
        credentials
            .create_user("editor", &hash, Role::User)
            .await
            .unwrap()
    );

    let token = site.token_for("editor", "editor-password").await;

    let response = site.delete_content(&token, "post-2.mdx").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(site.content_dir().join("post-2.mdx").exists());

    // Plain users still reach their own account endpoints.
    let response = site
        .send(
            Request::builder()
                .uri("/api/auth/me")
                .header("Authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = site
        .send(
            Request::builder()
                .method("DELETE")
                .uri("/api/admin/content/post-2.mdx")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_metrics_endpoint_is_admin_only() {
    let recorder = PrometheusBuilder::new().build_recorder();
    let site = spawn_site_with_metrics(Some(recorder.handle())).await;

    let response = site
        .send(Request::builder().uri("/api/metrics").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let token = site.token_for("admin", ADMIN_PASSWORD).await;
    let response = site
        .send(
            Request::builder()
                .uri("/api/metrics")
                .header("Authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_metrics_disabled_is_not_found() {
    let site = spawn_site().await;
    let token = site.token_for("admin", ADMIN_PASSWORD).await;

    let response = site
        .send(
            Request::builder()
                .uri("/api/metrics")
                .header("Authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
