//! Static admin pages, served from `site.admin_dir` behind the browser guard.

use axum::{
    extract::{Request, State},
    http::{HeaderValue, Uri, header},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tower_http::services::ServeDir;

use super::{ApiError, AppState};

const ADMIN_PREFIX: &str = "/admin";

/// Path of `uri` relative to the admin root. `/admin` and `/admin/` both map to
/// the directory index.
fn admin_relative(uri: &Uri) -> String {
    let path = uri
        .path()
        .strip_prefix(ADMIN_PREFIX)
        .filter(|rest| rest.starts_with('/'))
        .unwrap_or("/");

    match uri.query() {
        Some(query) => format!("{path}?{query}"),
        None => path.to_string(),
    }
}

/// GET /admin, /admin/, /admin/{*path}
pub async fn serve_admin_page(
    State(state): State<Arc<AppState>>,
    mut req: Request,
) -> Result<Response, ApiError> {
    let uri: Uri = admin_relative(req.uri())
        .parse()
        .map_err(|e| ApiError::validation(format!("Invalid page path: {e}")))?;
    *req.uri_mut() = uri;

    let mut response = ServeDir::new(&state.admin_dir)
        .try_call(req)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to serve admin page: {e}")))?
        .into_response();

    // Trailing-slash redirects are relative to the admin root.
    let prefixed = response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .filter(|location| location.starts_with('/'))
        .and_then(|location| HeaderValue::from_str(&format!("{ADMIN_PREFIX}{location}")).ok());
    if let Some(location) = prefixed {
        response.headers_mut().insert(header::LOCATION, location);
    }

    Ok(response)
}
