use axum::{
    extract::{MatchedPath, Request, State},
    http::{HeaderValue, header},
    middleware::Next,
    response::Response,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, Level, debug, info, info_span, warn};
use uuid::Uuid;

use super::{ApiError, AppState, ClientAddress};

const SITE_CSP: &str = "default-src 'self'; img-src 'self' data: https:; script-src 'self'; style-src 'self' 'unsafe-inline'; font-src 'self' data:; frame-ancestors 'none'; base-uri 'self'; form-action 'self'";

/// GET /metrics
/// Prometheus exposition; 404 when the recorder is not installed.
pub async fn get_metrics(State(state): State<Arc<AppState>>) -> Result<String, ApiError> {
    state
        .prometheus_handle
        .as_ref()
        .map(PrometheusHandle::render)
        .ok_or_else(|| ApiError::NotFound("Metrics are disabled".to_string()))
}

/// Metric label for a matched route. Public files have no route.
fn route_label(matched: Option<&str>) -> &'static str {
    match matched {
        Some(route) if route.starts_with("/api") => "api",
        Some(route) if route.starts_with("/admin") => "admin_page",
        _ => "static",
    }
}

/// One span per request carrying the throttling address and, once a guard
/// has run, the user id. Page and asset hits log at debug, API calls at info.
pub async fn logging_middleware(
    client: ClientAddress,
    req: Request,
    next: Next,
) -> Response {
    let start = Instant::now();

    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let matched = req
        .extensions()
        .get::<MatchedPath>()
        .map(|m| m.as_str().to_string());
    let kind = route_label(matched.as_deref());
    let route = matched.unwrap_or_else(|| path.clone());

    let span = info_span!(
        "request",
        request_id = %Uuid::new_v4(),
        method = %method,
        route = %route,
        client = %client.as_str(),
        user_id = tracing::field::Empty,
    );

    async move {
        let response = next.run(req).await;
        let status = response.status().as_u16();
        let elapsed = start.elapsed();

        let labels = [
            ("method", method.to_string()),
            ("kind", kind.to_string()),
            ("status", status.to_string()),
        ];
        metrics::counter!("http_requests_total", &labels).increment(1);
        metrics::histogram!("http_request_duration_seconds", &labels)
            .record(elapsed.as_secs_f64());

        let duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        let outcome = request_outcome(status);

        let level = log_level(kind, status);
        if level == Level::WARN {
            warn!(event = "http_request_finished", status_code = status, duration_ms, outcome, "Request failed");
        } else if level == Level::INFO {
            info!(event = "http_request_finished", status_code = status, duration_ms, outcome, "Request finished");
        } else {
            debug!(event = "http_request_finished", status_code = status, duration_ms, path = %path, "Served {}", kind);
        }

        response
    }
    .instrument(span)
    .await
}

/// Coarse classification for the request log. Auth rejections (401, 403, 429)
/// are client errors, not failures of the service.
const fn request_outcome(status: u16) -> &'static str {
    match status {
        500.. => "error",
        300..=399 => "redirect",
        400..=499 => "client_error",
        _ => "success",
    }
}

fn log_level(kind: &str, status: u16) -> Level {
    if status >= 500 {
        Level::WARN
    } else if kind == "api" {
        Level::INFO
    } else {
        Level::DEBUG
    }
}

/// Site-wide security headers. Admin pages and API answers carry session
/// state, so they are never cached.
pub async fn security_headers_middleware(req: Request, next: Next) -> Response {
    let private = {
        let path = req.uri().path();
        path.starts_with("/api/") || path == "/admin" || path.starts_with("/admin/")
    };

    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(SITE_CSP),
    );
    if private {
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    }

    response
}
