use axum::{
    Extension, Json,
    extract::{Path, State},
};
use std::sync::Arc;
use tracing::info;

use super::{ApiError, ApiResponse, AppState, ContentFileDto, MessageResponse};
use crate::services::AuthenticatedUser;

/// GET /admin/content
pub async fn list_content(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<ContentFileDto>>>, ApiError> {
    let files = state.content().list().await?;
    Ok(Json(ApiResponse::success(
        files.into_iter().map(ContentFileDto::from).collect(),
    )))
}

/// DELETE /admin/content/{filename}
/// The filename is checked before any path is built from it.
pub async fn delete_content(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(filename): Path<String>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.content().delete(&filename).await?;

    info!("Content {} deleted by {}", filename, user.username);

    Ok(Json(ApiResponse::success(MessageResponse::new(format!(
        "Deleted {filename}"
    )))))
}
