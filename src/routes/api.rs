use axum::{
    Json,
    extract::State,
    http::header,
    response::IntoResponse,
};

use super::ApiResponse;
use crate::AppState;
use crate::models::{FileEntry, Session};
use crate::services::ShareError;

const NO_STORE: (header::HeaderName, &str) = (header::CACHE_CONTROL, "no-store");

/// GET /api/clipboard
pub async fn clipboard(
    State(state): State<AppState>,
    session: Session,
) -> Result<impl IntoResponse, ShareError> {
    let text = state.share_service.poll_clipboard(&session).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            NO_STORE,
        ],
        text,
    ))
}

/// GET /api/files
pub async fn files(
    State(state): State<AppState>,
    session: Session,
) -> Result<impl IntoResponse, ShareError> {
    let files: Vec<FileEntry> = state.share_service.poll_files(&session).await?;
    Ok(([NO_STORE], Json(files)))
}

/// POST /shutdown
pub async fn shutdown(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<ApiResponse<()>>, ShareError> {
    state.share_service.shutdown(&session)?;
    Ok(Json(ApiResponse::message(true, "Server is shutting down")))
}
