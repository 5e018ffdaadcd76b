pub mod api;
pub mod auth;
pub mod files;
pub mod home;

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    http::{HeaderName, HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::Serialize;
use tower_http::{set_header::SetResponseHeaderLayer, trace::TraceLayer};

use crate::AppState;
use crate::middleware::session_layer;
use crate::services::{ShareError, StoreError};

/// Unified API response type used across all route modules
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl ApiResponse<()> {
    pub fn message(success: bool, message: impl Into<String>) -> Self {
        Self {
            success,
            message: Some(message.into()),
            data: None,
        }
    }
}

pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ApiResponse::message(false, message))).into_response()
}

impl IntoResponse for ShareError {
    fn into_response(self) -> Response {
        match self {
            ShareError::Unauthorized => Redirect::to("/login").into_response(),
            ShareError::Store(err) => {
                let status = match &err {
                    StoreError::InvalidName(_) => StatusCode::BAD_REQUEST,
                    StoreError::NotFound(_) => StatusCode::NOT_FOUND,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status.is_server_error() {
                    tracing::error!(error = %err, "Request failed");
                } else {
                    tracing::debug!(error = %err, "Request rejected");
                }
                error_response(status, err.to_string())
            }
        }
    }
}

/// Build the full HTTP surface around the shared state
pub fn app(state: AppState, max_upload_bytes: u64) -> Router {
    let body_limit = usize::try_from(max_upload_bytes).unwrap_or(usize::MAX);

    Router::new()
        // Uploads stream to disk, so only this route lifts the body limit
        .route(
            "/",
            get(home::index)
                .post(home::submit)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/logout", get(auth::logout).post(auth::logout))
        .route("/shutdown", post(api::shutdown))
        // Polling endpoints, also under their legacy paths
        .route("/api/clipboard", get(api::clipboard))
        .route("/get-clipboard-data", get(api::clipboard))
        .route("/api/files", get(api::files))
        .route("/get-file-list", get(api::files))
        // Downloads
        .route("/uploads/{name}", get(files::download_file))
        .route("/download-zip", get(files::download_all))
        .route("/download-all", get(files::download_all))
        .layer(middleware::from_fn_with_state(state.clone(), session_layer))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-content-type-options"),
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-frame-options"),
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("referrer-policy"),
            HeaderValue::from_static("same-origin"),
        ))
}
