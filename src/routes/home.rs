use axum::{
    Form,
    body::Body,
    extract::{FromRequest, Multipart, Query, Request, State},
    http::{StatusCode, header},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;

use crate::AppState;
use crate::models::Session;
use crate::services::{ActiveTab, HomePage, ShareError, StoreError};
use crate::views;

/// Cap on a urlencoded text submission. Only multipart uploads get the
/// configured upload limit, since form bodies are buffered in memory.
pub const TEXT_FORM_LIMIT: usize = 2 * 1024 * 1024;

#[derive(Debug, Deserialize)]
pub struct HomeQuery {
    pub active_tab: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TextForm {
    pub text_to_send: Option<String>,
}

/// Body of a `POST /`: either a file upload or new clipboard text
pub enum Submission {
    Files(Multipart),
    Text(TextForm),
}

impl<S> FromRequest<S> for Submission
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("multipart/form-data"));

        if is_multipart {
            Multipart::from_request(req, state)
                .await
                .map(Submission::Files)
                .map_err(IntoResponse::into_response)
        } else {
            let (parts, body) = req.into_parts();
            let bytes = axum::body::to_bytes(body, TEXT_FORM_LIMIT)
                .await
                .map_err(|e| {
                    tracing::warn!(error = %e, "Rejected text submission body");
                    StatusCode::PAYLOAD_TOO_LARGE.into_response()
                })?;
            let req = Request::from_parts(parts, Body::from(bytes));
            Form::<TextForm>::from_request(req, state)
                .await
                .map(|Form(form)| Submission::Text(form))
                .map_err(IntoResponse::into_response)
        }
    }
}

/// GET /
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<HomeQuery>,
) -> Result<Response, ShareError> {
    let active_tab = ActiveTab::from_query(query.active_tab.as_deref());
    let service = &state.share_service;

    match service.render_home(&session, active_tab).await? {
        HomePage::Login { .. } => Ok(views::login_page(None).into_response()),
        HomePage::Share(page) => {
            let show_logout = service.session_gate().is_enabled();
            Ok(views::share_page(&page, show_logout).into_response())
        }
    }
}

/// POST /
pub async fn submit(
    State(state): State<AppState>,
    session: Session,
    submission: Submission,
) -> Result<Response, Response> {
    match submission {
        Submission::Text(TextForm {
            text_to_send: Some(text),
        }) => {
            state
                .share_service
                .submit_text(&session, text)
                .await
                .map_err(IntoResponse::into_response)?;
            Ok(StatusCode::NO_CONTENT.into_response())
        }
        Submission::Text(_) => Ok(Redirect::to("/").into_response()),
        Submission::Files(multipart) => upload_files(&state, &session, multipart).await,
    }
}

/// Stream every file in the form to the store, one at a time
async fn upload_files(
    state: &AppState,
    session: &Session,
    mut multipart: Multipart,
) -> Result<Response, Response> {
    let service = &state.share_service;
    service
        .authorize(session)
        .map_err(IntoResponse::into_response)?;

    let mut saved = 0;
    while let Some(mut field) = multipart.next_field().await.map_err(|e| {
        tracing::warn!(error = %e, "Multipart parse error");
        e.into_response()
    })? {
        let Some(file_name) = field.file_name().filter(|n| !n.is_empty()).map(str::to_owned)
        else {
            continue;
        };

        let mut upload = match service.begin_upload(session, &file_name).await {
            Ok(upload) => upload,
            Err(ShareError::Store(StoreError::InvalidName(name))) => {
                tracing::warn!(name = %name, "Skipping upload with unusable file name");
                continue;
            }
            Err(e) => return Err(e.into_response()),
        };

        // An error here drops `upload`, which discards the partial file.
        while let Some(chunk) = field.chunk().await.map_err(|e| {
            tracing::warn!(error = %e, name = %file_name, "Upload interrupted");
            e.into_response()
        })? {
            upload
                .write_chunk(&chunk)
                .await
                .map_err(|e| ShareError::from(e).into_response())?;
        }

        upload
            .commit()
            .await
            .map_err(|e| ShareError::from(e).into_response())?;
        saved += 1;
    }

    tracing::info!(files = saved, "Upload request complete");
    Ok(Redirect::to("/?active_tab=Files").into_response())
}
