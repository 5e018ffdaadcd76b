use axum::{
    body::Body,
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use tokio_util::io::ReaderStream;

use crate::AppState;
use crate::models::Session;
use crate::services::ShareError;

pub const ARCHIVE_NAME: &str = "shared_files.zip";

/// `Content-Disposition` forcing a download, with RFC 5987 encoding for
/// non-ASCII names
pub fn attachment_disposition(file_name: &str) -> String {
    let ascii_fallback: String = file_name
        .chars()
        .map(|c| if c.is_ascii() && c != '"' && c != '\\' { c } else { '_' })
        .collect();
    let filename_encoded = utf8_percent_encode(file_name, NON_ALPHANUMERIC).to_string();
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        ascii_fallback, filename_encoded
    )
}

/// GET /uploads/{name}
pub async fn download_file(
    State(state): State<AppState>,
    session: Session,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ShareError> {
    let (file, info) = state.share_service.download_one(&session, &name).await?;

    let mime_type = mime_guess::from_path(&info.name)
        .first_or_octet_stream()
        .to_string();
    let body = Body::from_stream(ReaderStream::new(file));

    tracing::debug!(name = %info.name, size = info.size, "Serving download");

    Ok((
        [
            (header::CONTENT_TYPE, mime_type),
            (header::CONTENT_DISPOSITION, attachment_disposition(&info.name)),
            (header::CONTENT_LENGTH, info.size.to_string()),
        ],
        body,
    ))
}

/// GET /download-zip
pub async fn download_all(
    State(state): State<AppState>,
    session: Session,
) -> Result<impl IntoResponse, ShareError> {
    let stream = state.share_service.download_all(&session).await?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (header::CONTENT_DISPOSITION, attachment_disposition(ARCHIVE_NAME)),
        ],
        Body::from_stream(stream),
    ))
}
