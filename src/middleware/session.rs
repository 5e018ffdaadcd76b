use axum::{
    Json,
    extract::{FromRequestParts, Request, State},
    http::{StatusCode, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, Key, SameSite, SignedCookieJar};
use sha2::{Digest, Sha512};

use crate::AppState;
use crate::models::Session;
use crate::routes::ApiResponse;

pub const SESSION_COOKIE: &str = "local_sharer_session";

/// Cookie signing key. A configured secret gives a stable key across
/// restarts; otherwise a random key is generated for this run.
pub fn signing_key(secret: Option<&str>) -> Key {
    match secret {
        Some(secret) => Key::from(Sha512::digest(secret.as_bytes()).as_slice()),
        None => Key::generate(),
    }
}

/// Attach a [`Session`] to every request. When a PIN is set, browsers
/// without a valid signed session cookie are issued one.
pub async fn session_layer(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let token = jar.get(SESSION_COOKIE).map(|c| c.value().to_owned());
    let (session, created) = state
        .share_service
        .session_gate()
        .resume(token.as_deref());

    let issued_token = created.then(|| session.token.clone());
    request.extensions_mut().insert(session);

    let response = next.run(request).await;

    match issued_token {
        Some(token) => {
            tracing::debug!("Issued new session");
            let cookie = Cookie::build((SESSION_COOKIE, token))
                .http_only(true)
                .same_site(SameSite::Lax)
                .path("/")
                .build();
            (jar.add(cookie), response).into_response()
        }
        None => response,
    }
}

/// Extractor for the session attached by [`session_layer`]
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Session>().cloned().ok_or_else(|| {
            tracing::error!("Session layer missing from router");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()> {
                    success: false,
                    message: Some("Session unavailable".to_string()),
                    data: None,
                }),
            )
                .into_response()
        })
    }
}
