use axum::{
    Form,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;

use crate::AppState;
use crate::models::Session;
use crate::views;

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub pin: String,
}

/// GET /login
pub async fn login_page(State(state): State<AppState>, session: Session) -> Response {
    if state.share_service.session_gate().is_authenticated(&session) {
        return Redirect::to("/").into_response();
    }
    views::login_page(None).into_response()
}

/// POST /login
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Response {
    match state.share_service.session_gate().login(&session, &form.pin) {
        Ok(_) => {
            tracing::info!("Client logged in");
            Redirect::to("/").into_response()
        }
        Err(e) => {
            tracing::warn!("Rejected login attempt: {}", e);
            (StatusCode::UNAUTHORIZED, views::login_page(Some(&e.to_string()))).into_response()
        }
    }
}

/// GET|POST /logout
pub async fn logout(State(state): State<AppState>, session: Session) -> Redirect {
    state.share_service.session_gate().logout(&session);
    tracing::info!("Client logged out");
    Redirect::to("/")
}
