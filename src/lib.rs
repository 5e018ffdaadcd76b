// Library entry point for testing
pub mod config;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;
pub mod views;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use std::sync::Arc;

use crate::services::ShareService;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub share_service: Arc<ShareService>,
    pub cookie_key: Key,
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}
