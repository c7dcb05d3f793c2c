//! API routes

use axum::{routing::get, Router};

use crate::AppState;

mod access;
mod onboarding;
mod plugins;
mod settings;

/// Build the API router with all endpoints
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/me", get(access::me))
        .route("/nav", get(access::nav))
        .nest("/plugins", plugins::router())
        .nest("/settings", settings::router())
        .nest("/onboarding", onboarding::router())
}
