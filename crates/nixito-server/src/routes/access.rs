//! Resolved access and navigation for the calling principal

use axum::{extract::State, Json};

use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::types::{MeResponse, NavResponse, RouteResponse};
use crate::AppState;

/// Resolved access snapshot. A principal without a profile yet gets
/// `200` with `error` set, so clients can route to onboarding.
pub async fn me(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
) -> Result<Json<MeResponse>, AppError> {
    let id = principal.id.clone();
    let dashboard = state.dashboard_for(principal).await;
    Ok(Json(MeResponse::new(id, &dashboard.access())))
}

/// Nav items and visible routes of enabled, registered plugins
pub async fn nav(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
) -> Result<Json<NavResponse>, AppError> {
    let dashboard = state.dashboard_for(principal).await;
    let routes = dashboard
        .visible_routes()
        .into_iter()
        .map(|(plugin_id, route)| RouteResponse { plugin_id, route })
        .collect();

    Ok(Json(NavResponse {
        items: dashboard.nav_items(),
        routes,
    }))
}
