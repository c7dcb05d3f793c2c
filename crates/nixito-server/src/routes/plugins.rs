//! Plugin catalog and lifecycle endpoints

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};

use nixito_core::access::permissions::PLUGINS_READ;
use nixito_core::plugins::{InstalledPlugin, PluginSummary};
use nixito_core::{Dashboard, PermissionGate};

use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::AppState;

/// Build the plugins router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_installed))
        .route("/available", get(list_available))
        .route("/:id/install", post(install_plugin))
        .route("/:id/enable", post(enable_plugin))
        .route("/:id/disable", post(disable_plugin))
}

async fn readable_dashboard(state: &AppState, user: CurrentUser) -> Result<Dashboard, AppError> {
    let dashboard = state.dashboard_for(user.0).await;
    PermissionGate::single(PLUGINS_READ).require(&dashboard.access())?;
    Ok(dashboard)
}

/// Installed plugins for the caller's organization
async fn list_installed(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<InstalledPlugin>>, AppError> {
    let dashboard = readable_dashboard(&state, user).await?;
    Ok(Json(dashboard.installed_plugins()))
}

/// Catalog entries not yet installed
async fn list_available(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<PluginSummary>>, AppError> {
    let dashboard = readable_dashboard(&state, user).await?;
    Ok(Json(dashboard.available_plugins()))
}

async fn install_plugin(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Vec<InstalledPlugin>>, AppError> {
    let dashboard = state.dashboard_for(principal).await;
    dashboard.install_plugin(&id).await?;
    Ok(Json(dashboard.installed_plugins()))
}

async fn enable_plugin(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Vec<InstalledPlugin>>, AppError> {
    let dashboard = state.dashboard_for(principal).await;
    dashboard.enable_plugin(&id).await?;
    Ok(Json(dashboard.installed_plugins()))
}

async fn disable_plugin(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Vec<InstalledPlugin>>, AppError> {
    let dashboard = state.dashboard_for(principal).await;
    dashboard.disable_plugin(&id).await?;
    Ok(Json(dashboard.installed_plugins()))
}
