//! Profile and organization settings

use axum::{extract::State, routing::patch, Json, Router};

use nixito_core::model::{OrganizationUpdate, ProfileUpdate};

use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::types::MeResponse;
use crate::AppState;

/// Build the settings router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/profile", patch(update_profile))
        .route("/organization", patch(update_organization))
}

/// Update the caller's own profile
async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Json(req): Json<ProfileUpdate>,
) -> Result<Json<MeResponse>, AppError> {
    let id = principal.id.clone();
    let dashboard = state.dashboard_for(principal).await;
    dashboard.save_profile(&req).await?;
    Ok(Json(MeResponse::new(id, &dashboard.access())))
}

/// Rename the caller's organization (requires `org:update`)
async fn update_organization(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Json(req): Json<OrganizationUpdate>,
) -> Result<Json<MeResponse>, AppError> {
    let id = principal.id.clone();
    let dashboard = state.dashboard_for(principal).await;
    dashboard.save_organization(&req).await?;
    Ok(Json(MeResponse::new(id, &dashboard.access())))
}
