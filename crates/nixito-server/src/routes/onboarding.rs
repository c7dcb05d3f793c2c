//! First-run organization setup

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};

use nixito_core::model::{OnboardRequest, Organization};

use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::AppState;

/// Build the onboarding router
pub fn router() -> Router<AppState> {
    Router::new().route("/", post(onboard))
}

/// Create an organization owned by the caller. The slug is derived from
/// the name when not supplied.
async fn onboard(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Json(req): Json<OnboardRequest>,
) -> Result<(StatusCode, Json<Organization>), AppError> {
    let dashboard = state.dashboard_for(principal).await;
    let org = dashboard.onboard(&req).await?;
    Ok((StatusCode::CREATED, Json(org)))
}
