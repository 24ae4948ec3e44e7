use axum::{extract::State, routing::get, Json, Router};
use tracing::instrument;

use crate::{
    auth::extractors::CurrentUser,
    dashboard::services::{self, DashboardStats},
    error::ApiError,
    state::AppState,
};

pub fn dashboard_routes() -> Router<AppState> {
    Router::new().route("/dashboard/stats", get(get_stats))
}

#[instrument(skip_all)]
pub async fn get_stats(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> Result<Json<DashboardStats>, ApiError> {
    let stats = services::stats(
        state.projects.as_ref(),
        state.test_results.as_ref(),
        &state.config.active_statuses,
    )
    .await?;
    Ok(Json(stats))
}
