use axum::{extract::State, routing::get, Json, Router};
use tracing::instrument;

use crate::{
    auth::extractors::CurrentUser,
    error::ApiError,
    extract::EntityId,
    state::AppState,
    test_runs::{repo_types::TestResult, services},
};

pub fn test_routes() -> Router<AppState> {
    Router::new()
        // path parameter shares its name with /projects/:id
        .route("/projects/:id/tests", get(project_history).post(run_tests))
        .route("/tests", get(all_results))
}

#[instrument(skip(state, user))]
pub async fn run_tests(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    EntityId(project): EntityId,
) -> Result<Json<TestResult>, ApiError> {
    tracing::debug!(actor = %user.uuid, "test run requested");
    let result = services::run_for_project(
        state.projects.as_ref(),
        state.test_results.as_ref(),
        state.metrics.as_ref(),
        project,
    )
    .await?;
    Ok(Json(result))
}

#[instrument(skip(state, _user))]
pub async fn project_history(
    State(state): State<AppState>,
    _user: CurrentUser,
    EntityId(project): EntityId,
) -> Result<Json<Vec<TestResult>>, ApiError> {
    let results =
        services::history(state.projects.as_ref(), state.test_results.as_ref(), project).await?;
    Ok(Json(results))
}

#[instrument(skip_all)]
pub async fn all_results(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> Result<Json<Vec<TestResult>>, ApiError> {
    Ok(Json(services::all_results(state.test_results.as_ref()).await?))
}
