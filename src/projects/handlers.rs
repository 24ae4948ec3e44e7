use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::extractors::CurrentUser,
    error::{ApiError, MessageResponse},
    extract::{ApiJson, EntityId},
    projects::{
        dto::{ProjectEnvelope, ProjectRequest, SearchQuery},
        repo_types::Project,
        services,
    },
    state::AppState,
};

pub fn project_routes() -> Router<AppState> {
    Router::new()
        .route("/projects", get(list_projects).post(create_project))
        .route("/projects/search", get(search_projects))
        .route(
            "/projects/:id",
            get(get_project).patch(update_project).delete(delete_project),
        )
}

#[instrument(skip_all)]
pub async fn list_projects(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> Result<Json<Vec<Project>>, ApiError> {
    Ok(Json(state.projects.list_projects().await?))
}

#[instrument(skip(state, _user))]
pub async fn search_projects(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Project>>, ApiError> {
    let projects = services::search_projects(state.projects.as_ref(), query).await?;
    Ok(Json(projects))
}

#[instrument(skip(state, _user))]
pub async fn get_project(
    State(state): State<AppState>,
    _user: CurrentUser,
    EntityId(id): EntityId,
) -> Result<Json<Project>, ApiError> {
    Ok(Json(services::get_project(state.projects.as_ref(), id).await?))
}

#[instrument(skip(state, user, payload))]
pub async fn create_project(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(payload): ApiJson<ProjectRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let project = services::create_project(state.projects.as_ref(), &user, payload).await?;
    let location = format!("/projects/{}", project.uuid);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(ProjectEnvelope {
            msg: "Project created".into(),
            project,
        }),
    ))
}

#[instrument(skip(state, user, payload))]
pub async fn update_project(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    EntityId(id): EntityId,
    ApiJson(payload): ApiJson<ProjectRequest>,
) -> Result<Json<ProjectEnvelope>, ApiError> {
    let project = services::update_project(state.projects.as_ref(), &user, id, payload).await?;
    Ok(Json(ProjectEnvelope {
        msg: "Project updated".into(),
        project,
    }))
}

#[instrument(skip(state, user))]
pub async fn delete_project(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    EntityId(id): EntityId,
) -> Result<Json<MessageResponse>, ApiError> {
    services::delete_project(state.projects.as_ref(), &user, id).await?;
    Ok(Json(MessageResponse::new("Project deleted")))
}
