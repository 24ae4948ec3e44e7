use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::extractors::AdminUser,
    error::{ApiError, MessageResponse},
    extract::{ApiJson, EntityId},
    state::AppState,
    users::{
        dto::{CreateUserRequest, ListUsersQuery, ToggleResponse, UpdateUserRequest, UserEnvelope},
        repo_types::User,
        services,
    },
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/:id",
            get(get_user).patch(update_user).delete(deactivate_user),
        )
        .route("/users/toggle/:id", patch(toggle_user))
}

#[instrument(skip(state, _admin))]
pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<Vec<User>>, ApiError> {
    let users = state.users.list(query.include_inactive).await?;
    Ok(Json(users))
}

#[instrument(skip(state, _admin))]
pub async fn get_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    EntityId(id): EntityId,
) -> Result<Json<User>, ApiError> {
    let user = services::active_user(state.users.as_ref(), id).await?;
    Ok(Json(user))
}

#[instrument(skip(state, _admin, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiJson(payload): ApiJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserEnvelope>), ApiError> {
    let user = services::create_user(state.users.as_ref(), payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(UserEnvelope {
            msg: "User created".into(),
            user,
        }),
    ))
}

#[instrument(skip(state, _admin, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    EntityId(id): EntityId,
    ApiJson(payload): ApiJson<UpdateUserRequest>,
) -> Result<Json<UserEnvelope>, ApiError> {
    let user = services::update_user(state.users.as_ref(), id, payload).await?;
    Ok(Json(UserEnvelope {
        msg: "User updated".into(),
        user,
    }))
}

#[instrument(skip(state, _admin))]
pub async fn deactivate_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    EntityId(id): EntityId,
) -> Result<Json<MessageResponse>, ApiError> {
    services::deactivate_user(state.users.as_ref(), id).await?;
    Ok(Json(MessageResponse::new("User deactivated")))
}

#[instrument(skip(state, _admin))]
pub async fn toggle_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    EntityId(id): EntityId,
) -> Result<Json<ToggleResponse>, ApiError> {
    let user = services::toggle_user(state.users.as_ref(), id).await?;
    let msg = if user.is_active {
        "User activated"
    } else {
        "User deactivated"
    };
    Ok(Json(ToggleResponse {
        msg: msg.into(),
        is_active: user.is_active,
    }))
}
