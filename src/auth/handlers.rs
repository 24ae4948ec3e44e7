use axum::{
    extract::State,
    http::{header, HeaderMap},
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use tracing::{error, info, instrument};

use crate::{
    auth::{
        dto::{LoginRequest, SessionUser},
        extractors::{session_token, CurrentUser},
        services::authenticate,
        session::{expired_cookie, session_cookie},
    },
    error::{ApiError, MessageResponse},
    extract::ApiJson,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", delete(logout))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = authenticate(state.users.as_ref(), payload).await?;

    let session = state.sessions.create(user.uuid).await.map_err(|e| {
        error!(error = %e, "session create failed");
        ApiError::Internal(e)
    })?;

    let cfg = &state.config.session;
    let max_age = cfg
        .ttl_minutes
        .checked_mul(60)
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("session ttl out of range")))?;
    let cookie = session_cookie(&cfg.cookie_name, &session.token, max_age, cfg.secure_cookie);

    info!(user = %user.uuid, username = %user.username, "user logged in");
    Ok(([(header::SET_COOKIE, cookie)], Json(SessionUser::from(user))))
}

#[instrument(skip_all)]
pub async fn get_me(CurrentUser(user): CurrentUser) -> Json<SessionUser> {
    Json(SessionUser::from(user))
}

#[instrument(skip_all)]
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let cfg = &state.config.session;
    if let Some(token) = session_token(&headers, &cfg.cookie_name) {
        let removed = state.sessions.destroy(&token).await.map_err(|e| {
            error!(error = %e, "session destroy failed");
            ApiError::Internal(e)
        })?;
        if removed {
            info!("user logged out");
        }
    }

    Ok((
        [(header::SET_COOKIE, expired_cookie(&cfg.cookie_name, cfg.secure_cookie))],
        Json(MessageResponse::new("Logged out")),
    ))
}
