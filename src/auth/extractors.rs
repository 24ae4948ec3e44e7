use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use tracing::{debug, error};

use super::{policy, session::cookie_value};
use crate::{
    error::ApiError,
    state::AppState,
    users::repo_types::{Role, User},
};

/// Session token of the request: the session cookie, else a bearer token.
pub fn session_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let from_cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .find_map(|h| cookie_value(h, cookie_name));
    if let Some(token) = from_cookie {
        return Some(token.to_string());
    }

    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())?;
    auth.strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Authenticated, active user behind the request's session.
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = session_token(&parts.headers, &state.config.session.cookie_name)
            .ok_or(ApiError::Unauthenticated)?;

        let session = state
            .sessions
            .get(&token)
            .await?
            .ok_or(ApiError::Unauthenticated)?;

        let user = state
            .users
            .find_by_uuid(session.user_uuid)
            .await
            .map_err(|e| {
                error!(error = %e, "session user lookup failed");
                ApiError::from(e)
            })?;

        match user {
            Some(user) if user.is_active => Ok(CurrentUser(user)),
            _ => {
                debug!(user = %session.user_uuid, "session user gone or inactive");
                state.sessions.destroy(&token).await?;
                Err(ApiError::Unauthenticated)
            }
        }
    }
}

/// Current user holding the admin role.
pub struct AdminUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        policy::ensure(&user, None, Role::Admin, "Admin access required")?;
        Ok(AdminUser(user))
    }
}
