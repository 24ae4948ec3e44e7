use tracing::warn;

use crate::{
    auth::{dto::LoginRequest, password::verify_blocking},
    error::ApiError,
    users::{repo::UserRepo, repo_types::User},
};

/// Checks login credentials and returns the matching account.
pub async fn authenticate(repo: &dyn UserRepo, req: LoginRequest) -> Result<User, ApiError> {
    let username = req
        .username
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty());
    let password = req.password.filter(|p| !p.is_empty());
    let (Some(username), Some(password)) = (username, password) else {
        return Err(ApiError::validation("Username and password are required"));
    };

    let user = repo.find_by_username(&username).await?.ok_or_else(|| {
        warn!(%username, "login unknown username");
        ApiError::not_found("User not found")
    })?;

    // checked before the active flag
    if !verify_blocking(password, user.password_hash.clone()).await? {
        warn!(user = %user.uuid, "login invalid password");
        return Err(ApiError::InvalidCredentials);
    }

    if !user.is_active {
        warn!(user = %user.uuid, "login on deactivated account");
        return Err(ApiError::forbidden("Account is deactivated"));
    }

    Ok(user)
}
