use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::password::{ensure_confirmed, hash_blocking},
    config::BootstrapAdmin,
    error::ApiError,
    users::{
        dto::{CreateUserRequest, UpdateUserRequest},
        repo::UserRepo,
        repo_types::{NewUser, Role, User, UserChanges},
    },
};

const NAME_LEN: (usize, usize) = (3, 100);
const USERNAME_LEN: (usize, usize) = (3, 50);

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn check_len(field: &str, value: &str, (min, max): (usize, usize)) -> Result<(), ApiError> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(ApiError::validation(format!(
            "{field} must be between {min} and {max} characters"
        )));
    }
    Ok(())
}

fn parse_role(raw: &str) -> Result<Role, ApiError> {
    raw.parse::<Role>().map_err(ApiError::Validation)
}

/// Looks up a user that has not been deactivated.
pub async fn active_user(repo: &dyn UserRepo, uuid: Uuid) -> Result<User, ApiError> {
    match repo.find_by_uuid(uuid).await? {
        Some(user) if user.is_active => Ok(user),
        _ => Err(ApiError::not_found("User not found")),
    }
}

pub async fn create_user(repo: &dyn UserRepo, req: CreateUserRequest) -> Result<User, ApiError> {
    let (Some(name), Some(username), Some(password), Some(role)) = (
        present(req.name),
        present(req.username),
        present(req.password),
        present(req.role),
    ) else {
        return Err(ApiError::validation("All fields are required"));
    };
    ensure_confirmed(&password, req.confirm_password.as_deref())?;

    let name = name.trim().to_string();
    let username = username.trim().to_string();
    check_len("name", &name, NAME_LEN)?;
    check_len("username", &username, USERNAME_LEN)?;
    let role = parse_role(&role)?;

    let password_hash = hash_blocking(password).await?;
    let user = repo
        .create(NewUser {
            name,
            username,
            password_hash,
            role,
        })
        .await
        .map_err(|e| {
            warn!(error = %e, "create user rejected");
            ApiError::from(e)
        })?;

    info!(user = %user.uuid, username = %user.username, role = ?user.role, "user created");
    Ok(user)
}

pub async fn update_user(
    repo: &dyn UserRepo,
    uuid: Uuid,
    req: UpdateUserRequest,
) -> Result<User, ApiError> {
    active_user(repo, uuid).await?;

    let password_hash = match present(req.password) {
        None => None,
        Some(password) => {
            ensure_confirmed(&password, req.confirm_password.as_deref())?;
            Some(hash_blocking(password).await?)
        }
    };

    let name = req.name.map(|n| n.trim().to_string());
    if let Some(name) = &name {
        check_len("name", name, NAME_LEN)?;
    }
    let username = req.username.map(|u| u.trim().to_string());
    if let Some(username) = &username {
        check_len("username", username, USERNAME_LEN)?;
    }
    let role = req.role.as_deref().map(parse_role).transpose()?;

    let changes = UserChanges {
        name,
        username,
        password_hash,
        role,
    };
    let user = repo
        .update(uuid, changes)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    info!(user = %user.uuid, "user updated");
    Ok(user)
}

/// Soft delete: the row stays, only the active flag drops.
pub async fn deactivate_user(repo: &dyn UserRepo, uuid: Uuid) -> Result<User, ApiError> {
    active_user(repo, uuid).await?;
    let user = repo
        .set_active(uuid, false)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    info!(user = %user.uuid, "user deactivated");
    Ok(user)
}

pub async fn toggle_user(repo: &dyn UserRepo, uuid: Uuid) -> Result<User, ApiError> {
    let current = repo
        .find_by_uuid(uuid)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    let user = repo
        .set_active(uuid, !current.is_active)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    info!(user = %user.uuid, is_active = user.is_active, "user active flag toggled");
    Ok(user)
}

/// Creates the configured admin account unless the username is taken.
/// Returns whether a user was created.
pub async fn ensure_bootstrap_admin(
    repo: &dyn UserRepo,
    admin: &BootstrapAdmin,
) -> anyhow::Result<bool> {
    if repo.find_by_username(&admin.username).await?.is_some() {
        return Ok(false);
    }
    let password_hash = hash_blocking(admin.password.clone()).await?;
    let user = repo
        .create(NewUser {
            name: admin.name.clone(),
            username: admin.username.clone(),
            password_hash,
            role: Role::Admin,
        })
        .await?;
    info!(user = %user.uuid, username = %user.username, "bootstrap admin created");
    Ok(true)
}
