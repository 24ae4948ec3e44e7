use serde::{Deserialize, Serialize};

use crate::users::repo_types::User;

/// Request body for creating a user. Every field is checked by hand so a
/// missing one yields the envelope message instead of a serde error.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateUserRequest {
    pub name: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(alias = "confPassword")]
    pub confirm_password: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(alias = "confPassword")]
    pub confirm_password: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListUsersQuery {
    pub include_inactive: bool,
}

#[derive(Debug, Serialize)]
pub struct UserEnvelope {
    pub msg: String,
    pub user: User,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleResponse {
    pub msg: String,
    pub is_active: bool,
}
