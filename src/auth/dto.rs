use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::users::repo_types::{Role, User};

/// Request body for login. Fields are optional so a missing one is reported
/// with the error envelope.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Public view of the logged-in user.
#[derive(Debug, Serialize, PartialEq)]
pub struct SessionUser {
    pub uuid: Uuid,
    pub name: String,
    pub username: String,
    pub role: Role,
}

impl From<User> for SessionUser {
    fn from(u: User) -> Self {
        Self {
            uuid: u.uuid,
            name: u.name,
            username: u.username,
            role: u.role,
        }
    }
}
