//! Capability checks shared by every handler that needs one.

use crate::error::ApiError;
use crate::users::repo_types::{Role, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

/// Decides whether `actor` may act on a resource.
///
/// Admins always pass. `Role::Admin` as the requirement shuts out everyone
/// else; with `Role::User` any authenticated actor passes unless `owner`
/// names a different user.
pub fn check(actor: &User, owner: Option<i64>, required: Role) -> Decision {
    if actor.is_admin() {
        return Decision::Allow;
    }
    if required == Role::Admin {
        return Decision::Deny;
    }
    match owner {
        Some(owner_id) if owner_id != actor.id => Decision::Deny,
        _ => Decision::Allow,
    }
}

pub fn ensure(actor: &User, owner: Option<i64>, required: Role, denied: &str) -> Result<(), ApiError> {
    match check(actor, owner, required) {
        Decision::Allow => Ok(()),
        Decision::Deny => {
            tracing::warn!(actor = %actor.uuid, role = ?actor.role, "access denied");
            Err(ApiError::forbidden(denied))
        }
    }
}
