//! Authorization check shared by every guarded handler.
//!
//! A caller identity is resolved to its user and role, then evaluated against a
//! `Requirement`. Handlers run this before touching the store for anything else,
//! so a denied or unresolvable caller never causes a side effect.

use thiserror::Error;

use crate::{
    auth::CallerIdentity,
    models::{Role, User},
    permissions::{self, PermissionId},
    repository::{RepoError, Repository},
};

/// Requirement
///
/// What the caller must satisfy for an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement<'a> {
    /// The caller's role holds at least one of these permissions.
    AnyOf(&'a [PermissionId]),
    /// The caller's role is elevated (superadmin/admin).
    Elevated,
    /// The caller's role is elevated, or the caller is this user.
    ElevatedOrSelf(i64),
}

/// Principal
///
/// A resolved caller: the user record and the role it references.
#[derive(Debug, Clone)]
pub struct Principal {
    pub user: User,
    pub role: Role,
}

impl Principal {
    pub fn is_elevated(&self) -> bool {
        permissions::is_elevated_role(&self.role.name)
    }
}

/// Decision
///
/// Outcome of a successful evaluation. `Allowed` carries the principal so the
/// handler does not need to resolve it again.
#[derive(Debug, Clone)]
pub enum Decision {
    Allowed(Principal),
    Denied,
}

#[derive(Debug, Error)]
pub enum AuthzError {
    #[error("user not found")]
    UserNotFound,

    /// The user's role reference is dangling. Should not occur given the foreign
    /// key, but is reported rather than treated as a denial.
    #[error("role not found")]
    RoleNotFound,

    #[error(transparent)]
    Store(#[from] RepoError),
}

/// Resolves a caller identity to its user and role.
pub async fn resolve(
    repo: &dyn Repository,
    identity: &CallerIdentity,
) -> Result<Principal, AuthzError> {
    let user = match identity {
        CallerIdentity::UserId(id) => repo.get_user(*id).await?,
        CallerIdentity::Username(username) => repo.get_user_by_username(username).await?,
    }
    .ok_or(AuthzError::UserNotFound)?;

    let role = repo
        .get_role(user.role_id)
        .await?
        .ok_or(AuthzError::RoleNotFound)?;

    Ok(Principal { user, role })
}

/// Evaluates `requirement` for an already resolved principal.
pub async fn evaluate(
    repo: &dyn Repository,
    principal: &Principal,
    requirement: Requirement<'_>,
) -> Result<bool, RepoError> {
    match requirement {
        Requirement::AnyOf([]) => Ok(false),
        Requirement::AnyOf(required) => {
            repo.role_has_any_permission(principal.role.id, required)
                .await
        }
        Requirement::Elevated => Ok(principal.is_elevated()),
        Requirement::ElevatedOrSelf(user_id) => {
            Ok(principal.is_elevated() || principal.user.id == user_id)
        }
    }
}

/// authorize
///
/// Resolves the caller and evaluates the requirement.
///
/// - `Err(UserNotFound)` / `Err(RoleNotFound)` when the identity cannot be resolved.
/// - `Ok(Denied)` when the requirement is not met.
/// - `Ok(Allowed(principal))` otherwise.
pub async fn authorize(
    repo: &dyn Repository,
    identity: &CallerIdentity,
    requirement: Requirement<'_>,
) -> Result<Decision, AuthzError> {
    let principal = resolve(repo, identity).await?;

    if evaluate(repo, &principal, requirement).await? {
        tracing::debug!(
            user_id = principal.user.id,
            role = %principal.role.name,
            ?requirement,
            "authorization granted"
        );
        Ok(Decision::Allowed(principal))
    } else {
        tracing::warn!(
            user_id = principal.user.id,
            role = %principal.role.name,
            ?requirement,
            "authorization denied"
        );
        Ok(Decision::Denied)
    }
}
