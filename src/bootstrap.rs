//! Startup seeding: permission registry, default roles, first administrator.
//!
//! Idempotent. Default grants missing from a seeded role are added on every
//! start; extra grants an operator attached are left alone.

use crate::{
    config::BootstrapAdmin,
    error::ApiError,
    models::{NewUser, Role},
    password,
    permissions::{ADMIN, PermissionId, STAFF, SUPERADMIN},
    repository::Repository,
};

/// Default grants per seeded role.
pub fn default_grants(role: &str) -> Vec<PermissionId> {
    match role {
        SUPERADMIN => PermissionId::ALL.to_vec(),
        ADMIN => PermissionId::ALL
            .into_iter()
            .filter(|p| *p != PermissionId::RolePermissionManage)
            .collect(),
        STAFF => vec![PermissionId::InventoryView, PermissionId::InventorySell],
        _ => Vec::new(),
    }
}

/// seed
///
/// Mirrors the permission registry into the store and ensures the default roles
/// carry their grants. When a bootstrap administrator is configured and no user
/// of that name exists yet, creates it with the superadmin role.
pub async fn seed(repo: &dyn Repository, admin: Option<&BootstrapAdmin>) -> Result<(), ApiError> {
    repo.sync_permissions(&PermissionId::ALL).await?;

    let superadmin = ensure_role(repo, SUPERADMIN).await?;
    ensure_role(repo, ADMIN).await?;
    ensure_role(repo, STAFF).await?;

    let Some(admin) = admin else {
        return Ok(());
    };

    if repo.get_user_by_username(&admin.username).await?.is_some() {
        tracing::debug!(username = %admin.username, "bootstrap admin already present");
        return Ok(());
    }

    let created = repo
        .create_user(NewUser {
            username: admin.username.clone(),
            email: admin.email.clone(),
            password_hash: password::hash_password(&admin.password)?,
            role_id: superadmin.id,
        })
        .await?;
    tracing::info!(user_id = created.id, username = %created.username, "bootstrap admin created");
    Ok(())
}

async fn ensure_role(repo: &dyn Repository, name: &str) -> Result<Role, ApiError> {
    let role = match repo.get_role_by_name(name).await? {
        Some(role) => role,
        None => {
            let role = repo.create_role(name).await?;
            tracing::info!(role_id = role.id, role = %role.name, "seeded role");
            role
        }
    };

    for permission in default_grants(name) {
        if !repo
            .role_has_any_permission(role.id, &[permission])
            .await?
        {
            repo.attach_permission(role.id, permission.id()).await?;
        }
    }
    Ok(role)
}
