#![allow(dead_code)]

use axum::body::Body;
use poscal_api::{
    AppConfig, AppState, MemoryRepository, RepositoryState,
    auth::{Caller, CallerIdentity},
    bootstrap,
    models::{NewUser, Role, UserProfile},
    permissions::{ADMIN, PermissionId, STAFF, SUPERADMIN},
    repository::Repository,
};
use std::sync::Arc;

/// Seeded in-memory deployment shared by the handler and router suites.
///
/// Users, by role:
/// - `root`: superadmin
/// - `manager`: admin
/// - `clerk`: staff (InventoryView, InventorySell)
/// - `viewer`: custom role holding only InventoryView
/// - `guest`: custom role with no permissions
pub struct Fixture {
    pub repo: Arc<MemoryRepository>,
    pub state: AppState,
    pub superadmin_role: Role,
    pub admin_role: Role,
    pub staff_role: Role,
    pub viewer_role: Role,
    pub guest_role: Role,
    pub root: UserProfile,
    pub manager: UserProfile,
    pub clerk: UserProfile,
    pub viewer: UserProfile,
    pub guest: UserProfile,
}

pub async fn fixture() -> Fixture {
    fixture_with_config(AppConfig::default()).await
}

pub async fn fixture_with_config(config: AppConfig) -> Fixture {
    let repo = Arc::new(MemoryRepository::new());
    bootstrap::seed(repo.as_ref(), None).await.unwrap();

    let superadmin_role = repo.get_role_by_name(SUPERADMIN).await.unwrap().unwrap();
    let admin_role = repo.get_role_by_name(ADMIN).await.unwrap().unwrap();
    let staff_role = repo.get_role_by_name(STAFF).await.unwrap().unwrap();

    let viewer_role = repo.create_role("viewer").await.unwrap();
    repo.attach_permission(viewer_role.id, PermissionId::InventoryView.id())
        .await
        .unwrap();
    let guest_role = repo.create_role("guest").await.unwrap();

    let root = add_user(repo.as_ref(), "root", superadmin_role.id).await;
    let manager = add_user(repo.as_ref(), "manager", admin_role.id).await;
    let clerk = add_user(repo.as_ref(), "clerk", staff_role.id).await;
    let viewer = add_user(repo.as_ref(), "viewer", viewer_role.id).await;
    let guest = add_user(repo.as_ref(), "guest", guest_role.id).await;

    let state = AppState {
        repo: repo.clone() as RepositoryState,
        config,
    };

    Fixture {
        repo,
        state,
        superadmin_role,
        admin_role,
        staff_role,
        viewer_role,
        guest_role,
        root,
        manager,
        clerk,
        viewer,
        guest,
    }
}

/// Inserts a user directly. The stored hash is not a valid argon2 string, so these
/// users cannot log in; login tests create their own.
pub async fn add_user(repo: &dyn Repository, username: &str, role_id: i64) -> UserProfile {
    repo.create_user(NewUser {
        username: username.to_string(),
        email: format!("{}@example.com", username),
        password_hash: "not-a-hash".to_string(),
        role_id,
    })
    .await
    .unwrap()
}

pub fn caller(username: &str) -> Caller {
    Caller {
        identity: CallerIdentity::Username(username.to_string()),
    }
}

pub async fn body_json(body: Body) -> serde_json::Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
