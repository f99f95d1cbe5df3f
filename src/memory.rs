use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::Mutex;

use crate::models::{
    InventoryItem, ItemChanges, NewItem, NewUser, Permission, Role, RoleDeletion, RolePermission,
    SellOutcome, User, UserChanges, UserProfile,
};
use crate::permissions::PermissionId;
use crate::repository::{RepoError, RepoResult, Repository};

/// MemoryRepository
///
/// A `Repository` held entirely in process memory, used by the test suites and for
/// running the API without Postgres. Every method takes the single store lock for
/// its whole duration, which gives the same atomicity the Postgres implementation
/// gets from conditional updates and transactions.
#[derive(Default)]
pub struct MemoryRepository {
    store: Mutex<Store>,
}

#[derive(Default)]
struct Store {
    users: BTreeMap<i64, User>,
    roles: BTreeMap<i64, Role>,
    permissions: BTreeMap<i64, Permission>,
    role_permissions: BTreeMap<i64, RolePermission>,
    items: BTreeMap<i64, InventoryItem>,
    next_id: i64,
}

impl Store {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn profile(&self, user: &User) -> Option<UserProfile> {
        let role = self.roles.get(&user.role_id)?;
        Some(UserProfile {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            role_id: user.role_id,
            role: role.name.clone(),
        })
    }

    fn username_taken(&self, username: &str, except: Option<i64>) -> bool {
        self.users
            .values()
            .any(|u| u.username == username && Some(u.id) != except)
    }

    fn role_name_taken(&self, name: &str, except: Option<i64>) -> bool {
        self.roles
            .values()
            .any(|r| r.name == name && Some(r.id) != except)
    }
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn get_user(&self, id: i64) -> RepoResult<Option<User>> {
        Ok(self.store.lock().await.users.get(&id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        let store = self.store.lock().await;
        Ok(store.users.values().find(|u| u.username == username).cloned())
    }

    async fn get_user_profile(&self, id: i64) -> RepoResult<Option<UserProfile>> {
        let store = self.store.lock().await;
        Ok(store.users.get(&id).and_then(|u| store.profile(u)))
    }

    async fn list_users(&self) -> RepoResult<Vec<UserProfile>> {
        let store = self.store.lock().await;
        Ok(store.users.values().filter_map(|u| store.profile(u)).collect())
    }

    async fn create_user(&self, user: NewUser) -> RepoResult<UserProfile> {
        let mut store = self.store.lock().await;
        if store.username_taken(&user.username, None) {
            return Err(RepoError::Conflict(format!(
                "Username '{}' is already taken",
                user.username
            )));
        }
        if !store.roles.contains_key(&user.role_id) {
            return Err(RepoError::Conflict("Role does not exist".to_string()));
        }

        let id = store.next_id();
        let record = User {
            id,
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            role_id: user.role_id,
        };
        let profile = store.profile(&record);
        store.users.insert(id, record);
        profile.ok_or_else(|| RepoError::Conflict("Role does not exist".to_string()))
    }

    async fn update_user(&self, id: i64, changes: UserChanges) -> RepoResult<Option<UserProfile>> {
        let mut store = self.store.lock().await;
        if !store.users.contains_key(&id) {
            return Ok(None);
        }
        if let Some(username) = &changes.username {
            if store.username_taken(username, Some(id)) {
                return Err(RepoError::Conflict(
                    "Username is taken or role does not exist".to_string(),
                ));
            }
        }
        if let Some(role_id) = changes.role_id {
            if !store.roles.contains_key(&role_id) {
                return Err(RepoError::Conflict(
                    "Username is taken or role does not exist".to_string(),
                ));
            }
        }

        let Some(user) = store.users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(username) = changes.username {
            user.username = username;
        }
        if let Some(email) = changes.email {
            user.email = email;
        }
        if let Some(hash) = changes.password_hash {
            user.password_hash = hash;
        }
        if let Some(role_id) = changes.role_id {
            user.role_id = role_id;
        }
        let user = user.clone();
        Ok(store.profile(&user))
    }

    async fn delete_user(&self, id: i64) -> RepoResult<bool> {
        Ok(self.store.lock().await.users.remove(&id).is_some())
    }

    async fn get_role(&self, id: i64) -> RepoResult<Option<Role>> {
        Ok(self.store.lock().await.roles.get(&id).cloned())
    }

    async fn get_role_by_name(&self, name: &str) -> RepoResult<Option<Role>> {
        let store = self.store.lock().await;
        Ok(store.roles.values().find(|r| r.name == name).cloned())
    }

    async fn list_roles(&self) -> RepoResult<Vec<Role>> {
        Ok(self.store.lock().await.roles.values().cloned().collect())
    }

    async fn create_role(&self, name: &str) -> RepoResult<Role> {
        let mut store = self.store.lock().await;
        if store.role_name_taken(name, None) {
            return Err(RepoError::Conflict(format!("Role '{}' already exists", name)));
        }
        let role = Role {
            id: store.next_id(),
            name: name.to_string(),
        };
        store.roles.insert(role.id, role.clone());
        Ok(role)
    }

    async fn update_role(&self, id: i64, name: &str) -> RepoResult<Option<Role>> {
        let mut store = self.store.lock().await;
        if store.role_name_taken(name, Some(id)) {
            return Err(RepoError::Conflict(format!("Role '{}' already exists", name)));
        }
        Ok(store.roles.get_mut(&id).map(|role| {
            role.name = name.to_string();
            role.clone()
        }))
    }

    async fn delete_role(&self, id: i64) -> RepoResult<Option<RoleDeletion>> {
        let mut store = self.store.lock().await;
        let Some(role) = store.roles.get(&id).cloned() else {
            return Ok(None);
        };

        let holders = store.users.values().filter(|u| u.role_id == id).count();
        if holders > 0 {
            return Err(RepoError::Conflict(format!(
                "Role '{}' is still assigned to {} user(s)",
                role.name, holders
            )));
        }

        let grant_ids: Vec<i64> = store
            .role_permissions
            .values()
            .filter(|rp| rp.role_id == id)
            .map(|rp| rp.id)
            .collect();
        let role_permissions = grant_ids
            .into_iter()
            .filter_map(|grant_id| store.role_permissions.remove(&grant_id))
            .collect();
        store.roles.remove(&id);

        Ok(Some(RoleDeletion {
            role,
            role_permissions,
        }))
    }

    async fn list_permissions(&self) -> RepoResult<Vec<Permission>> {
        Ok(self.store.lock().await.permissions.values().cloned().collect())
    }

    async fn get_permission(&self, id: i64) -> RepoResult<Option<Permission>> {
        Ok(self.store.lock().await.permissions.get(&id).cloned())
    }

    async fn sync_permissions(&self, registry: &[PermissionId]) -> RepoResult<()> {
        let mut store = self.store.lock().await;
        for permission in registry {
            store.permissions.insert(
                permission.id(),
                Permission {
                    id: permission.id(),
                    name: permission.name().to_string(),
                },
            );
        }
        Ok(())
    }

    async fn role_has_any_permission(
        &self,
        role_id: i64,
        permissions: &[PermissionId],
    ) -> RepoResult<bool> {
        let store = self.store.lock().await;
        Ok(store.role_permissions.values().any(|rp| {
            rp.role_id == role_id && permissions.iter().any(|p| p.id() == rp.permission_id)
        }))
    }

    async fn attach_permission(
        &self,
        role_id: i64,
        permission_id: i64,
    ) -> RepoResult<RolePermission> {
        let mut store = self.store.lock().await;
        if !store.roles.contains_key(&role_id) || !store.permissions.contains_key(&permission_id) {
            return Err(RepoError::Conflict(
                "Role or permission does not exist".to_string(),
            ));
        }
        let exists = store
            .role_permissions
            .values()
            .any(|rp| rp.role_id == role_id && rp.permission_id == permission_id);
        if exists {
            return Err(RepoError::Conflict(format!(
                "Permission {} is already granted to role {}",
                permission_id, role_id
            )));
        }

        let grant = RolePermission {
            id: store.next_id(),
            role_id,
            permission_id,
        };
        store.role_permissions.insert(grant.id, grant.clone());
        Ok(grant)
    }

    async fn detach_permission(
        &self,
        role_id: i64,
        permission_id: i64,
    ) -> RepoResult<Option<RolePermission>> {
        let mut store = self.store.lock().await;
        let grant_id = store
            .role_permissions
            .values()
            .find(|rp| rp.role_id == role_id && rp.permission_id == permission_id)
            .map(|rp| rp.id);
        Ok(grant_id.and_then(|id| store.role_permissions.remove(&id)))
    }

    async fn list_items(&self) -> RepoResult<Vec<InventoryItem>> {
        Ok(self.store.lock().await.items.values().cloned().collect())
    }

    async fn get_item(&self, id: i64) -> RepoResult<Option<InventoryItem>> {
        Ok(self.store.lock().await.items.get(&id).cloned())
    }

    async fn create_item(&self, item: NewItem) -> RepoResult<InventoryItem> {
        let mut store = self.store.lock().await;
        let now = Utc::now();
        let created = InventoryItem {
            id: store.next_id(),
            name: item.name,
            description: item.description,
            quantity: item.quantity,
            created_at: now,
            updated_at: now,
        };
        store.items.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_item(&self, id: i64, changes: ItemChanges) -> RepoResult<Option<InventoryItem>> {
        let mut store = self.store.lock().await;
        Ok(store.items.get_mut(&id).map(|item| {
            if let Some(name) = changes.name {
                item.name = name;
            }
            if let Some(description) = changes.description {
                item.description = Some(description);
            }
            if let Some(quantity) = changes.quantity {
                item.quantity = quantity;
            }
            item.updated_at = Utc::now();
            item.clone()
        }))
    }

    async fn delete_item(&self, id: i64) -> RepoResult<bool> {
        Ok(self.store.lock().await.items.remove(&id).is_some())
    }

    async fn sell_item(&self, id: i64, quantity: i32) -> RepoResult<SellOutcome> {
        let mut store = self.store.lock().await;
        let Some(item) = store.items.get_mut(&id) else {
            return Ok(SellOutcome::NotFound);
        };
        if quantity > item.quantity {
            return Ok(SellOutcome::Insufficient {
                available: item.quantity,
            });
        }
        item.quantity -= quantity;
        item.updated_at = Utc::now();
        Ok(SellOutcome::Sold(item.clone()))
    }
}
