use crate::models::{
    InventoryItem, ItemChanges, NewItem, NewUser, Permission, Role, RoleDeletion, RolePermission,
    SellOutcome, User, UserChanges, UserProfile,
};
use crate::permissions::PermissionId;
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use thiserror::Error;

/// RepoError
///
/// Store-layer failure. `Conflict` covers constraint violations the caller can act
/// on (duplicate names, rows still referenced); everything else is `Database`.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Conflict(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository Trait
///
/// Abstract contract for all persistence operations. Handlers and the
/// authorization check only ever see `Arc<dyn Repository>`, so the Postgres store
/// and the in-memory store are interchangeable.
///
/// Every check-then-mutate sequence that must not race (selling stock, deleting a
/// role with its grants) is a single method here so the implementation can make it
/// atomic.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user(&self, id: i64) -> RepoResult<Option<User>>;
    async fn get_user_by_username(&self, username: &str) -> RepoResult<Option<User>>;
    async fn get_user_profile(&self, id: i64) -> RepoResult<Option<UserProfile>>;
    async fn list_users(&self) -> RepoResult<Vec<UserProfile>>;
    // Conflict if the username is taken.
    async fn create_user(&self, user: NewUser) -> RepoResult<UserProfile>;
    // Partial update; `None` when the user does not exist.
    async fn update_user(&self, id: i64, changes: UserChanges) -> RepoResult<Option<UserProfile>>;
    async fn delete_user(&self, id: i64) -> RepoResult<bool>;

    // --- Roles ---
    async fn get_role(&self, id: i64) -> RepoResult<Option<Role>>;
    async fn get_role_by_name(&self, name: &str) -> RepoResult<Option<Role>>;
    async fn list_roles(&self) -> RepoResult<Vec<Role>>;
    async fn create_role(&self, name: &str) -> RepoResult<Role>;
    async fn update_role(&self, id: i64, name: &str) -> RepoResult<Option<Role>>;
    /// Deletes the role's associations, then the role, atomically.
    /// Conflict if any user still holds the role.
    async fn delete_role(&self, id: i64) -> RepoResult<Option<RoleDeletion>>;

    // --- Permissions ---
    async fn list_permissions(&self) -> RepoResult<Vec<Permission>>;
    async fn get_permission(&self, id: i64) -> RepoResult<Option<Permission>>;
    /// Upserts the registry so the `permissions` table mirrors `PermissionId`.
    async fn sync_permissions(&self, registry: &[PermissionId]) -> RepoResult<()>;
    /// True if the role holds at least one of `permissions`.
    async fn role_has_any_permission(
        &self,
        role_id: i64,
        permissions: &[PermissionId],
    ) -> RepoResult<bool>;
    /// Conflict if the pair already exists.
    async fn attach_permission(&self, role_id: i64, permission_id: i64)
    -> RepoResult<RolePermission>;
    async fn detach_permission(
        &self,
        role_id: i64,
        permission_id: i64,
    ) -> RepoResult<Option<RolePermission>>;

    // --- Inventory ---
    async fn list_items(&self) -> RepoResult<Vec<InventoryItem>>;
    async fn get_item(&self, id: i64) -> RepoResult<Option<InventoryItem>>;
    async fn create_item(&self, item: NewItem) -> RepoResult<InventoryItem>;
    async fn update_item(&self, id: i64, changes: ItemChanges) -> RepoResult<Option<InventoryItem>>;
    async fn delete_item(&self, id: i64) -> RepoResult<bool>;
    /// Decrements stock by `quantity` only if enough is available.
    async fn sell_item(&self, id: i64, quantity: i32) -> RepoResult<SellOutcome>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The `Repository` implementation backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Maps unique and foreign-key violations to `Conflict`; anything else stays a
/// database error.
fn constraint_error(e: sqlx::Error, conflict: impl Into<String>) -> RepoError {
    match e.as_database_error() {
        Some(db) if db.is_unique_violation() || db.is_foreign_key_violation() => {
            RepoError::Conflict(conflict.into())
        }
        _ => RepoError::Database(e),
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    // --- USERS ---

    async fn get_user(&self, id: i64) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, email, password_hash, role_id FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn get_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, email, password_hash, role_id FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// get_user_profile
    ///
    /// Joins the user with its role so the response carries the role name.
    async fn get_user_profile(&self, id: i64) -> RepoResult<Option<UserProfile>> {
        let profile = sqlx::query_as::<_, UserProfile>(
            r#"
            SELECT u.id, u.username, u.email, u.role_id, r.name AS role
            FROM users u JOIN roles r ON r.id = u.role_id
            WHERE u.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(profile)
    }

    async fn list_users(&self) -> RepoResult<Vec<UserProfile>> {
        let users = sqlx::query_as::<_, UserProfile>(
            r#"
            SELECT u.id, u.username, u.email, u.role_id, r.name AS role
            FROM users u JOIN roles r ON r.id = u.role_id
            ORDER BY u.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    /// create_user
    ///
    /// Inserts and joins the role in one statement (CTE) to return the profile.
    async fn create_user(&self, user: NewUser) -> RepoResult<UserProfile> {
        sqlx::query_as::<_, UserProfile>(
            r#"
            WITH inserted AS (
                INSERT INTO users (username, email, password_hash, role_id)
                VALUES ($1, $2, $3, $4)
                RETURNING id, username, email, role_id
            )
            SELECT i.id, i.username, i.email, i.role_id, r.name AS role
            FROM inserted i JOIN roles r ON r.id = i.role_id
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| constraint_error(e, format!("Username '{}' is already taken", user.username)))
    }

    /// update_user
    ///
    /// `COALESCE` keeps every column whose change is `None`.
    async fn update_user(&self, id: i64, changes: UserChanges) -> RepoResult<Option<UserProfile>> {
        sqlx::query_as::<_, UserProfile>(
            r#"
            WITH updated AS (
                UPDATE users
                SET username = COALESCE($2, username),
                    email = COALESCE($3, email),
                    password_hash = COALESCE($4, password_hash),
                    role_id = COALESCE($5, role_id)
                WHERE id = $1
                RETURNING id, username, email, role_id
            )
            SELECT u.id, u.username, u.email, u.role_id, r.name AS role
            FROM updated u JOIN roles r ON r.id = u.role_id
            "#,
        )
        .bind(id)
        .bind(changes.username)
        .bind(changes.email)
        .bind(changes.password_hash)
        .bind(changes.role_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| constraint_error(e, "Username is taken or role does not exist"))
    }

    async fn delete_user(&self, id: i64) -> RepoResult<bool> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    // --- ROLES ---

    async fn get_role(&self, id: i64) -> RepoResult<Option<Role>> {
        let role = sqlx::query_as::<_, Role>("SELECT id, name FROM roles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(role)
    }

    async fn get_role_by_name(&self, name: &str) -> RepoResult<Option<Role>> {
        let role = sqlx::query_as::<_, Role>("SELECT id, name FROM roles WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(role)
    }

    async fn list_roles(&self) -> RepoResult<Vec<Role>> {
        let roles = sqlx::query_as::<_, Role>("SELECT id, name FROM roles ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(roles)
    }

    async fn create_role(&self, name: &str) -> RepoResult<Role> {
        sqlx::query_as::<_, Role>("INSERT INTO roles (name) VALUES ($1) RETURNING id, name")
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| constraint_error(e, format!("Role '{}' already exists", name)))
    }

    async fn update_role(&self, id: i64, name: &str) -> RepoResult<Option<Role>> {
        sqlx::query_as::<_, Role>("UPDATE roles SET name = $2 WHERE id = $1 RETURNING id, name")
            .bind(id)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| constraint_error(e, format!("Role '{}' already exists", name)))
    }

    /// delete_role
    ///
    /// Runs in one transaction with the role row locked: the holder check, the
    /// association delete and the role delete either all apply or none do.
    async fn delete_role(&self, id: i64) -> RepoResult<Option<RoleDeletion>> {
        let mut tx = self.pool.begin().await?;

        let Some(role) =
            sqlx::query_as::<_, Role>("SELECT id, name FROM roles WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
        else {
            return Ok(None);
        };

        let holders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role_id = $1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        if holders > 0 {
            return Err(RepoError::Conflict(format!(
                "Role '{}' is still assigned to {} user(s)",
                role.name, holders
            )));
        }

        let role_permissions = sqlx::query_as::<_, RolePermission>(
            "DELETE FROM role_permissions WHERE role_id = $1 RETURNING id, role_id, permission_id",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| constraint_error(e, format!("Role '{}' is still in use", role.name)))?;

        tx.commit().await?;

        tracing::info!(
            role_id = id,
            removed_grants = role_permissions.len(),
            "role deleted"
        );
        Ok(Some(RoleDeletion {
            role,
            role_permissions,
        }))
    }

    // --- PERMISSIONS ---

    async fn list_permissions(&self) -> RepoResult<Vec<Permission>> {
        let permissions =
            sqlx::query_as::<_, Permission>("SELECT id, name FROM permissions ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
        Ok(permissions)
    }

    async fn get_permission(&self, id: i64) -> RepoResult<Option<Permission>> {
        let permission =
            sqlx::query_as::<_, Permission>("SELECT id, name FROM permissions WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(permission)
    }

    async fn sync_permissions(&self, registry: &[PermissionId]) -> RepoResult<()> {
        let mut tx = self.pool.begin().await?;
        for permission in registry {
            sqlx::query(
                "INSERT INTO permissions (id, name) VALUES ($1, $2) \
                 ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name",
            )
            .bind(permission.id())
            .bind(permission.name())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// role_has_any_permission
    ///
    /// Disjunctive check: one matching grant is enough.
    async fn role_has_any_permission(
        &self,
        role_id: i64,
        permissions: &[PermissionId],
    ) -> RepoResult<bool> {
        let ids: Vec<i64> = permissions.iter().map(|p| p.id()).collect();
        let granted: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM role_permissions WHERE role_id = $1 AND permission_id = ANY($2))",
        )
        .bind(role_id)
        .bind(ids)
        .fetch_one(&self.pool)
        .await?;
        Ok(granted)
    }

    /// attach_permission
    ///
    /// `ON CONFLICT DO NOTHING` makes a duplicate grant return no row, reported as
    /// `Conflict`.
    async fn attach_permission(
        &self,
        role_id: i64,
        permission_id: i64,
    ) -> RepoResult<RolePermission> {
        let inserted = sqlx::query_as::<_, RolePermission>(
            r#"
            INSERT INTO role_permissions (role_id, permission_id) VALUES ($1, $2)
            ON CONFLICT (role_id, permission_id) DO NOTHING
            RETURNING id, role_id, permission_id
            "#,
        )
        .bind(role_id)
        .bind(permission_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| constraint_error(e, "Role or permission does not exist"))?;

        inserted.ok_or_else(|| {
            RepoError::Conflict(format!(
                "Permission {} is already granted to role {}",
                permission_id, role_id
            ))
        })
    }

    async fn detach_permission(
        &self,
        role_id: i64,
        permission_id: i64,
    ) -> RepoResult<Option<RolePermission>> {
        let removed = sqlx::query_as::<_, RolePermission>(
            "DELETE FROM role_permissions WHERE role_id = $1 AND permission_id = $2 \
             RETURNING id, role_id, permission_id",
        )
        .bind(role_id)
        .bind(permission_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(removed)
    }

    // --- INVENTORY ---

    async fn list_items(&self) -> RepoResult<Vec<InventoryItem>> {
        let items = sqlx::query_as::<_, InventoryItem>(
            "SELECT id, name, description, quantity, created_at, updated_at FROM inventory ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    async fn get_item(&self, id: i64) -> RepoResult<Option<InventoryItem>> {
        let item = sqlx::query_as::<_, InventoryItem>(
            "SELECT id, name, description, quantity, created_at, updated_at FROM inventory WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(item)
    }

    async fn create_item(&self, item: NewItem) -> RepoResult<InventoryItem> {
        let created = sqlx::query_as::<_, InventoryItem>(
            r#"
            INSERT INTO inventory (name, description, quantity, created_at, updated_at)
            VALUES ($1, $2, $3, NOW(), NOW())
            RETURNING id, name, description, quantity, created_at, updated_at
            "#,
        )
        .bind(item.name)
        .bind(item.description)
        .bind(item.quantity)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn update_item(&self, id: i64, changes: ItemChanges) -> RepoResult<Option<InventoryItem>> {
        let updated = sqlx::query_as::<_, InventoryItem>(
            r#"
            UPDATE inventory
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                quantity = COALESCE($4, quantity),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, description, quantity, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(changes.name)
        .bind(changes.description)
        .bind(changes.quantity)
        .fetch_optional(&self.pool)
        .await?;
        Ok(updated)
    }

    async fn delete_item(&self, id: i64) -> RepoResult<bool> {
        let res = sqlx::query("DELETE FROM inventory WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    /// sell_item
    ///
    /// The stock check and the decrement are one conditional `UPDATE`, so two
    /// concurrent sells can never both pass the check against the same stock.
    /// The follow-up read only classifies a miss (unknown item vs. short stock).
    async fn sell_item(&self, id: i64, quantity: i32) -> RepoResult<SellOutcome> {
        let sold = sqlx::query_as::<_, InventoryItem>(
            r#"
            UPDATE inventory
            SET quantity = quantity - $2, updated_at = NOW()
            WHERE id = $1 AND quantity >= $2
            RETURNING id, name, description, quantity, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(quantity)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(item) = sold {
            return Ok(SellOutcome::Sold(item));
        }

        let available: Option<i32> =
            sqlx::query_scalar("SELECT quantity FROM inventory WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(match available {
            Some(available) => SellOutcome::Insufficient { available },
            None => SellOutcome::NotFound,
        })
    }
}
