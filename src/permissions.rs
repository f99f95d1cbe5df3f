//! Permission registry.
//!
//! Every permission id the API checks is named here. Handlers and the
//! bootstrap seed refer to these variants; numeric ids never appear elsewhere.

/// PermissionId
///
/// The stable identifier of a capability. The discriminant is the primary key
/// of the matching row in the `permissions` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(i64)]
pub enum PermissionId {
    UserCreate = 1,
    UserView = 2,
    UserUpdate = 3,
    UserDelete = 4,
    RoleCreate = 5,
    RoleView = 6,
    RoleUpdate = 7,
    RoleDelete = 8,
    RolePermissionManage = 9,
    InventoryView = 10,
    InventoryCreate = 11,
    InventoryUpdate = 12,
    InventoryDelete = 13,
    InventorySell = 14,
}

impl PermissionId {
    /// Every registered permission, in id order.
    pub const ALL: [PermissionId; 14] = [
        PermissionId::UserCreate,
        PermissionId::UserView,
        PermissionId::UserUpdate,
        PermissionId::UserDelete,
        PermissionId::RoleCreate,
        PermissionId::RoleView,
        PermissionId::RoleUpdate,
        PermissionId::RoleDelete,
        PermissionId::RolePermissionManage,
        PermissionId::InventoryView,
        PermissionId::InventoryCreate,
        PermissionId::InventoryUpdate,
        PermissionId::InventoryDelete,
        PermissionId::InventorySell,
    ];

    pub const fn id(self) -> i64 {
        self as i64
    }

    /// Human-readable name stored alongside the id.
    pub const fn name(self) -> &'static str {
        match self {
            PermissionId::UserCreate => "create user",
            PermissionId::UserView => "view user",
            PermissionId::UserUpdate => "update user",
            PermissionId::UserDelete => "delete user",
            PermissionId::RoleCreate => "create role",
            PermissionId::RoleView => "view role",
            PermissionId::RoleUpdate => "update role",
            PermissionId::RoleDelete => "delete role",
            PermissionId::RolePermissionManage => "manage role permissions",
            PermissionId::InventoryView => "view inventory",
            PermissionId::InventoryCreate => "create inventory",
            PermissionId::InventoryUpdate => "update inventory",
            PermissionId::InventoryDelete => "delete inventory",
            PermissionId::InventorySell => "sell inventory",
        }
    }
}

/// Any of these grants inventory mutations (create, update, delete, sell).
pub const INVENTORY_WRITE: &[PermissionId] = &[
    PermissionId::RolePermissionManage,
    PermissionId::InventoryCreate,
    PermissionId::InventoryUpdate,
    PermissionId::InventoryDelete,
    PermissionId::InventorySell,
];

/// Any of these grants inventory reads. A superset of `INVENTORY_WRITE`.
pub const INVENTORY_READ: &[PermissionId] = &[
    PermissionId::RolePermissionManage,
    PermissionId::InventoryView,
    PermissionId::InventoryCreate,
    PermissionId::InventoryUpdate,
    PermissionId::InventoryDelete,
    PermissionId::InventorySell,
];

pub const SUPERADMIN: &str = "superadmin";
pub const ADMIN: &str = "admin";
pub const STAFF: &str = "staff";

/// Roles exempt from ownership restrictions on user records.
pub const ELEVATED_ROLES: &[&str] = &[SUPERADMIN, ADMIN];

/// Roles created by the bootstrap seed. They cannot be renamed or deleted, and no
/// other role may take their name in any letter case.
pub const SEEDED_ROLES: &[&str] = &[SUPERADMIN, ADMIN, STAFF];

/// Elevation follows the exact seeded name only.
pub fn is_elevated_role(name: &str) -> bool {
    ELEVATED_ROLES.contains(&name)
}

pub fn is_seeded_role_name(name: &str) -> bool {
    SEEDED_ROLES
        .iter()
        .any(|seeded| seeded.eq_ignore_ascii_case(name.trim()))
}
