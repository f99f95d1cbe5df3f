use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, de::Error as _};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// Canonical account record from the `users` table, including the credential.
/// Never returned to clients directly; handlers respond with `UserProfile`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default)]
pub struct User {
    pub id: i64,
    // Unique login name; also the identifier accepted by the local bypass header.
    pub username: String,
    pub email: String,
    // argon2 PHC string. Skipped on serialization so it cannot leak into a response.
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    // FK to roles.id. Every user holds exactly one role.
    pub role_id: i64,
}

/// UserProfile
///
/// Client-facing view of a user joined with its role name.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(rename = "roleID")]
    pub role_id: i64,
    // Name of the role referenced by `role_id`.
    pub role: String,
}

/// Role
///
/// A named group granting a set of permissions to its members (`roles` table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Role {
    pub id: i64,
    pub name: String,
}

/// Permission
///
/// An atomic capability row (`permissions` table). Ids mirror `PermissionId`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Permission {
    pub id: i64,
    pub name: String,
}

/// RolePermission
///
/// Association granting a permission to a role. `(role_id, permission_id)` is unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct RolePermission {
    pub id: i64,
    #[serde(rename = "roleID")]
    pub role_id: i64,
    #[serde(rename = "permissionID")]
    pub permission_id: i64,
}

/// InventoryItem
///
/// A stocked article from the `inventory` table. `quantity` is never negative.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub quantity: i32,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

// --- Store Inputs (validated, handler -> repository) ---

/// NewItem
///
/// A validated inventory insert. Built by the handler from `CreateItemRequest`.
#[derive(Debug, Clone, Default)]
pub struct NewItem {
    pub name: String,
    pub description: Option<String>,
    pub quantity: i32,
}

/// ItemChanges
///
/// Partial inventory update; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct ItemChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub quantity: Option<i32>,
}

/// NewUser
///
/// A validated user insert carrying an already hashed password.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role_id: i64,
}

/// UserChanges
///
/// Partial user update; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub role_id: Option<i64>,
}

/// SellOutcome
///
/// Result of the atomic conditional decrement performed by the store.
#[derive(Debug, Clone)]
pub enum SellOutcome {
    Sold(InventoryItem),
    /// Requested more than `available`; stock untouched.
    Insufficient { available: i32 },
    NotFound,
}

/// RoleDeletion
///
/// The role row and every association removed with it.
#[derive(Debug, Clone, Default)]
pub struct RoleDeletion {
    pub role: Role,
    pub role_permissions: Vec<RolePermission>,
}

// --- Request Payloads (Input Schemas) ---
// Required fields are still `Option` so a missing field maps to a 400
// "Missing information" instead of a generic deserialization rejection.

/// Accepts a quantity as a JSON integer or as a numeric string (`"10"`).
fn quantity_from_number_or_text<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Quantity {
        Number(i32),
        Text(String),
    }

    match Option::<Quantity>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Quantity::Number(n)) => Ok(Some(n)),
        Some(Quantity::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("invalid quantity `{text}`"))),
    }
}

/// CreateItemRequest
///
/// Input payload for POST /inventory.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateItemRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "quantity_from_number_or_text")]
    pub quantity: Option<i32>,
}

/// UpdateItemRequest
///
/// Partial update payload for PUT /inventory/{id}.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateItemRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "quantity_from_number_or_text"
    )]
    pub quantity: Option<i32>,
}

/// SellItemRequest
///
/// Input payload for POST /inventory/{id}/sell.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct SellItemRequest {
    #[serde(default, deserialize_with = "quantity_from_number_or_text")]
    pub quantity: Option<i32>,
}

/// RoleRequest
///
/// Input payload for creating or renaming a role.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RoleRequest {
    pub name: Option<String>,
}

/// AttachPermissionRequest
///
/// Input payload for POST /roles/{id}/permissions.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AttachPermissionRequest {
    #[serde(alias = "permissionID")]
    pub permission_id: Option<i64>,
}

/// CreateUserRequest
///
/// Input payload for POST /users. The password is hashed before it reaches the store.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    #[serde(alias = "roleID")]
    pub role_id: Option<i64>,
}

/// UpdateUserRequest
///
/// Partial update payload for PUT /users/{id}.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateUserRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", alias = "roleID")]
    pub role_id: Option<i64>,
}

/// LoginRequest
///
/// Input payload for POST /auth/login.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

// --- Response Schemas (Output) ---

/// LoginResponse
///
/// A signed session token for the `Authorization: Bearer` header.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub token_type: String,
    // Unix timestamp (seconds) after which the token is rejected.
    pub expires_at: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct NewItemResponse {
    pub message: String,
    pub new_item: InventoryItem,
}

/// ItemResponse
///
/// Returned by update and sell; the item sits under the `inventory` key.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ItemResponse {
    pub message: String,
    pub inventory: InventoryItem,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ItemDetailResponse {
    pub item: InventoryItem,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct InventoryListResponse {
    pub inventory: Vec<InventoryItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RoleResponse {
    pub message: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RoleListResponse {
    pub message: String,
    pub roles: Vec<Role>,
}

/// RoleDeletedResponse
///
/// The deleted role plus the associations removed before it.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct RoleDeletedResponse {
    pub message: String,
    pub role: Role,
    pub role_permissions: Vec<RolePermission>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct RolePermissionResponse {
    pub message: String,
    pub role_permission: RolePermission,
}

/// UserResponse
///
/// Envelope used by every user-administration endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub status_code: u16,
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<UserProfile>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct UserListResponse {
    pub status_code: u16,
    pub success: bool,
    pub message: String,
    pub data: Vec<UserProfile>,
}

/// ErrorBody
///
/// JSON body for every non-validation failure.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub status_code: u16,
    pub success: bool,
    pub message: String,
}
