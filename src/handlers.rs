use crate::{
    AppState,
    auth::{self, Caller},
    authz::{self, Decision, Principal, Requirement},
    error::ApiError,
    models::{
        AttachPermissionRequest, CreateItemRequest, CreateUserRequest, InventoryListResponse,
        ItemChanges, ItemDetailResponse, ItemResponse, LoginRequest, LoginResponse,
        MessageResponse, NewItem, NewItemResponse, NewUser, Permission, RoleDeletedResponse,
        RoleListResponse, RolePermissionResponse, RoleRequest, RoleResponse, SellItemRequest,
        SellOutcome, UpdateItemRequest, UpdateUserRequest, UserChanges, UserListResponse,
        UserProfile, UserResponse,
    },
    password,
    permissions::{self, INVENTORY_READ, INVENTORY_WRITE, PermissionId},
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

// --- Shared Guards & Validation ---

/// require
///
/// Runs the authorization check for `caller` and turns a denial into a 403 carrying
/// `denied_message`. An unresolvable caller surfaces as 404 through `ApiError`'s
/// `From<AuthzError>`.
async fn require(
    state: &AppState,
    caller: &Caller,
    requirement: Requirement<'_>,
    denied_message: &str,
) -> Result<Principal, ApiError> {
    match authz::authorize(state.repo.as_ref(), &caller.identity, requirement).await? {
        Decision::Allowed(principal) => Ok(principal),
        Decision::Denied => Err(ApiError::Forbidden(denied_message.to_string())),
    }
}

/// A required text field: absent or blank counts as missing.
fn required_text(value: Option<String>) -> Result<String, ApiError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(ApiError::missing_information)
}

/// An optional text field: present-but-blank is rejected instead of silently kept.
fn optional_text(value: Option<String>) -> Result<Option<String>, ApiError> {
    match value {
        None => Ok(None),
        Some(v) if v.trim().is_empty() => Err(ApiError::Validation(
            "Fields cannot be empty".to_string(),
        )),
        Some(v) => Ok(Some(v.trim().to_string())),
    }
}

/// Rejects a role name that would shadow a seeded role.
fn unreserved_role_name(name: String) -> Result<String, ApiError> {
    if permissions::is_seeded_role_name(&name) {
        return Err(ApiError::Conflict("Role name is reserved".to_string()));
    }
    Ok(name)
}

/// Checks that a role exists and is not one of the seeded roles.
async fn mutable_role(state: &AppState, id: i64, denied_message: &str) -> Result<(), ApiError> {
    let role = state
        .repo
        .get_role(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Role not found".to_string()))?;
    if permissions::is_seeded_role_name(&role.name) {
        tracing::warn!(role_id = id, role = %role.name, "seeded role change refused");
        return Err(ApiError::Forbidden(denied_message.to_string()));
    }
    Ok(())
}

fn non_negative(quantity: i32) -> Result<i32, ApiError> {
    if quantity < 0 {
        return Err(ApiError::Validation(
            "Quantity cannot be negative".to_string(),
        ));
    }
    Ok(quantity)
}

// --- Authentication ---

/// login
///
/// [Public Route] Exchanges a username and password for a signed session token.
/// Unknown users and wrong passwords get the same 401.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = LoginResponse),
        (status = 400, description = "Missing information", body = String),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let username = required_text(payload.username)?;
    let secret = payload
        .password
        .filter(|p| !p.is_empty())
        .ok_or_else(ApiError::missing_information)?;

    let user = state.repo.get_user_by_username(&username).await?;
    let Some(user) = user.filter(|u| password::verify_password(&secret, &u.password_hash))
    else {
        tracing::warn!(%username, "login rejected");
        return Err(ApiError::Unauthorized(
            "Invalid username or password".to_string(),
        ));
    };

    let (token, expires_at) = auth::issue_token(&state.config, &user)?;
    tracing::info!(user_id = user.id, "session token issued");
    Ok(Json(LoginResponse {
        token,
        token_type: "Bearer".to_string(),
        expires_at,
    }))
}

// --- Inventory ---

/// create_item
///
/// [Authenticated Route] Adds an inventory item. Requires any inventory write permission.
#[utoipa::path(
    post,
    path = "/inventory",
    request_body = CreateItemRequest,
    responses(
        (status = 201, description = "Created", body = NewItemResponse),
        (status = 400, description = "Missing information", body = String),
        (status = 403, description = "Not permitted"),
        (status = 404, description = "Caller not found")
    )
)]
pub async fn create_item(
    caller: Caller,
    State(state): State<AppState>,
    Json(payload): Json<CreateItemRequest>,
) -> Result<(StatusCode, Json<NewItemResponse>), ApiError> {
    let name = required_text(payload.name)?;
    let quantity = non_negative(payload.quantity.ok_or_else(ApiError::missing_information)?)?;
    let description = payload
        .description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());

    let principal = require(
        &state,
        &caller,
        Requirement::AnyOf(INVENTORY_WRITE),
        "Unauthorized",
    )
    .await?;

    let new_item = state
        .repo
        .create_item(NewItem {
            name,
            description,
            quantity,
        })
        .await?;

    tracing::info!(item_id = new_item.id, user_id = principal.user.id, "inventory item created");
    Ok((
        StatusCode::CREATED,
        Json(NewItemResponse {
            message: "Inventory item created successfully".to_string(),
            new_item,
        }),
    ))
}

/// list_inventory
///
/// [Authenticated Route] Lists every inventory item. An empty inventory is a 404.
#[utoipa::path(
    get,
    path = "/inventory",
    responses(
        (status = 200, description = "All items", body = InventoryListResponse),
        (status = 403, description = "Not permitted"),
        (status = 404, description = "No inventory items found")
    )
)]
pub async fn list_inventory(
    caller: Caller,
    State(state): State<AppState>,
) -> Result<Json<InventoryListResponse>, ApiError> {
    require(&state, &caller, Requirement::AnyOf(INVENTORY_READ), "Unauthorized").await?;

    let inventory = state.repo.list_items().await?;
    if inventory.is_empty() {
        return Err(ApiError::NotFound("No inventory items found".to_string()));
    }
    Ok(Json(InventoryListResponse { inventory }))
}

/// get_item
///
/// [Authenticated Route] Retrieves a single inventory item.
#[utoipa::path(
    get,
    path = "/inventory/{id}",
    params(("id" = i64, Path, description = "Item ID")),
    responses(
        (status = 200, description = "Found", body = ItemDetailResponse),
        (status = 404, description = "Item not found")
    )
)]
pub async fn get_item(
    caller: Caller,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ItemDetailResponse>, ApiError> {
    require(&state, &caller, Requirement::AnyOf(INVENTORY_READ), "Unauthorized").await?;

    match state.repo.get_item(id).await? {
        Some(item) => Ok(Json(ItemDetailResponse { item })),
        None => Err(ApiError::NotFound("Item not found".to_string())),
    }
}

/// update_item
///
/// [Authenticated Route] Partially updates an item; omitted fields keep their value.
#[utoipa::path(
    put,
    path = "/inventory/{id}",
    params(("id" = i64, Path, description = "Item ID")),
    request_body = UpdateItemRequest,
    responses(
        (status = 200, description = "Updated", body = ItemResponse),
        (status = 404, description = "Item not found")
    )
)]
pub async fn update_item(
    caller: Caller,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateItemRequest>,
) -> Result<Json<ItemResponse>, ApiError> {
    let changes = ItemChanges {
        name: optional_text(payload.name)?,
        description: payload.description.map(|d| d.trim().to_string()),
        quantity: payload.quantity.map(non_negative).transpose()?,
    };

    let principal = require(
        &state,
        &caller,
        Requirement::AnyOf(INVENTORY_WRITE),
        "Unauthorized",
    )
    .await?;

    match state.repo.update_item(id, changes).await? {
        Some(inventory) => {
            tracing::info!(item_id = id, user_id = principal.user.id, "inventory item updated");
            Ok(Json(ItemResponse {
                message: "Inventory item updated successfully".to_string(),
                inventory,
            }))
        }
        None => Err(ApiError::NotFound("Item not found".to_string())),
    }
}

/// delete_item
///
/// [Authenticated Route] Removes an inventory item.
#[utoipa::path(
    delete,
    path = "/inventory/{id}",
    params(("id" = i64, Path, description = "Item ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 404, description = "Item not found")
    )
)]
pub async fn delete_item(
    caller: Caller,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    let principal = require(
        &state,
        &caller,
        Requirement::AnyOf(INVENTORY_WRITE),
        "Unauthorized",
    )
    .await?;

    if !state.repo.delete_item(id).await? {
        return Err(ApiError::NotFound("Item not found".to_string()));
    }
    tracing::info!(item_id = id, user_id = principal.user.id, "inventory item deleted");
    Ok(Json(MessageResponse {
        message: "Inventory item deleted successfully".to_string(),
    }))
}

/// sell_item
///
/// [Authenticated Route] Decrements stock by the requested quantity.
///
/// *Atomicity*: the stock check and the decrement happen in one store call, so
/// concurrent sales of the same item can never take stock below zero. Asking for
/// more than is available is a 400 and leaves stock unchanged.
#[utoipa::path(
    post,
    path = "/inventory/{id}/sell",
    params(("id" = i64, Path, description = "Item ID")),
    request_body = SellItemRequest,
    responses(
        (status = 200, description = "Sold", body = ItemResponse),
        (status = 400, description = "Missing information or insufficient quantity", body = String),
        (status = 404, description = "Item not found")
    )
)]
pub async fn sell_item(
    caller: Caller,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<SellItemRequest>,
) -> Result<Json<ItemResponse>, ApiError> {
    let quantity = payload.quantity.ok_or_else(ApiError::missing_information)?;
    if quantity <= 0 {
        return Err(ApiError::Validation(
            "Quantity must be greater than zero".to_string(),
        ));
    }

    let principal = require(
        &state,
        &caller,
        Requirement::AnyOf(INVENTORY_WRITE),
        "Unauthorized",
    )
    .await?;

    match state.repo.sell_item(id, quantity).await? {
        SellOutcome::Sold(inventory) => {
            tracing::info!(
                item_id = id,
                sold = quantity,
                remaining = inventory.quantity,
                user_id = principal.user.id,
                "inventory item sold"
            );
            Ok(Json(ItemResponse {
                message: "Item sold successfully".to_string(),
                inventory,
            }))
        }
        SellOutcome::Insufficient { available } => {
            tracing::info!(item_id = id, requested = quantity, available, "sale rejected");
            Err(ApiError::InvalidArgument("Insufficient quantity".to_string()))
        }
        SellOutcome::NotFound => Err(ApiError::NotFound("Item not found".to_string())),
    }
}

// --- Roles & Permissions ---

/// list_permissions
///
/// [Public Route] Lists every registered permission.
#[utoipa::path(
    get,
    path = "/permissions",
    responses((status = 200, description = "All permissions", body = [Permission]))
)]
pub async fn list_permissions(
    State(state): State<AppState>,
) -> Result<Json<Vec<Permission>>, ApiError> {
    Ok(Json(state.repo.list_permissions().await?))
}

/// list_roles
///
/// [Public Route] Lists every role.
#[utoipa::path(
    get,
    path = "/roles",
    responses((status = 200, description = "All roles", body = RoleListResponse))
)]
pub async fn list_roles(State(state): State<AppState>) -> Result<Json<RoleListResponse>, ApiError> {
    let roles = state.repo.list_roles().await?;
    Ok(Json(RoleListResponse {
        message: "Roles fetched successfully".to_string(),
        roles,
    }))
}

/// get_role
///
/// [Public Route] Retrieves a single role.
#[utoipa::path(
    get,
    path = "/roles/{id}",
    params(("id" = i64, Path, description = "Role ID")),
    responses(
        (status = 200, description = "Found", body = RoleResponse),
        (status = 404, description = "Role not found")
    )
)]
pub async fn get_role(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<RoleResponse>, ApiError> {
    match state.repo.get_role(id).await? {
        Some(role) => Ok(Json(RoleResponse {
            message: "Role fetched successfully".to_string(),
            role,
        })),
        None => Err(ApiError::NotFound("Role not found".to_string())),
    }
}

/// create_role
///
/// [Admin Route] Creates a role. Requires `RoleCreate`. Seeded role names are
/// reserved in any letter case.
#[utoipa::path(
    post,
    path = "/roles",
    request_body = RoleRequest,
    responses(
        (status = 201, description = "Created", body = RoleResponse),
        (status = 403, description = "Not permitted"),
        (status = 409, description = "Duplicate name")
    )
)]
pub async fn create_role(
    caller: Caller,
    State(state): State<AppState>,
    Json(payload): Json<RoleRequest>,
) -> Result<(StatusCode, Json<RoleResponse>), ApiError> {
    let name = required_text(payload.name)?;
    let principal = require(
        &state,
        &caller,
        Requirement::AnyOf(&[PermissionId::RoleCreate]),
        "You don't have the right to create a role",
    )
    .await?;
    let name = unreserved_role_name(name)?;

    let role = state.repo.create_role(&name).await?;
    tracing::info!(role_id = role.id, user_id = principal.user.id, "role created");
    Ok((
        StatusCode::CREATED,
        Json(RoleResponse {
            message: "Role created successfully".to_string(),
            role,
        }),
    ))
}

/// update_role
///
/// [Admin Route] Renames a role. Requires `RoleUpdate`. Seeded roles keep their
/// names, and no role may be renamed onto one.
#[utoipa::path(
    put,
    path = "/roles/{id}",
    params(("id" = i64, Path, description = "Role ID")),
    request_body = RoleRequest,
    responses(
        (status = 200, description = "Updated", body = RoleResponse),
        (status = 403, description = "Not permitted or seeded role"),
        (status = 404, description = "Role not found"),
        (status = 409, description = "Duplicate or reserved name")
    )
)]
pub async fn update_role(
    caller: Caller,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<RoleRequest>,
) -> Result<Json<RoleResponse>, ApiError> {
    let name = required_text(payload.name)?;
    require(
        &state,
        &caller,
        Requirement::AnyOf(&[PermissionId::RoleUpdate]),
        "You don't have the right to update a role",
    )
    .await?;
    mutable_role(&state, id, "Default roles cannot be renamed").await?;
    let name = unreserved_role_name(name)?;

    match state.repo.update_role(id, &name).await? {
        Some(role) => Ok(Json(RoleResponse {
            message: "Role updated successfully".to_string(),
            role,
        })),
        None => Err(ApiError::NotFound("Role not found".to_string())),
    }
}

/// delete_role
///
/// [Admin Route] Deletes a role and, first, every permission granted to it.
/// Requires `RoleDelete`. Seeded roles cannot be deleted; a role still assigned
/// to users is a 409.
#[utoipa::path(
    delete,
    path = "/roles/{id}",
    params(("id" = i64, Path, description = "Role ID")),
    responses(
        (status = 200, description = "Deleted", body = RoleDeletedResponse),
        (status = 403, description = "Not permitted or seeded role"),
        (status = 404, description = "Role not found"),
        (status = 409, description = "Role still assigned")
    )
)]
pub async fn delete_role(
    caller: Caller,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<RoleDeletedResponse>, ApiError> {
    require(
        &state,
        &caller,
        Requirement::AnyOf(&[PermissionId::RoleDelete]),
        "You don't have the right to delete a role",
    )
    .await?;
    mutable_role(&state, id, "Default roles cannot be deleted").await?;

    match state.repo.delete_role(id).await? {
        Some(deleted) => Ok(Json(RoleDeletedResponse {
            message: "Role deleted successfully".to_string(),
            role: deleted.role,
            role_permissions: deleted.role_permissions,
        })),
        None => Err(ApiError::NotFound("Role not found".to_string())),
    }
}

/// attach_permission
///
/// [Admin Route] Grants a permission to a role. Requires `RolePermissionManage`.
#[utoipa::path(
    post,
    path = "/roles/{id}/permissions",
    params(("id" = i64, Path, description = "Role ID")),
    request_body = AttachPermissionRequest,
    responses(
        (status = 200, description = "Granted", body = RolePermissionResponse),
        (status = 404, description = "Role or permission not found"),
        (status = 409, description = "Already granted")
    )
)]
pub async fn attach_permission(
    caller: Caller,
    State(state): State<AppState>,
    Path(role_id): Path<i64>,
    Json(payload): Json<AttachPermissionRequest>,
) -> Result<Json<RolePermissionResponse>, ApiError> {
    let permission_id = payload
        .permission_id
        .ok_or_else(ApiError::missing_information)?;
    require(
        &state,
        &caller,
        Requirement::AnyOf(&[PermissionId::RolePermissionManage]),
        "You don't have the right to add a permission to a role",
    )
    .await?;

    if state.repo.get_role(role_id).await?.is_none() {
        return Err(ApiError::NotFound("Role not found".to_string()));
    }
    if state.repo.get_permission(permission_id).await?.is_none() {
        return Err(ApiError::NotFound("Permission not found".to_string()));
    }

    let role_permission = state
        .repo
        .attach_permission(role_id, permission_id)
        .await?;
    tracing::info!(role_id, permission_id, "permission granted to role");
    Ok(Json(RolePermissionResponse {
        message: "Permission added to role successfully".to_string(),
        role_permission,
    }))
}

/// detach_permission
///
/// [Admin Route] Revokes a permission from a role. Requires `RolePermissionManage`.
#[utoipa::path(
    delete,
    path = "/roles/{id}/permissions/{permission_id}",
    params(
        ("id" = i64, Path, description = "Role ID"),
        ("permission_id" = i64, Path, description = "Permission ID")
    ),
    responses(
        (status = 200, description = "Revoked", body = RolePermissionResponse),
        (status = 404, description = "Role permission not found")
    )
)]
pub async fn detach_permission(
    caller: Caller,
    State(state): State<AppState>,
    Path((role_id, permission_id)): Path<(i64, i64)>,
) -> Result<Json<RolePermissionResponse>, ApiError> {
    require(
        &state,
        &caller,
        Requirement::AnyOf(&[PermissionId::RolePermissionManage]),
        "You don't have the right to remove a permission from a role",
    )
    .await?;

    if state.repo.get_role(role_id).await?.is_none() {
        return Err(ApiError::NotFound("Role not found".to_string()));
    }

    match state.repo.detach_permission(role_id, permission_id).await? {
        Some(role_permission) => {
            tracing::info!(role_id, permission_id, "permission revoked from role");
            Ok(Json(RolePermissionResponse {
                message: "Permission removed from role successfully".to_string(),
                role_permission,
            }))
        }
        None => Err(ApiError::NotFound("Role permission not found".to_string())),
    }
}

// --- Users ---

fn user_response(status: StatusCode, message: &str, data: Option<UserProfile>) -> UserResponse {
    UserResponse {
        status_code: status.as_u16(),
        success: true,
        message: message.to_string(),
        data,
    }
}

/// get_me
///
/// [Authenticated Route] The caller's own profile.
#[utoipa::path(
    get,
    path = "/me",
    responses((status = 200, description = "Profile", body = UserResponse))
)]
pub async fn get_me(
    caller: Caller,
    State(state): State<AppState>,
) -> Result<Json<UserResponse>, ApiError> {
    let principal = authz::resolve(state.repo.as_ref(), &caller.identity).await?;
    let profile = state
        .repo
        .get_user_profile(principal.user.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    Ok(Json(user_response(
        StatusCode::OK,
        "User details fetched successfully",
        Some(profile),
    )))
}

/// list_users
///
/// [Admin Route] Lists every user. Elevated roles only.
#[utoipa::path(
    get,
    path = "/users",
    responses(
        (status = 200, description = "All users", body = UserListResponse),
        (status = 403, description = "Not elevated")
    )
)]
pub async fn list_users(
    caller: Caller,
    State(state): State<AppState>,
) -> Result<Json<UserListResponse>, ApiError> {
    require(
        &state,
        &caller,
        Requirement::Elevated,
        "You are not authorized to fetch all users",
    )
    .await?;

    let data = state.repo.list_users().await?;
    Ok(Json(UserListResponse {
        status_code: StatusCode::OK.as_u16(),
        success: true,
        message: "Users fetched successfully".to_string(),
        data,
    }))
}

/// create_user
///
/// [Admin Route] Creates a user. Elevated roles only. The password is stored as a
/// salted argon2 hash.
#[utoipa::path(
    post,
    path = "/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "Created", body = UserResponse),
        (status = 400, description = "Missing information", body = String),
        (status = 403, description = "Not elevated"),
        (status = 404, description = "Role not found"),
        (status = 409, description = "Username taken")
    )
)]
pub async fn create_user(
    caller: Caller,
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let username = required_text(payload.username)?;
    let email = required_text(payload.email)?;
    let secret = payload
        .password
        .filter(|p| !p.is_empty())
        .ok_or_else(ApiError::missing_information)?;
    let role_id = payload.role_id.ok_or_else(ApiError::missing_information)?;

    let principal = require(
        &state,
        &caller,
        Requirement::Elevated,
        "You are not authorized to create a user",
    )
    .await?;

    if state.repo.get_role(role_id).await?.is_none() {
        return Err(ApiError::NotFound("Role not found".to_string()));
    }

    let created = state
        .repo
        .create_user(NewUser {
            username,
            email,
            password_hash: password::hash_password(&secret)?,
            role_id,
        })
        .await?;

    tracing::info!(user_id = created.id, created_by = principal.user.id, "user created");
    Ok((
        StatusCode::CREATED,
        Json(user_response(
            StatusCode::CREATED,
            "User created successfully",
            Some(created),
        )),
    ))
}

/// get_user
///
/// [Authenticated Route] Retrieves a user. Elevated roles may read any record;
/// everyone else only their own.
#[utoipa::path(
    get,
    path = "/users/{id}",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "Found", body = UserResponse),
        (status = 403, description = "Not elevated and not self"),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user(
    caller: Caller,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<UserResponse>, ApiError> {
    require(
        &state,
        &caller,
        Requirement::ElevatedOrSelf(id),
        "You are not authorized to fetch user details",
    )
    .await?;

    match state.repo.get_user_profile(id).await? {
        Some(profile) => Ok(Json(user_response(
            StatusCode::OK,
            "User details fetched successfully",
            Some(profile),
        ))),
        None => Err(ApiError::NotFound("User not found".to_string())),
    }
}

/// update_user
///
/// [Authenticated Route] Partially updates a user. Elevated roles may update any
/// record; everyone else only their own, and only elevated roles may change a
/// user's role. Echoing back the caller's current role is not a change.
#[utoipa::path(
    put,
    path = "/users/{id}",
    params(("id" = i64, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated", body = UserResponse),
        (status = 403, description = "Not permitted"),
        (status = 404, description = "User or role not found"),
        (status = 409, description = "Username taken")
    )
)]
pub async fn update_user(
    caller: Caller,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let username = optional_text(payload.username)?;
    let email = optional_text(payload.email)?;
    let secret = match payload.password {
        Some(p) if p.is_empty() => {
            return Err(ApiError::Validation("Fields cannot be empty".to_string()));
        }
        other => other,
    };

    let principal = require(
        &state,
        &caller,
        Requirement::ElevatedOrSelf(id),
        "You are not authorized to update user details",
    )
    .await?;

    if let Some(role_id) = payload.role_id {
        if !principal.is_elevated() && role_id != principal.user.role_id {
            return Err(ApiError::Forbidden(
                "You are not authorized to change a user's role".to_string(),
            ));
        }
        if state.repo.get_role(role_id).await?.is_none() {
            return Err(ApiError::NotFound("Role not found".to_string()));
        }
    }

    let changes = UserChanges {
        username,
        email,
        password_hash: secret.as_deref().map(password::hash_password).transpose()?,
        role_id: payload.role_id,
    };

    match state.repo.update_user(id, changes).await? {
        Some(profile) => {
            tracing::info!(user_id = id, updated_by = principal.user.id, "user updated");
            Ok(Json(user_response(
                StatusCode::OK,
                "User details updated successfully",
                Some(profile),
            )))
        }
        None => Err(ApiError::NotFound("User not found".to_string())),
    }
}

/// delete_user
///
/// [Admin Route] Deletes a user. Elevated roles only.
#[utoipa::path(
    delete,
    path = "/users/{id}",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "Deleted", body = UserResponse),
        (status = 403, description = "Not elevated"),
        (status = 404, description = "User not found")
    )
)]
pub async fn delete_user(
    caller: Caller,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<UserResponse>, ApiError> {
    let principal = require(
        &state,
        &caller,
        Requirement::Elevated,
        "You are not authorized to delete user",
    )
    .await?;

    if !state.repo.delete_user(id).await? {
        return Err(ApiError::NotFound("User not found".to_string()));
    }
    tracing::info!(user_id = id, deleted_by = principal.user.id, "user deleted");
    Ok(Json(user_response(
        StatusCode::OK,
        "User deleted successfully",
        None,
    )))
}
