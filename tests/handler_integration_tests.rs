mod common;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use common::{add_user, caller, fixture};
use poscal_api::{
    ApiError, handlers,
    models::{
        AttachPermissionRequest, CreateItemRequest, CreateUserRequest, RoleRequest,
        SellItemRequest, UpdateItemRequest, UpdateUserRequest,
    },
    permissions::PermissionId,
    repository::Repository,
};

fn widget(quantity: i32) -> CreateItemRequest {
    CreateItemRequest {
        name: Some("Widget".to_string()),
        description: Some("A test widget".to_string()),
        quantity: Some(quantity),
    }
}

fn sell(quantity: i32) -> SellItemRequest {
    SellItemRequest {
        quantity: Some(quantity),
    }
}

// --- Inventory ---

#[tokio::test]
async fn test_sell_decrements_and_rejects_oversell() {
    let fx = fixture().await;

    let (status, Json(created)) =
        handlers::create_item(caller("clerk"), State(fx.state.clone()), Json(widget(10)))
            .await
            .unwrap();
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created.message, "Inventory item created successfully");
    assert_eq!(created.new_item.quantity, 10);
    let id = created.new_item.id;

    let Json(sold) = handlers::sell_item(
        caller("clerk"),
        State(fx.state.clone()),
        Path(id),
        Json(sell(4)),
    )
    .await
    .unwrap();
    assert_eq!(sold.message, "Item sold successfully");
    assert_eq!(sold.inventory.quantity, 6);

    let err = handlers::sell_item(
        caller("clerk"),
        State(fx.state.clone()),
        Path(id),
        Json(sell(10)),
    )
    .await
    .unwrap_err();
    assert_eq!(err, ApiError::InvalidArgument("Insufficient quantity".to_string()));
    assert_eq!(err.status(), StatusCode::BAD_REQUEST);

    let Json(detail) = handlers::get_item(caller("viewer"), State(fx.state.clone()), Path(id))
        .await
        .unwrap();
    assert_eq!(detail.item.quantity, 6);
}

#[tokio::test]
async fn test_sell_entire_stock_reaches_zero() {
    let fx = fixture().await;
    let (_, Json(created)) =
        handlers::create_item(caller("root"), State(fx.state.clone()), Json(widget(3)))
            .await
            .unwrap();

    let Json(sold) = handlers::sell_item(
        caller("clerk"),
        State(fx.state.clone()),
        Path(created.new_item.id),
        Json(sell(3)),
    )
    .await
    .unwrap();
    assert_eq!(sold.inventory.quantity, 0);
}

#[tokio::test]
async fn test_sell_rejects_non_positive_and_missing_quantity() {
    let fx = fixture().await;
    let (_, Json(created)) =
        handlers::create_item(caller("root"), State(fx.state.clone()), Json(widget(5)))
            .await
            .unwrap();
    let id = created.new_item.id;

    for payload in [sell(0), sell(-2), SellItemRequest { quantity: None }] {
        let err = handlers::sell_item(caller("clerk"), State(fx.state.clone()), Path(id), Json(payload))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)), "got {:?}", err);
    }

    let item = fx.repo.get_item(id).await.unwrap().unwrap();
    assert_eq!(item.quantity, 5);
}

#[tokio::test]
async fn test_sell_unknown_item_is_not_found() {
    let fx = fixture().await;
    let err = handlers::sell_item(caller("clerk"), State(fx.state.clone()), Path(9999), Json(sell(1)))
        .await
        .unwrap_err();
    assert_eq!(err, ApiError::NotFound("Item not found".to_string()));
}

#[tokio::test]
async fn test_create_item_missing_fields() {
    let fx = fixture().await;

    let missing_name = CreateItemRequest {
        name: None,
        ..widget(1)
    };
    let err = handlers::create_item(caller("root"), State(fx.state.clone()), Json(missing_name))
        .await
        .unwrap_err();
    assert_eq!(err, ApiError::missing_information());

    let missing_quantity = CreateItemRequest {
        quantity: None,
        ..widget(1)
    };
    let err = handlers::create_item(caller("root"), State(fx.state.clone()), Json(missing_quantity))
        .await
        .unwrap_err();
    assert_eq!(err, ApiError::missing_information());

    let err = handlers::create_item(caller("root"), State(fx.state.clone()), Json(widget(-1)))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Validation(_)));

    assert!(fx.repo.list_items().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_read_only_role_cannot_write_inventory() {
    let fx = fixture().await;

    let err = handlers::create_item(caller("viewer"), State(fx.state.clone()), Json(widget(10)))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));
    assert!(fx.repo.list_items().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_role_without_permissions_cannot_read_inventory() {
    let fx = fixture().await;
    handlers::create_item(caller("root"), State(fx.state.clone()), Json(widget(1)))
        .await
        .unwrap();

    let err = handlers::list_inventory(caller("guest"), State(fx.state.clone()))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));
}

#[tokio::test]
async fn test_unknown_caller_is_not_found() {
    let fx = fixture().await;

    let err = handlers::create_item(caller("ghost"), State(fx.state.clone()), Json(widget(1)))
        .await
        .unwrap_err();
    assert_eq!(err, ApiError::NotFound("User not found".to_string()));
    assert!(fx.repo.list_items().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_inventory_is_not_found() {
    let fx = fixture().await;

    let err = handlers::list_inventory(caller("viewer"), State(fx.state.clone()))
        .await
        .unwrap_err();
    assert_eq!(err, ApiError::NotFound("No inventory items found".to_string()));
}

#[tokio::test]
async fn test_update_item_keeps_omitted_fields() {
    let fx = fixture().await;
    let (_, Json(created)) =
        handlers::create_item(caller("root"), State(fx.state.clone()), Json(widget(10)))
            .await
            .unwrap();

    let Json(updated) = handlers::update_item(
        caller("manager"),
        State(fx.state.clone()),
        Path(created.new_item.id),
        Json(UpdateItemRequest {
            quantity: Some(42),
            ..Default::default()
        }),
    )
    .await
    .unwrap();

    assert_eq!(updated.inventory.quantity, 42);
    assert_eq!(updated.inventory.name, "Widget");
    assert_eq!(updated.inventory.description.as_deref(), Some("A test widget"));
    assert!(updated.inventory.updated_at >= created.new_item.updated_at);
}

#[tokio::test]
async fn test_delete_item_then_lookup_fails() {
    let fx = fixture().await;
    let (_, Json(created)) =
        handlers::create_item(caller("root"), State(fx.state.clone()), Json(widget(1)))
            .await
            .unwrap();
    let id = created.new_item.id;

    let Json(deleted) = handlers::delete_item(caller("root"), State(fx.state.clone()), Path(id))
        .await
        .unwrap();
    assert_eq!(deleted.message, "Inventory item deleted successfully");

    let err = handlers::get_item(caller("root"), State(fx.state.clone()), Path(id))
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::NOT_FOUND);

    let err = handlers::delete_item(caller("root"), State(fx.state.clone()), Path(id))
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::NOT_FOUND);
}

// --- Roles & Permissions ---

#[tokio::test]
async fn test_role_lifecycle_and_cascade_delete() {
    let fx = fixture().await;

    let (status, Json(created)) = handlers::create_role(
        caller("root"),
        State(fx.state.clone()),
        Json(RoleRequest {
            name: Some("auditor".to_string()),
        }),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::CREATED);
    let role_id = created.role.id;

    let Json(granted) = handlers::attach_permission(
        caller("root"),
        State(fx.state.clone()),
        Path(role_id),
        Json(AttachPermissionRequest {
            permission_id: Some(PermissionId::InventoryView.id()),
        }),
    )
    .await
    .unwrap();
    assert_eq!(granted.role_permission.role_id, role_id);
    assert_eq!(granted.role_permission.permission_id, PermissionId::InventoryView.id());

    let Json(renamed) = handlers::update_role(
        caller("root"),
        State(fx.state.clone()),
        Path(role_id),
        Json(RoleRequest {
            name: Some("auditors".to_string()),
        }),
    )
    .await
    .unwrap();
    assert_eq!(renamed.role.name, "auditors");

    let Json(deleted) = handlers::delete_role(caller("root"), State(fx.state.clone()), Path(role_id))
        .await
        .unwrap();
    assert_eq!(deleted.role.id, role_id);
    assert_eq!(deleted.role_permissions.len(), 1);
    assert_eq!(deleted.role_permissions[0].permission_id, PermissionId::InventoryView.id());

    let err = handlers::get_role(State(fx.state.clone()), Path(role_id))
        .await
        .unwrap_err();
    assert_eq!(err, ApiError::NotFound("Role not found".to_string()));
    assert!(
        !fx.repo
            .role_has_any_permission(role_id, &PermissionId::ALL)
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn test_delete_role_still_assigned_is_conflict() {
    let fx = fixture().await;

    let err = handlers::delete_role(
        caller("root"),
        State(fx.state.clone()),
        Path(fx.viewer_role.id),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));

    // Nothing was removed.
    assert!(fx.repo.get_role(fx.viewer_role.id).await.unwrap().is_some());
    assert!(
        fx.repo
            .role_has_any_permission(fx.viewer_role.id, &[PermissionId::InventoryView])
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn test_duplicate_grant_is_conflict() {
    let fx = fixture().await;
    let payload = AttachPermissionRequest {
        permission_id: Some(PermissionId::InventoryView.id()),
    };

    let err = handlers::attach_permission(
        caller("root"),
        State(fx.state.clone()),
        Path(fx.viewer_role.id),
        Json(payload),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));
}

#[tokio::test]
async fn test_attach_unknown_permission_is_not_found() {
    let fx = fixture().await;

    let err = handlers::attach_permission(
        caller("root"),
        State(fx.state.clone()),
        Path(fx.guest_role.id),
        Json(AttachPermissionRequest {
            permission_id: Some(999),
        }),
    )
    .await
    .unwrap_err();
    assert_eq!(err, ApiError::NotFound("Permission not found".to_string()));
}

#[tokio::test]
async fn test_admin_cannot_manage_role_permissions() {
    let fx = fixture().await;

    let err = handlers::attach_permission(
        caller("manager"),
        State(fx.state.clone()),
        Path(fx.guest_role.id),
        Json(AttachPermissionRequest {
            permission_id: Some(PermissionId::InventoryView.id()),
        }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));
    assert!(
        !fx.repo
            .role_has_any_permission(fx.guest_role.id, &PermissionId::ALL)
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn test_staff_cannot_create_role() {
    let fx = fixture().await;

    let err = handlers::create_role(
        caller("clerk"),
        State(fx.state.clone()),
        Json(RoleRequest {
            name: Some("intruders".to_string()),
        }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));
    assert!(fx.repo.get_role_by_name("intruders").await.unwrap().is_none());
}

/// A user whose role holds only `RoleUpdate`.
async fn role_editor(fx: &common::Fixture) -> i64 {
    let ops = fx.repo.create_role("ops").await.unwrap();
    fx.repo
        .attach_permission(ops.id, PermissionId::RoleUpdate.id())
        .await
        .unwrap();
    add_user(fx.repo.as_ref(), "opsuser", ops.id).await;
    ops.id
}

#[tokio::test]
async fn test_renaming_own_role_to_admin_does_not_elevate() {
    let fx = fixture().await;
    let ops_id = role_editor(&fx).await;

    for name in ["Admin", "SUPERADMIN", " admin "] {
        let err = handlers::update_role(
            caller("opsuser"),
            State(fx.state.clone()),
            Path(ops_id),
            Json(RoleRequest {
                name: Some(name.to_string()),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err, ApiError::Conflict("Role name is reserved".to_string()));
    }
    assert_eq!(fx.repo.get_role(ops_id).await.unwrap().unwrap().name, "ops");

    let err = handlers::list_users(caller("opsuser"), State(fx.state.clone()))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));
}

#[tokio::test]
async fn test_role_named_like_admin_is_not_elevated() {
    let fx = fixture().await;

    // Written straight to the store, as a pre-existing row would be.
    let lookalike = fx.repo.create_role("Admin").await.unwrap();
    add_user(fx.repo.as_ref(), "pretender", lookalike.id).await;

    let err = handlers::list_users(caller("pretender"), State(fx.state.clone()))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));
}

#[tokio::test]
async fn test_create_role_with_seeded_name_is_conflict() {
    let fx = fixture().await;

    for name in ["admin", "Staff", "SuperAdmin"] {
        let err = handlers::create_role(
            caller("root"),
            State(fx.state.clone()),
            Json(RoleRequest {
                name: Some(name.to_string()),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err, ApiError::Conflict("Role name is reserved".to_string()));
    }
    assert!(fx.repo.get_role_by_name("Staff").await.unwrap().is_none());
}

#[tokio::test]
async fn test_seeded_roles_cannot_be_renamed_or_deleted() {
    let fx = fixture().await;

    for role in [&fx.superadmin_role, &fx.admin_role, &fx.staff_role] {
        let err = handlers::update_role(
            caller("root"),
            State(fx.state.clone()),
            Path(role.id),
            Json(RoleRequest {
                name: Some("renamed".to_string()),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err, ApiError::Forbidden("Default roles cannot be renamed".to_string()));

        let err = handlers::delete_role(caller("root"), State(fx.state.clone()), Path(role.id))
            .await
            .unwrap_err();
        assert_eq!(err, ApiError::Forbidden("Default roles cannot be deleted".to_string()));

        let stored = fx.repo.get_role(role.id).await.unwrap().unwrap();
        assert_eq!(stored.name, role.name);
    }

    // Elevation survives.
    handlers::list_users(caller("root"), State(fx.state.clone()))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_role_editor_cannot_touch_seeded_roles() {
    let fx = fixture().await;
    role_editor(&fx).await;

    let err = handlers::update_role(
        caller("opsuser"),
        State(fx.state.clone()),
        Path(fx.admin_role.id),
        Json(RoleRequest {
            name: Some("ops-admin".to_string()),
        }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));
    assert_eq!(
        fx.repo.get_role(fx.admin_role.id).await.unwrap().unwrap().name,
        "admin"
    );
}

#[tokio::test]
async fn test_detach_revokes_access() {
    let fx = fixture().await;
    handlers::create_item(caller("root"), State(fx.state.clone()), Json(widget(1)))
        .await
        .unwrap();

    handlers::list_inventory(caller("viewer"), State(fx.state.clone()))
        .await
        .unwrap();

    let Json(revoked) = handlers::detach_permission(
        caller("root"),
        State(fx.state.clone()),
        Path((fx.viewer_role.id, PermissionId::InventoryView.id())),
    )
    .await
    .unwrap();
    assert_eq!(revoked.role_permission.role_id, fx.viewer_role.id);

    let err = handlers::list_inventory(caller("viewer"), State(fx.state.clone()))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));

    let err = handlers::detach_permission(
        caller("root"),
        State(fx.state.clone()),
        Path((fx.viewer_role.id, PermissionId::InventoryView.id())),
    )
    .await
    .unwrap_err();
    assert_eq!(err, ApiError::NotFound("Role permission not found".to_string()));
}

#[tokio::test]
async fn test_public_catalogue() {
    let fx = fixture().await;

    let Json(permissions) = handlers::list_permissions(State(fx.state.clone())).await.unwrap();
    assert_eq!(permissions.len(), PermissionId::ALL.len());

    let Json(roles) = handlers::list_roles(State(fx.state.clone())).await.unwrap();
    let names: Vec<&str> = roles.roles.iter().map(|r| r.name.as_str()).collect();
    for expected in ["superadmin", "admin", "staff", "viewer", "guest"] {
        assert!(names.contains(&expected), "missing role {}", expected);
    }
}

// --- Users ---

#[tokio::test]
async fn test_user_can_read_self_but_not_others() {
    let fx = fixture().await;

    let Json(own) = handlers::get_user(caller("clerk"), State(fx.state.clone()), Path(fx.clerk.id))
        .await
        .unwrap();
    let profile = own.data.unwrap();
    assert_eq!(profile.username, "clerk");
    assert_eq!(profile.role, "staff");

    let err = handlers::get_user(caller("clerk"), State(fx.state.clone()), Path(fx.root.id))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));

    let Json(other) = handlers::get_user(caller("manager"), State(fx.state.clone()), Path(fx.clerk.id))
        .await
        .unwrap();
    assert_eq!(other.status_code, 200);
    assert!(other.success);
}

#[tokio::test]
async fn test_get_me_returns_caller_profile() {
    let fx = fixture().await;

    let Json(me) = handlers::get_me(caller("viewer"), State(fx.state.clone()))
        .await
        .unwrap();
    let profile = me.data.unwrap();
    assert_eq!(profile.id, fx.viewer.id);
    assert_eq!(profile.role_id, fx.viewer_role.id);
}

#[tokio::test]
async fn test_list_users_requires_elevated_role() {
    let fx = fixture().await;

    let err = handlers::list_users(caller("clerk"), State(fx.state.clone()))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));

    let Json(all) = handlers::list_users(caller("manager"), State(fx.state.clone()))
        .await
        .unwrap();
    assert_eq!(all.data.len(), 5);
}

#[tokio::test]
async fn test_self_update_cannot_change_role() {
    let fx = fixture().await;

    let err = handlers::update_user(
        caller("clerk"),
        State(fx.state.clone()),
        Path(fx.clerk.id),
        Json(UpdateUserRequest {
            role_id: Some(fx.superadmin_role.id),
            ..Default::default()
        }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));

    let user = fx.repo.get_user(fx.clerk.id).await.unwrap().unwrap();
    assert_eq!(user.role_id, fx.staff_role.id);

    let Json(updated) = handlers::update_user(
        caller("clerk"),
        State(fx.state.clone()),
        Path(fx.clerk.id),
        Json(UpdateUserRequest {
            email: Some("clerk@shop.test".to_string()),
            ..Default::default()
        }),
    )
    .await
    .unwrap();
    let profile = updated.data.unwrap();
    assert_eq!(profile.email, "clerk@shop.test");
    assert_eq!(profile.username, "clerk");
}

#[tokio::test]
async fn test_self_update_may_echo_current_role() {
    let fx = fixture().await;

    let Json(updated) = handlers::update_user(
        caller("clerk"),
        State(fx.state.clone()),
        Path(fx.clerk.id),
        Json(UpdateUserRequest {
            email: Some("clerk@shop.test".to_string()),
            role_id: Some(fx.staff_role.id),
            ..Default::default()
        }),
    )
    .await
    .unwrap();
    let profile = updated.data.unwrap();
    assert_eq!(profile.email, "clerk@shop.test");
    assert_eq!(profile.role_id, fx.staff_role.id);
}

#[tokio::test]
async fn test_elevated_update_can_change_role() {
    let fx = fixture().await;

    let Json(updated) = handlers::update_user(
        caller("manager"),
        State(fx.state.clone()),
        Path(fx.guest.id),
        Json(UpdateUserRequest {
            role_id: Some(fx.staff_role.id),
            ..Default::default()
        }),
    )
    .await
    .unwrap();
    assert_eq!(updated.data.unwrap().role, "staff");

    let err = handlers::update_user(
        caller("manager"),
        State(fx.state.clone()),
        Path(fx.guest.id),
        Json(UpdateUserRequest {
            role_id: Some(9999),
            ..Default::default()
        }),
    )
    .await
    .unwrap_err();
    assert_eq!(err, ApiError::NotFound("Role not found".to_string()));
}

#[tokio::test]
async fn test_create_user_validation_and_conflict() {
    let fx = fixture().await;

    let err = handlers::create_user(
        caller("manager"),
        State(fx.state.clone()),
        Json(CreateUserRequest {
            username: Some("newbie".to_string()),
            ..Default::default()
        }),
    )
    .await
    .unwrap_err();
    assert_eq!(err, ApiError::missing_information());

    let err = handlers::create_user(
        caller("clerk"),
        State(fx.state.clone()),
        Json(CreateUserRequest {
            username: Some("newbie".to_string()),
            email: Some("newbie@example.com".to_string()),
            password: Some("s3cret-pass".to_string()),
            role_id: Some(fx.staff_role.id),
        }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));

    let err = handlers::create_user(
        caller("manager"),
        State(fx.state.clone()),
        Json(CreateUserRequest {
            username: Some("clerk".to_string()),
            email: Some("dup@example.com".to_string()),
            password: Some("s3cret-pass".to_string()),
            role_id: Some(fx.staff_role.id),
        }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));
    assert_eq!(fx.repo.list_users().await.unwrap().len(), 5);
}

#[tokio::test]
async fn test_create_then_delete_user() {
    let fx = fixture().await;

    let (status, Json(created)) = handlers::create_user(
        caller("root"),
        State(fx.state.clone()),
        Json(CreateUserRequest {
            username: Some("temp".to_string()),
            email: Some("temp@example.com".to_string()),
            password: Some("s3cret-pass".to_string()),
            role_id: Some(fx.staff_role.id),
        }),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created.status_code, 201);
    let profile = created.data.unwrap();

    let stored = fx.repo.get_user(profile.id).await.unwrap().unwrap();
    assert_ne!(stored.password_hash, "s3cret-pass");
    assert!(poscal_api::password::verify_password("s3cret-pass", &stored.password_hash));

    let err = handlers::delete_user(caller("clerk"), State(fx.state.clone()), Path(profile.id))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));

    let Json(deleted) = handlers::delete_user(caller("manager"), State(fx.state.clone()), Path(profile.id))
        .await
        .unwrap();
    assert!(deleted.success);
    assert!(deleted.data.is_none());

    let err = handlers::get_user(caller("manager"), State(fx.state.clone()), Path(profile.id))
        .await
        .unwrap_err();
    assert_eq!(err, ApiError::NotFound("User not found".to_string()));
}
