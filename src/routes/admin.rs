use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, post, put},
};

/// Admin Router Module
///
/// Role administration and user management.
///
/// Access Control:
/// Wrapped in the same authentication layer as the authenticated routes. Role
/// routes then need the matching role permission; user routes need an elevated
/// role (superadmin or admin).
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // --- Roles ---
        // POST /roles
        .route("/roles", post(handlers::create_role))
        // PUT/DELETE /roles/{id}
        // Deleting a role removes its permission grants first, in one transaction.
        .route(
            "/roles/{id}",
            put(handlers::update_role).delete(handlers::delete_role),
        )
        // POST /roles/{id}/permissions
        .route("/roles/{id}/permissions", post(handlers::attach_permission))
        // DELETE /roles/{id}/permissions/{permission_id}
        .route(
            "/roles/{id}/permissions/{permission_id}",
            delete(handlers::detach_permission),
        )
        // --- Users ---
        // GET/POST /users
        .route("/users", get(handlers::list_users).post(handlers::create_user))
        // DELETE /users/{id}
        .route("/users/{id}", delete(handlers::delete_user))
}
