use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Inventory and self-service user routes. The router is wrapped in the
/// authentication layer; each handler then checks the caller's role against the
/// permissions the operation needs.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /me
        // The caller's own profile.
        .route("/me", get(handlers::get_me))
        // --- Inventory ---
        // GET/POST /inventory
        // Listing needs any inventory permission; creating needs a write-capable one.
        .route(
            "/inventory",
            get(handlers::list_inventory).post(handlers::create_item),
        )
        // GET/PUT/DELETE /inventory/{id}
        .route(
            "/inventory/{id}",
            get(handlers::get_item)
                .put(handlers::update_item)
                .delete(handlers::delete_item),
        )
        // POST /inventory/{id}/sell
        // Atomic stock decrement. Overselling is rejected with 400 and leaves stock untouched.
        .route("/inventory/{id}/sell", post(handlers::sell_item))
        // --- Users (self-service) ---
        // GET/PUT /users/{id}
        // Elevated roles may act on any user; everyone else only on themselves.
        .route(
            "/users/{id}",
            get(handlers::get_user).put(handlers::update_user),
        )
}
