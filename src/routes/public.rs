use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints that need no credential: liveness, login and the read-only role and
/// permission catalogue.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness check for load balancers. Returns "ok" without touching the store.
        .route("/health", get(|| async { "ok" }))
        // POST /auth/login
        // Exchanges username and password for a bearer token.
        .route("/auth/login", post(handlers::login))
        // GET /permissions
        // The permission registry as stored.
        .route("/permissions", get(handlers::list_permissions))
        // GET /roles
        .route("/roles", get(handlers::list_roles))
        // GET /roles/{id}
        .route("/roles/{id}", get(handlers::get_role))
}
