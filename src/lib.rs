use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod auth;
pub mod authz;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod handlers;
pub mod memory;
pub mod models;
pub mod password;
pub mod permissions;
pub mod repository;

// Routing split by required credential (Public, Authenticated, Admin).
pub mod routes;
use auth::Caller;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::ApiError;
pub use memory::MemoryRepository;
pub use repository::{PostgresRepository, RepositoryState};

/// ApiDoc
///
/// Aggregates every `#[utoipa::path]` handler and `ToSchema` model into the OpenAPI
/// document served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::login,
        handlers::list_inventory, handlers::create_item, handlers::get_item,
        handlers::update_item, handlers::delete_item, handlers::sell_item,
        handlers::list_permissions, handlers::list_roles, handlers::get_role,
        handlers::create_role, handlers::update_role, handlers::delete_role,
        handlers::attach_permission, handlers::detach_permission,
        handlers::get_me, handlers::list_users, handlers::create_user,
        handlers::get_user, handlers::update_user, handlers::delete_user
    ),
    components(
        schemas(
            models::InventoryItem, models::CreateItemRequest, models::UpdateItemRequest,
            models::SellItemRequest, models::NewItemResponse, models::ItemResponse,
            models::ItemDetailResponse, models::InventoryListResponse,
            models::Role, models::Permission, models::RolePermission, models::RoleRequest,
            models::AttachPermissionRequest, models::RoleResponse, models::RoleListResponse,
            models::RoleDeletedResponse, models::RolePermissionResponse,
            models::UserProfile, models::CreateUserRequest, models::UpdateUserRequest,
            models::UserResponse, models::UserListResponse,
            models::LoginRequest, models::LoginResponse, models::MessageResponse,
            models::ErrorBody,
        )
    ),
    tags(
        (name = "poscal", description = "Inventory and access control API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Shared by every request: the store behind the `Repository` trait and the loaded
/// configuration.
#[derive(Clone)]
pub struct AppState {
    /// Postgres in production, `MemoryRepository` in tests.
    pub repo: RepositoryState,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Rejects the request with 401 unless the `Caller` extractor finds a credential.
/// Whether the caller may perform the operation is decided later, in the handler.
async fn auth_middleware(_caller: Caller, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the routing tree, scoped authentication, observability layers and
/// shared state.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Public Routes: no credential needed.
        .merge(public::public_routes())
        // Authenticated and Admin Routes: the credential is checked by the layer,
        // permissions by the handlers.
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        .merge(
            admin::admin_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                // Every request gets an x-request-id, echoed back in the response.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for `TraceLayer`, tagged with the request id so every log line of a request
/// can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
