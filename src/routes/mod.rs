/// Router Module Index
///
/// Routes are split by the credential they need. Axum merges method routers that
/// share a path, so `GET /roles` can stay public while `POST /roles` sits behind
/// the authentication layer.

/// Routes open to anonymous clients.
pub mod public;

/// Routes for any authenticated caller. Permission checks happen in the handlers.
pub mod authenticated;

/// Role administration and user management. Requires an authenticated caller
/// holding the relevant permission or an elevated role.
pub mod admin;
