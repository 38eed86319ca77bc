use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, put},
};

/// Admin Router Module
///
/// User management and post moderation. Wrapped in the authentication middleware like the
/// authenticated routes; each handler then calls `require_role(Role::Admin)` before touching
/// the repository, so a non-admin gets 403 whether or not the target exists.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /api/v1 (and the trailing-slash form)
        // Lists all users.
        .route("/api/v1", get(handlers::list_users))
        .route("/api/v1/", get(handlers::list_users))
        .route("/api/v1/updateUser/{id}", put(handlers::update_user))
        .route("/api/v1/deleteUser/{id}", delete(handlers::delete_user))
        .route("/api/v1/posts/{id}", delete(handlers::delete_post))
}
