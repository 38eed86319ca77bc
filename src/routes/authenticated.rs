use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, put},
};

/// Authenticated Router Module
///
/// Routes open to any caller holding a valid token. The router is wrapped in the
/// authentication middleware by `create_router`, so every handler here receives a
/// verified `AuthUser`.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // --- Posts ---
        .route(
            "/api/v1/posts",
            get(handlers::list_posts).post(handlers::create_post),
        )
        // PUT /api/v1/posts/{id}
        // Owner-or-admin check happens in the handler.
        .route("/api/v1/posts/{id}", put(handlers::update_post))
        // --- Own account ---
        .route("/api/v1/changePassword", put(handlers::change_password))
        .route("/api/v1/profile", get(handlers::get_profile))
        .route("/api/v1/updateProfile", put(handlers::update_profile))
}
