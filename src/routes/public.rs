use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints that accept anonymous callers: the credential exchange and single-post reads.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        .route("/api/v1/login", post(handlers::login))
        .route("/api/v1/register", post(handlers::register))
        // POST /api/v1/logout
        // Stateless no-op; the client drops its token.
        .route("/api/v1/logout", post(handlers::logout))
        .route("/api/v1/posts/{id}", get(handlers::get_post))
}
