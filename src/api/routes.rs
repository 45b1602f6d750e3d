use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::{auth, handlers};
use crate::AppState;

/// Headroom for multipart boundaries and headers on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn create_router(state: Arc<AppState>) -> Router {
    let upload_limit = state.config.upload_limit() as usize + MULTIPART_OVERHEAD;

    let upload_api = Router::new()
        .route(
            "/api",
            post(handlers::upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth::require_password,
        ));

    Router::new()
        // Downloads by short ID
        .route("/d/:short_id", get(handlers::serve_short))
        .route("/pwd", post(handlers::set_password_cookie))
        // Internal
        .route("/_internal/health", get(handlers::health))
        .merge(upload_api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
