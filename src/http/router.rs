//! Router configuration for the HTTP API.

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use super::handlers;
use super::state::AppState;

const BODY_LIMIT_BYTES: usize = 1024 * 1024;

fn cors_layer(client_origin: &str) -> CorsLayer {
    let origin = if client_origin == "*" {
        AllowOrigin::from(Any)
    } else {
        match HeaderValue::from_str(client_origin) {
            Ok(value) => AllowOrigin::exact(value),
            Err(_) => {
                warn!(client_origin, "unusable CORS origin, allowing any");
                AllowOrigin::from(Any)
            }
        }
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Create the application router with all routes and middleware.
pub fn create_router(state: AppState, client_origin: &str) -> Router {
    let api = Router::new()
        .route("/search", post(handlers::search))
        .route("/search/stream", post(handlers::search_stream));

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(client_origin))
        .with_state(state)
}
