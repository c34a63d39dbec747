//! Gateway binary library: wires the collaborator crates into an axum
//! router. Kept separate from `main.rs` so integration tests can build a
//! router against an in-memory [`AppState`] without a real process.

pub mod config;
pub mod error;
pub mod llm;
pub mod routes;
pub mod state;

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::AppState;

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/parser/parse", post(routes::parser::parse_handler))
        .route("/parser/supported", get(routes::parser::supported_handler))
        .route("/parser/validate", post(routes::parser::validate_handler))
        .route("/query", post(routes::query::query_handler))
        .route("/query/models", get(routes::query::models_handler))
        .route("/query/settings", get(routes::query::settings_handler))
        .route("/query/cache/stats", get(routes::query::cache_stats_handler))
        .route("/query/cache", delete(routes::query::cache_clear_handler))
        .route("/query/health", get(routes::query::health_handler))
        .route("/ai/query", post(routes::ai::ai_query_handler));

    let cors = if state.config.cors_origins.is_empty() {
        CorsLayer::new().allow_origin(AllowOrigin::any())
    } else {
        let origins: Vec<axum::http::HeaderValue> = state
            .config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new().allow_origin(origins)
    };

    let prefix = state.config.api_prefix.clone();
    Router::new()
        .nest(&prefix, api)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
