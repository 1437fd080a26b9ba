// Poolwright Server Library
// Decision: Router assembly lives here so binaries and tests build the same app

pub mod api;
pub mod config;
pub mod openapi;

use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use axum::{routing::get, Json, Router};
use poolwright_core::PoolManager;
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

pub use config::ServerConfig;
use openapi::ApiDoc;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Build the complete application router
///
/// `/health` is never prefixed; everything else moves under
/// `config.api_prefix` when one is set.
pub fn build_app(manager: Arc<PoolManager>, config: &ServerConfig) -> Router {
    let api_routes = Router::new()
        .merge(api::pools::routes(api::pools::AppState::new(manager.clone())))
        .merge(api::tasks::routes(api::tasks::AppState::new(manager.clone())))
        .merge(api::stats::routes(api::stats::AppState::new(manager)))
        .route("/api-doc/openapi.json", get(openapi_json));

    let app = Router::new()
        .route("/health", get(health))
        .merge(build_router_with_prefix(api_routes, &config.api_prefix));

    let cors_origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    // Add CORS layer only if origins are configured
    let app = if !cors_origins.is_empty() {
        app.layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(cors_origins))
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([header::CONTENT_TYPE, header::ACCEPT]),
        )
    } else {
        app
    };

    app.layer(TraceLayer::new_for_http())
}

/// Build router with optional API prefix
pub fn build_router_with_prefix<S: Clone + Send + Sync + 'static>(
    api_routes: Router<S>,
    api_prefix: &str,
) -> Router<S> {
    if api_prefix.is_empty() {
        api_routes
    } else {
        Router::new().nest(api_prefix, api_routes)
    }
}
