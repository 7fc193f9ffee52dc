pub mod admin_handlers;
pub mod config;
pub mod coordinator;
pub mod messages;
pub mod metrics;
pub mod query_handlers;
pub mod reservation_handlers;
pub mod store;

use std::sync::Arc;

use axum::http::header::{ACCEPT, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::store::ScyllaStore;

/// Session and prepared statements, shared across handlers and read-only
/// after startup.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ScyllaStore>,
}

pub async fn health() -> &'static str {
    "ok"
}

async fn metrics_text() -> String {
    metrics::render()
}

pub fn build_router(state: AppState) -> Router {
    let allowed_origins = ["http://localhost:3000", "http://localhost:5173"];

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(
            allowed_origins
                .iter()
                .filter_map(|origin| origin.parse::<HeaderValue>().ok())
                .collect::<Vec<_>>(),
        ))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([ACCEPT, CONTENT_TYPE]);

    Router::new()
        .route("/healthz", get(health))
        .route("/metrics", get(metrics_text))
        .route("/reserve", post(reservation_handlers::reserve))
        .route("/update", post(reservation_handlers::update))
        .route("/query", get(query_handlers::query))
        .route("/query-account", get(query_handlers::query_account))
        .route("/query-all", get(query_handlers::query_all))
        .route("/medicine", get(query_handlers::medicine))
        .route("/clean", get(admin_handlers::clean))
        .route("/direct", get(admin_handlers::direct))
        .with_state(state)
        .layer(cors)
}
