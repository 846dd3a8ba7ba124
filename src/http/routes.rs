use axum::{routing::get, routing::post, Router};
use tower_http::limit::RequestBodyLimitLayer;

use crate::http::handlers;
use crate::AppState;

// S3 notifications are a few KB; leave room for batched records.
const MAX_EVENT_BYTES: usize = 256 * 1024;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn events() -> Router<AppState> {
    Router::new()
        .route("/v1/events", post(handlers::process_event))
        .layer(RequestBodyLimitLayer::new(MAX_EVENT_BYTES))
}
