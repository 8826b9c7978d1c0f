use std::sync::Arc;

use api_types::HealthResponse;
use axum::{Json, extract::State};
use incident::EventCache;

/// Health check handler returning `{ "status": "ok", "cache_size": N }`.
pub async fn handler(State(cache): State<Arc<EventCache>>) -> Json<HealthResponse> {
    Json(HealthResponse::ok(cache.len()))
}
