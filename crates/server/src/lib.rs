//! HTTP surface of the status monitor: health check and webhook receiver.
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::cognitive_complexity)]

use std::{net::SocketAddr, sync::Arc};

use api_types::{ErrorResponse, WebhookAck};
use axum::{
    Json, Router,
    body::Bytes,
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use eyre::Result;
use incident::{EventCache, WebhookOutcome, WebhookProcessor};
use runtime::health;
use tokio_util::sync::CancellationToken;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, info, warn};

/// Shared state of the webhook server.
#[derive(Debug, Clone)]
pub struct AppState {
    webhook_secret: Arc<str>,
    processor: WebhookProcessor,
}

impl AppState {
    /// Creates the state for a server accepting deliveries on `/webhook/{secret}`.
    pub fn new(webhook_secret: impl Into<Arc<str>>, processor: WebhookProcessor) -> Self {
        Self { webhook_secret: webhook_secret.into(), processor }
    }
}

impl FromRef<AppState> for Arc<EventCache> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(state.processor.cache())
    }
}

/// Build the router with the health and webhook routes and a tracing layer.
pub fn router(state: AppState) -> Router {
    let trace = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .route("/health", get(health::handler))
        .route("/webhook/:secret", post(webhook))
        .with_state(state)
        .layer(trace)
}

async fn webhook(State(state): State<AppState>, Path(secret): Path<String>, body: Bytes) -> Response {
    if secret != *state.webhook_secret {
        warn!("Webhook called with an invalid secret");
        return (StatusCode::FORBIDDEN, Json(WebhookAck::forbidden())).into_response();
    }

    let payload: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "Webhook body is not valid JSON");
            return ErrorResponse::bad_request(format!("Invalid JSON body: {e}")).into_response();
        }
    };

    let ack = match state.processor.process(payload) {
        WebhookOutcome::Incident { duplicate: true, .. } |
        WebhookOutcome::Component { duplicate: true, .. } |
        WebhookOutcome::Maintenance { duplicate: true, .. } => WebhookAck::duplicate(),
        WebhookOutcome::Incident { id, .. } => WebhookAck::incident(id),
        WebhookOutcome::Component { id, .. } => WebhookAck::component(id),
        WebhookOutcome::Maintenance { id, .. } => WebhookAck::maintenance(id),
        WebhookOutcome::ParseFailed { .. } => WebhookAck::parse_failed(),
        WebhookOutcome::Unknown { .. } => WebhookAck::unknown(),
    };
    Json(ack).into_response()
}

/// Run the webhook server on `addr` until `shutdown` is cancelled.
pub async fn run(addr: SocketAddr, state: AppState, shutdown: CancellationToken) -> Result<()> {
    let app = router(state);

    info!("Starting webhook server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    info!("Webhook server stopped");
    Ok(())
}

#[cfg(test)]
mod tests;
