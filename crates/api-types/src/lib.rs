//! Data types for the status monitor HTTP endpoints.
//!
//! These structs define the JSON bodies returned by the webhook server. They
//! live in a separate crate so the health handler and the router can share
//! them without depending on each other.

#![allow(missing_docs)]

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub cache_size: usize,
}

impl HealthResponse {
    pub fn ok(cache_size: usize) -> Self {
        Self { status: "ok".to_owned(), cache_size }
    }
}

/// Body returned for every webhook delivery that passed the secret check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WebhookAck {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incident_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maintenance_id: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WebhookAck {
    const fn received() -> Self {
        Self {
            received: Some(true),
            duplicate: None,
            incident_id: None,
            component_id: None,
            maintenance_id: None,
            kind: None,
            error: None,
        }
    }

    /// `{"received":true,"duplicate":true}`
    pub fn duplicate() -> Self {
        Self { duplicate: Some(true), ..Self::received() }
    }

    pub fn incident(id: impl Into<String>) -> Self {
        Self { incident_id: Some(id.into()), ..Self::received() }
    }

    pub fn component(id: impl Into<String>) -> Self {
        Self { component_id: Some(id.into()), ..Self::received() }
    }

    pub fn maintenance(id: impl Into<String>) -> Self {
        Self { maintenance_id: Some(id.into()), ..Self::received() }
    }

    /// `{"received":true,"type":"unknown"}`
    pub fn unknown() -> Self {
        Self { kind: Some("unknown".to_owned()), ..Self::received() }
    }

    /// `{"error":"parse_failed"}`
    pub fn parse_failed() -> Self {
        Self { error: Some("parse_failed".to_owned()), ..Default::default() }
    }

    /// `{"error":"forbidden"}`
    pub fn forbidden() -> Self {
        Self { error: Some("forbidden".to_owned()), ..Default::default() }
    }
}

/// Problem-details style error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
}

impl ErrorResponse {
    pub fn new(
        kind: impl Into<String>,
        title: impl Into<String>,
        status: StatusCode,
        detail: impl Into<String>,
    ) -> Self {
        Self { kind: kind.into(), title: title.into(), status: status.as_u16(), detail: detail.into() }
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new("bad-request", "Bad Request", StatusCode::BAD_REQUEST, detail)
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}
