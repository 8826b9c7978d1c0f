use super::*;
use std::time::Duration;

use axum::{
    body::{self, Body},
    http::Request,
};
use incident::{
    EventSink, PollScheduler,
    testing::{RecordingSink, ScriptedSource, incident, registry},
};
use serde_json::{Value, json};
use tower::util::ServiceExt;

const SECRET: &str = "s3cret";

struct TestApp {
    app: Router,
    sink: Arc<RecordingSink>,
    cache: Arc<EventCache>,
}

fn build_app() -> TestApp {
    let sink = Arc::new(RecordingSink::new());
    let cache = Arc::new(EventCache::default());
    let processor = WebhookProcessor::new(
        Arc::new(registry(&[("openai", "OpenAI")])),
        Arc::clone(&cache),
        sink.clone(),
    );
    TestApp { app: router(AppState::new(SECRET, processor)), sink, cache }
}

async fn send(app: Router, method: &str, uri: &str, body: impl Into<Body>) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json")
                .body(body.into())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    (status, body)
}

async fn post_json(app: Router, uri: &str, payload: &Value) -> (StatusCode, Value) {
    send(app, "POST", uri, payload.to_string()).await
}

fn incident_payload() -> Value {
    json!({
        "page": {"id": "page-openai"},
        "incident": {
            "id": "inc1",
            "name": "Elevated error rates",
            "status": "investigating",
            "impact": "major",
            "incident_updates": [{"id": "upd1", "body": "Investigating.", "status": "investigating"}],
            "components": [{"id": "c1", "name": "API"}]
        }
    })
}

#[tokio::test]
async fn health_reports_cache_size() {
    let t = build_app();
    let (status, body) = send(t.app, "GET", "/health", Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok", "cache_size": 0}));
}

#[tokio::test]
async fn wrong_secret_is_forbidden() {
    let t = build_app();
    let (status, body) = post_json(t.app, "/webhook/nope", &incident_payload()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, json!({"error": "forbidden"}));
    assert!(t.sink.records().is_empty());
}

#[tokio::test]
async fn incident_is_acknowledged_then_deduplicated() {
    let t = build_app();
    let uri = format!("/webhook/{SECRET}");

    let (status, body) = post_json(t.app.clone(), &uri, &incident_payload()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"received": true, "incident_id": "inc1"}));

    let (status, body) = post_json(t.app.clone(), &uri, &incident_payload()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"received": true, "duplicate": true}));

    assert_eq!(t.sink.fingerprints(), vec!["OpenAI:incident:inc1:upd1"]);
    let (_, health) = send(t.app, "GET", "/health", Body::empty()).await;
    assert_eq!(health["cache_size"], 1);
}

#[tokio::test]
async fn component_update_is_acknowledged() {
    let t = build_app();
    let payload = json!({
        "page": {"id": "page-openai"},
        "component_update": {
            "id": "cu1",
            "component_id": "c1",
            "old_status": "operational",
            "new_status": "major_outage"
        },
        "component": {"id": "c1", "name": "API", "status": "major_outage"}
    });

    let (status, body) = post_json(t.app, &format!("/webhook/{SECRET}"), &payload).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"received": true, "component_id": "c1"}));
}

#[tokio::test]
async fn maintenance_is_acknowledged() {
    let t = build_app();
    let payload = json!({
        "page": {"id": "page-openai"},
        "scheduled_maintenance": {
            "id": "m1",
            "name": "Database upgrade",
            "status": "scheduled",
            "incident_updates": []
        }
    });

    let (_, body) = post_json(t.app, &format!("/webhook/{SECRET}"), &payload).await;

    assert_eq!(body, json!({"received": true, "maintenance_id": "m1"}));
    assert_eq!(t.sink.fingerprints(), vec!["OpenAI:maintenance:m1:"]);
}

#[tokio::test]
async fn malformed_payload_reports_parse_failure() {
    let t = build_app();
    let payload = json!({"page": {"id": "page-openai"}, "incident": "not an object"});

    let (status, body) = post_json(t.app, &format!("/webhook/{SECRET}"), &payload).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"error": "parse_failed"}));
}

#[tokio::test]
async fn unknown_payload_is_acknowledged() {
    let t = build_app();
    let (status, body) =
        post_json(t.app, &format!("/webhook/{SECRET}"), &json!({"ping": true})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"received": true, "type": "unknown"}));
}

#[tokio::test]
async fn invalid_json_is_a_bad_request() {
    let t = build_app();
    let (status, body) = send(t.app, "POST", &format!("/webhook/{SECRET}"), "{not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["type"], "bad-request");
    assert_eq!(body["status"], 400);
}

#[tokio::test]
async fn webhook_and_poller_share_one_cache() {
    let t = build_app();
    let source = Arc::new(ScriptedSource::new());
    source.set_incidents("openai", vec![incident("inc1", Some("upd1"))]);
    let sink: Arc<dyn EventSink> = t.sink.clone();
    let mut scheduler = PollScheduler::new(
        Arc::new(registry(&[("openai", "OpenAI")])),
        source,
        Arc::clone(&t.cache),
        sink,
        Duration::from_secs(90),
    );

    let (_, body) = post_json(t.app, &format!("/webhook/{SECRET}"), &incident_payload()).await;
    assert_eq!(body, json!({"received": true, "incident_id": "inc1"}));

    let summary = scheduler.tick().await;

    assert_eq!(summary.emitted, 0);
    assert_eq!(t.sink.fingerprints(), vec!["OpenAI:incident:inc1:upd1"]);
}
