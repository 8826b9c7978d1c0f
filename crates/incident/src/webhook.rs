//! Statuspage webhook deliveries.
//!
//! A delivery is classified by its top-level keys, parsed into the matching
//! payload type and turned into a [`DetectedEvent`]. Events already seen by
//! the poller (or an earlier delivery) are acknowledged as duplicates.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::{
    dedup::EventCache,
    events::{DetectedEvent, EventSink, EventSource},
    models::{ComponentWebhook, IncidentWebhook, MaintenanceWebhook},
    providers::ProviderRegistry,
};

/// Provider name used when a delivery comes from an unregistered page.
pub const UNKNOWN_PROVIDER: &str = "Unknown";

/// Result of processing one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// An incident notification.
    Incident {
        /// Incident ID
        id: String,
        /// Whether it was already seen
        duplicate: bool,
    },
    /// A component status change.
    Component {
        /// Component ID
        id: String,
        /// Whether it was already seen
        duplicate: bool,
    },
    /// A scheduled maintenance notification.
    Maintenance {
        /// Maintenance ID
        id: String,
        /// Whether it was already seen
        duplicate: bool,
    },
    /// The body looked like `kind` but did not parse.
    ParseFailed {
        /// Top-level key that selected the payload type
        kind: &'static str,
    },
    /// No known top-level key.
    Unknown {
        /// Top-level keys of the body
        keys: Vec<String>,
    },
}

impl WebhookOutcome {
    /// Whether the event was suppressed by the cache.
    pub const fn is_duplicate(&self) -> bool {
        matches!(
            self,
            Self::Incident { duplicate: true, .. } |
                Self::Component { duplicate: true, .. } |
                Self::Maintenance { duplicate: true, .. }
        )
    }
}

/// Turns webhook bodies into deduplicated events.
#[derive(Clone)]
pub struct WebhookProcessor {
    registry: Arc<ProviderRegistry>,
    cache: Arc<EventCache>,
    sink: Arc<dyn EventSink>,
}

impl std::fmt::Debug for WebhookProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookProcessor").field("cache", &self.cache).finish_non_exhaustive()
    }
}

impl WebhookProcessor {
    /// Creates a processor sharing `cache` with the poller.
    pub fn new(registry: Arc<ProviderRegistry>, cache: Arc<EventCache>, sink: Arc<dyn EventSink>) -> Self {
        Self { registry, cache, sink }
    }

    /// The cache deliveries are checked against.
    pub fn cache(&self) -> &Arc<EventCache> {
        &self.cache
    }

    /// Processes one delivery body.
    pub fn process(&self, body: Value) -> WebhookOutcome {
        if body.get("incident").is_some() {
            self.incident(body)
        } else if body.get("component_update").is_some() {
            self.component(body)
        } else if body.get("scheduled_maintenance").is_some() {
            self.maintenance(body)
        } else {
            let keys: Vec<String> = body
                .as_object()
                .map(|fields| fields.keys().cloned().collect())
                .unwrap_or_default();
            warn!(?keys, "Unknown webhook payload");
            WebhookOutcome::Unknown { keys }
        }
    }

    fn incident(&self, body: Value) -> WebhookOutcome {
        let Some(payload) = parse::<IncidentWebhook>(body, "incident") else {
            return WebhookOutcome::ParseFailed { kind: "incident" };
        };
        let provider = self.provider_name(&payload.page.id);
        let event = DetectedEvent::incident(EventSource::Webhook, provider, &payload.incident);
        let duplicate = self.emit(event);
        WebhookOutcome::Incident { id: payload.incident.id, duplicate }
    }

    fn component(&self, body: Value) -> WebhookOutcome {
        let Some(payload) = parse::<ComponentWebhook>(body, "component_update") else {
            return WebhookOutcome::ParseFailed { kind: "component_update" };
        };
        let provider = self.provider_name(&payload.page.id);
        let event = DetectedEvent::component_update(provider, &payload.component, &payload.component_update);
        let duplicate = self.emit(event);
        WebhookOutcome::Component { id: payload.component.id, duplicate }
    }

    fn maintenance(&self, body: Value) -> WebhookOutcome {
        let Some(payload) = parse::<MaintenanceWebhook>(body, "scheduled_maintenance") else {
            return WebhookOutcome::ParseFailed { kind: "scheduled_maintenance" };
        };
        let provider = self.provider_name(&payload.page.id);
        let event = DetectedEvent::maintenance(provider, &payload.scheduled_maintenance);
        let duplicate = self.emit(event);
        WebhookOutcome::Maintenance { id: payload.scheduled_maintenance.id, duplicate }
    }

    fn provider_name(&self, page_id: &str) -> &str {
        self.registry.by_page_id(page_id).map_or(UNKNOWN_PROVIDER, |p| p.name.as_str())
    }

    /// Returns `true` when the event was a duplicate.
    fn emit(&self, event: DetectedEvent) -> bool {
        if self.cache.seen_or_mark(&event.fingerprint) {
            debug!(fingerprint = %event.fingerprint, "Skipping duplicate webhook event");
            return true;
        }
        self.sink.event(&event);
        false
    }
}

fn parse<T: DeserializeOwned>(body: Value, kind: &'static str) -> Option<T> {
    match serde_json::from_value(body) {
        Ok(payload) => Some(payload),
        Err(e) => {
            error!(kind, error = %e, "Failed to parse webhook payload");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        dedup::fingerprint,
        testing::{RecordingSink, registry},
    };

    fn processor() -> (WebhookProcessor, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::new());
        let processor = WebhookProcessor::new(
            Arc::new(registry(&[("openai", "OpenAI")])),
            Arc::new(EventCache::default()),
            sink.clone(),
        );
        (processor, sink)
    }

    fn incident_body(page_id: &str) -> Value {
        json!({
            "page": {"id": page_id, "status_indicator": "major"},
            "incident": {
                "id": "abc123",
                "name": "Degraded performance on Chat Completions API",
                "status": "investigating",
                "impact": "major",
                "incident_updates": [{"id": "upd1", "body": "Investigating.", "status": "investigating"}],
                "components": [{"id": "comp1", "name": "Chat Completions"}]
            }
        })
    }

    #[tokio::test]
    async fn incident_is_emitted_then_deduplicated() {
        let (processor, sink) = processor();

        let first = processor.process(incident_body("page-openai"));
        assert_eq!(first, WebhookOutcome::Incident { id: "abc123".into(), duplicate: false });

        let second = processor.process(incident_body("page-openai"));
        assert!(second.is_duplicate());

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].source, EventSource::Webhook);
        assert_eq!(events[0].product, "Chat Completions");
        assert_eq!(events[0].fingerprint.as_str(), "OpenAI:incident:abc123:upd1");
    }

    #[tokio::test]
    async fn unregistered_page_uses_unknown_provider() {
        let (processor, sink) = processor();
        processor.process(incident_body("somebody-else"));
        assert_eq!(sink.fingerprints(), vec!["Unknown:incident:abc123:upd1"]);
    }

    #[tokio::test]
    async fn component_update_is_keyed_on_update_id() {
        let (processor, sink) = processor();
        let body = json!({
            "page": {"id": "page-openai"},
            "component_update": {
                "id": "cu1",
                "component_id": "comp1",
                "old_status": "operational",
                "new_status": "partial_outage"
            },
            "component": {"id": "comp1", "name": "Chat Completions", "status": "partial_outage"}
        });

        let outcome = processor.process(body);

        assert_eq!(outcome, WebhookOutcome::Component { id: "comp1".into(), duplicate: false });
        let events = sink.events();
        assert_eq!(events[0].fingerprint.as_str(), "OpenAI:component:comp1:cu1");
        assert_eq!(events[0].status, "operational -> partial_outage");
    }

    #[tokio::test]
    async fn maintenance_is_processed() {
        let (processor, sink) = processor();
        let body = json!({
            "page": {"id": "page-openai"},
            "scheduled_maintenance": {
                "id": "maint1",
                "name": "Database migration window",
                "status": "scheduled",
                "scheduled_for": "2025-12-05T02:00:00.000Z",
                "scheduled_until": "2025-12-05T04:00:00.000Z",
                "incident_updates": [{"id": "mupd1", "body": "Planned.", "status": "scheduled"}]
            }
        });

        let outcome = processor.process(body);

        assert_eq!(outcome, WebhookOutcome::Maintenance { id: "maint1".into(), duplicate: false });
        assert_eq!(sink.fingerprints(), vec!["OpenAI:maintenance:maint1:mupd1"]);
    }

    #[tokio::test]
    async fn malformed_known_payload_is_a_parse_failure() {
        let (processor, sink) = processor();
        let outcome = processor.process(json!({"page": {"id": "page-openai"}, "incident": {"id": 7}}));
        assert_eq!(outcome, WebhookOutcome::ParseFailed { kind: "incident" });
        assert!(sink.records().is_empty());
    }

    #[tokio::test]
    async fn unknown_payload_reports_keys() {
        let (processor, _) = processor();
        let outcome = processor.process(json!({"meta": {}, "page": {"id": "page-openai"}}));
        assert_eq!(outcome, WebhookOutcome::Unknown { keys: vec!["meta".into(), "page".into()] });

        assert_eq!(processor.process(json!([1, 2])), WebhookOutcome::Unknown { keys: vec![] });
    }

    #[tokio::test]
    async fn incident_seen_by_poller_is_a_duplicate() {
        let (processor, sink) = processor();
        processor.cache().mark_seen(&fingerprint("OpenAI", "incident", "abc123", "upd1"));

        assert!(processor.process(incident_body("page-openai")).is_duplicate());
        assert!(sink.events().is_empty());
    }
}
