//! Normalized status events and the sinks they are emitted to.
//!
//! Both detection paths build a [`DetectedEvent`] together with its
//! [`Fingerprint`]; the caller consults the
//! [`EventCache`](crate::dedup::EventCache) and only hands first sightings to
//! an [`EventSink`].

use std::{collections::HashMap, fmt, sync::Arc, time::Duration};

use tracing::{info, warn};

use crate::{
    dedup::{Fingerprint, tags},
    models::{Component, ComponentUpdate, Incident, ScheduledMaintenance},
    providers::Provider,
};

/// Component id to last observed status, per provider.
pub type ComponentSnapshot = HashMap<String, String>;

/// Path an event was detected on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSource {
    /// Pushed by a Statuspage webhook.
    Webhook,
    /// Found by the background poller.
    Poller,
}

impl EventSource {
    /// Lowercase label used in logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Webhook => "webhook",
            Self::Poller => "poller",
        }
    }
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of a detected event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Incident created or updated.
    Incident,
    /// Component status changed.
    Component,
    /// Scheduled maintenance created or updated.
    ScheduledMaintenance,
}

impl EventKind {
    /// Lowercase label used in logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Incident => "incident",
            Self::Component => "component",
            Self::ScheduledMaintenance => "scheduled_maintenance",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A status page event ready to be logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedEvent {
    /// Detection path
    pub source: EventSource,
    /// Provider display name
    pub provider: String,
    /// Affected product or component names
    pub product: String,
    /// Event category
    pub kind: EventKind,
    /// One-line status, e.g. `major | investigating - API errors`
    pub status: String,
    /// Latest update text, if any
    pub detail: Option<String>,
    /// Deduplication key
    pub fingerprint: Fingerprint,
}

impl DetectedEvent {
    /// An incident, keyed on its newest update.
    pub fn incident(source: EventSource, provider: &str, incident: &Incident) -> Self {
        let latest = incident.latest_update();
        Self {
            source,
            provider: provider.to_owned(),
            product: incident.affected(),
            kind: EventKind::Incident,
            status: format!(
                "{} | {} - {}",
                incident.impact.as_deref().unwrap_or("unknown"),
                incident.status,
                incident.name
            ),
            detail: latest.and_then(|u| u.body.clone()).filter(|b| !b.is_empty()),
            fingerprint: Fingerprint::new(
                provider,
                tags::INCIDENT,
                &incident.id,
                latest.map_or("", |u| u.id.as_str()),
            ),
        }
    }

    /// A component status transition seen by the poller, keyed on the new status.
    pub fn component_transition(provider: &str, component: &Component, old_status: &str) -> Self {
        Self {
            source: EventSource::Poller,
            provider: provider.to_owned(),
            product: component.name.clone(),
            kind: EventKind::Component,
            status: format!("{} -> {}", old_status, component.status),
            detail: None,
            fingerprint: Fingerprint::new(
                provider,
                tags::COMPONENT_CHANGE,
                &component.id,
                &component.status,
            ),
        }
    }

    /// A component update pushed by webhook, keyed on the update id.
    pub fn component_update(provider: &str, component: &Component, update: &ComponentUpdate) -> Self {
        Self {
            source: EventSource::Webhook,
            provider: provider.to_owned(),
            product: component.name.clone(),
            kind: EventKind::Component,
            status: format!("{} -> {}", update.old_status, update.new_status),
            detail: None,
            fingerprint: Fingerprint::new(provider, tags::COMPONENT, &component.id, &update.id),
        }
    }

    /// A scheduled maintenance pushed by webhook, keyed on its newest update.
    pub fn maintenance(provider: &str, maintenance: &ScheduledMaintenance) -> Self {
        let schedule = maintenance.scheduled_for.as_deref().map_or_else(String::new, |from| {
            format!(
                " (scheduled {} -> {})",
                from,
                maintenance.scheduled_until.as_deref().unwrap_or("?")
            )
        });
        let latest = maintenance.latest_update();
        Self {
            source: EventSource::Webhook,
            provider: provider.to_owned(),
            product: maintenance.affected(),
            kind: EventKind::ScheduledMaintenance,
            status: format!("{} - {}{}", maintenance.status, maintenance.name, schedule),
            detail: latest.and_then(|u| u.body.clone()).filter(|b| !b.is_empty()),
            fingerprint: Fingerprint::new(
                provider,
                tags::MAINTENANCE,
                &maintenance.id,
                latest.map_or("", |u| u.id.as_str()),
            ),
        }
    }
}

/// Compares a fresh component listing against the previous snapshot.
///
/// Returns the new snapshot and one event per component whose status changed.
/// Components without a previous status never produce an event.
pub fn component_transitions(
    provider: &str,
    previous: Option<&ComponentSnapshot>,
    fresh: &[Component],
) -> (ComponentSnapshot, Vec<DetectedEvent>) {
    let mut snapshot = ComponentSnapshot::with_capacity(fresh.len());
    let mut events = Vec::new();
    for component in fresh {
        let old = previous
            .and_then(|prev| prev.get(&component.id))
            .filter(|old| **old != component.status);
        if let Some(old) = old {
            events.push(DetectedEvent::component_transition(provider, component, old));
        }
        snapshot.insert(component.id.clone(), component.status.clone());
    }
    (snapshot, events)
}

/// Receives new events and provider health transitions.
pub trait EventSink: Send + Sync {
    /// A first sighting of an event.
    fn event(&self, event: &DetectedEvent);

    /// `provider` succeeded after `failures` consecutive failures.
    fn provider_recovered(&self, provider: &Provider, failures: u32);

    /// `provider` failed for the `failures`-th time in a row; the next attempt is in `retry_in`.
    fn provider_failed(&self, provider: &Provider, failures: u32, retry_in: Duration, error: &eyre::Report);
}

impl<T: EventSink + ?Sized> EventSink for Arc<T> {
    fn event(&self, event: &DetectedEvent) {
        (**self).event(event);
    }

    fn provider_recovered(&self, provider: &Provider, failures: u32) {
        (**self).provider_recovered(provider, failures);
    }

    fn provider_failed(&self, provider: &Provider, failures: u32, retry_in: Duration, error: &eyre::Report) {
        (**self).provider_failed(provider, failures, retry_in, error);
    }
}

/// Logs events through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn event(&self, event: &DetectedEvent) {
        info!(
            source = %event.source,
            provider = %event.provider,
            product = %event.product,
            event = %event.kind,
            status = %event.status,
            detail = event.detail.as_deref().unwrap_or(""),
            fingerprint = %event.fingerprint,
            "Status event"
        );
    }

    fn provider_recovered(&self, provider: &Provider, failures: u32) {
        info!(provider = %provider.key, failures, "Provider recovered after consecutive failures");
    }

    fn provider_failed(&self, provider: &Provider, failures: u32, retry_in: Duration, error: &eyre::Report) {
        warn!(
            provider = %provider.key,
            failures,
            retry_in_secs = retry_in.as_secs(),
            error = %format!("{error:#}"),
            "Provider poll failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn component(id: &str, status: &str) -> Component {
        Component { id: id.into(), name: format!("Component {id}"), status: status.into() }
    }

    #[test]
    fn transition_fires_once_with_new_status_in_fingerprint() {
        let previous = ComponentSnapshot::from([
            ("c1".to_owned(), "operational".to_owned()),
            ("c2".to_owned(), "operational".to_owned()),
        ]);
        let fresh = [component("c1", "degraded_performance"), component("c2", "operational")];

        let (snapshot, events) = component_transitions("OpenAI", Some(&previous), &fresh);

        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].fingerprint.as_str(),
            "OpenAI:component_change:c1:degraded_performance"
        );
        assert_eq!(events[0].status, "operational -> degraded_performance");
        assert_eq!(snapshot["c1"], "degraded_performance");
        assert_eq!(snapshot["c2"], "operational");
    }

    #[test]
    fn first_observation_is_not_a_transition() {
        let (snapshot, events) =
            component_transitions("OpenAI", None, &[component("c1", "operational")]);
        assert!(events.is_empty());
        assert_eq!(snapshot.len(), 1);

        let previous = ComponentSnapshot::new();
        let (_, events) =
            component_transitions("OpenAI", Some(&previous), &[component("c1", "major_outage")]);
        assert!(events.is_empty());
    }

    #[test]
    fn removed_components_drop_out_of_snapshot() {
        let previous = ComponentSnapshot::from([("gone".to_owned(), "operational".to_owned())]);
        let (snapshot, events) =
            component_transitions("OpenAI", Some(&previous), &[component("c1", "operational")]);
        assert!(events.is_empty());
        assert!(!snapshot.contains_key("gone"));
    }

    #[test]
    fn incident_event_uses_latest_update() {
        let incident: Incident = serde_json::from_value(json!({
            "id": "inc1",
            "name": "API errors",
            "status": "investigating",
            "impact": "major",
            "incident_updates": [{"id": "upd1", "body": "Looking into it", "status": "investigating"}],
            "components": [{"id": "c1", "name": "Chat Completions"}]
        }))
        .unwrap();

        let event = DetectedEvent::incident(EventSource::Poller, "OpenAI", &incident);
        assert_eq!(event.fingerprint.as_str(), "OpenAI:incident:inc1:upd1");
        assert_eq!(event.product, "Chat Completions");
        assert_eq!(event.status, "major | investigating - API errors");
        assert_eq!(event.detail.as_deref(), Some("Looking into it"));
    }

    #[test]
    fn maintenance_event_includes_schedule() {
        let maintenance: ScheduledMaintenance = serde_json::from_value(json!({
            "id": "maint1",
            "name": "Database migration window",
            "status": "scheduled",
            "scheduled_for": "2025-12-05T02:00:00.000Z",
            "incident_updates": [{"id": "mupd1", "body": "Planned.", "status": "scheduled"}]
        }))
        .unwrap();

        let event = DetectedEvent::maintenance("OpenAI", &maintenance);
        assert_eq!(event.fingerprint.as_str(), "OpenAI:maintenance:maint1:mupd1");
        assert_eq!(
            event.status,
            "scheduled - Database migration window (scheduled 2025-12-05T02:00:00.000Z -> ?)"
        );
        assert_eq!(event.kind, EventKind::ScheduledMaintenance);
    }
}
