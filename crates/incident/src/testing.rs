//! In-memory [`StatusSource`] and [`EventSink`] for tests.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use eyre::{Result, eyre};

use crate::{
    client::StatusSource,
    events::{DetectedEvent, EventSink},
    models::{AffectedComponent, Component, Incident, IncidentUpdate},
    providers::{Provider, ProviderRegistry},
};

/// Builds an unresolved incident whose newest update is `update_id`.
pub fn incident(id: &str, update_id: Option<&str>) -> Incident {
    Incident {
        id: id.to_owned(),
        name: format!("Incident {id}"),
        status: "investigating".to_owned(),
        impact: Some("major".to_owned()),
        incident_updates: update_id
            .map(|u| IncidentUpdate {
                id: u.to_owned(),
                body: Some("Looking into it".to_owned()),
                status: "investigating".to_owned(),
            })
            .into_iter()
            .collect(),
        components: vec![AffectedComponent { id: "c1".to_owned(), name: "API".to_owned() }],
    }
}

/// Builds a component with the given status.
pub fn component(id: &str, status: &str) -> Component {
    Component { id: id.to_owned(), name: format!("Component {id}"), status: status.to_owned() }
}

/// A registry of `(key, display name)` providers with unroutable base URLs.
pub fn registry(providers: &[(&str, &str)]) -> ProviderRegistry {
    ProviderRegistry::new(
        providers
            .iter()
            .map(|(key, name)| {
                Provider::new(*key, *name, format!("http://{key}.invalid"), format!("page-{key}"))
            })
            .collect(),
    )
}

/// Canned responses for one provider.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPage {
    /// Returned by the incidents listing
    pub incidents: Vec<Incident>,
    /// Returned by the components listing
    pub components: Vec<Component>,
    /// Fail the incidents listing with this message
    pub fail_incidents: Option<String>,
    /// Fail the components listing with this message
    pub fail_components: Option<String>,
    /// Delay applied before every response
    pub delay: Option<Duration>,
}

#[derive(Debug, Default)]
struct PageState {
    page: ScriptedPage,
    incident_calls: usize,
    component_calls: usize,
}

/// A [`StatusSource`] answering from [`ScriptedPage`]s keyed by provider key.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    pages: Mutex<HashMap<String, PageState>>,
}

impl ScriptedSource {
    /// Creates a source without pages; every request fails until one is set.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, PageState>> {
        self.pages.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the canned responses for `key`.
    pub fn set_page(&self, key: &str, page: ScriptedPage) {
        self.lock().entry(key.to_owned()).or_default().page = page;
    }

    /// Replaces the incidents listing for `key`.
    pub fn set_incidents(&self, key: &str, incidents: Vec<Incident>) {
        self.lock().entry(key.to_owned()).or_default().page.incidents = incidents;
    }

    /// Replaces the components listing for `key`.
    pub fn set_components(&self, key: &str, components: Vec<Component>) {
        self.lock().entry(key.to_owned()).or_default().page.components = components;
    }

    /// Makes the first request of every attempt against `key` fail.
    pub fn fail(&self, key: &str, message: &str) {
        self.lock().entry(key.to_owned()).or_default().page.fail_incidents = Some(message.to_owned());
    }

    /// Clears scripted failures for `key`.
    pub fn recover(&self, key: &str) {
        let mut pages = self.lock();
        let state = pages.entry(key.to_owned()).or_default();
        state.page.fail_incidents = None;
        state.page.fail_components = None;
    }

    /// `(incident calls, component calls)` made against `key`.
    pub fn calls(&self, key: &str) -> (usize, usize) {
        self.lock().get(key).map_or((0, 0), |s| (s.incident_calls, s.component_calls))
    }

    async fn respond<T>(
        &self,
        provider: &Provider,
        pick: impl FnOnce(&mut PageState) -> Result<T>,
    ) -> Result<T> {
        let (delay, response) = {
            let mut pages = self.lock();
            match pages.get_mut(&provider.key) {
                Some(state) => (state.page.delay, pick(state)),
                None => (None, Err(eyre!("no scripted page for {}", provider.key))),
            }
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        response
    }
}

#[async_trait]
impl StatusSource for ScriptedSource {
    async fn unresolved_incidents(&self, provider: &Provider) -> Result<Vec<Incident>> {
        self.respond(provider, |state| {
            state.incident_calls += 1;
            match &state.page.fail_incidents {
                Some(message) => Err(eyre!("{message}")),
                None => Ok(state.page.incidents.clone()),
            }
        })
        .await
    }

    async fn components(&self, provider: &Provider) -> Result<Vec<Component>> {
        self.respond(provider, |state| {
            state.component_calls += 1;
            match &state.page.fail_components {
                Some(message) => Err(eyre!("{message}")),
                None => Ok(state.page.components.clone()),
            }
        })
        .await
    }
}

/// Something an [`EventSink`] was told.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// A first sighting
    Event(DetectedEvent),
    /// A provider recovered
    Recovered {
        /// Provider key
        provider: String,
        /// Failures before recovery
        failures: u32,
    },
    /// A provider failed
    Failed {
        /// Provider key
        provider: String,
        /// Consecutive failures
        failures: u32,
        /// Delay before the next attempt
        retry_in: Duration,
    },
}

/// An [`EventSink`] that keeps everything it receives.
#[derive(Debug, Default)]
pub struct RecordingSink {
    records: Mutex<Vec<Record>>,
}

impl RecordingSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, record: Record) {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).push(record);
    }

    /// Everything received so far, in order.
    pub fn records(&self) -> Vec<Record> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Emitted events, in order.
    pub fn events(&self) -> Vec<DetectedEvent> {
        self.records()
            .into_iter()
            .filter_map(|r| match r {
                Record::Event(event) => Some(event),
                _ => None,
            })
            .collect()
    }

    /// Fingerprints of emitted events, in order.
    pub fn fingerprints(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.fingerprint.to_string()).collect()
    }
}

impl EventSink for RecordingSink {
    fn event(&self, event: &DetectedEvent) {
        self.push(Record::Event(event.clone()));
    }

    fn provider_recovered(&self, provider: &Provider, failures: u32) {
        self.push(Record::Recovered { provider: provider.key.clone(), failures });
    }

    fn provider_failed(&self, provider: &Provider, failures: u32, retry_in: Duration, _error: &eyre::Report) {
        self.push(Record::Failed { provider: provider.key.clone(), failures, retry_in });
    }
}
