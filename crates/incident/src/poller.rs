//! Background poller, the safety net for missed webhooks.
//!
//! Every tick fetches unresolved incidents and component statuses from each
//! enabled provider that is outside its backoff window. Providers are polled
//! concurrently and each outcome is captured on its own, so one slow or broken
//! status page never fails the others. Events already seen through webhooks
//! are skipped via the shared [`EventCache`].

use std::{
    any::Any,
    collections::HashMap,
    panic::AssertUnwindSafe,
    sync::Arc,
    time::Duration,
};

use eyre::{Result, eyre};
use futures::{FutureExt, future::join_all};
use tokio::{
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::{
    backoff::BackoffTracker,
    client::StatusSource,
    dedup::EventCache,
    events::{ComponentSnapshot, DetectedEvent, EventSink, EventSource, component_transitions},
    providers::{Provider, ProviderRegistry},
};

/// Default time between two ticks, also the backoff unit.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(90);

/// What happened during one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Providers attempted this tick
    pub polled: usize,
    /// Providers skipped because they are backing off
    pub skipped: usize,
    /// Attempts that failed
    pub failed: usize,
    /// Events emitted
    pub emitted: usize,
}

/// Polls every enabled provider on a fixed interval.
///
/// Backoff state and component snapshots are owned here; the event cache is
/// shared with the webhook path.
pub struct PollScheduler<S> {
    registry: Arc<ProviderRegistry>,
    source: S,
    cache: Arc<EventCache>,
    sink: Arc<dyn EventSink>,
    backoff: BackoffTracker,
    snapshots: HashMap<String, ComponentSnapshot>,
    interval: Duration,
}

impl<S> std::fmt::Debug for PollScheduler<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollScheduler")
            .field("interval", &self.interval)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

impl<S: StatusSource> PollScheduler<S> {
    /// Creates a scheduler ticking every `interval`.
    pub fn new(
        registry: Arc<ProviderRegistry>,
        source: S,
        cache: Arc<EventCache>,
        sink: Arc<dyn EventSink>,
        interval: Duration,
    ) -> Self {
        Self {
            registry,
            source,
            cache,
            sink,
            backoff: BackoffTracker::new(interval),
            snapshots: HashMap::new(),
            interval,
        }
    }

    /// Time between ticks.
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Per-provider backoff state.
    pub const fn backoff(&self) -> &BackoffTracker {
        &self.backoff
    }

    /// Last component snapshot taken for `key`.
    pub fn snapshot(&self, key: &str) -> Option<&ComponentSnapshot> {
        self.snapshots.get(key)
    }

    /// Runs one poll cycle across all enabled providers.
    pub async fn tick(&mut self) -> TickSummary {
        let registry = Arc::clone(&self.registry);
        let enabled: Vec<&Provider> = registry.enabled().collect();
        if enabled.is_empty() {
            info!("No enabled providers, skipping poll cycle");
            return TickSummary::default();
        }

        let now = Instant::now();
        let (due, backing_off): (Vec<&Provider>, Vec<&Provider>) =
            enabled.into_iter().partition(|p| self.backoff.is_due(&p.key, now));
        for provider in &backing_off {
            debug!(provider = %provider.key, "Provider in backoff window, skipping");
        }
        // Stamp before any request so a hanging fetch cannot trigger a second attempt.
        for provider in &due {
            self.backoff.record_attempt(&provider.key, now);
        }

        let outcomes = join_all(due.iter().map(|provider| self.poll_provider_settled(provider))).await;

        let mut summary = TickSummary { polled: due.len(), skipped: backing_off.len(), ..Default::default() };
        for (provider, outcome) in due.into_iter().zip(outcomes) {
            summary.emitted += outcome.emitted;
            match outcome.result {
                Ok(snapshot) => {
                    self.snapshots.insert(provider.key.clone(), snapshot);
                    if let Some(failures) = self.backoff.record_success(&provider.key) {
                        self.sink.provider_recovered(provider, failures);
                    }
                }
                Err(e) => {
                    summary.failed += 1;
                    let retry_in = self.backoff.record_failure(&provider.key);
                    let failures = self.backoff.consecutive_failures(&provider.key);
                    self.sink.provider_failed(provider, failures, retry_in, &e);
                }
            }
        }
        debug!(?summary, "Poll cycle finished");
        summary
    }

    /// [`Self::poll_provider`] with a panic turned into a failed attempt.
    async fn poll_provider_settled(&self, provider: &Provider) -> ProviderOutcome {
        match AssertUnwindSafe(self.poll_provider(provider)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(provider = %provider.key, error = message, "Provider poll panicked");
                ProviderOutcome { emitted: 0, result: Err(eyre!("poll panicked: {message}")) }
            }
        }
    }

    /// Incidents first, then components. The first failure ends the attempt.
    async fn poll_provider(&self, provider: &Provider) -> ProviderOutcome {
        let incidents = match self.poll_incidents(provider).await {
            Ok(emitted) => emitted,
            Err(e) => return ProviderOutcome { emitted: 0, result: Err(e) },
        };
        match self.poll_components(provider).await {
            Ok((snapshot, transitions)) => {
                ProviderOutcome { emitted: incidents + transitions, result: Ok(snapshot) }
            }
            Err(e) => ProviderOutcome { emitted: incidents, result: Err(e) },
        }
    }

    async fn poll_incidents(&self, provider: &Provider) -> Result<usize> {
        let incidents = self.source.unresolved_incidents(provider).await?;
        let events = incidents
            .iter()
            .map(|incident| DetectedEvent::incident(EventSource::Poller, &provider.name, incident));
        Ok(self.emit_new(events))
    }

    async fn poll_components(&self, provider: &Provider) -> Result<(ComponentSnapshot, usize)> {
        let components = self.source.components(provider).await?;
        let (snapshot, transitions) =
            component_transitions(&provider.name, self.snapshots.get(&provider.key), &components);
        Ok((snapshot, self.emit_new(transitions)))
    }

    fn emit_new(&self, events: impl IntoIterator<Item = DetectedEvent>) -> usize {
        let mut emitted = 0;
        for event in events {
            if self.cache.seen_or_mark(&event.fingerprint) {
                debug!(fingerprint = %event.fingerprint, "Skipping duplicate event");
                continue;
            }
            self.sink.event(&event);
            emitted += 1;
        }
        emitted
    }
}

struct ProviderOutcome {
    emitted: usize,
    result: Result<ComponentSnapshot>,
}

impl<S: StatusSource + 'static> PollScheduler<S> {
    /// Ticks until `shutdown` is cancelled. The first tick fires immediately.
    ///
    /// A panic inside a tick is logged and the loop carries on with the next one.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(
            providers = self.registry.enabled().count(),
            interval_secs = self.interval.as_secs(),
            "Poller started"
        );
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {}
            }

            let tick = AssertUnwindSafe(self.tick()).catch_unwind();
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                outcome = tick => {
                    if let Err(panic) = outcome {
                        error!(error = panic_message(panic.as_ref()), "Unexpected error in poll cycle");
                    }
                }
            }
        }
        info!("Poller stopped");
    }

    /// Spawns [`Self::run`] on the Tokio runtime.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
