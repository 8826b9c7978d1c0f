//! Incident crate: status page polling, webhook processing and event deduplication.
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::cognitive_complexity)]
/// Per-provider failure tracking and retry delays
pub mod backoff;
/// Statuspage API client
pub mod client;
/// Event fingerprints and the TTL deduplication cache
pub mod dedup;
/// Normalized events and the sinks they are emitted to
pub mod events;
/// Statuspage API and webhook payloads
pub mod models;
/// Periodic poll scheduler
pub mod poller;
/// Static registry of monitored status pages
pub mod providers;
/// Webhook payload processing
pub mod webhook;

/// Scripted collaborators for tests
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use backoff::BackoffTracker;
pub use client::{Client, StatusSource};
pub use dedup::{EventCache, Fingerprint, fingerprint};
pub use events::{DetectedEvent, EventSink, TracingSink};
pub use poller::PollScheduler;
pub use providers::{Provider, ProviderRegistry};
pub use webhook::{WebhookOutcome, WebhookProcessor};
