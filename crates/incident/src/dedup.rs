//! TTL-based in-memory event deduplication.
//!
//! Webhook deliveries and the background poller can both observe the same
//! status page update. Both paths consult one shared [`EventCache`] so the
//! update is emitted once.
//!
//! # Fingerprint format
//!
//! `<provider>:<event type>:<entity id>:<update id>`, with an empty update id
//! when the event carries none. Components must not contain `:`; this is not
//! checked.
//!
//! # Expiry
//!
//! Entries expire `ttl` after they were marked. Expired entries are swept on
//! access, there is no background task.

use std::{
    collections::HashMap,
    fmt,
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use tokio::time::Instant;

/// How long an event stays suppressed after it was first seen.
///
/// Wide enough to cover the gap between a webhook delivery and the next poll
/// cycle.
pub const DEFAULT_TTL: Duration = Duration::from_secs(600);

/// Event type tags embedded in fingerprints.
pub mod tags {
    /// Incident created or updated.
    pub const INCIDENT: &str = "incident";
    /// Component update pushed by webhook, keyed on the update id.
    pub const COMPONENT: &str = "component";
    /// Component status transition observed by the poller, keyed on the new status.
    pub const COMPONENT_CHANGE: &str = "component_change";
    /// Scheduled maintenance created or updated.
    pub const MAINTENANCE: &str = "maintenance";
}

const DELIMITER: char = ':';

/// Deterministic key identifying one logical event across delivery paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Builds a fingerprint from its components. Pass `""` when there is no update id.
    pub fn new(provider: &str, event_type: &str, entity_id: &str, update_id: &str) -> Self {
        Self(format!(
            "{provider}{DELIMITER}{event_type}{DELIMITER}{entity_id}{DELIMITER}{update_id}"
        ))
    }

    /// Returns the fingerprint as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Shorthand for [`Fingerprint::new`].
pub fn fingerprint(provider: &str, event_type: &str, entity_id: &str, update_id: &str) -> Fingerprint {
    Fingerprint::new(provider, event_type, entity_id, update_id)
}

/// Time-windowed set of fingerprints shared by the webhook and poller paths.
///
/// All operations take one internal lock, so concurrent callers racing on the
/// same fingerprint see exactly one "first sighting".
#[derive(Debug)]
pub struct EventCache {
    entries: Mutex<HashMap<Fingerprint, Instant>>,
    default_ttl: Duration,
}

impl Default for EventCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl EventCache {
    /// Creates an empty cache whose entries live for `default_ttl`.
    pub fn new(default_ttl: Duration) -> Self {
        Self { entries: Mutex::new(HashMap::new()), default_ttl }
    }

    /// TTL applied by [`Self::mark_seen`] and [`Self::seen_or_mark`].
    pub const fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Returns `true` if `fp` was marked and has not expired yet.
    pub fn is_seen(&self, fp: &Fingerprint) -> bool {
        let mut entries = self.lock();
        evict_expired(&mut entries, Instant::now());
        entries.contains_key(fp)
    }

    /// Marks `fp` as seen for the default TTL, overwriting any existing expiry.
    pub fn mark_seen(&self, fp: &Fingerprint) {
        self.mark_seen_for(fp, self.default_ttl);
    }

    /// Marks `fp` as seen for `ttl`, overwriting any existing expiry.
    pub fn mark_seen_for(&self, fp: &Fingerprint, ttl: Duration) {
        self.lock().insert(fp.clone(), Instant::now() + ttl);
    }

    /// Returns `true` if `fp` was already seen. Otherwise marks it for the
    /// default TTL and returns `false`.
    pub fn seen_or_mark(&self, fp: &Fingerprint) -> bool {
        self.seen_or_mark_for(fp, self.default_ttl)
    }

    /// Like [`Self::seen_or_mark`] with an explicit TTL.
    ///
    /// A hit does not refresh the expiry: repeated deliveries inside the
    /// window never extend it.
    pub fn seen_or_mark_for(&self, fp: &Fingerprint, ttl: Duration) -> bool {
        let now = Instant::now();
        let mut entries = self.lock();
        evict_expired(&mut entries, now);
        if entries.contains_key(fp) {
            return true;
        }
        entries.insert(fp.clone(), now + ttl);
        false
    }

    /// Number of unexpired entries.
    pub fn len(&self) -> usize {
        let mut entries = self.lock();
        evict_expired(&mut entries, Instant::now());
        entries.len()
    }

    /// Returns `true` if no unexpired entries remain.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // The map stays consistent even if a holder panicked, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, HashMap<Fingerprint, Instant>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn evict_expired(entries: &mut HashMap<Fingerprint, Instant>, now: Instant) {
    entries.retain(|_, expiry| *expiry > now);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::time::advance;

    fn fp(id: &str) -> Fingerprint {
        fingerprint("OpenAI", tags::INCIDENT, id, "")
    }

    #[test]
    fn fingerprint_joins_components() {
        let key = fingerprint("OpenAI", "incident", "abc123", "upd1");
        assert_eq!(key.as_str(), "OpenAI:incident:abc123:upd1");
    }

    #[test]
    fn fingerprint_without_update_id_keeps_trailing_delimiter() {
        let key = fingerprint("GitHub", "component", "comp1", "");
        assert_eq!(key.to_string(), "GitHub:component:comp1:");
    }

    #[tokio::test]
    async fn mark_and_check() {
        let cache = EventCache::default();
        assert!(!cache.is_seen(&fp("a")));
        cache.mark_seen(&fp("a"));
        assert!(cache.is_seen(&fp("a")));
        assert!(!cache.is_seen(&fp("b")));
    }

    #[tokio::test]
    async fn seen_or_mark_reports_first_sighting_once() {
        let cache = EventCache::default();
        assert!(!cache.seen_or_mark(&fp("a")));
        assert!(cache.seen_or_mark(&fp("a")));
        assert!(cache.seen_or_mark(&fp("a")));
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cache = EventCache::new(Duration::from_secs(1));
        cache.mark_seen(&fp("a"));
        assert!(cache.is_seen(&fp("a")));

        advance(Duration::from_secs(2)).await;
        assert!(!cache.is_seen(&fp("a")));
        assert!(!cache.seen_or_mark(&fp("a")));
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_is_inclusive() {
        let cache = EventCache::new(Duration::from_secs(10));
        cache.mark_seen(&fp("a"));
        advance(Duration::from_secs(10)).await;
        assert!(!cache.is_seen(&fp("a")));
    }

    #[tokio::test(start_paused = true)]
    async fn seen_or_mark_hit_does_not_refresh_ttl() {
        let cache = EventCache::new(Duration::from_secs(10));
        assert!(!cache.seen_or_mark(&fp("a")));

        advance(Duration::from_secs(9)).await;
        assert!(cache.seen_or_mark(&fp("a")));
        assert!(cache.is_seen(&fp("a")));

        advance(Duration::from_secs(2)).await;
        assert!(!cache.is_seen(&fp("a")));
    }

    #[tokio::test(start_paused = true)]
    async fn mark_seen_overwrites_expiry() {
        let cache = EventCache::new(Duration::from_secs(10));
        cache.mark_seen(&fp("a"));
        advance(Duration::from_secs(9)).await;
        cache.mark_seen(&fp("a"));
        advance(Duration::from_secs(9)).await;
        assert!(cache.is_seen(&fp("a")));
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_ttl_overrides_default() {
        let cache = EventCache::default();
        assert!(!cache.seen_or_mark_for(&fp("short"), Duration::from_secs(5)));
        cache.mark_seen(&fp("long"));

        advance(Duration::from_secs(6)).await;
        assert!(!cache.is_seen(&fp("short")));
        assert!(cache.is_seen(&fp("long")));
    }

    #[tokio::test(start_paused = true)]
    async fn len_counts_only_unexpired_entries() {
        let cache = EventCache::new(Duration::from_secs(10));
        assert!(cache.is_empty());
        cache.mark_seen(&fp("a"));
        cache.mark_seen(&fp("b"));
        assert_eq!(cache.len(), 2);

        advance(Duration::from_secs(5)).await;
        cache.mark_seen(&fp("c"));
        advance(Duration::from_secs(6)).await;
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_seen_or_mark_has_single_winner() {
        let cache = Arc::new(EventCache::default());
        let key = fp("race");

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let key = key.clone();
                tokio::spawn(async move { cache.seen_or_mark(&key) })
            })
            .collect();

        let mut first_sightings = 0;
        for handle in handles {
            if !handle.await.unwrap() {
                first_sightings += 1;
            }
        }
        assert_eq!(first_sightings, 1);
        assert_eq!(cache.len(), 1);
    }
}
