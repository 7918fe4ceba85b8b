//! In-memory key set cache keyed by endpoint.
//!
//! [`CachingKeySetSource`] wraps another [`KeySetSource`] and keeps each
//! endpoint's key set for a configurable TTL.
//!
//! - At most one fetch per endpoint is in flight. Concurrent callers queue on
//!   the endpoint's refresh lock and re-read the cache once it is released.
//! - Failed fetches are never cached; the next caller tries again.
//! - Endpoints hold no state once their entry has expired or their fetch has
//!   failed. Idle slots are swept whenever a new endpoint is added.
//! - A token whose `kid` is missing from a cached set may trigger one early
//!   refetch, at most once per `min_refresh_interval`, to pick up key rotation.

use crate::auth::jwks::{KeySet, KeySetSource};
use crate::errors::KeyResolutionError;
use crate::observability::metrics;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::instrument;

/// Default cache TTL in seconds (5 minutes).
const DEFAULT_CACHE_TTL_SECONDS: u64 = 300;

/// Default minimum spacing between refetches triggered by unknown key IDs.
const DEFAULT_MIN_REFRESH_INTERVAL_SECONDS: u64 = 30;

/// Cached key set with the time it was fetched.
struct CachedKeySet {
    key_set: Arc<KeySet>,
    fetched_at: Instant,
}

/// Per-endpoint cache state.
#[derive(Default)]
struct EndpointSlot {
    cached: RwLock<Option<CachedKeySet>>,

    /// Held for the duration of a fetch.
    refresh_lock: Mutex<()>,
}

impl EndpointSlot {
    /// Cached key set if it is younger than `max_age`.
    async fn fresh_within(&self, max_age: Duration) -> Option<Arc<KeySet>> {
        let cached = self.cached.read().await;
        cached
            .as_ref()
            .filter(|entry| entry.fetched_at.elapsed() < max_age)
            .map(|entry| Arc::clone(&entry.key_set))
    }
}

/// Whether a slot is still worth keeping: a caller holds it, or its entry is
/// younger than `ttl`.
fn slot_is_live(slot: &Arc<EndpointSlot>, ttl: Duration) -> bool {
    if Arc::strong_count(slot) > 1 {
        return true;
    }
    match slot.cached.try_read() {
        Ok(cached) => cached
            .as_ref()
            .is_some_and(|entry| entry.fetched_at.elapsed() < ttl),
        Err(_) => true,
    }
}

/// Key set source that caches another source's results per endpoint.
pub struct CachingKeySetSource<S> {
    inner: S,

    /// How long a fetched key set is served without refetching.
    ttl: Duration,

    /// Minimum age of a cached set before an unknown `kid` may force a refetch.
    min_refresh_interval: Duration,

    slots: RwLock<HashMap<String, Arc<EndpointSlot>>>,
}

impl<S: KeySetSource> CachingKeySetSource<S> {
    /// Wrap `inner` with the default TTL (5 minutes) and refetch interval (30 seconds).
    pub fn new(inner: S) -> Self {
        Self::with_ttl(
            inner,
            Duration::from_secs(DEFAULT_CACHE_TTL_SECONDS),
            Duration::from_secs(DEFAULT_MIN_REFRESH_INTERVAL_SECONDS),
        )
    }

    /// Wrap `inner` with a custom TTL and minimum refetch interval.
    ///
    /// # Arguments
    ///
    /// * `ttl` - How long to serve a key set before refetching
    /// * `min_refresh_interval` - How old a cached set must be before an
    ///   unknown key ID may trigger an early refetch
    pub fn with_ttl(inner: S, ttl: Duration, min_refresh_interval: Duration) -> Self {
        Self {
            inner,
            ttl,
            min_refresh_interval,
            slots: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn min_refresh_interval(&self) -> Duration {
        self.min_refresh_interval
    }

    /// Drop the cached key set for one endpoint.
    pub async fn invalidate(&self, endpoint: &str) {
        self.slots.write().await.remove(endpoint);
    }

    /// Drop every cached key set.
    pub async fn clear(&self) {
        self.slots.write().await.clear();
    }

    async fn slot(&self, endpoint: &str) -> Arc<EndpointSlot> {
        if let Some(slot) = self.slots.read().await.get(endpoint) {
            return Arc::clone(slot);
        }

        let mut slots = self.slots.write().await;
        if !slots.contains_key(endpoint) {
            let before = slots.len();
            slots.retain(|_, slot| slot_is_live(slot, self.ttl));
            if slots.len() < before {
                tracing::debug!(
                    target: "authorizer.jwks",
                    evicted = before - slots.len(),
                    "Evicted idle JWKS cache slots"
                );
            }
        }
        Arc::clone(slots.entry(endpoint.to_string()).or_default())
    }

    /// Remove `slot` from the map if it still has nothing cached.
    async fn evict_if_empty(&self, endpoint: &str, slot: &Arc<EndpointSlot>) {
        if slot.cached.read().await.is_some() {
            return;
        }
        let mut slots = self.slots.write().await;
        if slots
            .get(endpoint)
            .is_some_and(|current| Arc::ptr_eq(current, slot))
        {
            slots.remove(endpoint);
        }
    }

    /// Fetch from the inner source and store the result. Caller holds the refresh lock.
    async fn refresh(
        &self,
        endpoint: &str,
        slot: &Arc<EndpointSlot>,
    ) -> Result<Arc<KeySet>, KeyResolutionError> {
        let key_set = match self.inner.fetch_key_set(endpoint).await {
            Ok(key_set) => key_set,
            Err(e) => {
                self.evict_if_empty(endpoint, slot).await;
                return Err(e);
            }
        };

        *slot.cached.write().await = Some(CachedKeySet {
            key_set: Arc::clone(&key_set),
            fetched_at: Instant::now(),
        });

        tracing::info!(
            target: "authorizer.jwks",
            key_count = key_set.len(),
            ttl_seconds = self.ttl.as_secs(),
            "JWKS cache refreshed"
        );

        Ok(key_set)
    }
}

#[async_trait]
impl<S: KeySetSource> KeySetSource for CachingKeySetSource<S> {
    #[instrument(skip(self), fields(endpoint = %endpoint))]
    async fn fetch_key_set(&self, endpoint: &str) -> Result<Arc<KeySet>, KeyResolutionError> {
        let slot = self.slot(endpoint).await;

        if let Some(key_set) = slot.fresh_within(self.ttl).await {
            tracing::debug!(target: "authorizer.jwks", "JWKS cache hit");
            metrics::record_jwks_cache("hit");
            return Ok(key_set);
        }

        let _guard = slot.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited for the lock
        if let Some(key_set) = slot.fresh_within(self.ttl).await {
            tracing::debug!(target: "authorizer.jwks", "JWKS fetch coalesced with in-flight refresh");
            metrics::record_jwks_cache("coalesced");
            return Ok(key_set);
        }

        tracing::debug!(target: "authorizer.jwks", "JWKS cache miss or expired");
        metrics::record_jwks_cache("miss");
        self.refresh(endpoint, &slot).await
    }

    #[instrument(skip(self), fields(endpoint = %endpoint))]
    async fn refetch_on_miss(
        &self,
        endpoint: &str,
    ) -> Result<Option<Arc<KeySet>>, KeyResolutionError> {
        let slot = self.slot(endpoint).await;

        if slot.fresh_within(self.min_refresh_interval).await.is_some() {
            tracing::debug!(target: "authorizer.jwks", "Unknown key ID but JWKS fetched recently, not refetching");
            metrics::record_jwks_cache("refetch_skipped");
            return Ok(None);
        }

        let _guard = slot.refresh_lock.lock().await;

        if let Some(key_set) = slot.fresh_within(self.min_refresh_interval).await {
            metrics::record_jwks_cache("coalesced");
            return Ok(Some(key_set));
        }

        tracing::info!(target: "authorizer.jwks", "Unknown key ID, refetching JWKS");
        metrics::record_jwks_cache("refetch");
        self.refresh(endpoint, &slot).await.map(Some)
    }
}
