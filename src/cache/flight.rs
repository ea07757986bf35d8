//! Keyed fetch coalescing with TTL expiry.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use lru::LruCache;
use metrics::counter;

use crate::application::source::SourceError;

use super::lock::mutex_lock;

const SOURCE: &str = "cache::flight";

const HIT_TOTAL: &str = "foglio_cache_hit_total";
const MISS_TOTAL: &str = "foglio_cache_miss_total";
const COALESCED_TOTAL: &str = "foglio_cache_coalesced_total";
const EVICT_TOTAL: &str = "foglio_cache_evict_total";

type Flight<V> = Shared<BoxFuture<'static, Result<V, SourceError>>>;

struct ReadyEntry<V> {
    value: V,
    stored_at: Instant,
}

/// A keyed map that collapses concurrent fetches for the same key into one
/// loader run and keeps resolved values for a fixed TTL.
///
/// Resolved entries are bounded with LRU eviction and expire lazily on the
/// next lookup. In-flight entries are exempt from both: evicting a pending
/// fetch would break the one-loader-per-key guarantee, so a hung loader holds
/// its key until the underlying client's own timeout fires.
pub struct FlightMap<K, V> {
    ready: Mutex<LruCache<K, ReadyEntry<V>>>,
    pending: Mutex<HashMap<K, Flight<V>>>,
    ttl: Duration,
}

impl<K, V> FlightMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(capacity: std::num::NonZeroUsize, ttl: Duration) -> Self {
        Self {
            ready: Mutex::new(LruCache::new(capacity)),
            pending: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Return the live cached value for `key`, or run `load` to produce one.
    ///
    /// All callers arriving while a load is in flight await the same shared
    /// future: the loader runs exactly once and every waiter observes the
    /// identical value or the identical error. Failed loads are never cached;
    /// the next call after a failure runs the loader again.
    pub async fn get_or_fetch<F, Fut>(&self, key: K, load: F) -> Result<V, SourceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, SourceError>> + Send + 'static,
    {
        if let Some(value) = self.lookup_ready(&key) {
            counter!(HIT_TOTAL).increment(1);
            return Ok(value);
        }

        let (flight, joined) = {
            let mut pending = mutex_lock(&self.pending, SOURCE, "get_or_fetch.pending");
            match pending.get(&key) {
                Some(flight) => (flight.clone(), true),
                None => {
                    let flight = load().boxed().shared();
                    pending.insert(key.clone(), flight.clone());
                    (flight, false)
                }
            }
        };
        counter!(if joined { COALESCED_TOTAL } else { MISS_TOTAL }).increment(1);

        let result = flight.clone().await;
        self.finalize(&key, &flight, &result);
        result
    }

    /// Number of resolved entries currently held (expired ones included
    /// until their next lookup).
    pub fn len(&self) -> usize {
        mutex_lock(&self.ready, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all resolved entries. In-flight fetches are left to finish.
    pub fn clear(&self) {
        mutex_lock(&self.ready, SOURCE, "clear").clear();
    }

    fn lookup_ready(&self, key: &K) -> Option<V> {
        let mut ready = mutex_lock(&self.ready, SOURCE, "lookup_ready");
        if let Some(entry) = ready.get(key) {
            if entry.stored_at.elapsed() < self.ttl {
                return Some(entry.value.clone());
            }
        } else {
            return None;
        }
        // Expired: treated as absent, evicted now rather than by a sweeper.
        ready.pop(key);
        None
    }

    // Publish the outcome of a finished flight. Every waiter calls this, but
    // only the caller that finds its own flight still registered may touch
    // the maps; a stale finalizer must not overwrite a newer entry.
    fn finalize(&self, key: &K, flight: &Flight<V>, result: &Result<V, SourceError>) {
        let mut pending = mutex_lock(&self.pending, SOURCE, "finalize.pending");
        let owned = pending
            .get(key)
            .is_some_and(|current| current.ptr_eq(flight));
        if !owned {
            return;
        }
        pending.remove(key);

        if let Ok(value) = result {
            // Lock order is always pending → ready; no other path holds both.
            let mut ready = mutex_lock(&self.ready, SOURCE, "finalize.ready");
            let evicted = ready.push(
                key.clone(),
                ReadyEntry {
                    value: value.clone(),
                    stored_at: Instant::now(),
                },
            );
            if evicted.is_some_and(|(evicted_key, _)| &evicted_key != key) {
                counter!(EVICT_TOTAL).increment(1);
            }
        }
    }
}
