//! Compute-once keyed cache with a periodic staleness check.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};

use crate::error::{Error, Result};

/// Default interval after which a cached entry may be recomputed.
pub const DEFAULT_CHECK_PERIOD: Duration = Duration::from_millis(60_000);

type SharedLoad<V> = Shared<BoxFuture<'static, Result<V>>>;

/// Concurrent cache that computes a value at most once per key and check period.
///
/// A value is computed on first access and served from memory until its check
/// period has elapsed; the next access after that recomputes it. The check
/// period is a staleness tolerance window rather than a hard TTL: an entry
/// nobody asks for is never refreshed.
///
/// Concurrent callers for the same key share a single in-flight computation.
/// Different keys are computed independently.
///
/// `remove` and `clear` do not wait for in-flight computations. A computation
/// that completes after its key was cleared stores its result anyway.
#[derive(Debug)]
pub struct PeriodicCache<K, V> {
    inner: Arc<Mutex<CacheState<K, V>>>,
    check_period: Duration,
    eviction_threshold: Option<usize>,
}

#[derive(Debug)]
struct CacheState<K, V> {
    entries: HashMap<K, Slot<V>>,
    next_generation: u64,
}

enum Slot<V> {
    Ready(CacheEntry<V>),
    Loading { generation: u64, load: SharedLoad<V> },
}

impl<V> std::fmt::Debug for Slot<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready(entry) => f
                .debug_struct("Ready")
                .field("computed_at", &entry.computed_at)
                .finish_non_exhaustive(),
            Self::Loading { generation, .. } => f
                .debug_struct("Loading")
                .field("generation", generation)
                .finish_non_exhaustive(),
        }
    }
}

#[derive(Debug)]
struct CacheEntry<V> {
    value: V,
    computed_at: Instant,
}

enum Lookup<V> {
    Hit(V),
    Wait(SharedLoad<V>),
    Load,
}

enum Registration<V> {
    Cached(V),
    Joined(SharedLoad<V>),
    Started(SharedLoad<V>),
}

impl<K, V> Clone for PeriodicCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            check_period: self.check_period,
            eviction_threshold: self.eviction_threshold,
        }
    }
}

impl<K, V> Default for PeriodicCache<K, V> {
    fn default() -> Self {
        Self::new(DEFAULT_CHECK_PERIOD)
    }
}

impl<K, V> PeriodicCache<K, V> {
    /// Creates a new cache with the given check period.
    pub fn new(check_period: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CacheState {
                entries: HashMap::new(),
                next_generation: 0,
            })),
            check_period,
            eviction_threshold: None,
        }
    }

    /// Prunes stale entries whenever an insert grows the cache past `threshold`.
    pub fn with_eviction_threshold(mut self, threshold: usize) -> Self {
        self.eviction_threshold = Some(threshold);
        self
    }

    /// Returns the configured check period.
    pub fn check_period(&self) -> Duration {
        self.check_period
    }

    /// Returns the number of computed entries.
    pub fn len(&self) -> usize {
        let guard = self.inner.lock().expect("poisoned lock");
        guard
            .entries
            .values()
            .filter(|slot| matches!(slot, Slot::Ready(_)))
            .count()
    }

    /// Returns whether the cache holds no computed entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every entry. In-flight computations are not cancelled.
    pub fn clear(&self) {
        let mut guard = self.inner.lock().expect("poisoned lock");
        guard.entries.clear();
    }

    fn is_stale(entry: &CacheEntry<V>, check_period: Duration, now: Instant) -> bool {
        now.saturating_duration_since(entry.computed_at) > check_period
    }

    fn prune_stale(state: &mut CacheState<K, V>, check_period: Duration, now: Instant) {
        state.entries.retain(|_, slot| match slot {
            Slot::Ready(entry) => !Self::is_stale(entry, check_period, now),
            Slot::Loading { .. } => true,
        });
    }
}

impl<K, V> PeriodicCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Returns the value for `key`, computing it with `loader` when it is
    /// absent or its check period has elapsed.
    ///
    /// `loader` runs at most once per key at a time. Callers that arrive while
    /// a computation is in flight await it instead of starting another one; if
    /// it fails they receive the failure wrapped in
    /// [`Error::CacheComputation`]. Failures are never stored.
    ///
    /// A computation that panics leaves no entry behind; the panic reaches
    /// every caller awaiting it and the next call computes again.
    pub async fn compute_if_absent_or_stale<F, Fut>(&self, key: K, loader: F) -> Result<V>
    where
        F: FnOnce(K) -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let registration = match self.lookup(&key) {
            Lookup::Hit(value) => return Ok(value),
            Lookup::Wait(load) => Registration::Joined(load),
            Lookup::Load => self.start_load(key.clone(), loader(key)),
        };
        let (load, leader) = match registration {
            Registration::Cached(value) => return Ok(value),
            Registration::Joined(load) => (load, false),
            Registration::Started(load) => (load, true),
        };

        match load.await {
            Ok(value) => Ok(value),
            Err(err) if leader => Err(err),
            Err(err) => Err(Error::CacheComputation(Box::new(err))),
        }
    }

    /// Returns the cached value for `key` if present and not stale.
    pub fn get(&self, key: &K) -> Option<V> {
        match self.lookup(key) {
            Lookup::Hit(value) => Some(value),
            Lookup::Wait(_) | Lookup::Load => None,
        }
    }

    /// Removes the entry for `key`, if any.
    pub fn remove(&self, key: &K) {
        let mut guard = self.inner.lock().expect("poisoned lock");
        guard.entries.remove(key);
    }

    fn lookup(&self, key: &K) -> Lookup<V> {
        let now = Instant::now();
        let guard = self.inner.lock().expect("poisoned lock");
        Self::lookup_in(&guard, key, self.check_period, now)
    }

    fn lookup_in(
        state: &CacheState<K, V>,
        key: &K,
        check_period: Duration,
        now: Instant,
    ) -> Lookup<V> {
        match state.entries.get(key) {
            Some(Slot::Ready(entry)) if !Self::is_stale(entry, check_period, now) => {
                Lookup::Hit(entry.value.clone())
            }
            Some(Slot::Loading { load, .. }) => Lookup::Wait(load.clone()),
            Some(Slot::Ready(_)) | None => Lookup::Load,
        }
    }

    /// Registers `pending` as the in-flight computation for `key`, unless
    /// another caller has started or finished one since the lookup. In that
    /// case `pending` is dropped without being polled.
    fn start_load<Fut>(&self, key: K, pending: Fut) -> Registration<V>
    where
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let mut guard = self.inner.lock().expect("poisoned lock");
        match Self::lookup_in(&guard, &key, self.check_period, Instant::now()) {
            Lookup::Hit(value) => return Registration::Cached(value),
            Lookup::Wait(load) => return Registration::Joined(load),
            Lookup::Load => {}
        }

        let generation = guard.next_generation;
        guard.next_generation += 1;

        let inner = Arc::clone(&self.inner);
        let check_period = self.check_period;
        let eviction_threshold = self.eviction_threshold;
        let slot_key = key.clone();
        let load = async move {
            let outcome = match AssertUnwindSafe(pending).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(payload) => {
                    let mut guard = inner.lock().expect("poisoned lock");
                    if matches!(
                        guard.entries.get(&slot_key),
                        Some(Slot::Loading { generation: g, .. }) if *g == generation
                    ) {
                        guard.entries.remove(&slot_key);
                    }
                    drop(guard);
                    panic::resume_unwind(payload);
                }
            };
            let mut guard = inner.lock().expect("poisoned lock");
            let current = match guard.entries.get(&slot_key) {
                Some(Slot::Loading { generation: g, .. }) => Some(*g),
                _ => None,
            };
            // A newer computation owns the slot; leave it alone.
            if current.is_some_and(|g| g != generation) {
                return outcome;
            }
            match &outcome {
                Ok(value) => {
                    let now = Instant::now();
                    guard.entries.insert(
                        slot_key,
                        Slot::Ready(CacheEntry {
                            value: value.clone(),
                            computed_at: now,
                        }),
                    );
                    if let Some(threshold) = eviction_threshold
                        && guard.entries.len() > threshold
                    {
                        Self::prune_stale(&mut guard, check_period, now);
                    }
                }
                Err(_) => {
                    if current == Some(generation) {
                        guard.entries.remove(&slot_key);
                    }
                }
            }
            drop(guard);
            outcome
        }
        .boxed()
        .shared();

        guard.entries.insert(
            key,
            Slot::Loading {
                generation,
                load: load.clone(),
            },
        );
        Registration::Started(load)
    }
}
