//! The aging map: a concurrent map whose entries expire individually.
//!
//! Every operation checks expiry against the wall clock (lazy eviction): a
//! read that finds an expired entry deletes it and reports it as absent. A
//! map built with [`EvictionMode::Active`] additionally owns an
//! [`ExpirySweeper`] that periodically inspects part of the table and deletes
//! the expired entries it finds.
//!
//! Apart from [`AgingMap::load_or_store`], operations on the same key compose
//! without any ordering guarantee: a `load` racing a `delete` may observe
//! either order.

use crate::config::{EvictionMode, SweepConfig};
use crate::error::Result;
use crate::storage::{ConcurrentStore, ExpirySweeper, Sweep, SweepReport};
use crate::value::AgingValue;
use std::borrow::Borrow;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// State shared between the map and its sweeper task.
struct Shared<K, V> {
    store: ConcurrentStore<K, AgingValue<V>>,
    stats: Counters,
}

#[derive(Debug, Default)]
struct Counters {
    stores: AtomicU64,
    loads: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    lazy_evictions: AtomicU64,
    swept_evictions: AtomicU64,
    sweep_cycles: AtomicU64,
}

impl<K: Hash + Eq, V> Shared<K, V> {
    fn new() -> Self {
        Self {
            store: ConcurrentStore::new(),
            stats: Counters::default(),
        }
    }

    /// One partial sweep over the table.
    ///
    /// The cycle keeps going while `visited / len < delete_scale`, reading
    /// `len` afresh after every entry. Deletions made by the cycle itself
    /// (or by anyone else) shrink the denominator as it runs.
    fn sweep_expired(&self, delete_scale: f64) -> SweepReport
    where
        K: Clone,
        V: Clone,
    {
        let mut visited = 0usize;
        let mut expired = 0usize;

        self.store.visit_all(|key, value| {
            visited += 1;
            if value.is_expired() && self.store.remove_if(key, AgingValue::is_expired) {
                expired += 1;
            }
            (visited as f64) / (self.store.len() as f64) < delete_scale
        });

        self.stats.sweep_cycles.fetch_add(1, Ordering::Relaxed);
        self.stats
            .swept_evictions
            .fetch_add(expired as u64, Ordering::Relaxed);

        SweepReport {
            visited,
            expired,
            remaining: self.store.len(),
        }
    }
}

impl<K, V> Sweep for Shared<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn sweep(&self, delete_scale: f64) -> SweepReport {
        self.sweep_expired(delete_scale)
    }
}

/// A concurrency-safe map where every entry carries its own time-to-live.
///
/// Entries become invisible to every read as soon as their TTL has elapsed
/// and are physically removed either by the read that notices, or by the
/// background sweeper when the map was built with active eviction.
///
/// # Thread Safety
///
/// All operations take `&self`; share the map across threads with an `Arc`.
///
/// # Example
///
/// ```
/// use agemap::AgingMap;
/// use std::time::Duration;
///
/// let map = AgingMap::lazy();
///
/// map.store("session", "token123", Duration::from_secs(60));
/// assert_eq!(map.load("session"), Some("token123"));
///
/// // Only the first caller installs a value
/// let ttl = Duration::from_secs(60);
/// assert_eq!(map.load_or_store("owner", "first", ttl), ("first", true));
/// assert_eq!(map.load_or_store("owner", "second", ttl), ("first", false));
///
/// map.delete("session");
/// assert_eq!(map.load("session"), None);
/// ```
pub struct AgingMap<K, V> {
    shared: Arc<Shared<K, V>>,

    /// Background sweeper; `None` in lazy mode
    sweeper: Option<ExpirySweeper>,

    /// Sweep configuration the map was built with
    sweep_config: Option<SweepConfig>,
}

impl<K: Hash + Eq, V> std::fmt::Debug for AgingMap<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgingMap")
            .field("len", &self.shared.store.len())
            .field("sweep_config", &self.sweep_config)
            .field("sweeping", &self.is_sweeping())
            .finish()
    }
}

impl<K, V> AgingMap<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Creates a map that sweeps itself every second, inspecting half of the
    /// table per cycle.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime context.
    pub fn new() -> Self {
        Self::with_mode(EvictionMode::default())
    }

    /// Creates a map that sweeps itself every `interval`, inspecting
    /// `delete_scale` of the table per cycle.
    ///
    /// A `delete_scale` outside `(0, 1]` falls back to 0.5 and a zero
    /// interval falls back to one second; both are logged as warnings.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime context.
    pub fn with_sweep(interval: Duration, delete_scale: f64) -> Self {
        Self::with_mode(EvictionMode::Active(
            SweepConfig::new()
                .with_interval(interval)
                .with_delete_scale(delete_scale),
        ))
    }

    /// Creates a map with the given eviction mode.
    ///
    /// # Panics
    ///
    /// Panics if active eviction is requested outside of a Tokio runtime
    /// context. Use [`AgingMap::try_with_mode`] to get an error instead.
    pub fn with_mode(mode: EvictionMode) -> Self {
        match mode {
            EvictionMode::Active(config) => {
                let config = config.normalized();
                let shared = Arc::new(Shared::new());
                let sweeper = ExpirySweeper::start(Arc::clone(&shared), config);
                Self {
                    shared,
                    sweeper: Some(sweeper),
                    sweep_config: Some(config),
                }
            }
            EvictionMode::Lazy => Self::lazy(),
        }
    }

    /// Creates a map with the given eviction mode, returning
    /// [`Error::NoRuntime`](crate::Error::NoRuntime) when active eviction is
    /// requested outside of a Tokio runtime.
    pub fn try_with_mode(mode: EvictionMode) -> Result<Self> {
        match mode {
            EvictionMode::Active(config) => {
                let config = config.normalized();
                let shared = Arc::new(Shared::new());
                let sweeper = ExpirySweeper::try_start(Arc::clone(&shared), config)?;
                Ok(Self {
                    shared,
                    sweeper: Some(sweeper),
                    sweep_config: Some(config),
                })
            }
            EvictionMode::Lazy => Ok(Self::lazy()),
        }
    }
}

impl<K, V> Default for AgingMap<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Same as [`AgingMap::new`]; panics outside of a Tokio runtime.
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Hash + Eq, V> AgingMap<K, V> {
    /// Creates a map without a background sweeper.
    ///
    /// Expired entries are removed only when an access finds them. An entry
    /// that is never read again stays in memory until the map is dropped.
    pub fn lazy() -> Self {
        Self {
            shared: Arc::new(Shared::new()),
            sweeper: None,
            sweep_config: None,
        }
    }

    /// Stores `value` under `key` for `ttl`.
    ///
    /// Any existing entry is replaced wholesale, restarting the clock even if
    /// the old entry was still live.
    pub fn store(&self, key: K, value: V, ttl: Duration) {
        self.shared.stats.stores.fetch_add(1, Ordering::Relaxed);
        self.shared.store.insert(key, AgingValue::new(value, ttl));
    }

    /// Deletes `key` whether or not it has expired. Missing keys are ignored.
    pub fn delete<Q>(&self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.shared.store.remove(key);
    }

    /// Returns the number of entries held, including expired entries that
    /// have not been reclaimed yet.
    pub fn len(&self) -> usize {
        self.shared.store.len()
    }

    /// Returns true if the map holds no entries at all.
    pub fn is_empty(&self) -> bool {
        self.shared.store.is_empty()
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.shared.store.clear();
    }

    /// Returns the sweep configuration, or `None` for a lazy map.
    pub fn sweep_config(&self) -> Option<SweepConfig> {
        self.sweep_config
    }

    /// Returns true while a background sweeper is running for this map.
    pub fn is_sweeping(&self) -> bool {
        self.sweeper
            .as_ref()
            .is_some_and(|sweeper| sweeper.is_running())
    }

    /// Stops the background sweeper, if any.
    ///
    /// The map keeps working in lazy mode afterwards. Dropping the map stops
    /// the sweeper as well.
    pub fn stop_sweeping(&self) {
        if let Some(sweeper) = &self.sweeper {
            sweeper.stop();
        }
    }

    /// Returns map statistics.
    pub fn stats(&self) -> AgingStats {
        let stats = &self.shared.stats;
        AgingStats {
            entries: self.shared.store.len(),
            stores: stats.stores.load(Ordering::Relaxed),
            loads: stats.loads.load(Ordering::Relaxed),
            hits: stats.hits.load(Ordering::Relaxed),
            misses: stats.misses.load(Ordering::Relaxed),
            lazy_evictions: stats.lazy_evictions.load(Ordering::Relaxed),
            swept_evictions: stats.swept_evictions.load(Ordering::Relaxed),
            sweep_cycles: stats.sweep_cycles.load(Ordering::Relaxed),
        }
    }

    /// Deletes `key` if it still holds an expired entry.
    fn evict_expired<Q>(&self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        if self.shared.store.remove_if(key, AgingValue::is_expired) {
            self.shared
                .stats
                .lazy_evictions
                .fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl<K: Hash + Eq, V: Clone> AgingMap<K, V> {
    /// Returns the value stored under `key`, or `None` if it is absent or expired.
    ///
    /// Finding an expired entry deletes it, so a load may mutate the map.
    pub fn load<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.load_with_deadline(key).map(|(value, _)| value)
    }

    /// Like [`AgingMap::load`], but also returns the entry's remaining lifetime.
    ///
    /// The remaining lifetime is always greater than zero.
    ///
    /// # Example
    ///
    /// ```
    /// use agemap::AgingMap;
    /// use std::time::Duration;
    ///
    /// let map = AgingMap::lazy();
    /// map.store(1, "a", Duration::from_secs(60));
    ///
    /// let (value, remaining) = map.load_with_deadline(&1).unwrap();
    /// assert_eq!(value, "a");
    /// assert!(remaining <= Duration::from_secs(60));
    /// println!("expires in {:.3}s", remaining.as_secs_f64());
    /// ```
    pub fn load_with_deadline<Q>(&self, key: &Q) -> Option<(V, Duration)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let stats = &self.shared.stats;
        stats.loads.fetch_add(1, Ordering::Relaxed);

        let now = Instant::now();
        let Some(entry) = self.shared.store.get(key) else {
            stats.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        };

        match entry.remaining_at(now) {
            Some(remaining) => {
                stats.hits.fetch_add(1, Ordering::Relaxed);
                Some((entry.into_value(), remaining))
            }
            None => {
                self.evict_expired(key);
                stats.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Returns the live value under `key`, or stores `value` for `ttl` if the
    /// key is absent or expired.
    ///
    /// The check and the store are one atomic step: when several callers race
    /// on the same key, exactly one of them stores and all of them get the
    /// winner's value back.
    ///
    /// # Returns
    ///
    /// The value now held under `key`, and `true` if it was stored by this call.
    pub fn load_or_store(&self, key: K, value: V, ttl: Duration) -> (V, bool) {
        let entry = AgingValue::new(value, ttl);
        let (current, stored) = self
            .shared
            .store
            .insert_or_keep(key, entry, |existing| !existing.is_expired());

        let stats = &self.shared.stats;
        stats.loads.fetch_add(1, Ordering::Relaxed);
        if stored {
            stats.stores.fetch_add(1, Ordering::Relaxed);
            stats.misses.fetch_add(1, Ordering::Relaxed);
        } else {
            stats.hits.fetch_add(1, Ordering::Relaxed);
        }

        (current.into_value(), stored)
    }
}

impl<K: Hash + Eq + Clone, V: Clone> AgingMap<K, V> {
    /// Calls `f` for each live entry until it returns `false`.
    ///
    /// Expired entries met along the way are deleted and skipped; `f` never
    /// sees them. Once `f` returns `false` the traversal ends, including its
    /// expiry checks. No ordering is guaranteed, and entries changed by other
    /// threads during the traversal may or may not be seen.
    pub fn range<F>(&self, mut f: F)
    where
        F: FnMut(&K, &V) -> bool,
    {
        self.shared.store.visit_all(|key, entry| {
            if entry.is_expired() {
                self.evict_expired(key);
                return true;
            }
            f(key, entry.value())
        });
    }

    /// Runs one sweep cycle on the calling thread, inspecting roughly
    /// `delete_scale` of the table.
    ///
    /// This is the same cycle the background sweeper runs, available to lazy
    /// maps that want to reclaim memory on their own schedule. A
    /// `delete_scale` outside `(0, 1]` falls back to 0.5, as it does for the
    /// constructors.
    pub fn sweep(&self, delete_scale: f64) -> SweepReport {
        let config = SweepConfig::new()
            .with_delete_scale(delete_scale)
            .normalized();
        self.shared.sweep_expired(config.delete_scale)
    }
}

/// Map statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AgingStats {
    /// Entries currently held, expired-but-unreclaimed included
    pub entries: usize,
    /// Values installed by `store` or `load_or_store`
    pub stores: u64,
    /// Calls to `load`, `load_with_deadline` or `load_or_store`
    pub loads: u64,
    /// Loads that found a live entry
    pub hits: u64,
    /// Loads that found nothing live; `hits + misses == loads`
    pub misses: u64,
    /// Expired entries deleted by reads
    pub lazy_evictions: u64,
    /// Expired entries deleted by sweep cycles
    pub swept_evictions: u64,
    /// Completed sweep cycles
    pub sweep_cycles: u64,
}
