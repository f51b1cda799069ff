//! Thread-Safe Sharded Store
//!
//! This module implements the concurrent map every aging entry lives in.
//! It knows nothing about time: it stores opaque values under opaque keys and
//! provides the few atomic primitives the aging layer builds on.
//!
//! ## Design Decisions
//!
//! 1. **Sharded Locks**: Instead of one big lock, we use multiple shards to reduce contention.
//! 2. **Cloned reads**: Values are cloned out on read, so no lock outlives a call.
//! 3. **Conditional mutation**: `remove_if` and `insert_or_keep` re-check their predicate
//!    under the shard's write lock, which makes check-then-act atomic per key.
//! 4. **Snapshot visits**: `visit_all` copies one shard's keys at a time and releases the lock
//!    before calling the visitor, so a visitor may freely insert or remove keys.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     ConcurrentStore                         │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │ Shard N │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ RwLock  │           │
//! │  │ HashMap │ │ HashMap │ │ HashMap │ │ HashMap │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Keys are distributed across shards using a hash function.
//! This allows multiple threads to read/write different keys concurrently.

use std::borrow::Borrow;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Number of shards for the store.
/// More shards = less lock contention, but more memory overhead.
/// 64 is a good balance for most workloads.
const NUM_SHARDS: usize = 64;

/// A single shard containing a portion of the key-value pairs.
struct Shard<K, V> {
    data: RwLock<HashMap<K, V>>,
}

impl<K, V> Shard<K, V> {
    fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
        }
    }

    // A panic inside a caller-supplied predicate poisons the lock; the map
    // itself is never left half-updated, so the guard is safe to reuse.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<K, V>> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<K, V>> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A thread-safe map from keys to values, split into independently locked shards.
///
/// # Thread Safety
///
/// Every operation takes at most one shard lock at a time and never calls
/// back into user code while holding a read lock, so the store can be shared
/// behind an `Arc` across any number of threads.
///
/// # Example
///
/// ```
/// use agemap::storage::ConcurrentStore;
///
/// let store = ConcurrentStore::new();
///
/// assert!(store.insert("name", 1));
/// assert_eq!(store.get("name"), Some(1));
///
/// // Overwrites report that the key already existed
/// assert!(!store.insert("name", 2));
/// assert_eq!(store.len(), 1);
/// ```
pub struct ConcurrentStore<K, V> {
    /// Sharded storage for reduced lock contention
    shards: Vec<Shard<K, V>>,

    /// Number of entries across all shards (approximate under contention)
    len: AtomicUsize,

    /// Shard the next `visit_all` starts from
    cursor_shard: AtomicUsize,

    /// Position inside that shard where the last interrupted visit stopped
    cursor_offset: AtomicUsize,
}

impl<K, V> std::fmt::Debug for ConcurrentStore<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConcurrentStore")
            .field("shards", &self.shards.len())
            .field("len", &self.len.load(Ordering::Relaxed))
            .finish()
    }
}

impl<K: Hash + Eq, V> Default for ConcurrentStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Hash + Eq, V> ConcurrentStore<K, V> {
    /// Creates an empty store.
    pub fn new() -> Self {
        let shards = (0..NUM_SHARDS).map(|_| Shard::new()).collect();

        Self {
            shards,
            len: AtomicUsize::new(0),
            cursor_shard: AtomicUsize::new(0),
            cursor_offset: AtomicUsize::new(0),
        }
    }

    /// Determines which shard a key belongs to.
    #[inline]
    fn shard_index<Q: Hash + ?Sized>(&self, key: &Q) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % NUM_SHARDS
    }

    /// Gets the shard for a given key.
    #[inline]
    fn get_shard<Q: Hash + ?Sized>(&self, key: &Q) -> &Shard<K, V> {
        &self.shards[self.shard_index(key)]
    }

    /// Inserts a value, overwriting any previous value under `key`.
    ///
    /// # Returns
    ///
    /// Returns `true` if a new key was created, `false` if an existing key was updated.
    pub fn insert(&self, key: K, value: V) -> bool {
        let shard = self.get_shard(&key);
        let mut data = shard.write();

        let is_new = data.insert(key, value).is_none();
        if is_new {
            self.len.fetch_add(1, Ordering::Relaxed);
        }

        is_new
    }

    /// Returns a clone of the value stored under `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        self.get_shard(key).read().get(key).cloned()
    }

    /// Removes `key`, returning its value if it was present.
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let removed = self.get_shard(key).write().remove(key);
        if removed.is_some() {
            self.len.fetch_sub(1, Ordering::Relaxed);
        }
        removed
    }

    /// Removes `key` only if `predicate` holds for its current value.
    ///
    /// The predicate is evaluated under the shard's write lock, so a value
    /// written by another thread after the caller's last read is judged on
    /// its own merits rather than removed by mistake.
    ///
    /// # Returns
    ///
    /// Returns `true` if the key was removed.
    pub fn remove_if<Q, F>(&self, key: &Q, predicate: F) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        F: FnOnce(&V) -> bool,
    {
        let shard = self.get_shard(key);
        let mut data = shard.write();

        if !data.get(key).is_some_and(predicate) {
            return false;
        }

        data.remove(key);
        self.len.fetch_sub(1, Ordering::Relaxed);
        true
    }

    /// Atomic check-and-set on a single key.
    ///
    /// If `key` holds a value for which `keep` returns `true`, that value is
    /// returned untouched. Otherwise `value` is installed (replacing whatever
    /// was there) and returned. The check and the install happen under one
    /// write lock, so concurrent callers on the same key are serialized.
    ///
    /// # Returns
    ///
    /// The value now stored under `key`, and `true` if it is the one passed in.
    pub fn insert_or_keep<F>(&self, key: K, value: V, keep: F) -> (V, bool)
    where
        V: Clone,
        F: FnOnce(&V) -> bool,
    {
        let shard = self.get_shard(&key);
        let mut data = shard.write();

        match data.entry(key) {
            Entry::Occupied(mut occupied) => {
                if keep(occupied.get()) {
                    return (occupied.get().clone(), false);
                }
                occupied.insert(value.clone());
                (value, true)
            }
            Entry::Vacant(vacant) => {
                vacant.insert(value.clone());
                self.len.fetch_add(1, Ordering::Relaxed);
                (value, true)
            }
        }
    }

    /// Calls `visitor` for the entries held by the store, stopping as soon as
    /// it returns `false`.
    ///
    /// Each shard's keys are copied and the shard unlocked before they are
    /// visited, so the visitor may insert or remove keys (including the one it
    /// was handed). Values are cloned one at a time, only for the keys actually
    /// visited. Entries added or removed by anyone during the visit may or may
    /// not be seen. Visits start where the last interrupted visit stopped, so a run
    /// of partial visits works its way around the whole store.
    ///
    /// # Returns
    ///
    /// Returns `true` if every shard was visited, `false` if the visitor stopped early.
    pub fn visit_all<F>(&self, mut visitor: F) -> bool
    where
        K: Clone,
        V: Clone,
        F: FnMut(&K, &V) -> bool,
    {
        let start = self.cursor_shard.load(Ordering::Relaxed) % NUM_SHARDS;
        let skip = self.cursor_offset.load(Ordering::Relaxed);

        // The start shard is split in two: its tail is visited first and its
        // head last, after wrapping around the other shards.
        for step in 0..=NUM_SHARDS {
            let index = (start + step) % NUM_SHARDS;
            let (first, keys) = {
                let data = self.shards[index].read();
                let (first, last) = match step {
                    0 => (skip.min(data.len()), data.len()),
                    NUM_SHARDS => (0, skip.min(data.len())),
                    _ => (0, data.len()),
                };
                let keys: Vec<K> = data.keys().skip(first).take(last - first).cloned().collect();
                (first, keys)
            };

            for (position, key) in keys.iter().enumerate() {
                // Removed since the keys were copied
                let Some(value) = self.get(key) else {
                    continue;
                };
                if !visitor(key, &value) {
                    self.cursor_shard.store(index, Ordering::Relaxed);
                    self.cursor_offset.store(first + position + 1, Ordering::Relaxed);
                    return false;
                }
            }
        }

        true
    }

    /// Removes every entry.
    pub fn clear(&self) {
        for shard in &self.shards {
            let mut data = shard.write();
            let removed = data.len();
            data.clear();
            self.len.fetch_sub(removed, Ordering::Relaxed);
        }
    }

    /// Returns the number of entries in the store.
    ///
    /// This is an instantaneous reading and may be stale under concurrent writes.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    /// Returns true if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_insert_and_get() {
        let store = ConcurrentStore::new();

        assert!(store.insert("key".to_string(), 1));
        assert_eq!(store.get("key"), Some(1));
        assert_eq!(store.get("missing"), None);
    }

    #[test]
    fn test_insert_overwrites() {
        let store = ConcurrentStore::new();

        assert!(store.insert("key", "a"));
        assert!(!store.insert("key", "b"));
        assert_eq!(store.get("key"), Some("b"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_remove() {
        let store = ConcurrentStore::new();

        store.insert("key", 1);
        assert_eq!(store.remove("key"), Some(1));
        assert_eq!(store.remove("key"), None); // Already removed
        assert!(store.is_empty());
    }

    #[test]
    fn test_remove_if() {
        let store = ConcurrentStore::new();
        store.insert("key", 10);

        assert!(!store.remove_if("key", |v| *v > 10));
        assert_eq!(store.get("key"), Some(10));

        assert!(store.remove_if("key", |v| *v == 10));
        assert_eq!(store.get("key"), None);
        assert_eq!(store.len(), 0);

        // Missing keys never call the predicate
        assert!(!store.remove_if("key", |_| panic!("called on missing key")));
    }

    #[test]
    fn test_insert_or_keep() {
        let store = ConcurrentStore::new();

        // Vacant: installs
        assert_eq!(store.insert_or_keep("key", 1, |_| true), (1, true));
        // Occupied and kept
        assert_eq!(store.insert_or_keep("key", 2, |_| true), (1, false));
        // Occupied but rejected: replaced
        assert_eq!(store.insert_or_keep("key", 3, |_| false), (3, true));
        assert_eq!(store.get("key"), Some(3));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_visit_all_sees_everything() {
        let store = ConcurrentStore::new();
        for i in 0..500 {
            store.insert(i, i * 2);
        }

        let mut seen = HashSet::new();
        assert!(store.visit_all(|k, v| {
            assert_eq!(*v, k * 2);
            seen.insert(*k);
            true
        }));
        assert_eq!(seen.len(), 500);
    }

    #[test]
    fn test_visit_all_stops_early() {
        let store = ConcurrentStore::new();
        for i in 0..100 {
            store.insert(i, ());
        }

        let mut visited = 0;
        let completed = store.visit_all(|_, _| {
            visited += 1;
            visited < 10
        });

        assert!(!completed);
        assert_eq!(visited, 10);
    }

    #[test]
    fn test_visit_all_allows_mutation() {
        let store = ConcurrentStore::new();
        for i in 0..200 {
            store.insert(i, i);
        }

        // Removing from inside the visitor must not deadlock
        store.visit_all(|k, _| {
            store.remove(k);
            store.insert(k + 1000, 0);
            true
        });

        for i in 0..200 {
            assert_eq!(store.get(&i), None);
        }
    }

    #[test]
    fn test_partial_visits_rotate() {
        let store = ConcurrentStore::new();
        for i in 0..1000 {
            store.insert(i, ());
        }

        // Each visit stops after a handful of entries; together they must
        // eventually reach every key instead of rescanning the same prefix.
        let mut seen = HashSet::new();
        for _ in 0..2000 {
            let mut budget = 5;
            store.visit_all(|k, _| {
                seen.insert(*k);
                budget -= 1;
                budget > 0
            });
        }

        assert_eq!(seen.len(), 1000);
    }

    #[test]
    fn test_visit_all_clones_only_visited_values() {
        use std::sync::atomic::AtomicUsize;
        use std::sync::Arc;

        struct Counted(Arc<AtomicUsize>);

        impl Clone for Counted {
            fn clone(&self) -> Self {
                self.0.fetch_add(1, Ordering::SeqCst);
                Counted(Arc::clone(&self.0))
            }
        }

        let clones = Arc::new(AtomicUsize::new(0));
        let store = ConcurrentStore::new();
        for i in 0..1000 {
            store.insert(i, Counted(Arc::clone(&clones)));
        }

        let mut budget = 3;
        store.visit_all(|_, _| {
            budget -= 1;
            budget > 0
        });

        assert_eq!(clones.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_visit_all_with_concurrent_writers() {
        use std::sync::atomic::AtomicBool;
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(ConcurrentStore::new());
        for i in 0..1000 {
            store.insert(i, i);
        }

        let done = Arc::new(AtomicBool::new(false));
        let writer = {
            let store = Arc::clone(&store);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                for i in 0..20_000 {
                    let key = i % 2000;
                    if i % 3 == 0 {
                        store.remove(&key);
                    } else {
                        store.insert(key, i);
                    }
                }
                done.store(true, Ordering::SeqCst);
            })
        };

        while !done.load(Ordering::SeqCst) {
            store.visit_all(|k, _| *k < 2000);
        }
        writer.join().unwrap();

        let mut count = 0;
        assert!(store.visit_all(|_, _| {
            count += 1;
            true
        }));
        assert_eq!(count, store.len());
    }

    #[test]
    fn test_clear() {
        let store = ConcurrentStore::new();

        store.insert("key1", 1);
        store.insert("key2", 2);
        assert_eq!(store.len(), 2);

        store.clear();

        assert_eq!(store.len(), 0);
        assert!(store.is_empty());
        assert_eq!(store.get("key1"), None);
    }

    #[test]
    fn test_recovers_from_poisoned_shard() {
        let store = ConcurrentStore::new();
        store.insert("key", 1);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            store.insert_or_keep("key", 2, |_| panic!("predicate failed"));
        }));
        assert!(result.is_err());

        assert_eq!(store.get("key"), Some(1));
        assert!(!store.insert("key", 3));
        assert_eq!(store.get("key"), Some(3));
    }

    #[test]
    fn test_concurrent_access() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(ConcurrentStore::new());
        let mut handles = vec![];

        // Spawn multiple writers
        for i in 0..10 {
            let store = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                for j in 0..100 {
                    let key = format!("key-{}-{}", i, j);
                    store.insert(key.clone(), j);
                    assert_eq!(store.get(&key), Some(j));
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len(), 1000);
    }
}
