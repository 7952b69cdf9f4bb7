use std::collections::hash_map::{Entry as TableEntry, HashMap, RandomState};
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::{MapError, Result};
use crate::key::WeakKey;
use crate::reaper::{self, ReaperHandle};
use crate::stats::{MapStats, StatCounters};

/// A map from weakly held keys to owned values.
///
/// Callers hold keys as `Arc<K>`; the map keeps only `Weak<K>` handles and
/// never extends a key's lifetime. Once every external `Arc` for a key is
/// dropped the entry is *expired*: lookups with an equal-valued probe miss
/// immediately, and the slot itself is reclaimed by the next scavenge pass
/// (`len`, `scavenge`, iteration cleanup, or the background reaper).
///
/// All operations serialize on a single internal lock, so they are
/// linearizable with respect to each other. The critical sections are O(1)
/// lookups or bounded table walks with no blocking calls inside.
pub struct WeakKeyMap<K, V, S = RandomState> {
    shared: Arc<Shared<K, V, S>>,
    reaper: Option<ReaperHandle>,
}

pub(crate) struct Shared<K, V, S> {
    table: Mutex<HashMap<WeakKey<K>, V>>,
    hash_builder: S,
    pub(crate) counters: StatCounters,
}

impl<K: Eq, V, S> Shared<K, V, S> {
    /// Non-blocking sweep used by the reaper: never waits on the lock.
    /// Returns `None` when the lock is contended and the sweep must be
    /// deferred to a later tick.
    pub(crate) fn try_sweep(&self) -> Option<usize> {
        let mut table = self.table.try_lock()?;
        Some(Self::purge_expired(&mut table, &self.counters))
    }

    fn purge_expired(table: &mut HashMap<WeakKey<K>, V>, counters: &StatCounters) -> usize {
        let before = table.len();
        table.retain(|key, _| key.is_live());
        let purged = before - table.len();
        counters.record_scavenge();
        if purged > 0 {
            counters.record_reaped(purged);
        }
        purged
    }
}

impl<K, V> WeakKeyMap<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self::with_hasher(RandomState::new())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, RandomState::new())
    }
}

impl<K, V, S> WeakKeyMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    /// Creates an empty map that hashes keys with `hash_builder`. Together
    /// with the key type's `Eq` impl this is the map's equality policy.
    pub fn with_hasher(hash_builder: S) -> Self {
        Self::with_capacity_and_hasher(0, hash_builder)
    }

    pub fn with_capacity_and_hasher(capacity: usize, hash_builder: S) -> Self {
        Self {
            shared: Arc::new(Shared {
                table: Mutex::new(HashMap::with_capacity(capacity)),
                hash_builder,
                counters: StatCounters::default(),
            }),
            reaper: None,
        }
    }

    /// Builds the probe wrapper for `key`, capturing its hash now. The hash
    /// must come from the live referent; it is the only part of the entry
    /// key that remains usable after expiry.
    fn probe(&self, key: &Arc<K>) -> WeakKey<K> {
        WeakKey::new(key, self.shared.hash_builder.hash_one(&**key))
    }

    /// Adds a new entry, failing with [`MapError::DuplicateKey`] when an
    /// equal live key is already mapped. A stale entry left behind by an
    /// expired equal-valued key does not count as a duplicate.
    pub fn insert(&self, key: &Arc<K>, value: V) -> Result<()> {
        let probe = self.probe(key);
        let mut table = self.shared.table.lock();
        match table.entry(probe) {
            TableEntry::Occupied(_) => Err(MapError::DuplicateKey),
            TableEntry::Vacant(slot) => {
                slot.insert(value);
                self.shared.counters.record_insert();
                Ok(())
            }
        }
    }

    /// Inserts or overwrites the entry for `key`, returning the replaced
    /// value if there was one. On overwrite the stored weak handle is
    /// re-pointed at `key`, so the entry's liveness follows the caller's
    /// `Arc` rather than whichever equal instance was inserted first.
    pub fn set(&self, key: &Arc<K>, value: V) -> Option<V> {
        let probe = self.probe(key);
        let mut table = self.shared.table.lock();
        let replaced = table.remove(&probe);
        table.insert(probe, value);
        if replaced.is_none() {
            self.shared.counters.record_insert();
        }
        replaced
    }

    /// Returns the value for `key` if an equal live-key entry exists.
    /// Total: absence is `None`, never an error.
    pub fn get(&self, key: &Arc<K>) -> Option<V>
    where
        V: Clone,
    {
        let probe = self.probe(key);
        let table = self.shared.table.lock();
        table.get(&probe).cloned()
    }

    /// Indexed-access form of [`get`](Self::get): absence is
    /// [`MapError::KeyNotFound`].
    pub fn fetch(&self, key: &Arc<K>) -> Result<V>
    where
        V: Clone,
    {
        self.get(key).ok_or(MapError::KeyNotFound)
    }

    pub fn contains_key(&self, key: &Arc<K>) -> bool {
        let probe = self.probe(key);
        let table = self.shared.table.lock();
        table.contains_key(&probe)
    }

    /// Removes the entry for `key`, returning its value if one was present.
    pub fn remove(&self, key: &Arc<K>) -> Option<V> {
        let probe = self.probe(key);
        let mut table = self.shared.table.lock();
        let removed = table.remove(&probe);
        if removed.is_some() {
            self.shared.counters.record_removals(1);
        }
        removed
    }

    /// Number of live entries. Runs a scavenge pass first so stale entries
    /// are not counted; under concurrent reclamation the result is still
    /// best-effort, not point-in-time exact.
    pub fn len(&self) -> usize {
        let mut table = self.shared.table.lock();
        Shared::<K, V, S>::purge_expired(&mut table, &self.shared.counters);
        table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Walks the table and drops every entry whose key has expired.
    /// Returns how many entries were dropped.
    pub fn scavenge(&self) -> usize {
        let mut table = self.shared.table.lock();
        let purged = Shared::<K, V, S>::purge_expired(&mut table, &self.shared.counters);
        if purged > 0 {
            debug!(purged, "scavenged expired entries");
        }
        purged
    }

    /// Snapshot of the currently live keys. Expired entries are skipped,
    /// not removed.
    pub fn keys(&self) -> Vec<Arc<K>> {
        let table = self.shared.table.lock();
        table.keys().filter_map(WeakKey::upgrade).collect()
    }

    /// Snapshot copy of all values, live or not. Does not dereference keys.
    pub fn values(&self) -> Vec<V>
    where
        V: Clone,
    {
        let table = self.shared.table.lock();
        table.values().cloned().collect()
    }

    /// One-shot snapshot iterator over `(key, value)` pairs whose key is
    /// live when the snapshot is taken. Entries found expired during the
    /// walk are removed in a follow-up pass after the walk, inside the same
    /// critical section; entries inserted after the snapshot are not
    /// observed.
    pub fn iter(&self) -> Iter<K, V>
    where
        V: Clone,
    {
        let mut table = self.shared.table.lock();
        let mut pairs = Vec::with_capacity(table.len());
        let mut lost: Vec<WeakKey<K>> = Vec::new();
        for (weak_key, value) in table.iter() {
            match weak_key.upgrade() {
                Some(key) => pairs.push((key, value.clone())),
                None => lost.push(weak_key.clone()),
            }
        }
        if !lost.is_empty() {
            for weak_key in &lost {
                table.remove(weak_key);
            }
            self.shared.counters.record_reaped(lost.len());
            trace!(count = lost.len(), "removed expired entries found during iteration");
        }
        Iter {
            inner: pairs.into_iter(),
        }
    }

    /// Removes all entries.
    pub fn clear(&self) {
        let mut table = self.shared.table.lock();
        let removed = table.len();
        table.clear();
        if removed > 0 {
            self.shared.counters.record_removals(removed);
        }
    }

    pub fn stats(&self) -> MapStats {
        self.shared.counters.snapshot()
    }
}

impl<K, V, S> WeakKeyMap<K, V, S>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Send + 'static,
    S: BuildHasher + Send + Sync + 'static,
{
    /// Starts (or restarts) the background reaper, which purges expired
    /// entries every `interval` without the caller having to touch the map.
    /// The reaper holds no strong reference to the map and shuts down when
    /// the map is dropped.
    pub fn start_reaper(&mut self, interval: Duration) -> Result<()> {
        self.reaper = Some(reaper::spawn(Arc::downgrade(&self.shared), interval)?);
        Ok(())
    }
}

impl<K, V, S> Default for WeakKeyMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
{
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

impl<K, V, S> fmt::Debug for WeakKeyMap<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.shared.table.lock();
        let live = table.keys().filter(|key| key.is_live()).count();
        f.debug_struct("WeakKeyMap")
            .field("entries", &table.len())
            .field("live", &live)
            .field("reaper", &self.reaper.is_some())
            .finish()
    }
}

/// Snapshot iterator returned by [`WeakKeyMap::iter`].
pub struct Iter<K, V> {
    inner: std::vec::IntoIter<(Arc<K>, V)>,
}

impl<K, V> Iterator for Iter<K, V> {
    type Item = (Arc<K>, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Iter<K, V> {}
