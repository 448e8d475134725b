use super::{CorrelationId, ResponseMetadata};
use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::{Duration, Instant};

/// Writes between sweeps of expired entries under [`EvictionPolicy::Ttl`].
const TTL_SWEEP_INTERVAL: u64 = 256;

static GLOBAL_STORE: OnceLock<Arc<CorrelationStore>> = OnceLock::new();

/// How stale correlation entries are reclaimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictionPolicy {
    /// Entries live for the whole process.
    #[default]
    Unbounded,
    /// Keep at most N entries, evicting the least recently used.
    Capacity(NonZeroUsize),
    /// Entries older than the duration are treated as absent and swept.
    Ttl(Duration),
}

impl EvictionPolicy {
    /// Capacity-bounded policy; `None` for a zero capacity.
    pub fn capacity(entries: usize) -> Option<Self> {
        NonZeroUsize::new(entries).map(Self::Capacity)
    }
}

/// Read/write counters for a store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub reads: u64,
    pub writes: u64,
}

#[derive(Debug)]
struct Entry {
    metadata: ResponseMetadata,
    stored_at: Instant,
}

impl Entry {
    fn new(metadata: ResponseMetadata) -> Self {
        Self {
            metadata,
            stored_at: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Option<Duration>) -> bool {
        match ttl {
            Some(ttl) => self.stored_at.elapsed() >= ttl,
            None => false,
        }
    }
}

#[derive(Debug)]
enum Table {
    Map(HashMap<CorrelationId, Entry>),
    Lru(LruCache<CorrelationId, Entry>),
}

/// `CorrelationId → ResponseMetadata` table.
///
/// Every operation takes the lock for exactly one read or write; it is never
/// held while a provider call is in flight.
#[derive(Debug)]
pub struct CorrelationStore {
    table: Mutex<Table>,
    ttl: Option<Duration>,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl CorrelationStore {
    pub fn new(policy: EvictionPolicy) -> Self {
        let (table, ttl) = match policy {
            EvictionPolicy::Unbounded => (Table::Map(HashMap::new()), None),
            EvictionPolicy::Capacity(cap) => (Table::Lru(LruCache::new(cap)), None),
            EvictionPolicy::Ttl(ttl) => (Table::Map(HashMap::new()), Some(ttl)),
        };
        Self {
            table: Mutex::new(table),
            ttl,
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        }
    }

    /// The process-wide store, created on first use with the eviction policy
    /// of the global configuration.
    pub fn global() -> Arc<CorrelationStore> {
        GLOBAL_STORE
            .get_or_init(|| Arc::new(Self::new(crate::config::global().eviction)))
            .clone()
    }

    fn lock(&self) -> MutexGuard<'_, Table> {
        // Entries are replaced whole, so a poisoned table is still consistent.
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record metadata for `id`, replacing any previous entry.
    pub fn put(&self, id: CorrelationId, metadata: ResponseMetadata) {
        let writes = self.writes.fetch_add(1, Ordering::Relaxed) + 1;
        let mut table = self.lock();
        match &mut *table {
            Table::Map(map) => {
                map.insert(id, Entry::new(metadata));
                if self.ttl.is_some() && writes % TTL_SWEEP_INTERVAL == 0 {
                    let ttl = self.ttl;
                    map.retain(|_, entry| !entry.is_expired(ttl));
                }
            }
            Table::Lru(cache) => {
                cache.put(id, Entry::new(metadata));
            }
        }
    }

    /// Metadata for `id`; `None` when the hook never fired or the entry was
    /// evicted.
    pub fn get(&self, id: &CorrelationId) -> Option<ResponseMetadata> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        let mut table = self.lock();
        match &mut *table {
            Table::Map(map) => {
                if map.get(id).is_some_and(|entry| entry.is_expired(self.ttl)) {
                    map.remove(id);
                    return None;
                }
                map.get(id).map(|entry| entry.metadata.clone())
            }
            Table::Lru(cache) => cache.get(id).map(|entry| entry.metadata.clone()),
        }
    }

    /// Drop the entry for `id`, returning it if present.
    pub fn remove(&self, id: &CorrelationId) -> Option<ResponseMetadata> {
        let mut table = self.lock();
        let entry = match &mut *table {
            Table::Map(map) => map.remove(id),
            Table::Lru(cache) => cache.pop(id),
        };
        entry.map(|e| e.metadata)
    }

    pub fn len(&self) -> usize {
        match &*self.lock() {
            Table::Map(map) => map.len(),
            Table::Lru(cache) => cache.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
        }
    }
}

impl Default for CorrelationStore {
    fn default() -> Self {
        Self::new(EvictionPolicy::default())
    }
}
