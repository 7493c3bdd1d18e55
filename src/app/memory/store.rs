//! Bounded in-memory LRU store
//!
//! All state lives behind one mutex: the entry map and the recency index are
//! updated together, so eviction plus insert is a single atomic step even
//! under concurrent `put` calls.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::app::key::CacheKey;
use crate::errors::{CacheError, CacheResult};

use super::config::MemoryConfig;

/// Snapshot of one cached payload
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub bytes: Bytes,
    pub size_bytes: u64,
    pub last_access: DateTime<Utc>,
}

#[derive(Debug)]
struct Slot {
    bytes: Bytes,
    last_access: DateTime<Utc>,
    /// Position in the recency index; larger is more recent
    tick: u64,
}

#[derive(Debug, Default)]
struct State {
    entries: HashMap<CacheKey, Slot>,
    /// tick -> key, oldest first
    recency: BTreeMap<u64, CacheKey>,
    next_tick: u64,
    total_bytes: u64,
}

impl State {
    fn bump(&mut self) -> u64 {
        let tick = self.next_tick;
        self.next_tick += 1;
        tick
    }

    fn touch(&mut self, key: &CacheKey) -> Option<Bytes> {
        let tick = self.bump();
        let slot = self.entries.get_mut(key)?;
        self.recency.remove(&slot.tick);
        slot.tick = tick;
        slot.last_access = Utc::now();
        self.recency.insert(tick, key.clone());
        Some(slot.bytes.clone())
    }

    fn take(&mut self, key: &CacheKey) -> Option<Slot> {
        let slot = self.entries.remove(key)?;
        self.recency.remove(&slot.tick);
        self.total_bytes -= slot.bytes.len() as u64;
        Some(slot)
    }

    fn pop_oldest(&mut self) -> Option<(CacheKey, Slot)> {
        let (_, key) = self.recency.pop_first()?;
        let slot = self.entries.remove(&key)?;
        self.total_bytes -= slot.bytes.len() as u64;
        Some((key, slot))
    }
}

/// Bounded key -> bytes map with least-recently-used eviction
///
/// Every `get` hit refreshes recency. Recency ticks are unique, so entries that
/// were never read after insertion are evicted in insertion order.
#[derive(Debug)]
pub struct MemoryStore {
    config: MemoryConfig,
    state: Mutex<State>,
}

impl MemoryStore {
    /// Create an empty store with the given bounds
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            config,
            state: Mutex::new(State::default()),
        }
    }

    /// Capacity bounds of this store
    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // Poisoning is ignored; no mutation spans a panicking call.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Look up a key, refreshing its recency on hit
    pub fn get(&self, key: &CacheKey) -> Option<Bytes> {
        let bytes = self.lock().touch(key);
        match &bytes {
            Some(b) => debug!(key = %key, bytes = b.len(), "Memory hit"),
            None => debug!(key = %key, "Memory miss"),
        }
        bytes
    }

    /// Insert or replace an entry, evicting least-recently-used entries to fit
    ///
    /// Returns the number of entries evicted. An entry larger than the byte
    /// capacity is rejected with [`CacheError::CapacityExceeded`] and the store
    /// is left unchanged.
    pub fn put(&self, key: CacheKey, bytes: Bytes) -> CacheResult<usize> {
        let size = bytes.len() as u64;
        if self.config.max_bytes > 0 && size > self.config.max_bytes {
            warn!(
                key = %key,
                size,
                capacity = self.config.max_bytes,
                "Entry larger than memory capacity, not cached"
            );
            return Err(CacheError::CapacityExceeded {
                size,
                capacity: self.config.max_bytes,
            });
        }

        let mut state = self.lock();
        state.take(&key);

        let mut evicted = 0;
        while self.over_capacity(&state, size) {
            match state.pop_oldest() {
                Some((old_key, slot)) => {
                    evicted += 1;
                    debug!(key = %old_key, bytes = slot.bytes.len(), "Evicted from memory");
                }
                None => break,
            }
        }

        let tick = state.bump();
        state.recency.insert(tick, key.clone());
        state.total_bytes += size;
        state.entries.insert(
            key,
            Slot {
                bytes,
                last_access: Utc::now(),
                tick,
            },
        );

        Ok(evicted)
    }

    fn over_capacity(&self, state: &State, incoming: u64) -> bool {
        let entries_full =
            self.config.max_entries > 0 && state.entries.len() + 1 > self.config.max_entries;
        let bytes_full =
            self.config.max_bytes > 0 && state.total_bytes + incoming > self.config.max_bytes;
        entries_full || bytes_full
    }

    /// Remove an entry, returning whether it was present
    pub fn remove(&self, key: &CacheKey) -> bool {
        self.lock().take(key).is_some()
    }

    /// Check presence without touching recency
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.lock().entries.contains_key(key)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Whether the store holds no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total payload bytes held
    pub fn size_bytes(&self) -> u64 {
        self.lock().total_bytes
    }

    /// Drop every entry
    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.recency.clear();
        state.total_bytes = 0;
    }

    /// Snapshot of all entries, least recently used first
    pub fn entries(&self) -> Vec<CacheEntry> {
        let state = self.lock();
        state
            .recency
            .values()
            .filter_map(|key| {
                state.entries.get(key).map(|slot| CacheEntry {
                    key: key.clone(),
                    bytes: slot.bytes.clone(),
                    size_bytes: slot.bytes.len() as u64,
                    last_access: slot.last_access,
                })
            })
            .collect()
    }
}
