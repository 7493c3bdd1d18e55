//! Registry of fetches currently in flight
//!
//! One record per key. Checking for a record, re-checking the memory tier and
//! creating the record happen under a single lock, so two callers missing on
//! the same key can never both start a fetch. Each record owns the broadcast
//! sender for its single outcome; removing the record without publishing
//! drops the sender and every waiter observes the fetch as interrupted.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use tokio::sync::broadcast;
use tokio::task::AbortHandle;
use tracing::debug;
use url::Url;

use crate::app::key::CacheKey;
use crate::app::memory::MemoryStore;
use crate::errors::{FetchError, FetchResult};

/// Outcome shared by every waiter of one fetch
pub(crate) type Outcome = FetchResult<Bytes>;

#[derive(Debug)]
struct InFlight {
    generation: u64,
    sender: broadcast::Sender<Outcome>,
    waiters: usize,
    abort: Option<AbortHandle>,
}

#[derive(Debug, Default)]
struct RegistryState {
    records: HashMap<CacheKey, InFlight>,
    next_generation: u64,
    closed: bool,
}

impl RegistryState {
    /// Record for `key` if it still belongs to `generation`
    fn current(&mut self, key: &CacheKey, generation: u64) -> Option<&mut InFlight> {
        self.records
            .get_mut(key)
            .filter(|record| record.generation == generation)
    }

    fn take_current(&mut self, key: &CacheKey, generation: u64) -> Option<InFlight> {
        self.current(key, generation)?;
        self.records.remove(key)
    }
}

/// Result of asking the registry for a key
#[derive(Debug)]
pub(crate) enum Join {
    /// The memory tier was populated by a fetch that just finished
    Cached(Bytes),
    /// Attached to a fetch already running
    Joined(Waiter),
    /// A new record was created; the caller must spawn the fetch
    Started { generation: u64, waiter: Waiter },
    /// The registry was shut down
    Closed,
}

/// Keys with a fetch in flight and the callers waiting on them
#[derive(Debug)]
pub struct InFlightRegistry {
    abort_orphans: bool,
    state: Mutex<RegistryState>,
}

impl InFlightRegistry {
    /// Create an empty registry
    ///
    /// With `abort_orphans`, a fetch is aborted as soon as its last waiter
    /// leaves.
    pub fn new(abort_orphans: bool) -> Self {
        Self {
            abort_orphans,
            state: Mutex::new(RegistryState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of keys with a fetch in flight
    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    /// Whether no fetch is in flight
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a fetch for `key` is in flight
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.lock().records.contains_key(key)
    }

    /// Number of callers currently waiting on `key`
    pub fn waiters(&self, key: &CacheKey) -> usize {
        self.lock().records.get(key).map_or(0, |record| record.waiters)
    }

    /// Join the fetch for `key`, or create its record if none exists
    pub(crate) fn join_or_start(self: &Arc<Self>, key: &CacheKey, memory: &MemoryStore) -> Join {
        let mut state = self.lock();

        if state.closed {
            return Join::Closed;
        }

        if let Some(record) = state.records.get_mut(key) {
            record.waiters += 1;
            let waiter = Waiter::new(
                Arc::clone(self),
                key.clone(),
                record.generation,
                record.sender.subscribe(),
            );
            debug!(key = %key, waiters = record.waiters, "Joined in-flight fetch");
            return Join::Joined(waiter);
        }

        // A fetch may have landed between the caller's miss and this lock
        if let Some(bytes) = memory.get(key) {
            return Join::Cached(bytes);
        }

        let generation = state.next_generation;
        state.next_generation += 1;

        let (sender, receiver) = broadcast::channel(1);
        state.records.insert(
            key.clone(),
            InFlight {
                generation,
                sender,
                waiters: 1,
                abort: None,
            },
        );
        debug!(key = %key, generation, "Registered new in-flight fetch");

        Join::Started {
            generation,
            waiter: Waiter::new(Arc::clone(self), key.clone(), generation, receiver),
        }
    }

    /// Attach the fetch task's abort handle to its record
    pub(crate) fn attach(&self, key: &CacheKey, generation: u64, handle: AbortHandle) {
        let mut state = self.lock();
        // No record means the fetch already finished or was aborted
        if let Some(record) = state.current(key, generation) {
            record.abort = Some(handle);
        }
    }

    /// Publish the outcome to every waiter and remove the record
    ///
    /// Returns the number of waiters notified. A stale generation is ignored.
    pub(crate) fn complete(&self, key: &CacheKey, generation: u64, outcome: Outcome) -> usize {
        let mut state = self.lock();
        match state.take_current(key, generation) {
            Some(record) => record.sender.send(outcome).unwrap_or(0),
            None => 0,
        }
    }

    /// Remove the record without publishing; waiters observe an interruption
    pub(crate) fn abandon(&self, key: &CacheKey, generation: u64) -> bool {
        self.lock().take_current(key, generation).is_some()
    }

    fn leave(&self, key: &CacheKey, generation: u64) {
        let mut state = self.lock();
        let Some(record) = state.current(key, generation) else {
            return;
        };

        record.waiters = record.waiters.saturating_sub(1);
        if record.waiters > 0 || !self.abort_orphans {
            return;
        }

        if let Some(record) = state.records.remove(key) {
            if let Some(handle) = record.abort {
                handle.abort();
            }
            debug!(key = %key, generation, "Aborted orphaned fetch");
        }
    }

    /// Abort every fetch and refuse new ones
    ///
    /// Returns the number of fetches aborted.
    pub(crate) fn close(&self) -> usize {
        let mut state = self.lock();
        state.closed = true;

        let aborted = state.records.len();
        for (_, record) in state.records.drain() {
            if let Some(handle) = record.abort {
                handle.abort();
            }
        }
        aborted
    }
}

/// One caller's stake in an in-flight fetch
///
/// Dropping it before the outcome arrives detaches the caller; other waiters
/// are unaffected.
#[derive(Debug)]
pub(crate) struct Waiter {
    registry: Arc<InFlightRegistry>,
    key: CacheKey,
    generation: u64,
    receiver: broadcast::Receiver<Outcome>,
}

impl Waiter {
    fn new(
        registry: Arc<InFlightRegistry>,
        key: CacheKey,
        generation: u64,
        receiver: broadcast::Receiver<Outcome>,
    ) -> Self {
        Self {
            registry,
            key,
            generation,
            receiver,
        }
    }

    /// Wait for the shared outcome
    pub(crate) async fn outcome(&mut self, locator: &Url) -> Outcome {
        match self.receiver.recv().await {
            Ok(outcome) => outcome,
            Err(_) => Err(FetchError::Interrupted {
                url: locator.to_string(),
            }),
        }
    }
}

impl Drop for Waiter {
    fn drop(&mut self) {
        self.registry.leave(&self.key, self.generation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::memory::MemoryConfig;
    use std::time::Duration;

    fn locator() -> Url {
        Url::parse("https://example.com/banner.png").unwrap()
    }

    fn started(join: Join) -> (u64, Waiter) {
        match join {
            Join::Started { generation, waiter } => (generation, waiter),
            other => panic!("Expected a new fetch, got {:?}", other),
        }
    }

    fn joined(join: Join) -> Waiter {
        match join {
            Join::Joined(waiter) => waiter,
            other => panic!("Expected to join, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_second_caller_joins_existing_record() {
        let registry = Arc::new(InFlightRegistry::new(false));
        let memory = MemoryStore::new(MemoryConfig::default());
        let key = CacheKey::new("burger-banner");

        let (generation, mut first) = started(registry.join_or_start(&key, &memory));
        let mut second = joined(registry.join_or_start(&key, &memory));
        assert_eq!(registry.waiters(&key), 2);

        let notified = registry.complete(&key, generation, Ok(Bytes::from_static(b"png")));
        assert_eq!(notified, 2);
        assert!(registry.is_empty());

        assert_eq!(first.outcome(&locator()).await.unwrap(), Bytes::from_static(b"png"));
        assert_eq!(second.outcome(&locator()).await.unwrap(), Bytes::from_static(b"png"));
    }

    #[test]
    fn test_memory_recheck_under_lock() {
        let registry = Arc::new(InFlightRegistry::new(false));
        let memory = MemoryStore::new(MemoryConfig::default());
        let key = CacheKey::new("k");
        memory.put(key.clone(), Bytes::from_static(b"cached")).unwrap();

        match registry.join_or_start(&key, &memory) {
            Join::Cached(bytes) => assert_eq!(bytes, Bytes::from_static(b"cached")),
            other => panic!("Expected memory hit, got {:?}", other),
        }
        assert!(!registry.contains(&key));
    }

    #[tokio::test]
    async fn test_abandon_interrupts_waiters() {
        let registry = Arc::new(InFlightRegistry::new(false));
        let memory = MemoryStore::new(MemoryConfig::default());
        let key = CacheKey::new("k");

        let (generation, mut waiter) = started(registry.join_or_start(&key, &memory));
        assert!(registry.abandon(&key, generation));

        let err = waiter.outcome(&locator()).await.unwrap_err();
        assert_eq!(err.kind(), "interrupted");
    }

    #[test]
    fn test_stale_generation_is_ignored() {
        let registry = Arc::new(InFlightRegistry::new(false));
        let memory = MemoryStore::new(MemoryConfig::default());
        let key = CacheKey::new("k");

        let (old, waiter) = started(registry.join_or_start(&key, &memory));
        registry.complete(&key, old, Ok(Bytes::from_static(b"a")));
        drop(waiter);

        let (new, _waiter) = started(registry.join_or_start(&key, &memory));
        assert_ne!(old, new);
        assert_eq!(registry.complete(&key, old, Ok(Bytes::from_static(b"b"))), 0);
        assert!(!registry.abandon(&key, old));
        assert!(registry.contains(&key));
    }

    #[tokio::test]
    async fn test_cancelled_waiter_keeps_fetch_for_others() {
        let registry = Arc::new(InFlightRegistry::new(true));
        let memory = MemoryStore::new(MemoryConfig::default());
        let key = CacheKey::new("k");

        let (generation, first) = started(registry.join_or_start(&key, &memory));
        let mut second = joined(registry.join_or_start(&key, &memory));

        drop(first);
        assert!(registry.contains(&key));
        assert_eq!(registry.waiters(&key), 1);

        registry.complete(&key, generation, Ok(Bytes::from_static(b"x")));
        assert!(second.outcome(&locator()).await.is_ok());
    }

    #[tokio::test]
    async fn test_last_waiter_leaving_aborts_fetch() {
        let registry = Arc::new(InFlightRegistry::new(true));
        let memory = MemoryStore::new(MemoryConfig::default());
        let key = CacheKey::new("k");

        let (generation, waiter) = started(registry.join_or_start(&key, &memory));
        let task = tokio::spawn(async { tokio::time::sleep(Duration::from_secs(60)).await });
        registry.attach(&key, generation, task.abort_handle());

        drop(waiter);

        assert!(!registry.contains(&key));
        assert!(task.await.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn test_orphaned_fetch_survives_by_default() {
        let registry = Arc::new(InFlightRegistry::new(false));
        let memory = MemoryStore::new(MemoryConfig::default());
        let key = CacheKey::new("k");

        let (_, waiter) = started(registry.join_or_start(&key, &memory));
        drop(waiter);

        assert!(registry.contains(&key));
        assert_eq!(registry.waiters(&key), 0);

        // A later caller joins the orphaned fetch instead of starting another
        let _rejoined = joined(registry.join_or_start(&key, &memory));
    }

    #[tokio::test]
    async fn test_close_interrupts_and_refuses() {
        let registry = Arc::new(InFlightRegistry::new(false));
        let memory = MemoryStore::new(MemoryConfig::default());
        let key = CacheKey::new("k");

        let (_, mut waiter) = started(registry.join_or_start(&key, &memory));
        assert_eq!(registry.close(), 1);

        assert!(waiter.outcome(&locator()).await.is_err());
        assert!(matches!(registry.join_or_start(&key, &memory), Join::Closed));
    }
}
