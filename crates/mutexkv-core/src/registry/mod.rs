//! Named mutex registry
//!
//! [`MutexKv`] hands out exclusive locks keyed by arbitrary strings,
//! typically cloud resource identifiers. Entries are created the first time
//! a key is seen; two callers presenting the same key are serialized, two
//! callers with different keys never wait on each other.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use mutexkv_core::MutexKv;
//! use std::sync::Arc;
//!
//! # async fn handler(kv: Arc<MutexKv>) {
//! let guard = kv.lock("router-123").await;
//! // issue the mutating API call, wait for the router to be available again
//! kv.unlock(guard);
//! # }
//! ```
//!
//! ## Locking discipline
//!
//! A single coarse mutex protects the key -> entry map and is only held for
//! the lookup-or-insert. The per-key mutex is cloned out of the map before
//! the caller waits on it, so a long critical section on one key never
//! delays a lookup for another.
//!
//! Per-key locks are not reentrant: locking a key twice from the same task
//! without releasing it in between waits forever.

mod guard;

pub use guard::KeyGuard;

use crate::config::MutexKvConfig;
use crate::error::{Error, Result};
use crate::traits::NameResolver;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

type KeyMutex = tokio::sync::Mutex<()>;

/// One registry entry
#[derive(Debug)]
struct Entry {
    mutex: Arc<KeyMutex>,
    created_at: DateTime<Utc>,
    last_used: DateTime<Utc>,
    lock_calls: u64,
}

impl Entry {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            mutex: Arc::new(KeyMutex::new(())),
            created_at: now,
            last_used: now,
            lock_calls: 0,
        }
    }

    /// Hand out the per-key mutex for a new lock call
    fn checkout(&mut self, now: DateTime<Utc>) -> Arc<KeyMutex> {
        self.last_used = now;
        self.lock_calls += 1;
        Arc::clone(&self.mutex)
    }

    /// Only the map references the mutex: nobody holds or awaits it
    fn is_removable(&self) -> bool {
        Arc::strong_count(&self.mutex) == 1
    }

    fn is_idle(&self, now: DateTime<Utc>, max_idle: chrono::Duration) -> bool {
        self.is_removable() && now.signed_duration_since(self.last_used) > max_idle
    }
}

/// Snapshot of one registry entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    /// The key
    pub key: String,
    /// When the key was first locked
    pub created_at: DateTime<Utc>,
    /// When the key was last requested
    pub last_used: DateTime<Utc>,
    /// Number of lock calls made for the key (acquired or still waiting)
    pub lock_calls: u64,
    /// Whether the key was held when the snapshot was taken
    pub locked: bool,
}

/// Registry of named mutual-exclusion locks
///
/// Construct one per process and share it as `Arc<MutexKv>` with every
/// resource handler that mutates shared external objects.
///
/// ## Thread Safety
///
/// `MutexKv` is `Send + Sync`; any number of tasks and threads may lock
/// keys concurrently.
#[derive(Debug, Default)]
pub struct MutexKv {
    entries: Mutex<HashMap<String, Entry>>,
    config: MutexKvConfig,
}

impl MutexKv {
    /// Create a new empty registry with the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new empty registry
    ///
    /// # Returns
    ///
    /// - `Ok(MutexKv)`: The registry
    /// - `Err(Error::Config)`: If `config` does not validate
    pub fn with_config(config: MutexKvConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            entries: Mutex::new(HashMap::new()),
            config,
        })
    }

    /// The configuration this registry was built with
    pub fn config(&self) -> &MutexKvConfig {
        &self.config
    }

    /// Acquire the lock for `key`, creating it on first use
    ///
    /// Waits until the key is free. Same-key waiters are served in FIFO
    /// order. There is no timeout; wrap the call in
    /// `tokio::time::timeout` for bounded waiting. Dropping the pending
    /// future gives up the wait without acquiring.
    pub async fn lock(&self, key: &str) -> KeyGuard {
        let mutex = self.checkout(key);
        let started = Instant::now();
        let permit = mutex.lock_owned().await;
        self.record_acquired(key, started.elapsed());
        KeyGuard::new(key.to_string(), permit)
    }

    /// Acquire the lock for `key` from synchronous code
    ///
    /// Blocks the current thread until the key is free.
    ///
    /// # Panics
    ///
    /// Panics when called from within an asynchronous execution context;
    /// use [`MutexKv::lock`] there.
    pub fn blocking_lock(&self, key: &str) -> KeyGuard {
        let mutex = self.checkout(key);
        let started = Instant::now();
        let permit = mutex.blocking_lock_owned();
        self.record_acquired(key, started.elapsed());
        KeyGuard::new(key.to_string(), permit)
    }

    /// Release a lock obtained from this registry
    pub fn unlock(&self, guard: KeyGuard) {
        guard.unlock();
    }

    /// Resolve `name` to a canonical key and lock that key
    ///
    /// # Parameters
    ///
    /// - `name`: Human-assigned name of the object
    /// - `resolver`: Lookup translating the name into canonical keys
    ///
    /// # Returns
    ///
    /// - `Ok(KeyGuard)`: Exactly one key matched; its lock is held and
    ///   [`KeyGuard::key`] is the canonical key
    /// - `Err(Error::NotFound)`: No key matched
    /// - `Err(Error::Ambiguous)`: Several keys matched
    /// - `Err(_)`: The resolver failed (returned unchanged)
    ///
    /// On every error path nothing is locked and the registry is untouched.
    pub async fn lock_by_resolved_name<R>(&self, name: &str, resolver: &R) -> Result<KeyGuard>
    where
        R: NameResolver + ?Sized,
    {
        let mut matches = resolver.resolve(name).await?;

        let key = match matches.len() {
            0 => {
                debug!(name, resolver = resolver.resolver_name(), "name resolved to no key");
                return Err(Error::not_found(name));
            }
            1 => matches.swap_remove(0),
            count => {
                debug!(
                    name,
                    resolver = resolver.resolver_name(),
                    count,
                    "name resolved to several keys"
                );
                return Err(Error::ambiguous(name, matches));
            }
        };

        debug!(name, key = %key, "name resolved");
        Ok(self.lock(&key).await)
    }

    /// Release a lock obtained from [`MutexKv::lock_by_resolved_name`]
    pub fn unlock_by_resolved_key(&self, guard: KeyGuard) {
        guard.unlock();
    }

    /// Number of keys the registry currently tracks
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Check if the registry tracks no keys
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Check if `key` has an entry
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries().contains_key(key)
    }

    /// List all tracked keys
    pub fn keys(&self) -> Vec<String> {
        self.entries().keys().cloned().collect()
    }

    /// Whether `key` is held right now
    ///
    /// This is a snapshot and may be stale by the time the caller acts on it.
    pub fn is_locked(&self, key: &str) -> bool {
        self.entries()
            .get(key)
            .is_some_and(|entry| entry.mutex.try_lock().is_err())
    }

    /// Snapshot of the entry for `key`
    pub fn entry_info(&self, key: &str) -> Option<EntryInfo> {
        self.entries().get(key).map(|entry| EntryInfo {
            key: key.to_string(),
            created_at: entry.created_at,
            last_used: entry.last_used,
            lock_calls: entry.lock_calls,
            locked: entry.mutex.try_lock().is_err(),
        })
    }

    /// Drop entries idle for longer than `max_idle`
    ///
    /// Entries that are held, or that some caller is waiting on, are never
    /// removed regardless of age.
    ///
    /// # Returns
    ///
    /// The number of entries removed
    pub fn prune_idle(&self, max_idle: chrono::Duration) -> usize {
        let mut entries = self.entries();
        prune(&mut entries, Utc::now(), max_idle)
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        // The map is consistent at every point a panic could occur.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up or create the entry for `key` and clone out its mutex
    fn checkout(&self, key: &str) -> Arc<KeyMutex> {
        let now = Utc::now();
        let mut entries = self.entries();

        if let Some(max_idle) = self.config.eviction.max_idle() {
            prune(&mut entries, now, max_idle);
        }

        if let Some(entry) = entries.get_mut(key) {
            return entry.checkout(now);
        }

        debug!(key, "creating lock entry");
        entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::new(now))
            .checkout(now)
    }

    fn record_acquired(&self, key: &str, waited: Duration) {
        let waited_ms = waited.as_millis() as u64;
        match self.config.contention_warn_after() {
            Some(threshold) if waited >= threshold => {
                warn!(key, waited_ms, "lock acquired after long wait");
            }
            _ => debug!(key, waited_ms, "lock acquired"),
        }
    }
}

fn prune(
    entries: &mut HashMap<String, Entry>,
    now: DateTime<Utc>,
    max_idle: chrono::Duration,
) -> usize {
    let before = entries.len();
    entries.retain(|_, entry| !entry.is_idle(now, max_idle));
    let removed = before - entries.len();
    if removed > 0 {
        debug!(removed, remaining = entries.len(), "pruned idle lock entries");
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EvictionPolicy;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio_test::{assert_pending, assert_ready};

    #[tokio::test]
    async fn test_entries_created_lazily() {
        let kv = MutexKv::new();
        assert!(kv.is_empty());
        assert!(!kv.contains_key("router-123"));

        let guard = kv.lock("router-123").await;
        assert_eq!(guard.key(), "router-123");
        assert!(kv.contains_key("router-123"));
        assert!(kv.is_locked("router-123"));
        assert_eq!(kv.len(), 1);

        kv.unlock(guard);
        assert!(!kv.is_locked("router-123"));
        assert_eq!(kv.len(), 1);
    }

    #[tokio::test]
    async fn test_repeated_cycles_keep_one_entry() {
        let kv = MutexKv::new();

        for _ in 0..50 {
            let guard = kv.lock("lan-1").await;
            drop(guard);
        }

        assert_eq!(kv.keys(), vec!["lan-1".to_string()]);
        let info = kv.entry_info("lan-1").unwrap();
        assert_eq!(info.lock_calls, 50);
        assert!(!info.locked);
        assert!(info.created_at <= info.last_used);
    }

    #[tokio::test]
    async fn test_second_lock_pending_until_release() {
        let kv = MutexKv::new();
        let held = kv.lock("router-123").await;

        let mut waiter = tokio_test::task::spawn(kv.lock("router-123"));
        assert_pending!(waiter.poll());
        assert_pending!(waiter.poll());

        drop(held);
        assert!(waiter.is_woken());

        let guard = assert_ready!(waiter.poll());
        assert_eq!(guard.key(), "router-123");
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_wait() {
        let kv = MutexKv::new();
        let _router = kv.lock("router-123").await;

        let mut other = tokio_test::task::spawn(kv.lock("lan-1"));
        let lan = assert_ready!(other.poll());
        assert_eq!(lan.key(), "lan-1");
        assert_eq!(kv.len(), 2);
    }

    #[tokio::test]
    async fn test_same_task_relock_is_not_reentrant() {
        let kv = MutexKv::new();
        let _outer = kv.lock("router-123").await;

        let nested = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            kv.lock("router-123"),
        )
        .await;
        assert!(nested.is_err(), "nested lock on a held key must not succeed");

        // The abandoned wait left nothing behind.
        assert!(kv.is_locked("router-123"));
        assert_eq!(kv.entry_info("router-123").unwrap().lock_calls, 2);
    }

    #[test]
    fn test_blocking_lock_serializes_threads() {
        let kv = Arc::new(MutexKv::new());
        let acquired = Arc::new(AtomicBool::new(false));

        let held = kv.blocking_lock("router-123");

        let waiter = {
            let kv = Arc::clone(&kv);
            let acquired = Arc::clone(&acquired);
            std::thread::spawn(move || {
                let guard = kv.blocking_lock("router-123");
                acquired.store(true, Ordering::SeqCst);
                drop(guard);
            })
        };

        std::thread::sleep(std::time::Duration::from_millis(50));
        assert!(!acquired.load(Ordering::SeqCst));

        kv.unlock(held);
        waiter.join().unwrap();
        assert!(acquired.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_prune_skips_held_and_awaited_entries() {
        let kv = MutexKv::new();

        let held = kv.lock("held").await;
        drop(kv.lock("idle").await);
        let blocker = kv.lock("awaited").await;
        let mut waiter = tokio_test::task::spawn(kv.lock("awaited"));
        assert_pending!(waiter.poll());
        drop(blocker);

        // Every entry is older than a zero threshold once time moves on.
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let removed = kv.prune_idle(chrono::Duration::zero());

        assert_eq!(removed, 1);
        assert!(!kv.contains_key("idle"));
        assert!(kv.contains_key("held"));
        assert!(kv.contains_key("awaited"));

        let guard = assert_ready!(waiter.poll());
        drop(guard);
        drop(waiter);
        drop(held);
    }

    #[tokio::test]
    async fn test_relock_after_prune() {
        let kv = MutexKv::new();
        drop(kv.lock("lan-1").await);

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        assert_eq!(kv.prune_idle(chrono::Duration::zero()), 1);
        assert!(kv.is_empty());

        let guard = kv.lock("lan-1").await;
        assert_eq!(kv.entry_info("lan-1").unwrap().lock_calls, 1);
        drop(guard);
    }

    #[tokio::test]
    async fn test_prune_respects_threshold() {
        let kv = MutexKv::new();
        drop(kv.lock("lan-1").await);

        assert_eq!(kv.prune_idle(chrono::Duration::hours(1)), 0);
        assert!(kv.contains_key("lan-1"));
    }

    #[tokio::test]
    async fn test_never_policy_keeps_entries() {
        let kv = MutexKv::new();
        for i in 0..10 {
            drop(kv.lock(&format!("res-{i}")).await);
        }
        assert_eq!(kv.len(), 10);
    }

    #[tokio::test]
    async fn test_idle_policy_prunes_on_lock() {
        let config = MutexKvConfig::new().with_eviction(EvictionPolicy::Idle { max_idle_secs: 1 });
        let kv = MutexKv::with_config(config).unwrap();

        drop(kv.lock("old").await);
        {
            let mut entries = kv.entries();
            let entry = entries.get_mut("old").unwrap();
            entry.last_used -= chrono::Duration::seconds(5);
        }

        let guard = kv.lock("new").await;
        assert!(!kv.contains_key("old"));
        assert!(kv.contains_key("new"));
        drop(guard);
    }

    #[test]
    fn test_with_config_rejects_invalid() {
        let config = MutexKvConfig::new().with_eviction(EvictionPolicy::Idle { max_idle_secs: 0 });
        assert!(matches!(MutexKv::with_config(config), Err(Error::Config(_))));
    }
}
