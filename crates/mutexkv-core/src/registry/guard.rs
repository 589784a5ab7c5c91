//! Scoped ownership of one key's lock

use std::fmt;
use std::time::{Duration, Instant};
use tokio::sync::OwnedMutexGuard;
use tracing::debug;

/// Exclusive hold on one registry key
///
/// Returned by [`MutexKv::lock`](super::MutexKv::lock) and friends. The key
/// stays locked until the guard is passed to
/// [`MutexKv::unlock`](super::MutexKv::unlock), consumed by
/// [`KeyGuard::unlock`], or dropped. Early returns and `?` in the calling
/// handler therefore always release.
///
/// The guard is `Send`, so it may be held across `.await` points and moved
/// between tasks.
#[must_use = "the key is unlocked as soon as the guard is dropped"]
pub struct KeyGuard {
    key: String,
    acquired_at: Instant,
    _permit: OwnedMutexGuard<()>,
}

impl KeyGuard {
    pub(super) fn new(key: String, permit: OwnedMutexGuard<()>) -> Self {
        Self {
            key,
            acquired_at: Instant::now(),
            _permit: permit,
        }
    }

    /// The key this guard holds
    ///
    /// For guards returned by the resolved-name variant this is the
    /// canonical key, not the name that was resolved.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Time since the lock was acquired
    pub fn held_for(&self) -> Duration {
        self.acquired_at.elapsed()
    }

    /// Release the lock
    ///
    /// Equivalent to dropping the guard.
    pub fn unlock(self) {
        drop(self);
    }
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        debug!(key = %self.key, held_ms = self.held_for().as_millis() as u64, "lock released");
    }
}

impl fmt::Debug for KeyGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyGuard")
            .field("key", &self.key)
            .field("held_for", &self.held_for())
            .finish()
    }
}
