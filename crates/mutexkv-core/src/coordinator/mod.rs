//! Scoped exclusive execution
//!
//! The Coordinator is the entry point resource handlers use instead of
//! pairing `lock`/`unlock` by hand:
//!
//! ```text
//!   handler A ──┐                       ┌── lock("router-123") ── mutate ── wait available ── release
//!               ├── Coordinator ── MutexKv
//!   handler B ──┘                       └── lock("router-123") ······ (waits) ······ mutate ── ...
//! ```
//!
//! ## Flow
//!
//! 1. Lock the key (or resolve a name and lock the canonical key)
//! 2. Run the handler's operation while the guard is held
//! 3. Release on every exit path, including operation errors and panics

use crate::error::Error;
use crate::registry::{KeyGuard, MutexKv};
use crate::traits::NameResolver;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// Runs operations while holding a registry key
///
/// Cheap to clone; all clones share the same registry.
#[derive(Debug, Clone)]
pub struct Coordinator {
    registry: Arc<MutexKv>,
}

impl Coordinator {
    /// Create a coordinator over a shared registry
    pub fn new(registry: Arc<MutexKv>) -> Self {
        Self { registry }
    }

    /// The shared registry
    pub fn registry(&self) -> &Arc<MutexKv> {
        &self.registry
    }

    /// Run `op` while holding the lock for `key`
    ///
    /// # Parameters
    ///
    /// - `key`: Canonical identifier of the shared object
    /// - `op`: The mutation, including any wait-for-available polling
    ///
    /// # Returns
    ///
    /// Whatever `op` returns. The lock is released before this returns.
    pub async fn run_exclusive<T, E, F, Fut>(&self, key: &str, op: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let guard = self.registry.lock(key).await;
        Self::finish(guard, op()).await
    }

    /// Resolve `name`, then run `op` while holding the canonical key
    ///
    /// `op` receives the canonical key. Resolution failures are returned
    /// without running `op` and without locking anything.
    pub async fn run_exclusive_resolved<R, T, E, F, Fut>(
        &self,
        name: &str,
        resolver: &R,
        op: F,
    ) -> Result<T, E>
    where
        R: NameResolver + ?Sized,
        E: From<Error>,
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let guard = match self.registry.lock_by_resolved_name(name, resolver).await {
            Ok(guard) => guard,
            Err(e) => {
                warn!(name, error = %e, "could not lock by name");
                return Err(E::from(e));
            }
        };
        let key = guard.key().to_string();
        Self::finish(guard, op(key)).await
    }

    async fn finish<T, E, Fut>(guard: KeyGuard, fut: Fut) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
    {
        let result = fut.await;
        if result.is_err() {
            debug!(key = guard.key(), "exclusive operation failed, releasing");
        }
        drop(guard);
        result
    }
}
