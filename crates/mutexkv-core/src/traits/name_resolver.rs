// # Name Resolver Trait
//
// Defines the lookup used by the resolved-name lock variant.
//
// ## Purpose
//
// Resource handlers sometimes only know the human-assigned name of the
// object they are about to mutate (a private LAN called "office", a router
// called "edge"). Names are not stable and not unique, so the registry
// refuses to lock them directly. A resolver turns a name into the set of
// canonical identifiers that currently carry it, usually via a
// describe/list call on the cloud API.
//
// ## Implementations
//
// - In-memory table: `MemoryResolver`
// - SDK-backed lookups live in the embedding provider
//
// ## Usage
//
// ```rust,ignore
// use mutexkv_core::{MutexKv, NameResolver};
//
// async fn attach_nic(kv: &MutexKv, lans: &dyn NameResolver) -> mutexkv_core::Result<()> {
//     let guard = kv.lock_by_resolved_name("office", lans).await?;
//     // mutate the LAN identified by guard.key()
//     kv.unlock_by_resolved_key(guard);
//     Ok(())
// }
// ```

use async_trait::async_trait;

/// Trait for name resolver implementations
///
/// # Contract
///
/// `resolve` returns every canonical key currently carrying `name`. The
/// registry only locks when exactly one key comes back; zero or several
/// candidates are reported to the caller and nothing is locked.
///
/// Resolvers must not retry internally. A failed lookup is returned as an
/// error and surfaces unchanged from `lock_by_resolved_name`.
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
#[async_trait]
pub trait NameResolver: Send + Sync {
    /// Resolve a human-assigned name to candidate canonical keys
    ///
    /// # Parameters
    ///
    /// - `name`: The human-assigned name
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<String>)`: Every matching canonical key (possibly empty)
    /// - `Err(Error)`: The lookup itself failed
    async fn resolve(&self, name: &str) -> Result<Vec<String>, crate::Error>;

    /// Get the resolver name (for logging/debugging)
    fn resolver_name(&self) -> &'static str;
}
