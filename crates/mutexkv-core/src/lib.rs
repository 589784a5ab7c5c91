// # mutexkv-core
//
// Named mutual-exclusion locks for cloud resource handlers.
//
// A provider process runs many resource handlers concurrently. Some
// external objects (a router, a private LAN) reject concurrent mutating
// calls, so handlers serialize their mutations through one shared registry
// of locks keyed by resource identifier.
//
// ## Architecture Overview
//
// - **MutexKv**: Registry of lazily-created per-key locks
// - **KeyGuard**: Scoped ownership of one key; dropping it releases
// - **NameResolver**: Lookup that turns a human name into a canonical key
// - **Coordinator**: Runs a handler's operation while holding a key
// - **MutexKvConfig**: Contention warning threshold and eviction policy
//
// ## Design Principles
//
// 1. **Explicit registry**: Constructed once and shared as `Arc`, never a global
// 2. **Scoped release**: Every lock is a guard, so no path leaks a held key
// 3. **Short coarse lock**: The map lock never spans a per-key critical section
// 4. **No guessing**: Names that resolve to zero or several keys are never locked

pub mod traits;
pub mod coordinator;
pub mod registry;
pub mod config;
pub mod error;
pub mod resolver;

// Re-export core types for convenience
pub use traits::NameResolver;
pub use coordinator::Coordinator;
pub use registry::{EntryInfo, KeyGuard, MutexKv};
pub use config::{EvictionPolicy, MutexKvConfig};
pub use error::{Error, Result};
pub use resolver::MemoryResolver;
