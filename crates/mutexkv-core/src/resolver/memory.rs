// # Memory Resolver
//
// In-memory implementation of NameResolver.
//
// ## Purpose
//
// Holds a name -> canonical keys table, typically filled from a single
// describe/list snapshot taken at the start of a run, so repeated lookups
// during one apply don't hit the cloud API again.
//
// ## When to Use
//
// - Testing environments
// - Embedders that already hold a listing of the objects they manage
// - The simulator binary

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::NameResolver;

/// In-memory name resolver
///
/// Several keys may be registered under one name; that is how an
/// ambiguous lookup is represented.
///
/// # Example
///
/// ```rust,no_run
/// use mutexkv_core::resolver::MemoryResolver;
/// use mutexkv_core::traits::NameResolver;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let lans = MemoryResolver::new();
///     lans.insert("office", "lan-3").await;
///
///     assert_eq!(lans.resolve("office").await?, vec!["lan-3".to_string()]);
///     assert!(lans.resolve("lab").await?.is_empty());
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryResolver {
    inner: Arc<RwLock<HashMap<String, Vec<String>>>>,
}

impl MemoryResolver {
    /// Create a new empty resolver
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a resolver from `(name, key)` pairs
    pub fn from_pairs<N, K>(pairs: impl IntoIterator<Item = (N, K)>) -> Self
    where
        N: Into<String>,
        K: Into<String>,
    {
        let mut table: HashMap<String, Vec<String>> = HashMap::new();
        for (name, key) in pairs {
            let keys = table.entry(name.into()).or_default();
            let key = key.into();
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        Self {
            inner: Arc::new(RwLock::new(table)),
        }
    }

    /// Register `key` under `name`
    ///
    /// Registering the same pair twice is a no-op.
    pub async fn insert(&self, name: impl Into<String>, key: impl Into<String>) {
        let mut guard = self.inner.write().await;
        let keys = guard.entry(name.into()).or_default();
        let key = key.into();
        if !keys.contains(&key) {
            keys.push(key);
        }
    }

    /// Forget every key registered under `name`
    pub async fn remove(&self, name: &str) -> Option<Vec<String>> {
        self.inner.write().await.remove(name)
    }

    /// Number of distinct names
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if no names are registered
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl NameResolver for MemoryResolver {
    async fn resolve(&self, name: &str) -> Result<Vec<String>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.get(name).cloned().unwrap_or_default())
    }

    fn resolver_name(&self) -> &'static str {
        "memory"
    }
}
