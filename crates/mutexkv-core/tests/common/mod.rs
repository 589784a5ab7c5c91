//! Test doubles and common utilities for registry contract tests
//!
//! These doubles stand in for the describe/list lookups a real provider
//! performs against its cloud API.

#![allow(dead_code)]

use mutexkv_core::error::{Error, Result};
use mutexkv_core::traits::NameResolver;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Upper bound for "does not block" assertions
pub const NO_WAIT: Duration = Duration::from_millis(200);

/// A resolver that always answers with a fixed candidate list
pub struct FixedResolver {
    matches: Vec<String>,
    /// Call counter for resolve()
    resolve_call_count: Arc<AtomicUsize>,
}

impl FixedResolver {
    pub fn new(matches: &[&str]) -> Self {
        Self {
            matches: matches.iter().map(|m| m.to_string()).collect(),
            resolve_call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A resolver that finds nothing
    pub fn empty() -> Self {
        Self::new(&[])
    }

    /// Get the number of times resolve() was called
    pub fn resolve_call_count(&self) -> usize {
        self.resolve_call_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl NameResolver for FixedResolver {
    async fn resolve(&self, _name: &str) -> Result<Vec<String>> {
        self.resolve_call_count.fetch_add(1, Ordering::SeqCst);
        Ok(self.matches.clone())
    }

    fn resolver_name(&self) -> &'static str {
        "fixed"
    }
}

/// A resolver whose lookup always fails
pub struct FailingResolver {
    message: &'static str,
}

impl FailingResolver {
    pub fn new(message: &'static str) -> Self {
        Self { message }
    }
}

#[async_trait::async_trait]
impl NameResolver for FailingResolver {
    async fn resolve(&self, _name: &str) -> Result<Vec<String>> {
        Err(Error::resolver(self.resolver_name(), self.message))
    }

    fn resolver_name(&self) -> &'static str {
        "failing"
    }
}

/// Tracks how many tasks are inside a critical section at once
#[derive(Clone, Default)]
pub struct OccupancyProbe {
    current: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl OccupancyProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark entry into the critical section
    pub fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    /// Mark exit from the critical section
    pub fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    /// Highest simultaneous occupancy observed
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}
