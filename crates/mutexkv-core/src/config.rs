//! Configuration types for the MutexKV registry
//!
//! Every field has a default, so an empty JSON object is a valid config
//! and reproduces the plain grow-only registry.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Registry configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutexKvConfig {
    /// Log a warning when a caller waited longer than this for a key
    /// (in milliseconds).
    ///
    /// Set to 0 to disable the warning.
    #[serde(default = "default_contention_warn_ms")]
    pub contention_warn_ms: u64,

    /// What happens to entries once nobody holds or awaits them
    #[serde(default)]
    pub eviction: EvictionPolicy,
}

impl MutexKvConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self {
            contention_warn_ms: default_contention_warn_ms(),
            eviction: EvictionPolicy::default(),
        }
    }

    /// Set the contention warning threshold
    pub fn with_contention_warn_ms(mut self, ms: u64) -> Self {
        self.contention_warn_ms = ms;
        self
    }

    /// Set the eviction policy
    pub fn with_eviction(mut self, eviction: EvictionPolicy) -> Self {
        self.eviction = eviction;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.eviction.validate()
    }

    /// Parse and validate a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self, crate::Error> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, crate::Error> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&contents)
    }

    /// Contention warning threshold, `None` when disabled
    pub fn contention_warn_after(&self) -> Option<std::time::Duration> {
        (self.contention_warn_ms > 0)
            .then(|| std::time::Duration::from_millis(self.contention_warn_ms))
    }
}

impl Default for MutexKvConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Eviction policy for registry entries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EvictionPolicy {
    /// Entries live for the lifetime of the registry
    #[default]
    Never,

    /// Entries idle for longer than `max_idle_secs` are dropped
    /// opportunistically on the next `lock`
    Idle {
        /// Idle time after which an unused entry may be removed
        max_idle_secs: u64,
    },
}

impl EvictionPolicy {
    /// Validate the eviction policy
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            EvictionPolicy::Idle { max_idle_secs: 0 } => Err(crate::Error::config(
                "Idle eviction max_idle_secs must be > 0",
            )),
            _ => Ok(()),
        }
    }

    /// Idle threshold, `None` for `Never`
    ///
    /// A threshold too large for `chrono::Duration` also yields `None`.
    pub fn max_idle(&self) -> Option<chrono::Duration> {
        match self {
            EvictionPolicy::Never => None,
            EvictionPolicy::Idle { max_idle_secs } => i64::try_from(*max_idle_secs)
                .ok()
                .and_then(chrono::Duration::try_seconds),
        }
    }
}

fn default_contention_warn_ms() -> u64 {
    30_000
}
