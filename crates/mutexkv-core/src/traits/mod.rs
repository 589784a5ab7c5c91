//! Core traits for the MutexKV registry
//!
//! - [`NameResolver`]: Translate a human-assigned name into canonical lock keys

pub mod name_resolver;

pub use name_resolver::NameResolver;
