// # Name Resolver Implementations
//
// This module provides implementations of the NameResolver trait that do
// not depend on a cloud SDK.

pub mod memory;

pub use memory::MemoryResolver;
