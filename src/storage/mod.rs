//! Storage implementations for table stores

pub mod in_memory;

pub use in_memory::{Condition, InMemoryTable};
