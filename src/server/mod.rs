//! Server module for building HTTP servers
//!
//! This module provides a `ServerBuilder` that merges application routes
//! with health routes and request tracing, plus the tracing setup used by
//! binaries.

pub mod builder;

pub use builder::ServerBuilder;

use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber filtered by `RUST_LOG` (default `info`)
///
/// Does nothing if a global subscriber is already set.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
