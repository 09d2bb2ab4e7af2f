//! Platform-specific locations.
//!
//! Nothing in the pipeline reads these directly: the CLI resolves them and
//! injects the result (see [`crate::schema::CacheScope`]).

pub mod paths;
