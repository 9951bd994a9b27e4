//! Engine module kinds.
//!
//! The three kinds share no interface beyond lifecycle; each defines its own
//! trait and an enum wrapper for static dispatch, chosen from configuration
//! at construction:
//! - [`bru`]: conditional branch direction predictors.
//! - [`prefetch`]: demand-access-driven prefetchers.
//! - [`cache`]: cache replacement policies.

/// Branch prediction unit (direction predictors and their shared state).
pub mod bru;

/// Cache replacement policies.
pub mod cache;

/// Hardware prefetchers.
pub mod prefetch;
