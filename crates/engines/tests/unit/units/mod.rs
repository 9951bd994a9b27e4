//! Tests for the three engine module kinds.

pub mod bru;
pub mod cache;
pub mod prefetch;
