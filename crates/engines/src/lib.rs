//! Predictive and replacement engine library for a trace-driven out-of-order
//! CPU simulator.
//!
//! This crate implements the learning components of the memory and control
//! speculation machinery:
//! 1. **Branch direction prediction:** a TAGE-SC-L engine plus two composite
//!    predictors built on top of it (a perceptron-augmented design guarded by
//!    a hard-to-predict branch identifier, and a multiperspective-perceptron
//!    design paired through a linear combiner).
//! 2. **Spatial prefetching:** four cooperating tables that learn per-region
//!    access patterns and drive a bounded prefetch emitter.
//! 3. **Cache replacement:** an insertion-and-promotion-vector RRIP policy
//!    and a sampled reuse-distance learner.
//!
//! The host simulator (driver loop, trace ingest, cache model) is an external
//! collaborator; it talks to this crate only through the module-kind traits
//! in [`units`] and the [`sim`] harness.

/// Common building blocks (saturating counters, history registers, hashes).
pub mod common;
/// Engine configuration (defaults, enums, hierarchical config structures).
pub mod config;
/// Synthetic-trace host harness used by the CLI and integration tests.
pub mod sim;
/// Statistics collection and reporting.
pub mod stats;
/// The three engine module kinds (branch prediction, prefetch, replacement).
pub mod units;

/// Root configuration type; use `Config::default()` or deserialize from JSON.
pub use crate::config::Config;
/// Engine statistics; collected by the harness, printed at exit.
pub use crate::stats::EngineStats;
