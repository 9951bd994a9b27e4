//! Common building blocks shared by the engines.
//!
//! This module provides:
//! 1. **Saturating counters:** signed and unsigned bounded cells with explicit
//!    max/min semantics ([`counter`]).
//! 2. **History registers:** a long circular taken/not-taken buffer and the
//!    incrementally-maintained XOR-fold of a window of it ([`history`]).
//! 3. **Hash and RNG helpers:** Murmur-style finalizers, index folding, and a
//!    deterministic xorshift generator ([`hash`]).
//! 4. **Error types:** configuration errors surfaced at init ([`error`]).

pub mod counter;
pub mod error;
pub mod hash;
pub mod history;

pub use counter::{SignedCounter, UnsignedCounter};
pub use error::EngineError;
pub use hash::{fold_index, mix1, mix2, Xorshift};
pub use history::{FoldedHistory, HistoryBuffer};
