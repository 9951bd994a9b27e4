//! Mock host interfaces.

pub mod sink;

pub use sink::{CountingSink, MockSink};
