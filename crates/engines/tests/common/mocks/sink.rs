//! Prefetch sink mocks.

use engine_core::units::prefetch::PrefetchSink;
use mockall::mock;

mock! {
    pub Sink {}
    impl PrefetchSink for Sink {
        fn prefetch_line(&mut self, addr: u64, fill_this_level: bool, metadata: u32) -> bool;
        fn pq_occupancy(&self) -> usize;
        fn pq_size(&self) -> usize;
        fn mshr_occupancy(&self) -> usize;
        fn mshr_size(&self) -> usize;
    }
}

/// A hand-rolled sink that records every accepted request and lets tests
/// dial occupancy up and down to exercise back-pressure.
pub struct CountingSink {
    pub accepted: Vec<(u64, bool, u32)>,
    pub pq_occupancy: usize,
    pub pq_size: usize,
    pub mshr_occupancy: usize,
    pub mshr_size: usize,
    /// When false, `prefetch_line` rejects every request.
    pub accept: bool,
}

impl CountingSink {
    pub fn new() -> Self {
        Self {
            accepted: Vec::new(),
            pq_occupancy: 0,
            pq_size: 8,
            mshr_occupancy: 0,
            mshr_size: 16,
            accept: true,
        }
    }
}

impl Default for CountingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl PrefetchSink for CountingSink {
    fn prefetch_line(&mut self, addr: u64, fill_this_level: bool, metadata: u32) -> bool {
        if !self.accept {
            return false;
        }
        self.accepted.push((addr, fill_this_level, metadata));
        true
    }

    fn pq_occupancy(&self) -> usize {
        self.pq_occupancy
    }

    fn pq_size(&self) -> usize {
        self.pq_size
    }

    fn mshr_occupancy(&self) -> usize {
        self.mshr_occupancy
    }

    fn mshr_size(&self) -> usize {
        self.mshr_size
    }
}
