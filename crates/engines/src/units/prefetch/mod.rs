//! Hardware prefetcher implementations.
//!
//! Prefetchers observe demand accesses, learn access patterns, and hand
//! prefetch requests back to the host through a [`PrefetchSink`]. The sink
//! also exposes the host's prefetch-queue and MSHR occupancy so an emitter
//! can stop issuing under back-pressure.

/// Spatial pattern prefetcher (filter/accumulate/pattern/buffer tables).
pub mod spatial;

/// Fixed-capacity associative tables with pluggable recency.
pub mod table;

pub use spatial::SpatialPrefetcher;
pub use table::{AssocTable, Recency};

use crate::config::{Config, PrefetcherKind};
use crate::stats::EngineStats;
use crate::units::cache::AccessType;

/// Bit position of the 2-bit prefetch source level in the metadata word.
const METADATA_SOURCE_SHIFT: u32 = 28;
/// Bit position of the 2-bit prefetch destination level in the metadata word.
const METADATA_DEST_SHIFT: u32 = 30;

/// Tags `metadata` with the cache level that generated the request.
pub fn metadata_with_source(metadata: u32, level: u32) -> u32 {
    metadata | (level << METADATA_SOURCE_SHIFT)
}

/// Tags `metadata` with the cache level the line should fill into.
pub fn metadata_with_dest(metadata: u32, level: u32) -> u32 {
    metadata | (level << METADATA_DEST_SHIFT)
}

/// Host-side interface the emitter issues prefetches through.
pub trait PrefetchSink {
    /// Queues one prefetch. Returns `false` when the host rejected it.
    fn prefetch_line(&mut self, addr: u64, fill_this_level: bool, metadata: u32) -> bool;

    /// Current prefetch queue occupancy.
    fn pq_occupancy(&self) -> usize;
    /// Prefetch queue capacity.
    fn pq_size(&self) -> usize;
    /// Current MSHR occupancy.
    fn mshr_occupancy(&self) -> usize;
    /// MSHR capacity.
    fn mshr_size(&self) -> usize;
}

/// Trait for cache prefetcher implementations.
pub trait Prefetcher {
    /// Resets learner state.
    fn initialize(&mut self) {}

    /// Observes one demand access and may emit prefetches via `sink`.
    /// Returns the metadata to propagate with the access.
    #[allow(clippy::too_many_arguments)]
    fn cache_operate(
        &mut self,
        addr: u64,
        ip: u64,
        cache_hit: bool,
        useful_prefetch: bool,
        access: AccessType,
        metadata_in: u32,
        sink: &mut dyn PrefetchSink,
    ) -> u32;

    /// Observes a fill into `(set, way)`, including the evicted address.
    fn cache_fill(
        &mut self,
        addr: u64,
        set: usize,
        way: usize,
        was_prefetch: bool,
        evicted_addr: u64,
        metadata_in: u32,
    ) -> u32;

    /// Per-cycle hook; unused by the spatial prefetcher.
    fn cycle_operate(&mut self) {}

    /// Branch-resolution hook; unused by the spatial prefetcher.
    fn branch_operate(&mut self, _ip: u64, _branch_type: u8, _target: u64) {}

    /// Copies internal counters into the run statistics.
    fn collect(&self, _stats: &mut EngineStats) {}

    /// Hook for end-of-run reporting.
    fn final_stats(&self) {}
}

/// Enum wrapper for static dispatch of prefetchers.
pub enum PrefetcherWrapper {
    None,
    Spatial(Box<SpatialPrefetcher>),
}

impl PrefetcherWrapper {
    /// Builds the configured prefetcher.
    pub fn new(config: &Config) -> Self {
        match config.prefetcher.kind {
            PrefetcherKind::None => Self::None,
            PrefetcherKind::Spatial => Self::Spatial(Box::new(SpatialPrefetcher::new())),
        }
    }
}

impl Prefetcher for PrefetcherWrapper {
    fn initialize(&mut self) {
        if let Self::Spatial(p) = self {
            p.initialize();
        }
    }

    fn cache_operate(
        &mut self,
        addr: u64,
        ip: u64,
        cache_hit: bool,
        useful_prefetch: bool,
        access: AccessType,
        metadata_in: u32,
        sink: &mut dyn PrefetchSink,
    ) -> u32 {
        match self {
            Self::None => metadata_in,
            Self::Spatial(p) => {
                p.cache_operate(addr, ip, cache_hit, useful_prefetch, access, metadata_in, sink)
            }
        }
    }

    fn cache_fill(
        &mut self,
        addr: u64,
        set: usize,
        way: usize,
        was_prefetch: bool,
        evicted_addr: u64,
        metadata_in: u32,
    ) -> u32 {
        match self {
            Self::None => metadata_in,
            Self::Spatial(p) => p.cache_fill(addr, set, way, was_prefetch, evicted_addr, metadata_in),
        }
    }

    fn collect(&self, stats: &mut EngineStats) {
        if let Self::Spatial(p) = self {
            p.collect(stats);
        }
    }

    fn final_stats(&self) {
        if let Self::Spatial(p) = self {
            p.final_stats();
        }
    }
}
