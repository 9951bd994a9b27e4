//! Spatial prefetcher tests: table exclusivity, pattern replay, emitter
//! boundary behavior, and back-pressure retries.

use engine_core::units::prefetch::spatial::{LOG2_REGION_SIZE, NUM_BLOCKS};
use engine_core::units::prefetch::SpatialPrefetcher;

use crate::common::mocks::{CountingSink, MockSink};

const LOG2_BLOCK: u64 = 6;

fn block(region: u64, offset: u64) -> u64 {
    region * NUM_BLOCKS as u64 + offset
}

fn addr_of(region: u64, offset: u64) -> u64 {
    (region << LOG2_REGION_SIZE) + (offset << LOG2_BLOCK)
}

/// Teaches the pattern table a footprint for (trigger, second) by touching
/// the offsets in one region and then evicting it.
fn teach(prefetcher: &mut SpatialPrefetcher, region: u64, offsets: &[u64], pc: u64) {
    for &offset in offsets {
        prefetcher.access(block(region, offset), pc);
    }
    prefetcher.evict(block(region, 0));
}

/// A region is tracked by at most one of filter/accumulate; the second
/// distinct touch moves it from the filter to the accumulator.
#[test]
fn filter_accumulate_exclusivity() {
    let mut prefetcher = SpatialPrefetcher::new();
    let region = 77;

    prefetcher.access(block(region, 5), 0x400);
    assert!(prefetcher.in_filter(region));
    assert!(!prefetcher.in_accumulate(region));

    // Re-touching the trigger changes nothing.
    prefetcher.access(block(region, 5), 0x400);
    assert!(prefetcher.in_filter(region));
    assert!(!prefetcher.in_accumulate(region));

    prefetcher.access(block(region, 17), 0x400);
    assert!(!prefetcher.in_filter(region));
    assert!(prefetcher.in_accumulate(region));
}

/// Replaying a learned footprint: touching offsets 5 then 17 of a fresh
/// region emits the remembered offsets {20, 33, 40}, never the two seeds,
/// with level metadata attached.
#[test]
fn pattern_replay_skips_seed_offsets() {
    let mut prefetcher = SpatialPrefetcher::new();
    let pc = 0x400;
    teach(&mut prefetcher, 100, &[5, 17, 20, 33, 40], pc);

    let mut sink = CountingSink::new();
    let fresh = 200;
    prefetcher.access(block(fresh, 5), pc);
    prefetcher.emit(&mut sink, block(fresh, 5));
    assert!(sink.accepted.is_empty(), "one touch must not trigger replay");

    prefetcher.access(block(fresh, 17), pc);
    prefetcher.emit(&mut sink, block(fresh, 17));

    let mut offsets: Vec<u64> = sink
        .accepted
        .iter()
        .map(|(addr, _, _)| (addr >> LOG2_BLOCK) % NUM_BLOCKS as u64)
        .collect();
    offsets.sort_unstable();
    assert_eq!(offsets, vec![20, 33, 40]);

    for (addr, fill_this_level, metadata) in &sink.accepted {
        assert_eq!(addr >> LOG2_REGION_SIZE, fresh);
        assert!(*fill_this_level, "learned footprints fill the near level");
        assert_eq!((metadata >> 28) & 3, 1, "source level");
        assert_eq!((metadata >> 30) & 3, 1, "destination level");
    }
}

/// Back-pressure leaves the buffer entry alive; the retry emits exactly the
/// offsets that were never issued, and nothing twice.
#[test]
fn emission_is_idempotent_across_backpressure() {
    let mut prefetcher = SpatialPrefetcher::new();
    let pc = 0x400;
    teach(&mut prefetcher, 300, &[5, 17, 20, 33, 40], pc);

    let fresh = 400;
    let mut sink = CountingSink::new();
    sink.pq_occupancy = sink.pq_size; // full queue: everything deferred

    prefetcher.access(block(fresh, 5), pc);
    prefetcher.access(block(fresh, 17), pc);
    prefetcher.emit(&mut sink, block(fresh, 17));
    assert!(sink.accepted.is_empty());

    // Queue drains; the retry picks up where the first round stopped.
    sink.pq_occupancy = 0;
    prefetcher.emit(&mut sink, block(fresh, 17));

    let mut offsets: Vec<u64> = sink
        .accepted
        .iter()
        .map(|(addr, _, _)| (addr >> LOG2_BLOCK) % NUM_BLOCKS as u64)
        .collect();
    offsets.sort_unstable();
    assert_eq!(offsets, vec![20, 33, 40], "retry must emit each pending offset exactly once");

    // The entry is gone after a full walk.
    sink.accepted.clear();
    prefetcher.emit(&mut sink, block(fresh, 17));
    assert!(sink.accepted.is_empty());
}

/// The emitter consults the host's queue occupancy through the sink
/// interface before every request.
#[test]
fn emitter_checks_capacity_through_sink() {
    let mut prefetcher = SpatialPrefetcher::new();
    let pc = 0x400;
    teach(&mut prefetcher, 500, &[3, 9, 12], pc);

    let fresh = 600;
    prefetcher.access(block(fresh, 3), pc);
    prefetcher.access(block(fresh, 9), pc);

    let mut sink = MockSink::new();
    sink.expect_pq_occupancy().return_const(0usize);
    sink.expect_pq_size().return_const(8usize);
    sink.expect_mshr_occupancy().return_const(0usize);
    sink.expect_mshr_size().return_const(16usize);
    sink.expect_prefetch_line().times(1).returning(|addr, _, _| {
        assert_eq!((addr >> LOG2_BLOCK) % NUM_BLOCKS as u64, 12);
        true
    });

    prefetcher.emit(&mut sink, block(fresh, 9));
}

/// A streaming region (trigger 0, second 1, fully touched) trains the
/// confidence counter; once saturated, fresh streaming regions synthesize a
/// footprint with L1 fills in the first quarter and L2 fills in the rest.
#[test]
fn spatial_streaming_confidence() {
    let mut prefetcher = SpatialPrefetcher::new();
    let pc = 0x800;

    // Eight all-set streaming regions saturate the confidence counter.
    for region in 0..8u64 {
        let offsets: Vec<u64> = (0..NUM_BLOCKS as u64).collect();
        teach(&mut prefetcher, 1000 + region, &offsets, pc);
    }

    let fresh = 2000;
    let mut sink = CountingSink::new();
    prefetcher.access(block(fresh, 0), pc);
    prefetcher.access(block(fresh, 1), pc);
    prefetcher.emit(&mut sink, block(fresh, 1));

    assert!(!sink.accepted.is_empty());
    for (addr, fill_this_level, _) in &sink.accepted {
        let offset = (addr >> LOG2_BLOCK) % NUM_BLOCKS as u64;
        if offset < NUM_BLOCKS as u64 / 4 {
            assert!(*fill_this_level, "first quarter fills near");
        } else {
            assert!(!*fill_this_level, "rest fills far");
        }
    }
}
