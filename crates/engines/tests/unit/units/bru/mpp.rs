//! MPP composite tests: Bloom-filter shortcut, combiner bookkeeping, and
//! end-to-end determinism.

use engine_core::units::bru::mpp::bloom::BloomFilter;
use engine_core::units::bru::mpp::{Combiner, MppPredictor};
use engine_core::units::bru::{BranchKind, ConditionalPredictor};

#[test]
fn bloom_filter_has_no_false_negatives() {
    let mut filter = BloomFilter::new(3, 1 << 10, 47);
    for pc in (0x1000..0x2000u64).step_by(64) {
        filter.insert(pc);
    }
    for pc in (0x1000..0x2000u64).step_by(64) {
        assert!(filter.probe(pc));
    }
    filter.reset();
    assert!(!filter.probe(0x1000));
}

/// A branch seen only taken is predicted taken without consulting the
/// learners.
#[test]
fn trivial_branch_shortcut() {
    let mut predictor = MppPredictor::new(64);
    let ip = 0x40_5000;

    // First resolve marks the branch ever-taken.
    predictor.predict(ip);
    predictor.last_branch_result(ip, ip + 0x40, true, BranchKind::Conditional);

    for _ in 0..50 {
        assert!(predictor.predict(ip), "only-ever-taken branch must predict taken");
        predictor.last_branch_result(ip, ip + 0x40, true, BranchKind::Conditional);
    }
}

#[test]
fn never_not_taken_branch_predicts_not_taken() {
    let mut predictor = MppPredictor::new(64);
    let ip = 0x40_6000;

    predictor.predict(ip);
    predictor.last_branch_result(ip, ip + 0x40, false, BranchKind::Conditional);

    for _ in 0..50 {
        assert!(!predictor.predict(ip));
        predictor.last_branch_result(ip, ip + 0x40, false, BranchKind::Conditional);
    }
}

/// The hardware budget always leaves room for the weight tables.
#[test]
fn budget_leaves_table_entries() {
    let entries = Combiner::affordable_entries(60_000);
    assert!(entries > 33 * (1 << 6), "at least one minimal table per feature");
    assert!(entries < 192 * 1024 * 8 / 6);
}

/// End-to-end determinism over a mixed stream with both trivial and
/// two-sided branches.
#[test]
fn composite_is_deterministic() {
    let run = || {
        let mut predictor = MppPredictor::new(256);
        let mut wrong = 0u64;
        let mut x = 0x0123_4567_89ab_cdefu64;
        for i in 0..20_000u64 {
            x ^= x << 13;
            x ^= x >> 7;
            x ^= x << 17;
            let ip = 0x40_0000 + (x % 24) * 16;
            let taken = (x >> 8) % 3 != 0 || ip % 48 == 0;
            let predicted = predictor.predict(ip);
            if predicted != taken {
                wrong += 1;
            }
            predictor.last_branch_result(ip, ip + 0x80, taken, BranchKind::Conditional);
            if i % 51 == 0 {
                predictor.last_branch_result(0x60_0000, 0x61_0000, true, BranchKind::IndirectCall);
            }
        }
        wrong
    };

    assert_eq!(run(), run());
}
