//! Folded history tests.
//!
//! The incrementally maintained fold must match a straight XOR-fold of the
//! same window bit-exactly, stay below `2^compressed_length`, and support
//! one-step correction of a wrong speculative push.

use engine_core::common::{FoldedHistory, HistoryBuffer};

/// Original length 16 folded to 5 bits: pushing an alternating bit string
/// one bit at a time matches the reference straight fold after every push.
#[test]
fn incremental_fold_matches_straight_fold() {
    let mut buffer = HistoryBuffer::new(64);
    let mut folded = FoldedHistory::new(16, 5);

    for i in 0..16 {
        buffer.push(i % 2 == 0);
        folded.update(&buffer);
    }

    assert_eq!(folded.value(), buffer.fold_window(16, 5));
    assert!(folded.value() < 1 << 5);
}

/// The fold invariant holds across arbitrary push sequences and window
/// wraparound.
#[test]
fn fold_stays_in_range_and_exact() {
    let mut buffer = HistoryBuffer::new(128);
    let mut folded = FoldedHistory::new(40, 11);

    let mut x = 0x2545_f491_4f6c_dd1du64;
    for _ in 0..500 {
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        buffer.push(x & 1 != 0);
        folded.update(&buffer);
        assert_eq!(folded.value(), buffer.fold_window(40, 11));
        assert!(folded.value() < 1 << 11);
    }
}

/// A wrong speculative push followed by `correct` leaves the fold exactly
/// where a single correct push from the prior state would have.
#[test]
fn one_step_correction_law() {
    let mut wrong_buffer = HistoryBuffer::new(64);
    let mut wrong_fold = FoldedHistory::new(12, 7);
    let mut right_buffer = HistoryBuffer::new(64);
    let mut right_fold = FoldedHistory::new(12, 7);

    // Identical warmup on both tracks.
    for i in 0..30 {
        let bit = i % 3 == 1;
        wrong_buffer.push(bit);
        wrong_fold.update(&wrong_buffer);
        right_buffer.push(bit);
        right_fold.update(&right_buffer);
    }

    // Speculatively push the wrong bit, then correct it.
    wrong_buffer.push(true);
    wrong_fold.update(&wrong_buffer);
    let old = wrong_buffer.correct_newest(false);
    wrong_fold.correct(old, false);

    // Reference track pushes the correct bit once.
    right_buffer.push(false);
    right_fold.update(&right_buffer);

    assert_eq!(wrong_fold.value(), right_fold.value());

    // Subsequent pushes agree on both tracks.
    for i in 0..20 {
        let bit = i % 5 == 0;
        wrong_buffer.push(bit);
        wrong_fold.update(&wrong_buffer);
        right_buffer.push(bit);
        right_fold.update(&right_buffer);
        assert_eq!(wrong_fold.value(), right_fold.value());
    }
}
