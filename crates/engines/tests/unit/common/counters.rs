//! Saturating counter tests.
//!
//! The counters clamp at their declared bounds under any operation sequence;
//! the signed variant's right shift is arithmetic with explicit behavior
//! when shifting by the full width.

use engine_core::common::{SignedCounter, UnsignedCounter};

/// Width 3 (max 7): ten increments then twenty decrements never leave
/// [0, 7], and the value pins to 0 from the seventh decrement on.
#[test]
fn unsigned_clamps_at_both_bounds() {
    let mut c = UnsignedCounter::new(3);

    for _ in 0..10 {
        c.increment();
        assert!(c.get() <= 7);
    }
    assert_eq!(c.get(), 7);
    assert!(c.is_max());

    for step in 1..=20 {
        c.decrement();
        if step >= 7 {
            assert_eq!(c.get(), 0, "pinned at zero from the seventh decrement");
        }
    }
    assert!(c.is_min());
}

#[test]
fn unsigned_msb_and_halfway() {
    let mut c = UnsignedCounter::new(6);
    assert!(!c.msb());
    c.set(32);
    assert!(c.msb());
    c.set_halfway();
    assert_eq!(c.get(), 31);
    assert!(!c.msb());
}

#[test]
fn unsigned_set_clamps() {
    let mut c = UnsignedCounter::new(4);
    c.set(1000);
    assert_eq!(c.get(), 15);
    c.add(1000);
    assert_eq!(c.get(), 15);
    c.sub(1000);
    assert_eq!(c.get(), 0);
}

#[test]
fn signed_bounds() {
    let mut c = SignedCounter::new(3);
    assert_eq!(c.min_value(), -4);
    assert_eq!(c.max_value(), 3);

    for _ in 0..10 {
        c.increment();
    }
    assert_eq!(c.get(), 3);
    for _ in 0..10 {
        c.decrement();
    }
    assert_eq!(c.get(), -4);
    assert!(c.is_min());
    assert!(c.msb());
}

/// Shifting a signed counter by at least its width yields 0 for
/// non-negative values and the minimum for negative values.
#[test]
fn signed_full_width_shift() {
    let mut pos = SignedCounter::with_value(5, 13);
    pos.shr(5);
    assert_eq!(pos.get(), 0);

    let mut neg = SignedCounter::with_value(5, -13);
    neg.shr(5);
    assert_eq!(neg.get(), neg.min_value());

    let mut arith = SignedCounter::with_value(5, -8);
    arith.shr(1);
    assert_eq!(arith.get(), -4, "shift below the width is arithmetic");
}

#[test]
fn signed_update_walks_toward_direction() {
    let mut c = SignedCounter::new(3);
    c.update(true);
    c.update(true);
    assert_eq!(c.get(), 2);
    c.update(false);
    assert_eq!(c.get(), 1);
}
