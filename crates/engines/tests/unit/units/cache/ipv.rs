//! IPV-RRIP tests: insertion/promotion vector semantics, aging, and the
//! random tie-break.

use engine_core::config::IpvVectors;
use engine_core::units::cache::policies::IpvPolicy;
use engine_core::units::cache::{AccessType, CacheBlock, Replacement};

fn policy(demand: &str, prefetch: &str, sets: usize, ways: usize) -> IpvPolicy {
    let vectors = IpvVectors::parse(&format!("{demand}#{prefetch}")).unwrap();
    IpvPolicy::new(sets, ways, vectors)
}

/// Insertion uses the vector entry at index L-1; with demand vector
/// [0,0,1,3] a demand fill lands at RRPV 3, and every way starts there.
#[test]
fn insertion_uses_last_vector_entry() {
    let mut p = policy("0 0 1 3", "0 0 2 3", 1, 4);

    for way in 0..4 {
        assert_eq!(p.rrpv_of(0, way), 3);
    }

    p.update_state(0, 0, 0, 0x1000, 0x40, 0, AccessType::Load, false);
    assert_eq!(p.rrpv_of(0, 0), 3, "demand insertion RRPV is demand_vector[3]");

    let blocks = vec![CacheBlock { valid: true, address: 0 }; 4];
    let victim = p.find_victim(0, 0, 0, &blocks, 0x40, 0x1000, AccessType::Load);
    assert!(victim < 4);
    assert_eq!(p.rrpv_of(0, victim), 3);
}

/// Promotion from RRPV i moves to vector[i]; promoting from the maximum
/// state reads vector[L-1], never vector[L].
#[test]
fn promotion_follows_vector() {
    let mut p = policy("0 0 1 1", "0 1 2 2", 1, 4);

    // Demand fill: insertion RRPV = demand[3] = 1.
    p.update_state(0, 0, 0, 0x1000, 0x40, 0, AccessType::Load, false);
    assert_eq!(p.rrpv_of(0, 0), 1);

    // Demand hit from state 1: demand[1] = 0.
    p.update_state(0, 0, 0, 0x1000, 0x40, 0, AccessType::Load, true);
    assert_eq!(p.rrpv_of(0, 0), 0);

    // Prefetch fill elsewhere: prefetch[3] = 2; prefetch hit: prefetch[2] = 2.
    p.update_state(0, 0, 1, 0x2000, 0x40, 0, AccessType::Prefetch, false);
    assert_eq!(p.rrpv_of(0, 1), 2);
    p.update_state(0, 0, 1, 0x2000, 0x40, 0, AccessType::Prefetch, true);
    assert_eq!(p.rrpv_of(0, 1), 2);

    // Promoting from the maximum state stays in range.
    let mut q = policy("0 0 1 3", "0 0 2 3", 1, 4);
    q.update_state(0, 0, 2, 0x3000, 0x40, 0, AccessType::Load, false);
    assert_eq!(q.rrpv_of(0, 2), 3);
    q.update_state(0, 0, 2, 0x3000, 0x40, 0, AccessType::Load, true);
    assert_eq!(q.rrpv_of(0, 2), 3, "promotion from state 3 reads demand_vector[3]");
}

/// When no way sits at the maximum RRPV, the whole set ages uniformly until
/// one does; the chosen victim then has the maximum RRPV.
#[test]
fn victim_search_ages_the_set() {
    let mut p = policy("0 0 1 1", "0 0 1 1", 1, 4);

    for way in 0..4 {
        p.update_state(0, 0, way, 0x1000 + way as u64 * 64, 0x40, 0, AccessType::Load, false);
        assert_eq!(p.rrpv_of(0, way), 1);
    }

    let blocks = vec![CacheBlock { valid: true, address: 0 }; 4];
    let victim = p.find_victim(0, 0, 0, &blocks, 0x40, 0x5000, AccessType::Load);
    assert_eq!(p.rrpv_of(0, victim), 3, "victim holds the maximum RRPV after aging");
    for way in 0..4 {
        assert_eq!(p.rrpv_of(0, way), 3, "aging is uniform across the set");
    }
}

/// The tie-break among maximum-RRPV ways always lands on a valid way.
#[test]
fn tie_break_stays_in_range() {
    let mut p = policy("0 0 1 3", "0 0 2 3", 2, 8);
    let blocks = vec![CacheBlock { valid: true, address: 0 }; 8];
    for _ in 0..100 {
        let victim = p.find_victim(0, 0, 1, &blocks, 0x40, 0x9000, AccessType::Load);
        assert!(victim < 8);
        assert_eq!(p.rrpv_of(1, victim), 3);
    }
}

/// Sets are independent.
#[test]
fn sets_are_independent() {
    let mut p = policy("0 0 1 1", "0 0 1 1", 2, 4);
    p.update_state(0, 0, 0, 0x1000, 0x40, 0, AccessType::Load, false);
    assert_eq!(p.rrpv_of(0, 0), 1);
    assert_eq!(p.rrpv_of(1, 0), 3, "untouched set keeps its initial state");
}
