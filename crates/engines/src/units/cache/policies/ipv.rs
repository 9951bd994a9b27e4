//! Insertion-and-Promotion-Vector RRIP replacement.
//!
//! Each set holds one RRPV per way. Two immutable vectors of length `L`
//! (the number of RRPV states) drive all transitions: `vector[i]` is the
//! RRPV a line moves to when promoted from state `i`, and `vector[L - 1]`
//! is the insertion RRPV. Demand and prefetch accesses use separate vectors.
//! Victim selection ages the whole set until some way reaches `L - 1` and
//! breaks ties uniformly at random.

use crate::common::Xorshift;
use crate::config::IpvVectors;

use super::{AccessType, CacheBlock, Replacement};

/// RRPV state for one cache set.
#[derive(Clone, Debug)]
struct IpvSet {
    rrpvs: Vec<u32>,
}

impl IpvSet {
    fn new(ways: usize, max_rrpv: u32) -> Self {
        Self { rrpvs: vec![max_rrpv; ways] }
    }
}

/// IPV-RRIP policy state.
pub struct IpvPolicy {
    ways: usize,
    vectors: IpvVectors,
    sets: Vec<IpvSet>,
    rng: Xorshift,
}

impl IpvPolicy {
    /// Creates the policy from validated vectors.
    pub fn new(num_sets: usize, ways: usize, vectors: IpvVectors) -> Self {
        assert!(!vectors.is_empty(), "IPV vectors must be validated before use");
        let max_rrpv = (vectors.len() - 1) as u32;

        println!(
            "[IPV] demand {:?} prefetch {:?} ({} states, {} sets x {} ways)",
            vectors.demand, vectors.prefetch, vectors.len(), num_sets, ways
        );

        Self {
            ways,
            sets: vec![IpvSet::new(ways, max_rrpv); num_sets],
            vectors,
            rng: Xorshift::new(),
        }
    }

    fn max_valid_rrpv(&self) -> u32 {
        (self.vectors.len() - 1) as u32
    }

    /// Current RRPV of one way.
    pub fn rrpv_of(&self, set: usize, way: usize) -> u32 {
        self.sets[set].rrpvs[way]
    }

    /// Insertion RRPV: the vector entry at index `L - 1`, never index `L`.
    fn insert(&mut self, set: usize, way: usize, prefetch: bool) {
        let v = if prefetch { &self.vectors.prefetch } else { &self.vectors.demand };
        self.sets[set].rrpvs[way] = v[v.len() - 1];
    }

    /// Promotion: the new RRPV is the vector entry indexed by the old RRPV.
    fn promote(&mut self, set: usize, way: usize, prefetch: bool) {
        let v = if prefetch { &self.vectors.prefetch } else { &self.vectors.demand };
        let old = self.sets[set].rrpvs[way] as usize;
        self.sets[set].rrpvs[way] = v[old];
    }
}

impl Replacement for IpvPolicy {
    fn initialize(&mut self) {
        let max_rrpv = self.max_valid_rrpv();
        for set in &mut self.sets {
            set.rrpvs.fill(max_rrpv);
        }
    }

    fn find_victim(
        &mut self,
        _cpu: u32,
        _instr_id: u64,
        set: usize,
        _current_set: &[CacheBlock],
        _ip: u64,
        _full_addr: u64,
        _access: AccessType,
    ) -> usize {
        let max_valid = self.max_valid_rrpv();
        let rrpvs = &mut self.sets[set].rrpvs;

        // Age uniformly until at least one way reaches the maximum state.
        let mut max_rrpv = *rrpvs.iter().max().unwrap();
        while max_rrpv != max_valid {
            for r in rrpvs.iter_mut() {
                *r += 1;
            }
            max_rrpv = *rrpvs.iter().max().unwrap();
        }

        let candidates: Vec<usize> = rrpvs
            .iter()
            .enumerate()
            .filter(|(_, &r)| r == max_rrpv)
            .map(|(w, _)| w)
            .collect();
        assert!(!candidates.is_empty() && candidates.len() <= self.ways);

        candidates[(self.rng.next() as usize) % candidates.len()]
    }

    fn update_state(
        &mut self,
        _cpu: u32,
        set: usize,
        way: usize,
        _full_addr: u64,
        _ip: u64,
        _victim_addr: u64,
        access: AccessType,
        hit: bool,
    ) {
        assert!(way < self.ways && set < self.sets.len());

        let prefetch = access == AccessType::Prefetch;
        if hit {
            self.promote(set, way, prefetch);
        } else {
            self.insert(set, way, prefetch);
        }
    }
}
