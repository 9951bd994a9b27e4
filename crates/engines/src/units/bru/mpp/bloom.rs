//! Bloom filters over branch PCs.
//!
//! Two of these record which branches have ever been taken and ever been
//! not-taken; a branch present in only one filter is trivial and bypasses
//! the learners entirely. False positives are possible, false negatives are
//! not.

use crate::common::hash::combine;

/// A Bloom filter of `n` tables with `m` bool cells each.
pub struct BloomFilter {
    tables: Vec<Vec<bool>>,
    base: u64,
}

impl BloomFilter {
    /// `base` offsets the hash family so distinct filters stay independent.
    pub fn new(n: usize, m: usize, base: u64) -> Self {
        Self { tables: vec![vec![false; m]; n], base }
    }

    pub fn insert(&mut self, key: u64) {
        let base = self.base;
        for (i, table) in self.tables.iter_mut().enumerate() {
            let m = table.len() as u64;
            table[(combine(key, base + i as u64) % m) as usize] = true;
        }
    }

    pub fn probe(&self, key: u64) -> bool {
        self.tables.iter().enumerate().all(|(i, table)| {
            let m = table.len() as u64;
            table[(combine(key, self.base + i as u64) % m) as usize]
        })
    }

    pub fn reset(&mut self) {
        for table in &mut self.tables {
            table.fill(false);
        }
    }
}
