//! Sampled reuse-distance replacement ("expected time to reuse").
//!
//! Every way carries a signed ETR counter whose magnitude predicts how far
//! in the future the line will be touched again; the victim is the way with
//! the largest magnitude, preferring negative (overdue) values on ties. A
//! sampled subset of sets feeds a small tag/signature/timestamp cache whose
//! re-accesses yield reuse-distance samples; samples train a per-PC-signature
//! reuse-distance predictor by bounded temporal-difference steps. On fill,
//! the RDP entry for the access signature seeds the ETR counter.

use std::collections::HashMap;

use crate::config::{LOG2_BLOCK_SIZE, NUM_CPUS};

use super::{AccessType, CacheBlock, Replacement};

/// Reuse-distance history depth, in multiples of associativity.
const HISTORY: i32 = 8;
/// ETR clock period: one aging step per this many set accesses.
const GRANULARITY: i32 = 8;
/// Ways in the sampled cache.
const SAMPLED_CACHE_WAYS: usize = 5;
/// log2 of sampled-cache sets attached to each sampled LLC set.
const LOG2_SAMPLED_CACHE_SETS: u32 = 4;
/// Width of the wrapping per-set timestamp.
const TIMESTAMP_BITS: u32 = 8;

/// One line of the sampled cache.
#[derive(Clone, Copy, Debug, Default)]
struct SampledLine {
    valid: bool,
    tag: u64,
    signature: u32,
    timestamp: i32,
}

/// Sampled reuse-distance policy state.
pub struct MockingjayPolicy {
    num_sets: usize,
    num_ways: usize,
    log2_sets: u32,
    log2_size: u32,
    log2_sampled_sets: i32,
    sampled_tag_bits: u32,
    pc_signature_bits: u32,
    inf_rd: i32,
    inf_etr: i32,
    max_rd: i32,
    flexmin_penalty: f64,

    etr: Vec<i32>,
    etr_clock: Vec<i32>,
    current_timestamp: Vec<i32>,
    rdp: HashMap<u32, i32>,
    sampled_cache: HashMap<u32, Vec<SampledLine>>,
}

impl MockingjayPolicy {
    /// Creates the policy for a cache of the given geometry; dependent
    /// widths (`INF_RD`, `INF_ETR`, `MAX_RD`, signature and tag sizes) are
    /// derived here.
    pub fn new(num_sets: usize, num_ways: usize) -> Self {
        assert!(num_sets.is_power_of_two(), "set count must be a power of two");
        let log2_sets = num_sets.trailing_zeros();
        let log2_size = log2_sets + (num_ways as u64).ilog2() + LOG2_BLOCK_SIZE;
        let inf_rd = num_ways as i32 * HISTORY - 1;

        let mut policy = Self {
            num_sets,
            num_ways,
            log2_sets,
            log2_size,
            log2_sampled_sets: log2_size as i32 - 16,
            sampled_tag_bits: (31i32 - log2_size as i32).max(1) as u32,
            pc_signature_bits: (log2_size as i32 - 10).max(1) as u32,
            inf_rd,
            inf_etr: num_ways as i32 * HISTORY / GRANULARITY - 1,
            max_rd: inf_rd - 22,
            flexmin_penalty: 2.0 - (NUM_CPUS as f64).log2() / 4.0,
            etr: vec![0; num_sets * num_ways],
            etr_clock: vec![GRANULARITY; num_sets],
            current_timestamp: vec![0; num_sets],
            rdp: HashMap::new(),
            sampled_cache: HashMap::new(),
        };
        policy.initialize();
        policy
    }

    /// A set is sampled when its low index bits mirror its high index bits.
    fn is_sampled_set(&self, set: usize) -> bool {
        if self.log2_sampled_sets <= 0 || self.log2_sets as i32 <= self.log2_sampled_sets {
            return false;
        }
        let mask_length = self.log2_sets as i32 - self.log2_sampled_sets;
        let mask = (1usize << mask_length) - 1;
        (set & mask) == ((set >> (self.log2_sets as i32 - mask_length)) & mask)
    }

    fn crc_hash(block_address: u64) -> u64 {
        const CRC_POLYNOMIAL: u64 = 3_988_292_384;
        let mut value = block_address;
        for _ in 0..3 {
            value = if value & 1 == 1 { (value >> 1) ^ CRC_POLYNOMIAL } else { value >> 1 };
        }
        value
    }

    /// Hash-mix of `(pc, hit, prefetch, core)` truncated to the signature
    /// width. Hit only participates in single-core mode.
    fn pc_signature(&self, pc: u64, hit: bool, prefetch: bool, core: u32) -> u32 {
        let mut sig = if NUM_CPUS == 1 {
            let mut v = (pc << 1) | hit as u64;
            v = (v << 1) | prefetch as u64;
            Self::crc_hash(v)
        } else {
            let mut v = (pc << 1) | prefetch as u64;
            v = (v << 2) | (core & 0x3) as u64;
            Self::crc_hash(v)
        };
        sig = (sig << (64 - self.pc_signature_bits)) >> (64 - self.pc_signature_bits);
        sig as u32
    }

    fn sampled_cache_index(&self, full_addr: u64) -> u32 {
        let block = full_addr >> LOG2_BLOCK_SIZE;
        let bits = LOG2_SAMPLED_CACHE_SETS + self.log2_sets;
        if bits >= 64 {
            return block as u32;
        }
        ((block << (64 - bits)) >> (64 - bits)) as u32
    }

    fn sampled_cache_tag(&self, full_addr: u64) -> u64 {
        let mut addr = full_addr >> (self.log2_sets + LOG2_BLOCK_SIZE + LOG2_SAMPLED_CACHE_SETS);
        addr = (addr << (64 - self.sampled_tag_bits)) >> (64 - self.sampled_tag_bits);
        addr
    }

    fn search_sampled_cache(&self, tag: u64, index: u32) -> Option<usize> {
        let set = self.sampled_cache.get(&index)?;
        set.iter().position(|line| line.valid && line.tag == tag)
    }

    /// On sampled eviction, nudges the victim signature's predicted reuse
    /// toward "never" so dead signatures stop protecting lines.
    fn detrain(&mut self, index: u32, way: usize) {
        let inf_rd = self.inf_rd;
        let Some(set) = self.sampled_cache.get_mut(&index) else { return };
        if way >= SAMPLED_CACHE_WAYS || !set[way].valid {
            return;
        }
        let signature = set[way].signature;
        set[way].valid = false;
        self.rdp
            .entry(signature)
            .and_modify(|rd| *rd = (*rd + 1).min(inf_rd))
            .or_insert(inf_rd);
    }

    /// Blends a new reuse-distance sample into a predicted value by a
    /// bounded (1/16, minimum 1) step toward the sample.
    fn temporal_difference(&self, init: i32, sample: i32) -> i32 {
        const STEP: f64 = 1.0 / 16.0;
        if sample > init {
            let diff = (((sample - init) as f64 * STEP) as i32).min(1);
            (init + diff).min(self.inf_rd)
        } else if sample < init {
            let diff = (((init - sample) as f64 * STEP) as i32).min(1);
            (init - diff).max(0)
        } else {
            init
        }
    }

    fn increment_timestamp(input: i32) -> i32 {
        (input + 1) % (1 << TIMESTAMP_BITS)
    }

    /// Wrapping distance between two timestamps; always in
    /// `[0, 2^TIMESTAMP_BITS)`.
    fn time_elapsed(global: i32, local: i32) -> i32 {
        if global >= local {
            global - local
        } else {
            global + (1 << TIMESTAMP_BITS) - local
        }
    }

    fn etr_at(&self, set: usize, way: usize) -> i32 {
        self.etr[set * self.num_ways + way]
    }

    fn etr_at_mut(&mut self, set: usize, way: usize) -> &mut i32 {
        &mut self.etr[set * self.num_ways + way]
    }

    /// Largest ETR magnitude in the set.
    pub fn inf_etr(&self) -> i32 {
        self.inf_etr
    }

    /// Largest trainable reuse distance.
    pub fn max_rd(&self) -> i32 {
        self.max_rd
    }

    /// Whether `set` contributes reuse-distance samples.
    pub fn is_sampled(&self, set: usize) -> bool {
        self.is_sampled_set(set)
    }

    /// Current ETR counter of one way.
    pub fn etr_of(&self, set: usize, way: usize) -> i32 {
        self.etr_at(set, way)
    }
}

#[cfg(test)]
mod tests {
    use super::MockingjayPolicy;

    #[test]
    fn time_elapsed_wraps_into_range() {
        assert_eq!(MockingjayPolicy::time_elapsed(10, 3), 7);
        assert_eq!(MockingjayPolicy::time_elapsed(3, 250), 9);
        for global in [0, 1, 128, 255] {
            for local in [0, 1, 128, 255] {
                let elapsed = MockingjayPolicy::time_elapsed(global, local);
                assert!((0..256).contains(&elapsed));
            }
        }
    }

    #[test]
    fn timestamp_increment_wraps() {
        assert_eq!(MockingjayPolicy::increment_timestamp(254), 255);
        assert_eq!(MockingjayPolicy::increment_timestamp(255), 0);
    }
}

impl Replacement for MockingjayPolicy {
    fn initialize(&mut self) {
        self.etr.fill(0);
        self.etr_clock.fill(GRANULARITY);
        self.current_timestamp.fill(0);
        self.rdp.clear();
        self.sampled_cache.clear();

        let modifier = 1u32 << self.log2_sets;
        let limit = if self.log2_sampled_sets > 0 { 1u32 << self.log2_sampled_sets } else { 1 };
        for set in 0..self.num_sets {
            if !self.is_sampled_set(set) {
                continue;
            }
            for i in 0..limit {
                let idx = set as u32 + modifier * i;
                self.sampled_cache.insert(idx, vec![SampledLine::default(); SAMPLED_CACHE_WAYS]);
            }
        }
    }

    fn find_victim(
        &mut self,
        cpu: u32,
        _instr_id: u64,
        set: usize,
        current_set: &[CacheBlock],
        ip: u64,
        _full_addr: u64,
        access: AccessType,
    ) -> usize {
        for (way, block) in current_set.iter().enumerate().take(self.num_ways) {
            if !block.valid {
                return way;
            }
        }

        let mut max_etr = 0;
        let mut victim_way = 0;
        for way in 0..self.num_ways {
            let val = self.etr_at(set, way).abs();
            if val > max_etr || (val == max_etr && self.etr_at(set, way) < 0) {
                max_etr = val;
                victim_way = way;
            }
        }

        // A signature predicting reuse beyond MAX_RD could justify bypassing
        // the fill entirely; the conservative choice is to evict as normal.
        let _ = self.pc_signature(ip, false, access == AccessType::Prefetch, cpu);

        victim_way
    }

    fn update_state(
        &mut self,
        cpu: u32,
        set: usize,
        way: usize,
        full_addr: u64,
        ip: u64,
        _victim_addr: u64,
        access: AccessType,
        hit: bool,
    ) {
        if access == AccessType::Write {
            if !hit {
                *self.etr_at_mut(set, way) = -self.inf_etr;
            }
            return;
        }

        let pc_sig = self.pc_signature(ip, hit, access == AccessType::Prefetch, cpu);

        if self.is_sampled_set(set) {
            let index = self.sampled_cache_index(full_addr);
            let tag = self.sampled_cache_tag(full_addr);

            // A re-access of a sampled line yields one reuse-distance sample.
            if let Some(sampled_way) = self.search_sampled_cache(tag, index) {
                let line = self.sampled_cache[&index][sampled_way];
                let mut sample = Self::time_elapsed(self.current_timestamp[set], line.timestamp);
                if sample <= self.inf_rd {
                    if access == AccessType::Prefetch {
                        sample = (sample as f64 * self.flexmin_penalty) as i32;
                    }
                    let trained = match self.rdp.get(&line.signature) {
                        Some(&init) => self.temporal_difference(init, sample),
                        None => sample,
                    };
                    self.rdp.insert(line.signature, trained);
                    self.sampled_cache.get_mut(&index).unwrap()[sampled_way].valid = false;
                }
            }

            // Free the oldest sampled way, detraining lines that aged out.
            let timestamp = self.current_timestamp[set];
            if self.sampled_cache.contains_key(&index) {
                let mut lru_way: Option<usize> = None;
                let mut lru_rd = -1;
                let mut aged_out = Vec::new();
                {
                    let sampled_set = &self.sampled_cache[&index];
                    for (w, line) in sampled_set.iter().enumerate() {
                        if !line.valid {
                            lru_way = Some(w);
                            lru_rd = self.inf_rd + 1;
                            continue;
                        }
                        let sample = Self::time_elapsed(timestamp, line.timestamp);
                        if sample > self.inf_rd {
                            lru_way = Some(w);
                            lru_rd = self.inf_rd + 1;
                            aged_out.push(w);
                        } else if sample > lru_rd {
                            lru_way = Some(w);
                            lru_rd = sample;
                        }
                    }
                }
                for w in aged_out {
                    self.detrain(index, w);
                }
                if let Some(w) = lru_way {
                    self.detrain(index, w);
                }

                let sampled_set = self.sampled_cache.get_mut(&index).unwrap();
                for line in sampled_set.iter_mut() {
                    if !line.valid {
                        *line = SampledLine { valid: true, tag, signature: pc_sig, timestamp };
                        break;
                    }
                }
            }

            self.current_timestamp[set] = Self::increment_timestamp(timestamp);
        }

        // ETR clock: every GRANULARITY accesses, every other way in the set
        // steps one unit closer to its predicted reuse time.
        if self.etr_clock[set] == GRANULARITY {
            for w in 0..self.num_ways {
                if w != way && self.etr_at(set, w).abs() < self.inf_etr {
                    *self.etr_at_mut(set, w) -= 1;
                }
            }
            self.etr_clock[set] = 0;
        }
        self.etr_clock[set] += 1;

        if way < self.num_ways {
            let etr = match self.rdp.get(&pc_sig) {
                None => {
                    if NUM_CPUS == 1 {
                        0
                    } else {
                        self.inf_etr
                    }
                }
                Some(&rd) if rd > self.max_rd => self.inf_etr,
                Some(&rd) => rd / GRANULARITY,
            };
            *self.etr_at_mut(set, way) = etr;
        }
    }
}
