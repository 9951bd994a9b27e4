//! Local-history perceptron for hard-to-predict branches.
//!
//! Each tracked PC keeps a long local history built from variable-size
//! windows; many shared hash tables each read one window, concatenate it
//! with the PC, and hash twice through a Murmur-style mixer to pick a
//! weight. The window and stride schedule are monotonic functions of the
//! table index, so early tables see dense recent history and later tables
//! see sparse old history.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::common::{SignedCounter, UnsignedCounter};

use super::global_perceptron::PerceptronOutput;

const LOG2_TABLE_SIZE: u32 = 8;
const HASH_ITERATIONS: u64 = 2;

const WEIGHT_BITS: u32 = 10;
const BIAS_BITS: u32 = 12;
/// One bias bit of history; larger values were not worth it.
const LOG2_BIAS_ENTRIES: u32 = 1;
const THETA_BITS: u32 = 10;
const TC_BITS: u32 = 7;

const THETA_INC: u64 = 8;
const WEIGHT_THRESH: i64 = 2;

const NUM_ENTRIES: usize = 32;
const QUEUE_SIZE: usize = 64;

const BASELINE_COMP_BITS: u32 = 6;
const STABLE_CNT_BITS: u32 = 8;
const GRACE_PERIOD_BITS: u32 = 9;
const GRACE_PERIOD: u64 = (1 << GRACE_PERIOD_BITS) - 1;
const TIME_ALIVE_BITS: u32 = 16;

/// Number of shared weight tables.
const NUM_TABLES: usize = 64;

/// History positions skipped after reading table `x`'s window.
fn stride_size(x: usize) -> usize {
    if x <= 10 {
        0
    } else {
        (1.0 + 3.0 / NUM_TABLES as f64 * x as f64) as usize
    }
}

/// History window width read by table `x`.
fn window_size(x: usize) -> usize {
    if x <= 10 {
        x + 1
    } else {
        (8.0 + 4.0 / NUM_TABLES as f64 * x as f64) as usize
    }
}

/// Total local history length implied by the window/stride schedule.
fn history_length() -> usize {
    (0..=NUM_TABLES - 2).map(stride_size).sum::<usize>() + window_size(NUM_TABLES - 1)
}

/// Murmur-style double mix of (PC, history window, hash iteration).
fn hash_index(pc: u64, window: u64, iteration: u64) -> usize {
    let mut h = pc ^ (pc >> 16);
    h ^= window
        .wrapping_add(0x9e37_79b9_7f4a_7c15)
        .wrapping_add(h << 6)
        .wrapping_add(h >> 2);
    h ^= iteration
        .wrapping_add(0x7f4a_7c15_e377_9b97)
        .wrapping_add(h << 6)
        .wrapping_add(h >> 2);

    h ^= h >> 33;
    h = h.wrapping_mul(0xff51_afd7_ed55_8ccd);
    h ^= h >> 33;
    h = h.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    h ^= h >> 33;

    (h & ((1 << LOG2_TABLE_SIZE) - 1)) as usize
}

struct Entry {
    local_hist: VecDeque<bool>,
    bias: Vec<SignedCounter>,
    theta: UnsignedCounter,
    tc: SignedCounter,
    baseline_comp: UnsignedCounter,
    stable_cnt: UnsignedCounter,
    grace_period: UnsignedCounter,
    time_alive: UnsignedCounter,
    old_histories: HashMap<u64, VecDeque<bool>>,
}

impl Entry {
    fn new(hist_len: usize) -> Self {
        let mut theta = UnsignedCounter::new(THETA_BITS);
        theta.set((1.93 * (NUM_TABLES as u64 * HASH_ITERATIONS) as f64 + 14.0) as u64);
        Self {
            local_hist: VecDeque::from(vec![false; hist_len]),
            bias: vec![SignedCounter::new(BIAS_BITS); 1 << LOG2_BIAS_ENTRIES],
            theta,
            tc: SignedCounter::new(TC_BITS),
            baseline_comp: UnsignedCounter::new(BASELINE_COMP_BITS),
            stable_cnt: UnsignedCounter::new(STABLE_CNT_BITS),
            grace_period: UnsignedCounter::new(GRACE_PERIOD_BITS),
            time_alive: UnsignedCounter::new(TIME_ALIVE_BITS),
            old_histories: HashMap::new(),
        }
    }
}

fn bias_index(hist: &VecDeque<bool>) -> usize {
    let mut idx = 0;
    for i in 0..LOG2_BIAS_ENTRIES as usize {
        idx = (idx << 1) | hist[i] as usize;
    }
    idx
}

/// The local-history perceptron bank.
pub struct LocalPerceptron {
    weights: Vec<Vec<SignedCounter>>,
    entries: HashMap<u64, Entry>,
    queue: VecDeque<u64>,
    queue_lookup: HashSet<u64>,
    hist_len: usize,
}

impl LocalPerceptron {
    pub fn new() -> Self {
        Self {
            weights: vec![
                vec![SignedCounter::new(WEIGHT_BITS); 1 << LOG2_TABLE_SIZE];
                NUM_TABLES
            ],
            entries: HashMap::new(),
            queue: VecDeque::new(),
            queue_lookup: HashSet::new(),
            hist_len: history_length(),
        }
    }

    fn window_value(hist: &VecDeque<bool>, pos: usize, width: usize) -> u64 {
        let mut idx = 0;
        for j in 0..width {
            idx = (idx << 1) | hist[pos + j] as u64;
        }
        idx
    }

    /// Computes the perceptron output for a tracked PC.
    pub fn predict(&self, pc: u64) -> PerceptronOutput {
        let entry = self.entries.get(&pc).expect("predict on untracked PC");

        let mut sum = entry.bias[bias_index(&entry.local_hist)].get() << 3;
        for iteration in 0..HASH_ITERATIONS {
            let mut pos = 0;
            for (i, table) in self.weights.iter().enumerate() {
                let window = Self::window_value(&entry.local_hist, pos, window_size(i));
                let weight = table[hash_index(pc, window, iteration)].get();
                if weight.abs() >= WEIGHT_THRESH {
                    sum += weight;
                }
                pos += stride_size(i);
            }
        }

        let high = sum.abs() > entry.theta.get() as i64 && entry.baseline_comp.msb();
        let med = !high && entry.baseline_comp.msb();
        PerceptronOutput {
            sum,
            high_confidence: high,
            med_confidence: med,
            low_confidence: !high && !med,
        }
    }

    /// Speculatively shifts the predicted direction into the PC's local
    /// history, snapshotting the prediction-time history under `id`.
    pub fn history_update(&mut self, pc: u64, id: u64, predicted: bool) {
        if let Some(entry) = self.entries.get_mut(&pc) {
            entry.old_histories.insert(id, entry.local_hist.clone());
            entry.local_hist.pop_back();
            entry.local_hist.push_front(predicted);
        }
    }

    /// Trains the entry for `pc` against the resolved direction.
    pub fn update(
        &mut self,
        pc: u64,
        id: u64,
        resolved: bool,
        final_pred: bool,
        percep_sum: i64,
        competitor: bool,
    ) {
        assert!(self.entries.contains_key(&pc));

        if !self.entries[&pc].old_histories.contains_key(&id) {
            return;
        }

        for entry in self.entries.values_mut() {
            entry.time_alive.add(1);
        }

        let percep_taken = percep_sum >= 0;
        let entry = self.entries.get_mut(&pc).unwrap();
        entry.time_alive.reset();
        let old_hist = entry.old_histories.remove(&id).unwrap();

        if resolved != percep_taken || percep_sum.abs() <= entry.theta.get() as i64 {
            let bias = &mut entry.bias[bias_index(&old_hist)];
            if resolved {
                bias.add(1);
            } else {
                bias.sub(1);
            }

            for iteration in 0..HASH_ITERATIONS {
                let mut pos = 0;
                for (i, table) in self.weights.iter_mut().enumerate() {
                    let window = Self::window_value(&old_hist, pos, window_size(i));
                    let weight = &mut table[hash_index(pc, window, iteration)];
                    if resolved {
                        weight.add(1);
                    } else {
                        weight.sub(1);
                    }
                    pos += stride_size(i);
                }
            }
        }

        // O-GEHL threshold adaptation.
        if resolved != percep_taken {
            entry.tc.add(1);
            if entry.tc.is_max() {
                entry.theta.add(THETA_INC);
                entry.tc.reset();
            }
        } else if percep_sum.abs() <= entry.theta.get() as i64 {
            entry.tc.sub(1);
            if entry.tc.is_min() {
                entry.theta.sub(THETA_INC);
                entry.tc.reset();
            }
        }

        // Repair the speculative local-history push.
        if final_pred != resolved {
            assert_eq!(entry.local_hist.front(), Some(&final_pred));
            entry.local_hist.pop_front();
            entry.local_hist.push_front(resolved);
        }

        if entry.grace_period.get() < GRACE_PERIOD {
            entry.grace_period.add(1);
        } else if entry.baseline_comp.get() == 0 || entry.baseline_comp.is_max() {
            entry.stable_cnt.add(1);
        } else {
            entry.stable_cnt.shr(1);
        }

        if competitor == resolved && percep_taken != resolved {
            entry.baseline_comp.sub(1);
        } else if competitor != resolved && percep_taken == resolved {
            entry.baseline_comp.add(1);
        }
    }

    fn promote_queued(&mut self) {
        if let Some(next) = self.queue.pop_front() {
            self.queue_lookup.remove(&next);
            let hist_len = self.hist_len;
            self.entries.insert(next, Entry::new(hist_len));
        }
    }

    /// Evicts `pc` when its comparator proves it persistently loses to the
    /// baseline. Returns true when an eviction happened.
    pub fn check_eviction(&mut self, pc: u64) -> bool {
        let evict = match self.entries.get(&pc) {
            Some(entry) => entry.stable_cnt.is_max() && entry.baseline_comp.get() == 0,
            None => false,
        };
        if evict {
            assert!(self.entries[&pc].grace_period.get() >= GRACE_PERIOD);
            self.entries.remove(&pc);
            self.promote_queued();
        }
        evict
    }

    /// Evicts one entry whose time-alive counter saturated, if any.
    pub fn check_stale_eviction(&mut self) -> bool {
        let stale = self
            .entries
            .iter()
            .filter(|(_, e)| e.time_alive.is_max())
            .map(|(pc, _)| *pc)
            .min();
        if let Some(pc) = stale {
            self.entries.remove(&pc);
            self.promote_queued();
            return true;
        }
        false
    }

    /// Starts tracking a newly declared H2P branch, or queues it when the
    /// entry table is full. PC 0 is reserved as the null encoding.
    pub fn insert(&mut self, pc: u64) {
        if pc == 0 {
            return;
        }
        assert!(!self.entries.contains_key(&pc));

        if self.entries.len() < NUM_ENTRIES {
            let hist_len = self.hist_len;
            self.entries.insert(pc, Entry::new(hist_len));
        } else if self.queue.len() < QUEUE_SIZE {
            self.queue.push_back(pc);
            self.queue_lookup.insert(pc);
        } else {
            let dropped = self.queue.pop_front().unwrap();
            self.queue_lookup.remove(&dropped);
            self.queue.push_back(pc);
            self.queue_lookup.insert(pc);
        }
    }

    pub fn contains(&self, pc: u64) -> bool {
        self.entries.contains_key(&pc)
    }

    pub fn contains_or_queued(&self, pc: u64) -> bool {
        self.entries.contains_key(&pc) || self.queue_lookup.contains(&pc)
    }

    /// A trained entry whose comparator leans its way and has been stable.
    pub fn is_superior(&self, pc: u64) -> bool {
        let entry = &self.entries[&pc];
        entry.baseline_comp.msb() && entry.stable_cnt.is_max()
    }
}

impl Default for LocalPerceptron {
    fn default() -> Self {
        Self::new()
    }
}
