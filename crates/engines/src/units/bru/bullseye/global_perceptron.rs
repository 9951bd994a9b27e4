//! Global-history perceptron for hard-to-predict branches.
//!
//! One perceptron entry per H2P PC: a weight per global-history position, a
//! small bias table indexed by the earliest history bits, an adaptively
//! trained threshold, and the bookkeeping counters that decide when the
//! entry is trusted or evicted. Overflow candidates wait in a FIFO queue.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::common::{SignedCounter, UnsignedCounter};

const HIST_LEN: usize = 128;
const WEIGHT_BITS: u32 = 12;
const BIAS_BITS: u32 = 10;
const LOG2_BIAS_ENTRIES: u32 = 4;
const THETA_BITS: u32 = 14;
const TC_BITS: u32 = 7;

const THETA_INC: u64 = 8;
/// Weights below this magnitude do not contribute to the sum.
const WEIGHT_THRESH: i64 = 2;

const NUM_ENTRIES: usize = 16;
const QUEUE_SIZE: usize = 64;

const BASELINE_COMP_BITS: u32 = 6;
const STABLE_CNT_BITS: u32 = 8;
const GRACE_PERIOD_BITS: u32 = 9;
const GRACE_PERIOD: u64 = (1 << GRACE_PERIOD_BITS) - 1;
const TIME_ALIVE_BITS: u32 = 16;

/// Per-prediction output with its confidence band.
#[derive(Clone, Copy, Debug, Default)]
pub struct PerceptronOutput {
    /// Raw perceptron sum; the prediction is `sum >= 0`.
    pub sum: i64,
    pub high_confidence: bool,
    pub med_confidence: bool,
    pub low_confidence: bool,
}

struct Entry {
    weights: Vec<SignedCounter>,
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
    fn new() -> Self {
        let mut theta = UnsignedCounter::new(THETA_BITS);
        theta.set((2.5 * HIST_LEN as f64) as u64);
        Self {
            weights: vec![SignedCounter::new(WEIGHT_BITS); HIST_LEN],
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

/// The global-history perceptron bank.
pub struct GlobalPerceptron {
    global_hist: VecDeque<bool>,
    entries: HashMap<u64, Entry>,
    queue: VecDeque<u64>,
    queue_lookup: HashSet<u64>,
}

impl GlobalPerceptron {
    pub fn new() -> Self {
        Self {
            global_hist: VecDeque::from(vec![false; HIST_LEN]),
            entries: HashMap::new(),
            queue: VecDeque::new(),
            queue_lookup: HashSet::new(),
        }
    }

    /// Computes the perceptron output for a tracked PC.
    pub fn predict(&self, pc: u64) -> PerceptronOutput {
        let entry = self.entries.get(&pc).expect("predict on untracked PC");

        let mut sum = entry.bias[bias_index(&self.global_hist)].get() << 3;
        for (i, weight) in entry.weights.iter().enumerate() {
            if weight.get().abs() >= WEIGHT_THRESH {
                sum += if self.global_hist[i] { weight.get() } else { -weight.get() };
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

    /// Speculatively shifts the predicted direction into the global history;
    /// tracked PCs snapshot the prediction-time history under `id` first.
    pub fn history_update(&mut self, pc: u64, id: u64, predicted: bool) {
        if let Some(entry) = self.entries.get_mut(&pc) {
            entry.old_histories.insert(id, self.global_hist.clone());
        }
        self.global_hist.pop_back();
        self.global_hist.push_front(predicted);
    }

    /// Repairs the speculative history push once the branch resolves.
    pub fn refine_history(&mut self, resolved: bool, predicted: bool) {
        if predicted != resolved {
            assert_eq!(self.global_hist.front(), Some(&predicted));
            self.global_hist.pop_front();
            self.global_hist.push_front(resolved);
        }
    }

    /// Trains the entry for `pc` against the resolved direction.
    /// `competitor` is the direction the best competing predictor chose.
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

        // The entry may have been created between prediction and resolve; in
        // that case there is no snapshot and no training to do.
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

            for (i, weight) in entry.weights.iter_mut().enumerate() {
                if old_hist[i] == resolved {
                    weight.add(1);
                } else {
                    weight.sub(1);
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

        self.refine_history(resolved, final_pred);
    }

    fn promote_queued(&mut self) {
        if let Some(next) = self.queue.pop_front() {
            self.queue_lookup.remove(&next);
            self.entries.insert(next, Entry::new());
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
            self.entries.insert(pc, Entry::new());
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

impl Default for GlobalPerceptron {
    fn default() -> Self {
        Self::new()
    }
}
