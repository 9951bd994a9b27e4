//! Hashed multiperspective perceptron.
//!
//! Every feature hashes its history flavor, folds in the PC, and indexes one
//! weight table; the prediction thresholds the transfer-boosted sum of all
//! weights. Training is O-GEHL style with an adaptive theta. Tables may be
//! trained speculatively with the combined prediction; a wrong speculative
//! update is rolled back and redone by [`MppCore::retrain`] when the branch
//! resolves.
//!
//! The weight tables are sized at construction to fill whatever share of the
//! hardware budget the histories leave over, split into power-of-two tables.

use crate::common::hash::combine;
use crate::units::bru::BranchKind;

use super::features::{FeatureKind, FeatureSpec, MPP_TRANSFER, XOR_HASH1, XOR_HASH2, XOR_HASH3};
use super::histories::{
    fold_hist, shift_hist, MppHistories, MAX_ACYCLIC, MAX_BLURRY, MAX_BLURRY2, MAX_PATH_HIST,
};

const MIN_THETA: i32 = 10;
const MAX_THETA: i32 = 216;
const INITIAL_THETA: i32 = 11;
/// Learning rate applied to the output before threshold comparison.
const ALPHA: f64 = 0.3;
/// PC bit hashed with the global history.
const PC_BIT: u32 = 3;
/// PC bit hashed into the recorded outcome.
const HT_BIT: u32 = 2;
/// Width of one global-history fold chunk.
const BLOCK_SIZE: usize = 30;
/// Whether outcomes are hashed with a PC bit before recording.
const HASH_TAKEN: bool = true;
/// Which histories still record filtered (trivial) branches.
const RECORD_MASK: u32 = 191;
/// Which non-conditional branch classes shift PC/target bits into history.
const XFLAG: u32 = 208;
/// Bits shifted per non-conditional branch.
const XN: u32 = 3;

const RECORD_FILTERED_IMLI: u32 = 1;
const RECORD_FILTERED_GHIST: u32 = 2;
const RECORD_FILTERED_PATH: u32 = 4;
const RECORD_FILTERED_ACYCLIC: u32 = 8;
const RECORD_FILTERED_MOD: u32 = 16;
const RECORD_FILTERED_BLURRY: u32 = 32;
const RECORD_FILTERED_LOCAL: u32 = 64;
const RECORD_FILTERED_RECENCY: u32 = 128;

const X_JMP_PC: u32 = 1;
const X_JMP_TARGET: u32 = 2;
const X_RET_PC: u32 = 4;
const X_RET_TARGET: u32 = 8;
const X_IND_PC: u32 = 16;
const X_IND_TARGET: u32 = 32;
const X_CALL_PC: u32 = 64;
const X_CALL_TARGET: u32 = 128;

/// Uninitialized-weight sentinel; reads as zero correlation.
const WEIGHT_UNINIT: i8 = -32;

/// Speculative per-branch state carried from lookup to resolve.
#[derive(Clone, Debug)]
pub struct MppUpdate {
    pub pc: u64,
    pub pc2: u16,
    pub hpc: u16,
    /// The perceptron output.
    pub yout: i32,
    /// Table indices used by this prediction.
    pub indices: Vec<usize>,
    /// Whether this prediction speculatively trained the tables.
    pub updated: bool,
    /// The overall (combined) prediction used for speculative training.
    pub overall_prediction: bool,
    /// This perceptron's own prediction.
    pub prediction: bool,
}

impl MppUpdate {
    fn new(num_tables: usize) -> Self {
        Self {
            pc: 0,
            pc2: 0,
            hpc: 0,
            yout: 0,
            indices: vec![0; num_tables],
            updated: false,
            overall_prediction: false,
            prediction: false,
        }
    }
}

/// What the feature analysis derived from the specification.
struct Analysis {
    ghist_length: usize,
    path_length: usize,
    assoc: usize,
    nlocal_histories: usize,
    local_history_length: usize,
    modhist_indices: Vec<usize>,
    modhist_lengths: Vec<usize>,
    modpath_indices: Vec<usize>,
    modpath_lengths: Vec<usize>,
    history_bits: usize,
}

/// Analyzes a feature specification: maximum history lengths, which moduli
/// are live, and the total number of history bits charged to the budget.
fn analyze(specs: &[FeatureSpec]) -> Analysis {
    let mut ghist_length = 1usize;
    let mut modghist_length = 1usize;
    let mut path_length = 1usize;
    let mut assoc = 0usize;
    let mut local_history_length = 0usize;
    let mut doing_local = false;
    let mut doing_recency = false;

    let mut modhist_indices: Vec<usize> = Vec::new();
    let mut modhist_lengths: Vec<usize> = Vec::new();
    let mut modpath_indices: Vec<usize> = Vec::new();
    let mut modpath_lengths: Vec<usize> = Vec::new();

    let mut imli_counter_bits = [0usize; 4];
    let mut blurrypath_bits = [[0usize; MAX_BLURRY2]; MAX_BLURRY];
    let mut acyclic_bits = [[[false; 2]; 32]; MAX_ACYCLIC];

    let insert = |v: &mut Vec<usize>, lens: &mut Vec<usize>, x: usize| -> usize {
        if let Some(i) = v.iter().position(|&e| e == x) {
            return i;
        }
        v.push(x);
        lens.push(0);
        v.len() - 1
    };

    for s in specs {
        match s.kind {
            FeatureKind::Recency | FeatureKind::RecencyPos => {
                assoc = assoc.max(s.p1 as usize);
                doing_recency = true;
            }
            FeatureKind::Acyclic => {
                for j in 0..(s.p1 as usize + 2) {
                    acyclic_bits[s.p1 as usize][j][(s.p3 == 0) as usize] = true;
                }
            }
            FeatureKind::Local => {
                doing_local = true;
                local_history_length = local_history_length.max(s.p2 as usize);
            }
            FeatureKind::Imli => {
                imli_counter_bits[s.p1 as usize - 1] = 32;
            }
            FeatureKind::BlurryPath => {
                for j in 0..(s.p2 as usize) {
                    blurrypath_bits[s.p1 as usize][j] = 32 - s.p1 as usize;
                }
            }
            FeatureKind::GhistPath | FeatureKind::BackGhistPath => {
                if ghist_length < s.p2 as usize {
                    ghist_length = s.p2 as usize + 1;
                }
            }
            _ => {}
        }
        if matches!(s.kind, FeatureKind::ModHist | FeatureKind::GhistModPath) {
            let j = insert(&mut modhist_indices, &mut modhist_lengths, s.p1 as usize);
            modhist_lengths[j] = modhist_lengths[j].max(s.p2 as usize + 1);
            modghist_length = modghist_length.max(s.p2 as usize + 1);
        }
        if matches!(s.kind, FeatureKind::ModPath | FeatureKind::GhistModPath) {
            let j = insert(&mut modpath_indices, &mut modpath_lengths, s.p1 as usize);
            modpath_lengths[j] = modpath_lengths[j].max(s.p2 as usize + 1);
            path_length = path_length.max(s.p2 as usize + 1);
        }
    }

    // Local histories get roughly 6 KB between them, capped at 1280.
    let nlocal_histories = if local_history_length > 0 {
        (49152 / local_history_length).min(1280)
    } else {
        0
    };

    let mut bits = 32usize; // one live IMLI counter
    bits += path_length * 16;
    bits += modhist_lengths.iter().sum::<usize>();
    bits += modpath_lengths.iter().map(|l| 16 * l).sum::<usize>();
    if doing_local {
        bits += local_history_length * nlocal_histories;
    }
    if doing_recency {
        bits += assoc * 16;
    }
    for row in &blurrypath_bits {
        bits += row.iter().sum::<usize>();
    }
    for arr in &acyclic_bits {
        for pair in arr {
            bits += pair[0] as usize + pair[1] as usize;
        }
    }
    bits += 8; // theta

    let _ = modghist_length;
    let _ = imli_counter_bits;

    Analysis {
        ghist_length,
        path_length,
        assoc,
        nlocal_histories,
        local_history_length,
        modhist_indices,
        modhist_lengths,
        modpath_indices,
        modpath_lengths,
        history_bits: bits,
    }
}

/// Splits `total_entries` across `num_tables` power-of-two tables, wasting
/// as few entries as possible.
fn fit_table_sizes(num_tables: usize, total_entries: usize) -> Vec<usize> {
    let mut best: Option<Vec<usize>> = None;
    let mut min_diff = usize::MAX;

    for i in 6..20 {
        let ts1 = 1usize << i;
        let ts2 = 1usize << (i + 1);
        for t in 0..num_tables {
            let sum = t * ts1 + (num_tables - t) * ts2;
            if sum <= total_entries && total_entries - sum < min_diff {
                min_diff = total_entries - sum;
                let mut sizes = vec![ts1; t];
                sizes.extend(std::iter::repeat(ts2).take(num_tables - t));
                best = Some(sizes);
            }
        }
    }

    best.expect("no feasible weight-table split for the hardware budget")
}

fn transfer(c: i8) -> i32 {
    if c == WEIGHT_UNINIT {
        return 0;
    }
    debug_assert!(c > -32 && c < 32);
    MPP_TRANSFER[(c as i32 + 31) as usize]
}

/// Saturating step; an uninitialized weight behaves as zero.
fn sat_inc_dec(c: i8, taken: bool) -> i8 {
    if c == WEIGHT_UNINIT {
        return if taken { 1 } else { -1 };
    }
    if taken {
        if c < 31 {
            c + 1
        } else {
            c
        }
    } else if c > -31 {
        c - 1
    } else {
        c
    }
}

/// The hashed-perceptron core.
pub struct MppCore {
    specs: &'static [FeatureSpec],
    table_sizes: Vec<usize>,
    tables: Vec<Vec<i8>>,

    theta: i32,

    ghist_length: usize,
    path_length: usize,
    nlocal_histories: usize,
    local_history_length: usize,
    modhist_indices: Vec<usize>,
    modhist_lengths: Vec<usize>,
    modpath_indices: Vec<usize>,
    modpath_lengths: Vec<usize>,
    history_bits: usize,

    pub hist: MppHistories,
    /// Working record for the branch currently being predicted or trained.
    pub u: MppUpdate,
}

impl MppCore {
    /// Total history bits a feature set needs, for the budget computation.
    pub fn history_bits_of(specs: &[FeatureSpec]) -> usize {
        analyze(specs).history_bits
    }

    /// Builds the core with `total_entries` 6-bit weights to distribute.
    pub fn new(specs: &'static [FeatureSpec], total_entries: usize) -> Self {
        let analysis = analyze(specs);
        let table_sizes = fit_table_sizes(specs.len(), total_entries);
        let tables = table_sizes.iter().map(|&s| vec![WEIGHT_UNINIT; s]).collect();

        Self {
            specs,
            table_sizes,
            tables,
            theta: INITIAL_THETA.max(MIN_THETA),
            ghist_length: analysis.ghist_length,
            path_length: analysis.path_length,
            nlocal_histories: analysis.nlocal_histories,
            local_history_length: analysis.local_history_length,
            modhist_indices: analysis.modhist_indices,
            modhist_lengths: analysis.modhist_lengths,
            modpath_indices: analysis.modpath_indices,
            modpath_lengths: analysis.modpath_lengths,
            history_bits: analysis.history_bits,
            hist: MppHistories::new(analysis.nlocal_histories, analysis.assoc),
            u: MppUpdate::new(specs.len()),
        }
    }

    pub fn history_bits(&self) -> usize {
        self.history_bits
    }

    fn hash_local(&self) -> usize {
        (combine(self.u.pc, 31) % self.nlocal_histories as u64) as usize
    }

    fn hash_path(&self, depth: i32, shift: i32) -> u64 {
        let mut x = 0u64;
        for i in 0..depth as usize {
            x <<= shift.max(0) as u32;
            x = x.wrapping_add(self.hist.path_history[i] as u64);
        }
        x
    }

    fn hash_backpath(&self, depth: i32, shift: i32) -> u64 {
        let shift = if shift == -1 { 3 } else { shift };
        let mut x = 0u64;
        for i in 0..depth as usize {
            x <<= shift as u32;
            x = x.wrapping_add(self.hist.back_path[i] as u64);
        }
        x
    }

    fn hash_recency(&self, depth: i32, shift: i32) -> u64 {
        let mut x = 0u64;
        for i in 0..depth as usize {
            x <<= shift.max(0) as u32;
            x = x.wrapping_add(self.hist.recency_stack[i] as u64);
        }
        x
    }

    fn hash_blurry(&self, scale: i32, depth: i32, shiftdelta: i32) -> u64 {
        let shiftdelta = if shiftdelta == -1 { 0 } else { shiftdelta };
        let sdint = shiftdelta >> 2;
        let sdfrac = shiftdelta & 3;
        let mut x = 0u64;
        let mut shift = 0u32;
        let mut count = 0;
        for i in 0..depth as usize {
            x = x.wrapping_add((self.hist.blurrypath_histories[scale as usize][i] >> shift) as u64);
            count += 1;
            if count == sdfrac {
                shift += sdint as u32;
                count = 0;
            }
        }
        x
    }

    fn hash_acyclic(&self, a: i32, bits: usize) -> u64 {
        let mut x = 0u64;
        let mut k = 0usize;
        for i in 0..(a as usize + 2) {
            x ^= (self.hist.acyclic_histories[a as usize][i] as u64) << k;
            k = (k + 1) % bits;
        }
        x
    }

    fn hash_modhist(&self, a: i32, b: i32, n: usize) -> u64 {
        let mut x = 0u64;
        let mut k = 0usize;
        for i in 0..b as usize {
            x ^= (self.hist.mod_histories[a as usize][i] as u64) << k;
            k = (k + 1) % n;
        }
        x
    }

    fn hash_modpath(&self, a: i32, depth: i32, shift: i32) -> u64 {
        let mut x = 0u64;
        for i in 0..depth as usize {
            x <<= shift.max(0) as u32;
            x = x.wrapping_add(self.hist.modpath_histories[a as usize][i] as u64);
        }
        x
    }

    fn hash_ghistmodpath(&self, a: i32, depth: i32, shift: i32) -> u64 {
        let mut x = 0u64;
        for i in 0..depth as usize {
            x <<= shift.max(0) as u32;
            let combined = ((self.hist.modpath_histories[a as usize][i] as u64) << 1)
                | self.hist.mod_histories[a as usize][i] as u64;
            x = x.wrapping_add(combined);
        }
        x
    }

    fn hash_ghist(&self, a: i32, b: i32, bits: usize) -> u64 {
        fold_hist(&self.hist.global_hist, a, b, bits)
    }

    fn hash_backghist(&self, a: i32, b: i32, bits: usize) -> u64 {
        fold_hist(&self.hist.backglobal_hist, a, b, bits)
    }

    fn hash_ghistpath(&self, a: i32, b: i32, c: i32, d: i32, bits: usize) -> u64 {
        self.hash_path(c, d).wrapping_add(self.hash_ghist(a, b, bits))
    }

    fn hash_backghistpath(&self, a: i32, b: i32, c: i32, d: i32, bits: usize) -> u64 {
        self.hash_backpath(c, d).wrapping_add(self.hash_backghist(a, b, bits))
    }

    fn hash_recencypos(&self, pc2: u16, depth: i32, table: usize) -> u64 {
        for i in 0..depth as usize {
            if self.hist.recency_stack[i] == pc2 {
                return (i * self.table_sizes[table] / depth as usize) as u64;
            }
        }
        self.table_sizes[table] as u64 - 1
    }

    fn feature_hash(&self, s: &FeatureSpec, table: usize, tage_pred: bool, tage_bits: i32) -> u64 {
        match s.kind {
            FeatureKind::BackGhistPath => {
                self.hash_backghistpath(s.p1, s.p2, s.p3, s.p4, BLOCK_SIZE)
            }
            FeatureKind::GhistPath => self.hash_ghistpath(s.p1, s.p2, s.p3, s.p4, BLOCK_SIZE),
            FeatureKind::Acyclic => self.hash_acyclic(s.p1, BLOCK_SIZE),
            FeatureKind::ModHist => self.hash_modhist(s.p1, s.p2, BLOCK_SIZE),
            FeatureKind::GhistModPath => self.hash_ghistmodpath(s.p1, s.p2, s.p3),
            FeatureKind::ModPath => self.hash_modpath(s.p1, s.p2, s.p3),
            FeatureKind::Bias => 0,
            FeatureKind::Recency => self.hash_recency(s.p1, s.p2),
            FeatureKind::Imli => self.hist.imli_counter[s.p1 as usize - 1] as u64,
            FeatureKind::Path => self.hash_path(s.p1, s.p2),
            FeatureKind::Tage => {
                let mut x = 0u64;
                if s.p1 >= 0 {
                    x = (tage_pred as u64) << s.p1;
                }
                if s.p2 >= 0 {
                    let low = tage_bits & 4 != 0;
                    let med = tage_bits & 8 != 0;
                    let high = tage_bits & 16 != 0;
                    let mut c = 0u64;
                    if low {
                        c = 1;
                    }
                    if med {
                        c = 2;
                    }
                    if high {
                        c = 3;
                    }
                    x ^= c << s.p2;
                }
                x
            }
            FeatureKind::BackPath => self.hash_backpath(s.p1, s.p2),
            FeatureKind::Local => {
                let row = &self.hist.local_histories[self.hash_local()];
                if s.p2 <= 63 {
                    let mut x = row[0] >> s.p1;
                    if s.p1 != -1 {
                        x &= (1u64 << (s.p2 - s.p1)) - 1;
                    }
                    x
                } else {
                    fold_hist(row, s.p1, s.p2, BLOCK_SIZE)
                }
            }
            FeatureKind::BlurryPath => self.hash_blurry(s.p1, s.p2, s.p3),
            FeatureKind::RecencyPos => self.hash_recencypos(self.u.pc2, s.p1, table),
        }
    }

    fn compute_output(&mut self, tage_pred: bool, tage_bits: i32) {
        self.u.yout = 0;

        let mut hashes = vec![0u64; self.specs.len()];
        for (i, s) in self.specs.iter().enumerate() {
            let mut h = self.feature_hash(s, i, tage_pred, tage_bits);
            h <<= 9;
            h ^= self.u.pc2 as u64;
            h = combine(h, 4);
            if s.xorflags & XOR_HASH1 != 0 {
                h = combine(h, 1);
            }
            if s.xorflags & XOR_HASH2 != 0 {
                h = combine(h, 2);
            }
            if s.xorflags & XOR_HASH3 != 0 {
                h = combine(h, 3);
            }
            hashes[i] = h;
        }

        for i in 0..self.specs.len() {
            let index = (hashes[i] % self.table_sizes[i] as u64) as usize;
            self.u.indices[i] = index;
            self.u.yout += transfer(self.tables[i][index]);
        }
    }

    /// Makes a prediction for the branch at `pc`, leaving the speculative
    /// record in [`u`](Self::u) for the caller to stash.
    pub fn lookup(&mut self, pc: u64, tage_pred: bool, tage_bits: i32) -> bool {
        self.u.pc = pc;
        self.u.pc2 = (pc >> 2) as u16;
        self.u.hpc = combine(pc, 10) as u16;
        self.compute_output(tage_pred, tage_bits);
        self.u.prediction = self.u.yout >= 0;
        self.u.prediction
    }

    fn theta_setting(&mut self, correct: bool, a: f64) {
        if !correct {
            self.theta += 1;
        } else if a < self.theta as f64 {
            self.theta -= 1;
        }
        self.theta = self.theta.clamp(MIN_THETA, MAX_THETA);
    }

    /// Trains toward `taken` when wrong or under-confident.
    fn train(&mut self, taken: bool) {
        let y = if taken { self.u.yout } else { -self.u.yout };
        let correct = y >= 0;
        let a = (ALPHA * self.u.yout as f64).abs();
        if correct && a > self.theta as f64 {
            return;
        }

        self.u.updated = true;
        self.theta_setting(correct, a);
        for i in 0..self.specs.len() {
            let w = &mut self.tables[i][self.u.indices[i]];
            *w = sat_inc_dec(*w, taken);
        }
    }

    /// Corrects a speculative update made with a wrong prediction: the same
    /// delta is applied twice, once to cancel the wrong training and once to
    /// train correctly. Theta gets the same double correction.
    fn retrain(&mut self, taken: bool) {
        if self.u.overall_prediction == taken {
            return;
        }

        for i in 0..self.specs.len() {
            let w = &mut self.tables[i][self.u.indices[i]];
            *w = sat_inc_dec(*w, taken);
            *w = sat_inc_dec(*w, taken);
        }

        let a = (ALPHA * self.u.yout as f64).abs();
        self.theta_setting(self.u.prediction == taken, a);
        self.theta_setting(self.u.prediction == taken, a);
    }

    /// Updates the histories with ground truth and, when allowed, the weight
    /// tables with the overall prediction.
    pub fn spec_update(
        &mut self,
        target: u64,
        taken: bool,
        pred: bool,
        filtered: bool,
        spec_enabled: bool,
    ) {
        self.u.updated = false;
        self.u.overall_prediction = pred;

        if !filtered && spec_enabled {
            self.train(pred);
        }

        let hashed_taken =
            if HASH_TAKEN { taken ^ (self.u.pc & (1 << HT_BIT) == 0) } else { taken };

        if !filtered || (RECORD_MASK & RECORD_FILTERED_IMLI != 0) {
            if target < self.u.pc {
                if taken {
                    self.hist.imli_counter[0] += 1;
                } else {
                    self.hist.imli_counter[0] = 0;
                }
                if !taken {
                    self.hist.imli_counter[1] += 1;
                } else {
                    self.hist.imli_counter[1] = 0;
                }
            } else {
                if taken {
                    self.hist.imli_counter[2] += 1;
                } else {
                    self.hist.imli_counter[2] = 0;
                }
                if !taken {
                    self.hist.imli_counter[3] += 1;
                } else {
                    self.hist.imli_counter[3] = 0;
                }
            }
        }

        if !filtered || (RECORD_MASK & RECORD_FILTERED_GHIST != 0) {
            if target < self.u.pc {
                let len = self.ghist_length;
                shift_hist(&mut self.hist.backglobal_hist, len, hashed_taken);
            }
            let len = self.ghist_length;
            shift_hist(&mut self.hist.global_hist, len, hashed_taken);
        }

        if !filtered || (RECORD_MASK & RECORD_FILTERED_PATH != 0) {
            let len = self.path_length;
            self.hist.path_history.copy_within(0..len - 1, 1);
            self.hist.path_history[0] = self.u.pc2;

            if target < self.u.pc {
                self.hist.back_path.copy_within(0..MAX_PATH_HIST - 1, 1);
                self.hist.back_path[0] = self.u.pc2;
            }
        }

        if !filtered || (RECORD_MASK & RECORD_FILTERED_ACYCLIC != 0) {
            for i in 0..MAX_ACYCLIC {
                let slot = self.u.hpc as usize % (i + 2);
                self.hist.acyclic_histories[i][slot] = hashed_taken;
            }
        }

        if !filtered || (RECORD_MASK & RECORD_FILTERED_MOD != 0) {
            for ii in 0..self.modpath_indices.len() {
                let i = self.modpath_indices[ii];
                if self.u.hpc as usize % (i + 2) == 0 {
                    let len = self.modpath_lengths[ii];
                    self.hist.modpath_histories[i].copy_within(0..len - 1, 1);
                    self.hist.modpath_histories[i][0] = self.u.pc2;
                }
            }
        }

        if !filtered || (RECORD_MASK & RECORD_FILTERED_BLURRY != 0) {
            for i in 0..MAX_BLURRY {
                let z = (self.u.pc >> i) as u32;
                if self.hist.blurrypath_histories[i][0] != z {
                    self.hist.blurrypath_histories[i].copy_within(0..MAX_BLURRY2 - 1, 1);
                    self.hist.blurrypath_histories[i][0] = z;
                }
            }
        }

        if !filtered || (RECORD_MASK & RECORD_FILTERED_MOD != 0) {
            for ii in 0..self.modhist_indices.len() {
                let i = self.modhist_indices[ii];
                if self.u.hpc as usize % (i + 2) == 0 {
                    let len = self.modhist_lengths[ii];
                    self.hist.mod_histories[i].copy_within(0..len - 1, 1);
                    self.hist.mod_histories[i][0] = hashed_taken;
                }
            }
        }

        if !filtered || (RECORD_MASK & RECORD_FILTERED_RECENCY != 0) {
            let pc2 = self.u.pc2;
            self.hist.insert_recency(pc2);
        }

        if self.nlocal_histories > 0 && (!filtered || (RECORD_MASK & RECORD_FILTERED_LOCAL != 0)) {
            let row = self.hash_local();
            let len = self.local_history_length;
            shift_hist(&mut self.hist.local_histories[row], len, taken);
        }
    }

    /// Final (non-speculative) training once the branch resolves. `record`
    /// is the speculative state stashed at lookup, with the `updated` flag
    /// as left by [`spec_update`](Self::spec_update).
    pub fn update(
        &mut self,
        record: &MppUpdate,
        taken: bool,
        filtered: bool,
        spec_enabled: bool,
    ) {
        self.u = record.clone();

        if self.u.updated {
            self.retrain(taken);
        } else if !filtered && (taken != self.u.overall_prediction || !spec_enabled) {
            // The branch just became non-trivial, or speculative update was
            // throttled off; train now.
            self.train(taken);
        }
    }

    /// Shifts PC/target bits of a non-conditional branch into the global
    /// history and path history.
    pub fn nonconditional_branch(&mut self, pc: u64, target: u64, kind: BranchKind) {
        let pc2 = (pc >> 2) as u16;

        if XFLAG == 0 {
            let len = self.ghist_length;
            let bit = pc & (1 << PC_BIT) == 0;
            shift_hist(&mut self.hist.global_hist, len, bit);
        }

        match kind {
            BranchKind::Return => self.do_shift(pc, target, X_RET_PC, X_RET_TARGET),
            BranchKind::DirectJump => self.do_shift(pc, target, X_JMP_PC, X_JMP_TARGET),
            BranchKind::DirectCall => self.do_shift(pc, target, X_CALL_PC, X_CALL_TARGET),
            BranchKind::IndirectCall | BranchKind::IndirectJump => {
                self.do_shift(pc, target, X_IND_PC, X_IND_TARGET)
            }
            BranchKind::Conditional => {}
        }

        let len = self.path_length;
        self.hist.path_history.copy_within(0..len - 1, 1);
        self.hist.path_history[0] = pc2;
    }

    /// Streams `XN` low bits of the PC and/or target into the history, as
    /// the class flags dictate.
    fn do_shift(&mut self, pc: u64, target: u64, pc_flag: u32, target_flag: u32) {
        let mut pc = pc >> PC_BIT;
        let mut target = target >> PC_BIT;
        let len = self.ghist_length;
        if XFLAG & pc_flag != 0 {
            for _ in 0..XN {
                shift_hist(&mut self.hist.global_hist, len, pc & 1 != 0);
                pc >>= 1;
            }
        }
        if XFLAG & target_flag != 0 {
            for _ in 0..XN {
                shift_hist(&mut self.hist.global_hist, len, target & 1 != 0);
                target >>= 1;
            }
        }
    }
}

