//! TAGE-SC-L conditional branch predictor.
//!
//! A bimodal base plus 36 logical tagged tables with geometrically increasing
//! history lengths, physically folded into two bank-interleaved groups (ten
//! low-history banks and twenty high-history banks, with 2-way associativity
//! for the medium lengths). A statistical corrector sums bias and GEHL votes
//! over several history flavors and may override the TAGE prediction; a loop
//! predictor overrides both when confident.
//!
//! `predict` checkpoints the speculative history under the caller's sequence
//! id and advances the running history with the predicted direction; `update`
//! recovers the checkpoint, trains every table against the resolved
//! direction, and repairs the running history when the speculative push was
//! wrong. An update without a matching checkpoint is a host protocol bug and
//! panics.

pub mod corrector;
pub mod history;
pub mod loop_pred;

use std::collections::{HashMap, VecDeque};

use crate::common::counter::ctr_update;
use crate::stats::EngineStats;

use self::corrector::{Corrector, ScContext};
use self::history::SpeculativeHistory;
use self::loop_pred::LoopEval;

use super::{BranchKind, ConditionalPredictor};

pub(crate) use self::corrector::{NLOCAL, NSECLOCAL, NTLOCAL};

/// Number of logical tagged tables (twice the number of distinct history
/// lengths).
pub(crate) const NHIST: usize = 36;
/// Banks in the shared low-history group.
const NBANKLOW: usize = 10;
/// Banks in the shared high-history group.
const NBANKHIGH: usize = 20;
/// First logical table served by the high-history group.
const BORN: usize = 13;
/// 2-way associativity window for medium history lengths.
const BORN_INF_ASSOC: usize = 9;
const BORN_SUP_ASSOC: usize = 23;
const MIN_HIST: usize = 6;
const MAX_HIST: usize = 3000;
/// log2 of each physical bank.
const LOGG: u32 = 10;
/// Tag width for low-history tables; high-history tables add four bits.
const TAG_BITS_BASE: u32 = 8;
/// Extra entries allocated on a misprediction (1 + this).
const EXTRA_ALLOC: i32 = 1;
/// Bimodal hysteresis sharing (one hysteresis bit per 4 entries).
const HYST_SHIFT: u32 = 2;
/// log2 of the bimodal table.
const LOGB: u32 = 13;
pub(crate) const PHIST_WIDTH: u32 = 27;
const U_WIDTH: u32 = 1;
/// Width of the tagged-table prediction counters.
const CTR_WIDTH: u32 = 3;
const LOG_SIZE_USE_ALT: u32 = 4;
const ALT_WIDTH: u32 = 5;
const SIZE_USE_ALT: usize = 1 << LOG_SIZE_USE_ALT;
/// Saturation of the allocation-pressure tick counter.
const BORN_TICK: i32 = 1024;
pub(crate) const HIST_BUFFER_LENGTH: usize = 4096;
/// log2 of the loop predictor table.
pub(crate) const LOG_LOOP_TABLE: usize = 5;
/// Saturation of the innermost-loop iteration counter.
const IMLI_MAX: u64 = (1 << 8) - 1;

/// One tagged table entry.
#[derive(Clone, Copy, Debug, Default)]
struct TaggedEntry {
    ctr: i8,
    tag: u16,
    u: u8,
}

/// One bimodal entry (prediction bit plus shared hysteresis bit).
#[derive(Clone, Copy, Debug)]
struct BimodalEntry {
    pred: i8,
    hyst: i8,
}

/// Everything `predict` computes, recomputed at `update` from the
/// checkpointed history.
struct Evaluation {
    gi: [usize; NHIST + 1],
    gtag: [u16; NHIST + 1],
    bi: usize,
    bim: i32,
    hit_bank: usize,
    alt_bank: usize,
    longest_match_pred: bool,
    alttaken: bool,
    alt_conf: bool,
    tage_pred: bool,
    high_conf: bool,
    med_conf: bool,
    low_conf: bool,
    pred_inter: bool,
    loop_eval: LoopEval,
    lsum: i32,
    thres: i32,
    pred_taken: bool,
}

/// Public result of one TAGE-SC-L prediction.
#[derive(Clone, Copy, Debug)]
pub struct TagePrediction {
    /// Final predicted direction.
    pub taken: bool,
    /// TAGE + loop prediction before the statistical corrector.
    pub pred_inter: bool,
    /// High-confidence hitting counter.
    pub high_conf: bool,
    pub med_conf: bool,
    pub low_conf: bool,
    /// Corrector sum.
    pub lsum: i32,
    /// Corrector override threshold at prediction time.
    pub thres: i32,
    /// Whether any tagged table hit.
    pub hit: bool,
}

impl TagePrediction {
    /// The corrector is confident when its sum clears the threshold on a
    /// tagged hit.
    pub fn sc_confident(&self) -> bool {
        self.lsum.abs() > self.thres && self.hit
    }

    /// Prediction facts packed for the combining predictor: bit 0 the final
    /// direction, bit 1 the intermediate prediction, bits 2..4 the
    /// low/medium/high confidence flags, the rest the corrector sum.
    pub fn packed(&self) -> i32 {
        let mut bits = self.lsum;
        bits = (bits << 1) | self.high_conf as i32;
        bits = (bits << 1) | self.med_conf as i32;
        bits = (bits << 1) | self.low_conf as i32;
        bits = (bits << 1) | self.pred_inter as i32;
        (bits << 1) | self.taken as i32
    }
}

fn myrandom_step(seed: &mut u64, phist: u64, ghist_ptr: u64) -> u64 {
    *seed = seed.wrapping_add(1);
    *seed ^= phist;
    *seed = (*seed >> 21).wrapping_add(*seed << 11);
    *seed ^= ghist_ptr;
    *seed = (*seed >> 10).wrapping_add(*seed << 22);
    *seed & 0xFFFF_FFFF
}

/// The TAGE-SC-L engine.
pub struct TageScl {
    m: [usize; NHIST + 1],
    tb: [u32; NHIST + 1],
    logg: [u32; NHIST + 1],
    noskip: [bool; NHIST + 1],

    glow: Vec<TaggedEntry>,
    ghigh: Vec<TaggedEntry>,
    btable: Vec<BimodalEntry>,
    use_alt_on_na: [i8; SIZE_USE_ALT],
    sc: Corrector,

    tick: i32,
    seed: u64,

    active: SpeculativeHistory,
    checkpoints: HashMap<u64, SpeculativeHistory>,
    max_in_flight: usize,
}

impl TageScl {
    pub fn new(max_in_flight: usize) -> Self {
        let mut m = [0usize; NHIST + 1];
        m[1] = MIN_HIST;
        m[NHIST / 2] = MAX_HIST;
        for i in 2..=NHIST / 2 {
            let exp = (i - 1) as f64 / (NHIST / 2 - 1) as f64;
            m[i] = (MIN_HIST as f64 * (MAX_HIST as f64 / MIN_HIST as f64).powf(exp) + 0.5) as usize;
        }
        for i in (2..=NHIST).rev() {
            m[i] = m[(i + 1) / 2];
        }

        let mut noskip = [false; NHIST + 1];
        for (i, slot) in noskip.iter_mut().enumerate().skip(1) {
            *slot = ((i - 1) & 1 != 0) || (BORN_INF_ASSOC..BORN_SUP_ASSOC).contains(&i);
        }
        // A few extra tables are dropped outright.
        noskip[4] = false;
        noskip[8] = false;
        noskip[NHIST - 2] = false;
        noskip[NHIST - 6] = false;

        let mut tb = [0u32; NHIST + 1];
        let mut logg = [0u32; NHIST + 1];
        for i in 1..=NHIST {
            tb[i] = TAG_BITS_BASE + 4 * (i >= BORN) as u32;
            logg[i] = LOGG;
        }

        Self {
            active: SpeculativeHistory::new(&m, &tb, &logg),
            m,
            tb,
            logg,
            noskip,
            glow: vec![TaggedEntry::default(); NBANKLOW << LOGG],
            ghigh: vec![TaggedEntry::default(); NBANKHIGH << LOGG],
            btable: vec![BimodalEntry { pred: 0, hyst: 1 }; 1 << LOGB],
            use_alt_on_na: [0; SIZE_USE_ALT],
            sc: Corrector::new(),
            tick: 0,
            seed: 0,
            checkpoints: HashMap::new(),
            max_in_flight,
        }
    }

    fn gentry(&self, bank: usize, idx: usize) -> &TaggedEntry {
        if bank >= BORN {
            &self.ghigh[idx]
        } else {
            &self.glow[idx]
        }
    }

    fn gentry_mut(&mut self, bank: usize, idx: usize) -> &mut TaggedEntry {
        if bank >= BORN {
            &mut self.ghigh[idx]
        } else {
            &mut self.glow[idx]
        }
    }

    fn bindex(pc: u64) -> usize {
        ((pc ^ (pc >> 2)) & ((1 << LOGB) - 1)) as usize
    }

    fn ind_use_alt(hit_bank: usize, alt_conf: bool) -> usize {
        (((hit_bank - 1) / 8) * 2 + alt_conf as usize) % (SIZE_USE_ALT - 1)
    }

    /// Path-history mixing for the tagged-table index.
    fn f_mix(&self, a: u64, size: u32, bank: usize) -> u64 {
        let logg = self.logg[bank] as usize;
        let a = a & ((1u64 << size) - 1);
        let a1 = a & ((1 << logg) - 1);
        let mut a2 = a >> logg;
        if bank < logg {
            a2 = ((a2 << bank) & ((1 << logg) - 1)) + (a2 >> (logg - bank));
        }
        let mut a = a1 ^ a2;
        if bank < logg {
            a = ((a << bank) & ((1 << logg) - 1)) + (a >> (logg - bank));
        }
        a
    }

    fn gindex(&self, pc: u64, bank: usize, hist: &SpeculativeHistory) -> usize {
        let m = self.m[bank].min(PHIST_WIDTH as usize);
        let shift = (self.logg[bank] as i64 - bank as i64).unsigned_abs() as u32 + 1;
        let index =
            pc ^ (pc >> shift) ^ hist.ch_i[bank].value() ^ self.f_mix(hist.phist, m as u32, bank);
        (index & ((1 << self.logg[bank]) - 1)) as usize
    }

    fn gtag_of(&self, pc: u64, bank: usize, hist: &SpeculativeHistory) -> u16 {
        let tag = pc ^ hist.ch_t0[bank].value() ^ (hist.ch_t1[bank].value() << 1);
        (tag & ((1 << self.tb[bank]) - 1)) as u16
    }

    fn base_update(&mut self, bi: usize, bim: i32, taken: bool) {
        let mut inter = bim;
        if taken {
            if inter < 3 {
                inter += 1;
            }
        } else if inter > 0 {
            inter -= 1;
        }
        self.btable[bi].pred = (inter >> 1) as i8;
        self.btable[bi >> HYST_SHIFT].hyst = (inter & 1) as i8;
    }

    fn myrandom(&mut self) -> u64 {
        myrandom_step(&mut self.seed, self.active.phist, self.active.ghist.ptr() as u64)
    }

    fn sc_context(eval: &Evaluation, pc: u64) -> ScContext {
        ScContext {
            pc,
            pred_inter: eval.pred_inter,
            high_conf: eval.high_conf,
            med_conf: eval.med_conf,
            low_conf: eval.low_conf,
            longest_match_pred: eval.longest_match_pred,
            alttaken: eval.alttaken,
            hit_bank: eval.hit_bank,
            alt_bank: eval.alt_bank,
        }
    }

    /// Computes the full prediction-time state from `hist`; identical at
    /// fetch and at resolve because indices are derived from the snapshot.
    fn evaluate(&self, pc: u64, hist: &SpeculativeHistory) -> Evaluation {
        let mut gi = [0usize; NHIST + 1];
        let mut gtag = [0u16; NHIST + 1];
        let mut i = 1;
        while i <= NHIST {
            gi[i] = self.gindex(pc, i, hist);
            gtag[i] = self.gtag_of(pc, i, hist);
            // Even tables reuse the odd table's tag and a tag-skewed index.
            gtag[i + 1] = gtag[i];
            gi[i + 1] = gi[i] ^ ((gtag[i] as usize) & ((1usize << LOGG) - 1));
            i += 2;
        }

        let mut t =
            ((pc ^ (hist.phist & ((1u64 << self.m[BORN]) - 1))) % NBANKHIGH as u64) as usize;
        for i in BORN..=NHIST {
            if self.noskip[i] {
                gi[i] += t << LOGG;
                t = (t + 1) % NBANKHIGH;
            }
        }
        let mut t = ((pc ^ (hist.phist & ((1u64 << self.m[1]) - 1))) % NBANKLOW as u64) as usize;
        for i in 1..BORN {
            if self.noskip[i] {
                gi[i] += t << LOGG;
                t = (t + 1) % NBANKLOW;
            }
        }

        let bi = Self::bindex(pc);
        let bim = ((self.btable[bi].pred as i32) << 1) + self.btable[bi >> HYST_SHIFT].hyst as i32;
        let base_pred = self.btable[bi].pred > 0;

        let mut high_conf = bim == 0 || bim == 3;
        let mut low_conf = !high_conf;
        let mut alt_conf = high_conf;
        let mut med_conf = false;

        let mut longest_match_pred = base_pred;
        let mut alttaken = base_pred;
        let mut tage_pred = base_pred;
        let mut hit_bank = 0;
        let mut alt_bank = 0;

        for i in (1..=NHIST).rev() {
            if self.noskip[i] && self.gentry(i, gi[i]).tag == gtag[i] {
                hit_bank = i;
                longest_match_pred = self.gentry(i, gi[i]).ctr >= 0;
                break;
            }
        }
        for i in (1..hit_bank).rev() {
            if self.noskip[i] && self.gentry(i, gi[i]).tag == gtag[i] {
                alt_bank = i;
                break;
            }
        }

        if hit_bank > 0 {
            if alt_bank > 0 {
                let actr = self.gentry(alt_bank, gi[alt_bank]).ctr as i32;
                alttaken = actr >= 0;
                alt_conf = (2 * actr + 1).abs() > 1;
            } else {
                alttaken = base_pred;
                alt_conf = bim == 0 || bim == 3;
            }

            let hctr = self.gentry(hit_bank, gi[hit_bank]).ctr as i32;
            // A weak hitting counter marks a pseudo-newly-allocated entry;
            // the per-class chooser decides whether the alternate prevails.
            let use_alt = self.use_alt_on_na[Self::ind_use_alt(hit_bank, alt_conf)] >= 0;
            tage_pred = if !use_alt || (2 * hctr + 1).abs() > 1 {
                longest_match_pred
            } else {
                alttaken
            };

            high_conf = (2 * hctr + 1).abs() >= (1 << CTR_WIDTH) - 1;
            low_conf = (2 * hctr + 1).abs() == 1;
            med_conf = (2 * hctr + 1).abs() == 5;
        }

        let loop_eval = loop_pred::evaluate(&hist.ltable, pc);
        let mut pred_taken = tage_pred;
        if hist.with_loop >= 0 && loop_eval.lvalid {
            pred_taken = loop_eval.predloop;
        }
        let pred_inter = pred_taken;

        let mut eval = Evaluation {
            gi,
            gtag,
            bi,
            bim,
            hit_bank,
            alt_bank,
            longest_match_pred,
            alttaken,
            alt_conf,
            tage_pred,
            high_conf,
            med_conf,
            low_conf,
            pred_inter,
            loop_eval,
            lsum: 0,
            thres: 0,
            pred_taken,
        };

        let ctx = Self::sc_context(&eval, pc);
        let (lsum, thres) = self.sc.evaluate(&ctx, hist);
        eval.lsum = lsum;
        eval.thres = thres;
        eval.pred_taken = self.sc.decide(&ctx, lsum, thres);
        eval
    }

    /// Predicts the branch at `pc`, checkpointing the speculative history
    /// under `seq` and advancing it with the predicted direction. The target
    /// is unknown here, so the fall-through is assumed; `update` repairs the
    /// history if that assumption mattered.
    pub fn predict(&mut self, seq: u64, pc: u64) -> TagePrediction {
        assert!(
            self.checkpoints.len() < self.max_in_flight,
            "prediction checkpoint capacity exceeded ({} in flight)",
            self.checkpoints.len()
        );
        let previous = self.checkpoints.insert(seq, self.active.clone());
        assert!(previous.is_none(), "duplicate prediction for sequence id {seq}");

        let eval = self.evaluate(pc, &self.active);
        let prediction = TagePrediction {
            taken: eval.pred_taken,
            pred_inter: eval.pred_inter,
            high_conf: eval.high_conf,
            med_conf: eval.med_conf,
            low_conf: eval.low_conf,
            lsum: eval.lsum,
            thres: eval.thres,
            hit: eval.hit_bank > 0,
        };

        self.advance_history(
            pc,
            BranchKind::Conditional,
            eval.pred_taken,
            pc.wrapping_add(4),
            Some((&eval.loop_eval, eval.tage_pred, eval.pred_taken)),
        );
        prediction
    }

    /// Resolves the branch predicted under `seq`. Trains every component
    /// against `resolved` using the checkpointed history, then repairs the
    /// running history when the speculative push was wrong. `train` is false
    /// when an auxiliary predictor has claimed this branch.
    pub fn update(&mut self, seq: u64, pc: u64, resolved: bool, next_pc: u64, train: bool) {
        let checkpoint = self.checkpoints.remove(&seq).unwrap_or_else(|| {
            panic!("branch update without matching prediction (sequence id {seq})")
        });
        let eval = self.evaluate(pc, &checkpoint);

        let mispredicted = eval.pred_taken != resolved;
        let replay = mispredicted || (resolved && next_pc < pc);
        if replay {
            // Younger speculative pushes are squashed along with the wrong
            // bit; the corrected outcome is replayed below.
            self.active = checkpoint.clone();
        }

        if mispredicted {
            if eval.loop_eval.lvalid && eval.pred_taken != eval.loop_eval.predloop {
                ctr_update(
                    &mut self.active.with_loop,
                    eval.loop_eval.predloop == resolved,
                    7,
                );
            }
            let phist = self.active.phist;
            let gptr = self.active.ghist.ptr() as u64;
            let mut seed = self.seed;
            loop_pred::train(
                &mut self.active.ltable,
                &eval.loop_eval,
                resolved,
                true,
                eval.tage_pred,
                &mut || myrandom_step(&mut seed, phist, gptr),
            );
            self.seed = seed;
        }

        if train {
            let ctx = Self::sc_context(&eval, pc);
            self.sc.train(&ctx, &checkpoint, eval.lsum, eval.thres, resolved);
            self.train_tage(resolved, &eval);
        }

        if replay {
            let loop_ctx = if mispredicted {
                None
            } else {
                Some((&eval.loop_eval, eval.tage_pred, eval.pred_taken))
            };
            self.advance_history(pc, BranchKind::Conditional, resolved, next_pc, loop_ctx);
        }
    }

    /// Advances global state for a resolved non-conditional branch.
    pub fn track_other(&mut self, pc: u64, kind: BranchKind, _pred: bool, resolved: bool, next_pc: u64) {
        self.advance_history(pc, kind, resolved, next_pc, None);
    }

    /// Number of in-flight checkpoints, for protocol tests.
    pub fn in_flight(&self) -> usize {
        self.checkpoints.len()
    }

    fn train_tage(&mut self, resolved: bool, eval: &Evaluation) {
        let mut alloc = (eval.tage_pred != resolved) && (eval.hit_bank < NHIST);

        if eval.hit_bank > 0 {
            let hctr = self.gentry(eval.hit_bank, eval.gi[eval.hit_bank]).ctr as i32;
            let pseudo_new_alloc = (2 * hctr + 1).abs() <= 1;
            if pseudo_new_alloc {
                if eval.longest_match_pred == resolved {
                    alloc = false;
                }
                if eval.longest_match_pred != eval.alttaken {
                    let idx = Self::ind_use_alt(eval.hit_bank, eval.alt_conf);
                    ctr_update(
                        &mut self.use_alt_on_na[idx],
                        eval.alttaken == resolved,
                        ALT_WIDTH,
                    );
                }
            }
        }

        if eval.pred_taken == resolved && (self.myrandom() & 31) != 0 {
            alloc = false;
        }

        if alloc {
            self.allocate(resolved, eval);
        }

        if eval.hit_bank > 0 {
            let gi_hit = eval.gi[eval.hit_bank];
            let hctr = self.gentry(eval.hit_bank, gi_hit).ctr as i32;
            if (2 * hctr + 1).abs() == 1 && eval.longest_match_pred != resolved {
                // The weak provider is likely new; also train whatever it
                // displaced from the prediction.
                if eval.alt_bank > 0 {
                    let gi_alt = eval.gi[eval.alt_bank];
                    let entry = self.gentry_mut(eval.alt_bank, gi_alt);
                    ctr_update(&mut entry.ctr, resolved, CTR_WIDTH);
                } else {
                    self.base_update(eval.bi, eval.bim, resolved);
                }
            }

            let entry = self.gentry_mut(eval.hit_bank, gi_hit);
            ctr_update(&mut entry.ctr, resolved, CTR_WIDTH);
            // Sign change: it cannot have been useful.
            if (2 * entry.ctr as i32 + 1).abs() == 1 {
                entry.u = 0;
            }

            if eval.alttaken == resolved && eval.alt_bank > 0 {
                let actr = self.gentry(eval.alt_bank, eval.gi[eval.alt_bank]).ctr as i32;
                if (2 * actr + 1).abs() == 7
                    && self.gentry(eval.hit_bank, gi_hit).u == 1
                    && eval.longest_match_pred == resolved
                {
                    self.gentry_mut(eval.hit_bank, gi_hit).u = 0;
                }
            }
        } else {
            self.base_update(eval.bi, eval.bim, resolved);
        }

        if eval.longest_match_pred != eval.alttaken && eval.longest_match_pred == resolved {
            let entry = self.gentry_mut(eval.hit_bank, eval.gi[eval.hit_bank]);
            if (entry.u as u32) < (1 << U_WIDTH) - 1 {
                entry.u += 1;
            }
        }
    }

    /// Tries to allocate entries in one or two tables above the provider,
    /// reusing slots whose useful bit is clear and whose counter is weak.
    fn allocate(&mut self, resolved: bool, eval: &Evaluation) {
        let mut budget = EXTRA_ALLOC;
        let mut spread = 1i64;
        if (self.myrandom() & 127) < 32 {
            spread = 2;
        }
        let mut penalty = 0i32;
        let mut allocated = 0i32;
        let dep =
            (((eval.hit_bank as i64 - 1 + 2 * spread) & 0xffe) ^ (self.myrandom() & 1) as i64)
                as usize;

        let mut i_outer = dep;
        'outer: while i_outer < NHIST {
            let mut done = false;

            for attempt in 0..2 {
                let i = if attempt == 0 { i_outer + 1 } else { (i_outer ^ 1) + 1 };
                if attempt == 1 && done {
                    break;
                }
                if !self.noskip[i] {
                    continue;
                }
                let idx = eval.gi[i];
                if self.gentry(i, idx).u == 0 {
                    if (2 * self.gentry(i, idx).ctr as i32 + 1).abs() <= 3 {
                        let tag = eval.gtag[i];
                        let entry = self.gentry_mut(i, idx);
                        entry.tag = tag;
                        entry.ctr = if resolved { 0 } else { -1 };
                        allocated += 1;
                        if budget <= 0 {
                            break 'outer;
                        }
                        i_outer += 2;
                        budget -= 1;
                        done = true;
                    } else {
                        let entry = self.gentry_mut(i, idx);
                        if entry.ctr > 0 {
                            entry.ctr -= 1;
                        } else {
                            entry.ctr += 1;
                        }
                    }
                } else {
                    penalty += 1;
                }
            }

            i_outer += 2;
        }

        self.tick += penalty - 2 * allocated;
        if self.tick < 0 {
            self.tick = 0;
        }
        // When allocation pressure saturates, gracefully forget usefulness.
        if self.tick >= BORN_TICK {
            for entry in self.glow.iter_mut() {
                entry.u >>= 1;
            }
            for entry in self.ghigh.iter_mut() {
                entry.u >>= 1;
            }
            self.tick = 0;
        }
    }

    /// Folds one resolved (or predicted) branch into every history flavor.
    fn advance_history(
        &mut self,
        pc: u64,
        kind: BranchKind,
        taken: bool,
        next_pc: u64,
        loop_ctx: Option<(&LoopEval, bool, bool)>,
    ) {
        if kind.is_conditional() {
            let im = (self.active.imli_count & 0xFF) as usize;
            self.active.imhist[im] = (self.active.imhist[im] << 1) + taken as u64;

            if let Some((loop_eval, tage_pred, pred_taken)) = loop_ctx {
                if loop_eval.lvalid && pred_taken != loop_eval.predloop {
                    ctr_update(&mut self.active.with_loop, loop_eval.predloop == pred_taken, 7);
                }
                let phist = self.active.phist;
                let gptr = self.active.ghist.ptr() as u64;
                let mut seed = self.seed;
                loop_pred::train(
                    &mut self.active.ltable,
                    loop_eval,
                    taken,
                    false,
                    tage_pred,
                    &mut || myrandom_step(&mut seed, phist, gptr),
                );
                self.seed = seed;
            }

            if next_pc < pc {
                // Backward branch: the innermost-loop iteration counter.
                if !taken {
                    self.active.imli_count = 0;
                } else if self.active.imli_count < IMLI_MAX {
                    self.active.imli_count += 1;
                }
            }

            self.active.ghist_u64 =
                (self.active.ghist_u64 << 1) + (taken && next_pc < pc) as u64;
            let li = corrector::local_index(pc);
            self.active.l_shist[li] = (self.active.l_shist[li] << 1) + taken as u64;
            let si = corrector::second_local_index(pc);
            self.active.s_slhist[si] =
                ((self.active.s_slhist[si] << 1) + taken as u64) ^ (pc & 15);
            let ti = corrector::third_local_index(pc);
            self.active.t_slhist[ti] = (self.active.t_slhist[ti] << 1) + taken as u64;
        }

        let maxt = if kind.is_conditional() {
            2
        } else if kind.is_indirect() {
            3
        } else {
            2
        };

        let mut t_bits = (pc ^ (pc >> 2)) ^ taken as u64;
        let mut path = pc ^ (pc >> 2) ^ (pc >> 4);

        for _ in 0..maxt {
            let dir = t_bits & 1 != 0;
            t_bits >>= 1;
            let path_bit = path & 127;
            path >>= 1;
            self.active.push_history_bit(dir, path_bit);
        }
    }
}

/// Module-interface wrapper: pairs each `predict` with the next conditional
/// resolve in order and tracks accuracy counters.
pub struct TageSclModule {
    core: TageScl,
    next_seq: u64,
    in_flight: VecDeque<(u64, u64, bool)>,
    predictions: u64,
    mispredictions: u64,
}

impl TageSclModule {
    pub fn new(max_in_flight: usize) -> Self {
        Self {
            core: TageScl::new(max_in_flight),
            next_seq: 0,
            in_flight: VecDeque::new(),
            predictions: 0,
            mispredictions: 0,
        }
    }
}

impl ConditionalPredictor for TageSclModule {
    fn predict(&mut self, ip: u64) -> bool {
        self.next_seq += 1;
        let prediction = self.core.predict(self.next_seq, ip);
        self.in_flight.push_back((ip, self.next_seq, prediction.taken));
        self.predictions += 1;
        prediction.taken
    }

    fn last_branch_result(&mut self, ip: u64, target: u64, taken: bool, kind: BranchKind) {
        if kind.is_conditional() {
            let (pred_ip, seq, predicted) = self
                .in_flight
                .pop_front()
                .expect("conditional branch resolved without a prediction");
            assert_eq!(pred_ip, ip, "conditional branches must resolve in prediction order");
            if predicted != taken {
                self.mispredictions += 1;
            }
            self.core.update(seq, ip, taken, target, true);
        } else {
            self.core.track_other(ip, kind, taken, taken, target);
        }
    }

    fn collect(&self, stats: &mut EngineStats) {
        stats.predictions += self.predictions;
        stats.mispredictions += self.mispredictions;
        stats.chosen_tage += self.predictions;
    }
}
