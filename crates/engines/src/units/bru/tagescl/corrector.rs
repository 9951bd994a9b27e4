//! Statistical corrector.
//!
//! Sums bias tables and several GEHL-style tables of 6-bit signed counters
//! driven by different history types (global, path, three local flavors, and
//! the inner-loop counters), each weight passed through an inverse-sigmoidal
//! transfer table. The sum may override the TAGE prediction when its
//! magnitude clears an adaptively trained threshold and the chooser counters
//! allow the flip.

use crate::common::counter::ctr_update;

use super::history::SpeculativeHistory;

/// SC counter width.
const PERC_WIDTH: u32 = 6;
/// log2 of each bias table.
const LOG_BIAS: u32 = 8;

const LOG_INB: u32 = 8;
const LOG_IMNB: u32 = 9;
const LOG_GNB: u32 = 10;
const LOG_PNB: u32 = 9;
const LOG_LNB: u32 = 10;
const LOG_SNB: u32 = 9;
const LOG_TNB: u32 = 10;

/// History lengths of the IMLI-counter table.
const IM: [u32; 1] = [8];
/// History lengths of the per-iteration-count tables.
const IMM: [u32; 2] = [10, 4];
/// History lengths of the global-history tables.
const GM: [u32; 3] = [40, 24, 10];
/// History lengths of the path-history tables.
const PM: [u32; 3] = [25, 16, 9];
/// History lengths of the first-local-history tables.
const LM: [u32; 3] = [11, 6, 3];
/// History lengths of the second-local-history tables.
const SM: [u32; 3] = [16, 11, 6];
/// History lengths of the third-local-history tables.
const TM: [u32; 2] = [9, 4];

const WIDTH_RES: u32 = 12;
const WIDTH_RES_P: u32 = 8;
const LOG_SIZE_UP: u32 = 6;
const LOG_SIZE_UPS: u32 = LOG_SIZE_UP / 2;
const EXTRA_WEIGHT_WIDTH: u32 = 6;
/// Width of the two chooser counters.
const CONF_WIDTH: u32 = 7;

pub const NLOCAL: usize = 1 << 8;
pub const NSECLOCAL: usize = 1 << 4;
pub const NTLOCAL: usize = 16;

/// Transfer table mapping a 6-bit SC weight to its vote magnitude.
#[rustfmt::skip]
static SC_TRANSFER: [i32; 63] = [
    -63, -50, -43, -38, -36, -34, -33, -31, -29, -28, -26, -25, -24, -22, -21,
    -20, -19, -17, -16, -14, -14, -12, -11, -10, -9, -8, -7, -6, -4, -3,
    -2, 1, 2, 3, 4, 6, 7, 8, 9, 10, 11, 12, 14, 14, 16,
    17, 19, 20, 21, 22, 24, 25, 26, 28, 29, 31, 33, 34, 36, 38,
    43, 50, 63,
];

fn transfer(c: i8) -> i32 {
    let c = if c <= -32 { -31 } else { c as i32 };
    SC_TRANSFER[(c + 31) as usize]
}

fn ind_upd(pc: u64) -> usize {
    ((pc ^ (pc >> 2)) & ((1 << LOG_SIZE_UP) - 1)) as usize
}

fn ind_upds(pc: u64) -> usize {
    ((pc ^ (pc >> 2)) & ((1 << LOG_SIZE_UPS) - 1)) as usize
}

pub fn local_index(pc: u64) -> usize {
    ((pc ^ (pc >> 2)) as usize) & (NLOCAL - 1)
}

pub fn second_local_index(pc: u64) -> usize {
    ((pc ^ (pc >> 5)) as usize) & (NSECLOCAL - 1)
}

pub fn third_local_index(pc: u64) -> usize {
    ((pc ^ (pc >> LOG_TNB)) as usize) & (NTLOCAL - 1)
}

/// TAGE-side facts the corrector's bias indices depend on.
#[derive(Clone, Copy, Debug)]
pub struct ScContext {
    pub pc: u64,
    pub pred_inter: bool,
    pub high_conf: bool,
    pub med_conf: bool,
    pub low_conf: bool,
    pub longest_match_pred: bool,
    pub alttaken: bool,
    pub hit_bank: usize,
    pub alt_bank: usize,
}

impl ScContext {
    fn bias_index(&self) -> usize {
        let pc = self.pc;
        let low_mismatch = (self.low_conf & (self.longest_match_pred != self.alttaken)) as u64;
        let raw = (((pc ^ (pc >> 2)) << 1) ^ low_mismatch) << 1;
        ((raw + self.pred_inter as u64) & ((1u64 << LOG_BIAS) - 1)) as usize
    }

    fn bias_sk_index(&self) -> usize {
        let pc = self.pc;
        let raw = (((pc ^ (pc >> (LOG_BIAS as u64 - 2))) << 1) ^ self.high_conf as u64) << 1;
        ((raw + self.pred_inter as u64) & ((1u64 << LOG_BIAS) - 1)) as usize
    }

    fn bias_bank_index(&self) -> usize {
        let pc = self.pc;
        let raw = (self.pred_inter as u64)
            .wrapping_add((((self.hit_bank + 1) / 4) << 4) as u64)
            .wrapping_add((self.high_conf as u64) << 1)
            .wrapping_add((self.low_conf as u64) << 2)
            .wrapping_add(((self.alt_bank != 0) as u64) << 3)
            .wrapping_add((pc ^ (pc >> 2)) << 7);
        (raw & ((1u64 << LOG_BIAS) - 1)) as usize
    }
}

/// GEHL index: a fixed mix of the PC and a truncated history value. The two
/// shortest-history tables of each group use only half their entries.
fn gehl_index(pc: u64, bhist: u64, i: usize, logs: u32, nbr: usize) -> usize {
    let idx = pc
        ^ bhist
        ^ (bhist >> (8 - i))
        ^ (bhist >> (16 - 2 * i))
        ^ (bhist >> (24 - 3 * i))
        ^ (bhist >> (32 - 3 * i))
        ^ (bhist >> (40 - 4 * i));
    let half = (i as i32 >= nbr as i32 - 2) as u32;
    (idx & ((1 << (logs - half)) - 1)) as usize
}

fn gehl_predict(pc: u64, hist: u64, lengths: &[u32], tables: &[Vec<i8>], logs: u32, w: i8) -> i32 {
    let mut sum = 0;
    for (i, table) in tables.iter().enumerate() {
        let bhist = hist & ((1u64 << lengths[i]) - 1);
        let index = gehl_index(pc, bhist, i, logs, tables.len());
        sum += transfer(table[index]);
    }
    (1 + (w >= 0) as i32) * sum
}

#[allow(clippy::too_many_arguments)]
fn gehl_update(
    pc: u64,
    hist: u64,
    lengths: &[u32],
    tables: &mut [Vec<i8>],
    logs: u32,
    w: &mut i8,
    taken: bool,
    lsum: i32,
) {
    let nbr = tables.len();
    let mut percsum = 0;
    for (i, table) in tables.iter_mut().enumerate() {
        let bhist = hist & ((1u64 << lengths[i]) - 1);
        let index = gehl_index(pc, bhist, i, logs, nbr);
        percsum += 2 * table[index] as i32 + 1;
        ctr_update(&mut table[index], taken, PERC_WIDTH);
    }
    // Train the per-group doubling weight when removing the group's vote
    // would have flipped the sum.
    let xsum = lsum - (*w >= 0) as i32 * percsum;
    if (xsum + percsum >= 0) != (xsum >= 0) {
        ctr_update(w, (percsum >= 0) == taken, EXTRA_WEIGHT_WIDTH);
    }
}

fn init_gehl_group(logs: u32, count: usize) -> Vec<Vec<i8>> {
    let entries = 1usize << logs;
    let mut group = vec![vec![0i8; entries]; count];
    for table in &mut group {
        for (j, cell) in table.iter_mut().enumerate().take(entries - 1) {
            if j & 1 == 0 {
                *cell = -1;
            }
        }
    }
    group
}

/// Statistical corrector state.
pub struct Corrector {
    bias: Vec<i8>,
    bias_sk: Vec<i8>,
    bias_bank: Vec<i8>,

    igehl: Vec<Vec<i8>>,
    imgehl: Vec<Vec<i8>>,
    ggehl: Vec<Vec<i8>>,
    pgehl: Vec<Vec<i8>>,
    lgehl: Vec<Vec<i8>>,
    sgehl: Vec<Vec<i8>>,
    tgehl: Vec<Vec<i8>>,

    wi: Vec<i8>,
    wim: Vec<i8>,
    wg: Vec<i8>,
    wp: Vec<i8>,
    wl: Vec<i8>,
    ws: Vec<i8>,
    wt: Vec<i8>,
    wb: Vec<i8>,

    update_threshold: i32,
    p_update_threshold: Vec<i32>,

    /// Chooser for medium-confidence TAGE predictions.
    pub first_h: i8,
    /// Chooser for high-confidence TAGE predictions.
    pub second_h: i8,
}

impl Corrector {
    pub fn new() -> Self {
        let mut bias = vec![0i8; 1 << LOG_BIAS];
        let mut bias_sk = vec![0i8; 1 << LOG_BIAS];
        let mut bias_bank = vec![0i8; 1 << LOG_BIAS];
        for j in 0..(1usize << LOG_BIAS) {
            bias_sk[j] = match j & 3 {
                0 => -8,
                1 => 7,
                2 => -32,
                _ => 31,
            };
            bias[j] = match j & 3 {
                0 => -32,
                1 => 31,
                2 => -1,
                _ => 0,
            };
            bias_bank[j] = bias[j];
        }

        let ups = 1usize << LOG_SIZE_UPS;
        Self {
            bias,
            bias_sk,
            bias_bank,
            igehl: init_gehl_group(LOG_INB, IM.len()),
            imgehl: init_gehl_group(LOG_IMNB, IMM.len()),
            ggehl: init_gehl_group(LOG_GNB, GM.len()),
            pgehl: init_gehl_group(LOG_PNB, PM.len()),
            lgehl: init_gehl_group(LOG_LNB, LM.len()),
            sgehl: init_gehl_group(LOG_SNB, SM.len()),
            tgehl: init_gehl_group(LOG_TNB, TM.len()),
            wi: vec![7; ups],
            wim: vec![7; ups],
            wg: vec![7; ups],
            wp: vec![7; ups],
            wl: vec![7; ups],
            ws: vec![7; ups],
            wt: vec![7; ups],
            wb: vec![4; ups],
            update_threshold: 35 << 3,
            p_update_threshold: vec![0; 1 << LOG_SIZE_UP],
            first_h: 0,
            second_h: 0,
        }
    }

    /// Computes the corrector sum and the current override threshold.
    pub fn evaluate(&self, ctx: &ScContext, hist: &SpeculativeHistory) -> (i32, i32) {
        let pc = ctx.pc;
        let upds = ind_upds(pc);

        let mut lsum = transfer(self.bias[ctx.bias_index()]);
        lsum += transfer(self.bias_sk[ctx.bias_sk_index()]);
        lsum += transfer(self.bias_bank[ctx.bias_bank_index()]);
        lsum *= 1 + (self.wb[upds] >= 0) as i32;

        lsum += gehl_predict(
            (pc << 1) + ctx.pred_inter as u64,
            hist.ghist_u64,
            &GM,
            &self.ggehl,
            LOG_GNB,
            self.wg[upds],
        );
        lsum += gehl_predict(pc, hist.phist, &PM, &self.pgehl, LOG_PNB, self.wp[upds]);
        lsum += gehl_predict(
            pc,
            hist.l_shist[local_index(pc)],
            &LM,
            &self.lgehl,
            LOG_LNB,
            self.wl[upds],
        );
        lsum += gehl_predict(
            pc,
            hist.s_slhist[second_local_index(pc)],
            &SM,
            &self.sgehl,
            LOG_SNB,
            self.ws[upds],
        );
        lsum += gehl_predict(
            pc,
            hist.t_slhist[third_local_index(pc)],
            &TM,
            &self.tgehl,
            LOG_TNB,
            self.wt[upds],
        );
        lsum += gehl_predict(
            pc,
            hist.imhist[(hist.imli_count & 0xFF) as usize],
            &IMM,
            &self.imgehl,
            LOG_IMNB,
            self.wim[upds],
        );
        lsum += gehl_predict(pc, hist.imli_count, &IM, &self.igehl, LOG_INB, self.wi[upds]);

        let thres = (self.update_threshold >> 3)
            + self.p_update_threshold[ind_upd(pc)]
            + 12 * ((self.wb[upds] >= 0) as i32
                + (self.wp[upds] >= 0) as i32
                + (self.ws[upds] >= 0) as i32
                + (self.wt[upds] >= 0) as i32
                + (self.wl[upds] >= 0) as i32
                + (self.wg[upds] >= 0) as i32
                + (self.wi[upds] >= 0) as i32);

        (lsum, thres)
    }

    /// Applies the chooser counters to decide between the corrector's vote
    /// and the TAGE prediction.
    pub fn decide(&self, ctx: &ScContext, lsum: i32, thres: i32) -> bool {
        let sc_pred = lsum >= 0;
        let mut taken = ctx.pred_inter;
        if ctx.pred_inter != sc_pred {
            taken = sc_pred;
            if ctx.high_conf {
                if lsum.abs() < thres / 4 {
                    taken = ctx.pred_inter;
                } else if lsum.abs() < thres / 2 {
                    taken = if self.second_h < 0 { sc_pred } else { ctx.pred_inter };
                }
            }
            if ctx.med_conf && lsum.abs() < thres / 4 {
                taken = if self.first_h < 0 { sc_pred } else { ctx.pred_inter };
            }
        }
        taken
    }

    /// Trains the choosers, the adaptive thresholds, the bias tables, and
    /// every GEHL group against the resolved direction.
    pub fn train(
        &mut self,
        ctx: &ScContext,
        hist: &SpeculativeHistory,
        lsum: i32,
        thres: i32,
        resolved: bool,
    ) {
        let pc = ctx.pc;
        let sc_pred = lsum >= 0;
        let upds = ind_upds(pc);

        if ctx.pred_inter != sc_pred {
            if lsum.abs() < thres && ctx.high_conf && lsum.abs() < thres / 2 && lsum.abs() >= thres / 4
            {
                ctr_update(&mut self.second_h, ctx.pred_inter == resolved, CONF_WIDTH);
            }
            if ctx.med_conf && lsum.abs() < thres / 4 {
                ctr_update(&mut self.first_h, ctx.pred_inter == resolved, CONF_WIDTH);
            }
        }

        if sc_pred != resolved || lsum.abs() < thres {
            let upd = ind_upd(pc);
            if sc_pred != resolved {
                self.p_update_threshold[upd] += 1;
                self.update_threshold += 1;
            } else {
                self.p_update_threshold[upd] -= 1;
                self.update_threshold -= 1;
            }
            let p_bound = 1 << (WIDTH_RES_P - 1);
            self.p_update_threshold[upd] = self.p_update_threshold[upd].clamp(-p_bound, p_bound - 1);
            let bound = 1 << (WIDTH_RES - 1);
            self.update_threshold = self.update_threshold.clamp(-bound, bound - 1);

            // Extra-weight training for the bias group.
            {
                let sum3 = (2 * self.bias[ctx.bias_index()] as i32 + 1)
                    + (2 * self.bias_sk[ctx.bias_sk_index()] as i32 + 1)
                    + (2 * self.bias_bank[ctx.bias_bank_index()] as i32 + 1);
                let xsum = lsum - (self.wb[upds] >= 0) as i32 * sum3;
                if (xsum + sum3 >= 0) != (xsum >= 0) {
                    ctr_update(&mut self.wb[upds], (sum3 >= 0) == resolved, EXTRA_WEIGHT_WIDTH);
                }
            }

            let bias_index = ctx.bias_index();
            let bias_sk_index = ctx.bias_sk_index();
            let bias_bank_index = ctx.bias_bank_index();
            ctr_update(&mut self.bias[bias_index], resolved, PERC_WIDTH);
            ctr_update(&mut self.bias_sk[bias_sk_index], resolved, PERC_WIDTH);
            ctr_update(&mut self.bias_bank[bias_bank_index], resolved, PERC_WIDTH);

            gehl_update(
                (pc << 1) + ctx.pred_inter as u64,
                hist.ghist_u64,
                &GM,
                &mut self.ggehl,
                LOG_GNB,
                &mut self.wg[upds],
                resolved,
                lsum,
            );
            gehl_update(pc, hist.phist, &PM, &mut self.pgehl, LOG_PNB, &mut self.wp[upds], resolved, lsum);
            gehl_update(
                pc,
                hist.l_shist[local_index(pc)],
                &LM,
                &mut self.lgehl,
                LOG_LNB,
                &mut self.wl[upds],
                resolved,
                lsum,
            );
            gehl_update(
                pc,
                hist.s_slhist[second_local_index(pc)],
                &SM,
                &mut self.sgehl,
                LOG_SNB,
                &mut self.ws[upds],
                resolved,
                lsum,
            );
            gehl_update(
                pc,
                hist.t_slhist[third_local_index(pc)],
                &TM,
                &mut self.tgehl,
                LOG_TNB,
                &mut self.wt[upds],
                resolved,
                lsum,
            );
            gehl_update(
                pc,
                hist.imhist[(hist.imli_count & 0xFF) as usize],
                &IMM,
                &mut self.imgehl,
                LOG_IMNB,
                &mut self.wim[upds],
                resolved,
                lsum,
            );
            gehl_update(pc, hist.imli_count, &IM, &mut self.igehl, LOG_INB, &mut self.wi[upds], resolved, lsum);
        }
    }
}

impl Default for Corrector {
    fn default() -> Self {
        Self::new()
    }
}
