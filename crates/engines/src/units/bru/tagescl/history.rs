//! Speculative history state for the TAGE-SC-L engine.
//!
//! Everything a prediction depends on besides the counter tables lives here,
//! so that `predict` can checkpoint it with a single clone and `update` can
//! recover the prediction-time view. The tables themselves are trained
//! in-place and are never checkpointed.

use crate::common::{FoldedHistory, HistoryBuffer};

use super::loop_pred::LoopEntry;
use super::{
    HIST_BUFFER_LENGTH, LOG_LOOP_TABLE, NHIST, NLOCAL, NSECLOCAL, NTLOCAL, PHIST_WIDTH,
};

/// One snapshot of all speculative histories.
#[derive(Clone)]
pub struct SpeculativeHistory {
    /// Plain global taken history (used by the SC global GEHL tables).
    pub ghist_u64: u64,
    /// Long global direction history buffer feeding the folded registers.
    pub ghist: HistoryBuffer,
    /// Path history, masked to [`PHIST_WIDTH`] bits.
    pub phist: u64,
    /// Folded histories for tagged-table index computation, per table.
    pub ch_i: Vec<FoldedHistory>,
    /// First folded tag history, per table.
    pub ch_t0: Vec<FoldedHistory>,
    /// Second (one bit narrower) folded tag history, per table.
    pub ch_t1: Vec<FoldedHistory>,

    /// Per-branch local histories.
    pub l_shist: Vec<u64>,
    /// Second local histories (PC-skewed).
    pub s_slhist: Vec<u64>,
    /// Third local histories.
    pub t_slhist: Vec<u64>,

    /// Per-iteration-count inner-loop histories.
    pub imhist: Vec<u64>,
    /// Innermost-loop iteration counter.
    pub imli_count: u64,

    /// Loop predictor entries (speculatively trained, restored on repair).
    pub ltable: Vec<LoopEntry>,
    /// Counter gating whether the loop predictor may override.
    pub with_loop: i8,
}

impl SpeculativeHistory {
    pub fn new(geometry: &[usize], tag_bits: &[u32], log_entries: &[u32]) -> Self {
        let mut ch_i = Vec::with_capacity(NHIST + 1);
        let mut ch_t0 = Vec::with_capacity(NHIST + 1);
        let mut ch_t1 = Vec::with_capacity(NHIST + 1);
        // Index 0 is unused; keep the arrays aligned with the 1-based tables.
        for i in 0..=NHIST {
            let olen = geometry[i].max(1);
            ch_i.push(FoldedHistory::new(olen, log_entries[i].max(1)));
            ch_t0.push(FoldedHistory::new(olen, tag_bits[i].max(1)));
            ch_t1.push(FoldedHistory::new(olen, (tag_bits[i].max(2)) - 1));
        }

        Self {
            ghist_u64: 0,
            ghist: HistoryBuffer::new(HIST_BUFFER_LENGTH),
            phist: 0,
            ch_i,
            ch_t0,
            ch_t1,
            l_shist: vec![0; NLOCAL],
            s_slhist: vec![3; NSECLOCAL],
            t_slhist: vec![0; NTLOCAL],
            imhist: vec![0; 256],
            imli_count: 0,
            ltable: vec![LoopEntry::default(); 1 << LOG_LOOP_TABLE],
            with_loop: -1,
        }
    }

    /// Shifts one direction/path bit pair into the long history and keeps
    /// every folded register in sync.
    pub fn push_history_bit(&mut self, dir: bool, path_bit: u64) {
        self.ghist.push(dir);
        self.phist = ((self.phist << 1) ^ path_bit) & ((1 << PHIST_WIDTH) - 1);
        for i in 1..=NHIST {
            self.ch_i[i].update(&self.ghist);
            self.ch_t0[i].update(&self.ghist);
            self.ch_t1[i].update(&self.ghist);
        }
    }
}
