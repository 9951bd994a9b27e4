//! Composite predictor: TAGE-SC-L plus H2P-guarded perceptrons.
//!
//! Every conditional branch is predicted by TAGE-SC-L; branches the H2P
//! census declares hard-to-predict additionally get entries in a
//! local-history and a global-history perceptron. The composite answers
//! with whichever learner is most confident, trains all of them on
//! resolve, and suppresses base-predictor training when an auxiliary has
//! proven superior for the branch.

pub mod global_perceptron;
pub mod h2p;
pub mod local_perceptron;

pub use global_perceptron::{GlobalPerceptron, PerceptronOutput};
pub use h2p::H2pTable;
pub use local_perceptron::LocalPerceptron;

use std::collections::VecDeque;

use crate::stats::EngineStats;

use super::tagescl::{TagePrediction, TageScl};
use super::{BranchKind, ConditionalPredictor};

/// Prediction-time state carried to resolve for one in-flight branch.
struct InFlight {
    ip: u64,
    seq: u64,
    final_pred: bool,
    tage: TagePrediction,
    local: Option<PerceptronOutput>,
    global: Option<PerceptronOutput>,
}

/// The composite predictor.
pub struct BullseyePredictor {
    tage: TageScl,
    local: LocalPerceptron,
    global: GlobalPerceptron,
    h2p: H2pTable,

    next_seq: u64,
    in_flight: VecDeque<InFlight>,

    predictions: u64,
    mispredictions: u64,
    h2p_inserted: u64,
    chosen_local: u64,
    chosen_global: u64,
    chosen_tage: u64,
    evictions: u64,
    stale_evictions: u64,
    filtered_updates: u64,
}

impl BullseyePredictor {
    pub fn new(max_in_flight: usize) -> Self {
        Self {
            tage: TageScl::new(max_in_flight),
            local: LocalPerceptron::new(),
            global: GlobalPerceptron::new(),
            h2p: H2pTable::new(),
            next_seq: 0,
            in_flight: VecDeque::new(),
            predictions: 0,
            mispredictions: 0,
            h2p_inserted: 0,
            chosen_local: 0,
            chosen_global: 0,
            chosen_tage: 0,
            evictions: 0,
            stale_evictions: 0,
            filtered_updates: 0,
        }
    }

    /// Confidence-ordered selection between the perceptrons and TAGE-SC-L.
    fn select(
        &mut self,
        ip: u64,
        tage: &TagePrediction,
        local: &Option<PerceptronOutput>,
        global: &Option<PerceptronOutput>,
    ) -> bool {
        if let Some(lp) = local {
            if lp.high_confidence || self.local.is_superior(ip) {
                self.chosen_local += 1;
                return lp.sum >= 0;
            }
        }
        if let Some(gp) = global {
            if gp.high_confidence || self.global.is_superior(ip) {
                self.chosen_global += 1;
                return gp.sum >= 0;
            }
        }
        if tage.high_conf || tage.sc_confident() {
            self.chosen_tage += 1;
            return tage.taken;
        }
        if let Some(lp) = local {
            if lp.med_confidence {
                self.chosen_local += 1;
                return lp.sum >= 0;
            }
        }
        if let Some(gp) = global {
            if gp.med_confidence {
                self.chosen_global += 1;
                return gp.sum >= 0;
            }
        }
        if local.is_some() || global.is_some() {
            self.chosen_tage += 1;
        }
        tage.taken
    }

    /// Current H2P population, for tests.
    pub fn h2p_population(&self) -> u64 {
        self.h2p.population()
    }
}

impl ConditionalPredictor for BullseyePredictor {
    fn predict(&mut self, ip: u64) -> bool {
        self.next_seq += 1;
        let seq = self.next_seq;

        let tage = self.tage.predict(seq, ip);
        let local = self.local.contains(ip).then(|| self.local.predict(ip));
        let global = self.global.contains(ip).then(|| self.global.predict(ip));

        let final_pred = self.select(ip, &tage, &local, &global);

        // Perceptron histories advance speculatively with the chosen
        // direction and are repaired at resolve.
        self.local.history_update(ip, seq, final_pred);
        self.global.history_update(ip, seq, final_pred);

        self.in_flight.push_back(InFlight { ip, seq, final_pred, tage, local, global });
        self.predictions += 1;
        final_pred
    }

    fn last_branch_result(&mut self, ip: u64, target: u64, taken: bool, kind: BranchKind) {
        if !kind.is_conditional() {
            self.tage.track_other(ip, kind, taken, taken, target);
            return;
        }

        let record = self
            .in_flight
            .pop_front()
            .expect("conditional branch resolved without a prediction");
        assert_eq!(record.ip, ip, "conditional branches must resolve in prediction order");

        let correct = record.final_pred == taken;
        if !correct {
            self.mispredictions += 1;
        }

        // The TAGE direction serves as the perceptrons' baseline competitor.
        let competitor = record.tage.taken;
        if self.local.contains(ip) {
            let sum = record.local.map_or(0, |p| p.sum);
            self.local.update(ip, record.seq, taken, record.final_pred, sum, competitor);
        }
        if self.global.contains(ip) {
            let sum = record.global.map_or(0, |p| p.sum);
            self.global.update(ip, record.seq, taken, record.final_pred, sum, competitor);
        } else {
            self.global.refine_history(taken, record.final_pred);
        }

        if self.local.check_eviction(ip) {
            self.h2p.on_h2p_evicted(ip);
            self.evictions += 1;
        }
        if self.global.check_eviction(ip) {
            self.h2p.on_h2p_evicted(ip);
            self.evictions += 1;
        }
        if self.local.check_stale_eviction() {
            self.h2p.on_h2p_evicted(ip);
            self.stale_evictions += 1;
        }
        if self.global.check_stale_eviction() {
            self.h2p.on_h2p_evicted(ip);
            self.stale_evictions += 1;
        }

        // Branches not yet claimed by a perceptron feed the H2P census.
        if !self.local.contains_or_queued(ip) && !self.global.contains_or_queued(ip) {
            let is_h2p = self.h2p.update(ip, correct);
            if is_h2p {
                self.h2p_inserted += 1;
                self.local.insert(ip);
                self.global.insert(ip);
            }
        }

        // A proven-superior auxiliary claims the branch: stop training the
        // base predictor on it.
        let filter = (self.local.contains(ip) && self.local.is_superior(ip))
            || (self.global.contains(ip) && self.global.is_superior(ip));
        if filter {
            self.filtered_updates += 1;
        }

        self.tage.update(record.seq, ip, taken, target, !filter);
    }

    fn collect(&self, stats: &mut EngineStats) {
        stats.predictions += self.predictions;
        stats.mispredictions += self.mispredictions;
        stats.h2p_inserted += self.h2p_inserted;
        stats.chosen_local_perceptron += self.chosen_local;
        stats.chosen_global_perceptron += self.chosen_global;
        stats.chosen_tage += self.chosen_tage;
        stats.perceptron_evictions += self.evictions;
        stats.perceptron_stale_evictions += self.stale_evictions;
        stats.filtered_updates += self.filtered_updates;
    }
}
