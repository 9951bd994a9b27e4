//! Composite predictor: multiperspective perceptron combined with
//! TAGE-SC-L.
//!
//! TAGE-SC-L predicts first and exports its prediction, intermediate
//! prediction, confidence class, and corrector sum as a packed word; the
//! perceptron consumes those as one of its features and the linear
//! [`Combiner`] votes between the two. Branches that have only ever gone
//! one way bypass both learners through the Bloom filters; never-seen
//! branches are predicted from the population count of the last five
//! global history bits.

pub mod bloom;
pub mod combiner;
pub mod features;
pub mod histories;
pub mod perceptron;

pub use combiner::Combiner;
pub use perceptron::{MppCore, MppUpdate};

use std::collections::VecDeque;

use crate::stats::EngineStats;

use self::combiner::SpecRecord;
use self::features::TUNED_FEATURES;

use super::tagescl::TageScl;
use super::{BranchKind, ConditionalPredictor};

/// The combined MPP + TAGE-SC-L predictor.
pub struct MppPredictor {
    tage: TageScl,
    core: MppCore,
    combiner: Combiner,

    next_seq: u64,
    in_flight: VecDeque<(u64, u64, bool)>,

    predictions: u64,
    mispredictions: u64,
}

impl MppPredictor {
    pub fn new(max_in_flight: usize) -> Self {
        // The history footprint decides how many weight entries the budget
        // leaves for the tables.
        let history_bits = MppCore::history_bits_of(&TUNED_FEATURES);
        let entries = Combiner::affordable_entries(history_bits);

        Self {
            tage: TageScl::new(max_in_flight),
            core: MppCore::new(&TUNED_FEATURES, entries),
            combiner: Combiner::new(),
            next_seq: 0,
            in_flight: VecDeque::new(),
            predictions: 0,
            mispredictions: 0,
        }
    }
}

impl ConditionalPredictor for MppPredictor {
    fn predict(&mut self, ip: u64) -> bool {
        self.next_seq += 1;
        let seq = self.next_seq;

        let tage = self.tage.predict(seq, ip);
        let tage_bits = tage.packed();
        let mpp_pred = self.core.lookup(ip, tage.taken, tage_bits);

        let ever_taken = self.combiner.ever_taken.probe(ip);
        let ever_not_taken = self.combiner.ever_not_taken.probe(ip);

        let (final_pred, sum) = if !ever_taken && !ever_not_taken {
            // First encounter: when the previous five branches were all
            // taken the branch tends to be taken, otherwise not.
            ((self.combiner.ghist & 31).count_ones() == 5, 0.0)
        } else if !ever_taken {
            (false, 0.0)
        } else if !ever_not_taken {
            (true, 0.0)
        } else {
            self.combiner.vote(tage_bits, mpp_pred, self.core.u.yout)
        };

        self.combiner.speculative.insert(
            seq,
            SpecRecord {
                pc: ip,
                tage_bits,
                mpp: self.core.u.clone(),
                sum,
                final_pred,
                counted_lc: false,
            },
        );
        self.in_flight.push_back((ip, seq, final_pred));
        self.predictions += 1;
        final_pred
    }

    fn last_branch_result(&mut self, ip: u64, target: u64, taken: bool, kind: BranchKind) {
        if !kind.is_conditional() {
            self.core.nonconditional_branch(ip, target, kind);
            self.tage.track_other(ip, kind, taken, taken, target);
            return;
        }

        let (pred_ip, seq, final_pred) = self
            .in_flight
            .pop_front()
            .expect("conditional branch resolved without a prediction");
        assert_eq!(pred_ip, ip, "conditional branches must resolve in prediction order");
        if final_pred != taken {
            self.mispredictions += 1;
        }

        let mut record = self
            .combiner
            .speculative
            .remove(&seq)
            .expect("combiner record missing for in-flight branch");

        // Speculative phase: histories take the ground truth; the tables may
        // take the prediction, to be corrected below if it was wrong.
        let filtered = self.combiner.filtered(ip);
        self.core.u = record.mpp.clone();
        let spec_enabled = self.combiner.spec_update_enabled;
        self.core.spec_update(target, taken, record.final_pred, filtered, spec_enabled);
        record.mpp.updated = self.core.u.updated;
        record.mpp.overall_prediction = self.core.u.overall_prediction;
        record.counted_lc = self.combiner.note_low_confidence(record.sum, filtered);

        // Resolve phase.
        self.combiner.retire_low_confidence(record.counted_lc);

        if taken {
            self.combiner.ever_taken.insert(ip);
        } else {
            self.combiner.ever_not_taken.insert(ip);
        }
        let do_train =
            self.combiner.ever_taken.probe(ip) && self.combiner.ever_not_taken.probe(ip);

        self.tage.update(seq, ip, taken, target, true);

        let spec_enabled = self.combiner.spec_update_enabled;
        self.core.update(&record.mpp, taken, !do_train, spec_enabled);

        if do_train {
            self.combiner.monitor(record.tage_bits, record.mpp.prediction, record.mpp.yout, taken);
        }

        self.combiner.ghist = (self.combiner.ghist << 1) | taken as u64;
    }

    fn collect(&self, stats: &mut EngineStats) {
        stats.predictions += self.predictions;
        stats.mispredictions += self.mispredictions;
        stats.chosen_tage += self.predictions;
    }
}
