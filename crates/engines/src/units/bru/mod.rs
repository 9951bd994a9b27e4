//! Branch prediction unit implementations.
//!
//! This module contains the conditional branch direction predictors: the
//! TAGE-SC-L engine, the perceptron-augmented composite guarded by a
//! hard-to-predict branch identifier, and the multiperspective-perceptron
//! composite with a linear combiner.

/// Perceptron-augmented composite predictor with H2P identification.
pub mod bullseye;

/// Multiperspective perceptron composite with linear combiner.
pub mod mpp;

/// TAGE-SC-L engine (tagged-geometric tables, statistical corrector, loop
/// predictor).
pub mod tagescl;

pub use bullseye::BullseyePredictor;
pub use mpp::MppPredictor;
pub use tagescl::TageScl;

use crate::config::{Config, PredictorKind};
use crate::stats::EngineStats;

/// Control-flow instruction categories the predictors distinguish.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BranchKind {
    Conditional,
    DirectJump,
    IndirectJump,
    DirectCall,
    IndirectCall,
    Return,
}

impl BranchKind {
    pub fn is_conditional(self) -> bool {
        matches!(self, Self::Conditional)
    }

    pub fn is_indirect(self) -> bool {
        matches!(self, Self::IndirectJump | Self::IndirectCall | Self::Return)
    }
}

/// Trait for conditional branch direction predictors.
///
/// The host calls [`predict`](Self::predict) for every conditional branch and
/// [`last_branch_result`](Self::last_branch_result) for every branch, in
/// order, exactly once each. Conditional branches must resolve in prediction
/// order; a resolve without a matching prediction is a host bug and panics.
pub trait ConditionalPredictor {
    /// Resets learner state.
    fn initialize(&mut self) {}

    /// Predicts the direction of the conditional branch at `ip`.
    fn predict(&mut self, ip: u64) -> bool;

    /// Reports the resolved outcome of the branch at `ip`.
    fn last_branch_result(&mut self, ip: u64, target: u64, taken: bool, kind: BranchKind);

    /// Copies internal counters into the run statistics.
    fn collect(&self, _stats: &mut EngineStats) {}

    /// Hook for end-of-run reporting.
    fn final_stats(&self) {}
}

/// Enum wrapper for static dispatch of direction predictors.
pub enum PredictorWrapper {
    TageScL(Box<tagescl::TageSclModule>),
    Bullseye(Box<BullseyePredictor>),
    Mpp(Box<MppPredictor>),
}

impl PredictorWrapper {
    /// Builds the configured predictor.
    pub fn new(config: &Config) -> Self {
        let max_in_flight = config.predictor.max_in_flight;
        match config.predictor.kind {
            PredictorKind::TageScL => {
                Self::TageScL(Box::new(tagescl::TageSclModule::new(max_in_flight)))
            }
            PredictorKind::Bullseye => {
                Self::Bullseye(Box::new(BullseyePredictor::new(max_in_flight)))
            }
            PredictorKind::Mpp => Self::Mpp(Box::new(MppPredictor::new(max_in_flight))),
        }
    }
}

impl ConditionalPredictor for PredictorWrapper {
    fn initialize(&mut self) {
        match self {
            Self::TageScL(p) => p.initialize(),
            Self::Bullseye(p) => p.initialize(),
            Self::Mpp(p) => p.initialize(),
        }
    }

    fn predict(&mut self, ip: u64) -> bool {
        match self {
            Self::TageScL(p) => p.predict(ip),
            Self::Bullseye(p) => p.predict(ip),
            Self::Mpp(p) => p.predict(ip),
        }
    }

    fn last_branch_result(&mut self, ip: u64, target: u64, taken: bool, kind: BranchKind) {
        match self {
            Self::TageScL(p) => p.last_branch_result(ip, target, taken, kind),
            Self::Bullseye(p) => p.last_branch_result(ip, target, taken, kind),
            Self::Mpp(p) => p.last_branch_result(ip, target, taken, kind),
        }
    }

    fn collect(&self, stats: &mut EngineStats) {
        match self {
            Self::TageScL(p) => p.collect(stats),
            Self::Bullseye(p) => p.collect(stats),
            Self::Mpp(p) => p.collect(stats),
        }
    }

    fn final_stats(&self) {
        match self {
            Self::TageScL(p) => p.final_stats(),
            Self::Bullseye(p) => p.final_stats(),
            Self::Mpp(p) => p.final_stats(),
        }
    }
}
