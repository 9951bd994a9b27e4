//! Engine statistics collection and reporting.
//!
//! This module tracks behavior counters for the three engine kinds:
//! 1. **Branch prediction:** lookups, mispredictions, selector usage, H2P
//!    census activity, perceptron evictions.
//! 2. **Prefetching:** issued and deferred prefetches, pattern table hits,
//!    stride emissions.
//! 3. **Replacement:** fills, promotions, and victim selections.

/// Behavior counters for one simulation run.
#[derive(Clone, Debug, Default)]
pub struct EngineStats {
    /// Conditional branch predictions made.
    pub predictions: u64,
    /// Conditional branch mispredictions.
    pub mispredictions: u64,

    /// Branches declared hard-to-predict and handed to the auxiliaries.
    pub h2p_inserted: u64,
    /// Predictions resolved by the local-history perceptron.
    pub chosen_local_perceptron: u64,
    /// Predictions resolved by the global-history perceptron.
    pub chosen_global_perceptron: u64,
    /// Predictions resolved by the base TAGE-SC-L engine.
    pub chosen_tage: u64,
    /// Perceptron entries evicted for poor performance.
    pub perceptron_evictions: u64,
    /// Perceptron entries evicted for staleness.
    pub perceptron_stale_evictions: u64,
    /// Base-predictor updates suppressed because an auxiliary was superior.
    pub filtered_updates: u64,

    /// Prefetch requests issued to the host.
    pub prefetches_issued: u64,
    /// Emit rounds aborted on queue or MSHR back-pressure.
    pub prefetches_deferred: u64,
    /// Pattern table lookups that produced a pattern.
    pub pattern_hits: u64,
    /// In-region stride prefetch bursts emitted.
    pub stride_bursts: u64,

    /// Cache fills observed by the replacement policy.
    pub fills: u64,
    /// Cache hit promotions observed by the replacement policy.
    pub promotions: u64,
    /// Victim selections performed.
    pub victims: u64,
}

impl EngineStats {
    /// Fraction of conditional predictions that were correct.
    pub fn accuracy(&self) -> f64 {
        if self.predictions == 0 {
            return 0.0;
        }
        1.0 - self.mispredictions as f64 / self.predictions as f64
    }

    /// Mispredictions per thousand predictions.
    pub fn mpki(&self, instructions: u64) -> f64 {
        if instructions == 0 {
            return 0.0;
        }
        self.mispredictions as f64 * 1000.0 / instructions as f64
    }

    /// Prints the collected counters to stdout.
    pub fn print(&self) {
        println!("======== Branch Prediction ========");
        println!("predictions            = {}", self.predictions);
        println!("mispredictions         = {}", self.mispredictions);
        println!("accuracy               = {:.4}", self.accuracy());
        println!("h2p_inserted           = {}", self.h2p_inserted);
        println!("chosen_tage            = {}", self.chosen_tage);
        println!("chosen_local_percep    = {}", self.chosen_local_perceptron);
        println!("chosen_global_percep   = {}", self.chosen_global_perceptron);
        println!("percep_evictions       = {}", self.perceptron_evictions);
        println!("percep_stale_evictions = {}", self.perceptron_stale_evictions);
        println!("filtered_updates       = {}", self.filtered_updates);
        println!("======== Prefetching ========");
        println!("prefetches_issued      = {}", self.prefetches_issued);
        println!("prefetches_deferred    = {}", self.prefetches_deferred);
        println!("pattern_hits           = {}", self.pattern_hits);
        println!("stride_bursts          = {}", self.stride_bursts);
        println!("======== Replacement ========");
        println!("fills                  = {}", self.fills);
        println!("promotions             = {}", self.promotions);
        println!("victims                = {}", self.victims);
    }
}
