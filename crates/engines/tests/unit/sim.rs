//! Harness smoke tests: every engine combination runs, collects sensible
//! statistics, and is deterministic.

use engine_core::config::{Config, PredictorKind, ReplacementKind};
use engine_core::sim::Host;

fn run(kind: PredictorKind, replacement: ReplacementKind, records: u64) -> engine_core::EngineStats {
    let mut config = Config::default();
    config.predictor.kind = kind;
    config.cache.replacement = replacement;
    config.cache.sets = 256;
    config.cache.ways = 16;
    if replacement == ReplacementKind::Ipv {
        config.cache.ipv = Some("0 0 1 3#0 0 2 3".to_string());
    }
    let mut host = Host::new(&config);
    host.run(records);
    host.finish()
}

#[test]
fn tage_host_smoke() {
    let stats = run(PredictorKind::TageScL, ReplacementKind::Mockingjay, 30_000);
    assert!(stats.predictions > 0);
    assert!(stats.mispredictions < stats.predictions);
    assert!(stats.fills > 0);
    assert!(stats.victims >= stats.fills);
}

#[test]
fn bullseye_host_smoke() {
    let stats = run(PredictorKind::Bullseye, ReplacementKind::Ipv, 30_000);
    assert!(stats.predictions > 0);
    assert!(stats.accuracy() > 0.5, "composite must beat a coin flip on this trace");
}

#[test]
fn mpp_host_smoke() {
    let stats = run(PredictorKind::Mpp, ReplacementKind::Mockingjay, 30_000);
    assert!(stats.predictions > 0);
    assert!(stats.accuracy() > 0.5);
}

/// The streaming walks in the trace must wake the prefetcher up.
#[test]
fn prefetcher_issues_requests() {
    let stats = run(PredictorKind::TageScL, ReplacementKind::Mockingjay, 60_000);
    assert!(stats.prefetches_issued > 0, "streaming trace produced no prefetches");
}

/// Identical configurations over identical traces produce identical runs.
#[test]
fn runs_are_deterministic() {
    let a = run(PredictorKind::Bullseye, ReplacementKind::Mockingjay, 20_000);
    let b = run(PredictorKind::Bullseye, ReplacementKind::Mockingjay, 20_000);
    assert_eq!(a.predictions, b.predictions);
    assert_eq!(a.mispredictions, b.mispredictions);
    assert_eq!(a.prefetches_issued, b.prefetches_issued);
    assert_eq!(a.fills, b.fills);
}
