//! Configuration tests: IPV parsing/validation and JSON deserialization.

use engine_core::common::EngineError;
use engine_core::config::{Config, IpvVectors, PredictorKind, PrefetcherKind, ReplacementKind};

#[test]
fn ipv_parses_valid_spec() {
    let v = IpvVectors::parse("0 0 1 3#0 0 2 3").unwrap();
    assert_eq!(v.demand, vec![0, 0, 1, 3]);
    assert_eq!(v.prefetch, vec![0, 0, 2, 3]);
    assert_eq!(v.len(), 4);
}

#[test]
fn ipv_rejects_missing_separator() {
    match IpvVectors::parse("0 0 1 3") {
        Err(EngineError::MalformedIpv(_)) => {}
        other => panic!("expected MalformedIpv, got {other:?}"),
    }
}

#[test]
fn ipv_rejects_non_integer_token() {
    assert!(matches!(
        IpvVectors::parse("0 x 1 3#0 0 2 3"),
        Err(EngineError::MalformedIpv(_))
    ));
}

#[test]
fn ipv_rejects_length_mismatch() {
    assert!(matches!(
        IpvVectors::parse("0 0 1 3#0 0 3"),
        Err(EngineError::IpvLengthMismatch { demand: 4, prefetch: 3 })
    ));
}

/// Every RRPV named by a vector must be a valid state index.
#[test]
fn ipv_rejects_out_of_range_state() {
    assert!(matches!(
        IpvVectors::parse("0 0 1 4#0 0 2 3"),
        Err(EngineError::IpvValueOutOfRange { value: 4, len: 4 })
    ));
}

#[test]
fn ipv_rejects_empty_side() {
    assert!(matches!(IpvVectors::parse("#0 1"), Err(EngineError::MalformedIpv(_))));
}

#[test]
fn ipv_env_lookup_needs_known_role() {
    assert!(matches!(
        IpvVectors::from_env("WEIRD_CACHE"),
        Err(EngineError::UnknownCacheRole(_))
    ));
}

#[test]
fn config_defaults_are_usable() {
    let config = Config::default();
    assert_eq!(config.predictor.kind, PredictorKind::TageScL);
    assert_eq!(config.prefetcher.kind, PrefetcherKind::Spatial);
    assert_eq!(config.cache.replacement, ReplacementKind::Mockingjay);
    assert!(config.cache.sets.is_power_of_two());
}

#[test]
fn config_deserializes_from_json() {
    let json = r#"{
        "predictor": { "kind": "Mpp" },
        "prefetcher": { "kind": "None" },
        "cache": { "sets": 512, "ways": 8, "replacement": "IPV", "ipv": "0 1#1 1" },
        "queues": { "pq_size": 4, "mshr_size": 8 }
    }"#;
    let config: Config = serde_json::from_str(json).unwrap();
    assert_eq!(config.predictor.kind, PredictorKind::Mpp);
    assert_eq!(config.prefetcher.kind, PrefetcherKind::None);
    assert_eq!(config.cache.replacement, ReplacementKind::Ipv);
    assert_eq!(config.cache.sets, 512);
    assert_eq!(config.queues.pq_size, 4);
    assert_eq!(config.general.records, 1_000_000);
}
