//! Configuration system for the engine library.
//!
//! This module defines all configuration structures and enums used to
//! parameterize the engines. It provides:
//! 1. **Defaults:** baseline constants (cache geometry, queue depths, run
//!    length) used when a field is not supplied.
//! 2. **Structures:** hierarchical config for the harness, the branch
//!    predictor, the prefetcher, and the replacement policy.
//! 3. **Enums:** selectable predictor, prefetcher, and replacement kinds.
//! 4. **IPV vectors:** structured parsing and validation of the
//!    `"<demand-ints>#<prefetch-ints>"` insertion/promotion specification.
//!
//! Configuration is supplied as JSON or via `Config::default()`. Predictor
//! history lengths, prefetcher table shapes, and Mockingjay widths are
//! compile-time constants owned by their modules, not configuration.

use serde::Deserialize;

use crate::common::EngineError;

/// Default configuration constants.
mod defaults {
    /// Number of simulated cores. The engines are single-core learners; the
    /// constant only feeds the Mockingjay prefetch penalty and PC signature.
    pub const NUM_CPUS: u32 = 1;

    /// Cache line size in bytes.
    pub const BLOCK_SIZE: u64 = 64;

    /// Default last-level cache set count.
    pub const CACHE_SETS: usize = 2048;

    /// Default last-level cache associativity.
    pub const CACHE_WAYS: usize = 16;

    /// Default cache name, used for IPV role inference.
    pub const CACHE_NAME: &str = "LLC";

    /// Default prefetch queue capacity seen by the emitter.
    pub const PQ_SIZE: usize = 8;

    /// Default MSHR capacity seen by the emitter.
    pub const MSHR_SIZE: usize = 16;

    /// Default number of trace records driven by the CLI harness.
    pub const RECORDS: u64 = 1_000_000;

    /// Largest number of predicted-but-unresolved branches the host may keep
    /// in flight before the checkpoint store is considered leaking.
    pub const MAX_IN_FLIGHT: usize = 1024;
}

/// Number of simulated cores (single-core build).
pub const NUM_CPUS: u32 = defaults::NUM_CPUS;

/// Cache line size in bytes, shared by the prefetcher and replacement.
pub const BLOCK_SIZE: u64 = defaults::BLOCK_SIZE;

/// log2 of [`BLOCK_SIZE`].
pub const LOG2_BLOCK_SIZE: u32 = BLOCK_SIZE.trailing_zeros();

/// Branch direction predictor algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum PredictorKind {
    /// TAGE-SC-L alone: tagged-geometric tables, statistical corrector, loop
    /// predictor.
    #[default]
    #[serde(alias = "TAGESCL", alias = "TageScl")]
    TageScL,
    /// TAGE-SC-L plus local/global history perceptrons reserved for branches
    /// flagged by the hard-to-predict identifier.
    Bullseye,
    /// TAGE-SC-L paired with a multiperspective perceptron through a linear
    /// combiner, with Bloom-filtered trivial-branch bypass.
    #[serde(alias = "MPP")]
    Mpp,
}

/// Hardware prefetcher kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum PrefetcherKind {
    /// No prefetching.
    None,
    /// Spatial pattern prefetcher (filter/accumulate/pattern/buffer tables).
    #[default]
    Spatial,
}

/// Cache replacement policy kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReplacementKind {
    /// Insertion-and-promotion-vector RRIP, parameterized by two vectors.
    #[serde(alias = "Ipv")]
    Ipv,
    /// Sampled reuse-distance learner with per-PC expected-time-to-reuse.
    #[default]
    #[serde(alias = "Mockingjay")]
    Mockingjay,
}

/// Root configuration structure.
///
/// # Examples
///
/// Deserializing from JSON:
///
/// ```
/// use engine_core::config::{Config, PredictorKind, ReplacementKind};
///
/// let json = r#"{
///     "general": { "records": 50000 },
///     "predictor": { "kind": "Bullseye" },
///     "prefetcher": { "kind": "Spatial" },
///     "cache": {
///         "name": "LLC",
///         "sets": 1024,
///         "ways": 16,
///         "replacement": "IPV",
///         "ipv": "0 0 1 3#0 0 2 3"
///     },
///     "queues": { "pq_size": 8, "mshr_size": 16 }
/// }"#;
///
/// let config: Config = serde_json::from_str(json).unwrap();
/// assert_eq!(config.predictor.kind, PredictorKind::Bullseye);
/// assert_eq!(config.cache.replacement, ReplacementKind::Ipv);
/// assert_eq!(config.cache.sets, 1024);
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Harness settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Branch predictor selection.
    #[serde(default)]
    pub predictor: PredictorConfig,
    /// Prefetcher selection.
    #[serde(default)]
    pub prefetcher: PrefetcherConfig,
    /// Cache geometry and replacement selection.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Queue capacities seen by the prefetch emitter.
    #[serde(default)]
    pub queues: QueueConfig,
}

/// Harness settings.
#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    /// Number of synthetic trace records the CLI harness drives.
    #[serde(default = "GeneralConfig::default_records")]
    pub records: u64,
}

impl GeneralConfig {
    fn default_records() -> u64 {
        defaults::RECORDS
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self { records: defaults::RECORDS }
    }
}

/// Branch predictor selection and in-flight bounds.
#[derive(Debug, Clone, Deserialize)]
pub struct PredictorConfig {
    /// Which predictor to build.
    #[serde(default)]
    pub kind: PredictorKind,
    /// Checkpoint capacity; exceeding it is treated as a host protocol bug.
    #[serde(default = "PredictorConfig::default_max_in_flight")]
    pub max_in_flight: usize,
}

impl PredictorConfig {
    fn default_max_in_flight() -> usize {
        defaults::MAX_IN_FLIGHT
    }
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            kind: PredictorKind::default(),
            max_in_flight: defaults::MAX_IN_FLIGHT,
        }
    }
}

/// Prefetcher selection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PrefetcherConfig {
    /// Which prefetcher to build.
    #[serde(default)]
    pub kind: PrefetcherKind,
}

/// Cache geometry and replacement selection.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Cache name; substring-matched against `L1I`/`L1D`/`L2C`/`LLC` when an
    /// IPV must be looked up from the environment.
    #[serde(default = "CacheConfig::default_name")]
    pub name: String,
    /// Number of sets (must be a power of two).
    #[serde(default = "CacheConfig::default_sets")]
    pub sets: usize,
    /// Number of ways per set.
    #[serde(default = "CacheConfig::default_ways")]
    pub ways: usize,
    /// Which replacement policy to build.
    #[serde(default)]
    pub replacement: ReplacementKind,
    /// Inline IPV specification; overrides the environment lookup.
    #[serde(default)]
    pub ipv: Option<String>,
}

impl CacheConfig {
    fn default_name() -> String {
        defaults::CACHE_NAME.to_string()
    }

    fn default_sets() -> usize {
        defaults::CACHE_SETS
    }

    fn default_ways() -> usize {
        defaults::CACHE_WAYS
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            name: Self::default_name(),
            sets: defaults::CACHE_SETS,
            ways: defaults::CACHE_WAYS,
            replacement: ReplacementKind::default(),
            ipv: None,
        }
    }
}

/// Queue capacities the prefetch emitter checks before issuing.
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// Prefetch queue capacity.
    #[serde(default = "QueueConfig::default_pq")]
    pub pq_size: usize,
    /// MSHR capacity.
    #[serde(default = "QueueConfig::default_mshr")]
    pub mshr_size: usize,
}

impl QueueConfig {
    fn default_pq() -> usize {
        defaults::PQ_SIZE
    }

    fn default_mshr() -> usize {
        defaults::MSHR_SIZE
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            pq_size: defaults::PQ_SIZE,
            mshr_size: defaults::MSHR_SIZE,
        }
    }
}

/// A validated pair of insertion/promotion vectors.
///
/// `demand[i]` (resp. `prefetch[i]`) is the RRPV a line moves to when
/// promoted from state `i` by a demand (resp. prefetch) access; the entry at
/// index `len - 1` doubles as the insertion RRPV. Both vectors must have the
/// same length and every value must name a valid state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpvVectors {
    pub demand: Vec<u32>,
    pub prefetch: Vec<u32>,
}

impl IpvVectors {
    /// Parses `"<demand-ints>#<prefetch-ints>"` (space-separated unsigned
    /// integers on both sides) and validates the result.
    pub fn parse(spec: &str) -> Result<Self, EngineError> {
        let (demand_str, prefetch_str) = spec
            .split_once('#')
            .ok_or_else(|| EngineError::MalformedIpv(spec.to_string()))?;

        let parse_side = |side: &str| -> Result<Vec<u32>, EngineError> {
            side.split_whitespace()
                .map(|tok| tok.parse::<u32>().map_err(|_| EngineError::MalformedIpv(spec.to_string())))
                .collect()
        };

        let demand = parse_side(demand_str)?;
        let prefetch = parse_side(prefetch_str)?;
        if demand.is_empty() || prefetch.is_empty() {
            return Err(EngineError::MalformedIpv(spec.to_string()));
        }
        if demand.len() != prefetch.len() {
            return Err(EngineError::IpvLengthMismatch {
                demand: demand.len(),
                prefetch: prefetch.len(),
            });
        }

        let len = demand.len();
        for &v in demand.iter().chain(prefetch.iter()) {
            if v as usize >= len {
                return Err(EngineError::IpvValueOutOfRange { value: v, len });
            }
        }

        Ok(Self { demand, prefetch })
    }

    /// Environment-variable fallback: maps the cache name to one of
    /// `L1I_IPV`, `L1D_IPV`, `L2C_IPV`, `LLC_IPV` by substring and parses
    /// that variable. Prefer supplying the vectors directly in [`Config`].
    pub fn from_env(cache_name: &str) -> Result<Self, EngineError> {
        let var = ["L1I", "L1D", "L2C", "LLC"]
            .iter()
            .find(|role| cache_name.contains(*role))
            .map(|role| format!("{role}_IPV"))
            .ok_or_else(|| EngineError::UnknownCacheRole(cache_name.to_string()))?;

        match std::env::var(&var) {
            Ok(spec) => Self::parse(&spec),
            Err(_) => Err(EngineError::MissingIpv(var)),
        }
    }

    /// Number of RRPV states.
    pub fn len(&self) -> usize {
        self.demand.len()
    }

    pub fn is_empty(&self) -> bool {
        self.demand.is_empty()
    }
}
