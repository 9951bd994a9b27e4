//! Cache replacement policies.
//!
//! Implements victim selection and per-access state update for
//! set-associative caches.
//!
//! # Policies
//!
//! - `Ipv`: RRIP parameterized by an insertion-and-promotion vector pair.
//! - `Mockingjay`: sampled reuse-distance learner predicting per-PC
//!   expected time to reuse.

/// Insertion-and-promotion-vector RRIP replacement policy.
pub mod ipv;

/// Sampled reuse-distance replacement policy.
pub mod mockingjay;

pub use ipv::IpvPolicy;
pub use mockingjay::MockingjayPolicy;

use crate::config::{CacheConfig, IpvVectors, ReplacementKind};

/// Cache access categories visible to the replacement policies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessType {
    Load,
    Rfo,
    Prefetch,
    Write,
    Translation,
}

/// The slice of cache line state the policies may inspect.
#[derive(Clone, Copy, Debug, Default)]
pub struct CacheBlock {
    /// Whether the way currently holds a line.
    pub valid: bool,
    /// Block-aligned address of the held line.
    pub address: u64,
}

/// Trait for cache replacement policies.
///
/// The host calls [`find_victim`](Self::find_victim) when a fill needs a way
/// and [`update_state`](Self::update_state) on every access (hit or fill).
pub trait Replacement {
    /// Resets all learner state.
    fn initialize(&mut self);

    /// Selects the way to evict from `set`.
    fn find_victim(
        &mut self,
        cpu: u32,
        instr_id: u64,
        set: usize,
        current_set: &[CacheBlock],
        ip: u64,
        full_addr: u64,
        access: AccessType,
    ) -> usize;

    /// Observes an access to `(set, way)`; `hit` distinguishes promotion
    /// from fill.
    #[allow(clippy::too_many_arguments)]
    fn update_state(
        &mut self,
        cpu: u32,
        set: usize,
        way: usize,
        full_addr: u64,
        ip: u64,
        victim_addr: u64,
        access: AccessType,
        hit: bool,
    );

    /// Hook for end-of-run reporting.
    fn final_stats(&self) {}
}

/// Enum wrapper for static dispatch of replacement policies.
pub enum ReplacementWrapper {
    Ipv(IpvPolicy),
    Mockingjay(MockingjayPolicy),
}

impl ReplacementWrapper {
    /// Builds the configured policy for the given cache.
    ///
    /// For the IPV policy the vectors come from the inline config string when
    /// present, falling back to the cache-role environment variable.
    /// Configuration errors are fatal.
    pub fn new(config: &CacheConfig) -> Self {
        match config.replacement {
            ReplacementKind::Ipv => {
                let vectors = match &config.ipv {
                    Some(spec) => IpvVectors::parse(spec),
                    None => IpvVectors::from_env(&config.name),
                };
                let vectors = vectors.unwrap_or_else(|e| {
                    eprintln!("[{}] {e}", config.name);
                    std::process::exit(1);
                });
                Self::Ipv(IpvPolicy::new(config.sets, config.ways, vectors))
            }
            ReplacementKind::Mockingjay => {
                Self::Mockingjay(MockingjayPolicy::new(config.sets, config.ways))
            }
        }
    }
}

impl Replacement for ReplacementWrapper {
    fn initialize(&mut self) {
        match self {
            Self::Ipv(p) => p.initialize(),
            Self::Mockingjay(p) => p.initialize(),
        }
    }

    fn find_victim(
        &mut self,
        cpu: u32,
        instr_id: u64,
        set: usize,
        current_set: &[CacheBlock],
        ip: u64,
        full_addr: u64,
        access: AccessType,
    ) -> usize {
        match self {
            Self::Ipv(p) => p.find_victim(cpu, instr_id, set, current_set, ip, full_addr, access),
            Self::Mockingjay(p) => {
                p.find_victim(cpu, instr_id, set, current_set, ip, full_addr, access)
            }
        }
    }

    fn update_state(
        &mut self,
        cpu: u32,
        set: usize,
        way: usize,
        full_addr: u64,
        ip: u64,
        victim_addr: u64,
        access: AccessType,
        hit: bool,
    ) {
        match self {
            Self::Ipv(p) => p.update_state(cpu, set, way, full_addr, ip, victim_addr, access, hit),
            Self::Mockingjay(p) => {
                p.update_state(cpu, set, way, full_addr, ip, victim_addr, access, hit)
            }
        }
    }

    fn final_stats(&self) {
        match self {
            Self::Ipv(p) => p.final_stats(),
            Self::Mockingjay(p) => p.final_stats(),
        }
    }
}
