//! Configuration error definitions.
//!
//! Configuration problems are surfaced at init as [`EngineError`] values and
//! are fatal to the host. Protocol violations (an update without a matching
//! prediction checkpoint) indicate a host bug and panic with a descriptive
//! message instead; resource saturation is silent and never escapes the core.

use std::fmt;

/// Errors raised while building engines from configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineError {
    /// An IPV string did not contain the `#` separator or held a token that
    /// is not an unsigned integer. The payload is the offending string.
    MalformedIpv(String),

    /// The demand and prefetch IPVs have different lengths.
    IpvLengthMismatch { demand: usize, prefetch: usize },

    /// An IPV entry names an RRPV state outside `[0, len - 1]`.
    IpvValueOutOfRange { value: u32, len: usize },

    /// No IPV was supplied for a cache that asked for the IPV policy.
    /// The payload is the environment variable that was consulted.
    MissingIpv(String),

    /// A cache name matched none of the known roles (`L1I`, `L1D`, `L2C`,
    /// `LLC`).
    UnknownCacheRole(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::MalformedIpv(s) => {
                write!(f, "malformed IPV specification {s:?}: expected \"<demand-ints>#<prefetch-ints>\"")
            }
            EngineError::IpvLengthMismatch { demand, prefetch } => {
                write!(f, "IPV length mismatch: demand has {demand} entries, prefetch has {prefetch}")
            }
            EngineError::IpvValueOutOfRange { value, len } => {
                write!(f, "IPV value {value} out of range: RRPV states must lie in [0, {}]", len - 1)
            }
            EngineError::MissingIpv(var) => {
                write!(f, "no IPV specified: environment variable {var} is unset")
            }
            EngineError::UnknownCacheRole(name) => {
                write!(f, "could not infer cache role from name {name:?}")
            }
        }
    }
}

impl std::error::Error for EngineError {}
