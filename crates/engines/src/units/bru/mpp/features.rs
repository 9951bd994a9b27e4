//! Multiperspective feature specifications.
//!
//! Each feature names a history flavor and up to six integer parameters;
//! the flags select extra tuned hash passes. The feature list itself is
//! tuned data and is treated as immutable.

/// History flavors a feature can draw from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeatureKind {
    /// Last outcome of each PC class, indexed by `pc % (p1 + 2)`.
    Acyclic,
    /// History shifted only when `hashed_pc % (p1 + 2) == 0`.
    ModHist,
    /// Per-branch bias.
    Bias,
    /// Hash of a recency stack of PCs.
    Recency,
    /// Innermost-loop iteration counter `p1`.
    Imli,
    /// Path history.
    Path,
    /// Per-branch local history window `[p1, p2)`.
    Local,
    /// Like [`ModHist`](Self::ModHist) but over path history.
    ModPath,
    /// Path history interleaved with global history.
    GhistPath,
    /// Modulo path history interleaved with modulo history.
    GhistModPath,
    /// Coarse "page" history at scale `p1`.
    BlurryPath,
    /// Position of this PC in the recency stack.
    RecencyPos,
    /// Hashed history of backward branches.
    BackPath,
    /// Combined backward path and backward global history.
    BackGhistPath,
    /// Prediction and confidence class imported from TAGE-SC-L.
    Tage,
}

/// Extra hash pass selectors carried in [`FeatureSpec::xorflags`].
pub const XOR_HASH1: u32 = 8;
pub const XOR_HASH2: u32 = 16;
pub const XOR_HASH3: u32 = 32;

/// One feature of the hashed perceptron.
#[derive(Clone, Copy, Debug)]
pub struct FeatureSpec {
    pub kind: FeatureKind,
    pub p1: i32,
    pub p2: i32,
    pub p3: i32,
    pub p4: i32,
    pub p5: i32,
    pub p6: i32,
    pub xorflags: u32,
}

const fn spec(
    kind: FeatureKind,
    p1: i32,
    p2: i32,
    p3: i32,
    p4: i32,
    p5: i32,
    p6: i32,
    xorflags: u32,
) -> FeatureSpec {
    FeatureSpec { kind, p1, p2, p3, p4, p5, p6, xorflags }
}

/// The tuned 33-feature set.
#[rustfmt::skip]
pub static TUNED_FEATURES: [FeatureSpec; 33] = [
    spec(FeatureKind::Local,        23, 27,  0,  0,  0, 0, 16),
    spec(FeatureKind::Acyclic,      10, -1, -1, -1, -1, 0,  0),
    spec(FeatureKind::Tage,         11,  9,  0,  0, -1, 0,  8),
    spec(FeatureKind::ModHist,       5, 17, -1, -1, -1, 0,  8),
    spec(FeatureKind::Acyclic,       9, -1, -1, -1, -1, 0,  0),

    spec(FeatureKind::Local,         3, 34,  0,  0,  0, 0,  8),
    spec(FeatureKind::Local,         0, 13,  0,  0,  0, 0,  0),
    spec(FeatureKind::GhistPath,     1, 16,  0,  0,  0, 0, 16),
    spec(FeatureKind::GhistModPath,  4,  8,  5, -1, -1, 0,  8),
    spec(FeatureKind::GhistModPath,  5,  5,  2, -1, -1, 0, 16),

    spec(FeatureKind::RecencyPos,   56,  0, -1, -1, -1, 0,  0),
    spec(FeatureKind::Local,        10, 32,  0,  0,  0, 0,  0),
    spec(FeatureKind::GhistPath,    29, 41,  8,  6,  0, 0,  0),
    spec(FeatureKind::GhistPath,     1, 22,  6,  8,  0, 0, 16),
    spec(FeatureKind::Imli,          4, -1, -1, -1, -1, 0, 16),

    spec(FeatureKind::Local,         0,  9,  0,  0,  0, 0,  0),
    spec(FeatureKind::GhistModPath,  2, 16,  6, -1, -1, 0,  0),
    spec(FeatureKind::Local,         0, 20,  0,  0,  0, 0,  8),
    spec(FeatureKind::GhistPath,     0,  9,  3,  0,  0, 0,  8),
    spec(FeatureKind::GhistModPath,  0, 19,  5, -1, -1, 0, 16),

    spec(FeatureKind::ModPath,       1, 20,  1, -1, -1, 0,  8),
    spec(FeatureKind::ModHist,       3, 22, -1, -1, -1, 0,  0),
    spec(FeatureKind::GhistModPath,  1,  7,  1, -1, -1, 0,  8),
    spec(FeatureKind::Local,         0,  1,  0,  0,  0, 0,  0),
    spec(FeatureKind::ModPath,       3,  9,  4, -1, -1, 0,  8),

    spec(FeatureKind::GhistModPath,  3, 14,  6, -1, -1, 0, 16),
    spec(FeatureKind::BlurryPath,   11,  9,  2, -1, -1, 0,  8),
    spec(FeatureKind::Recency,      10,  1, -1, -1, -1, 0,  8),
    spec(FeatureKind::Local,         0,  5,  0,  0,  0, 0,  8),
    spec(FeatureKind::GhistPath,    22, 33,  6,  8,  0, 0, 16),

    spec(FeatureKind::ModPath,       1, 26,  3, -1, -1, 0,  8),
    spec(FeatureKind::GhistModPath,  5, 14,  1, -1, -1, 0,  8),
    spec(FeatureKind::BackPath,     22,  6,  0,  0,  0, 0,  8),
];

/// Transfer table mapping a 6-bit MPP weight to its vote magnitude along an
/// inverse-sigmoidal curve.
#[rustfmt::skip]
pub static MPP_TRANSFER: [i32; 63] = [
    -255, -217, -192, -171, -155, -142, -130, -120, -110, -102, -94, -87, -81,
    -74, -68, -62, -56, -50, -46, -41, -37, -34, -30, -27, -24, -20, -17, -14,
    -11, -8, -5, 2, 5, 8, 11, 14, 17, 20, 24, 27, 30, 34, 37, 41, 46, 50, 56,
    62, 68, 74, 81, 87, 94, 102, 110, 120, 130, 142, 155, 171, 192, 217, 255,
];
