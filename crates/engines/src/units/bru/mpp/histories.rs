//! History structures for the multiperspective perceptron.
//!
//! All history flavors live in one struct: multi-word global and
//! backward-global histories, path and backward-path histories, per-branch
//! local histories, modulo pattern/path histories, acyclic last-outcome
//! arrays, a recency stack of hashed PCs, blurry "page" histories, and four
//! styles of innermost-loop iteration counter.

/// Longest supported path history.
pub const MAX_PATH_HIST: usize = 512;
/// Longest supported global history.
pub const MAX_GHIST: usize = 512;
/// Largest modulus for modulo histories.
pub const MAX_MOD: usize = 10;
/// Number of acyclic history arrays.
pub const MAX_ACYCLIC: usize = 20;
/// Number of blurry-path scales.
pub const MAX_BLURRY: usize = 16;
/// Words per blurry history.
pub const MAX_BLURRY2: usize = 16;
/// Words in a multi-word history vector.
pub const GHIST_WORDS: usize = 1 + MAX_GHIST / 64;
/// Words in a per-branch local history.
pub const LOCAL_WORDS: usize = 4;

/// The complete history state.
#[derive(Clone)]
pub struct MppHistories {
    pub imli_counter: [u32; 4],
    pub global_hist: [u64; GHIST_WORDS],
    pub backglobal_hist: [u64; GHIST_WORDS],
    pub back_path: Vec<u16>,
    pub acyclic_histories: Vec<[bool; 32]>,
    pub local_histories: Vec<[u64; LOCAL_WORDS]>,
    pub mod_histories: Vec<Vec<bool>>,
    pub modpath_histories: Vec<Vec<u16>>,
    pub recency_stack: Vec<u16>,
    pub path_history: Vec<u16>,
    pub blurrypath_histories: Vec<[u32; MAX_BLURRY2]>,
}

impl MppHistories {
    pub fn new(nlocal_histories: usize, assoc: usize) -> Self {
        Self {
            imli_counter: [0; 4],
            global_hist: [0; GHIST_WORDS],
            backglobal_hist: [0; GHIST_WORDS],
            back_path: vec![0; MAX_PATH_HIST],
            acyclic_histories: vec![[false; 32]; MAX_ACYCLIC],
            local_histories: vec![[0; LOCAL_WORDS]; nlocal_histories],
            mod_histories: vec![vec![false; MAX_GHIST]; MAX_MOD],
            modpath_histories: vec![vec![0; MAX_PATH_HIST]; MAX_MOD],
            recency_stack: vec![0; assoc.max(1)],
            path_history: vec![0; MAX_PATH_HIST],
            blurrypath_histories: vec![[0; MAX_BLURRY2]; MAX_BLURRY],
        }
    }

    /// Inserts a hashed PC at the top of the recency stack with LRU motion.
    pub fn insert_recency(&mut self, pc2: u16) {
        let assoc = self.recency_stack.len();
        let mut at = assoc - 1;
        for (i, slot) in self.recency_stack.iter().enumerate() {
            if *slot == pc2 {
                at = i;
                break;
            }
        }
        if at == assoc - 1 {
            self.recency_stack[at] = pc2;
        }
        let found = self.recency_stack[at];
        for j in (1..=at).rev() {
            self.recency_stack[j] = self.recency_stack[j - 1];
        }
        self.recency_stack[0] = found;
    }
}

/// Shifts one outcome into a multi-word history of `length` bits.
pub fn shift_hist(hist: &mut [u64], length: usize, taken: bool) {
    let top = ((length / 64) + 1).min(hist.len() - 1);
    for i in (1..=top).rev() {
        hist[i] = (hist[i] << 1) | (hist[i - 1] >> 63);
    }
    hist[0] = (hist[0] << 1) | taken as u64;
}

/// Extracts bits `[a, b)` from a multi-word vector.
pub fn extract_bits(v: &[u64], a: usize, b: usize) -> u64 {
    if a >= b || b == 0 {
        return 0;
    }
    let i = a / 64;
    if i != (b - 1) / 64 {
        // Straddles a word boundary: combine the two aligned pieces.
        let c0 = (a | 63) + 1;
        let w1 = extract_bits(v, a, c0);
        let w2 = extract_bits(v, c0, b);
        w2.checked_shl((c0 - a) as u32).unwrap_or(0) | w1
    } else {
        let bits = b - a;
        let s = a & 63;
        let mask = if bits >= 64 { !0u64 } else { (1u64 << bits) - 1 };
        (v[i] >> s) & mask
    }
}

/// Folds bits `[start, end]` of a multi-word vector into `bits`-wide chunks
/// by repeated addition.
pub fn fold_hist(hist: &[u64], start: i32, end: i32, bits: usize) -> u64 {
    if start > end || start < 0 || end < 0 {
        return 0;
    }
    let a = start as usize;
    let b = end as usize + 1;
    if b - a < bits {
        return extract_bits(hist, a, b);
    }
    let mut x = 0u64;
    let mut j = a;
    let j2 = b - bits;
    while j < j2 {
        x = x.wrapping_add(extract_bits(hist, j, j + bits));
        j += bits;
    }
    if j < b {
        x = x.wrapping_add(extract_bits(hist, j, b));
    }
    x
}
