//! Spatial pattern prefetcher.
//!
//! Four cooperating tables learn which blocks of an aligned region a program
//! touches and replay that footprint on the region's next activation:
//!
//! - **Filter table**: regions seen exactly once, holding the trigger offset.
//! - **Accumulate table**: active regions collecting their access pattern,
//!   touch order, and last stride.
//! - **Pattern table**: learned footprints keyed by the first two offsets;
//!   also owns the spatial-streaming confidence counter and a small deque of
//!   PCs treated as always-streaming.
//! - **Prefetch buffer**: footprints pending emission, walked in rotated
//!   order by the bounded emitter.
//!
//! A region lives in at most one of filter/accumulate at any time. Regions
//! that keep a constant stride inside the accumulate table additionally get
//! a short lookahead stride burst.

use std::collections::VecDeque;

use crate::common::fold_index;
use crate::config::LOG2_BLOCK_SIZE;
use crate::stats::EngineStats;
use crate::units::cache::AccessType;

use super::table::{AssocTable, Evicted, Recency};
use super::{metadata_with_dest, metadata_with_source, PrefetchSink, Prefetcher};

/// Spatial region size in bytes.
pub const REGION_SIZE: u64 = 4 * 1024;
/// log2 of [`REGION_SIZE`].
pub const LOG2_REGION_SIZE: u32 = REGION_SIZE.trailing_zeros();
/// Blocks per region.
pub const NUM_BLOCKS: usize = (REGION_SIZE >> LOG2_BLOCK_SIZE) as usize;

const REGION_OFFSET_MASK: u64 = (1 << (LOG2_REGION_SIZE - LOG2_BLOCK_SIZE)) - 1;
/// Region numbers are truncated to this many bits before key hashing.
const REGION_KEY_BITS: u32 = 37;

const FT_SIZE: usize = 64;
const FT_WAYS: usize = 8;
const AT_SIZE: usize = 64;
const AT_WAYS: usize = 8;
const PT_WAYS: usize = 4;
const PT_SIZE: usize = PT_WAYS * NUM_BLOCKS;
const PB_SIZE: usize = 32;
const PB_WAYS: usize = 8;

const STRIDE_LOOKAHEAD: i64 = 2;
const STRIDE_DEGREE: i64 = 4;

/// Per-block fill tag: prefetch into the first level.
pub const FILL_L1: u8 = 1;
/// Per-block fill tag: prefetch into the second level.
pub const FILL_L2: u8 = 2;

/// Saturation bound of the spatial-streaming confidence counter.
const CONFIDENCE_MAX: u32 = 8;
/// Capacity of the always-streaming PC deque.
const CONFIDENT_PCS: usize = 8;

fn region_of(block_num: u64) -> u64 {
    block_num >> (LOG2_REGION_SIZE - LOG2_BLOCK_SIZE)
}

fn offset_of(block_num: u64) -> u64 {
    block_num & REGION_OFFSET_MASK
}

fn pattern_all_set(pattern: &[bool]) -> bool {
    pattern.iter().all(|&b| b)
}

fn pattern_bool2int(pattern: &[bool]) -> Vec<u8> {
    pattern.iter().map(|&b| if b { FILL_L1 } else { 0 }).collect()
}

// ------------------------- Filter table ------------------------- //

#[derive(Clone, Debug, Default)]
struct FilterData {
    trigger_offset: u64,
    pc: u64,
}

struct FilterTable {
    table: AssocTable<FilterData>,
}

impl FilterTable {
    fn new() -> Self {
        Self { table: AssocTable::new(FT_SIZE, FT_WAYS, Recency::Srrip) }
    }

    fn key(&self, region: u64) -> u64 {
        fold_index(region & ((1 << REGION_KEY_BITS) - 1), self.table.index_len())
    }

    fn find(&mut self, region: u64) -> Option<FilterData> {
        let key = self.key(region);
        let data = self.table.find(key).cloned()?;
        self.table.promote(key);
        Some(data)
    }

    fn insert(&mut self, region: u64, trigger_offset: u64, pc: u64) {
        let key = self.key(region);
        self.table.insert(key, FilterData { trigger_offset, pc });
    }

    fn erase(&mut self, region: u64) {
        let key = self.key(region);
        self.table.erase(key);
    }

    fn contains(&self, region: u64) -> bool {
        self.table.contains(self.key(region))
    }
}

// ------------------------- Accumulate table ------------------------- //

#[derive(Clone, Debug)]
struct AccumulateData {
    trigger_offset: u64,
    second_offset: u64,
    pc: u64,
    missed_in_pt: bool,
    pattern: Vec<bool>,
    order: Vec<u32>,
    last_stride: i64,
    last_offset: u64,
    confident: bool,
    timestamp: u32,
}

impl Default for AccumulateData {
    fn default() -> Self {
        Self {
            trigger_offset: 0,
            second_offset: 0,
            pc: 0,
            missed_in_pt: false,
            pattern: vec![false; NUM_BLOCKS],
            order: vec![0; NUM_BLOCKS],
            last_stride: 0,
            last_offset: 0,
            confident: false,
            timestamp: 2,
        }
    }
}

struct AccumulateTable {
    table: AssocTable<AccumulateData>,
    stride_prefetch: bool,
}

impl AccumulateTable {
    fn new() -> Self {
        Self {
            table: AssocTable::new(AT_SIZE, AT_WAYS, Recency::Lru),
            stride_prefetch: false,
        }
    }

    fn key(&self, region: u64) -> u64 {
        fold_index(region & ((1 << REGION_KEY_BITS) - 1), self.table.index_len())
    }

    fn contains(&self, region: u64) -> bool {
        self.table.contains(self.key(region))
    }

    /// Extends the tracked pattern at `offset`; arms the stride burst when
    /// the stride repeats on a region that missed the pattern table or came
    /// from a confident streaming pattern. Returns `false` when the region
    /// is not tracked here.
    fn set_pattern(&mut self, region: u64, offset: u64) -> bool {
        let key = self.key(region);
        if !self.table.contains(key) {
            return false;
        }
        self.table.promote(key);
        let stride_prefetch = &mut self.stride_prefetch;
        let entry = self.table.find_mut(key).unwrap();
        if !entry.pattern[offset as usize] {
            entry.timestamp += 1;
            let stride = offset as i64 - entry.last_offset as i64;
            if entry.missed_in_pt || entry.confident {
                *stride_prefetch = stride == entry.last_stride;
            }
            entry.order[offset as usize] = entry.timestamp;
            entry.pattern[offset as usize] = true;
            entry.last_offset = offset;
            entry.last_stride = stride;
        }
        true
    }

    fn peek_mut(&mut self, region: u64) -> Option<&mut AccumulateData> {
        let key = self.key(region);
        self.table.find_mut(key)
    }

    #[allow(clippy::too_many_arguments)]
    fn insert(
        &mut self,
        region: u64,
        trigger_offset: u64,
        second_offset: u64,
        pc: u64,
        missed_in_pt: bool,
        confident: bool,
    ) -> Option<Evicted<AccumulateData>> {
        let key = self.key(region);
        let mut pattern = vec![false; NUM_BLOCKS];
        let mut order = vec![0u32; NUM_BLOCKS];
        pattern[trigger_offset as usize] = true;
        pattern[second_offset as usize] = true;
        order[trigger_offset as usize] = 1;
        order[second_offset as usize] = 2;

        self.table.insert(
            key,
            AccumulateData {
                trigger_offset,
                second_offset,
                pc,
                missed_in_pt,
                pattern,
                order,
                last_stride: second_offset as i64 - trigger_offset as i64,
                last_offset: second_offset,
                confident,
                timestamp: 2,
            },
        )
    }

    fn erase(&mut self, region: u64) -> Option<AccumulateData> {
        let key = self.key(region);
        self.table.erase(key)
    }
}

// ------------------------- Pattern table ------------------------- //

#[derive(Clone, Debug)]
struct PatternData {
    pattern: Vec<u8>,
    pc: u64,
    confident: bool,
}

impl Default for PatternData {
    fn default() -> Self {
        Self { pattern: vec![0; NUM_BLOCKS], pc: 0, confident: false }
    }
}

struct PatternTable {
    table: AssocTable<PatternData>,
    confident_pcs: VecDeque<u64>,
    confidence: u32,
}

impl PatternTable {
    fn new() -> Self {
        Self {
            table: AssocTable::new(PT_SIZE, PT_WAYS, Recency::Lru),
            confident_pcs: VecDeque::new(),
            confidence: 0,
        }
    }

    fn key(&self, trigger: u64, second: u64) -> u64 {
        debug_assert!(trigger < NUM_BLOCKS as u64 && second < NUM_BLOCKS as u64);
        (second << self.table.index_len()) | trigger
    }

    fn hashed_pc(pc: u64) -> u64 {
        (pc >> LOG2_BLOCK_SIZE) & 0xFF
    }

    /// Learns an evicted accumulate pattern. Spatial-streaming patterns
    /// (trigger 0, second 1) train the confidence counter and PC deque
    /// instead of occupying a table slot.
    fn insert(&mut self, trigger: u64, second: u64, pc: u64, pattern: &[bool]) {
        assert!(pattern[trigger as usize] && pattern[second as usize]);

        if trigger != 0 || second != 1 {
            let key = self.key(trigger, second);
            self.table.insert(
                key,
                PatternData { pattern: pattern_bool2int(pattern), pc, confident: false },
            );
        } else if pattern_all_set(pattern) {
            if self.confidence < CONFIDENCE_MAX {
                self.confidence += 1;
            }
            let hashed = Self::hashed_pc(pc);
            if !self.confident_pcs.contains(&hashed) {
                if self.confident_pcs.len() == CONFIDENT_PCS {
                    self.confident_pcs.pop_back();
                }
                self.confident_pcs.push_front(hashed);
            }
        } else if self.confidence > 2 {
            self.confidence >>= 1;
        } else if self.confidence > 0 {
            self.confidence -= 1;
        }
    }

    /// Looks up a footprint. The spatial-streaming case synthesizes one from
    /// the confidence state instead of reading the table: a saturated counter
    /// or a remembered PC yields L1 fills for the first quarter of the region
    /// and L2 fills for the rest; a counter of at least 3 yields L2 fills for
    /// the first quarter only.
    fn find(&self, trigger: u64, second: u64, pc: u64) -> Option<PatternData> {
        if trigger != 0 || second != 1 {
            let key = self.key(trigger, second);
            return self.table.find(key).cloned();
        }

        let hashed = Self::hashed_pc(pc);
        if self.confidence == CONFIDENCE_MAX || self.confident_pcs.contains(&hashed) {
            let mut data = PatternData { confident: true, ..Default::default() };
            for i in 0..NUM_BLOCKS / 4 {
                data.pattern[i] = FILL_L1;
            }
            for i in NUM_BLOCKS / 4..NUM_BLOCKS {
                data.pattern[i] = FILL_L2;
            }
            Some(data)
        } else if self.confidence > 2 {
            let mut data = PatternData { confident: true, ..Default::default() };
            for i in 0..NUM_BLOCKS / 4 {
                data.pattern[i] = FILL_L2;
            }
            Some(data)
        } else {
            None
        }
    }
}

// ------------------------- Prefetch buffer ------------------------- //

/// Emission reasons carried in the low metadata bits.
mod reason {
    pub const STRIDE: u32 = 0;
    pub const PATTERN: u32 = 1;
    pub const STREAMING: u32 = 2;
    pub const PROMOTED: u32 = 3;
}

#[derive(Clone, Debug)]
struct BufferData {
    pattern: Vec<u8>,
    trigger: u64,
    second: u64,
    metadata: Vec<u32>,
}

impl Default for BufferData {
    fn default() -> Self {
        Self {
            pattern: vec![0; NUM_BLOCKS],
            trigger: 0,
            second: 0,
            metadata: vec![0; NUM_BLOCKS],
        }
    }
}

/// Outcome of one emit round.
enum EmitOutcome {
    /// All pending offsets were walked and the entry was erased.
    Drained,
    /// Queue or MSHR capacity ran out; the entry stays for a retry.
    BackPressure,
    /// No buffered footprint for this region.
    Idle,
}

struct PrefetchBuffer {
    table: AssocTable<BufferData>,
}

impl PrefetchBuffer {
    fn new() -> Self {
        Self { table: AssocTable::new(PB_SIZE, PB_WAYS, Recency::Lru) }
    }

    fn insert(&mut self, region: u64, pattern: Vec<u8>, trigger: u64, second: u64, meta: u32) {
        // Stride bursts and promoted stride bursts merge into an existing
        // footprint, upgrading blocks to L1 fills; learned footprints replace.
        if meta & 3 == reason::STRIDE || meta & 3 == reason::PROMOTED {
            match self.table.find_mut(region) {
                None => {
                    self.table.insert(
                        region,
                        BufferData {
                            pattern,
                            trigger,
                            second: trigger,
                            metadata: vec![meta; NUM_BLOCKS],
                        },
                    );
                }
                Some(entry) => {
                    for i in 0..NUM_BLOCKS {
                        if pattern[i] == FILL_L1 {
                            if entry.pattern[i] != FILL_L1 && entry.metadata[i] == reason::STREAMING
                            {
                                entry.metadata[i] = reason::PROMOTED;
                            }
                            entry.pattern[i] = FILL_L1;
                        }
                    }
                    self.table.promote(region);
                }
            }
        } else {
            self.table.insert(
                region,
                BufferData { pattern, trigger, second, metadata: vec![meta; NUM_BLOCKS] },
            );
        }
    }

    /// Walks the buffered footprint for the accessed region in rotated order
    /// starting after the current offset, skipping the two seed offsets, and
    /// issues one prefetch per pending block while queue capacity lasts.
    fn emit(
        &mut self,
        sink: &mut dyn PrefetchSink,
        block_num: u64,
        issued: &mut u64,
    ) -> EmitOutcome {
        let region_offset = offset_of(block_num) as usize;
        let region = region_of(block_num);
        if !self.table.contains(region) {
            return EmitOutcome::Idle;
        }
        self.table.promote(region);

        let entry = self.table.find_mut(region).unwrap();
        entry.pattern[region_offset] = 0;
        let trigger = entry.trigger as usize;
        let second = entry.second as usize;

        for i in 1..NUM_BLOCKS {
            let pf_offset = (region_offset + i) % NUM_BLOCKS;
            let fill = entry.pattern[pf_offset];
            if pf_offset == trigger || pf_offset == second || fill == 0 {
                continue;
            }

            // Per-request capacity check; bail out without erasing the entry
            // so the remaining offsets retry on the next access.
            let pq_occ = sink.pq_occupancy();
            if !(pq_occ + sink.mshr_occupancy() < sink.mshr_size() - 1 && pq_occ < sink.pq_size())
            {
                return EmitOutcome::BackPressure;
            }

            let pf_addr =
                (region << LOG2_REGION_SIZE) + ((pf_offset as u64) << LOG2_BLOCK_SIZE);
            let mut meta = entry.metadata[pf_offset];
            meta = metadata_with_source(meta, 1);
            meta = metadata_with_dest(meta, if fill == FILL_L1 { 1 } else { 2 });

            if sink.prefetch_line(pf_addr, fill == FILL_L1, meta) {
                *issued += 1;
                entry.pattern[pf_offset] = 0;
            }
        }

        self.table.erase(region);
        EmitOutcome::Drained
    }
}

// ------------------------- Prefetcher driver ------------------------- //

/// The spatial prefetcher tying the four tables together.
pub struct SpatialPrefetcher {
    ft: FilterTable,
    at: AccumulateTable,
    pt: PatternTable,
    pb: PrefetchBuffer,

    issued: u64,
    deferred: u64,
    pattern_hits: u64,
    stride_bursts: u64,
}

impl SpatialPrefetcher {
    pub fn new() -> Self {
        Self {
            ft: FilterTable::new(),
            at: AccumulateTable::new(),
            pt: PatternTable::new(),
            pb: PrefetchBuffer::new(),
            issued: 0,
            deferred: 0,
            pattern_hits: 0,
            stride_bursts: 0,
        }
    }

    /// True when `region` is tracked by the filter table.
    pub fn in_filter(&self, region: u64) -> bool {
        self.ft.contains(region)
    }

    /// True when `region` is tracked by the accumulate table.
    pub fn in_accumulate(&self, region: u64) -> bool {
        self.at.contains(region)
    }

    /// Observes one demand block access and updates the table machinery.
    pub fn access(&mut self, block_num: u64, pc: u64) {
        let region = region_of(block_num);
        let region_offset = offset_of(block_num);

        if self.at.set_pattern(region, region_offset) {
            // Region already accumulating. A repeated stride emits a short
            // lookahead burst and disarms itself.
            if self.at.stride_prefetch {
                let (stride, begin_offset, missed_in_pt, confident, acc_pattern) = {
                    let entry = self.at.peek_mut(region).unwrap();
                    let stride = entry.last_stride;
                    let begin = entry.last_offset as i64;
                    entry.last_offset = 0;
                    entry.last_stride = 0;
                    (stride, begin, entry.missed_in_pt, entry.confident, entry.pattern.clone())
                };

                let mut pattern = vec![0u8; NUM_BLOCKS];
                for i in 1..=STRIDE_DEGREE {
                    let target = begin_offset + (i + STRIDE_LOOKAHEAD) * stride;
                    if (0..NUM_BLOCKS as i64).contains(&target) && !acc_pattern[target as usize] {
                        pattern[target as usize] = FILL_L1;
                    }
                }

                if missed_in_pt {
                    self.pb.insert(
                        region,
                        pattern,
                        begin_offset as u64,
                        begin_offset as u64,
                        reason::STRIDE,
                    );
                    self.stride_bursts += 1;
                } else if confident {
                    self.pb.insert(
                        region,
                        pattern,
                        begin_offset as u64,
                        begin_offset as u64,
                        reason::PROMOTED,
                    );
                    self.stride_bursts += 1;
                }
                self.at.stride_prefetch = false;
            }
            return;
        }

        match self.ft.find(region) {
            None => {
                self.ft.insert(region, region_offset, pc);
            }
            Some(ft_entry) if ft_entry.trigger_offset != region_offset => {
                // Second distinct touch: consult the pattern table, arm the
                // prefetch buffer, and move the region into accumulation.
                let trigger = ft_entry.trigger_offset;
                let pt_entry = self.pt.find(trigger, region_offset, pc);
                let pattern_empty = match &pt_entry {
                    None => true,
                    Some(p) => p.pattern.iter().filter(|&&x| x != 0).count() == 2,
                };

                if !pattern_empty {
                    let p = pt_entry.as_ref().unwrap();
                    self.pattern_hits += 1;
                    let meta = if p.confident { reason::STREAMING } else { reason::PATTERN };
                    self.pb.insert(region, p.pattern.clone(), trigger, region_offset, meta);
                }

                let confident = !pattern_empty && pt_entry.as_ref().is_some_and(|p| p.confident);
                let at_victim = self.at.insert(
                    region,
                    trigger,
                    region_offset,
                    ft_entry.pc,
                    pattern_empty,
                    confident,
                );
                self.ft.erase(region);
                if let Some(victim) = at_victim {
                    let data = victim.data;
                    self.pt.insert(data.trigger_offset, data.second_offset, data.pc, &data.pattern);
                }
            }
            Some(_) => {} // re-touch of the trigger offset
        }
    }

    /// Handles a block leaving the cache: the region's accumulated pattern
    /// (if any) is promoted into the pattern table.
    pub fn evict(&mut self, block_num: u64) {
        let region = region_of(block_num);
        self.ft.erase(region);
        if let Some(data) = self.at.erase(region) {
            self.pt.insert(data.trigger_offset, data.second_offset, data.pc, &data.pattern);
        }
    }

    /// Drains the prefetch buffer entry for the accessed region.
    pub fn emit(&mut self, sink: &mut dyn PrefetchSink, block_num: u64) {
        if let EmitOutcome::BackPressure = self.pb.emit(sink, block_num, &mut self.issued) {
            self.deferred += 1;
        }
    }
}

impl Default for SpatialPrefetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Prefetcher for SpatialPrefetcher {
    fn initialize(&mut self) {
        self.ft.table.flush();
        self.at.table.flush();
        self.pt.table.flush();
        self.pb.table.flush();
        self.pt.confident_pcs.clear();
        self.pt.confidence = 0;
        self.at.stride_prefetch = false;
    }

    fn cache_operate(
        &mut self,
        addr: u64,
        ip: u64,
        _cache_hit: bool,
        _useful_prefetch: bool,
        access: AccessType,
        metadata_in: u32,
        sink: &mut dyn PrefetchSink,
    ) -> u32 {
        if access != AccessType::Load {
            return metadata_in;
        }
        let block_num = addr >> LOG2_BLOCK_SIZE;
        self.access(block_num, ip);
        self.emit(sink, block_num);
        metadata_in
    }

    fn cache_fill(
        &mut self,
        _addr: u64,
        _set: usize,
        _way: usize,
        _was_prefetch: bool,
        evicted_addr: u64,
        metadata_in: u32,
    ) -> u32 {
        if evicted_addr != 0 {
            self.evict(evicted_addr >> LOG2_BLOCK_SIZE);
        }
        metadata_in
    }

    fn collect(&self, stats: &mut EngineStats) {
        stats.prefetches_issued += self.issued;
        stats.prefetches_deferred += self.deferred;
        stats.pattern_hits += self.pattern_hits;
        stats.stride_bursts += self.stride_bursts;
    }
}
