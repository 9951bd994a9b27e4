//! Synthetic-trace host harness.
//!
//! Stands in for the external simulator: generates a deterministic stream of
//! branch and memory records, owns one predictor, one prefetcher (with a
//! small queue model), and one replacement policy over a tag-only cache, and
//! drives them through the module contracts while collecting statistics.

use crate::common::Xorshift;
use crate::config::{Config, LOG2_BLOCK_SIZE};
use crate::stats::EngineStats;
use crate::units::bru::{BranchKind, ConditionalPredictor, PredictorWrapper};
use crate::units::cache::{AccessType, CacheBlock, Replacement, ReplacementWrapper};
use crate::units::prefetch::{PrefetchSink, Prefetcher, PrefetcherWrapper};

/// One record of the synthetic trace.
#[derive(Clone, Copy, Debug)]
pub enum TraceRecord {
    Branch { ip: u64, target: u64, taken: bool, kind: BranchKind },
    Memory { address: u64, ip: u64, write: bool },
}

/// Deterministic trace generator mixing loop branches, biased branches, and
/// strided memory walks.
pub struct TraceGenerator {
    rng: Xorshift,
    loop_counters: [u64; 4],
    stride_cursor: u64,
    stream_cursor: u64,
}

impl TraceGenerator {
    pub fn new() -> Self {
        Self {
            rng: Xorshift::new(),
            loop_counters: [0; 4],
            stride_cursor: 0x10_0000,
            stream_cursor: 0x80_0000,
        }
    }

    /// Produces the next trace record.
    pub fn next_record(&mut self) -> TraceRecord {
        let roll = self.rng.next() % 100;
        match roll {
            // Loop branches with fixed trip counts.
            0..=24 => {
                let which = (self.rng.next() % 4) as usize;
                let trip = 8 + 8 * which as u64;
                let ip = 0x40_1000 + 0x40 * which as u64;
                self.loop_counters[which] += 1;
                let taken = self.loop_counters[which] % trip != 0;
                TraceRecord::Branch { ip, target: ip - 0x20, taken, kind: BranchKind::Conditional }
            }
            // Strongly biased conditional branches.
            25..=49 => {
                let ip = 0x40_2000 + 0x10 * (self.rng.next() % 32);
                let taken = self.rng.next() % 8 != 0;
                TraceRecord::Branch { ip, target: ip + 0x80, taken, kind: BranchKind::Conditional }
            }
            // Hard, near-random conditional branches.
            50..=59 => {
                let ip = 0x40_3000 + 0x10 * (self.rng.next() % 4);
                let taken = self.rng.next() % 2 == 0;
                TraceRecord::Branch { ip, target: ip + 0x100, taken, kind: BranchKind::Conditional }
            }
            // Occasional calls and returns.
            60..=64 => {
                let ip = 0x40_4000 + 0x10 * (self.rng.next() % 8);
                let kind = if roll % 2 == 0 { BranchKind::DirectCall } else { BranchKind::Return };
                TraceRecord::Branch { ip, target: ip + 0x1000, taken: true, kind }
            }
            // Strided array walk, one region at a time.
            65..=84 => {
                self.stride_cursor += 2 << LOG2_BLOCK_SIZE;
                TraceRecord::Memory { address: self.stride_cursor, ip: 0x41_0000, write: false }
            }
            // Dense streaming walk.
            85..=94 => {
                self.stream_cursor += 1 << LOG2_BLOCK_SIZE;
                TraceRecord::Memory { address: self.stream_cursor, ip: 0x41_1000, write: false }
            }
            // Scattered writes.
            _ => {
                let address = 0xC0_0000 + ((self.rng.next() % 4096) << LOG2_BLOCK_SIZE);
                TraceRecord::Memory { address, ip: 0x41_2000, write: true }
            }
        }
    }
}

impl Default for TraceGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// A prefetch-queue/MSHR occupancy model that drains a little every access.
pub struct QueueModel {
    pq_occupancy: usize,
    pq_size: usize,
    mshr_occupancy: usize,
    mshr_size: usize,
    /// Addresses accepted from the prefetcher, newest last.
    pub issued: Vec<(u64, bool, u32)>,
}

impl QueueModel {
    pub fn new(pq_size: usize, mshr_size: usize) -> Self {
        Self { pq_occupancy: 0, pq_size, mshr_occupancy: 0, mshr_size, issued: Vec::new() }
    }

    /// Retires one queued request per call, modeling service bandwidth.
    pub fn drain(&mut self) {
        self.pq_occupancy = self.pq_occupancy.saturating_sub(1);
        self.mshr_occupancy = self.mshr_occupancy.saturating_sub(1);
    }
}

impl PrefetchSink for QueueModel {
    fn prefetch_line(&mut self, addr: u64, fill_this_level: bool, metadata: u32) -> bool {
        if self.pq_occupancy >= self.pq_size {
            return false;
        }
        self.pq_occupancy += 1;
        self.mshr_occupancy = (self.mshr_occupancy + 1).min(self.mshr_size);
        self.issued.push((addr, fill_this_level, metadata));
        true
    }

    fn pq_occupancy(&self) -> usize {
        self.pq_occupancy
    }

    fn pq_size(&self) -> usize {
        self.pq_size
    }

    fn mshr_occupancy(&self) -> usize {
        self.mshr_occupancy
    }

    fn mshr_size(&self) -> usize {
        self.mshr_size
    }
}

/// The host: one of each engine kind plus a tag-only cache model.
pub struct Host {
    predictor: PredictorWrapper,
    prefetcher: PrefetcherWrapper,
    replacement: ReplacementWrapper,
    queues: QueueModel,

    sets: usize,
    ways: usize,
    tags: Vec<Vec<CacheBlock>>,

    instr_id: u64,
    stats: EngineStats,
}

impl Host {
    pub fn new(config: &Config) -> Self {
        let sets = config.cache.sets;
        let ways = config.cache.ways;
        let mut predictor = PredictorWrapper::new(config);
        let mut prefetcher = PrefetcherWrapper::new(config);
        let mut replacement = ReplacementWrapper::new(&config.cache);
        predictor.initialize();
        prefetcher.initialize();
        replacement.initialize();

        Self {
            predictor,
            prefetcher,
            replacement,
            queues: QueueModel::new(config.queues.pq_size, config.queues.mshr_size),
            sets,
            ways,
            tags: vec![vec![CacheBlock::default(); ways]; sets],
            instr_id: 0,
            stats: EngineStats::default(),
        }
    }

    /// Drives one trace record through the engines.
    pub fn step(&mut self, record: TraceRecord) {
        self.instr_id += 1;
        self.queues.drain();

        match record {
            TraceRecord::Branch { ip, target, taken, kind } => {
                if kind.is_conditional() {
                    self.predictor.predict(ip);
                }
                self.predictor.last_branch_result(ip, target, taken, kind);
            }
            TraceRecord::Memory { address, ip, write } => {
                self.access_cache(address, ip, write);
            }
        }
    }

    fn access_cache(&mut self, address: u64, ip: u64, write: bool) {
        let block = address >> LOG2_BLOCK_SIZE;
        let set = (block as usize) & (self.sets - 1);
        let access = if write { AccessType::Write } else { AccessType::Load };

        let hit_way = self.tags[set]
            .iter()
            .position(|b| b.valid && b.address == block << LOG2_BLOCK_SIZE);

        self.prefetcher.cache_operate(
            address,
            ip,
            hit_way.is_some(),
            false,
            access,
            0,
            &mut self.queues,
        );

        match hit_way {
            Some(way) => {
                self.stats.promotions += 1;
                self.replacement.update_state(0, set, way, address, ip, 0, access, true);
            }
            None => {
                let way = self.replacement.find_victim(
                    0,
                    self.instr_id,
                    set,
                    &self.tags[set],
                    ip,
                    address,
                    access,
                );
                self.stats.victims += 1;
                let victim = self.tags[set][way];
                let victim_addr = if victim.valid { victim.address } else { 0 };
                self.tags[set][way] =
                    CacheBlock { valid: true, address: block << LOG2_BLOCK_SIZE };
                self.stats.fills += 1;
                self.replacement
                    .update_state(0, set, way, address, ip, victim_addr, access, false);
                self.prefetcher.cache_fill(address, set, way, false, victim_addr, 0);
            }
        }
    }

    /// Runs `records` synthetic trace records.
    pub fn run(&mut self, records: u64) {
        let mut generator = TraceGenerator::new();
        for _ in 0..records {
            let record = generator.next_record();
            self.step(record);
        }
    }

    /// Gathers statistics from every engine and returns the totals.
    pub fn finish(mut self) -> EngineStats {
        self.predictor.collect(&mut self.stats);
        self.prefetcher.collect(&mut self.stats);
        self.predictor.final_stats();
        self.prefetcher.final_stats();
        self.replacement.final_stats();
        self.stats
    }
}
