//! Fixed-capacity set-associative tables.
//!
//! The prefetcher's four tables share this container: keys are split into a
//! set index (low `index_len` bits) and a tag, each set holds `ways` slots,
//! and the recency policy chosen at construction decides the victim when a
//! full set takes a new key. Recency state moves only through
//! [`promote`](AssocTable::promote) and insertion, mirroring how the tables
//! call their recency hooks explicitly.

/// Recency policy for one [`AssocTable`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Recency {
    /// Evict the least recently promoted slot.
    Lru,
    /// Static RRIP: insert at RRPV 2, promote to 0, evict at 3 after aging.
    Srrip,
}

const SRRIP_MAX: u8 = 3;
const SRRIP_INSERT: u8 = 2;

#[derive(Clone, Debug)]
struct Slot<T> {
    valid: bool,
    tag: u64,
    data: T,
    stamp: u64,
    rrpv: u8,
}

/// One evicted entry, returned to the caller for cross-table spills.
#[derive(Clone, Debug)]
pub struct Evicted<T> {
    pub key: u64,
    pub data: T,
}

/// A fixed-capacity associative table mapping keys to `T`.
pub struct AssocTable<T> {
    num_sets: usize,
    num_ways: usize,
    index_len: u32,
    recency: Recency,
    sets: Vec<Vec<Slot<T>>>,
    tick: u64,
}

impl<T: Clone + Default> AssocTable<T> {
    /// Creates a table of `size` entries split into `size / ways` sets.
    pub fn new(size: usize, ways: usize, recency: Recency) -> Self {
        assert!(size % ways == 0, "table size must be a multiple of associativity");
        let num_sets = size / ways;
        let mut index_len = 0;
        let mut max_index = num_sets.saturating_sub(1);
        while max_index > 0 {
            index_len += 1;
            max_index >>= 1;
        }
        Self {
            num_sets,
            num_ways: ways,
            index_len,
            recency,
            sets: vec![
                vec![
                    Slot { valid: false, tag: 0, data: T::default(), stamp: 0, rrpv: 0 };
                    ways
                ];
                num_sets
            ],
            tick: 1,
        }
    }

    /// Number of set-index bits; table keys fold their payload into this.
    pub fn index_len(&self) -> u32 {
        self.index_len
    }

    fn split(&self, key: u64) -> (usize, u64) {
        let index = (key & ((1u64 << self.index_len) - 1)) as usize % self.num_sets;
        (index, key >> self.index_len)
    }

    fn way_of(&self, key: u64) -> Option<usize> {
        let (index, tag) = self.split(key);
        self.sets[index]
            .iter()
            .position(|slot| slot.valid && slot.tag == tag)
    }

    /// Looks up `key` without touching recency state.
    pub fn find(&self, key: u64) -> Option<&T> {
        let (index, _) = self.split(key);
        let way = self.way_of(key)?;
        Some(&self.sets[index][way].data)
    }

    /// Mutable lookup without touching recency state.
    pub fn find_mut(&mut self, key: u64) -> Option<&mut T> {
        let (index, _) = self.split(key);
        let way = self.way_of(key)?;
        Some(&mut self.sets[index][way].data)
    }

    /// Marks `key` most recently used (LRU) or most imminent (SRRIP).
    pub fn promote(&mut self, key: u64) {
        let (index, _) = self.split(key);
        if let Some(way) = self.way_of(key) {
            let tick = self.next_tick();
            let slot = &mut self.sets[index][way];
            match self.recency {
                Recency::Lru => slot.stamp = tick,
                Recency::Srrip => slot.rrpv = 0,
            }
        }
    }

    fn next_tick(&mut self) -> u64 {
        let t = self.tick;
        self.tick += 1;
        t
    }

    fn select_victim(&mut self, index: usize) -> usize {
        match self.recency {
            Recency::Lru => self.sets[index]
                .iter()
                .enumerate()
                .min_by_key(|(_, slot)| slot.stamp)
                .map(|(way, _)| way)
                .unwrap(),
            Recency::Srrip => loop {
                if let Some(way) = self.sets[index].iter().position(|s| s.rrpv >= SRRIP_MAX) {
                    break way;
                }
                for slot in &mut self.sets[index] {
                    slot.rrpv = (slot.rrpv + 1).min(SRRIP_MAX);
                }
            },
        }
    }

    /// Installs `key -> data`, returning the displaced valid entry if the
    /// chosen victim held one. An existing entry for `key` is overwritten in
    /// place (its prior state is returned) and made most recent.
    pub fn insert(&mut self, key: u64, data: T) -> Option<Evicted<T>> {
        let (index, tag) = self.split(key);

        if let Some(way) = self.way_of(key) {
            let tick = self.next_tick();
            let slot = &mut self.sets[index][way];
            let old = slot.data.clone();
            slot.data = data;
            match self.recency {
                Recency::Lru => slot.stamp = tick,
                Recency::Srrip => slot.rrpv = SRRIP_INSERT,
            }
            return Some(Evicted { key, data: old });
        }

        let way = self.sets[index]
            .iter()
            .position(|slot| !slot.valid)
            .unwrap_or_else(|| self.select_victim(index));

        let tick = self.next_tick();
        let slot = &mut self.sets[index][way];
        let evicted = if slot.valid {
            Some(Evicted {
                key: (slot.tag << self.index_len) | index as u64,
                data: slot.data.clone(),
            })
        } else {
            None
        };
        *slot = Slot {
            valid: true,
            tag,
            data,
            stamp: match self.recency {
                Recency::Lru => tick,
                Recency::Srrip => 0,
            },
            rrpv: SRRIP_INSERT,
        };
        evicted
    }

    /// Invalidates `key`, returning its data if present.
    pub fn erase(&mut self, key: u64) -> Option<T> {
        let (index, _) = self.split(key);
        let way = self.way_of(key)?;
        let slot = &mut self.sets[index][way];
        slot.valid = false;
        Some(slot.data.clone())
    }

    /// True when any valid slot holds `key`.
    pub fn contains(&self, key: u64) -> bool {
        self.way_of(key).is_some()
    }

    /// Invalidates every slot.
    pub fn flush(&mut self) {
        for set in &mut self.sets {
            for slot in set {
                slot.valid = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lru_evicts_least_recent() {
        let mut table: AssocTable<u32> = AssocTable::new(2, 2, Recency::Lru);
        // Single set of two ways: keys 0 and 2 share set 0 (index_len = 0).
        assert!(table.insert(0, 10).is_none());
        assert!(table.insert(2, 20).is_none());
        table.promote(0);
        let evicted = table.insert(4, 30).expect("set was full");
        assert_eq!(evicted.data, 20);
        assert!(table.contains(0));
        assert!(table.contains(4));
    }

    #[test]
    fn erase_returns_data() {
        let mut table: AssocTable<u32> = AssocTable::new(8, 4, Recency::Srrip);
        table.insert(5, 50);
        assert_eq!(table.erase(5), Some(50));
        assert!(!table.contains(5));
        assert_eq!(table.erase(5), None);
    }
}
