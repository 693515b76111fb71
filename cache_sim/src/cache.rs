use crate::{config::CacheConfig, recency::RecencyOrder};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Line {
    pub valid: bool,
    pub tag: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Hit { slot: usize },
    Miss,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Install {
    FilledEmptySlot { slot: usize },
    Evicted { slot: usize, old_tag: u64 },
}

/// `E` line slots, filled in slot order and never shrunk.
#[derive(Debug, Clone)]
pub struct CacheSet {
    lines: Vec<Line>,
    occupied: usize,
    order: RecencyOrder,
}

impl CacheSet {
    pub fn new(lines_per_set: usize) -> Self {
        Self {
            lines: vec![Line::default(); lines_per_set],
            occupied: 0,
            order: RecencyOrder::new(lines_per_set),
        }
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn occupied(&self) -> usize {
        self.occupied
    }

    pub fn is_full(&self) -> bool {
        self.occupied == self.lines.len()
    }

    pub fn order(&self) -> &RecencyOrder {
        &self.order
    }

    /// scans the valid lines for `tag` and promotes the match on a hit.
    pub fn lookup(&mut self, tag: u64) -> Lookup {
        let found = self.lines[..self.occupied]
            .iter()
            .position(|l| l.valid && l.tag == tag);
        match found {
            Some(slot) => {
                self.order.touch(slot);
                Lookup::Hit { slot }
            }
            None => Lookup::Miss,
        }
    }

    /// places `tag` as most-recent, evicting the least-recent line if full.
    /// the caller must have seen [`Lookup::Miss`] for `tag`.
    pub fn install(&mut self, tag: u64) -> Install {
        if !self.is_full() {
            let slot = self.occupied;
            self.lines[slot] = Line { valid: true, tag };
            self.occupied += 1;
            self.order.append_new(slot);
            return Install::FilledEmptySlot { slot };
        }
        let Some(slot) = self.order.evict_least_recent() else {
            unreachable!("full set with {} lines has no LRU line", self.lines.len())
        };
        let old_tag = std::mem::replace(&mut self.lines[slot].tag, tag);
        self.order.append_new(slot);
        Install::Evicted { slot, old_tag }
    }
}

/// `S` independent sets.
#[derive(Debug, Clone)]
pub struct Cache {
    sets: Vec<CacheSet>,
}

impl Cache {
    pub fn new(config: &CacheConfig) -> Self {
        log::info!(
            "allocating {} sets x {} lines (block size {} bytes)",
            config.num_sets(),
            config.lines_per_set(),
            config.block_size()
        );
        Self {
            sets: vec![CacheSet::new(config.lines_per_set()); config.num_sets()],
        }
    }

    pub fn num_sets(&self) -> usize {
        self.sets.len()
    }

    pub fn set(&self, set_index: usize) -> &CacheSet {
        &self.sets[set_index]
    }

    pub fn lookup(&mut self, set_index: usize, tag: u64) -> Lookup {
        self.sets[set_index].lookup(tag)
    }

    pub fn install(&mut self, set_index: usize, tag: u64) -> Install {
        self.sets[set_index].install(tag)
    }
}
