use thiserror::Error;

use crate::{
    addr::AddrLayout,
    cache::{CacheSet, Line},
    recency::RecencyOrder,
};

/// memory the sets, their line slots and recency links may take together.
pub const MAX_CACHE_BYTES: u64 = 1 << 30;

/// bytes allocated per line slot.
pub const BYTES_PER_LINE: u64 = (std::mem::size_of::<Line>() + RecencyOrder::SLOT_BYTES) as u64;

/// bytes allocated per set besides its lines.
pub const BYTES_PER_SET: u64 = std::mem::size_of::<CacheSet>() as u64;

/// memory `Cache::new` allocates for `2^set_bits` sets of `lines_per_set`.
/// `None` on overflow.
fn cache_bytes(set_bits: u32, lines_per_set: usize) -> Option<u64> {
    let sets = 1u64.checked_shl(set_bits)?;
    let lines = sets.checked_mul(lines_per_set as u64)?;
    lines
        .checked_mul(BYTES_PER_LINE)?
        .checked_add(sets.checked_mul(BYTES_PER_SET)?)
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("`{name}` must be a positive integer")]
    NotPositive { name: &'static str },
    #[error("block bits ({block_bits}) + set bits ({set_bits}) must be less than 64")]
    AddressTooNarrow { block_bits: u32, set_bits: u32 },
    #[error("cache of 2^{set_bits} sets x {lines_per_set} lines exceeds the 1 GiB cache memory limit")]
    TooLarge { set_bits: u32, lines_per_set: usize },
}

/// Geometry of the simulated cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    block_bits: u32,
    set_bits: u32,
    lines_per_set: usize,
}

impl CacheConfig {
    /// validates `b`, `s` and `E`.
    pub fn new(
        block_bits: u32,
        set_bits: u32,
        lines_per_set: usize,
    ) -> Result<Self, ConfigError> {
        if set_bits == 0 {
            return Err(ConfigError::NotPositive { name: "s" });
        }
        if lines_per_set == 0 {
            return Err(ConfigError::NotPositive { name: "E" });
        }
        if block_bits == 0 {
            return Err(ConfigError::NotPositive { name: "b" });
        }
        if block_bits.saturating_add(set_bits) >= 64 {
            return Err(ConfigError::AddressTooNarrow {
                block_bits,
                set_bits,
            });
        }
        if cache_bytes(set_bits, lines_per_set).map_or(true, |n| n > MAX_CACHE_BYTES) {
            return Err(ConfigError::TooLarge {
                set_bits,
                lines_per_set,
            });
        }
        Ok(Self {
            block_bits,
            set_bits,
            lines_per_set,
        })
    }
    pub fn block_bits(&self) -> u32 {
        self.block_bits
    }
    pub fn set_bits(&self) -> u32 {
        self.set_bits
    }
    pub fn lines_per_set(&self) -> usize {
        self.lines_per_set
    }
    /// `B = 2^b`. informational only.
    pub fn block_size(&self) -> u64 {
        1 << self.block_bits
    }
    /// `S = 2^s`
    pub fn num_sets(&self) -> usize {
        1 << self.set_bits
    }
    pub fn layout(&self) -> AddrLayout {
        AddrLayout::new(self.block_bits, self.set_bits)
    }
}
