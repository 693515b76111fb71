//! Splitting addresses into tag, set index and block offset.

use std::fmt;

use crate::bin::extract;

/// to unify displaying simulated addresses
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Addr(u64);

impl Addr {
    pub const fn new(v: u64) -> Self {
        Self(v)
    }
    pub const fn into_inner(self) -> u64 {
        self.0
    }
}

impl From<u64> for Addr {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

/// Bit layout of an address, low to high: block offset, set index, tag.
///
/// Only built from a validated [`CacheConfig`](crate::config::CacheConfig),
/// so `block_bits + set_bits < 64` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddrLayout {
    block_bits: u32,
    set_bits: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedAddr {
    pub tag: u64,
    pub set_index: usize,
    pub offset: u64,
}

impl AddrLayout {
    pub(crate) const fn new(block_bits: u32, set_bits: u32) -> Self {
        Self {
            block_bits,
            set_bits,
        }
    }
    pub const fn block_bits(&self) -> u32 {
        self.block_bits
    }
    pub const fn set_bits(&self) -> u32 {
        self.set_bits
    }
    pub const fn tag_bits(&self) -> u32 {
        64 - self.block_bits - self.set_bits
    }
    pub fn decode(&self, addr: Addr) -> DecodedAddr {
        let a = addr.into_inner();
        let set_lo = self.block_bits;
        let tag_lo = self.block_bits + self.set_bits;
        DecodedAddr {
            tag: extract(a, tag_lo..64),
            set_index: extract(a, set_lo..tag_lo) as usize,
            offset: extract(a, 0..set_lo),
        }
    }
}
