use std::ops::Range;

/// mask with bits `0..=index` set.
#[inline]
pub const fn bit_range_lower(index: u32) -> u64 {
    let large: u64 = if index != 63 { 1 << (index + 1) } else { 0 };
    large.wrapping_sub(1)
}

/// mask with `width` low bits set. `width == 0` gives an empty mask.
#[inline]
pub const fn low_mask(width: u32) -> u64 {
    if width == 0 {
        0
    } else {
        bit_range_lower(width - 1)
    }
}

/// bits of `bin` in the half-open range `r`, shifted down to bit 0.
#[inline]
pub const fn extract(bin: u64, r: Range<u32>) -> u64 {
    if r.start >= 64 {
        return 0;
    }
    (bin >> r.start) & low_mask(r.end - r.start)
}
