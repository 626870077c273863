// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-rtscope project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Overflow-aware timestamp arithmetic
//!
//! Hardware timestamp counters are monotonic and wrap at `2^bits`. The
//! elapsed time between a trigger latch and the next sample time is the
//! shortest signed distance between the two counter values modulo the
//! counter period, which is what an arbitrary-precision subtraction of the
//! unwrapped counters would return as long as the true distance is below
//! half a period.

use crate::acquisition::DataType;

/// Effective width of a pair of timestamp counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterWidth(u32);

impl CounterWidth {
    pub const BITS_32: CounterWidth = CounterWidth(32);
    pub const BITS_64: CounterWidth = CounterWidth(64);

    /// Width in bits, clamped to `1..=64`.
    pub fn new(bits: u32) -> Self {
        CounterWidth(bits.clamp(1, 64))
    }

    /// Width used to compare two counters: the narrower of the two.
    pub fn for_sources(trigger: DataType, next_time: DataType) -> Self {
        Self::new(trigger.bit_width().min(next_time.bit_width()))
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    fn mask(self) -> u64 {
        if self.0 >= 64 {
            u64::MAX
        } else {
            (1u64 << self.0) - 1
        }
    }
}

/// Signed distance between two counter readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeDelta {
    /// `next - trigger` in counter units (nanoseconds)
    pub nanos: i64,
    /// The counter wrapped between the two readings
    pub wrapped: bool,
}

/// Compute `next - trigger` for counters of the given width.
///
/// Both inputs are reduced to the counter width first, so values read from a
/// wider source compare correctly with a narrower one.
pub fn time_diff(trigger: u64, next: u64, width: CounterWidth) -> TimeDelta {
    let mask = width.mask();
    let trigger = trigger & mask;
    let next = next & mask;
    let raw = next.wrapping_sub(trigger) & mask;

    // Sign-extend from the counter width
    let shift = 64 - width.bits();
    let nanos = ((raw << shift) as i64) >> shift;

    // A naive subtraction of the reduced values disagrees only across a wrap
    let naive = next as i128 - trigger as i128;
    TimeDelta {
        nanos,
        wrapped: naive != nanos as i128,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_difference() {
        let d = time_diff(1_000, 5_000, CounterWidth::BITS_32);
        assert_eq!(d, TimeDelta { nanos: 4_000, wrapped: false });
        let d = time_diff(5_000, 1_000, CounterWidth::BITS_64);
        assert_eq!(d, TimeDelta { nanos: -4_000, wrapped: false });
    }

    #[test]
    fn test_wrap_32() {
        let trigger = u32::MAX as u64 - 99;
        let next = 400;
        let d = time_diff(trigger, next, CounterWidth::BITS_32);
        assert_eq!(d.nanos, 500);
        assert!(d.wrapped);

        // Trigger after the wrap, next sample before it
        let d = time_diff(next, trigger, CounterWidth::BITS_32);
        assert_eq!(d.nanos, -500);
        assert!(d.wrapped);
    }

    #[test]
    fn test_wrap_64() {
        let d = time_diff(u64::MAX - 9, 10, CounterWidth::BITS_64);
        assert_eq!(d.nanos, 20);
        assert!(d.wrapped);
    }

    #[test]
    fn test_mixed_width_sources() {
        // A 64-bit trigger latch compared with a 32-bit next-time counter
        let width = CounterWidth::for_sources(DataType::U64, DataType::U32);
        assert_eq!(width, CounterWidth::BITS_32);
        let trigger = 0x0000_0007_ffff_ff00u64;
        let next = 0x0000_0100u64;
        assert_eq!(time_diff(trigger, next, width).nanos, 0x200);
    }

    #[test]
    fn test_small_width() {
        let width = CounterWidth::new(16);
        assert_eq!(time_diff(65_530, 4, width).nanos, 10);
        assert_eq!(time_diff(4, 65_530, width).nanos, -10);

        let width = CounterWidth::new(63);
        assert_eq!(time_diff(10, 5, width).nanos, -5);
        assert_eq!(time_diff(5, 10, width).nanos, 5);
        let top = (1u64 << 63) - 3;
        assert_eq!(time_diff(top, 4, width), TimeDelta { nanos: 7, wrapped: true });

        let width = CounterWidth::new(1);
        assert_eq!(time_diff(0, 1, width).nanos, -1);
        assert_eq!(CounterWidth::new(0).bits(), 1);
        assert_eq!(CounterWidth::new(99).bits(), 64);
    }
}
