use std::fmt;
use std::ops::Add;

/// A 32-bit wire sequence number. Converting back to an absolute 64-bit
/// stream index always needs the zero point and a nearby checkpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Wrap32 {
    value: u32,
}

impl Wrap32 {
    const WRAP_SIZE: u64 = 1 << 32;

    pub fn new(value: u32) -> Self {
        Wrap32 { value }
    }

    pub fn raw_value(&self) -> u32 {
        self.value
    }

    /// Wrap an absolute index `n` relative to `zero_point`
    pub fn wrap(n: u64, zero_point: Wrap32) -> Self {
        Wrap32::new(((n % Self::WRAP_SIZE + zero_point.value as u64) % Self::WRAP_SIZE) as u32)
    }

    /// The absolute index that wraps to `self` and lies closest to `checkpoint`.
    /// On a tie the smaller candidate wins.
    pub fn unwrap(&self, zero_point: Wrap32, checkpoint: u64) -> u64 {
        let offset = self.value.wrapping_sub(zero_point.value) as u64;
        let round = checkpoint / Self::WRAP_SIZE;

        let below = round.saturating_sub(1) * Self::WRAP_SIZE + offset;
        let here = round * Self::WRAP_SIZE + offset;
        // Absent when the next round does not fit in 64 bits
        let above = (round + 1)
            .checked_mul(Self::WRAP_SIZE)
            .and_then(|base| base.checked_add(offset));

        let mut best = below;
        for candidate in std::iter::once(here).chain(above) {
            if candidate.abs_diff(checkpoint) < best.abs_diff(checkpoint) {
                best = candidate;
            }
        }
        best
    }
}

impl Add<u32> for Wrap32 {
    type Output = Wrap32;

    fn add(self, n: u32) -> Wrap32 {
        Wrap32::new(self.value.wrapping_add(n))
    }
}

impl Add for Wrap32 {
    type Output = Wrap32;

    fn add(self, other: Wrap32) -> Wrap32 {
        self + other.value
    }
}

impl fmt::Display for Wrap32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

// -- Unit tests --
