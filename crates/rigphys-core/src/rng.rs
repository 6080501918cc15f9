use crate::Scalar;

/// Owned deterministic PRNG. One instance per vehicle/subsystem; seeds are
/// explicit so builds replay bit-identically.
#[derive(Copy, Clone, Debug)]
pub struct XorShift64 { state: u64 }

impl XorShift64 {
    pub fn new(seed: u64) -> Self { Self { state: seed | 1 } }

    pub fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x >> 12; x ^= x << 25; x ^= x >> 27;
        self.state = x;
        ((x.wrapping_mul(2685821657736338717)) >> 32) as u32
    }

    /// Uniform in [0, 1).
    pub fn next_f32(&mut self) -> Scalar {
        (self.next_u32() >> 8) as Scalar * (1.0 / (1u32 << 24) as Scalar)
    }

    /// Uniform in [-1, 1).
    pub fn next_f32_signed(&mut self) -> Scalar {
        self.next_f32() * 2.0 - 1.0
    }

    pub fn state(&self) -> u64 { self.state }
}
