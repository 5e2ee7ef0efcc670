//! WELL1024a block-seed source.
//!
//! Long-period (2^1024) equidistributed shift-register generator from
//! Panneton, L'Ecuyer & Matsumoto, "Improved Long-Period Generators Based on
//! Linear Recurrences Modulo 2" (2006). Used exclusively to draw per-tile
//! seeds up front, so parallel workers never touch a shared generator.

use rand::rand_core::{impls, RngCore, SeedableRng};

/// WELL1024a state: 32 words of 32 bits plus a rotating index.
#[derive(Clone)]
pub struct Well1024a {
    v: [u32; 32],
    i: usize,
}

impl Well1024a {
    /// Create from a 64-bit seed, expanding it into the 1024-bit state with
    /// SplitMix64.
    pub fn new(seed: u64) -> Self {
        let mut sm_state = seed;
        let mut splitmix = || {
            sm_state = sm_state.wrapping_add(0x9e3779b97f4a7c15);
            let mut z = sm_state;
            z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
            z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
            z ^ (z >> 31)
        };

        let mut v = [0u32; 32];
        for pair in v.chunks_exact_mut(2) {
            let x = splitmix();
            pair[0] = (x >> 32) as u32;
            pair[1] = x as u32;
        }
        Well1024a { v, i: 0 }
    }

    /// Generate the next 32-bit output.
    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        let i = self.i;
        let z0 = self.v[(i + 31) & 31];
        let v3 = self.v[(i + 3) & 31];
        let z1 = self.v[i] ^ (v3 ^ (v3 >> 8));
        let v24 = self.v[(i + 24) & 31];
        let v10 = self.v[(i + 10) & 31];
        let z2 = (v24 ^ (v24 << 19)) ^ (v10 ^ (v10 << 14));

        self.v[i] = z1 ^ z2;
        self.v[(i + 31) & 31] = (z0 ^ (z0 << 11)) ^ (z1 ^ (z1 << 7)) ^ (z2 ^ (z2 << 13));
        self.i = (i + 31) & 31;
        self.v[self.i]
    }

    /// Generate the next 64-bit output from two 32-bit draws, high word first.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let hi = self.next_u32() as u64;
        let lo = self.next_u32() as u64;
        (hi << 32) | lo
    }
}

impl RngCore for Well1024a {
    #[inline]
    fn next_u32(&mut self) -> u32 {
        Well1024a::next_u32(self)
    }

    #[inline]
    fn next_u64(&mut self) -> u64 {
        Well1024a::next_u64(self)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        impls::fill_bytes_via_next(self, dest)
    }
}

impl SeedableRng for Well1024a {
    type Seed = [u8; 8];

    fn from_seed(seed: Self::Seed) -> Self {
        Well1024a::new(u64::from_le_bytes(seed))
    }

    fn seed_from_u64(seed: u64) -> Self {
        Well1024a::new(seed)
    }
}
