//! Per-tile pseudorandom streams.
//!
//! Each tile owns two independent streams reseeded from the same tile seed:
//! a uniform stream deciding which cells hold a non-zero, and a
//! distribution-specific stream producing cell values. Correlation between
//! the two streams is accepted by construction.

use rand::rand_core::{impls, RngCore};
use rand_distr::{Distribution as _, Poisson, StandardNormal};

use crate::error::{Error, Result};

use super::generator::Distribution;

/// Xoshiro256++ tile generator (Blackman & Vigna 2018), seeded via
/// SplitMix64 so that nearby tile seeds still produce unrelated streams.
#[derive(Clone)]
pub struct TileRng {
    s: [u64; 4],
}

impl TileRng {
    /// Create from a 64-bit tile seed.
    pub fn new(seed: u64) -> Self {
        let mut sm_state = seed;
        let mut splitmix = || {
            sm_state = sm_state.wrapping_add(0x9e3779b97f4a7c15);
            let mut z = sm_state;
            z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
            z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
            z ^ (z >> 31)
        };
        TileRng {
            s: [splitmix(), splitmix(), splitmix(), splitmix()],
        }
    }

    #[inline]
    fn next(&mut self) -> u64 {
        let result = self.s[0]
            .wrapping_add(self.s[3])
            .rotate_left(23)
            .wrapping_add(self.s[0]);

        let t = self.s[1] << 17;

        self.s[2] ^= self.s[0];
        self.s[3] ^= self.s[1];
        self.s[1] ^= self.s[2];
        self.s[0] ^= self.s[3];

        self.s[2] ^= t;
        self.s[3] = self.s[3].rotate_left(45);

        result
    }

    /// Uniform double in [0, 1) at full 53-bit precision.
    #[inline]
    pub fn next_f64(&mut self) -> f64 {
        (self.next() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Uniform integer in [0, n) via rejection sampling, bias-free.
    pub fn next_bounded(&mut self, n: u64) -> u64 {
        debug_assert!(n > 0);
        loop {
            let bits = self.next() >> 1;
            let val = bits % n;
            if bits.wrapping_sub(val).wrapping_add(n - 1) < (1u64 << 63) {
                return val;
            }
        }
    }
}

impl RngCore for TileRng {
    #[inline]
    fn next_u32(&mut self) -> u32 {
        (self.next() >> 32) as u32
    }

    #[inline]
    fn next_u64(&mut self) -> u64 {
        self.next()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        impls::fill_bytes_via_next(self, dest)
    }
}

/// Value stream for one tile, specialized per distribution.
pub(crate) enum ValueSampler {
    Uniform { min: f64, range: f64, rng: TileRng },
    Normal(TileRng),
    Poisson { dist: Poisson<f64>, rng: TileRng },
}

impl ValueSampler {
    /// Build the value stream for a tile seed.
    pub fn new(dist: &Distribution, seed: u64) -> Result<ValueSampler> {
        let rng = TileRng::new(seed);
        Ok(match *dist {
            Distribution::Uniform { min, max } => ValueSampler::Uniform {
                min,
                range: max - min,
                rng,
            },
            Distribution::Normal => ValueSampler::Normal(rng),
            Distribution::Poisson { mean } => ValueSampler::Poisson {
                dist: Poisson::new(mean).map_err(|e| Error::DistributionParameter {
                    param: "mean",
                    reason: e.to_string(),
                })?,
                rng,
            },
        })
    }

    /// Draw the next cell value.
    #[inline]
    pub fn draw(&mut self) -> f64 {
        match self {
            ValueSampler::Uniform { min, range, rng } => *min + *range * rng.next_f64(),
            ValueSampler::Normal(rng) => StandardNormal.sample(rng),
            ValueSampler::Poisson { dist, rng } => dist.sample(rng),
        }
    }
}
