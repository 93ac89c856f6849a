//! Noise sources for metric and series synthesis.
//!
//! Every random draw in the simulation goes through [`NoiseSource`], so a
//! production dashboard can use real entropy while tests replay a fixed
//! sequence.
//!
//! # Environment Variables
//!
//! - `CAMPUS_SEED`: seed for [`SeededNoise::from_env`] (default: 42)
//!
//! # Example
//!
//! ```
//! use campus_core::noise::{NoiseSource, SeededNoise, SequenceNoise};
//!
//! let mut seeded = SeededNoise::new(7);
//! let x = seeded.next_unit();
//! assert!((0.0..1.0).contains(&x));
//!
//! let mut fixed = SequenceNoise::new(vec![0.25, 0.75]);
//! assert_eq!(fixed.range(0.0, 100.0), 25.0);
//! assert!(fixed.coin());
//! ```

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Default seed for reproducible runs.
pub const DEFAULT_SEED: u64 = 42;

/// Largest `f64` strictly below 1.0.
const BELOW_ONE: f64 = 1.0 - f64::EPSILON / 2.0;

/// A source of uniformly distributed numbers in `[0, 1)`.
pub trait NoiseSource {
    /// Draw the next number in `[0, 1)`.
    fn next_unit(&mut self) -> f64;

    /// Draw a number in `[lo, hi)`.
    fn range(&mut self, lo: f64, hi: f64) -> f64 {
        (hi - lo).mul_add(self.next_unit(), lo)
    }

    /// Fair coin: `true` when the draw lands above one half.
    fn coin(&mut self) -> bool {
        self.next_unit() > 0.5
    }
}

impl<N: NoiseSource + ?Sized> NoiseSource for &mut N {
    fn next_unit(&mut self) -> f64 {
        (**self).next_unit()
    }
}

impl<N: NoiseSource + ?Sized> NoiseSource for Box<N> {
    fn next_unit(&mut self) -> f64 {
        (**self).next_unit()
    }
}

/// Entropy-seeded noise used by the running dashboard.
#[derive(Debug, Clone)]
pub struct RandomNoise {
    rng: StdRng,
}

impl RandomNoise {
    /// Create a noise source seeded from OS entropy.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl Default for RandomNoise {
    fn default() -> Self {
        Self::new()
    }
}

impl NoiseSource for RandomNoise {
    fn next_unit(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }
}

/// Deterministic noise using xorshift64.
#[derive(Debug, Clone)]
pub struct SeededNoise {
    state: u64,
}

impl SeededNoise {
    /// Create new noise with the given seed. A zero seed is remapped to 1
    /// since xorshift never leaves the all-zero state.
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self {
            state: if seed == 0 { 1 } else { seed },
        }
    }

    /// Create noise from `CAMPUS_SEED`, falling back to [`DEFAULT_SEED`].
    #[must_use]
    pub fn from_env() -> Self {
        let seed = std::env::var("CAMPUS_SEED")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_SEED);
        Self::new(seed)
    }

    /// Generate next random u64.
    pub fn next_u64(&mut self) -> u64 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 7;
        self.state ^= self.state << 17;
        self.state
    }
}

impl NoiseSource for SeededNoise {
    fn next_unit(&mut self) -> f64 {
        // Top 53 bits keep the result strictly below 1.0.
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }
}

/// Replays a fixed list of values, cycling when exhausted.
///
/// Values are clamped into `[0, 1)`. An empty list always yields `0.0`.
#[derive(Debug, Clone, Default)]
pub struct SequenceNoise {
    values: Vec<f64>,
    cursor: usize,
    draws: u64,
}

impl SequenceNoise {
    /// Create a sequence source.
    #[must_use]
    pub fn new(values: Vec<f64>) -> Self {
        Self {
            values,
            cursor: 0,
            draws: 0,
        }
    }

    /// Source that always returns the same value.
    #[must_use]
    pub fn constant(value: f64) -> Self {
        Self::new(vec![value])
    }

    /// Number of values drawn so far.
    #[must_use]
    pub const fn draws(&self) -> u64 {
        self.draws
    }
}

impl NoiseSource for SequenceNoise {
    fn next_unit(&mut self) -> f64 {
        self.draws += 1;
        if self.values.is_empty() {
            return 0.0;
        }
        let v = self.values[self.cursor % self.values.len()];
        self.cursor = (self.cursor + 1) % self.values.len();
        if v.is_nan() {
            0.0
        } else {
            v.clamp(0.0, BELOW_ONE)
        }
    }
}
