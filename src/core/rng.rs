//! Randomness with a persisted seed trail.
//!
//! Every random outcome in a match (deck shuffle, coin flip, random discard)
//! draws a fresh 256-bit [`Seed`] from an [`EntropySource`]. The seed is
//! written to the game log *before* it is consumed, and the outcome is
//! derived deterministically from that seed alone via [`SeededRng`]. Replaying
//! the logged seeds through [`ReplayEntropy`] reproduces the match exactly,
//! while a live match never reuses entropy.
//!
//! ## Sources
//!
//! - [`OsEntropy`]: operating-system CSPRNG, the production default.
//! - [`DeterministicEntropy`]: ChaCha8 stream from a `u64`, for tests.
//! - [`ReplayEntropy`]: replays a recorded seed trail.
//!
//! ```
//! use ptcg_referee::core::{DeterministicEntropy, EntropySource, SeededRng};
//!
//! let mut entropy = DeterministicEntropy::new(42);
//! let seed = entropy.next_seed();
//!
//! let mut a = SeededRng::from_seed(&seed);
//! let mut b = SeededRng::from_seed(&seed);
//! assert_eq!(a.flip_coin(), b.flip_coin());
//! ```

use std::collections::VecDeque;

use rand::rngs::OsRng;
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// A 256-bit seed for one random invocation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Seed(pub [u8; 32]);

impl Seed {
    /// Hex rendering used in the game log.
    #[must_use]
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Parse a 64-character hex string.
    #[must_use]
    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.len() != 64 || !hex.is_ascii() {
            return None;
        }
        let mut bytes = [0u8; 32];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
        }
        Some(Self(bytes))
    }
}

impl std::fmt::Display for Seed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl std::fmt::Debug for Seed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Seed({})", &self.to_hex()[..16])
    }
}

/// Supplier of fresh seeds.
pub trait EntropySource: Send {
    /// Produce the seed for the next random invocation.
    fn next_seed(&mut self) -> Seed;
}

/// Seeds from the operating system CSPRNG.
#[derive(Clone, Copy, Debug, Default)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn next_seed(&mut self) -> Seed {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        Seed(bytes)
    }
}

/// Reproducible seed stream for tests and simulations.
#[derive(Clone, Debug)]
pub struct DeterministicEntropy {
    inner: ChaCha8Rng,
}

impl DeterministicEntropy {
    /// Create a stream from a `u64`.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            inner: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl EntropySource for DeterministicEntropy {
    fn next_seed(&mut self) -> Seed {
        let mut bytes = [0u8; 32];
        self.inner.fill_bytes(&mut bytes);
        Seed(bytes)
    }
}

/// Replays a recorded seed trail, in order.
///
/// Falls back to the OS source once the trail is exhausted, so a replay that
/// diverges never repeats a seed.
#[derive(Clone, Debug, Default)]
pub struct ReplayEntropy {
    seeds: VecDeque<Seed>,
}

impl ReplayEntropy {
    /// Create a replay source from a trail.
    pub fn new(seeds: impl IntoIterator<Item = Seed>) -> Self {
        Self {
            seeds: seeds.into_iter().collect(),
        }
    }

    /// Seeds not yet replayed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.seeds.len()
    }
}

impl EntropySource for ReplayEntropy {
    fn next_seed(&mut self) -> Seed {
        self.seeds.pop_front().unwrap_or_else(|| OsEntropy.next_seed())
    }
}

/// Deterministic generator derived from a single [`Seed`].
///
/// Built fresh for every random invocation and dropped afterwards.
#[derive(Clone, Debug)]
pub struct SeededRng {
    inner: ChaCha8Rng,
}

impl SeededRng {
    /// Create a generator from a seed.
    #[must_use]
    pub fn from_seed(seed: &Seed) -> Self {
        Self {
            inner: ChaCha8Rng::from_seed(seed.0),
        }
    }

    /// Flip a fair coin. `true` is heads.
    pub fn flip_coin(&mut self) -> bool {
        self.inner.gen_bool(0.5)
    }

    /// Random index in `0..len`. Returns `None` for an empty range.
    pub fn index(&mut self, len: usize) -> Option<usize> {
        (len > 0).then(|| self.inner.gen_range(0..len))
    }

    /// Shuffle a slice in place.
    pub fn shuffle<T>(&mut self, slice: &mut [T]) {
        use rand::seq::SliceRandom;
        slice.shuffle(&mut self.inner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_shuffle() {
        let seed = DeterministicEntropy::new(42).next_seed();

        let mut a: Vec<u32> = (0..60).collect();
        let mut b = a.clone();
        SeededRng::from_seed(&seed).shuffle(&mut a);
        SeededRng::from_seed(&seed).shuffle(&mut b);

        assert_eq!(a, b);
    }

    #[test]
    fn test_shuffle_keeps_elements() {
        let seed = DeterministicEntropy::new(7).next_seed();
        let mut data: Vec<u32> = (0..10).collect();
        SeededRng::from_seed(&seed).shuffle(&mut data);

        assert_ne!(data, (0..10).collect::<Vec<_>>());
        data.sort();
        assert_eq!(data, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_deterministic_stream_never_repeats() {
        let mut entropy = DeterministicEntropy::new(1);
        let seeds: Vec<_> = (0..50).map(|_| entropy.next_seed()).collect();
        for (i, a) in seeds.iter().enumerate() {
            for b in &seeds[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_os_entropy_fresh_per_call() {
        let mut os = OsEntropy;
        assert_ne!(os.next_seed(), os.next_seed());
    }

    #[test]
    fn test_replay_entropy_in_order() {
        let mut live = DeterministicEntropy::new(9);
        let trail: Vec<_> = (0..3).map(|_| live.next_seed()).collect();

        let mut replay = ReplayEntropy::new(trail.clone());
        assert_eq!(replay.remaining(), 3);
        for expected in &trail {
            assert_eq!(&replay.next_seed(), expected);
        }
        assert_eq!(replay.remaining(), 0);
    }

    #[test]
    fn test_hex_round_trip() {
        let seed = DeterministicEntropy::new(3).next_seed();
        let hex = seed.to_hex();
        assert_eq!(hex.len(), 64);
        assert_eq!(Seed::from_hex(&hex), Some(seed));
        assert_eq!(Seed::from_hex("zz"), None);
    }

    #[test]
    fn test_index_empty() {
        let seed = DeterministicEntropy::new(3).next_seed();
        let mut rng = SeededRng::from_seed(&seed);
        assert_eq!(rng.index(0), None);
        assert!(rng.index(5).unwrap() < 5);
    }
}
