//! Seeded species shuffling.
//!
//! Every shuffler is seeded from a `ChaCha8Rng` core, and draws are reduced
//! with Lemire's multiply-high technique rather than `Rng::gen_range`, so
//! results are reproducible bit-for-bit across identical seeds.

use crate::core::rank::{next_permutation_range, rank_permutation, unrank_permutation, Rank};
use crate::core::species::{Configuration, Species};
use crate::setup::SubLatticeContext;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// A 64-bit-seeded draw source reduced to `[0, k)` via `(draw * k) >> 32`,
/// avoiding the modulo-bias a naive `draw % k` would introduce.
pub struct BoundedRng {
    inner: ChaCha8Rng,
}

impl BoundedRng {
    pub fn seeded(seed: u64) -> Self {
        Self {
            inner: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Seeds from a nondeterministic source, for when the caller has no
    /// fixed seed to give.
    pub fn from_entropy() -> Self {
        Self {
            inner: ChaCha8Rng::from_entropy(),
        }
    }

    /// Draws a value in `[0, k)`. `k == 0` always returns `0`.
    pub fn bounded(&mut self, k: u32) -> u32 {
        if k == 0 {
            return 0;
        }
        ((self.inner.next_u32() as u64 * k as u64) >> 32) as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShuffleMode {
    Random,
    Systematic,
}

/// Drives species shuffling for one [`SubLatticeContext`], either by
/// repeated bounded Fisher-Yates draws or by walking `next_permutation` from
/// a rank-seeded starting point.
pub struct Shuffler {
    mode: ShuffleMode,
    rng: BoundedRng,
}

impl Shuffler {
    pub fn random(seed: Option<u64>) -> Self {
        Self {
            mode: ShuffleMode::Random,
            rng: seed.map(BoundedRng::seeded).unwrap_or_else(BoundedRng::from_entropy),
        }
    }

    pub fn systematic() -> Self {
        Self {
            mode: ShuffleMode::Systematic,
            rng: BoundedRng::seeded(0),
        }
    }

    /// Shuffles `species` in place according to `mode`. In [`ShuffleMode::Random`]
    /// every bound in `bounds` is Fisher-Yates shuffled independently, in the
    /// order given. In [`ShuffleMode::Systematic`] there must be exactly one
    /// bound, and this advances it to the lexicographic successor.
    pub fn shuffle(&mut self, species: &mut Configuration, bounds: &[(usize, usize)]) -> bool {
        match self.mode {
            ShuffleMode::Random => {
                for &(lo, hi) in bounds {
                    self.fisher_yates(&mut species[lo..hi]);
                }
                true
            }
            ShuffleMode::Systematic => {
                let &(lo, hi) = bounds
                    .first()
                    .expect("systematic mode requires exactly one shuffling bound");
                assert_eq!(bounds.len(), 1, "systematic mode requires exactly one shuffling bound");
                next_permutation_range(species, lo, hi)
            }
        }
    }

    /// Fisher-Yates over `slice`, using the bounded RNG for each draw.
    fn fisher_yates(&mut self, slice: &mut [Species]) {
        for i in (1..slice.len()).rev() {
            let j = self.rng.bounded((i + 1) as u32) as usize;
            slice.swap(i, j);
        }
    }

    /// Seeds `species[lo..hi)` to the configuration at 1-based `chunk_start + 1`,
    /// using `template` for its multiset.
    pub fn seed_to_rank(
        &self,
        template: &Configuration,
        chunk_start: &Rank,
    ) -> Result<Configuration, crate::error::RankError> {
        let rank = chunk_start + num_bigint::BigUint::from(1u32);
        unrank_permutation(template, &rank)
    }
}

/// The 1-based lexicographic rank of `ctx`'s packed species vector, restricted
/// to its (single, systematic-mode) shuffling bound.
pub fn rank_of(ctx: &SubLatticeContext, species: &Configuration) -> Rank {
    let &(lo, hi) = ctx
        .shuffling_bounds
        .first()
        .expect("systematic rank requires at least one shuffling bound");
    let packed: Configuration = species[lo..hi].to_vec();
    rank_permutation(&packed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_draw_never_reaches_k() {
        let mut rng = BoundedRng::seeded(42);
        for _ in 0..1000 {
            assert!(rng.bounded(7) < 7);
        }
    }

    #[test]
    fn bounded_zero_is_always_zero() {
        let mut rng = BoundedRng::seeded(1);
        assert_eq!(rng.bounded(0), 0);
    }

    #[test]
    fn random_shuffle_is_deterministic_for_fixed_seed() {
        let species: Configuration = vec![1, 1, 2, 2, 3];
        let mut a = species.clone();
        let mut b = species.clone();
        Shuffler::random(Some(7)).shuffle(&mut a, &[(0, 5)]);
        Shuffler::random(Some(7)).shuffle(&mut b, &[(0, 5)]);
        assert_eq!(a, b);
    }

    #[test]
    fn random_shuffle_preserves_multiset() {
        let species: Configuration = vec![1, 1, 2, 2, 3];
        let mut shuffled = species.clone();
        Shuffler::random(Some(99)).shuffle(&mut shuffled, &[(0, 5)]);
        let mut sorted = shuffled.clone();
        sorted.sort();
        let mut expected = species.clone();
        expected.sort();
        assert_eq!(sorted, expected);
    }

    #[test]
    fn systematic_shuffle_walks_next_permutation() {
        let mut species: Configuration = vec![1, 1, 2, 2, 3];
        let before = species.clone();
        let advanced = Shuffler::systematic().shuffle(&mut species, &[(0, 5)]);
        assert!(advanced);
        assert_ne!(species, before);
        assert!(species > before);
    }

    #[test]
    fn seed_to_rank_matches_unrank() {
        let template: Configuration = vec![1, 1, 2, 2, 3];
        let shuffler = Shuffler::systematic();
        let chunk_start = num_bigint::BigUint::from(0u32);
        let seeded = shuffler.seed_to_rank(&template, &chunk_start).unwrap();
        assert_eq!(rank_permutation(&seeded), num_bigint::BigUint::from(1u32));
    }
}
