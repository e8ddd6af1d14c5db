use crate::core::species::{histogram, Configuration, Species};
use crate::error::RankError;
use num_bigint::BigUint;
use num_traits::{One, ToPrimitive, Zero};
use std::collections::BTreeMap;

/// A 1-based lexicographic index of a configuration among the permutations
/// of its multiset. Arbitrary precision: an `N=64` configuration over three
/// species already exceeds `2^128`, so this wraps `BigUint` rather than a
/// machine integer.
pub type Rank = BigUint;

/// `n!` as an arbitrary-precision integer.
pub fn factorial(n: u64) -> BigUint {
    let mut acc = BigUint::one();
    for k in 2..=n {
        acc *= k;
    }
    acc
}

/// `N! / prod(n_i!)` for a multiset with per-species multiplicities `freqs`.
pub fn num_permutations(freqs: &BTreeMap<Species, usize>) -> BigUint {
    let n: usize = freqs.values().sum();
    let mut denom = BigUint::one();
    for &count in freqs.values() {
        denom *= factorial(count as u64);
    }
    factorial(n as u64) / denom
}

/// Returns `num_permutations` fitting in `u64`, if it does — used by the
/// optimizer to decide whether chunk bounds can be sliced as machine words.
pub fn num_permutations_u64(freqs: &BTreeMap<Species, usize>) -> Option<u64> {
    num_permutations(freqs).to_u64()
}

/// Returns the 1-based lexicographic rank of `conf` among permutations of
/// its own multiset, sweeping right to left while maintaining a histogram.
pub fn rank_permutation(conf: &Configuration) -> Rank {
    let hist = histogram(conf);
    let species: Vec<Species> = hist.keys().copied().collect();
    let mut counts: BTreeMap<Species, usize> = BTreeMap::new();

    let mut suffix_permutations = BigUint::one();
    let mut rank = BigUint::one();

    for (i, &x) in conf.iter().rev().enumerate() {
        *counts.entry(x).or_insert(0) += 1;
        let hist_x = counts[&x];

        let mut prefix_sum = BigUint::zero();
        for &j in &species {
            if j < x {
                prefix_sum += counts.get(&j).copied().unwrap_or(0);
            }
        }
        if !prefix_sum.is_zero() {
            rank += (&suffix_permutations * prefix_sum) / hist_x;
        }

        suffix_permutations = (suffix_permutations * (i as u64 + 1)) / hist_x as u64;
    }
    rank
}

/// Returns the configuration of the given 1-based `rank`, using `template`
/// only for its multiset of species.
pub fn unrank_permutation(template: &Configuration, rank: &Rank) -> Result<Configuration, RankError> {
    let hist = histogram(template);
    let total = num_permutations(&hist);
    if rank.is_zero() || rank > &total {
        return Err(RankError::BadRange {
            rank: rank.to_string(),
            max: total.to_string(),
        });
    }

    let species: Vec<Species> = hist.keys().copied().collect();
    let mut remaining: BTreeMap<Species, usize> = hist;
    let n = template.len();
    let mut conf = vec![0; n];
    let mut total_permutations = total;
    let mut rank = rank.clone() - BigUint::one();

    for k in 0..n {
        let atoms_left = (n - k) as u64;
        for &j in &species {
            let count_j = *remaining.get(&j).unwrap_or(&0);
            if count_j == 0 {
                continue;
            }
            let suffix_count = (&total_permutations * count_j as u64) / atoms_left;
            if rank < suffix_count {
                conf[k] = j;
                total_permutations = suffix_count;
                *remaining.get_mut(&j).unwrap() -= 1;
                break;
            }
            rank -= suffix_count;
        }
    }
    Ok(conf)
}

/// In-place lexicographic successor (classic next-permutation algorithm).
/// Returns `false` (and leaves `conf` unchanged) if `conf` is already the
/// last permutation of its multiset.
pub fn next_permutation(conf: &mut Configuration) -> bool {
    let len = conf.len();
    next_permutation_range(conf, 0, len)
}

/// `next_permutation` restricted to the half-open range `[lo, hi)`.
pub fn next_permutation_range(conf: &mut [Species], lo: usize, hi: usize) -> bool {
    if hi <= lo + 1 {
        return false;
    }
    let mut i = hi - 1;
    while i > lo {
        if conf[i - 1] < conf[i] {
            break;
        }
        i -= 1;
    }
    if i == lo {
        return false;
    }
    let pivot = i - 1;
    let mut j = hi - 1;
    while conf[j] <= conf[pivot] {
        j -= 1;
    }
    conf.swap(pivot, j);
    conf[pivot + 1..hi].reverse();
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn num_permutations_matches_multinomial() {
        let mut freqs = BTreeMap::new();
        freqs.insert(1u8, 4);
        freqs.insert(2u8, 4);
        // 8! / (4! 4!) = 70
        assert_eq!(num_permutations(&freqs), BigUint::from(70u32));
    }

    #[test]
    fn rank_unrank_are_inverses() {
        let template = vec![1u8, 1, 2, 2, 3];
        let total = num_permutations(&histogram(&template));
        let mut rank = BigUint::one();
        while rank <= total {
            let conf = unrank_permutation(&template, &rank).unwrap();
            assert_eq!(rank_permutation(&conf), rank);
            rank += 1u32;
        }
    }

    #[test]
    fn next_permutation_walks_every_rank_once() {
        let template = vec![1u8, 1, 2, 2, 3];
        let total = num_permutations(&histogram(&template));
        let mut conf = unrank_permutation(&template, &BigUint::one()).unwrap();
        let mut seen = vec![rank_permutation(&conf)];
        loop {
            if !next_permutation(&mut conf) {
                break;
            }
            seen.push(rank_permutation(&conf));
        }
        assert_eq!(BigUint::from(seen.len() as u64), total);
        assert_eq!(seen, {
            let mut sorted = seen.clone();
            sorted.sort();
            sorted
        });
        assert_eq!(*seen.last().unwrap(), total);
    }

    #[test]
    fn unrank_out_of_range_is_bad_range() {
        let template = vec![1u8, 1, 2];
        let total = num_permutations(&histogram(&template));
        let err = unrank_permutation(&template, &(total + BigUint::one())).unwrap_err();
        assert!(matches!(err, RankError::BadRange { .. }));
    }

    #[test]
    fn single_species_has_one_permutation() {
        let template = vec![13u8; 4];
        assert_eq!(num_permutations(&histogram(&template)), BigUint::one());
        let conf = unrank_permutation(&template, &BigUint::one()).unwrap();
        assert_eq!(conf, template);
        assert_eq!(rank_permutation(&conf), BigUint::one());
    }
}
