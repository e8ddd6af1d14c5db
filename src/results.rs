//! Deduplicated top-K result collection.
//!
//! One mutex guards a shared sorted store, with short critical sections and
//! no lock held across an evaluation.

use crate::core::grid::Grid3;
use crate::core::rank::rank_permutation;
use crate::core::species::Configuration;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// One result of a search: either a single interacting sublattice, or a
/// split search's total objective plus its per-sublattice breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SqsResult {
    Interact {
        objective: f64,
        species: Configuration,
        sro: Grid3<f64>,
    },
    Split {
        objective: f64,
        per_sublattice: Vec<SqsResult>,
    },
}

impl SqsResult {
    pub fn objective(&self) -> f64 {
        match self {
            SqsResult::Interact { objective, .. } => *objective,
            SqsResult::Split { objective, .. } => *objective,
        }
    }

    /// A string identity used to deduplicate results at equal objective:
    /// the candidate's lexicographic rank for `Interact`, or the `|`-joined
    /// per-sublattice ranks for `Split` — a split candidate's rank is the
    /// tuple of its sublattices'.
    pub fn dedup_key(&self) -> String {
        match self {
            SqsResult::Interact { species, .. } => rank_permutation(species).to_string(),
            SqsResult::Split { per_sublattice, .. } => per_sublattice
                .iter()
                .map(|r| r.dedup_key())
                .collect::<Vec<_>>()
                .join("|"),
        }
    }
}

struct ResultBucket {
    objective: f64,
    results: Vec<SqsResult>,
}

/// A sorted, capacity-bounded, thread-safe store of the `keep` best results
/// seen so far, deduplicated by rank within an objective bucket.
pub struct ResultCollection {
    keep: usize,
    buckets: Mutex<Vec<ResultBucket>>,
}

impl ResultCollection {
    pub fn new(keep: usize) -> Self {
        assert!(keep > 0, "keep must be positive");
        Self {
            keep,
            buckets: Mutex::new(Vec::with_capacity(keep)),
        }
    }

    /// The cutoff below which a candidate would be dropped outright: the
    /// worst retained objective once the store is full, or `+inf` otherwise.
    pub fn acceptance_cutoff(&self) -> f64 {
        let buckets = self.buckets.lock();
        if buckets.len() < self.keep {
            f64::INFINITY
        } else {
            buckets.last().map(|b| b.objective).unwrap_or(f64::INFINITY)
        }
    }

    /// Attempts to insert one candidate. Returns `true` if it was kept
    /// (inserted or merged into an existing bucket at the same objective).
    pub fn insert(&self, result: SqsResult) -> bool {
        let objective = result.objective();
        let key = result.dedup_key();
        let mut buckets = self.buckets.lock();

        if buckets.len() >= self.keep {
            if let Some(worst) = buckets.last() {
                if objective > worst.objective {
                    return false;
                }
            }
        }

        match buckets.binary_search_by(|b| b.objective.partial_cmp(&objective).unwrap()) {
            Ok(idx) => {
                if !buckets[idx].results.iter().any(|r| r.dedup_key() == key) {
                    buckets[idx].results.push(result);
                }
            }
            Err(idx) => {
                buckets.insert(
                    idx,
                    ResultBucket {
                        objective,
                        results: vec![result],
                    },
                );
                if buckets.len() > self.keep {
                    buckets.pop();
                }
            }
        }
        true
    }

    pub fn num_results(&self) -> usize {
        self.buckets.lock().iter().map(|b| b.results.len()).sum()
    }

    pub fn best(&self) -> Option<f64> {
        self.buckets.lock().first().map(|b| b.objective)
    }

    /// Sorted `(objective, results)` snapshot, without consuming the
    /// collection.
    pub fn snapshot(&self) -> Vec<(f64, Vec<SqsResult>)> {
        self.buckets
            .lock()
            .iter()
            .map(|b| (b.objective, b.results.clone()))
            .collect()
    }

    /// Drains the collection into sorted `(objective, results)` pairs,
    /// removing adjacent duplicate ranks within each bucket — a post-gather
    /// pass applied on the coordinator after results from multiple
    /// workers/processes have been merged in.
    pub fn finish(self) -> Vec<(f64, Vec<SqsResult>)> {
        let mut buckets = self.buckets.into_inner();
        buckets
            .drain(..)
            .map(|mut b| {
                b.results.sort_by_key(|r| r.dedup_key());
                b.results.dedup_by_key(|r| r.dedup_key());
                (b.objective, b.results)
            })
            .collect()
    }

    /// Merges another collection's buckets into this one (cross-process or
    /// cross-worker gather).
    pub fn merge_from(&self, other: ResultCollection) {
        for (_, results) in other.finish() {
            for result in results {
                self.insert(result);
            }
        }
    }
}
