//! Search statistics: atomic progress counters plus a timings map.
//!
//! Timings live in an enumerated tag -> duration map guarded by a single
//! mutex, since they're touched rarely compared to the hot loop.

use crate::core::rank::Rank;
use num_bigint::BigUint;
use num_traits::Zero;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// The fixed set of phases timed during a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Timing {
    Total,
    Sync,
    ChunkSetup,
    Loop,
    Comm,
}

const TIMING_TAGS: [Timing; 5] = [Timing::Total, Timing::Sync, Timing::ChunkSetup, Timing::Loop, Timing::Comm];

/// A running start captured by [`Statistics::tick`]; pass to [`Statistics::tock`]
/// to record its elapsed duration against a [`Timing`] tag. A value type:
/// multiple ticks may be outstanding at once, on any thread.
#[derive(Debug, Clone, Copy)]
pub struct Tick {
    start: Instant,
    tag: Timing,
}

/// Best-objective-so-far watermark, read/written from worker threads without
/// locking the rest of [`Statistics`].
#[derive(Debug, Default)]
struct BestWatermark {
    objective_bits: AtomicU64,
    rank: Mutex<Option<Rank>>,
}

impl BestWatermark {
    fn new() -> Self {
        Self {
            objective_bits: AtomicU64::new(f64::INFINITY.to_bits()),
            rank: Mutex::new(None),
        }
    }

    fn objective(&self) -> f64 {
        f64::from_bits(self.objective_bits.load(Ordering::Acquire))
    }

    /// Updates the watermark if `objective` improves on the current best.
    /// Not linearizable with `rank` under concurrent writers from distinct
    /// threads (a narrow window can see a new objective paired with a
    /// stale rank); the optimizer tolerates this since `rank` is advisory
    /// for progress reporting, not correctness.
    fn offer(&self, objective: f64, rank: &Rank) {
        let mut current = self.objective_bits.load(Ordering::Acquire);
        while objective < f64::from_bits(current) {
            match self.objective_bits.compare_exchange_weak(
                current,
                objective.to_bits(),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    *self.rank.lock() = Some(rank.clone());
                    break;
                }
                Err(observed) => current = observed,
            }
        }
    }
}

/// Search progress and timing, mergeable across workers and processes.
pub struct Statistics {
    finished: AtomicU64,
    working: AtomicU64,
    best: BestWatermark,
    timings: Mutex<BTreeMap<Timing, Duration>>,
}

impl Default for Statistics {
    fn default() -> Self {
        Self::new()
    }
}

impl Statistics {
    pub fn new() -> Self {
        Self {
            finished: AtomicU64::new(0),
            working: AtomicU64::new(0),
            best: BestWatermark::new(),
            timings: Mutex::new(TIMING_TAGS.iter().map(|&t| (t, Duration::ZERO)).collect()),
        }
    }

    pub fn mark_finished(&self, n: u64) {
        self.finished.fetch_add(n, Ordering::Relaxed);
    }

    pub fn set_working(&self, n: u64) {
        self.working.store(n, Ordering::Relaxed);
    }

    pub fn finished_count(&self) -> u64 {
        self.finished.load(Ordering::Relaxed)
    }

    pub fn working_count(&self) -> u64 {
        self.working.load(Ordering::Relaxed)
    }

    pub fn best_objective(&self) -> f64 {
        self.best.objective()
    }

    pub fn best_rank(&self) -> Option<Rank> {
        self.best.rank.lock().clone()
    }

    /// Offers a candidate objective/rank pair; keeps the lower objective.
    pub fn offer_best(&self, objective: f64, rank: &Rank) {
        self.best.offer(objective, rank);
    }

    pub fn tick(&self, tag: Timing) -> Tick {
        Tick {
            start: Instant::now(),
            tag,
        }
    }

    pub fn tock(&self, tick: Tick) {
        let elapsed = tick.start.elapsed();
        *self.timings.lock().entry(tick.tag).or_insert(Duration::ZERO) += elapsed;
    }

    pub fn timing(&self, tag: Timing) -> Duration {
        self.timings.lock().get(&tag).copied().unwrap_or(Duration::ZERO)
    }

    /// Folds `other` into `self`: timings and counters add, `best` keeps the
    /// lower objective and its rank.
    pub fn merge(&self, other: &Statistics) {
        self.finished.fetch_add(other.finished_count(), Ordering::Relaxed);
        self.working.fetch_add(other.working_count(), Ordering::Relaxed);

        let other_rank = other.best_rank().unwrap_or_else(|| BigUint::zero());
        if !other.best_objective().is_infinite() {
            self.best.offer(other.best_objective(), &other_rank);
        }

        let other_timings = other.timings.lock();
        let mut mine = self.timings.lock();
        for (&tag, &duration) in other_timings.iter() {
            *mine.entry(tag).or_insert(Duration::ZERO) += duration;
        }
    }
}
