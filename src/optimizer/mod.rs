//! The parallel search driver.
//!
//! Each `Optimizer` builds its own `rayon::ThreadPoolBuilder` pool via
//! `build()` rather than `build_global()`, so more than one can coexist (for
//! instance in tests) without racing over a single process-wide pool.
//! Cancellation is cooperative: an `Arc<AtomicBool>` stop flag that every
//! worker checks once per iteration.

mod config;
mod watermark;

pub use config::{OptimizerConfig, ThreadConfig};
use watermark::AtomicCutoff;

use crate::core::grid::Grid3;
use crate::core::rank::{next_permutation_range, rank_permutation, unrank_permutation};
use crate::core::species::{Configuration, Species};
use crate::objective;
use crate::results::{ResultCollection, SqsResult};
use crate::setup::{IterationMode, SubLatticeContext};
use crate::shuffle::Shuffler;
use crate::stats::{Statistics, Timing};
use num_bigint::BigUint;
use parking_lot::Mutex;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Per-local-process search driver. Holds the sublattice contexts it
/// searches over, a shared result collection, progress statistics, and a
/// cooperative stop flag.
pub struct Optimizer {
    contexts: Vec<SubLatticeContext>,
    config: OptimizerConfig,
    results: Arc<ResultCollection>,
    stats: Arc<Statistics>,
    stop: Arc<AtomicBool>,
    cutoff: Arc<AtomicCutoff>,
}

impl Optimizer {
    pub fn new(contexts: Vec<SubLatticeContext>, config: OptimizerConfig) -> Self {
        let results = Arc::new(ResultCollection::new(config.keep));
        Self {
            contexts,
            config,
            results,
            stats: Arc::new(Statistics::new()),
            stop: Arc::new(AtomicBool::new(false)),
            cutoff: Arc::new(AtomicCutoff::new()),
        }
    }

    pub fn statistics(&self) -> Arc<Statistics> {
        self.stats.clone()
    }

    pub fn results(&self) -> Arc<ResultCollection> {
        self.results.clone()
    }

    /// A clonable handle workers (or an external signal handler) can use to
    /// request cancellation.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    pub fn cancel(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Runs the search for this process's slice (`rank_index` of `num_ranks`)
    /// of the iteration range, invoking `callback` after each chunk
    /// completes; the callback may request cancellation by returning `true`.
    pub fn run(&self, rank_index: usize, num_ranks: usize, callback: impl FnMut(&Statistics) -> bool + Send) -> Vec<SqsResult> {
        let total_tick = self.stats.tick(Timing::Total);

        let (range_start, range_end) = self.rank_slice(rank_index, num_ranks);
        let chunks = build_chunks(range_start, range_end, self.config.chunk_size);
        let threads = self.config.threads.for_rank(rank_index);
        tracing::info!(rank_index, num_ranks, threads, iterations = range_end - range_start, "starting search");
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .expect("failed to build worker thread pool");

        let callback = Mutex::new(callback);
        pool.install(|| {
            chunks.par_iter().for_each(|&(lo, hi)| {
                self.run_chunk(lo, hi);
                tracing::debug!(chunk_start = lo, chunk_end = hi, best = self.stats.best_objective(), "chunk complete");
                let should_stop = (callback.lock())(&self.stats);
                if should_stop {
                    tracing::info!("search cancelled by callback");
                    self.cancel();
                }
            });
        });

        self.stats.tock(total_tick);
        tracing::info!(finished = self.stats.finished_count(), best = self.stats.best_objective(), "search complete");
        self.drain_results()
    }

    fn rank_slice(&self, rank_index: usize, num_ranks: usize) -> (u64, u64) {
        let num_ranks = (num_ranks.max(1)) as u64;
        let iterations = self.config.iterations;
        let per_rank = (iterations + num_ranks - 1) / num_ranks;
        let start = (rank_index as u64) * per_rank;
        let end = (start + per_rank).min(iterations);
        (start.min(iterations), end)
    }

    fn run_chunk(&self, chunk_start: u64, chunk_end: u64) {
        if self.stop.load(Ordering::Relaxed) {
            return;
        }
        let setup_tick = self.stats.tick(Timing::ChunkSetup);

        let split = self.contexts.len() > 1;
        let mut buffers: Vec<Vec<u8>> = self
            .contexts
            .iter()
            .map(|ctx| ctx.packed_species.iter().map(|&p| p as u8).collect())
            .collect();
        let mut scratch: Vec<Grid3<u32>> = self
            .contexts
            .iter()
            .map(|ctx| Grid3::<u32>::zeros(ctx.num_shells(), ctx.num_species()))
            .collect();
        let mut shufflers: Vec<Shuffler> = self
            .contexts
            .iter()
            .map(|_| Shuffler::random(self.config.seed.map(|s| s ^ chunk_start)))
            .collect();

        if !split && self.config.mode == IterationMode::Systematic {
            let ctx = &self.contexts[0];
            let template: Configuration = ctx.packed_species.iter().map(|&p| p as Species).collect();
            let seeded = unrank_permutation(&template, &BigUint::from(chunk_start + 1))
                .expect("chunk_start within num_permutations range");
            buffers[0] = seeded;
        }

        self.stats.set_working(chunk_end - chunk_start);
        self.stats.tock(setup_tick);

        let loop_tick = self.stats.tick(Timing::Loop);
        let mut completed = 0u64;
        for i in chunk_start..chunk_end {
            if self.stop.load(Ordering::Relaxed) {
                break;
            }

            if split {
                for (ctx, (buffer, shuffler)) in self
                    .contexts
                    .iter()
                    .zip(buffers.iter_mut().zip(shufflers.iter_mut()))
                {
                    shuffler.shuffle(buffer, &ctx.shuffling_bounds);
                }
            } else if self.config.mode == IterationMode::Random {
                let ctx = &self.contexts[0];
                shufflers[0].shuffle(&mut buffers[0], &ctx.shuffling_bounds);
            } else if i > chunk_start {
                let &(lo, hi) = self.contexts[0].shuffling_bounds.first().unwrap();
                next_permutation_range(&mut buffers[0], lo, hi);
            }

            self.evaluate_and_record(&buffers, &mut scratch);
            completed += 1;
        }
        self.stats.tock(loop_tick);

        self.stats.set_working(0);
        self.stats.mark_finished(completed);
    }

    fn evaluate_and_record(&self, buffers: &[Vec<u8>], scratch: &mut [Grid3<u32>]) {
        let cutoff = self.cutoff.load();

        if self.contexts.len() == 1 {
            let ctx = &self.contexts[0];
            let packed: Vec<usize> = buffers[0].iter().map(|&s| s as usize).collect();
            let (objective, sro) = objective::evaluate(ctx, &packed, &mut scratch[0]);
            if objective > cutoff {
                return;
            }
            let species = restore_order(ctx, &buffers[0]);
            let rank = rank_permutation(&buffers[0].to_vec());
            if self.results.insert(SqsResult::Interact { objective, species, sro }) {
                self.stats.offer_best(objective, &rank);
                self.cutoff.tighten(self.results.acceptance_cutoff());
            }
            return;
        }

        let mut total = 0.0;
        let mut per_sublattice = Vec::with_capacity(self.contexts.len());
        for ((ctx, buffer), shell_scratch) in self.contexts.iter().zip(buffers.iter()).zip(scratch.iter_mut()) {
            let packed: Vec<usize> = buffer.iter().map(|&s| s as usize).collect();
            let (objective, sro) = objective::evaluate(ctx, &packed, shell_scratch);
            total += objective;
            per_sublattice.push(SqsResult::Interact {
                objective,
                species: restore_order(ctx, buffer),
                sro,
            });
        }
        if total > cutoff {
            return;
        }
        let combined = SqsResult::Split {
            objective: total,
            per_sublattice,
        };
        let dedup_rank_seed: Configuration = buffers.iter().flatten().copied().collect();
        if self.results.insert(combined) {
            self.stats.offer_best(total, &rank_permutation(&dedup_rank_seed));
            self.cutoff.tighten(self.results.acceptance_cutoff());
        }
    }

    fn drain_results(&self) -> Vec<SqsResult> {
        self.results
            .snapshot()
            .into_iter()
            .flat_map(|(_, results)| results)
            .collect()
    }
}

/// Restores a packed-species buffer to original site order, ascending by
/// original index.
fn restore_order(ctx: &SubLatticeContext, packed_buffer: &[u8]) -> Configuration {
    let unpacked = ctx
        .species_packing
        .unpack(&packed_buffer.iter().map(|&p| p as usize).collect::<Vec<_>>());
    let mut pairs: Vec<(usize, Species)> = ctx.perm.iter().copied().zip(unpacked).collect();
    pairs.sort_by_key(|&(orig, _)| orig);
    pairs.into_iter().map(|(_, species)| species).collect()
}

fn build_chunks(start: u64, end: u64, chunk_size: u64) -> Vec<(u64, u64)> {
    let chunk_size = chunk_size.max(1);
    let mut chunks = Vec::new();
    let mut cursor = start;
    while cursor < end {
        let next = (cursor + chunk_size).min(end);
        chunks.push((cursor, next));
        cursor = next;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::composition::{Composition, Sublattice};
    use crate::core::lattice::Lattice;
    use crate::core::structure::Structure;
    use crate::setup::{OptimizationSetup, ShellRadiiPolicy, SublatticeMode};
    use nalgebra::Vector3;
    use std::collections::BTreeMap;

    fn fcc_ab() -> (Structure, Composition) {
        let lattice = Lattice::new(
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(0.0, 0.0, 1.0),
            [true, true, true],
        )
        .unwrap();
        let frac_coords = vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(0.0, 0.5, 0.5),
            Vector3::new(0.5, 0.0, 0.5),
            Vector3::new(0.5, 0.5, 0.0),
        ];
        let structure = Structure::new(lattice, frac_coords, vec![13, 13, 13, 13]);
        let composition = Composition(vec![Sublattice {
            sites: vec![0, 1, 2, 3],
            counts: [(13u8, 2usize), (30u8, 2usize)].into_iter().collect(),
        }]);
        (structure, composition)
    }

    #[test]
    fn random_search_finds_results_within_num_permutations() {
        let (structure, composition) = fcc_ab();
        let contexts = OptimizationSetup::build(
            &structure,
            &composition,
            &ShellRadiiPolicy::Naive { atol: 1e-3, rtol: 1e-5 },
            &BTreeMap::new(),
            None,
            None,
            SublatticeMode::Interact,
            IterationMode::Random,
            1e-3,
            1e-5,
        )
        .unwrap();
        let config = OptimizerConfig {
            iterations: 20,
            keep: 3,
            chunk_size: 5,
            threads: ThreadConfig::Fixed(2),
            seed: Some(7),
            mode: IterationMode::Random,
        };
        let optimizer = Optimizer::new(contexts, config);
        let results = optimizer.run(0, 1, |_| false);
        assert!(!results.is_empty());
        assert!(results.len() <= 3);
        assert_eq!(optimizer.statistics().finished_count(), 20);
    }

    #[test]
    fn systematic_search_visits_every_permutation_exactly() {
        let (structure, composition) = fcc_ab();
        let contexts = OptimizationSetup::build(
            &structure,
            &composition,
            &ShellRadiiPolicy::Naive { atol: 1e-3, rtol: 1e-5 },
            &BTreeMap::new(),
            None,
            None,
            SublatticeMode::Interact,
            IterationMode::Systematic,
            1e-3,
            1e-5,
        )
        .unwrap();
        let total = crate::core::rank::num_permutations_u64(&crate::core::species::histogram(
            &contexts[0].packed_species.iter().map(|&p| p as u8).collect::<Vec<_>>(),
        ))
        .unwrap();
        let config = OptimizerConfig {
            iterations: total,
            keep: 1,
            chunk_size: 2,
            threads: ThreadConfig::Fixed(2),
            seed: None,
            mode: IterationMode::Systematic,
        };
        let optimizer = Optimizer::new(contexts, config);
        let results = optimizer.run(0, 1, |_| false);
        assert!(!results.is_empty());
        assert_eq!(optimizer.statistics().finished_count(), total);
    }

    #[test]
    fn cancellation_stops_before_all_iterations_finish() {
        let (structure, composition) = fcc_ab();
        let contexts = OptimizationSetup::build(
            &structure,
            &composition,
            &ShellRadiiPolicy::Naive { atol: 1e-3, rtol: 1e-5 },
            &BTreeMap::new(),
            None,
            None,
            SublatticeMode::Interact,
            IterationMode::Random,
            1e-3,
            1e-5,
        )
        .unwrap();
        let config = OptimizerConfig {
            iterations: 1000,
            keep: 1,
            chunk_size: 10,
            threads: ThreadConfig::Fixed(1),
            seed: Some(1),
            mode: IterationMode::Random,
        };
        let optimizer = Optimizer::new(contexts, config);
        let stop = optimizer.stop_handle();
        stop.store(true, Ordering::SeqCst);
        let _results = optimizer.run(0, 1, |_| false);
        assert!(optimizer.statistics().finished_count() < 1000);
    }
}
