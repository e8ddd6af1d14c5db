//! Builds a four-site FCC cell, assigns a 50/50 Al/Zn composition, and runs
//! a short random search for the arrangement whose short-range order best
//! matches a fully-random target (all SRO cells 0), printing the best result
//! found.

use nalgebra::Vector3;
use sqs_engine::core::composition::Sublattice;
use sqs_engine::core::lattice::Lattice;
use sqs_engine::core::structure::Structure;
use sqs_engine::optimizer::{Optimizer, OptimizerConfig, ThreadConfig};
use sqs_engine::setup::{IterationMode, OptimizationSetup, ShellRadiiPolicy, SublatticeMode};
use sqs_engine::{Composition, SqsResult};
use std::collections::BTreeMap;

fn main() {
    let lattice = Lattice::new(
        Vector3::new(1.0, 0.0, 0.0),
        Vector3::new(0.0, 1.0, 0.0),
        Vector3::new(0.0, 0.0, 1.0),
        [true, true, true],
    )
    .expect("cubic cell is non-degenerate");
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
    .expect("valid composition and structure");

    let config = OptimizerConfig {
        iterations: 5_000,
        keep: 5,
        chunk_size: 500,
        threads: ThreadConfig::Fixed(0),
        seed: Some(42),
        mode: IterationMode::Random,
    };

    let optimizer = Optimizer::new(contexts, config);
    let results = optimizer.run(0, 1, |stats| {
        println!("finished {} candidates, best so far {:.6}", stats.finished_count(), stats.best_objective());
        false
    });

    let best = results
        .iter()
        .min_by(|a, b| a.objective().partial_cmp(&b.objective()).unwrap())
        .expect("random search always returns at least one result");
    match best {
        SqsResult::Interact { objective, species, .. } => {
            println!("best objective: {objective:.6}");
            println!("best arrangement: {species:?}");
        }
        SqsResult::Split { objective, per_sublattice } => {
            println!("best objective: {objective:.6} across {} sublattices", per_sublattice.len());
        }
    }
}
