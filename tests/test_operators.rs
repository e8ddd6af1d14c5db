mod common;

use common::{fcc_al_zn, rock_salt_nacl};
use sqs_engine::core::grid::Grid3;
use sqs_engine::objective;
use sqs_engine::setup::{IterationMode, OptimizationSetup, ShellRadiiPolicy, SublatticeMode};
use sqs_engine::shuffle::Shuffler;
use std::collections::BTreeMap;

#[test]
fn interact_context_bond_counts_are_consistent_with_shell_count() {
    let (structure, composition) = fcc_al_zn();
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
    assert_eq!(contexts.len(), 1);
    let ctx = &contexts[0];

    let mut bonds = Grid3::<u32>::zeros(ctx.num_shells(), ctx.num_species());
    objective::count_bonds(&ctx.pair_list, &ctx.packed_species, &mut bonds);
    let total_bonds: u32 = bonds.as_slice().iter().sum();
    assert_eq!(total_bonds, 2 * ctx.pair_list.len() as u32);

    let sro = objective::short_range_order(&ctx.prefactors, &bonds);
    assert_eq!(sro.shape(), ctx.prefactors.shape());
}

#[test]
fn split_mode_evaluates_each_sublattice_independently() {
    let (structure, composition) = rock_salt_nacl();
    let contexts = OptimizationSetup::build(
        &structure,
        &composition,
        &ShellRadiiPolicy::Naive { atol: 1e-3, rtol: 1e-5 },
        &BTreeMap::new(),
        None,
        None,
        SublatticeMode::Split,
        IterationMode::Random,
        1e-3,
        1e-5,
    )
    .unwrap();
    assert_eq!(contexts.len(), 2);
    for ctx in &contexts {
        let mut scratch = Grid3::<u32>::zeros(ctx.num_shells(), ctx.num_species());
        let (objective_value, sro) = objective::evaluate(ctx, &ctx.packed_species, &mut scratch);
        assert!(objective_value.is_finite());
        assert_eq!(sro.shape(), ctx.prefactors.shape());
    }
}

#[test]
fn seeded_shuffler_is_deterministic_across_instances() {
    let (structure, composition) = fcc_al_zn();
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
    let ctx = &contexts[0];

    let mut a: Vec<u8> = ctx.packed_species.iter().map(|&p| p as u8).collect();
    let mut b = a.clone();
    Shuffler::random(Some(99)).shuffle(&mut a, &ctx.shuffling_bounds);
    Shuffler::random(Some(99)).shuffle(&mut b, &ctx.shuffling_bounds);
    assert_eq!(a, b);
}
