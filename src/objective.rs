//! Bond counting and the scalar SRO objective.

use crate::core::grid::Grid3;
use crate::setup::{PairRecord, SubLatticeContext};

/// Counts bonds into `bonds` (cleared first) for one species assignment.
///
/// Reproduces the reference implementation's asymmetric double-increment
/// rule exactly: `B[s,b,a]` always increments, and `B[s,a,b]` increments a
/// second time only when `a != b`. The resulting tensor is intentionally not
/// symmetric; do not "fix" this by incrementing both cells unconditionally.
pub fn count_bonds(pair_list: &[PairRecord], species: &[usize], bonds: &mut Grid3<u32>) {
    for cell in bonds.as_slice_mut() {
        *cell = 0;
    }
    for pair in pair_list {
        let a = species[pair.i];
        let b = species[pair.j];
        *bonds.get_mut(pair.shell_idx, b, a) += 1;
        if a != b {
            *bonds.get_mut(pair.shell_idx, a, b) += 1;
        }
    }
}

/// `SRO[s,a,b] = 1 - prefactor[s,a,b] . B[s,a,b]`.
pub fn short_range_order(prefactors: &Grid3<f64>, bonds: &Grid3<u32>) -> Grid3<f64> {
    let (m, s) = prefactors.shape();
    let mut sro = Grid3::<f64>::zeros(m, s);
    for shell in 0..m {
        for a in 0..s {
            for b in 0..s {
                let value = 1.0 - prefactors.get(shell, a, b) * (*bonds.get(shell, a, b) as f64);
                sro.set(shell, a, b, value);
            }
        }
    }
    sro
}

/// `sum_{s,a,b} W[s,a,b] . |SRO[s,a,b] - T[s,a,b]|`.
pub fn scalar_objective(sro: &Grid3<f64>, weights: &Grid3<f64>, target: &Grid3<f64>) -> f64 {
    sro.iter_cells()
        .map(|(shell, a, b, &value)| weights.get(shell, a, b) * (value - target.get(shell, a, b)).abs())
        .sum()
}

/// Evaluates one packed-species assignment end to end against a
/// [`SubLatticeContext`]: counts bonds, derives SRO, and returns
/// `(objective, sro)`. `packed_species` must already be in `0..S` form
/// (see [`crate::core::species::SpeciesPacking`]).
pub fn evaluate(ctx: &SubLatticeContext, packed_species: &[usize], scratch: &mut Grid3<u32>) -> (f64, Grid3<f64>) {
    count_bonds(&ctx.pair_list, packed_species, scratch);
    let sro = short_range_order(&ctx.prefactors, scratch);
    let objective = scalar_objective(&sro, &ctx.pair_weights, &ctx.target);
    (objective, sro)
}
