use crate::core::grid::Grid3;
use crate::core::species::SpeciesPacking;
use std::collections::BTreeMap;

/// One entry of the optimization-facing pair list: the raw shell number `s`
/// alongside the pre-resolved compacted shell index used to index the dense
/// `[M][S][S]` tensors in the hot loop, so `objective::count_bonds` never
/// has to look anything up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairRecord {
    pub i: usize,
    pub j: usize,
    pub raw_shell: u32,
    pub shell_idx: usize,
}

/// Resolves a `(i, j, raw_shell)` pair list plus its shell compaction map
/// into the dense-indexed [`PairRecord`] form the optimizer consumes.
pub fn resolve_pair_list(
    pairs: &[(usize, usize, u32)],
    shell_index_map: &BTreeMap<u32, usize>,
) -> Vec<PairRecord> {
    pairs
        .iter()
        .map(|&(i, j, raw_shell)| PairRecord {
            i,
            j,
            raw_shell,
            shell_idx: shell_index_map[&raw_shell],
        })
        .collect()
}

/// Computes the per-shell, per-species-pair normalization prefactor
/// `P[s,a,b] = 1 / (M_s . x_a . x_b . N)`, where `M_s` is the coordination
/// number of shell `s` read from the shell-matrix row of site 0 and `x_a`
/// is the atom fraction of packed species `a` on this sublattice.
pub fn compute_prefactors(
    shell_row_0: &[u32],
    shell_index_map: &BTreeMap<u32, usize>,
    packed_species: &[usize],
    num_species: usize,
) -> Grid3<f64> {
    let m = shell_index_map.len();
    let n = packed_species.len() as f64;

    let mut coordination = vec![0usize; m];
    for &raw_shell in shell_row_0 {
        if let Some(&idx) = shell_index_map.get(&raw_shell) {
            coordination[idx] += 1;
        }
    }

    let mut counts = vec![0usize; num_species];
    for &p in packed_species {
        counts[p] += 1;
    }
    let fractions: Vec<f64> = counts.iter().map(|&c| c as f64 / n).collect();

    let mut prefactors = Grid3::<f64>::zeros(m, num_species);
    for shell_idx in 0..m {
        let m_s = coordination[shell_idx];
        if m_s == 0 {
            continue;
        }
        for a in 0..num_species {
            for b in 0..num_species {
                let value = 1.0 / (m_s as f64 * fractions[a] * fractions[b] * n);
                prefactors.set(shell_idx, a, b, value);
            }
        }
    }
    prefactors
}

/// Default pair-weights cube: `J - I` (all off-diagonal cells `1`, diagonal
/// `0`), independent of the per-shell scalar weight.
pub fn default_pair_weights(shell_index_map: &BTreeMap<u32, usize>, num_species: usize) -> Grid3<f64> {
    let m = shell_index_map.len();
    let mut w = Grid3::<f64>::zeros(m, num_species);
    for &idx in shell_index_map.values() {
        for a in 0..num_species {
            for b in 0..num_species {
                if a != b {
                    w.set(idx, a, b, 1.0);
                }
            }
        }
    }
    w
}

/// Default `{s: 1/s}` shell weights for `s` in `1..num_shells`, keyed by
/// the raw (uncompacted) shell number.
pub fn default_shell_weights(raw_shells: &[u32]) -> BTreeMap<u32, f64> {
    raw_shells
        .iter()
        .filter(|&&s| s >= 1)
        .map(|&s| (s, 1.0 / s as f64))
        .collect()
}

/// Packs a structure's species into `0..S` using ascending atomic number.
pub fn pack_species(species: &[u8]) -> (SpeciesPacking, Vec<usize>) {
    let packing = SpeciesPacking::from_species(species);
    let packed = packing.pack(species);
    (packing, packed)
}
