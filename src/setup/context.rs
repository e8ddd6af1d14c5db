use crate::core::composition::Composition;
use crate::core::geometry::{self, radii_peak};
use crate::core::grid::Grid3;
use crate::core::species::SpeciesPacking;
use crate::core::structure::Structure;
use crate::error::ConfigError;
use crate::setup::pairs::{self, PairRecord};
use std::collections::BTreeMap;

/// How shell radii are resolved from the working structure's distance matrix.
#[derive(Debug, Clone)]
pub enum ShellRadiiPolicy {
    Naive { atol: f64, rtol: f64 },
    Peak { bin_width: f64, peak_isolation: f64 },
    Explicit(Vec<f64>),
}

/// Whether a single working structure carries every sublattice's species
/// (bonds counted across sublattice boundaries) or each sublattice gets its
/// own independent working structure and objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SublatticeMode {
    Interact,
    Split,
}

/// Whether the optimizer walks the rank space exhaustively or samples it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationMode {
    Random,
    Systematic,
}

/// Everything the optimizer needs for one sublattice's worth of work, built
/// once by [`OptimizationSetup::build`] and then immutable for the life of
/// the search.
#[derive(Debug, Clone)]
pub struct SubLatticeContext {
    pub structure: Structure,
    /// One half-open `[lo, hi)` range per managed sublattice, relative to
    /// `structure`'s site order.
    pub shuffling_bounds: Vec<(usize, usize)>,
    /// `perm[i]` is this context's site `i` expressed as an index into the
    /// original (pre-sort, pre-decompose) structure.
    pub perm: Vec<usize>,
    pub species_packing: SpeciesPacking,
    pub packed_species: Vec<usize>,
    pub shell_index_map: BTreeMap<u32, usize>,
    pub shell_reverse_map: Vec<u32>,
    pub pair_list: Vec<PairRecord>,
    pub prefactors: Grid3<f64>,
    pub pair_weights: Grid3<f64>,
    pub target: Grid3<f64>,
    pub shell_radii: Vec<f64>,
    pub shell_weights: BTreeMap<u32, f64>,
}

impl SubLatticeContext {
    pub fn num_shells(&self) -> usize {
        self.shell_index_map.len()
    }

    pub fn num_species(&self) -> usize {
        self.species_packing.num_species()
    }

    pub fn num_sites(&self) -> usize {
        self.structure.num_sites()
    }
}

/// Builds the [`SubLatticeContext`]s a search runs against: every lookup
/// table (shell radii, pair list, prefactors, default weights) is derived
/// from raw inputs once, up front, before the search loop ever runs.
pub struct OptimizationSetup;

impl OptimizationSetup {
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        structure: &Structure,
        composition: &Composition,
        radii_policy: &ShellRadiiPolicy,
        shell_weights: &BTreeMap<u32, f64>,
        pair_weights: Option<&Grid3<f64>>,
        target: Option<&Grid3<f64>>,
        mode: SublatticeMode,
        iteration_mode: IterationMode,
        atol: f64,
        rtol: f64,
    ) -> Result<Vec<SubLatticeContext>, ConfigError> {
        composition.validate()?;
        tracing::debug!(sites = structure.num_sites(), sublattices = composition.num_sublattices(), ?mode, "assembling sublattice contexts");

        if iteration_mode == IterationMode::Systematic
            && (mode != SublatticeMode::Interact || composition.num_sublattices() != 1)
        {
            return Err(ConfigError::bad_value(
                "iteration_mode",
                "systematic iteration requires interact mode with exactly one sublattice",
            ));
        }

        if mode == SublatticeMode::Split && (pair_weights.is_some() || target.is_some()) {
            return Err(ConfigError::bad_value(
                "pair_weights/target_objective",
                "ambiguous per-sublattice tensor: split mode requires each sublattice's own \
                 override, a single shared cube cannot be broadcast across structurally \
                 different sublattices",
            ));
        }

        let radii = resolve_radii(structure, radii_policy, atol, rtol);

        let mut effective_weights = shell_weights.clone();
        if effective_weights.is_empty() {
            let raw_shells: Vec<u32> = (1..radii.len() as u32).collect();
            effective_weights = pairs::default_shell_weights(&raw_shells);
        }
        for &s in effective_weights.keys() {
            if s == 0 || s as usize >= radii.len() {
                return Err(ConfigError::out_of_range(
                    "shell_weights",
                    format!("shell {s} has no matching radius ({} radii resolved)", radii.len()),
                ));
            }
        }

        let contexts = match mode {
            SublatticeMode::Interact => vec![build_interact(
                structure,
                composition,
                &radii,
                &effective_weights,
                pair_weights,
                target,
                atol,
                rtol,
            )?],
            SublatticeMode::Split => build_split(structure, composition, &radii, &effective_weights, atol, rtol)?,
        };
        Ok(contexts)
    }
}

fn resolve_radii(structure: &Structure, policy: &ShellRadiiPolicy, atol: f64, rtol: f64) -> Vec<f64> {
    match policy {
        ShellRadiiPolicy::Naive { atol, rtol } => geometry::radii_naive(structure.distance_matrix(), *atol, *rtol),
        ShellRadiiPolicy::Peak {
            bin_width,
            peak_isolation,
        } => radii_peak(structure.distance_matrix(), *bin_width, *peak_isolation),
        ShellRadiiPolicy::Explicit(radii) => {
            let _ = (atol, rtol);
            radii.clone()
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn assemble_context(
    working: &Structure,
    perm: Vec<usize>,
    shuffling_bounds: Vec<(usize, usize)>,
    radii: &[f64],
    shell_weights: &BTreeMap<u32, f64>,
    pair_weights: Option<&Grid3<f64>>,
    target: Option<&Grid3<f64>>,
    atol: f64,
    rtol: f64,
) -> Result<SubLatticeContext, ConfigError> {
    let (pair_list_raw, shell_index_map) = working.pairs(radii, shell_weights, atol, rtol);
    let pair_list = pairs::resolve_pair_list(&pair_list_raw, &shell_index_map);

    let mut shell_reverse_map = vec![0u32; shell_index_map.len()];
    for (&raw, &idx) in &shell_index_map {
        shell_reverse_map[idx] = raw;
    }

    let (species_packing, packed_species) = pairs::pack_species(&working.species);
    let num_species = species_packing.num_species();
    let m = shell_index_map.len();

    let shells = working.shell_matrix(radii, atol, rtol);
    let shell_row_0: Vec<u32> = shells.row(0).to_vec();
    let prefactors = pairs::compute_prefactors(&shell_row_0, &shell_index_map, &packed_species, num_species);

    let pair_weights = match pair_weights {
        Some(w) => {
            if w.shape() != (m, num_species) {
                return Err(ConfigError::bad_value(
                    "pair_weights",
                    format!("expected shape ({m}, {num_species}, {num_species})"),
                ));
            }
            w.clone()
        }
        None => pairs::default_pair_weights(&shell_index_map, num_species),
    };
    let target = match target {
        Some(t) => {
            if t.shape() != (m, num_species) {
                return Err(ConfigError::bad_value(
                    "target",
                    format!("expected shape ({m}, {num_species}, {num_species})"),
                ));
            }
            t.clone()
        }
        None => Grid3::<f64>::zeros(m, num_species),
    };

    Ok(SubLatticeContext {
        structure: working.clone(),
        shuffling_bounds,
        perm,
        species_packing,
        packed_species,
        shell_index_map,
        shell_reverse_map,
        pair_list,
        prefactors,
        pair_weights,
        target,
        shell_radii: radii.to_vec(),
        shell_weights: shell_weights.clone(),
    })
}

fn build_interact(
    structure: &Structure,
    composition: &Composition,
    radii: &[f64],
    shell_weights: &BTreeMap<u32, f64>,
    pair_weights: Option<&Grid3<f64>>,
    target: Option<&Grid3<f64>>,
    atol: f64,
    rtol: f64,
) -> Result<SubLatticeContext, ConfigError> {
    let applied = structure.apply_composition(composition);

    let mut site_sublattice = vec![usize::MAX; applied.num_sites()];
    for (k, sublattice) in composition.0.iter().enumerate() {
        for &site in &sublattice.sites {
            site_sublattice[site] = k;
        }
    }
    let (sorted, perm) = applied.sorted_with_indices(|site| site_sublattice[site.index]);

    let mut shuffling_bounds = Vec::with_capacity(composition.num_sublattices());
    let mut offset = 0usize;
    for sublattice in &composition.0 {
        let size = sublattice.num_sites();
        shuffling_bounds.push((offset, offset + size));
        offset += size;
    }

    assemble_context(
        &sorted,
        perm,
        shuffling_bounds,
        radii,
        shell_weights,
        pair_weights,
        target,
        atol,
        rtol,
    )
}

/// Builds one independent [`SubLatticeContext`] per sublattice. Callers must
/// have already rejected a shared `pair_weights`/`target` override (see
/// [`OptimizationSetup::build`]): each sublattice here always falls back to
/// its own default tensors, since a single cube cannot be broadcast across
/// structurally different sublattices.
fn build_split(
    structure: &Structure,
    composition: &Composition,
    radii: &[f64],
    shell_weights: &BTreeMap<u32, f64>,
    atol: f64,
    rtol: f64,
) -> Result<Vec<SubLatticeContext>, ConfigError> {
    let decomposed = structure.apply_composition_and_decompose(composition);
    decomposed
        .iter()
        .zip(composition.0.iter())
        .map(|(sliced, sublattice)| {
            let n = sliced.num_sites();
            assemble_context(
                sliced,
                sublattice.sites.clone(),
                vec![(0, n)],
                radii,
                shell_weights,
                None,
                None,
                atol,
                rtol,
            )
        })
        .collect()
}
