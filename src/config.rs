//! The configuration document, ambient to the engine but not wired to any
//! particular input format — JSON/TOML parsing, CLI flags, and
//! structure-format readers (POSCAR/CIF/pymatgen-JSON) are all out of scope.
//! This is the typed document those parsers would hand to
//! [`crate::setup::OptimizationSetup`], and the point where this crate's
//! construction-time validation runs.

use crate::core::composition::Composition;
use crate::core::grid::Grid3;
use crate::core::lattice::Lattice;
use crate::core::structure::Structure;
use crate::error::ConfigError;
use crate::optimizer::{OptimizerConfig, ThreadConfig};
use crate::setup::{IterationMode, ShellRadiiPolicy, SublatticeMode};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn default_iteration_mode() -> IterationModeDoc {
    IterationModeDoc::Random
}
fn default_sublattice_mode() -> SublatticeModeDoc {
    SublatticeModeDoc::Interact
}
fn default_shell_radii() -> ShellRadiiDoc {
    ShellRadiiDoc::Peak
}
fn default_atol() -> f64 {
    1.0e-3
}
fn default_rtol() -> f64 {
    1.0e-5
}
fn default_bin_width() -> f64 {
    0.05
}
fn default_peak_isolation() -> f64 {
    0.25
}
fn default_chunk_size() -> Option<u64> {
    None
}
fn default_threads_per_rank() -> ThreadsDoc {
    ThreadsDoc::Single(0)
}
fn default_keep() -> usize {
    1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IterationModeDoc {
    Random,
    Systematic,
}

impl From<IterationModeDoc> for IterationMode {
    fn from(v: IterationModeDoc) -> Self {
        match v {
            IterationModeDoc::Random => IterationMode::Random,
            IterationModeDoc::Systematic => IterationMode::Systematic,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SublatticeModeDoc {
    Interact,
    Split,
}

impl From<SublatticeModeDoc> for SublatticeMode {
    fn from(v: SublatticeModeDoc) -> Self {
        match v {
            SublatticeModeDoc::Interact => SublatticeMode::Interact,
            SublatticeModeDoc::Split => SublatticeMode::Split,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShellRadiiDoc {
    Naive,
    Peak,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ThreadsDoc {
    Single(usize),
    PerRank(Vec<usize>),
}

impl From<ThreadsDoc> for ThreadConfig {
    fn from(v: ThreadsDoc) -> Self {
        match v {
            ThreadsDoc::Single(n) => ThreadConfig::Fixed(n),
            ThreadsDoc::PerRank(v) => ThreadConfig::PerRank(v),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureDoc {
    pub lattice: [[f64; 3]; 3],
    pub coords: Vec<[f64; 3]>,
    pub species: Vec<u8>,
    #[serde(default = "default_supercell")]
    pub supercell: [usize; 3],
}

fn default_supercell() -> [usize; 3] {
    [1, 1, 1]
}

/// The top-level configuration document, field for field, with
/// `#[serde(default = ...)]` giving each optional field its default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqsConfig {
    #[serde(default = "default_iteration_mode")]
    pub iteration_mode: IterationModeDoc,
    #[serde(default = "default_sublattice_mode")]
    pub sublattice_mode: SublatticeModeDoc,
    pub structure: StructureDoc,
    pub composition: Composition,
    #[serde(default = "default_shell_radii")]
    pub shell_radii: ShellRadiiDoc,
    #[serde(default)]
    pub explicit_radii: Option<Vec<f64>>,
    #[serde(default = "default_atol")]
    pub atol: f64,
    #[serde(default = "default_rtol")]
    pub rtol: f64,
    #[serde(default = "default_bin_width")]
    pub bin_width: f64,
    #[serde(default = "default_peak_isolation")]
    pub peak_isolation: f64,
    #[serde(default)]
    pub shell_weights: BTreeMap<u32, f64>,
    #[serde(default)]
    pub pair_weights: Option<Grid3<f64>>,
    #[serde(default)]
    pub target_objective: Option<Grid3<f64>>,
    #[serde(default)]
    pub iterations: Option<u64>,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: Option<u64>,
    #[serde(default = "default_threads_per_rank")]
    pub threads_per_rank: ThreadsDoc,
    #[serde(default = "default_keep")]
    pub keep: usize,
}

impl SqsConfig {
    /// Builds the working [`Structure`] this configuration describes: the
    /// unit cell given by `structure.lattice` (row vectors), tiled by
    /// `structure.supercell` before the search ever runs.
    pub fn build_structure(&self) -> Result<Structure, ConfigError> {
        let rows = &self.structure.lattice;
        let lattice = Lattice::new(
            Vector3::new(rows[0][0], rows[0][1], rows[0][2]),
            Vector3::new(rows[1][0], rows[1][1], rows[1][2]),
            Vector3::new(rows[2][0], rows[2][1], rows[2][2]),
            [true, true, true],
        )
        .ok_or_else(|| ConfigError::bad_value("structure.lattice", "lattice vectors are degenerate"))?;

        if self.structure.coords.len() != self.structure.species.len() {
            return Err(ConfigError::bad_value(
                "structure",
                "coords and species must have the same length",
            ));
        }
        let frac_coords = self
            .structure
            .coords
            .iter()
            .map(|c| Vector3::new(c[0], c[1], c[2]))
            .collect();
        let unit_cell = Structure::new(lattice, frac_coords, self.structure.species.clone());

        let [a, b, c] = self.structure.supercell;
        if a == 0 || b == 0 || c == 0 {
            return Err(ConfigError::bad_value("structure.supercell", "supercell factors must be positive"));
        }
        Ok(if (a, b, c) == (1, 1, 1) {
            unit_cell
        } else {
            unit_cell.supercell(a, b, c)
        })
    }

    /// Construction-time checks only: full schema validation belongs to a
    /// JSON-schema layer in front of this. This only guards the invariants
    /// sublattice-context assembly itself depends on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        tracing::debug!(sublattices = self.composition.num_sublattices(), "validating configuration");
        if self.keep == 0 {
            return Err(ConfigError::bad_value("keep", "keep must be > 0"));
        }
        if self.iteration_mode == IterationModeDoc::Systematic
            && (self.sublattice_mode != SublatticeModeDoc::Interact || self.composition.num_sublattices() != 1)
        {
            return Err(ConfigError::bad_value(
                "iteration_mode",
                "systematic iteration requires interact mode with exactly one sublattice",
            ));
        }
        for &s in self.shell_weights.keys() {
            if s == 0 {
                return Err(ConfigError::bad_value("shell_weights", "shell index 0 (self) cannot be weighted"));
            }
        }
        self.composition.validate()
    }

    pub fn radii_policy(&self) -> ShellRadiiPolicy {
        if let Some(radii) = &self.explicit_radii {
            return ShellRadiiPolicy::Explicit(radii.clone());
        }
        match self.shell_radii {
            ShellRadiiDoc::Naive => ShellRadiiPolicy::Naive {
                atol: self.atol,
                rtol: self.rtol,
            },
            ShellRadiiDoc::Peak => ShellRadiiPolicy::Peak {
                bin_width: self.bin_width,
                peak_isolation: self.peak_isolation,
            },
        }
    }

    /// Resolves `iterations`, applying the mode-dependent default
    /// (`500_000` random, `num_permutations` systematic) once the working
    /// structure's multiset is known.
    pub fn resolve_iterations(&self, num_permutations: Option<u64>) -> u64 {
        self.iterations.unwrap_or_else(|| match self.iteration_mode {
            IterationModeDoc::Random => 500_000,
            IterationModeDoc::Systematic => num_permutations.unwrap_or(0),
        })
    }

    pub fn optimizer_config(&self, iterations: u64, seed: Option<u64>) -> OptimizerConfig {
        let chunk_size = self.chunk_size.unwrap_or_else(|| iterations.min(100_000).max(1));
        OptimizerConfig {
            iterations,
            keep: self.keep,
            chunk_size,
            threads: self.threads_per_rank.clone().into(),
            seed,
            mode: self.iteration_mode.into(),
        }
    }

    /// Parses a configuration document from its JSON wire form, the intended
    /// on-disk representation.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Runs the full construction pipeline: validate, build the working
    /// structure, assemble the sublattice contexts (C4), and resolve the
    /// optimizer's run parameters — everything a caller needs to build an
    /// [`crate::optimizer::Optimizer`] from this document alone.
    pub fn setup(&self, seed: Option<u64>) -> Result<(Vec<crate::setup::SubLatticeContext>, OptimizerConfig), ConfigError> {
        self.validate()?;
        let structure = self.build_structure()?;
        let contexts = crate::setup::OptimizationSetup::build(
            &structure,
            &self.composition,
            &self.radii_policy(),
            &self.shell_weights,
            self.pair_weights.as_ref(),
            self.target_objective.as_ref(),
            self.sublattice_mode.into(),
            self.iteration_mode.into(),
            self.atol,
            self.rtol,
        )?;

        let num_permutations = if contexts.len() == 1 {
            crate::core::rank::num_permutations_u64(&crate::core::species::histogram(&contexts[0].packed_species
                .iter()
                .map(|&p| p as crate::core::species::Species)
                .collect::<Vec<_>>()))
        } else {
            None
        };
        let iterations = self.resolve_iterations(num_permutations);
        let optimizer_config = self.optimizer_config(iterations, seed);
        Ok((contexts, optimizer_config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::composition::Sublattice;

    fn minimal_doc() -> SqsConfig {
        SqsConfig {
            iteration_mode: IterationModeDoc::Random,
            sublattice_mode: SublatticeModeDoc::Interact,
            structure: StructureDoc {
                lattice: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
                coords: vec![[0.0, 0.0, 0.0]],
                species: vec![13],
                supercell: [1, 1, 1],
            },
            composition: Composition(vec![Sublattice {
                sites: vec![0],
                counts: [(13u8, 1usize)].into_iter().collect(),
            }]),
            shell_radii: ShellRadiiDoc::Peak,
            explicit_radii: None,
            atol: default_atol(),
            rtol: default_rtol(),
            bin_width: default_bin_width(),
            peak_isolation: default_peak_isolation(),
            shell_weights: BTreeMap::new(),
            pair_weights: None,
            target_objective: None,
            iterations: None,
            chunk_size: None,
            threads_per_rank: ThreadsDoc::Single(0),
            keep: 1,
        }
    }

    #[test]
    fn keep_zero_is_bad_value() {
        let mut doc = minimal_doc();
        doc.keep = 0;
        let err = doc.validate().unwrap_err();
        assert_eq!(err.key, "keep");
    }

    #[test]
    fn shell_index_zero_in_weights_is_bad_value() {
        let mut doc = minimal_doc();
        doc.shell_weights.insert(0, 1.0);
        let err = doc.validate().unwrap_err();
        assert_eq!(err.key, "shell_weights");
    }

    #[test]
    fn default_iterations_depend_on_mode() {
        let doc = minimal_doc();
        assert_eq!(doc.resolve_iterations(None), 500_000);
        let mut systematic = doc;
        systematic.iteration_mode = IterationModeDoc::Systematic;
        assert_eq!(systematic.resolve_iterations(Some(24)), 24);
    }

    #[test]
    fn chunk_size_defaults_to_min_iterations_and_cap() {
        let doc = minimal_doc();
        let cfg = doc.optimizer_config(50, None);
        assert_eq!(cfg.chunk_size, 50);
    }

    #[test]
    fn build_structure_matches_lattice_and_species() {
        let doc = minimal_doc();
        let structure = doc.build_structure().unwrap();
        assert_eq!(structure.species, vec![13]);
        assert_eq!(structure.num_sites(), 1);
    }

    #[test]
    fn json_round_trip_preserves_composition() {
        let doc = minimal_doc();
        let text = doc.to_json().unwrap();
        let restored = SqsConfig::from_json(&text).unwrap();
        assert_eq!(restored.composition, doc.composition);
        assert_eq!(restored.keep, doc.keep);
    }

    #[test]
    fn setup_resolves_single_permutation_for_single_atom_sublattice() {
        let mut doc = minimal_doc();
        doc.iteration_mode = IterationModeDoc::Systematic;
        let (contexts, optimizer_config) = doc.setup(None).unwrap();
        assert_eq!(contexts.len(), 1);
        assert_eq!(optimizer_config.iterations, 1);
    }
}
