use crate::core::composition::Composition;
use crate::core::geometry::{self, shell_matrix};
use crate::core::grid::Grid2;
use crate::core::lattice::Lattice;
use crate::core::species::{Configuration, Species};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// One site of a [`Structure`], as produced by [`Structure::sites`]. A named
/// struct rather than a raw tuple so call sites can destructure by field.
#[derive(Debug, Clone, Copy)]
pub struct Site<'a> {
    pub index: usize,
    pub frac_coords: &'a Vector3<f64>,
    pub species: Species,
}

/// An immutable periodic structure: lattice, fractional coordinates and
/// species, with lazily-memoized derived views. The distance matrix is
/// computed on first access rather than eagerly at construction, since it's
/// only needed by some call sites (`pairs`, shell-radii auto-detection) and
/// is the most expensive derived quantity here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Structure {
    pub lattice: Lattice,
    pub frac_coords: Vec<Vector3<f64>>,
    pub species: Configuration,
    #[serde(skip)]
    distances: OnceLock<Grid2<f64>>,
}

impl Structure {
    pub fn new(lattice: Lattice, frac_coords: Vec<Vector3<f64>>, species: Configuration) -> Self {
        assert_eq!(frac_coords.len(), species.len());
        Self {
            lattice,
            frac_coords,
            species,
            distances: OnceLock::new(),
        }
    }

    pub fn num_sites(&self) -> usize {
        self.species.len()
    }

    pub fn sites(&self) -> impl Iterator<Item = Site<'_>> {
        self.frac_coords
            .iter()
            .zip(self.species.iter())
            .enumerate()
            .map(|(index, (frac_coords, &species))| Site {
                index,
                frac_coords,
                species,
            })
    }

    /// The minimum-image distance matrix, computed once and cached.
    pub fn distance_matrix(&self) -> &Grid2<f64> {
        self.distances
            .get_or_init(|| geometry::distance_matrix(&self.lattice, &self.frac_coords))
    }

    pub fn shell_matrix(&self, radii: &[f64], atol: f64, rtol: f64) -> Grid2<u32> {
        shell_matrix(self.distance_matrix(), radii, atol, rtol)
    }

    /// Sorts sites by `key`, returning the new structure and the permutation
    /// `perm` such that `sorted.species[i] == self.species[perm[i]]`.
    pub fn sorted_with_indices<K: Ord>(&self, key: impl Fn(Site) -> K) -> (Structure, Vec<usize>) {
        let mut perm: Vec<usize> = (0..self.num_sites()).collect();
        perm.sort_by_key(|&i| {
            key(Site {
                index: i,
                frac_coords: &self.frac_coords[i],
                species: self.species[i],
            })
        });
        (self.sliced(&perm), perm)
    }

    /// Keeps only the listed sites, in the given order.
    pub fn sliced(&self, indices: &[usize]) -> Structure {
        assert!(!indices.is_empty(), "sliced() requires a nonempty index list");
        let frac_coords = indices.iter().map(|&i| self.frac_coords[i]).collect();
        let species = indices.iter().map(|&i| self.species[i]).collect();
        Structure::new(self.lattice.clone(), frac_coords, species)
    }

    pub fn filtered(&self, predicate: impl Fn(Site) -> bool) -> Structure {
        let indices: Vec<usize> = self
            .sites()
            .filter(|site| predicate(*site))
            .map(|site| site.index)
            .collect();
        self.sliced(&indices)
    }

    /// Tiles the unit cell `a x b x c` times, repeating species per site and
    /// translating fractional coordinates into the enlarged cell.
    pub fn supercell(&self, a: usize, b: usize, c: usize) -> Structure {
        assert!(a > 0 && b > 0 && c > 0, "supercell factors must be positive");
        let scale = Vector3::new(a as f64, b as f64, c as f64);
        let new_matrix = nalgebra::Matrix3::from_rows(&[
            self.lattice.row(0).scale(a as f64).transpose(),
            self.lattice.row(1).scale(b as f64).transpose(),
            self.lattice.row(2).scale(c as f64).transpose(),
        ]);
        let new_lattice = Lattice::from_matrix(new_matrix, self.lattice.pbc)
            .expect("scaling a valid lattice cannot make it singular");

        let mut frac_coords = Vec::with_capacity(self.num_sites() * a * b * c);
        let mut species = Vec::with_capacity(self.num_sites() * a * b * c);
        for i in 0..a {
            for j in 0..b {
                for k in 0..c {
                    let shift = Vector3::new(i as f64, j as f64, k as f64);
                    for (frac, &spec) in self.frac_coords.iter().zip(self.species.iter()) {
                        frac_coords.push((frac + shift).component_div(&scale));
                        species.push(spec);
                    }
                }
            }
        }
        Structure::new(new_lattice, frac_coords, species)
    }

    /// Sets species on the sites listed by `composition` to its canonical
    /// multiset order; sites not covered by any sublattice keep their
    /// current species.
    pub fn apply_composition(&self, composition: &Composition) -> Structure {
        let mut species = self.species.clone();
        for sublattice in &composition.0 {
            let canonical = sublattice.canonical_species();
            for (&site, spec) in sublattice.sites.iter().zip(canonical.into_iter()) {
                species[site] = spec;
            }
        }
        Structure::new(self.lattice.clone(), self.frac_coords.clone(), species)
    }

    /// `apply_composition`, then slices out one substructure per sublattice.
    pub fn apply_composition_and_decompose(&self, composition: &Composition) -> Vec<Structure> {
        let applied = self.apply_composition(composition);
        composition
            .0
            .iter()
            .map(|sl| applied.sliced(&sl.sites))
            .collect()
    }

    /// Builds the pair list `(i, j, s)` with `i < j`, `s` a weighted shell,
    /// plus the compaction map from (possibly sparse) shell keys to
    /// `0..M-1`, sorted by `(|i-j|, i)`.
    pub fn pairs(
        &self,
        radii: &[f64],
        weights: &BTreeMap<u32, f64>,
        atol: f64,
        rtol: f64,
    ) -> (Vec<(usize, usize, u32)>, BTreeMap<u32, usize>) {
        let shells = self.shell_matrix(radii, atol, rtol);
        let shell_keys: Vec<u32> = weights.keys().copied().collect();
        let shell_index_map: BTreeMap<u32, usize> = shell_keys
            .iter()
            .enumerate()
            .map(|(idx, &s)| (s, idx))
            .collect();

        let n = self.num_sites();
        let mut pair_list = Vec::new();
        for i in 0..n {
            for j in (i + 1)..n {
                let s = *shells.get(i, j);
                if weights.contains_key(&s) {
                    pair_list.push((i, j, s));
                }
            }
        }
        pair_list.sort_by_key(|&(i, j, _)| (j.abs_diff(i), i));
        (pair_list, shell_index_map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fcc_al() -> Structure {
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
        Structure::new(lattice, frac_coords, vec![13, 13, 13, 13])
    }

    #[test]
    fn sort_then_unsort_is_identity() {
        let s = fcc_al();
        let (sorted, perm) = s.sorted_with_indices(|site| std::cmp::Reverse(site.index));
        // inverse permutation restores original order
        let mut inverse = vec![0; perm.len()];
        for (new_idx, &old_idx) in perm.iter().enumerate() {
            inverse[old_idx] = new_idx;
        }
        let restored = sorted.sliced(&inverse);
        assert_eq!(restored.species, s.species);
    }

    #[test]
    fn supercell_multiplies_site_count() {
        let s = fcc_al();
        let sc = s.supercell(2, 2, 2);
        assert_eq!(sc.num_sites(), s.num_sites() * 8);
    }

    #[test]
    fn pairs_reference_only_weighted_shells() {
        let s = fcc_al();
        let d = s.distance_matrix();
        let radii = crate::core::geometry::radii_naive(d, 1e-3, 1e-5);
        let mut weights = BTreeMap::new();
        weights.insert(1, 1.0);
        let (pairs, shell_map) = s.pairs(&radii, &weights, 1e-3, 1e-5);
        assert!(!pairs.is_empty());
        for &(i, j, shell) in &pairs {
            assert!(i < j);
            assert!(shell_map.contains_key(&shell));
        }
    }
}
