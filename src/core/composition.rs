use crate::core::species::Species;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A disjoint subset of sites with an independent composition constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sublattice {
    pub sites: Vec<usize>,
    /// Number of atoms of each species placed on `sites`.
    pub counts: BTreeMap<Species, usize>,
}

impl Sublattice {
    pub fn num_sites(&self) -> usize {
        self.sites.len()
    }

    /// The species multiset in canonical (ascending atomic number) order.
    pub fn canonical_species(&self) -> Vec<Species> {
        let mut out = Vec::with_capacity(self.sites.len());
        for (&species, &count) in &self.counts {
            out.extend(std::iter::repeat(species).take(count));
        }
        out
    }

    fn validate(&self, index: usize) -> Result<(), ConfigError> {
        if self.sites.is_empty() {
            return Err(ConfigError::out_of_range(
                "composition.sites",
                format!("sublattice {index} has an empty site selector"),
            ));
        }
        let total: usize = self.counts.values().sum();
        if total != self.sites.len() {
            return Err(ConfigError::bad_value(
                "composition",
                format!(
                    "sublattice {index}: counts sum to {total} but {} sites were selected",
                    self.sites.len()
                ),
            ));
        }
        Ok(())
    }
}

/// An ordered list of sublattices. Sites across sublattices must be disjoint;
/// their union may be a proper subset of all structure sites.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Composition(pub Vec<Sublattice>);

impl Composition {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen: BTreeSet<usize> = BTreeSet::new();
        for (index, sublattice) in self.0.iter().enumerate() {
            sublattice.validate(index)?;
            for &site in &sublattice.sites {
                if !seen.insert(site) {
                    return Err(ConfigError::bad_value(
                        "sites",
                        format!("site {site} is claimed by more than one sublattice"),
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn num_sublattices(&self) -> usize {
        self.0.len()
    }

    pub fn all_sites(&self) -> Vec<usize> {
        self.0.iter().flat_map(|sl| sl.sites.iter().copied()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sublattice(sites: Vec<usize>, counts: &[(Species, usize)]) -> Sublattice {
        Sublattice {
            sites,
            counts: counts.iter().cloned().collect(),
        }
    }

    #[test]
    fn empty_sites_is_out_of_range() {
        let comp = Composition(vec![sublattice(vec![], &[])]);
        let err = comp.validate().unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::OutOfRange);
    }

    #[test]
    fn overlapping_sites_is_bad_value() {
        let comp = Composition(vec![
            sublattice(vec![0, 1], &[(1, 1), (2, 1)]),
            sublattice(vec![1, 2], &[(1, 1), (2, 1)]),
        ]);
        let err = comp.validate().unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::BadValue);
        assert_eq!(err.key, "sites");
    }

    #[test]
    fn mismatched_counts_is_bad_value() {
        let comp = Composition(vec![sublattice(vec![0, 1, 2], &[(1, 1), (2, 1)])]);
        let err = comp.validate().unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::BadValue);
    }

    #[test]
    fn canonical_species_is_ascending() {
        let sl = sublattice(vec![0, 1, 2, 3], &[(13, 2), (8, 2)]);
        assert_eq!(sl.canonical_species(), vec![8, 8, 13, 13]);
    }
}
