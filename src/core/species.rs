use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A chemical species identifier: an atomic number in `0..=118`. The engine
/// packs species by ascending atomic number.
pub type Species = u8;

/// A fixed-length sequence of species identifiers; index `i` names lattice
/// site `i`.
pub type Configuration = Vec<Species>;

/// Counts each species occurring in `conf`, in ascending-species order.
pub fn histogram(conf: &[Species]) -> BTreeMap<Species, usize> {
    let mut hist = BTreeMap::new();
    for &s in conf {
        *hist.entry(s).or_insert(0) += 1;
    }
    hist
}

/// The packed-species remapping: species that actually occur get remapped
/// into the contiguous range `0..S`, ordered by ascending atomic number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesPacking {
    /// `map[species] = packed index`
    pub map: BTreeMap<Species, usize>,
    /// `rmap[packed index] = species`
    pub rmap: Vec<Species>,
}

impl SpeciesPacking {
    pub fn from_species(species: &[Species]) -> Self {
        let mut unique: Vec<Species> = species.to_vec();
        unique.sort_unstable();
        unique.dedup();
        let map = unique
            .iter()
            .enumerate()
            .map(|(idx, &s)| (s, idx))
            .collect();
        Self { map, rmap: unique }
    }

    pub fn num_species(&self) -> usize {
        self.rmap.len()
    }

    pub fn pack(&self, conf: &[Species]) -> Vec<usize> {
        conf.iter().map(|s| self.map[s]).collect()
    }

    pub fn unpack(&self, packed: &[usize]) -> Configuration {
        packed.iter().map(|&p| self.rmap[p]).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packing_is_ascending_and_invertible() {
        let species = vec![13, 8, 8, 13, 3];
        let packing = SpeciesPacking::from_species(&species);
        assert_eq!(packing.rmap, vec![3, 8, 13]);
        let packed = packing.pack(&species);
        assert_eq!(packed, vec![2, 1, 1, 2, 0]);
        assert_eq!(packing.unpack(&packed), species);
    }
}
