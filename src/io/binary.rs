//! `bincode`-backed (de)serialization.
//!
//! Specialization is compile-time, via the [`BinaryCodec`] trait: a blanket
//! impl over `Serialize + DeserializeOwned` monomorphizes per type rather
//! than dispatching through a trait object.

use crate::config::SqsConfig;
use crate::core::structure::Structure;
use crate::error::BinaryError;
use crate::results::{ResultCollection, SqsResult};
use crate::stats::{Statistics, Timing};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Anything this module can save/load. Blanket-implemented for every
/// `Serialize + DeserializeOwned` type already in the crate (tensors via
/// `Grid2`/`Grid3`'s own derives, `Structure`, `SqsConfig`, `SqsResult`) so
/// no type needs a hand-written impl.
pub trait BinaryCodec: Sized {
    fn save(&self) -> Result<Vec<u8>, BinaryError>;
    fn load(bytes: &[u8]) -> Result<Self, BinaryError>;
}

impl<T: Serialize + DeserializeOwned> BinaryCodec for T {
    fn save(&self) -> Result<Vec<u8>, BinaryError> {
        bincode::serialize(self).map_err(BinaryError::Codec)
    }

    fn load(bytes: &[u8]) -> Result<Self, BinaryError> {
        bincode::deserialize(bytes).map_err(BinaryError::Codec)
    }
}

pub fn save<T: BinaryCodec>(value: &T) -> Result<Vec<u8>, BinaryError> {
    value.save()
}

pub fn load<T: BinaryCodec>(bytes: &[u8]) -> Result<T, BinaryError> {
    T::load(bytes)
}

/// A vector whose sorted-ness is an invariant of the encoding, not just a
/// construction-time fact: `load` re-sorts after decode rather than trusting
/// the bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SortedVec<T: Ord>(pub Vec<T>);

impl<T: Ord + Serialize + DeserializeOwned> SortedVec<T> {
    pub fn save(&self) -> Result<Vec<u8>, BinaryError> {
        bincode::serialize(&self.0).map_err(BinaryError::Codec)
    }

    pub fn load(bytes: &[u8]) -> Result<Self, BinaryError> {
        let mut values: Vec<T> = bincode::deserialize(bytes).map_err(BinaryError::Codec)?;
        values.sort();
        Ok(Self(values))
    }
}

/// A serializable snapshot of [`Statistics`] (the live type holds atomics
/// and a mutex, neither `Serialize`). Timings are stored in the fixed order
/// `{total, sync, chunk_setup, loop}`; `comm` is omitted from the wire format
/// but kept in-process.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StatsRecord {
    pub finished: u64,
    pub working: u64,
    pub best_rank: u64,
    pub best_objective: f64,
    pub timings_ns: [u64; 4],
}

impl StatsRecord {
    pub fn of(stats: &Statistics) -> Self {
        Self {
            finished: stats.finished_count(),
            working: stats.working_count(),
            best_rank: stats
                .best_rank()
                .and_then(|r| num_traits::ToPrimitive::to_u64(&r))
                .unwrap_or(0),
            best_objective: stats.best_objective(),
            timings_ns: [
                stats.timing(Timing::Total).as_nanos() as u64,
                stats.timing(Timing::Sync).as_nanos() as u64,
                stats.timing(Timing::ChunkSetup).as_nanos() as u64,
                stats.timing(Timing::Loop).as_nanos() as u64,
            ],
        }
    }
}

/// The on-disk/wire form of a completed search: config, final statistics,
/// and every retained result flattened out of its objective grouping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultPack {
    pub config: SqsConfig,
    pub statistics: StatsRecord,
    pub results: Vec<SqsResult>,
}

impl ResultPack {
    pub fn from_collection(config: SqsConfig, statistics: &Statistics, results: ResultCollection) -> Self {
        let flat = results.finish().into_iter().flat_map(|(_, rs)| rs).collect();
        Self {
            config,
            statistics: StatsRecord::of(statistics),
            results: flat,
        }
    }

    /// Reinserts `results` through [`ResultCollection::insert`] to restore
    /// objective grouping.
    pub fn regroup(&self, keep: usize) -> ResultCollection {
        let collection = ResultCollection::new(keep.max(1));
        for result in &self.results {
            collection.insert(result.clone());
        }
        collection
    }
}

pub fn save_structure(structure: &Structure) -> Result<Vec<u8>, BinaryError> {
    save(structure)
}

pub fn load_structure(bytes: &[u8]) -> Result<Structure, BinaryError> {
    load(bytes)
}
