//! Serialization at the engine's edges.

pub mod binary;

pub use binary::{BinaryCodec, ResultPack, SortedVec, StatsRecord};
