//! Builds the immutable, per-sublattice context an [`crate::optimizer::Optimizer`]
//! runs a search against.

mod context;
mod pairs;

pub use context::{IterationMode, OptimizationSetup, ShellRadiiPolicy, SubLatticeContext, SublatticeMode};
pub use pairs::PairRecord;
