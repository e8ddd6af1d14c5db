//! A parallel search engine for Special Quasirandom Structures (SQS):
//! given a crystal structure, a target composition and a target short-range
//! order, searches the space of atomic arrangements for ones whose bond
//! statistics best match that target.
//!
//! [`core`] holds rank arithmetic, geometry, and the structural data model.
//! [`setup`] assembles per-sublattice search contexts. [`shuffle`] generates
//! seeded candidates. [`objective`] counts bonds and scores short-range
//! order. [`results`] keeps a deduplicated top-K collection. [`stats`] tracks
//! progress counters and timings. [`optimizer`] is the parallel search
//! driver. [`comm`] gathers results across simulated processes. [`io`]
//! handles binary (de)serialization. [`config`] is the configuration
//! document.

pub mod comm;
pub mod config;
pub mod core;
pub mod error;
pub mod io;
pub mod objective;
pub mod optimizer;
pub mod results;
pub mod setup;
pub mod shuffle;
pub mod stats;

pub use config::SqsConfig;
pub use core::composition::{Composition, Sublattice};
pub use core::lattice::Lattice;
pub use core::rank::Rank;
pub use core::species::{Configuration, Species};
pub use core::structure::Structure;
pub use error::{BinaryError, ConfigError, ErrorCode, RankError};
pub use optimizer::{Optimizer, OptimizerConfig};
pub use results::{ResultCollection, SqsResult};
pub use setup::{IterationMode, OptimizationSetup, ShellRadiiPolicy, SubLatticeContext, SublatticeMode};
pub use stats::Statistics;
