#![deny(missing_docs)]
//! Package to build opacity tables from HELIOS-K line-by-line and correlated-k results.
//!
//! Correlated-k results become one `.npz` table per species, line-by-line results and CIA
//! tables become an sqlite opacity database.

//
// Public API
//
pub use crate::builder::{
    build_ktables, build_opacity_db, default_db_name, discover_molecules, read_numbers,
    BuildReport, CiaSource, DbBuildConfig, KTableConfig,
};
pub use crate::cmd_line::CommonCmdLineArgs;
pub use crate::continuum::{ContinuumRecord, ContinuumTable, PairOpacity};
pub use crate::database::{HeaderRecord, OpacityDb, OpacityRecord, Units};
pub use crate::errors::OpacityErr;
pub use crate::grid::{AxisSet, GridIndex, SampleTriple};
pub use crate::ktable::{make_notes, KTable, Provenance, DEFAULT_REPOSITORY};
pub use crate::reshape::{BinOrder, KDistribution, KGridBuilder};
pub use crate::spectral::{CrossSection, Resampler};

pub mod builder;
pub mod cmd_line;
pub mod continuum;
pub mod database;
mod errors;
pub mod grid;
pub mod ktable;
pub mod reshape;
pub mod spectral;
