//! An sqlite database of line-by-line and continuum opacities.
//!
//! The database has three tables. `header` holds one row with the units and the wavenumber
//! grid every opacity vector is tabulated on. `molecular` holds one row per molecule,
//! temperature and pressure, and `continuum` one row per molecule pair and temperature.
//! Opacity vectors are stored as `.npy` encoded blobs.

use std::path::PathBuf;

pub use self::blob::{decode_array, encode_array};

/// The database.
#[derive(Debug)]
pub struct OpacityDb {
    path: PathBuf,                 // The database file.
    db_conn: rusqlite::Connection, // An sqlite connection.
}

mod add_data;
mod blob;
mod query;
mod root;

/// Units recorded in the header row.
#[allow(missing_docs)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Units {
    pub pressure: String,
    pub temperature: String,
    pub continuum: String,
    pub molecular: String,
}

impl Default for Units {
    fn default() -> Self {
        Units {
            pressure: "bar".to_owned(),
            temperature: "kelvin".to_owned(),
            continuum: "cm-1 amagat-2".to_owned(),
            molecular: "cm2/molecule".to_owned(),
        }
    }
}

/// The header row.
#[derive(Clone, Debug, PartialEq)]
pub struct HeaderRecord {
    /// Units of the stored values.
    pub units: Units,
    /// Wavenumbers in 1/cm shared by every opacity vector.
    pub wavenumber_grid: Vec<f64>,
}

/// A row of the `molecular` table.
#[allow(missing_docs)]
#[derive(Clone, Debug, PartialEq)]
pub struct OpacityRecord {
    pub id: i64,
    pub ptid: i64,
    pub molecule: String,
    pub pressure: f64,
    pub temperature: f64,
    pub opacity: Vec<f64>,
}

/// Row key for the `it`-th temperature and `ip`-th pressure of a molecule.
pub fn point_index(it: usize, ip: usize, n_pressures: usize) -> usize {
    ip + it * n_pressures
}
