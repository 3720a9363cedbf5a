//! Batch drivers that turn a directory of HELIOS-K results into opacity products.
//!
//! [`build_opacity_db`] resamples line-by-line results onto a constant resolution grid and
//! stores them, with CIA opacities, in an [`OpacityDb`]. [`build_ktables`] gathers
//! correlated-k results into one [`KTable`] archive per species.
//!
//! Species are processed one at a time and each one's arrays are dropped before the next is
//! loaded.

use std::{
    collections::BTreeMap,
    fmt::Display,
    path::{Path, PathBuf},
};

use log::{info, warn};
use ndarray::s;

use crate::{
    continuum::{regrid_all, ContinuumTable},
    database::{OpacityDb, Units},
    errors::OpacityErr,
    grid::{check_axis, parse_records, AxisSet, RELATIVE_TOLERANCE},
    ktable::{make_notes, write_wavelength_splits, KTable, Provenance, SPLITS_FILE},
    reshape::{bin_file_path, read_bin_results, read_cross_section_blob, reshape_cross_sections, BinOrder},
    spectral::{line_by_line_grid, CrossSection, Resampler},
};

/// Resolving power of the line-by-line grid the resampler interpolates onto before decimating.
pub const DEFAULT_OLD_RESOLUTION: f64 = 1.0e6;
/// Points HELIOS-K computes in each line-by-line bin.
pub const DEFAULT_POINTS_PER_BIN: usize = 100_000;

/// A CIA table and the names of its opacity columns.
#[derive(Clone, Debug, PartialEq)]
pub struct CiaSource {
    /// Path to the table.
    pub path: PathBuf,
    /// Molecule pair of each opacity column, in order.
    pub pairs: Vec<String>,
}

/// Everything needed to build an opacity database.
#[derive(Clone, Debug, PartialEq)]
pub struct DbBuildConfig {
    /// Directory with the `Out_<molecule>.bin` and `Out_<molecule>_bin0000.dat` files.
    pub results_dir: PathBuf,
    /// Database to create. Any existing file is replaced.
    pub db_path: PathBuf,
    /// Shortest wavelength of the output grid in microns.
    pub min_wavelength: f64,
    /// Longest wavelength of the output grid in microns.
    pub max_wavelength: f64,
    /// Resolving power of the output grid.
    pub new_resolution: f64,
    /// Resolving power interpolated onto before decimating.
    pub old_resolution: f64,
    /// Edges of the line-by-line bins in 1/cm, in either order.
    pub bin_edges: Vec<f64>,
    /// Points computed in each line-by-line bin.
    pub points_per_bin: usize,
    /// Temperatures the results must be on, if known.
    pub temperatures: Option<Vec<f64>>,
    /// Pressures of the results in bar. Read from the results when not given.
    pub pressures: Option<Vec<f64>>,
    /// Extra cross section file to add to a molecule.
    pub cross_sections: BTreeMap<String, PathBuf>,
    /// CIA tables to store in the continuum table.
    pub cia_sources: Vec<CiaSource>,
    /// Write the re-gridded CIA table here as text.
    pub continuum_dump: Option<PathBuf>,
    /// Units recorded in the header.
    pub units: Units,
    /// Carry on with the next molecule when one fails.
    pub keep_going: bool,
}

impl DbBuildConfig {
    /// A configuration with defaults for everything but the inputs that have none.
    ///
    /// The database is named after the wavelength range and resolving power and is placed in
    /// the current directory.
    pub fn new(
        results_dir: &Path,
        min_wavelength: f64,
        max_wavelength: f64,
        new_resolution: f64,
        bin_edges: Vec<f64>,
    ) -> Self {
        DbBuildConfig {
            results_dir: results_dir.to_path_buf(),
            db_path: PathBuf::from(default_db_name(
                min_wavelength,
                max_wavelength,
                new_resolution,
            )),
            min_wavelength,
            max_wavelength,
            new_resolution,
            old_resolution: DEFAULT_OLD_RESOLUTION,
            bin_edges,
            points_per_bin: DEFAULT_POINTS_PER_BIN,
            temperatures: None,
            pressures: None,
            cross_sections: BTreeMap::new(),
            cia_sources: vec![],
            continuum_dump: None,
            units: Units::default(),
            keep_going: false,
        }
    }
}

/// Default database file name for a wavelength range and resolving power.
pub fn default_db_name(min_wavelength: f64, max_wavelength: f64, new_resolution: f64) -> String {
    format!(
        "opacities_photochem_{}_{}_R{}.db",
        min_wavelength, max_wavelength, new_resolution
    )
}

/// Everything needed to build correlated-k tables.
#[derive(Clone, Debug, PartialEq)]
pub struct KTableConfig {
    /// Species to process.
    pub species: Vec<String>,
    /// Directory with the `Out_<species>_bin<NNNN>.dat` files.
    pub results_dir: PathBuf,
    /// Directory the `<species>.npz` tables are written to.
    pub output_dir: PathBuf,
    /// Number of spectral bins.
    pub n_bins: usize,
    /// Quadrature weights of the g-ordinates.
    pub weights: Vec<f64>,
    /// Wavelengths of the spectral bins in microns.
    pub wavelengths: Vec<f64>,
    /// Pressures in bar the results must be on, if known.
    pub pressures: Option<Vec<f64>>,
    /// Numbering of the results files.
    pub order: BinOrder,
    /// Provenance written into the notes.
    pub provenance: Provenance,
    /// Named subsets of the wavelengths written to [`SPLITS_FILE`], none when empty.
    pub wavelength_splits: BTreeMap<String, Vec<f64>>,
    /// Carry on with the next species when one fails.
    pub keep_going: bool,
}

/// What a batch run managed to do.
#[derive(Debug, Default)]
pub struct BuildReport {
    /// Species or molecules that were stored.
    pub completed: Vec<String>,
    /// Species or molecules that failed, with the reason.
    pub failed: Vec<(String, OpacityErr)>,
}

impl BuildReport {
    fn record<T>(
        &mut self,
        name: &str,
        result: Result<T, OpacityErr>,
        keep_going: bool,
    ) -> Result<(), OpacityErr> {
        match result {
            Ok(_) => {
                self.completed.push(name.to_owned());
                Ok(())
            }
            Err(err) if keep_going => {
                warn!("skipping {}: {}", name, err);
                self.failed.push((name.to_owned(), err));
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}

/// Read a whitespace separated list of numbers, e.g. bin edges or a pressure grid.
pub fn read_numbers(path: &Path) -> Result<Vec<f64>, OpacityErr> {
    let text = std::fs::read_to_string(path)?;
    parse_numbers(&text, path.display())
}

fn parse_numbers<D: Display>(text: &str, source: D) -> Result<Vec<f64>, OpacityErr> {
    text.split_whitespace()
        .map(|field| {
            field.parse::<f64>().map_err(|_| OpacityErr::MalformedRecord {
                line: field.to_owned(),
                reason: format!("not a number in {}", source),
            })
        })
        .collect()
}

/// Molecules with a line-by-line results blob in `results_dir`, sorted by name.
pub fn discover_molecules(results_dir: &Path) -> Result<Vec<String>, OpacityErr> {
    let mut molecules = vec![];

    for entry in std::fs::read_dir(results_dir)? {
        let name = entry?.file_name();
        let name = name.to_string_lossy();
        if let Some(molecule) = name
            .strip_prefix("Out_")
            .and_then(|rest| rest.strip_suffix(".bin"))
        {
            if !molecule.is_empty() {
                molecules.push(molecule.to_owned());
            }
        }
    }

    molecules.sort();
    Ok(molecules)
}

/// Build a line-by-line and continuum opacity database.
///
/// The database is created from scratch, the header is written, then every discovered molecule
/// is resampled and inserted, and finally the CIA tables are re-gridded and inserted.
pub fn build_opacity_db(config: &DbBuildConfig) -> Result<BuildReport, OpacityErr> {
    let mut edges = config.bin_edges.clone();
    if edges.first() > edges.last() {
        edges.reverse();
    }
    let lbl_grid = line_by_line_grid(&edges, config.points_per_bin)?;

    let resampler = Resampler::new(
        config.min_wavelength,
        config.max_wavelength,
        config.new_resolution,
        config.old_resolution,
    )?;
    info!(
        "output grid has {} points, stride {}",
        resampler.output_grid().len(),
        resampler.stride()
    );

    let db = OpacityDb::create(&config.db_path)?;
    db.write_header(&config.units, resampler.output_grid())?;

    let mut report = BuildReport::default();
    for molecule in discover_molecules(&config.results_dir)? {
        info!("Working on {}", molecule);
        let result = insert_line_by_line(&db, config, &molecule, &lbl_grid, &resampler);
        report.record(&molecule, result, config.keep_going)?;
    }

    if !config.cia_sources.is_empty() {
        info!("Working on continuum");
        let tables = config
            .cia_sources
            .iter()
            .map(|source| ContinuumTable::read(&source.path, &source.pairs))
            .collect::<Result<Vec<_>, _>>()?;
        let regridded = regrid_all(&tables)?;

        if let Some(dump) = &config.continuum_dump {
            let file = std::io::BufWriter::new(std::fs::File::create(dump)?);
            regridded.write_to(file)?;
        }

        let records = regridded.restructure(resampler.output_grid())?;
        let num_rows = db.insert_continuum(&records)?;
        info!("inserted {} continuum rows", num_rows);
    }

    Ok(report)
}

fn insert_line_by_line(
    db: &OpacityDb,
    config: &DbBuildConfig,
    molecule: &str,
    lbl_grid: &[f64],
    resampler: &Resampler,
) -> Result<usize, OpacityErr> {
    let first_bin = bin_file_path(&config.results_dir, molecule, 0);
    let axes = AxisSet::from_samples(&parse_records(&std::fs::read_to_string(first_bin)?)?);

    if let Some(expected) = &config.temperatures {
        check_axis(&axes.temperatures, expected, RELATIVE_TOLERANCE, "temperature")?;
    }
    let temperatures = axes.temperatures;
    let pressures = config.pressures.clone().unwrap_or(axes.pressures);

    let blob = read_cross_section_blob(
        &config
            .results_dir
            .join(format!("Out_{}.bin", molecule)),
    )?;
    let xs = reshape_cross_sections(blob, temperatures.len(), pressures.len(), lbl_grid.len())?;

    let absorber = config
        .cross_sections
        .get(molecule)
        .map(|path| CrossSection::read(path))
        .transpose()?;

    db.insert_molecule(molecule, &temperatures, &pressures, |it, ip| {
        let native: Vec<f64> = xs.slice(s![it, ip, ..]).iter().map(|&v| f64::from(v)).collect();
        let mut resampled = resampler.resample(lbl_grid, &native)?;
        if let Some(absorber) = &absorber {
            resampler.add_absorber(&mut resampled, absorber)?;
        }
        Ok(resampled)
    })
}

/// Build one correlated-k table per species.
pub fn build_ktables(config: &KTableConfig) -> Result<BuildReport, OpacityErr> {
    if config.wavelengths.len() != config.n_bins && config.wavelengths.len() != config.n_bins + 1 {
        return Err(OpacityErr::InvalidConfig(format!(
            "{} wavelengths given for {} bins",
            config.wavelengths.len(),
            config.n_bins
        )));
    }

    let notes = make_notes(&config.provenance)?;
    std::fs::create_dir_all(&config.output_dir)?;

    if !config.wavelength_splits.is_empty() {
        write_wavelength_splits(
            &config.output_dir.join(SPLITS_FILE),
            &config.wavelength_splits,
        )?;
    }

    let mut report = BuildReport::default();
    for species in &config.species {
        info!("Working on {}", species);
        let result = write_ktable(config, species, &notes);
        report.record(species, result, config.keep_going)?;
    }

    Ok(report)
}

fn write_ktable(config: &KTableConfig, species: &str, notes: &str) -> Result<(), OpacityErr> {
    let kdist = read_bin_results(&config.results_dir, species, config.n_bins, config.order)?;

    let table = KTable::from_distribution(
        species,
        notes.to_owned(),
        kdist,
        &config.weights,
        &config.wavelengths,
        config.pressures.as_deref(),
    )?;

    table.write(&config.output_dir.join(format!("{}.npz", species)))
}
