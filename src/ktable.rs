//! Correlated-k tables written as `.npz` archives.
//!
//! An archive holds the arrays
//!
//! - `species`, the species name as 50 space padded bytes,
//! - `notes`, free text provenance as 1000 space padded bytes,
//! - `weights`, `T`, `log10P` and `wavelengths`,
//! - `log10k`, indexed `[wavelength, temperature, pressure, weight]`.
//!
//! Every numeric array is single precision.
//!
//! Named subsets of the wavelengths, e.g. the solar and infrared parts, go in a separate
//! [`SPLITS_FILE`] archive next to the tables.

use std::{
    collections::BTreeMap,
    io::{Read, Seek},
    path::Path,
};

use chrono::NaiveDate;
use log::info;
use ndarray::{Array4, ArrayView4};
use npyz::WriterBuilder;

use crate::{
    errors::OpacityErr,
    grid::{check_axis, is_close},
    reshape::KDistribution,
};

/// Capacity of the species field in bytes.
pub const SPECIES_CAPACITY: usize = 50;
/// Capacity of the notes field in bytes.
pub const NOTES_CAPACITY: usize = 1000;
/// Name of the archive holding the wavelength splits.
pub const SPLITS_FILE: &str = "bins.npz";
/// Cross sections are clipped to at least this before taking logs, cm^2/molecule.
pub const KCOEFF_FLOOR: f64 = 1.0e-60;
/// Relative tolerance for checking pressures against a reference grid.
pub const PRESSURE_TOLERANCE: f64 = 1.0e-10;

// Tolerances for checking g-ordinates against the quadrature weights.
const G_RELATIVE_TOLERANCE: f64 = 1.0e-5;
const G_ABSOLUTE_TOLERANCE: f64 = 1.0e-8;

/// Repository holding the HELIOS-K configuration used to make the tables.
pub const DEFAULT_REPOSITORY: &str = "https://github.com/Nicholaswogan/HELIOS-K";

/// A correlated-k table for one species.
#[derive(Clone, Debug, PartialEq)]
pub struct KTable {
    /// Species name.
    pub species: String,
    /// Provenance notes.
    pub notes: String,
    /// Quadrature weights of the g-ordinates.
    pub weights: Vec<f64>,
    /// Temperatures in K.
    pub temperatures: Vec<f64>,
    /// log10 of pressure in bar.
    pub log10_pressures: Vec<f64>,
    /// Wavelengths of the spectral bins in microns, either centers or edges.
    pub wavelengths: Vec<f64>,
    /// log10 of cross sections in cm^2/molecule, indexed `[weight, pressure, temperature, bin]`.
    pub log10_k: Array4<f64>,
}

/// Who made a set of tables, from what, and when.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Provenance {
    /// Repository with the HELIOS-K setup.
    pub repository: String,
    /// Commit of that repository.
    pub commit: Option<String>,
    /// Date the tables were made.
    pub date: NaiveDate,
    /// Person who made them.
    pub creator: String,
}

/// Build the notes stored with every table.
pub fn make_notes(provenance: &Provenance) -> Result<String, OpacityErr> {
    let notes = format!(
        "These k-coefficients were created with HITEMP and HITRAN
line lists processed with HELIOS-k. HELIOS-k parameters and
data used are given at this github repository and commit,

repository: {}
commit: {}

Date: {}
Creator: {}

units:
wavelengths: [um]
log10P: [bar]
T: [K]
log10k: [cm^2/molecule], dimensions (len(weights),len(log10P),len(T),len(wavelengths))
",
        provenance.repository,
        provenance.commit.as_deref().unwrap_or("unknown"),
        provenance.date.format("%-m/%-d/%y"),
        provenance.creator,
    );

    check_capacity("notes", &notes, NOTES_CAPACITY)?;
    Ok(notes)
}

/// Edges of the g bins for a set of quadrature weights, starting at 0.
pub fn weights_to_bins(weights: &[f64]) -> Vec<f64> {
    std::iter::once(0.0)
        .chain(weights.iter().scan(0.0, |sum, w| {
            *sum += w;
            Some(*sum)
        }))
        .collect()
}

fn check_capacity(field: &'static str, text: &str, capacity: usize) -> Result<(), OpacityErr> {
    if text.len() >= capacity {
        return Err(OpacityErr::OverCapacity {
            field,
            len: text.len(),
            capacity,
        });
    }
    Ok(())
}

fn fixed_width(text: &str, capacity: usize) -> Vec<u8> {
    let mut bytes = text.as_bytes().to_vec();
    bytes.resize(capacity, b' ');
    bytes
}

impl KTable {
    /// Turn a filled k-distribution into a table.
    ///
    /// The g-ordinates found in the data must be the midpoints of the bins made by `weights`,
    /// and the pressures must match `reference_pressures` when it is given.
    pub fn from_distribution(
        species: &str,
        notes: String,
        kdist: KDistribution,
        weights: &[f64],
        wavelengths: &[f64],
        reference_pressures: Option<&[f64]>,
    ) -> Result<Self, OpacityErr> {
        let KDistribution { axes, kcoeff } = kdist;

        if let Some(reference) = reference_pressures {
            check_axis(&axes.pressures, reference, PRESSURE_TOLERANCE, "pressure")?;
        }

        let bins = weights_to_bins(weights);
        let midpoints: Vec<f64> = bins.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect();
        if midpoints.len() != axes.weights.len() {
            return Err(OpacityErr::LengthMismatch {
                expected: midpoints.len(),
                actual: axes.weights.len(),
            });
        }
        if let Some((&g, _)) = axes
            .weights
            .iter()
            .zip(&midpoints)
            .find(|(&g, &m)| !is_close(g, m, G_RELATIVE_TOLERANCE, G_ABSOLUTE_TOLERANCE))
        {
            return Err(OpacityErr::GridMismatch {
                axis: "weight",
                value: g,
            });
        }

        let log10_k = kcoeff.mapv(|k| k.max(KCOEFF_FLOOR).log10());
        let log10_pressures = axes.pressures.iter().map(|p| p.log10()).collect();

        Ok(KTable {
            species: species.to_owned(),
            notes,
            weights: weights.to_vec(),
            temperatures: axes.temperatures,
            log10_pressures,
            wavelengths: wavelengths.to_vec(),
            log10_k,
        })
    }

    fn check(&self) -> Result<(), OpacityErr> {
        check_capacity("species", &self.species, SPECIES_CAPACITY)?;
        check_capacity("notes", &self.notes, NOTES_CAPACITY)?;

        let (ng, np, nt, nw) = self.log10_k.dim();
        for &(expected, actual) in &[
            (ng, self.weights.len()),
            (np, self.log10_pressures.len()),
            (nt, self.temperatures.len()),
        ] {
            if expected != actual {
                return Err(OpacityErr::LengthMismatch { expected, actual });
            }
        }
        if self.wavelengths.len() != nw && self.wavelengths.len() != nw + 1 {
            return Err(OpacityErr::LengthMismatch {
                expected: nw,
                actual: self.wavelengths.len(),
            });
        }

        Ok(())
    }

    /// Write the table. Nothing is created if the table is inconsistent.
    pub fn write(&self, path: &Path) -> Result<(), OpacityErr> {
        self.check()?;

        let mut npz = npyz::npz::NpzWriter::create(path).map_err(archive_err)?;

        write_array(
            &mut npz,
            "species",
            &[SPECIES_CAPACITY as u64],
            fixed_width(&self.species, SPECIES_CAPACITY),
        )?;
        write_array(
            &mut npz,
            "notes",
            &[NOTES_CAPACITY as u64],
            fixed_width(&self.notes, NOTES_CAPACITY),
        )?;

        for (name, values) in &[
            ("weights", &self.weights),
            ("T", &self.temperatures),
            ("log10P", &self.log10_pressures),
            ("wavelengths", &self.wavelengths),
        ] {
            write_array(
                &mut npz,
                name,
                &[values.len() as u64],
                values.iter().map(|&v| v as f32),
            )?;
        }

        let transposed = self.log10_k.view().permuted_axes([3, 2, 1, 0]);
        let shape: Vec<u64> = transposed.shape().iter().map(|&n| n as u64).collect();
        write_array(
            &mut npz,
            "log10k",
            &shape,
            transposed.iter().map(|&v| v as f32),
        )?;

        info!("wrote {} to {}", self.species, path.display());
        Ok(())
    }

    /// Read a table written by [`KTable::write`].
    ///
    /// Values come back at the single precision they were stored with.
    pub fn read(path: &Path) -> Result<Self, OpacityErr> {
        let mut npz = npyz::npz::NpzArchive::open(path).map_err(archive_err)?;

        let (_, species) = read_array::<u8, _>(&mut npz, "species")?;
        let (_, notes) = read_array::<u8, _>(&mut npz, "notes")?;
        let (_, weights) = read_array::<f32, _>(&mut npz, "weights")?;
        let (_, temperatures) = read_array::<f32, _>(&mut npz, "T")?;
        let (_, log10_pressures) = read_array::<f32, _>(&mut npz, "log10P")?;
        let (_, wavelengths) = read_array::<f32, _>(&mut npz, "wavelengths")?;
        let (shape, log10_k) = read_array::<f32, _>(&mut npz, "log10k")?;

        if shape.len() != 4 {
            return Err(OpacityErr::GeneralError(format!(
                "log10k has {} dimensions, expected 4",
                shape.len()
            )));
        }
        let (nw, nt, np, ng) = (
            shape[0] as usize,
            shape[1] as usize,
            shape[2] as usize,
            shape[3] as usize,
        );
        let log10_k: Vec<f64> = log10_k.into_iter().map(f64::from).collect();
        let log10_k = ArrayView4::from_shape((nw, nt, np, ng), &log10_k)?
            .permuted_axes([3, 2, 1, 0])
            .to_owned();

        let to_f64 = |v: Vec<f32>| v.into_iter().map(f64::from).collect();
        let to_string = |v: Vec<u8>| String::from_utf8_lossy(&v).trim_end().to_owned();

        Ok(KTable {
            species: to_string(species),
            notes: to_string(notes),
            weights: to_f64(weights),
            temperatures: to_f64(temperatures),
            log10_pressures: to_f64(log10_pressures),
            wavelengths: to_f64(wavelengths),
            log10_k,
        })
    }
}

/// Write each named subset of the wavelengths as a single precision array.
pub fn write_wavelength_splits(
    path: &Path,
    splits: &BTreeMap<String, Vec<f64>>,
) -> Result<(), OpacityErr> {
    let mut npz = npyz::npz::NpzWriter::create(path).map_err(archive_err)?;

    for (name, wavelengths) in splits {
        write_array(
            &mut npz,
            name,
            &[wavelengths.len() as u64],
            wavelengths.iter().map(|&v| v as f32),
        )?;
    }

    info!("wrote {} wavelength splits to {}", splits.len(), path.display());
    Ok(())
}

fn archive_err<E: std::fmt::Display>(err: E) -> OpacityErr {
    OpacityErr::GeneralError(format!("npz archive: {}", err))
}

fn write_array<W, T, I>(
    npz: &mut npyz::npz::NpzWriter<W>,
    name: &str,
    shape: &[u64],
    values: I,
) -> Result<(), OpacityErr>
where
    W: std::io::Write + Seek,
    T: npyz::AutoSerialize,
    I: IntoIterator<Item = T>,
{
    let mut writer = npz
        .array(name, Default::default())
        .map_err(archive_err)?
        .default_dtype()
        .shape(shape)
        .begin_nd()?;
    writer.extend(values)?;
    writer.finish()?;

    Ok(())
}

fn read_array<T, R>(
    npz: &mut npyz::npz::NpzArchive<R>,
    name: &str,
) -> Result<(Vec<u64>, Vec<T>), OpacityErr>
where
    T: npyz::Deserialize,
    R: Read + Seek,
{
    let npy = npz
        .by_name(name)
        .map_err(archive_err)?
        .ok_or_else(|| OpacityErr::GeneralError(format!("archive has no array '{}'", name)))?;
    let shape = npy.shape().to_vec();
    Ok((shape, npy.into_vec()?))
}

#[cfg(test)]
mod unit {
    use super::*;

    use crate::grid::AxisSet;
    use tempdir::TempDir;

    fn provenance() -> Provenance {
        Provenance {
            repository: DEFAULT_REPOSITORY.to_owned(),
            commit: Some("0123abc".to_owned()),
            date: NaiveDate::from_ymd_opt(2025, 9, 12).unwrap(),
            creator: "A. Tester".to_owned(),
        }
    }

    fn table(notes: String) -> KTable {
        let log10_k = Array4::from_shape_fn((2, 3, 4, 5), |(ig, ip, it, iw)| {
            -20.0 - ig as f64 - 0.1 * ip as f64 - 0.01 * it as f64 - 0.001 * iw as f64
        });

        KTable {
            species: "CO2".to_owned(),
            notes,
            weights: vec![0.5, 0.5],
            temperatures: vec![100.0, 200.0, 300.0, 400.0],
            log10_pressures: vec![-2.0, 0.0, 2.0],
            wavelengths: vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            log10_k,
        }
    }

    #[test]
    fn test_notes() {
        let notes = make_notes(&provenance()).unwrap();

        assert!(notes.contains("commit: 0123abc"));
        assert!(notes.contains("Date: 9/12/25"));
        assert!(notes.contains("Creator: A. Tester"));
        assert!(notes.len() < NOTES_CAPACITY);

        let long = Provenance {
            creator: "x".repeat(NOTES_CAPACITY),
            ..provenance()
        };
        assert!(make_notes(&long).is_err());
    }

    #[test]
    fn test_weights_to_bins() {
        assert_eq!(weights_to_bins(&[0.25, 0.5, 0.25]), vec![0.0, 0.25, 0.75, 1.0]);
    }

    #[test]
    fn test_write_and_read_back() {
        let tmp = TempDir::new("opacity-tables-ktable").unwrap();
        let path = tmp.path().join("CO2.npz");

        let original = table(make_notes(&provenance()).unwrap());
        original.write(&path).unwrap();

        let back = KTable::read(&path).unwrap();
        assert_eq!(back.species, "CO2");
        assert_eq!(back.notes, original.notes.trim_end());
        assert_eq!(back.temperatures, original.temperatures);
        assert_eq!(back.wavelengths, original.wavelengths);
        assert_eq!(back.log10_k.dim(), (2, 3, 4, 5));
        for (a, b) in back.log10_k.iter().zip(original.log10_k.iter()) {
            assert_eq!(*a, f64::from(*b as f32));
        }

        // The stored array is transposed.
        let mut npz = npyz::npz::NpzArchive::open(&path).unwrap();
        let (shape, values) = read_array::<f32, _>(&mut npz, "log10k").unwrap();
        assert_eq!(shape, vec![5, 4, 3, 2]);
        assert_eq!(values[1], original.log10_k[[1, 0, 0, 0]] as f32);
        assert_eq!(values[2], original.log10_k[[0, 1, 0, 0]] as f32);
    }

    #[test]
    fn test_over_capacity_notes_not_written() {
        let tmp = TempDir::new("opacity-tables-ktable").unwrap();
        let path = tmp.path().join("CO2.npz");

        match table("n".repeat(1001)).write(&path) {
            Err(OpacityErr::OverCapacity {
                field,
                len,
                capacity,
            }) => {
                assert_eq!(field, "notes");
                assert_eq!(len, 1001);
                assert_eq!(capacity, NOTES_CAPACITY);
            }
            other => panic!("expected an over capacity error, got {:?}", other),
        }
        assert!(!path.exists());

        let mut t = table(String::new());
        t.species = "s".repeat(SPECIES_CAPACITY);
        assert!(t.write(&path).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_inconsistent_axes_not_written() {
        let tmp = TempDir::new("opacity-tables-ktable").unwrap();
        let path = tmp.path().join("CO2.npz");

        let mut t = table(String::new());
        t.temperatures.pop();
        assert!(t.write(&path).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_from_distribution() {
        let axes = AxisSet {
            weights: vec![0.125, 0.625],
            temperatures: vec![200.0, 300.0],
            pressures: vec![1.0e-2, 1.0],
            weight_counts: vec![0, 1],
        };
        let mut kcoeff = Array4::from_elem((2, 2, 2, 3), 1.0e-20);
        kcoeff[[0, 0, 0, 0]] = 0.0;
        let kdist = KDistribution { axes, kcoeff };

        let weights = [0.25, 0.75];
        let t = KTable::from_distribution(
            "H2O",
            String::new(),
            kdist.clone(),
            &weights,
            &[1.0, 2.0, 3.0, 4.0],
            Some(&[1.0e-2, 1.0]),
        )
        .unwrap();

        assert!((t.log10_k[[0, 0, 0, 0]] + 60.0).abs() < 1.0e-12);
        assert!((t.log10_k[[1, 1, 1, 2]] + 20.0).abs() < 1.0e-12);
        assert_eq!(t.log10_pressures, vec![-2.0, 0.0]);
        assert_eq!(t.weights, weights.to_vec());

        assert!(KTable::from_distribution(
            "H2O",
            String::new(),
            kdist.clone(),
            &weights,
            &[1.0, 2.0, 3.0, 4.0],
            Some(&[1.0e-2, 2.0]),
        )
        .is_err());

        assert!(KTable::from_distribution(
            "H2O",
            String::new(),
            kdist,
            &[0.5, 0.5],
            &[1.0, 2.0, 3.0, 4.0],
            None,
        )
        .is_err());
    }

    #[test]
    fn test_wavelength_splits() {
        let tmp = TempDir::new("opacity-tables-ktable").unwrap();
        let path = tmp.path().join(SPLITS_FILE);

        let mut splits = BTreeMap::new();
        splits.insert("sol_wavl".to_owned(), vec![0.1, 0.2, 0.5]);
        splits.insert("ir_wavl".to_owned(), vec![0.5, 10.0]);
        write_wavelength_splits(&path, &splits).unwrap();

        let mut npz = npyz::npz::NpzArchive::open(&path).unwrap();
        let (shape, sol) = read_array::<f32, _>(&mut npz, "sol_wavl").unwrap();
        assert_eq!(shape, vec![3]);
        assert_eq!(sol, vec![0.1_f32, 0.2, 0.5]);
        let (_, ir) = read_array::<f32, _>(&mut npz, "ir_wavl").unwrap();
        assert_eq!(ir, vec![0.5_f32, 10.0]);
        assert!(read_array::<f32, _>(&mut npz, "log10k").is_err());
    }

}
