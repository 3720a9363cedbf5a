//! Reshaping raw HELIOS-K output into dense opacity grids.
//!
//! Two kinds of output are handled. Line-by-line runs leave one flat binary blob per molecule
//! holding every `(temperature, pressure, wavenumber)` cross section. Correlated-k runs leave one
//! text file per spectral bin holding the k-distribution samples for every temperature and
//! pressure. Neither step interpolates, values are only moved into place.

use std::path::{Path, PathBuf};

use log::debug;
use ndarray::{Array3, Array4};
use strum_macros::{AsRefStr, EnumIter, EnumString, IntoStaticStr};

use crate::{
    errors::OpacityErr,
    grid::{parse_records, AxisSet, SampleTriple},
};

/// Placeholder held by grid cells that have not been written yet.
pub const UNFILLED: f64 = -1.0;

/// Reshape a flat line-by-line blob into an array indexed `[temperature, pressure, wavenumber]`.
///
/// The wavenumber index varies fastest in `data`, then pressure, then temperature.
pub fn reshape_cross_sections(
    data: Vec<f32>,
    n_temperatures: usize,
    n_pressures: usize,
    n_wavenumbers: usize,
) -> Result<Array3<f32>, OpacityErr> {
    let expected = n_temperatures * n_pressures * n_wavenumbers;
    if data.len() != expected {
        return Err(OpacityErr::LengthMismatch {
            expected,
            actual: data.len(),
        });
    }

    Ok(Array3::from_shape_vec(
        (n_temperatures, n_pressures, n_wavenumbers),
        data,
    )?)
}

/// Load a blob of little endian `f32` values.
pub fn read_cross_section_blob(path: &Path) -> Result<Vec<f32>, OpacityErr> {
    let bytes = std::fs::read(path)?;
    decode_f32_le(&bytes)
}

fn decode_f32_le(bytes: &[u8]) -> Result<Vec<f32>, OpacityErr> {
    const WIDTH: usize = std::mem::size_of::<f32>();

    if bytes.len() % WIDTH != 0 {
        return Err(OpacityErr::LengthMismatch {
            expected: (bytes.len() / WIDTH + 1) * WIDTH,
            actual: bytes.len(),
        });
    }

    Ok(bytes
        .chunks_exact(WIDTH)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

/// How the numbering of per-bin files relates to the spectral bins of the output grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumString, AsRefStr, IntoStaticStr, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum BinOrder {
    /// File `l` holds output bin `l`.
    Ascending,
    /// File `l` holds output bin `n - 1 - l`. HELIOS-K numbers bins by descending wavenumber.
    Descending,
}

impl BinOrder {
    /// The output bin for file number `file_bin` out of `n_bins`.
    pub fn output_bin(self, file_bin: usize, n_bins: usize) -> usize {
        match self {
            BinOrder::Ascending => file_bin,
            BinOrder::Descending => n_bins - file_bin - 1,
        }
    }
}

/// A filled k-distribution grid and its axes.
#[derive(Clone, Debug)]
pub struct KDistribution {
    /// Axes found in the first bin of the source data.
    pub axes: AxisSet,
    /// Cross sections indexed `[weight, pressure, temperature, bin]`.
    pub kcoeff: Array4<f64>,
}

/// Fills a `[weight, pressure, temperature, bin]` grid one spectral bin at a time.
///
/// The axes are fixed by the first bin added, every later bin must land on them.
#[derive(Debug)]
pub struct KGridBuilder {
    n_bins: usize,
    order: BinOrder,
    state: Option<(AxisSet, Array4<f64>)>,
}

impl KGridBuilder {
    /// Start a grid with `n_bins` spectral bins numbered in `order`.
    pub fn new(n_bins: usize, order: BinOrder) -> Self {
        KGridBuilder {
            n_bins,
            order,
            state: None,
        }
    }

    /// Place the samples of source file `file_bin`.
    pub fn add_bin(&mut self, file_bin: usize, samples: &[SampleTriple]) -> Result<(), OpacityErr> {
        if file_bin >= self.n_bins {
            return Err(OpacityErr::InvalidConfig(format!(
                "bin {} is out of range for {} bins",
                file_bin, self.n_bins
            )));
        }
        let bin = self.order.output_bin(file_bin, self.n_bins);

        let n_bins = self.n_bins;
        let (axes, kcoeff) = self.state.get_or_insert_with(|| {
            let axes = AxisSet::from_samples(samples);
            let (ng, np, nt) = axes.shape();
            let kcoeff = Array4::from_elem((ng, np, nt, n_bins), UNFILLED);
            (axes, kcoeff)
        });

        for sample in samples {
            let idx = axes.index(sample)?;
            kcoeff[[idx.weight, idx.pressure, idx.temperature, bin]] = sample.value;
        }

        Ok(())
    }

    /// Check every cell was written and hand back the grid.
    pub fn finish(self) -> Result<KDistribution, OpacityErr> {
        let (axes, kcoeff) = self.state.ok_or(OpacityErr::UnfilledCell { index: vec![] })?;

        if let Some((index, _)) = kcoeff.indexed_iter().find(|(_, &v)| !(v >= 0.0)) {
            let (ig, ip, it, ib) = index;
            return Err(OpacityErr::UnfilledCell {
                index: vec![ig, ip, it, ib],
            });
        }

        Ok(KDistribution { axes, kcoeff })
    }
}

/// Name of the results file HELIOS-K writes for a species and bin.
pub fn bin_file_name(species: &str, bin: usize) -> String {
    format!("Out_{}_bin{:04}.dat", species, bin)
}

/// Path of the results file for a species and bin in `folder`.
pub fn bin_file_path(folder: &Path, species: &str, bin: usize) -> PathBuf {
    folder.join(bin_file_name(species, bin))
}

/// Read all `n_bins` results files of a species into a filled k-distribution grid.
pub fn read_bin_results(
    folder: &Path,
    species: &str,
    n_bins: usize,
    order: BinOrder,
) -> Result<KDistribution, OpacityErr> {
    let mut builder = KGridBuilder::new(n_bins, order);

    for bin in 0..n_bins {
        let path = bin_file_path(folder, species, bin);
        let text = std::fs::read_to_string(&path)?;
        let samples = parse_records(&text)?;
        debug!("{}: {} unique samples", path.display(), samples.len());

        builder.add_bin(bin, &samples)?;
    }

    builder.finish()
}
