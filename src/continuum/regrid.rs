//! Re-gridding CIA tables onto the fixed temperature and wavelength axes.

use log::debug;
use ndarray::Array2;

use super::{ContinuumTable, PairOpacity};
use crate::{errors::OpacityErr, spectral::MICRON_WAVENUMBER};

/// log10 opacity returned for queries outside the padded table.
pub const OUT_OF_BOUNDS_LOG10: f64 = -153.826_324_46;

/// Relative offset of the synthetic wavelength points beyond either end of a table.
const WAVELENGTH_PAD_FRACTION: f64 = 1.0e-4;
/// Synthetic temperature added below every table, K.
const MIN_PAD_TEMPERATURE: f64 = 0.0;
/// Synthetic temperature added above every table, K.
const MAX_PAD_TEMPERATURE: f64 = 10_000.0;

const FIRST_OUTPUT_TEMPERATURE: f64 = 40.0;
const LAST_OUTPUT_TEMPERATURE: f64 = 3_000.0;
const OUTPUT_TEMPERATURE_STEP: f64 = 20.0;

const MIN_OUTPUT_WAVELENGTH: f64 = 0.1;
const MAX_OUTPUT_WAVELENGTH: f64 = 250.0;
const N_OUTPUT_WAVELENGTHS: usize = 1000;

// Standard conditions in cgs units.
const STP_PRESSURE_ATM: f64 = 1.0;
const DYNE_PER_CM2_PER_ATM: f64 = 1.013e6;
const STP_TEMPERATURE: f64 = 273.15;
const BOLTZMANN: f64 = 1.3807e-16;

/// Number density of an ideal gas at standard conditions in molecules/cm^3.
///
/// An opacity in cm^-1 amagat^-2 times the square of this is in cm^5 molecule^-2.
pub fn amagat_scale() -> f64 {
    STP_PRESSURE_ATM * DYNE_PER_CM2_PER_ATM / (BOLTZMANN * STP_TEMPERATURE)
}

/// Temperatures of the re-gridded tables, 40 K to 3000 K every 20 K.
pub fn output_temperatures() -> Vec<f64> {
    let n = ((LAST_OUTPUT_TEMPERATURE - FIRST_OUTPUT_TEMPERATURE) / OUTPUT_TEMPERATURE_STEP)
        .round() as usize
        + 1;
    (0..n)
        .map(|i| FIRST_OUTPUT_TEMPERATURE + OUTPUT_TEMPERATURE_STEP * i as f64)
        .collect()
}

/// Wavelengths of the re-gridded tables in microns, log spaced.
pub fn output_wavelengths() -> Vec<f64> {
    let start = MIN_OUTPUT_WAVELENGTH.log10();
    let stop = MAX_OUTPUT_WAVELENGTH.log10();
    let step = (stop - start) / (N_OUTPUT_WAVELENGTHS - 1) as f64;

    (0..N_OUTPUT_WAVELENGTHS)
        .map(|i| 10.0_f64.powf(start + step * i as f64))
        .collect()
}

/// Bilinear interpolation on a rectilinear grid.
#[derive(Clone, Debug)]
pub struct BilinearGrid {
    x: Vec<f64>,
    y: Vec<f64>,
    z: Array2<f64>,
    fill: f64,
}

impl BilinearGrid {
    /// `z[[i, j]]` is the value at `(x[i], y[j])`. Queries outside the axes return `fill`.
    pub fn new(x: Vec<f64>, y: Vec<f64>, z: Array2<f64>, fill: f64) -> Result<Self, OpacityErr> {
        if x.len() < 2 || y.len() < 2 {
            return Err(OpacityErr::InvalidConfig(
                "interpolation needs at least two points on each axis".to_owned(),
            ));
        }
        if z.dim() != (x.len(), y.len()) {
            return Err(OpacityErr::LengthMismatch {
                expected: x.len() * y.len(),
                actual: z.len(),
            });
        }
        for axis in &[&x, &y] {
            if axis.windows(2).any(|w| !(w[1] > w[0])) {
                return Err(OpacityErr::InvalidConfig(
                    "interpolation axes must be strictly increasing".to_owned(),
                ));
            }
        }

        Ok(BilinearGrid { x, y, z, fill })
    }

    /// Value at `(x, y)`.
    pub fn eval(&self, x: f64, y: f64) -> f64 {
        let (ix, tx) = match cell(&self.x, x) {
            Some(c) => c,
            None => return self.fill,
        };
        let (iy, ty) = match cell(&self.y, y) {
            Some(c) => c,
            None => return self.fill,
        };

        let z = &self.z;
        (1.0 - tx) * (1.0 - ty) * z[[ix, iy]]
            + tx * (1.0 - ty) * z[[ix + 1, iy]]
            + (1.0 - tx) * ty * z[[ix, iy + 1]]
            + tx * ty * z[[ix + 1, iy + 1]]
    }
}

// Lower index of the cell holding `v` and the fractional position inside it.
fn cell(axis: &[f64], v: f64) -> Option<(usize, f64)> {
    let n = axis.len();
    if !(v >= axis[0] && v <= axis[n - 1]) {
        return None;
    }

    let i = axis.partition_point(|&a| a <= v).saturating_sub(1).min(n - 2);
    Some((i, (v - axis[i]) / (axis[i + 1] - axis[i])))
}

impl ContinuumTable {
    /// Interpolator over `(temperature, wavelength)` for the pair in column `column`.
    ///
    /// The table is padded first. Two wavelengths 0.01% beyond either end repeat the nearest
    /// tabulated opacities, and so do two temperatures at 0 K and 10000 K.
    pub fn padded_interpolator(&self, column: usize) -> Result<BilinearGrid, OpacityErr> {
        let pair = self.pairs.get(column).ok_or_else(|| {
            OpacityErr::InvalidConfig(format!("table has no column {}", column))
        })?;

        // Zero wavenumber is an infinite wavelength, it can't be placed on the axis.
        let columns: Vec<usize> = (0..self.wavenumbers.len())
            .rev()
            .filter(|&iw| self.wavenumbers[iw] > 0.0)
            .collect();
        if columns.is_empty() {
            return Err(OpacityErr::InvalidConfig(format!(
                "{} has no positive wavenumbers",
                pair.pair
            )));
        }

        let nt = self.temperatures.len();
        if nt == 0
            || self.temperatures[0] <= MIN_PAD_TEMPERATURE
            || self.temperatures[nt - 1] >= MAX_PAD_TEMPERATURE
        {
            return Err(OpacityErr::InvalidConfig(format!(
                "{} temperatures must lie strictly between {} K and {} K",
                pair.pair, MIN_PAD_TEMPERATURE, MAX_PAD_TEMPERATURE
            )));
        }

        let mut temperatures = Vec::with_capacity(nt + 2);
        temperatures.push(MIN_PAD_TEMPERATURE);
        temperatures.extend_from_slice(&self.temperatures);
        temperatures.push(MAX_PAD_TEMPERATURE);

        let inner: Vec<f64> = columns
            .iter()
            .map(|&iw| MICRON_WAVENUMBER / self.wavenumbers[iw])
            .collect();
        let mut wavelengths = Vec::with_capacity(inner.len() + 2);
        wavelengths.push(inner[0] * (1.0 - WAVELENGTH_PAD_FRACTION));
        wavelengths.extend_from_slice(&inner);
        wavelengths.push(inner[inner.len() - 1] * (1.0 + WAVELENGTH_PAD_FRACTION));

        let nw = wavelengths.len();
        let z = Array2::from_shape_fn((nt + 2, nw), |(i, j)| {
            let it = i.saturating_sub(1).min(nt - 1);
            let iw = columns[j.saturating_sub(1).min(columns.len() - 1)];
            pair.log10_opacity[[it, iw]]
        });

        BilinearGrid::new(temperatures, wavelengths, z, OUT_OF_BOUNDS_LOG10)
    }

    /// Evaluate every pair on the fixed output axes and convert to cm^5 molecule^-2.
    ///
    /// The result is tabulated on increasing wavenumber.
    pub fn regrid(&self) -> Result<ContinuumTable, OpacityErr> {
        let temperatures = output_temperatures();
        let wavelengths: Vec<f64> = output_wavelengths().into_iter().rev().collect();
        let wavenumbers = wavelengths.iter().map(|wl| MICRON_WAVENUMBER / wl).collect();

        let scale2 = amagat_scale().powi(2);

        let pairs = (0..self.pairs.len())
            .map(|column| -> Result<PairOpacity, OpacityErr> {
                let interpolator = self.padded_interpolator(column)?;
                let log10_opacity =
                    Array2::from_shape_fn((temperatures.len(), wavelengths.len()), |(i, j)| {
                        let log10_xs = interpolator.eval(temperatures[i], wavelengths[j]);
                        (10.0_f64.powf(log10_xs) * scale2).log10()
                    });

                debug!("re-gridded {}", self.pairs[column].pair);

                Ok(PairOpacity {
                    pair: self.pairs[column].pair.clone(),
                    log10_opacity,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ContinuumTable {
            wavenumbers,
            temperatures,
            pairs,
        })
    }
}

/// Re-grid several source tables and gather every pair into one table.
pub fn regrid_all(tables: &[ContinuumTable]) -> Result<ContinuumTable, OpacityErr> {
    let mut merged = ContinuumTable {
        wavenumbers: output_wavelengths()
            .into_iter()
            .rev()
            .map(|wl| MICRON_WAVENUMBER / wl)
            .collect(),
        temperatures: output_temperatures(),
        pairs: vec![],
    };

    for table in tables {
        let regridded = table.regrid()?;
        for pair in regridded.pairs {
            if merged.pairs.iter().any(|p| p.pair == pair.pair) {
                return Err(OpacityErr::InvalidConfig(format!(
                    "molecule pair {} appears in more than one table",
                    pair.pair
                )));
            }
            merged.pairs.push(pair);
        }
    }

    Ok(merged)
}
