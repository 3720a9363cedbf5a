//! Spectral grids and resampling of opacities onto them.
//!
//! All interpolation here is linear in linear opacity. Taking logs is left to whoever stores
//! the result.

use std::{path::Path, str::FromStr};

use crate::errors::OpacityErr;

/// Value used outside the domain of the source grid when interpolating line-by-line opacities.
pub const INTERP_FLOOR: f64 = 1.0e-50;
/// Smallest opacity allowed on the output grid.
pub const VALUE_FLOOR: f64 = 1.0e-200;
/// Microns per wavenumber, `wavelength [um] = MICRON_WAVENUMBER / wavenumber [1/cm]`.
pub const MICRON_WAVENUMBER: f64 = 1.0e4;

/// Wavenumber grid of constant resolving power `resolution` between two wavelengths in microns.
///
/// Wavelengths are a geometric progression from `min_wavelength` with ratio
/// `(2R + 1) / (2R - 1)`, continued until `max_wavelength` is reached or passed. The result is
/// in 1/cm and strictly increasing.
pub fn constant_resolution_grid(
    min_wavelength: f64,
    max_wavelength: f64,
    resolution: f64,
) -> Result<Vec<f64>, OpacityErr> {
    if !(min_wavelength > 0.0 && max_wavelength > min_wavelength) {
        return Err(OpacityErr::InvalidConfig(format!(
            "wavelength range {} to {} um is empty",
            min_wavelength, max_wavelength
        )));
    }
    if !(resolution > 0.5) {
        return Err(OpacityErr::InvalidConfig(format!(
            "resolving power {} is too small",
            resolution
        )));
    }

    let spacing = (2.0 * resolution + 1.0) / (2.0 * resolution - 1.0);
    let npts = (max_wavelength / min_wavelength).ln() / spacing.ln();
    let size = npts.ceil() as usize + 1;

    let mut wavelengths = Vec::with_capacity(size);
    let mut wl = min_wavelength;
    for _ in 0..size {
        wavelengths.push(wl);
        wl *= spacing;
    }

    Ok(wavelengths
        .into_iter()
        .rev()
        .map(|wl| MICRON_WAVENUMBER / wl)
        .collect())
}

/// Native wavenumber grid of a line-by-line calculation.
///
/// Each pair of neighbouring `edges` is split into `points_per_bin` evenly spaced points that
/// include the lower edge and exclude the upper one.
pub fn line_by_line_grid(edges: &[f64], points_per_bin: usize) -> Result<Vec<f64>, OpacityErr> {
    if edges.len() < 2 || points_per_bin == 0 {
        return Err(OpacityErr::InvalidConfig(
            "need at least two bin edges and one point per bin".to_owned(),
        ));
    }
    if edges.windows(2).any(|w| !(w[1] > w[0])) {
        return Err(OpacityErr::InvalidConfig(
            "bin edges must be strictly increasing".to_owned(),
        ));
    }

    let mut grid = Vec::with_capacity((edges.len() - 1) * points_per_bin);
    for w in edges.windows(2) {
        let step = (w[1] - w[0]) / points_per_bin as f64;
        grid.extend((0..points_per_bin).map(|i| w[0] + step * i as f64));
    }

    Ok(grid)
}

/// Piecewise linear interpolation of `(xp, fp)` at the points `x`.
///
/// `xp` must be increasing. Points below `xp[0]` get `left`, points above the last value of
/// `xp` get `right`. `fp` must be as long as `xp`.
pub fn interp(
    x: &[f64],
    xp: &[f64],
    fp: &[f64],
    left: f64,
    right: f64,
) -> Result<Vec<f64>, OpacityErr> {
    if xp.len() != fp.len() {
        return Err(OpacityErr::LengthMismatch {
            expected: xp.len(),
            actual: fp.len(),
        });
    }

    let y = x
        .iter()
        .map(|&xi| {
            let n = xp.len();
            if n == 0 || xi < xp[0] {
                return left;
            }
            if xi > xp[n - 1] {
                return right;
            }

            let j = xp.partition_point(|&v| v <= xi);
            if j >= n {
                return fp[n - 1];
            }
            let (x0, x1) = (xp[j - 1], xp[j]);
            let (f0, f1) = (fp[j - 1], fp[j]);
            if xi == x0 {
                f0
            } else {
                f0 + (f1 - f0) * (xi - x0) / (x1 - x0)
            }
        })
        .collect();

    Ok(y)
}

/// Moves opacities onto a coarser constant resolution grid.
///
/// Opacities are first interpolated onto a fine grid at the legacy resolving power, then every
/// `stride`-th point is kept. No second interpolation takes place.
#[derive(Clone, Debug)]
pub struct Resampler {
    interp_grid: Vec<f64>,
    output_grid: Vec<f64>,
    stride: usize,
}

impl Resampler {
    /// Build the fine and output grids between two wavelengths in microns.
    pub fn new(
        min_wavelength: f64,
        max_wavelength: f64,
        new_resolution: f64,
        old_resolution: f64,
    ) -> Result<Self, OpacityErr> {
        let interp_grid = constant_resolution_grid(min_wavelength, max_wavelength, old_resolution)?;

        let stride = (old_resolution / new_resolution).floor();
        if !(stride >= 1.0) {
            return Err(OpacityErr::InvalidConfig(format!(
                "new resolving power {} exceeds the legacy resolving power {}",
                new_resolution, old_resolution
            )));
        }
        let stride = stride as usize;

        let output_grid = interp_grid.iter().copied().step_by(stride).collect();

        Ok(Resampler {
            interp_grid,
            output_grid,
            stride,
        })
    }

    /// The fine grid at the legacy resolving power.
    pub fn interp_grid(&self) -> &[f64] {
        &self.interp_grid
    }

    /// The decimated output grid.
    pub fn output_grid(&self) -> &[f64] {
        &self.output_grid
    }

    /// Decimation factor between the two grids.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Interpolate onto the fine grid, floored at [`VALUE_FLOOR`].
    ///
    /// Fails with `LengthMismatch` unless there is one value per wavenumber.
    pub fn interpolate(
        &self,
        wavenumbers: &[f64],
        values: &[f64],
    ) -> Result<Vec<f64>, OpacityErr> {
        let mut dset = interp(
            &self.interp_grid,
            wavenumbers,
            values,
            INTERP_FLOOR,
            INTERP_FLOOR,
        )?;
        for v in dset.iter_mut().filter(|v| **v < VALUE_FLOOR) {
            *v = VALUE_FLOOR;
        }
        Ok(dset)
    }

    /// Interpolate onto the fine grid and decimate onto the output grid.
    pub fn resample(&self, wavenumbers: &[f64], values: &[f64]) -> Result<Vec<f64>, OpacityErr> {
        Ok(self
            .interpolate(wavenumbers, values)?
            .into_iter()
            .step_by(self.stride)
            .collect())
    }

    /// Add another absorber, interpolated straight onto the output grid, to resampled values.
    ///
    /// `resampled` must be on the output grid.
    pub fn add_absorber(
        &self,
        resampled: &mut [f64],
        absorber: &CrossSection,
    ) -> Result<(), OpacityErr> {
        if resampled.len() != self.output_grid.len() {
            return Err(OpacityErr::LengthMismatch {
                expected: self.output_grid.len(),
                actual: resampled.len(),
            });
        }

        let extra = interp(
            &self.output_grid,
            &absorber.wavenumbers,
            &absorber.values,
            VALUE_FLOOR,
            VALUE_FLOOR,
        )?;
        for (y, x) in resampled.iter_mut().zip(extra) {
            *y += x;
        }
        Ok(())
    }
}

/// A cross section tabulated on increasing wavenumber, e.g. photolysis cross sections.
#[derive(Clone, Debug, PartialEq)]
pub struct CrossSection {
    /// Wavenumbers in 1/cm.
    pub wavenumbers: Vec<f64>,
    /// Cross sections in cm^2/molecule.
    pub values: Vec<f64>,
}

impl CrossSection {
    /// Load a two column text file of `wavelength [nm]` and `cross section [cm^2]`.
    pub fn read(path: &Path) -> Result<Self, OpacityErr> {
        std::fs::read_to_string(path)?.parse()
    }
}

impl FromStr for CrossSection {
    type Err = OpacityErr;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mut rows: Vec<(f64, f64)> = vec![];

        for line in text.lines().filter(|line| !line.trim().is_empty()) {
            let malformed = |reason: &str| OpacityErr::MalformedRecord {
                line: line.to_owned(),
                reason: reason.to_owned(),
            };

            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() != 2 {
                return Err(malformed("expected 2 fields"));
            }
            let wavelength: f64 = fields[0]
                .parse()
                .map_err(|_| malformed("wavelength is not a number"))?;
            let value: f64 = fields[1]
                .parse()
                .map_err(|_| malformed("cross section is not a number"))?;
            if !(wavelength > 0.0) {
                return Err(malformed("wavelength must be positive"));
            }

            // nm -> um -> 1/cm
            rows.push((MICRON_WAVENUMBER / (wavelength / 1.0e3), value));
        }

        rows.sort_by(|a, b| a.0.total_cmp(&b.0));

        let (wavenumbers, values) = rows.into_iter().unzip();
        Ok(CrossSection {
            wavenumbers,
            values,
        })
    }
}

#[cfg(test)]
mod unit {
    use super::*;

    #[test]
    fn test_constant_resolution_grid() {
        let r = 100.0;
        let grid = constant_resolution_grid(1.0, 2.0, r).unwrap();

        assert!(grid.windows(2).all(|w| w[1] > w[0]));
        assert!((grid[grid.len() - 1] - 1.0e4).abs() < 1.0e-9);
        assert!(MICRON_WAVENUMBER / grid[0] >= 2.0);

        let spacing = (2.0 * r + 1.0) / (2.0 * r - 1.0);
        let expected_len = ((2.0_f64).ln() / spacing.ln()).ceil() as usize + 1;
        assert_eq!(grid.len(), expected_len);

        for w in grid.windows(2) {
            assert!((w[1] / w[0] - spacing).abs() < 1.0e-12);
        }

        assert!(constant_resolution_grid(2.0, 1.0, r).is_err());
        assert!(constant_resolution_grid(1.0, 2.0, 0.25).is_err());
    }

    #[test]
    fn test_line_by_line_grid() {
        let grid = line_by_line_grid(&[10.0, 20.0, 40.0], 5).unwrap();

        assert_eq!(
            grid,
            vec![10.0, 12.0, 14.0, 16.0, 18.0, 20.0, 24.0, 28.0, 32.0, 36.0]
        );
        assert!(line_by_line_grid(&[20.0, 10.0], 5).is_err());
        assert!(line_by_line_grid(&[10.0], 5).is_err());
    }

    #[test]
    fn test_interp() {
        let xp = [1.0, 2.0, 4.0];
        let fp = [10.0, 20.0, 0.0];

        let y = interp(&[0.0, 1.0, 1.5, 2.0, 3.0, 4.0, 5.0], &xp, &fp, -1.0, -2.0).unwrap();
        assert_eq!(y, vec![-1.0, 10.0, 15.0, 20.0, 10.0, 0.0, -2.0]);
    }

    #[test]
    fn test_short_values_are_rejected() {
        let resampler = Resampler::new(1.0, 1.1, 100.0, 1000.0).unwrap();
        let grid = resampler.interp_grid().to_vec();
        let values = vec![1.0e-22; grid.len() - 1];

        match resampler.resample(&grid, &values) {
            Err(OpacityErr::LengthMismatch { expected, actual }) => {
                assert_eq!(expected, grid.len());
                assert_eq!(actual, grid.len() - 1);
            }
            other => panic!("expected a length mismatch, got {:?}", other),
        }
        assert!(resampler.interpolate(&grid, &[]).is_err());

        let absorber = CrossSection {
            wavenumbers: vec![1.0, 2.0],
            values: vec![1.0e-18],
        };
        let mut y = vec![0.0; resampler.output_grid().len()];
        assert!(resampler.add_absorber(&mut y, &absorber).is_err());

        let absorber = CrossSection {
            wavenumbers: vec![1.0, 2.0],
            values: vec![1.0e-18, 1.0e-18],
        };
        assert!(resampler.add_absorber(&mut y[1..], &absorber).is_err());
    }

    #[test]
    fn test_out_of_domain_values_use_floor() {
        let resampler = Resampler::new(1.0, 1.1, 100.0, 1000.0).unwrap();
        let grid = resampler.interp_grid();

        // Source data only covers the middle of the grid.
        let mid = grid[grid.len() / 2];
        let wno = [mid - 1.0, mid + 1.0];
        let values = [1.0e-30, 1.0e-30];

        let dset = resampler.interpolate(&wno, &values).unwrap();
        assert_eq!(dset[0], INTERP_FLOOR);
        assert_eq!(dset[dset.len() - 1], INTERP_FLOOR);
        assert_eq!(dset[grid.len() / 2], 1.0e-30);
    }

    #[test]
    fn test_tiny_values_clamped() {
        let resampler = Resampler::new(1.0, 1.1, 100.0, 1000.0).unwrap();
        let grid = resampler.interp_grid();

        let wno = [grid[0] - 1.0, grid[grid.len() - 1] + 1.0];
        let dset = resampler.interpolate(&wno, &[0.0, 1.0e-250]).unwrap();

        assert!(dset.iter().all(|&v| v == VALUE_FLOOR));
    }

    #[test]
    fn test_stride_one_reproduces_fine_grid() {
        let resampler = Resampler::new(1.0, 1.2, 500.0, 500.0).unwrap();
        assert_eq!(resampler.stride(), 1);
        assert_eq!(resampler.output_grid(), resampler.interp_grid());

        let grid = resampler.interp_grid();
        let values: Vec<f64> = grid.iter().map(|w| 1.0e-22 * w).collect();

        assert_eq!(
            resampler.resample(grid, &values).unwrap(),
            resampler.interpolate(grid, &values).unwrap()
        );
        assert_eq!(resampler.resample(grid, &values).unwrap(), values);
    }

    #[test]
    fn test_decimated_grid() {
        let resampler = Resampler::new(0.5, 5.5, 1000.0, 15000.0).unwrap();
        let fine = resampler.interp_grid();
        let out = resampler.output_grid();

        assert_eq!(resampler.stride(), 15);
        assert!(out.windows(2).all(|w| w[1] > w[0]));
        assert_eq!(out.len(), (fine.len() + 14) / 15);
        assert_eq!(out[1], fine[15]);

        let values: Vec<f64> = fine.iter().map(|w| w * 1.0e-24).collect();
        let y = resampler.resample(fine, &values).unwrap();
        assert_eq!(y.len(), out.len());
        for (yi, wi) in y.iter().zip(out) {
            assert_eq!(*yi, wi * 1.0e-24);
        }

        assert!(Resampler::new(0.5, 5.5, 20000.0, 15000.0).is_err());
    }

    #[test]
    fn test_add_absorber() {
        let resampler = Resampler::new(1.0, 1.1, 100.0, 1000.0).unwrap();
        let out = resampler.output_grid().to_vec();
        let mid = out[out.len() / 2];

        let absorber = CrossSection {
            wavenumbers: vec![mid - 0.5, mid + 0.5],
            values: vec![1.0e-18, 1.0e-18],
        };

        let mut y = vec![1.0e-20; out.len()];
        resampler.add_absorber(&mut y, &absorber).unwrap();

        assert_eq!(y[0], 1.0e-20 + VALUE_FLOOR);
        assert_eq!(y[out.len() / 2], 1.0e-20 + 1.0e-18);
    }

    #[test]
    fn test_cross_section_from_text() {
        let xs: CrossSection = "100.0 1e-17\n200.0 2e-17\n\n".parse().unwrap();

        assert_eq!(xs.wavenumbers.len(), 2);
        assert!((xs.wavenumbers[0] - 5.0e4).abs() < 1.0e-6);
        assert!((xs.wavenumbers[1] - 1.0e5).abs() < 1.0e-6);
        assert_eq!(xs.values, vec![2.0e-17, 1.0e-17]);

        assert!("100.0".parse::<CrossSection>().is_err());
        assert!("100.0 x".parse::<CrossSection>().is_err());
    }
}
