//! Collision induced absorption (CIA) tables.
//!
//! The text layout read and written here is
//!
//! ```text
//! 1000 149
//! 40.0
//!            0.0      -33.0000      -33.0000
//!           20.0       -7.4572       -7.4518
//! ...
//! ```
//!
//! A `<number of wavenumbers> <number of temperatures>` line, then one block per temperature.
//! Each block is a line holding the temperature followed by one line per wavenumber holding the
//! wavenumber and the log10 opacity of every molecule pair.

use std::{io::Write, path::Path};

use log::debug;
use ndarray::Array2;

use crate::{
    errors::OpacityErr,
    grid::{is_close, ABSOLUTE_TOLERANCE, RELATIVE_TOLERANCE},
    spectral::interp,
};

pub use self::regrid::{
    amagat_scale, output_temperatures, output_wavelengths, regrid_all, BilinearGrid,
    OUT_OF_BOUNDS_LOG10,
};

mod regrid;

/// log10 opacity used on the output grid outside the tabulated wavenumbers.
pub const OUTPUT_FLOOR_LOG10: f64 = -33.0;

/// The log10 opacity of one molecule pair.
#[derive(Clone, Debug, PartialEq)]
pub struct PairOpacity {
    /// Name of the molecule pair, e.g. `H2H2`.
    pub pair: String,
    /// log10 opacity indexed `[temperature, wavenumber]`.
    pub log10_opacity: Array2<f64>,
}

/// CIA opacities of several molecule pairs on shared temperature and wavenumber axes.
#[derive(Clone, Debug, PartialEq)]
pub struct ContinuumTable {
    /// Strictly increasing wavenumbers in 1/cm.
    pub wavenumbers: Vec<f64>,
    /// Temperatures in K, one per block.
    pub temperatures: Vec<f64>,
    /// Opacity of each pair, in column order.
    pub pairs: Vec<PairOpacity>,
}

/// One row of the continuum table in the database.
#[derive(Clone, Debug, PartialEq)]
pub struct ContinuumRecord {
    /// Name of the molecule pair.
    pub pair: String,
    /// Temperature in K.
    pub temperature: f64,
    /// Linear opacity on the output wavenumber grid.
    pub opacity: Vec<f64>,
}

impl ContinuumTable {
    /// Load a table, naming its opacity columns `pairs`.
    pub fn read(path: &Path, pairs: &[String]) -> Result<Self, OpacityErr> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text, pairs)
    }

    /// Parse a table, naming its opacity columns `pairs`.
    pub fn parse(text: &str, pairs: &[String]) -> Result<Self, OpacityErr> {
        let mut lines = text.lines().filter(|line| !line.trim().is_empty());

        let header = lines.next().ok_or_else(|| malformed("", "empty table"))?;
        let counts = parse_numbers(header)?;
        if counts.len() != 2 || counts.iter().any(|c| c.fract() != 0.0 || *c < 1.0) {
            return Err(malformed(header, "expected '<wavenumbers> <temperatures>'"));
        }
        let (n_wno, n_temp) = (counts[0] as usize, counts[1] as usize);

        // The counts are untrusted, storage grows only as rows arrive.
        let mut wavenumbers = vec![];
        let mut temperatures = vec![];
        let mut values: Vec<Vec<f64>> = vec![vec![]; pairs.len()];

        for it in 0..n_temp {
            let line = lines
                .next()
                .ok_or_else(|| malformed("", "table ended before all temperature blocks"))?;
            let temperature = parse_numbers(line)?;
            if temperature.len() != 1 {
                return Err(malformed(line, "expected a single temperature"));
            }
            temperatures.push(temperature[0]);

            for iw in 0..n_wno {
                let line = lines
                    .next()
                    .ok_or_else(|| malformed("", "temperature block ended early"))?;
                let row = parse_numbers(line)?;
                if row.len() != pairs.len() + 1 {
                    return Err(malformed(
                        line,
                        &format!("expected {} columns, found {}", pairs.len() + 1, row.len()),
                    ));
                }

                if it == 0 {
                    wavenumbers.push(row[0]);
                } else if !is_close(row[0], wavenumbers[iw], RELATIVE_TOLERANCE, ABSOLUTE_TOLERANCE)
                {
                    return Err(OpacityErr::GridMismatch {
                        axis: "wavenumber",
                        value: row[0],
                    });
                }

                for (column, v) in values.iter_mut().zip(&row[1..]) {
                    column.push(*v);
                }
            }
        }

        if let Some(line) = lines.next() {
            return Err(malformed(line, "more temperature blocks than declared"));
        }
        if wavenumbers.windows(2).any(|w| !(w[1] > w[0])) {
            return Err(malformed("", "wavenumbers must be strictly increasing"));
        }

        let pairs = pairs
            .iter()
            .zip(values)
            .map(|(pair, v)| -> Result<PairOpacity, OpacityErr> {
                Ok(PairOpacity {
                    pair: pair.clone(),
                    log10_opacity: Array2::from_shape_vec((n_temp, n_wno), v)?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            "parsed CIA table with {} wavenumbers, {} temperatures, {} pairs",
            n_wno,
            n_temp,
            pairs.len()
        );

        Ok(ContinuumTable {
            wavenumbers,
            temperatures,
            pairs,
        })
    }

    /// Names of the molecule pairs in column order.
    pub fn pair_names(&self) -> Vec<String> {
        self.pairs.iter().map(|p| p.pair.clone()).collect()
    }

    /// Write the table in the layout [`ContinuumTable::parse`] reads.
    pub fn write_to<W: Write>(&self, mut out: W) -> Result<(), OpacityErr> {
        writeln!(out, "{} {}", self.wavenumbers.len(), self.temperatures.len())?;

        for (it, temperature) in self.temperatures.iter().enumerate() {
            writeln!(out, "{:.1}", temperature)?;
            for (iw, wno) in self.wavenumbers.iter().enumerate() {
                write!(out, "{:>14}", format!("{:.1}", wno))?;
                for pair in &self.pairs {
                    write!(
                        out,
                        "{:>14}",
                        format!("{:.4}", pair.log10_opacity[[it, iw]])
                    )?;
                }
                writeln!(out)?;
            }
        }

        Ok(())
    }

    /// Interpolate every temperature block onto `new_wavenumbers` and convert to linear opacity.
    ///
    /// Points outside the tabulated wavenumbers get `10^OUTPUT_FLOOR_LOG10`.
    pub fn restructure(
        &self,
        new_wavenumbers: &[f64],
    ) -> Result<Vec<ContinuumRecord>, OpacityErr> {
        let mut records = Vec::with_capacity(self.temperatures.len() * self.pairs.len());

        for (it, &temperature) in self.temperatures.iter().enumerate() {
            for pair in &self.pairs {
                let row = pair.log10_opacity.row(it).to_vec();
                let opacity = interp(
                    new_wavenumbers,
                    &self.wavenumbers,
                    &row,
                    OUTPUT_FLOOR_LOG10,
                    OUTPUT_FLOOR_LOG10,
                )?
                .into_iter()
                .map(|v| 10.0_f64.powf(v))
                .collect();

                records.push(ContinuumRecord {
                    pair: pair.pair.clone(),
                    temperature,
                    opacity,
                });
            }
        }

        Ok(records)
    }
}

fn malformed(line: &str, reason: &str) -> OpacityErr {
    OpacityErr::MalformedRecord {
        line: line.to_owned(),
        reason: reason.to_owned(),
    }
}

fn parse_numbers(line: &str) -> Result<Vec<f64>, OpacityErr> {
    line.split_whitespace()
        .map(|field| {
            field
                .parse::<f64>()
                .map_err(|_| malformed(line, &format!("'{}' is not a number", field)))
        })
        .collect()
}

#[cfg(test)]
mod unit {
    use super::*;

    const SAMPLE: &str = "3 2
75.
0.0  -33.0000  -30.0000
20.0   -7.4572   -7.4518
40.0   -6.9547   -6.9765
100.
0.0  -33.0000  -31.0000
20.0   -7.0000   -7.1000
40.0   -6.5000   -6.6000
";

    fn names() -> Vec<String> {
        vec!["H2H2".to_owned(), "H2He".to_owned()]
    }

    #[test]
    fn test_parse() {
        let table = ContinuumTable::parse(SAMPLE, &names()).unwrap();

        assert_eq!(table.wavenumbers, vec![0.0, 20.0, 40.0]);
        assert_eq!(table.temperatures, vec![75.0, 100.0]);
        assert_eq!(table.pair_names(), names());
        assert_eq!(table.pairs[0].log10_opacity.shape(), &[2, 3]);
        assert_eq!(table.pairs[0].log10_opacity[[0, 1]], -7.4572);
        assert_eq!(table.pairs[1].log10_opacity[[1, 0]], -31.0);
        assert_eq!(table.pairs[1].log10_opacity[[1, 2]], -6.6);
    }

    #[test]
    fn test_parse_wrong_column_count() {
        let names = vec!["H2H2".to_owned()];
        match ContinuumTable::parse(SAMPLE, &names) {
            Err(OpacityErr::MalformedRecord { .. }) => {}
            other => panic!("expected a malformed record, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_declared_blocks_must_match() {
        let too_few = SAMPLE.replacen("3 2", "3 3", 1);
        assert!(ContinuumTable::parse(&too_few, &names()).is_err());

        let too_many = SAMPLE.replacen("3 2", "3 1", 1);
        assert!(ContinuumTable::parse(&too_many, &names()).is_err());

        let shifted = SAMPLE.replacen("40.0   -6.5000", "45.0   -6.5000", 1);
        match ContinuumTable::parse(&shifted, &names()) {
            Err(OpacityErr::GridMismatch { axis, value }) => {
                assert_eq!(axis, "wavenumber");
                assert_eq!(value, 45.0);
            }
            other => panic!("expected a grid mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_huge_declared_counts() {
        let text = "4000000000 4000000000\n75.\n0.0 -33.0\n";
        match ContinuumTable::parse(text, &["H2H2".to_owned()]) {
            Err(OpacityErr::MalformedRecord { .. }) => {}
            other => panic!("expected a malformed record, got {:?}", other),
        }
    }

    #[test]
    fn test_written_table_parses_back() {
        let table = ContinuumTable::parse(SAMPLE, &names()).unwrap();

        let mut buf = vec![];
        table.write_to(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert!(text.starts_with("3 2\n75.0\n"));
        assert!(text.contains("           0.0      -33.0000      -30.0000\n"));
        assert_eq!(ContinuumTable::parse(&text, &names()).unwrap(), table);
    }

    #[test]
    fn test_restructure() {
        let table = ContinuumTable::parse(SAMPLE, &names()).unwrap();

        let records = table.restructure(&[10.0, 30.0, 50.0]).unwrap();

        assert_eq!(records.len(), 4);
        assert_eq!(records[0].pair, "H2H2");
        assert_eq!(records[0].temperature, 75.0);
        assert_eq!(records[1].pair, "H2He");
        assert_eq!(records[2].temperature, 100.0);

        let expected = 10.0_f64.powf((-33.0 + -7.4572) / 2.0);
        assert!((records[0].opacity[0] / expected - 1.0).abs() < 1.0e-12);
        assert_eq!(records[0].opacity[2], 10.0_f64.powf(OUTPUT_FLOOR_LOG10));
    }
}
