//! A single record from a per-bin results file.

use std::{collections::HashSet, str::FromStr};

use crate::errors::OpacityErr;

/// Conversion from atmospheres to bar.
pub const ATM_TO_BAR: f64 = 1.01325;

/// One sample of the k-distribution for a spectral bin.
///
/// Records are read from text lines with the fixed layout
/// `weight value temperature pressure weight_count`, pressure in atm. The pressure stored here
/// has already been converted to bar.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SampleTriple {
    /// The g-ordinate of the sample.
    pub weight: f64,
    /// Absorption cross section in cm^2/molecule.
    pub value: f64,
    /// Temperature in K.
    pub temperature: f64,
    /// Pressure in bar.
    pub pressure: f64,
    /// Integer label of the g-ordinate.
    pub weight_count: i32,
}

impl SampleTriple {
    const NUM_FIELDS: usize = 5;

    fn parse_field(line: &str, field: &str, name: &str) -> Result<f64, OpacityErr> {
        field.parse::<f64>().map_err(|_| OpacityErr::MalformedRecord {
            line: line.to_owned(),
            reason: format!("{} is not a number", name),
        })
    }
}

impl FromStr for SampleTriple {
    type Err = OpacityErr;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != Self::NUM_FIELDS {
            return Err(OpacityErr::MalformedRecord {
                line: line.to_owned(),
                reason: format!(
                    "expected {} fields, found {}",
                    Self::NUM_FIELDS,
                    fields.len()
                ),
            });
        }

        let weight = Self::parse_field(line, fields[0], "weight")?;
        let value = Self::parse_field(line, fields[1], "cross section")?;
        let temperature = Self::parse_field(line, fields[2], "temperature")?;
        let pressure = Self::parse_field(line, fields[3], "pressure")? * ATM_TO_BAR;

        // The count is sometimes printed as a float, e.g. "3.0".
        let count = Self::parse_field(line, fields[4], "weight count")?;
        if count.fract() != 0.0 || count < f64::from(i32::MIN) || count > f64::from(i32::MAX) {
            return Err(OpacityErr::MalformedRecord {
                line: line.to_owned(),
                reason: "weight count is not an integer".to_owned(),
            });
        }

        Ok(SampleTriple {
            weight,
            value,
            temperature,
            pressure,
            weight_count: count as i32,
        })
    }
}

/// Drop repeated lines, keeping the first occurrence of each and the original order.
pub fn remove_duplicates<'a, I>(lines: I) -> Vec<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    lines.into_iter().filter(|line| seen.insert(*line)).collect()
}

/// Parse every non-blank line of a per-bin results file, ignoring duplicate lines.
pub fn parse_records(text: &str) -> Result<Vec<SampleTriple>, OpacityErr> {
    remove_duplicates(text.lines().filter(|line| !line.trim().is_empty()))
        .into_iter()
        .map(SampleTriple::from_str)
        .collect()
}
