//! Axes of a temperature/pressure/g-ordinate sample grid and the lookup of samples on them.

use crate::errors::OpacityErr;

pub use self::sample::{parse_records, remove_duplicates, SampleTriple, ATM_TO_BAR};

mod sample;

/// Relative tolerance for matching a sample to an axis value.
pub const RELATIVE_TOLERANCE: f64 = 1.0e-8;
/// Absolute tolerance for matching a sample to an axis value.
pub const ABSOLUTE_TOLERANCE: f64 = 1.0e-20;

/// Test if `a` is within `atol + rtol * |b|` of `b`.
pub fn is_close(a: f64, b: f64, rtol: f64, atol: f64) -> bool {
    (a - b).abs() <= atol + rtol * b.abs()
}

/// The unique, sorted values along each dimension of a set of samples.
#[derive(Clone, Debug, PartialEq)]
pub struct AxisSet {
    /// Unique g-ordinates.
    pub weights: Vec<f64>,
    /// Unique temperatures in K.
    pub temperatures: Vec<f64>,
    /// Unique pressures in bar.
    pub pressures: Vec<f64>,
    /// Unique g-ordinate labels.
    pub weight_counts: Vec<i32>,
}

/// Location of a sample in an [`AxisSet`].
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridIndex {
    pub weight: usize,
    pub pressure: usize,
    pub temperature: usize,
}

impl AxisSet {
    /// Collect the axes observed in `samples`.
    pub fn from_samples(samples: &[SampleTriple]) -> Self {
        let mut weight_counts: Vec<i32> = samples.iter().map(|s| s.weight_count).collect();
        weight_counts.sort_unstable();
        weight_counts.dedup();

        AxisSet {
            weights: unique_sorted(samples.iter().map(|s| s.weight)),
            temperatures: unique_sorted(samples.iter().map(|s| s.temperature)),
            pressures: unique_sorted(samples.iter().map(|s| s.pressure)),
            weight_counts,
        }
    }

    /// Number of values on each axis as `(weights, pressures, temperatures)`.
    pub fn shape(&self) -> (usize, usize, usize) {
        (
            self.weights.len(),
            self.pressures.len(),
            self.temperatures.len(),
        )
    }

    /// Find where `sample` sits on the grid.
    ///
    /// Every coordinate of the sample, including its g-ordinate label, must match an axis value
    /// within tolerance. Anything else means the source data is not on a regular grid.
    pub fn index(&self, sample: &SampleTriple) -> Result<GridIndex, OpacityErr> {
        let temperature = match_axis(&self.temperatures, sample.temperature, "temperature")?;
        let pressure = match_axis(&self.pressures, sample.pressure, "pressure")?;
        let weight = match_axis(&self.weights, sample.weight, "weight")?;

        // The label has no axis of its own in the output, but it has to exist.
        let counts: Vec<f64> = self.weight_counts.iter().map(|&c| f64::from(c)).collect();
        match_axis(&counts, f64::from(sample.weight_count), "weight count")?;

        Ok(GridIndex {
            weight,
            pressure,
            temperature,
        })
    }
}

/// Sort and remove duplicates.
pub fn unique_sorted<I>(values: I) -> Vec<f64>
where
    I: IntoIterator<Item = f64>,
{
    let mut values: Vec<f64> = values.into_iter().collect();
    values.sort_by(|a, b| a.total_cmp(b));
    values.dedup();
    values
}

/// Index of the value in the sorted `axis` nearest to `value`.
pub fn nearest(axis: &[f64], value: f64) -> Option<usize> {
    if axis.is_empty() || value.is_nan() {
        return None;
    }

    let upper = axis.partition_point(|&a| a < value);
    if upper == 0 {
        Some(0)
    } else if upper == axis.len() {
        Some(axis.len() - 1)
    } else if (value - axis[upper - 1]).abs() <= (axis[upper] - value).abs() {
        Some(upper - 1)
    } else {
        Some(upper)
    }
}

/// Find the nearest axis value and insist it equals `value` within tolerance.
pub fn match_axis(axis: &[f64], value: f64, name: &'static str) -> Result<usize, OpacityErr> {
    nearest(axis, value)
        .filter(|&i| is_close(value, axis[i], RELATIVE_TOLERANCE, ABSOLUTE_TOLERANCE))
        .ok_or(OpacityErr::GridMismatch { axis: name, value })
}

/// Check two axes agree value for value within `rtol`.
pub fn check_axis(
    found: &[f64],
    expected: &[f64],
    rtol: f64,
    name: &'static str,
) -> Result<(), OpacityErr> {
    if found.len() != expected.len() {
        return Err(OpacityErr::LengthMismatch {
            expected: expected.len(),
            actual: found.len(),
        });
    }

    match found
        .iter()
        .zip(expected)
        .find(|(&f, &e)| !is_close(f, e, rtol, ABSOLUTE_TOLERANCE))
    {
        Some((&value, _)) => Err(OpacityErr::GridMismatch { axis: name, value }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod unit {
    use super::*;

    fn sample(temperature: f64, pressure: f64, weight: f64, count: i32) -> SampleTriple {
        SampleTriple {
            weight,
            value: 1.0e-20,
            temperature,
            pressure,
            weight_count: count,
        }
    }

    #[test]
    fn test_axes_from_samples() {
        let samples = vec![
            sample(300.0, 1.0, 0.1, 2),
            sample(300.0, 1.0, 0.9, 2),
        ];

        let axes = AxisSet::from_samples(&samples);

        assert_eq!(axes.temperatures, vec![300.0]);
        assert_eq!(axes.pressures, vec![1.0]);
        assert_eq!(axes.weight_counts, vec![2]);
        assert_eq!(axes.weights, vec![0.1, 0.9]);
        assert_eq!(axes.shape(), (2, 1, 1));
    }

    #[test]
    fn test_every_sample_indexes_back_onto_its_axis_values() {
        let mut samples = vec![];
        for (it, &t) in [500.0, 100.0, 300.0].iter().enumerate() {
            for &p in &[1.0e-6, 1.0e-2, 10.0] {
                for (ig, &g) in [0.05, 0.5, 0.95].iter().enumerate() {
                    samples.push(sample(t * (1.0 + 1.0e-12 * it as f64), p, g, ig as i32));
                }
            }
        }

        let axes = AxisSet::from_samples(&samples);
        assert_eq!(axes.shape(), (3, 3, 3));

        for s in &samples {
            let idx = axes.index(s).unwrap();
            assert!(is_close(
                s.temperature,
                axes.temperatures[idx.temperature],
                RELATIVE_TOLERANCE,
                ABSOLUTE_TOLERANCE
            ));
            assert!(is_close(
                s.pressure,
                axes.pressures[idx.pressure],
                RELATIVE_TOLERANCE,
                ABSOLUTE_TOLERANCE
            ));
            assert!(is_close(
                s.weight,
                axes.weights[idx.weight],
                RELATIVE_TOLERANCE,
                ABSOLUTE_TOLERANCE
            ));
        }
    }

    #[test]
    fn test_off_grid_sample_is_fatal() {
        let axes = AxisSet::from_samples(&[sample(300.0, 1.0, 0.1, 0), sample(400.0, 1.0, 0.1, 0)]);

        match axes.index(&sample(350.0, 1.0, 0.1, 0)) {
            Err(OpacityErr::GridMismatch { axis, value }) => {
                assert_eq!(axis, "temperature");
                assert_eq!(value, 350.0);
            }
            other => panic!("expected a grid mismatch, got {:?}", other),
        }

        assert!(axes.index(&sample(300.0, 1.0, 0.1, 1)).is_err());
        assert!(axes.index(&sample(300.0, 1.0 + 1.0e-6, 0.1, 0)).is_err());
        assert!(axes.index(&sample(300.0, 1.0 + 1.0e-10, 0.1, 0)).is_ok());
    }

    #[test]
    fn test_nearest() {
        let axis = [1.0, 2.0, 4.0];
        assert_eq!(nearest(&axis, -3.0), Some(0));
        assert_eq!(nearest(&axis, 1.4), Some(0));
        assert_eq!(nearest(&axis, 1.6), Some(1));
        assert_eq!(nearest(&axis, 3.5), Some(2));
        assert_eq!(nearest(&axis, 40.0), Some(2));
        assert_eq!(nearest(&[], 1.0), None);
    }

    #[test]
    fn test_check_axis() {
        assert!(check_axis(&[1.0, 2.0], &[1.0, 2.0 + 1.0e-12], 1.0e-10, "pressure").is_ok());
        assert!(check_axis(&[1.0, 2.0], &[1.0, 2.1], 1.0e-10, "pressure").is_err());
        match check_axis(&[1.0], &[1.0, 2.0], 1.0e-10, "pressure") {
            Err(OpacityErr::LengthMismatch { expected, actual }) => {
                assert_eq!((expected, actual), (2, 1));
            }
            other => panic!("expected a length mismatch, got {:?}", other),
        }
    }
}
