//! Command line options that are used across applications.

use std::ops::Range;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use clap::{App, Arg, ArgMatches};

use crate::{builder::read_numbers, errors::OpacityErr, reshape::BinOrder};

/// Struct to package up command line arguments.
#[derive(Clone, Debug)]
pub struct CommonCmdLineArgs {
    // Directory with the HELIOS-K results
    results_dir: PathBuf,
    // Carry on past species that fail
    keep_going: bool,
}

impl<'a, 'b> CommonCmdLineArgs {
    const DEFAULT_RESULTS_DIR: &'static str = ".";

    /// Create a new set of args.
    pub fn new_app(app_name: &'static str, about: &'static str) -> App<'a, 'b> {
        App::new(app_name)
            .about(about)
            .version(clap::crate_version!())
            .arg(
                Arg::with_name("results")
                    .short("r")
                    .long("results")
                    .takes_value(true)
                    .default_value(Self::DEFAULT_RESULTS_DIR)
                    .help("Directory with the HELIOS-K results.")
                    .long_help(concat!(
                        "Directory with the HELIOS-K results, the Out_<species>.bin and ",
                        "Out_<species>_bin<NNNN>.dat files."
                    )),
            )
            .arg(
                Arg::with_name("keep-going")
                    .short("k")
                    .long("keep-going")
                    .help("Skip species that fail instead of stopping."),
            )
            .after_help(concat!(
                "Lists of numbers (bin edges, weights, wavelengths, grids) are read from ",
                "files holding whitespace separated values.\n\n",
                "Set RUST_LOG to control how much is logged, the default is 'info'."
            ))
    }

    /// Process an `App` to get the parsed values out of it and the matches object so an application
    /// can continue with further argument parsing.
    pub fn matches(app: App<'a, 'b>) -> Result<(Self, ArgMatches<'a>), OpacityErr> {
        let matches = app.get_matches();

        let results_dir = matches
            .value_of("results")
            .map(PathBuf::from)
            .ok_or_else(|| OpacityErr::InvalidConfig("missing results directory".to_owned()))?;

        if !results_dir.is_dir() {
            return Err(OpacityErr::InvalidConfig(format!(
                "{} is not a directory",
                results_dir.display()
            )));
        }

        let cmd_line_opts = CommonCmdLineArgs {
            results_dir,
            keep_going: matches.is_present("keep-going"),
        };

        Ok((cmd_line_opts, matches))
    }

    /// Get the results directory
    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    /// Whether to carry on past species that fail
    pub fn keep_going(&self) -> bool {
        self.keep_going
    }
}

/// Parse the value of argument `name`, if present.
pub fn parsed_value<T>(matches: &ArgMatches, name: &str) -> Result<Option<T>, OpacityErr>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    matches
        .value_of(name)
        .map(|val| {
            val.parse::<T>().map_err(|err| {
                OpacityErr::InvalidConfig(format!("invalid {} '{}': {}", name, val, err))
            })
        })
        .transpose()
}

/// Parse the value of a required argument.
pub fn required_value<T>(matches: &ArgMatches, name: &str) -> Result<T, OpacityErr>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    parsed_value(matches, name)?
        .ok_or_else(|| OpacityErr::InvalidConfig(format!("missing {}", name)))
}

/// The bin numbering named by argument `name`, descending when absent.
pub fn bin_order(matches: &ArgMatches, name: &str) -> Result<BinOrder, OpacityErr> {
    match matches.value_of(name) {
        Some(val) => Ok(BinOrder::from_str(val)?),
        None => Ok(BinOrder::Descending),
    }
}

/// Read the list of numbers in the file named by argument `name`, if present.
pub fn numbers_from_file(matches: &ArgMatches, name: &str) -> Result<Option<Vec<f64>>, OpacityErr> {
    matches
        .value_of(name)
        .map(|path| read_numbers(Path::new(path)))
        .transpose()
}

/// Split a `key=value` argument.
pub fn split_key_value<'v>(arg: &'v str, sep: char) -> Result<(&'v str, &'v str), OpacityErr> {
    let mut parts = arg.splitn(2, sep);
    match (parts.next(), parts.next()) {
        (Some(key), Some(value)) if !key.is_empty() && !value.is_empty() => Ok((key, value)),
        _ => Err(OpacityErr::InvalidConfig(format!(
            "expected '<key>{}<value>', found '{}'",
            sep, arg
        ))),
    }
}

/// Resolve a `start:end` slice over `len` items.
///
/// Either bound may be left empty. Negative bounds count back from the end and bounds past
/// either end are clamped, so `:-2` is all but the last two items.
pub fn slice_range(spec: &str, len: usize) -> Result<Range<usize>, OpacityErr> {
    let invalid = || OpacityErr::InvalidConfig(format!("invalid slice '{}'", spec));

    let (start, end) = spec.split_once(':').ok_or_else(invalid)?;

    let bound = |text: &str, default: usize| -> Result<usize, OpacityErr> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(default);
        }
        let idx: i64 = text.parse().map_err(|_| invalid())?;
        let idx = if idx < 0 { len as i64 + idx } else { idx };
        Ok(idx.clamp(0, len as i64) as usize)
    };

    let start = bound(start, 0)?;
    let end = bound(end, len)?;

    Ok(start..end.max(start))
}

#[cfg(test)]
mod unit {
    use super::*;

    #[test]
    fn test_split_key_value() {
        assert_eq!(
            split_key_value("H2O=xs/H2O.txt", '=').unwrap(),
            ("H2O", "xs/H2O.txt")
        );
        assert_eq!(
            split_key_value("cia.txt:N2N2,N2O2", ':').unwrap(),
            ("cia.txt", "N2N2,N2O2")
        );
        assert!(split_key_value("H2O", '=').is_err());
        assert!(split_key_value("=xs.txt", '=').is_err());
    }

    #[test]
    fn test_slice_range() {
        assert_eq!(slice_range(":-2", 11).unwrap(), 0..9);
        assert_eq!(slice_range("9:", 11).unwrap(), 9..11);
        assert_eq!(slice_range(":", 4).unwrap(), 0..4);
        assert_eq!(slice_range("-20:3", 11).unwrap(), 0..3);
        assert_eq!(slice_range("2:100", 5).unwrap(), 2..5);
        assert_eq!(slice_range("4:2", 5).unwrap(), 4..4);

        assert!(slice_range("3", 5).is_err());
        assert!(slice_range("1:x", 5).is_err());
    }

    #[test]
    fn test_bin_order() {
        let app = App::new("test").arg(Arg::with_name("order").long("order").takes_value(true));

        let matches = app.clone().get_matches_from(vec!["test", "--order", "ascending"]);
        assert_eq!(bin_order(&matches, "order").unwrap(), BinOrder::Ascending);

        let matches = app.clone().get_matches_from(vec!["test"]);
        assert_eq!(bin_order(&matches, "order").unwrap(), BinOrder::Descending);

        let matches = app.get_matches_from(vec!["test", "--order", "sideways"]);
        match bin_order(&matches, "order") {
            Err(OpacityErr::StrumError(_)) => {}
            other => panic!("expected a strum parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_parsed_value() {
        let app = App::new("test")
            .arg(Arg::with_name("bins").long("bins").takes_value(true))
            .arg(Arg::with_name("r").long("r").takes_value(true));
        let matches = app.get_matches_from(vec!["test", "--bins", "12", "--r", "abc"]);

        assert_eq!(parsed_value::<usize>(&matches, "bins").unwrap(), Some(12));
        assert!(parsed_value::<f64>(&matches, "r").is_err());
        assert_eq!(parsed_value::<f64>(&matches, "missing").unwrap(), None);
        assert!(required_value::<f64>(&matches, "missing").is_err());
    }
}
